//! Session manager against a recording transport.

use std::cell::RefCell;
use std::rc::Rc;

use linkcore::app::ports::QosLevel;
use linkcore::config::{BrokerConfig, SystemConfig};
use linkcore::session::{SessionError, SessionManager, SessionSettings};

use crate::mock_hw::MockTransport;

type Log = Rc<RefCell<Vec<String>>>;

fn session() -> SessionManager<MockTransport> {
    let mut s = SessionManager::new(
        MockTransport::new(),
        BrokerConfig::default().endpoint("XE1234567"),
        SessionSettings::from(&SystemConfig::default()),
    );
    s.begin().unwrap();
    s
}

fn connected() -> SessionManager<MockTransport> {
    let mut s = session();
    s.on_link_up();
    s.on_connected();
    s
}

fn recorder(log: &Log, tag: &'static str) -> impl FnMut(&str, &str, &mut linkcore::session::SessionHandle<'_>) + 'static {
    let log = log.clone();
    move |topic, payload, _session| {
        log.borrow_mut().push(format!("{tag}:{topic}:{payload}"));
    }
}

// ── Endpoint ──────────────────────────────────────────────────

#[test]
fn begin_configures_without_connecting() {
    let s = session();
    let ep = s.transport().endpoint.as_ref().unwrap();
    assert_eq!(ep.host.as_str(), "bemfa.com");
    assert_eq!(ep.port, 9501);
    assert_eq!(ep.client_id.as_str(), "XE1234567");
    assert_eq!(s.transport().connects, 0);
}

// ── Connect / reconnect ───────────────────────────────────────

#[test]
fn link_up_issues_exactly_one_connect() {
    let mut s = session();
    s.on_link_up();
    assert_eq!(s.transport().connects, 1);
    s.on_connected();
    s.on_link_up();
    assert_eq!(s.transport().connects, 1);
}

#[test]
fn loss_with_link_up_reconnects_after_delay() {
    let mut s = connected();
    assert!(s.on_lost(1_000));
    assert!(s.reconnect_pending());
    assert!(!s.poll(2_999));
    assert_eq!(s.transport().connects, 1);
    assert!(s.poll(3_000));
    assert_eq!(s.transport().connects, 2);
    assert!(!s.reconnect_pending());
    assert!(!s.poll(10_000));
}

#[test]
fn loss_with_link_down_waits_for_link() {
    let mut s = connected();
    s.on_link_down();
    assert!(!s.on_lost(1_000));
    assert!(!s.reconnect_pending());
    assert!(!s.poll(5_000));
    assert_eq!(s.transport().connects, 1);
}

#[test]
fn link_down_cancels_pending_reconnect() {
    let mut s = connected();
    s.on_lost(0);
    s.on_link_down();
    assert!(!s.reconnect_pending());
    assert!(!s.poll(2_000));
    assert_eq!(s.transport().connects, 1);

    // Link back: a fresh connect, and no stale timer firing afterwards.
    s.on_link_up();
    assert_eq!(s.transport().connects, 2);
    assert!(!s.poll(4_000));
    assert_eq!(s.transport().connects, 2);
}

#[test]
fn link_up_during_pending_reconnect_connects_once() {
    let mut s = connected();
    s.on_lost(0);
    s.on_link_up();
    assert_eq!(s.transport().connects, 2);
    assert!(!s.poll(2_000));
    assert_eq!(s.transport().connects, 2);
}

// ── Subscriptions ─────────────────────────────────────────────

#[test]
fn connect_subscribes_every_topic_in_order() {
    let mut s = session();
    s.on_message("b/topic", |_, _, _| {}).unwrap();
    s.on_message("a/topic", |_, _, _| {}).unwrap();
    s.on_message("b/topic", |_, _, _| {}).unwrap();
    s.on_link_up();
    let report = s.on_connected();
    assert_eq!(report.subscribed, 2);
    assert_eq!(report.failed, 0);
    let topics = s.transport().subscribed_topics();
    assert_eq!(topics.len(), 2);
    assert!(topics.contains(&"a/topic") && topics.contains(&"b/topic"));
    assert!(
        s.transport()
            .subscriptions
            .iter()
            .all(|(_, q)| *q == QosLevel::AtLeastOnce)
    );
}

#[test]
fn failed_subscription_is_counted_not_fatal() {
    let mut s = session();
    s.on_message("good", |_, _, _| {}).unwrap();
    s.on_message("bad", |_, _, _| {}).unwrap();
    s.transport_mut().reject_subscribe.push("bad".into());
    s.on_link_up();
    let report = s.on_connected();
    assert_eq!((report.subscribed, report.failed), (1, 1));
    assert_eq!(s.stats().subscribe_failures, 1);
    assert!(s.is_connected());
}

#[test]
fn late_registration_subscribes_immediately() {
    let mut s = connected();
    s.on_message("late", |_, _, _| {}).unwrap();
    assert_eq!(s.transport().subscribed_topics(), vec!["late"]);

    // A second handler on the same topic does not resubscribe.
    s.on_message("late", |_, _, _| {}).unwrap();
    assert_eq!(s.transport().subscriptions.len(), 1);
    assert_eq!(s.handler_count("late"), 2);
}

#[test]
fn registration_before_connect_does_not_subscribe() {
    let mut s = session();
    s.on_message("early", |_, _, _| {}).unwrap();
    assert!(s.transport().subscriptions.is_empty());
}

#[test]
fn overlong_topic_is_rejected() {
    let mut s = session();
    let long = "t".repeat(65);
    assert_eq!(
        s.on_message(&long, |_, _, _| {}),
        Err(SessionError::TopicTooLong)
    );
    assert_eq!(s.topics().count(), 0);
}

// ── Dispatch ──────────────────────────────────────────────────

#[test]
fn dispatch_is_isolated_by_topic_and_ordered() {
    let log: Log = Rc::default();
    let mut s = connected();
    s.on_message("a", recorder(&log, "a1")).unwrap();
    s.on_message("b", recorder(&log, "b1")).unwrap();
    s.on_message("a", recorder(&log, "a2")).unwrap();

    assert_eq!(s.on_message_received("a", "x"), 2);
    assert_eq!(*log.borrow(), vec!["a1:a:x", "a2:a:x"]);

    log.borrow_mut().clear();
    assert_eq!(s.on_message_received("b", "y"), 1);
    assert_eq!(*log.borrow(), vec!["b1:b:y"]);
}

#[test]
fn exact_match_only() {
    let log: Log = Rc::default();
    let mut s = connected();
    s.on_message("home/light", recorder(&log, "h")).unwrap();
    assert_eq!(s.on_message_received("home/light/", "x"), 0);
    assert_eq!(s.on_message_received("HOME/LIGHT", "x"), 0);
    assert_eq!(s.on_message_received("home/+", "x"), 0);
    assert!(log.borrow().is_empty());
    assert_eq!(s.stats().messages_dropped, 3);
}

#[test]
fn duplicate_delivery_dispatches_twice() {
    let log: Log = Rc::default();
    let mut s = connected();
    s.on_message("t", recorder(&log, "h")).unwrap();
    s.on_message_received("t", "on");
    s.on_message_received("t", "on");
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(s.stats().messages_dispatched, 2);
    assert_eq!(s.handler_count("t"), 1);
}

#[test]
fn handlers_can_publish_through_the_handle() {
    let mut s = connected();
    s.on_message("cmd", |topic, payload, session| {
        session
            .publish(topic, payload, QosLevel::ExactlyOnce, true)
            .unwrap();
    })
    .unwrap();
    s.on_message_received("cmd", "on");
    let p = &s.transport().published[0];
    assert_eq!((p.topic.as_str(), p.payload.as_str()), ("cmd", "on"));
    assert!(p.retain);
    assert_eq!(s.stats().publishes, 1);
}

// ── Publish ───────────────────────────────────────────────────

#[test]
fn publish_requires_connection() {
    let mut s = session();
    assert_eq!(
        s.publish("t", "x", QosLevel::AtMostOnce, false),
        Err(SessionError::NotConnected)
    );
    assert!(s.transport().published.is_empty());
}

#[test]
fn publish_after_loss_is_refused() {
    let mut s = connected();
    s.on_lost(0);
    assert_eq!(
        s.publish("t", "x", QosLevel::AtMostOnce, false),
        Err(SessionError::NotConnected)
    );
}
