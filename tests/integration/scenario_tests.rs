//! End-to-end scenarios through the cooperative runtime.
//!
//! The rig steps the runtime every 10 ms of simulated time, the way the
//! firmware main loop does.

use linkcore::app::commands::{register_switch_handler, switch_topic};
use linkcore::app::events::AppEvent;
use linkcore::app::ports::{Credentials, QosLevel};
use linkcore::drivers::input_monitor::HoldEvent;
use linkcore::drivers::status_signal::SignalPattern;
use linkcore::events::Event;
use linkcore::fsm::DeviceState;

use crate::mock_hw::{HOSTNAME, MockSwitch, NetCall, Publish, Rig};

fn rig_with_switch() -> (Rig, MockSwitch, String) {
    let mut rig = Rig::new();
    let switch = MockSwitch::new();
    let topic = switch_topic(HOSTNAME).to_string();
    register_switch_handler(
        rig.runtime.session_mut(),
        &topic,
        switch.clone(),
        rig.config.ack_qos,
    )
    .unwrap();
    (rig, switch, topic)
}

/// Hold the button for `ms`, then release and let one more sample run.
fn hold_button(rig: &mut Rig, ms: u64) {
    rig.press();
    rig.advance(ms);
    rig.release();
    let sample_ms = u64::from(rig.config.input_sample_ms);
    rig.advance(sample_ms);
}

// ── Switch command path ───────────────────────────────────────

#[test]
fn switch_on_via_broker_end_to_end() {
    let (mut rig, switch, topic) = rig_with_switch();
    assert_eq!(topic, "xe1234567x002");

    rig.bring_up();
    assert_eq!(rig.runtime.state(), DeviceState::Ready);
    assert_eq!(rig.transport().connects, 1);
    assert_eq!(rig.transport().subscribed_topics(), vec![topic.as_str()]);

    rig.push_message(&topic, "on");
    rig.advance(Rig::STEP_MS);

    assert!(switch.is_on());
    assert_eq!(
        rig.transport().published,
        vec![Publish {
            topic: topic.clone(),
            payload: "on".into(),
            qos: QosLevel::ExactlyOnce,
            retain: true,
        }]
    );
    assert!(rig.sink.contains(&AppEvent::MessageDispatched { handlers: 1 }));
}

#[test]
fn repeated_command_publishes_nothing() {
    let (mut rig, switch, topic) = rig_with_switch();
    rig.bring_up();

    rig.push_message(&topic, "on");
    rig.push_message(&topic, "on#1700000000");
    rig.push_message(&topic, "off#abc");
    rig.push_message(&topic, "bogus");
    rig.advance(Rig::STEP_MS);

    assert_eq!(*switch.states.borrow(), vec![true, false]);
    let acks: Vec<&str> = rig
        .transport()
        .published
        .iter()
        .map(|p| p.payload.as_str())
        .collect();
    assert_eq!(acks, vec!["on", "off#abc"]);
}

#[test]
fn message_on_foreign_topic_is_dropped() {
    let (mut rig, switch, _topic) = rig_with_switch();
    rig.bring_up();
    rig.push_message("xe0000000x002", "on");
    rig.advance(Rig::STEP_MS);
    assert!(!switch.is_on());
    assert!(rig.sink.contains(&AppEvent::MessageDropped));
    assert_eq!(rig.runtime.session().stats().messages_dropped, 1);
}

// ── Link edges ────────────────────────────────────────────────

#[test]
fn link_edges_reach_supervisor_then_session() {
    let mut rig = Rig::new();
    rig.bring_up();

    rig.push(Event::LinkDown);
    rig.advance(Rig::STEP_MS);
    assert_eq!(rig.runtime.state(), DeviceState::Connecting);
    assert!(!rig.runtime.session().is_link_up());
    assert_eq!(rig.net.count(&NetCall::Connect), 2);

    rig.push(Event::LinkUp);
    rig.advance(Rig::STEP_MS);
    assert_eq!(rig.runtime.state(), DeviceState::Ready);
    // Session still believes it is connected; no second broker connect.
    assert_eq!(rig.transport().connects, 1);
}

#[test]
fn session_loss_reconnects_after_fixed_delay() {
    let mut rig = Rig::new();
    rig.bring_up();

    rig.push(Event::SessionLost);
    rig.advance(Rig::STEP_MS);
    assert!(rig.sink.contains(&AppEvent::SessionLost {
        reconnect_armed: true
    }));
    assert!(rig.runtime.session().reconnect_pending());

    rig.advance(1_900);
    assert_eq!(rig.transport().connects, 1);
    rig.advance(200);
    assert_eq!(rig.transport().connects, 2);
}

// ── Recovery button ───────────────────────────────────────────

#[test]
fn short_press_does_nothing() {
    let mut rig = Rig::new();
    rig.bring_up();
    hold_button(&mut rig, 2_000);
    assert_eq!(rig.runtime.state(), DeviceState::Ready);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::Hold(_))), 0);
}

#[test]
fn five_second_hold_enters_recovery_once() {
    let mut rig = Rig::new();
    rig.bring_up();
    hold_button(&mut rig, 6_000);

    assert_eq!(rig.runtime.state(), DeviceState::RecoveryMode);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::Hold(HoldEvent::RecoveryArmed { .. }))),
        1
    );
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::Hold(HoldEvent::EnterRecovery { .. }))),
        1
    );
    assert!(rig.net.provisioning);
    assert_eq!(
        rig.runtime.supervisor().signal().pattern(),
        SignalPattern::RECOVERY
    );
}

#[test]
fn recovery_holds_queue_until_credentials_arrive() {
    let (mut rig, switch, topic) = rig_with_switch();
    rig.bring_up();
    hold_button(&mut rig, 6_000);
    assert!(rig.runtime.supervisor().in_recovery());

    // Traffic that arrives during recovery waits, in order.
    rig.push_message(&topic, "on");
    rig.push(Event::SessionLost);
    rig.advance(1_000);
    assert_eq!(rig.queue.len(), 2);
    assert!(!switch.is_on());

    // The recovery pattern keeps running.
    assert!(rig.runtime.supervisor().signal().is_running());

    rig.net.pending = Some(Credentials::new("HomeWiFi", "mysecret8").unwrap());
    let poll_ms = u64::from(rig.config.provisioning_poll_ms);
    rig.advance(poll_ms);

    assert_eq!(rig.runtime.state(), DeviceState::Connecting);
    assert!(rig.queue.is_empty());
    // Message first (still connected, so the ack goes out), then the loss.
    assert!(switch.is_on());
    assert_eq!(rig.transport().published.len(), 1);
    assert!(!rig.runtime.session().is_connected());
    assert!(rig.net.calls.contains(&NetCall::AutoConnect(true)));
    assert!(
        rig.net
            .calls
            .contains(&NetCall::ApplyCredentials("HomeWiFi".into()))
    );
}

#[test]
fn reconnect_timer_is_frozen_during_recovery() {
    let mut rig = Rig::new();
    rig.bring_up();
    rig.push(Event::SessionLost);
    rig.advance(Rig::STEP_MS);
    assert!(rig.runtime.session().reconnect_pending());

    hold_button(&mut rig, 6_000);
    // The 2 s timer fired before recovery was entered.
    let before = rig.transport().connects;

    rig.push(Event::SessionLost);
    rig.advance(5_000);
    assert_eq!(rig.transport().connects, before);
    assert_eq!(rig.queue.len(), 1);
}

#[test]
fn rejected_credentials_keep_listening() {
    let mut rig = Rig::new();
    rig.bring_up();
    hold_button(&mut rig, 6_000);
    let starts = rig.net.count(&NetCall::StartProvisioning);

    rig.net.pending = Some(Credentials {
        ssid: heapless::Vec::new(),
        password: heapless::Vec::new(),
    });
    let poll_ms = u64::from(rig.config.provisioning_poll_ms);
    rig.advance(poll_ms);

    assert!(rig.runtime.supervisor().in_recovery());
    assert!(rig.sink.contains(&AppEvent::CredentialsRejected));
    assert_eq!(rig.net.count(&NetCall::StartProvisioning), starts + 1);
}

#[test]
fn ten_second_hold_restarts() {
    let mut rig = Rig::new();
    rig.bring_up();

    rig.press();
    rig.advance(10_000);
    assert!(rig.runtime.supervisor().is_rebooting());
    assert_eq!(
        rig.runtime.supervisor().signal().pattern(),
        SignalPattern::REBOOTING
    );
    assert_eq!(rig.net.count(&NetCall::Restart), 0);
    assert_eq!(rig.runtime.state(), DeviceState::Ready);

    rig.release();
    let sample_ms = u64::from(rig.config.input_sample_ms);
    rig.advance(sample_ms);
    assert_eq!(rig.net.count(&NetCall::Restart), 1);
    assert!(rig.sink.contains(&AppEvent::RestartRequested));
}

#[test]
fn hard_reset_reachable_from_recovery() {
    let mut rig = Rig::new();
    rig.bring_up();
    hold_button(&mut rig, 6_000);
    assert!(rig.runtime.supervisor().in_recovery());

    hold_button(&mut rig, 11_000);
    assert_eq!(rig.net.count(&NetCall::Restart), 1);
}

// ── Diagnostics ───────────────────────────────────────────────

#[test]
fn status_report_reflects_runtime() {
    let (mut rig, _switch, topic) = rig_with_switch();
    rig.bring_up();
    let report = rig.runtime.status_report();
    assert_eq!(report.state, DeviceState::Ready);
    assert!(report.link_up);
    assert!(report.session_connected);
    assert!(!report.reconnect_pending);
    assert_eq!(report.topics.len(), 1);
    assert_eq!(report.topics[0].as_str(), topic);

    let json = report.to_json().unwrap();
    assert!(json.contains(r#""state":"ready""#));
    assert!(json.contains(r#""heap_free""#));
}

#[test]
fn slow_iteration_is_reported() {
    let mut rig = Rig::new();
    rig.start();
    rig.runtime.record_loop(1_000, 1_050, &mut rig.sink);
    rig.runtime.record_loop(2_000, 2_100, &mut rig.sink);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::LoopOverrun { .. })),
        1
    );
    assert_eq!(rig.runtime.counters().loop_overruns, 1);
}
