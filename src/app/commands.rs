//! Appliance switch command handler.
//!
//! Payloads on the device's command topic:
//!
//! | Payload        | Command |
//! |----------------|---------|
//! | `on`, `on#…`   | `On`    |
//! | `off`, `off#…` | `Off`   |
//!
//! Anything after `#` is an opaque suffix added by the remote service.
//! When a command changes the switch state the handler drives the
//! [`SwitchPort`] and echoes the payload back on the same topic, retained,
//! so the remote side sees the confirmed state.

use log::{debug, info, warn};

use crate::app::ports::{BrokerTransport, QosLevel, SwitchPort};
use crate::session::{SessionError, SessionManager};

/// Suffix appended to the hostname to form the command topic.
pub const SWITCH_TOPIC_SUFFIX: &str = "x002";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCommand {
    On,
    Off,
}

impl SwitchCommand {
    pub fn parse(payload: &str) -> Option<Self> {
        let head = payload.split_once('#').map_or(payload, |(h, _)| h);
        match head {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// `lowercase(hostname + "x002")`.  Truncated at 64 bytes.
pub fn switch_topic(hostname: &str) -> heapless::String<64> {
    let mut topic = heapless::String::new();
    for ch in hostname.chars().chain(SWITCH_TOPIC_SUFFIX.chars()) {
        if topic.push(ch.to_ascii_lowercase()).is_err() {
            break;
        }
    }
    topic
}

/// Register the switch handler on `topic`.  The switch starts off.
pub fn register_switch_handler<T, S>(
    session: &mut SessionManager<T>,
    topic: &str,
    mut switch: S,
    ack_qos: QosLevel,
) -> Result<(), SessionError>
where
    T: BrokerTransport,
    S: SwitchPort + 'static,
{
    let mut is_on = false;
    session.on_message(topic, move |topic, payload, session| {
        let Some(cmd) = SwitchCommand::parse(payload) else {
            debug!("Switch: ignoring payload '{}'", payload);
            return;
        };
        if cmd.is_on() == is_on {
            debug!("Switch: already {:?}", cmd);
            return;
        }
        is_on = cmd.is_on();
        switch.set_switch(is_on);
        info!("Switch: turned {}", if is_on { "on" } else { "off" });

        if let Err(e) = session.publish(topic, payload, ack_qos, true) {
            warn!("Switch: acknowledgement not sent: {}", e);
        }
    })
}
