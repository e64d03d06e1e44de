//! Decoded payload records

use std::fmt;

use chrono::{DateTime, FixedOffset};

/// Structured view of a frame payload
///
/// One variant per payload layout the controllers use. Function codes
/// whose layout is not known keep their bytes in [`Payload::Opaque`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Controller clock, reported in the protocol zone
    Time(DateTime<FixedOffset>),

    /// Card swipe reported by a realtime watch
    Pass(PassEvent),

    /// Raw bytes for layouts without a decoder
    Opaque(Vec<u8>),
}

impl Payload {
    /// Event time carried by this payload, if any
    pub fn time(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Time(time) => Some(*time),
            Self::Pass(event) => Some(event.time),
            Self::Opaque(_) => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time(time) => write!(f, "{}", time.format("%Y-%m-%d %H:%M:%S %:z")),
            Self::Pass(event) => write!(f, "{}", event),
            Self::Opaque(bytes) => write!(f, "{} bytes", bytes.len()),
        }
    }
}

/// A card presented at a door
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassEvent {
    /// Whether the controller let the card through
    pub allow: bool,

    /// Door the card was presented at
    pub door: u8,

    /// Card number
    pub card_no: u32,

    /// When the controller saw the card
    pub time: DateTime<FixedOffset>,
}

impl fmt::Display for PassEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} by door {} at {}",
            self.card_no,
            if self.allow { "pass" } else { "reject" },
            self.door,
            self.time.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, h, m, s)
            .unwrap()
    }

    #[test]
    fn test_pass_event_display() {
        let event = PassEvent {
            allow: true,
            door: 2,
            card_no: 1,
            time: at(8, 30, 0),
        };
        assert_eq!(event.to_string(), "1 pass by door 2 at 2024-03-09 08:30:00");

        let denied = PassEvent { allow: false, ..event };
        assert_eq!(denied.to_string(), "1 reject by door 2 at 2024-03-09 08:30:00");
    }

    #[test]
    fn test_payload_time() {
        let time = at(12, 0, 5);
        assert_eq!(Payload::Time(time).time(), Some(time));
        assert_eq!(Payload::Opaque(vec![1, 2]).time(), None);
    }

    #[test]
    fn test_payload_display() {
        assert_eq!(Payload::Opaque(vec![0; 3]).to_string(), "3 bytes");
        assert_eq!(Payload::Time(at(1, 2, 3)).to_string(), "2024-03-09 01:02:03 +08:00");
    }
}
