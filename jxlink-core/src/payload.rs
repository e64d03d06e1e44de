//! Function-specific payload layouts

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    bcd::{self, BcdWidth},
    constants::PASS_EVENT_SIZE,
    error::{Error, Result},
    function::FunctionCode,
};
use jxlink_types::{PassEvent, Payload};

/// Decode a payload according to its function code
///
/// Read-time replies carry a short BCD clock. Pass events are laid out as:
///
/// ```text
/// offset  0     1..7        7          8      9..13
///         ?     BCD time    deny flag  door   card (LE u32)
/// ```
///
/// A deny flag of zero means the card was let through.
pub fn decode(code: FunctionCode, payload: &[u8]) -> Result<Payload> {
    match code {
        FunctionCode::ReadTime | FunctionCode::TimeReport => {
            Ok(Payload::Time(bcd::decode(payload, BcdWidth::Short).map_err(|e| {
                too_short(code, BcdWidth::Short.len(), payload.len(), e)
            })?))
        }
        FunctionCode::PassEvent => decode_pass_event(payload).map(Payload::Pass),
        _ => Ok(Payload::Opaque(payload.to_vec())),
    }
}

fn decode_pass_event(payload: &[u8]) -> Result<PassEvent> {
    if payload.len() < PASS_EVENT_SIZE {
        return Err(Error::PayloadTooShort {
            code: FunctionCode::PassEvent,
            expected: PASS_EVENT_SIZE,
            actual: payload.len(),
        });
    }

    Ok(PassEvent {
        allow: payload[7] == 0,
        door: payload[8],
        card_no: LittleEndian::read_u32(&payload[9..13]),
        time: bcd::decode(&payload[1..7], BcdWidth::Short)?,
    })
}

fn too_short(code: FunctionCode, expected: usize, actual: usize, err: Error) -> Error {
    match err {
        Error::FrameTooShort { .. } => Error::PayloadTooShort {
            code,
            expected,
            actual,
        },
        other => other,
    }
}

/// Build a 4-byte little-endian card payload
pub fn card(card_no: u32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, card_no);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn pass_payload(deny: u8, door: u8, card: [u8; 4]) -> Vec<u8> {
        let mut payload = vec![0x00, 0x24, 0x03, 0x09, 0x08, 0x30, 0x15, deny, door];
        payload.extend_from_slice(&card);
        payload
    }

    #[test]
    fn test_pass_event_allowed() {
        let payload = pass_payload(0x00, 0x02, [0x01, 0x00, 0x00, 0x00]);

        let Payload::Pass(event) = decode(FunctionCode::PassEvent, &payload).unwrap() else {
            panic!("expected pass event");
        };

        assert!(event.allow);
        assert_eq!(event.door, 2);
        assert_eq!(event.card_no, 1);
        assert_eq!(
            event.time,
            bcd::protocol_zone().with_ymd_and_hms(2024, 3, 9, 8, 30, 15).unwrap()
        );
    }

    #[test]
    fn test_pass_event_denied() {
        let payload = pass_payload(0x01, 0x01, [0xD2, 0x02, 0x96, 0x49]);

        let Payload::Pass(event) = decode(FunctionCode::PassEvent, &payload).unwrap() else {
            panic!("expected pass event");
        };

        assert!(!event.allow);
        assert_eq!(event.card_no, 1234567890);
    }

    #[test]
    fn test_pass_event_too_short() {
        let result = decode(FunctionCode::PassEvent, &[0; 12]);
        assert!(matches!(
            result,
            Err(Error::PayloadTooShort {
                expected: 13,
                actual: 12,
                ..
            })
        ));
    }

    #[test]
    fn test_read_time() {
        let payload = [0x24, 0x03, 0x09, 0x08, 0x30, 0x15];
        let decoded = decode(FunctionCode::ReadTime, &payload).unwrap();

        assert_eq!(
            decoded,
            Payload::Time(bcd::protocol_zone().with_ymd_and_hms(2024, 3, 9, 8, 30, 15).unwrap())
        );
        assert_eq!(decode(FunctionCode::TimeReport, &payload).unwrap(), decoded);
    }

    #[test]
    fn test_read_time_too_short() {
        assert!(matches!(
            decode(FunctionCode::ReadTime, &[0x24]),
            Err(Error::PayloadTooShort { .. })
        ));
    }

    #[test]
    fn test_opaque_passthrough() {
        let decoded = decode(FunctionCode::OpenDoor, &[1, 0]).unwrap();
        assert_eq!(decoded, Payload::Opaque(vec![1, 0]));
    }

    #[test]
    fn test_card_payload() {
        assert_eq!(card(1234567890), [0xD2, 0x02, 0x96, 0x49]);
    }
}
