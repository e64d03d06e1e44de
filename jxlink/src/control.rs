//! Text control lines on the upstream link
//!
//! The server mixes CRLF-terminated text lines (heartbeats) with binary
//! remote frames on the same connection. A read that ends in CRLF is text;
//! anything else is binary.

use bytes::Bytes;
use chrono::Local;

use jxlink_core::constants::REMOTE_FRAME_SIZE;

const CRLF: &[u8] = b"\r\n";

/// One unit of upstream input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Text line without its CRLF
    Control(String),

    /// Address-prefixed binary frame
    Frame(Bytes),
}

/// Split one read from the upstream link into control lines or frames
pub fn classify(chunk: Bytes) -> Vec<Inbound> {
    if chunk.ends_with(CRLF) {
        return String::from_utf8_lossy(&chunk[..chunk.len() - CRLF.len()])
            .split("\r\n")
            .map(|line| Inbound::Control(line.to_string()))
            .collect();
    }

    if chunk.len() > REMOTE_FRAME_SIZE && chunk.len() % REMOTE_FRAME_SIZE == 0 {
        return (0..chunk.len())
            .step_by(REMOTE_FRAME_SIZE)
            .map(|start| Inbound::Frame(chunk.slice(start..start + REMOTE_FRAME_SIZE)))
            .collect();
    }

    vec![Inbound::Frame(chunk)]
}

/// Parsed control line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlLine {
    /// `PING <nonce> <storeCode>`
    Ping { nonce: String, store_code: String },

    /// Anything else, logged and ignored
    Other(String),
}

impl ControlLine {
    pub fn parse(line: &str) -> Self {
        if let Some(rest) = line.strip_prefix("PING ") {
            let mut parts = rest.split(' ');
            if let (Some(nonce), Some(store_code)) = (parts.next(), parts.next()) {
                if !nonce.is_empty() && !store_code.is_empty() {
                    return Self::Ping {
                        nonce: nonce.to_string(),
                        store_code: store_code.to_string(),
                    };
                }
            }
        }
        Self::Other(line.to_string())
    }
}

/// Heartbeat answer, CRLF included
pub fn pong(nonce: &str, store_code: &str, time: &str) -> String {
    format!("PONG {} {} {}\r\n", nonce, store_code, time)
}

/// Heartbeat answer stamped with the current local time
pub fn pong_now(nonce: &str, store_code: &str) -> String {
    pong(nonce, store_code, &Local::now().format("%H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_control_line() {
        let inbound = classify(Bytes::from_static(b"PING 123 ABC\r\n"));
        assert_eq!(inbound, vec![Inbound::Control("PING 123 ABC".into())]);
    }

    #[test]
    fn test_classify_several_lines() {
        let inbound = classify(Bytes::from_static(b"PING 1 A\r\nhello\r\n"));
        assert_eq!(
            inbound,
            vec![
                Inbound::Control("PING 1 A".into()),
                Inbound::Control("hello".into())
            ]
        );
    }

    #[test]
    fn test_classify_binary() {
        let chunk = Bytes::from(vec![0xC0, 0xA8, 0x03, 0xFA, 0x80, 0xFF]);
        assert_eq!(classify(chunk.clone()), vec![Inbound::Frame(chunk)]);
    }

    #[test]
    fn test_classify_splits_padded_frames() {
        let mut data = vec![1u8; REMOTE_FRAME_SIZE];
        data.extend(vec![2u8; REMOTE_FRAME_SIZE]);

        let inbound = classify(Bytes::from(data));
        assert_eq!(inbound.len(), 2);
        assert_eq!(inbound[1], Inbound::Frame(Bytes::from(vec![2u8; REMOTE_FRAME_SIZE])));
    }

    #[test]
    fn test_parse_ping() {
        assert_eq!(
            ControlLine::parse("PING 123 ABC"),
            ControlLine::Ping {
                nonce: "123".into(),
                store_code: "ABC".into()
            }
        );
    }

    #[test]
    fn test_parse_other() {
        assert_eq!(ControlLine::parse("PING"), ControlLine::Other("PING".into()));
        assert_eq!(ControlLine::parse("PING 123"), ControlLine::Other("PING 123".into()));
        assert_eq!(ControlLine::parse("welcome"), ControlLine::Other("welcome".into()));
    }

    #[test]
    fn test_pong() {
        assert_eq!(pong("123", "ABC", "10:15:30"), "PONG 123 ABC 10:15:30\r\n");

        let line = pong_now("123", "ABC");
        assert!(line.starts_with("PONG 123 ABC "));
        assert!(line.ends_with("\r\n"));
    }
}
