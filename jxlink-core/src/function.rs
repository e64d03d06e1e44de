//! Controller function codes

use std::fmt;

/// Function code carried at offset 5 of every frame
///
/// Codes the controllers are known to use get their own variant. Anything
/// else is kept as [`FunctionCode::Unknown`] so frames still pass through
/// the bridge untouched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    // Clock reports
    TimeReport,
    SetTimeReport,

    // Device management
    InitDevice,
    SetTime,
    ReadTime,

    // Cards
    QueryAuth,
    RegisterCard,
    DeleteCard,

    // Doors
    OpenDoor,

    // Realtime watch
    PassEvent,
    EnableRealtime,
    DisableRealtime,

    // Serial settings
    SetPortRate,
    SetEndingChar,

    /// Code without a known meaning
    Unknown(u8),
}

impl FunctionCode {
    /// Registering the upstream server shares the enable-realtime code
    pub const SET_SERVER: Self = Self::EnableRealtime;

    /// Wire value
    pub fn code(self) -> u8 {
        match self {
            Self::TimeReport => 0x04,
            Self::SetTimeReport => 0x05,
            Self::InitDevice => 0x07,
            Self::SetTime => 0x30,
            Self::ReadTime => 0x32,
            Self::QueryAuth => 0x5A,
            Self::RegisterCard => 0x63,
            Self::DeleteCard => 0x64,
            Self::OpenDoor => 0x80,
            Self::PassEvent => 0x84,
            Self::EnableRealtime => 0x85,
            Self::DisableRealtime => 0x86,
            Self::SetPortRate => 0x9A,
            Self::SetEndingChar => 0x9B,
            Self::Unknown(code) => code,
        }
    }

    /// Human readable name
    pub fn name(self) -> String {
        let name = match self {
            Self::TimeReport => "Read Time",
            Self::SetTimeReport => "Set Time",
            Self::InitDevice => "Init Device",
            Self::SetTime => "Set Time",
            Self::ReadTime => "Read Time",
            Self::QueryAuth => "Query Auth",
            Self::RegisterCard => "Register Card",
            Self::DeleteCard => "Delete Card",
            Self::OpenDoor => "Open Door",
            Self::PassEvent => "Realtime Watch",
            Self::EnableRealtime => "Enable Realtime",
            Self::DisableRealtime => "Disable Realtime",
            Self::SetPortRate => "Set Port Rate",
            Self::SetEndingChar => "Set Ending Char",
            Self::Unknown(code) => return format!("Unknown(0x{:02X})", code),
        };
        name.to_string()
    }

    /// Check if the controller sends this code without being asked
    pub fn is_unsolicited(self) -> bool {
        matches!(self, Self::PassEvent)
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<u8> for FunctionCode {
    fn from(value: u8) -> Self {
        match value {
            0x04 => Self::TimeReport,
            0x05 => Self::SetTimeReport,
            0x07 => Self::InitDevice,
            0x30 => Self::SetTime,
            0x32 => Self::ReadTime,
            0x5A => Self::QueryAuth,
            0x63 => Self::RegisterCard,
            0x64 => Self::DeleteCard,
            0x80 => Self::OpenDoor,
            0x84 => Self::PassEvent,
            0x85 => Self::EnableRealtime,
            0x86 => Self::DisableRealtime,
            0x9A => Self::SetPortRate,
            0x9B => Self::SetEndingChar,
            other => Self::Unknown(other),
        }
    }
}

impl From<FunctionCode> for u8 {
    fn from(code: FunctionCode) -> u8 {
        code.code()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(_) => f.write_str(&self.name()),
            _ => write!(f, "{} (0x{:02X})", self.name(), self.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_function_code_conversion() {
        assert_eq!(u8::from(FunctionCode::OpenDoor), 0x80);
        assert_eq!(FunctionCode::from(0x80), FunctionCode::OpenDoor);
        assert_eq!(FunctionCode::from(0x84), FunctionCode::PassEvent);
    }

    #[test]
    fn test_every_byte_round_trips() {
        for value in 0..=u8::MAX {
            assert_eq!(FunctionCode::from(value).code(), value);
        }
    }

    #[test]
    fn test_unknown_code() {
        let code = FunctionCode::from(0x42);
        assert_eq!(code, FunctionCode::Unknown(0x42));
        assert!(!code.is_known());
        assert_eq!(code.name(), "Unknown(0x42)");
        assert_eq!(code.to_string(), "Unknown(0x42)");
    }

    #[test]
    fn test_display() {
        assert_eq!(FunctionCode::InitDevice.to_string(), "Init Device (0x07)");
    }

    #[test]
    fn test_set_server_alias() {
        assert_eq!(FunctionCode::SET_SERVER.code(), 0x85);
    }
}
