//! Binary-coded decimal timestamps
//!
//! Controllers exchange clock values as BCD digit pairs in the protocol
//! zone (Asia/Shanghai, a fixed UTC+08:00). Two widths are in use:
//!
//! | width   | digits           | bytes | used by                    |
//! |---------|------------------|-------|----------------------------|
//! | `Long`  | `YYYYMMDDHHmmss` | 7     | set-time command           |
//! | `Short` | `YYMMDDHHmmss`   | 6     | read-time replies, events  |
//!
//! Callers pick the width explicitly. Short years are placed in 2000-2099.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Timelike};

use crate::constants::PROTOCOL_UTC_OFFSET_SECS;
use crate::error::{Error, Result};

/// BCD timestamp layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcdWidth {
    /// `YYYYMMDDHHmmss`, 7 bytes
    Long,
    /// `YYMMDDHHmmss`, 6 bytes
    Short,
}

impl BcdWidth {
    /// Encoded size in bytes
    pub fn len(self) -> usize {
        match self {
            Self::Long => 7,
            Self::Short => 6,
        }
    }
}

/// Timezone every controller timestamp is expressed in
pub fn protocol_zone() -> FixedOffset {
    match FixedOffset::east_opt(PROTOCOL_UTC_OFFSET_SECS) {
        Some(zone) => zone,
        None => unreachable!("protocol offset is within a day"),
    }
}

/// Pack a value in 0..=99 into one BCD byte
pub fn to_bcd(value: u8) -> Result<u8> {
    if value > 99 {
        return Err(Error::InvalidDate(format!("{} does not fit two BCD digits", value)));
    }
    Ok(((value / 10) << 4) | (value % 10))
}

/// Unpack one BCD byte
pub fn from_bcd(byte: u8) -> Result<u8> {
    let (hi, lo) = (byte >> 4, byte & 0x0F);
    if hi > 9 || lo > 9 {
        return Err(Error::InvalidBcd(byte));
    }
    Ok(hi * 10 + lo)
}

/// Encode a date-time in the protocol zone
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use jxlink_core::bcd::{self, BcdWidth};
///
/// let time = Utc.with_ymd_and_hms(2024, 3, 9, 0, 30, 15).unwrap();
/// let bytes = bcd::encode(&time, BcdWidth::Long).unwrap();
/// assert_eq!(bytes, [0x20, 0x24, 0x03, 0x09, 0x08, 0x30, 0x15]);
/// ```
pub fn encode<Tz: TimeZone>(time: &DateTime<Tz>, width: BcdWidth) -> Result<Vec<u8>> {
    let local = time.with_timezone(&protocol_zone());
    let year = local.year();

    let mut out = Vec::with_capacity(width.len());
    match width {
        BcdWidth::Long => {
            if !(0..=9999).contains(&year) {
                return Err(Error::InvalidDate(format!("year {} out of range", year)));
            }
            out.push(to_bcd((year / 100) as u8)?);
            out.push(to_bcd((year % 100) as u8)?);
        }
        BcdWidth::Short => {
            if !(2000..=2099).contains(&year) {
                return Err(Error::InvalidDate(format!(
                    "year {} cannot be written with two digits",
                    year
                )));
            }
            out.push(to_bcd((year - 2000) as u8)?);
        }
    }

    for field in [
        local.month(),
        local.day(),
        local.hour(),
        local.minute(),
        local.second(),
    ] {
        out.push(to_bcd(field as u8)?);
    }

    Ok(out)
}

/// Decode a date-time from the first `width.len()` bytes
pub fn decode(bytes: &[u8], width: BcdWidth) -> Result<DateTime<FixedOffset>> {
    let bytes = bytes.get(..width.len()).ok_or(Error::FrameTooShort {
        expected: width.len(),
        actual: bytes.len(),
    })?;

    let digits = bytes
        .iter()
        .map(|&b| from_bcd(b))
        .collect::<Result<Vec<u8>>>()?;

    let (year, rest) = match width {
        BcdWidth::Long => (digits[0] as i32 * 100 + digits[1] as i32, &digits[2..]),
        BcdWidth::Short => (2000 + digits[0] as i32, &digits[1..]),
    };

    let invalid = || Error::InvalidDate(format!("{:02X?}", bytes));

    let naive = NaiveDate::from_ymd_opt(year, rest[0] as u32, rest[1] as u32)
        .and_then(|date| date.and_hms_opt(rest[2] as u32, rest[3] as u32, rest[4] as u32))
        .ok_or_else(invalid)?;

    protocol_zone()
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(invalid)
}

/// Encode a calendar date as `YYMMDD`
pub fn encode_date(date: NaiveDate) -> Result<[u8; 3]> {
    let year = date.year();
    if !(2000..=2099).contains(&year) {
        return Err(Error::InvalidDate(format!(
            "year {} cannot be written with two digits",
            year
        )));
    }
    Ok([
        to_bcd((year - 2000) as u8)?,
        to_bcd(date.month() as u8)?,
        to_bcd(date.day() as u8)?,
    ])
}
