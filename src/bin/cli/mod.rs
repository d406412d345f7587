//! Command implementations for the performance utility.

pub mod generate;
pub mod profile;

use jls::{JlsError, Result};

/// Parse a decimal argument, mapping failures to `ParameterInvalid` so the
/// caller surfaces a consistent error shape.
pub fn parse_u64(value: &str, what: &'static str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| JlsError::ParameterInvalid(what))
}

pub fn parse_u32(value: &str, what: &'static str) -> Result<u32> {
    let v = parse_u64(value, what)?;
    u32::try_from(v).map_err(|_| JlsError::ParameterInvalid(what))
}
