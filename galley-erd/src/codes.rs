//! ERD property codes.
//!
//! An ERD code names one readable/writable appliance property. On the wire
//! it is a 16-bit value rendered as four hex digits, with or without a
//! leading `0x` depending on which transport produced it.

use std::fmt;
use std::str::FromStr;

use crate::error::CodeParseError;

/// Identifier for a single appliance property.
///
/// Codes render as `0x5205`-style strings and parse from hex with or
/// without the `0x` prefix, in any case. Unknown codes are still valid
/// `ErdCode`s; whether a code has a known semantic type is the
/// [`Catalog`](crate::Catalog)'s concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErdCode(pub u16);

impl ErdCode {
    // Universal
    pub const MODEL_NUMBER: ErdCode = ErdCode(0x0001);
    pub const SERIAL_NUMBER: ErdCode = ErdCode(0x0002);
    pub const CLOCK_FORMAT: ErdCode = ErdCode(0x0006);
    pub const SOUND_LEVEL: ErdCode = ErdCode(0x0007);
    pub const APPLIANCE_TYPE: ErdCode = ErdCode(0x0008);
    pub const SABBATH_MODE: ErdCode = ErdCode(0x0009);
    pub const TEMPERATURE_UNIT: ErdCode = ErdCode(0x0032);

    // Oven, shared
    pub const CONVECTION_CONVERSION: ErdCode = ErdCode(0x5003);
    pub const HOUR_12_SHUTOFF_ENABLED: ErdCode = ErdCode(0x5005);
    pub const OVEN_CONFIGURATION: ErdCode = ErdCode(0x5007);
    pub const OVEN_MODE_MIN_MAX_TEMP: ErdCode = ErdCode(0x5008);

    // Upper oven
    pub const UPPER_OVEN_COOK_MODE: ErdCode = ErdCode(0x5200);
    pub const UPPER_OVEN_CURRENT_STATE: ErdCode = ErdCode(0x5201);
    pub const UPPER_OVEN_DELAY_TIME_REMAINING: ErdCode = ErdCode(0x5202);
    pub const UPPER_OVEN_ELAPSED_COOK_TIME: ErdCode = ErdCode(0x5203);
    pub const UPPER_OVEN_COOK_TIME_REMAINING: ErdCode = ErdCode(0x5204);
    pub const UPPER_OVEN_KITCHEN_TIMER: ErdCode = ErdCode(0x5205);
    pub const UPPER_OVEN_USER_TEMP_OFFSET: ErdCode = ErdCode(0x5206);
    pub const UPPER_OVEN_PROBE_PRESENT: ErdCode = ErdCode(0x5207);
    pub const UPPER_OVEN_PROBE_DISPLAY_TEMP: ErdCode = ErdCode(0x5208);
    pub const UPPER_OVEN_DISPLAY_TEMPERATURE: ErdCode = ErdCode(0x5209);
    pub const UPPER_OVEN_RAW_TEMPERATURE: ErdCode = ErdCode(0x520A);
    pub const UPPER_OVEN_REMOTE_ENABLED: ErdCode = ErdCode(0x520B);
    pub const UPPER_OVEN_AVAILABLE_COOK_MODES: ErdCode = ErdCode(0x5221);

    // Lower oven, mirroring the upper oven block
    pub const LOWER_OVEN_COOK_MODE: ErdCode = ErdCode(0x5300);
    pub const LOWER_OVEN_CURRENT_STATE: ErdCode = ErdCode(0x5301);
    pub const LOWER_OVEN_DELAY_TIME_REMAINING: ErdCode = ErdCode(0x5302);
    pub const LOWER_OVEN_ELAPSED_COOK_TIME: ErdCode = ErdCode(0x5303);
    pub const LOWER_OVEN_COOK_TIME_REMAINING: ErdCode = ErdCode(0x5304);
    pub const LOWER_OVEN_KITCHEN_TIMER: ErdCode = ErdCode(0x5305);
    pub const LOWER_OVEN_USER_TEMP_OFFSET: ErdCode = ErdCode(0x5306);
    pub const LOWER_OVEN_PROBE_PRESENT: ErdCode = ErdCode(0x5307);
    pub const LOWER_OVEN_PROBE_DISPLAY_TEMP: ErdCode = ErdCode(0x5308);
    pub const LOWER_OVEN_DISPLAY_TEMPERATURE: ErdCode = ErdCode(0x5309);
    pub const LOWER_OVEN_RAW_TEMPERATURE: ErdCode = ErdCode(0x530A);
    pub const LOWER_OVEN_REMOTE_ENABLED: ErdCode = ErdCode(0x530B);
    pub const LOWER_OVEN_AVAILABLE_COOK_MODES: ErdCode = ErdCode(0x5321);

    /// Render the code the way wire payload keys expect it: four lowercase
    /// hex digits, no `0x` prefix.
    pub fn to_wire(self) -> String {
        format!("{:04x}", self.0)
    }
}

impl fmt::Display for ErdCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl From<u16> for ErdCode {
    fn from(raw: u16) -> Self {
        ErdCode(raw)
    }
}

impl FromStr for ErdCode {
    type Err = CodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 4 {
            return Err(CodeParseError::new(s));
        }
        u16::from_str_radix(digits, 16)
            .map(ErdCode)
            .map_err(|_| CodeParseError::new(s))
    }
}
