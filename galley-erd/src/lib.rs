//! ERD property codec for galley appliances.
//!
//! Appliances expose their state as a table of ERD properties: a 16-bit
//! code mapped to a hex-encoded value. This crate translates those raw
//! wire strings to and from typed domain values.
//!
//! # Design
//!
//! - [`ErdCode`] identifies one property; [`Catalog`] maps codes to
//!   semantic types; [`Codec`] dispatches decode/encode on that type.
//! - Unknown codes decode as opaque [`ErdValue::Raw`] bytes. The device
//!   population is open-ended; an uncataloged property is normal input,
//!   not an error.
//! - Enumerated types carry an unknown fallback variant; decoding never
//!   fails on an out-of-set wire code, and encoding a fallback variant is
//!   rejected before it can reach the wire.
//!
//! # Example
//!
//! ```rust
//! use galley_erd::{Codec, ErdCode, ErdValue};
//! use std::time::Duration;
//!
//! let codec = Codec::builtin();
//! let value = codec.decode(ErdCode::UPPER_OVEN_KITCHEN_TIMER, "002d").unwrap();
//! assert_eq!(value, ErdValue::Minutes(Some(Duration::from_secs(45 * 60))));
//! ```

pub mod catalog;
pub mod codec;
pub mod codes;
pub mod error;
pub mod values;

pub use catalog::{Catalog, ErdType};
pub use codec::Codec;
pub use codes::ErdCode;
pub use error::{CodeParseError, DecodeError, EncodeError};
pub use values::{
    ApplianceType, ErdValue, MeasurementUnits, OvenConfiguration, OvenCookMode, OvenCookSetting,
    OvenState,
};
