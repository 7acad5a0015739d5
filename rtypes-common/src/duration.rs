//! # Duration Quantization
//!
//! Purpose: Convert `Duration` values into the integral seconds or
//! milliseconds that expiry and blocking commands accept on the wire.
//!
//! ## Design Principles
//! 1. **Never Round**: Any remainder below the target unit is an error, so a
//!    1500ms expiry can never silently become 1s.
//! 2. **Pure Logic**: No I/O; callers quantize before building a command.
//! 3. **Prefer Coarse Units**: `Expiry::from_duration` uses seconds when exact
//!    and falls back to milliseconds only when needed.

use std::fmt;
use std::time::Duration;

use crate::error::{RtError, RtResult};

const NANOS_PER_MILLI: u32 = 1_000_000;

/// Largest unit count the wire protocol accepts (signed 64-bit integers).
const MAX_UNITS: u64 = i64::MAX as u64;

/// Unit a duration is quantized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Seconds,
    Milliseconds,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Seconds => write!(f, "seconds"),
            Granularity::Milliseconds => write!(f, "milliseconds"),
        }
    }
}

/// Converts `duration` into a whole number of `granularity` units.
///
/// **Logic**:
/// 1. Truncate to the integral unit count.
/// 2. Fail with `PrecisionLoss` when the truncated remainder is non-zero.
/// 3. Fail with `Argument` when the count exceeds `i64::MAX`.
pub fn quantize(duration: Duration, granularity: Granularity) -> RtResult<u64> {
    let (units, remainder) = match granularity {
        Granularity::Seconds => (u128::from(duration.as_secs()), duration.subsec_nanos()),
        Granularity::Milliseconds => (duration.as_millis(), duration.subsec_nanos() % NANOS_PER_MILLI),
    };

    if remainder != 0 {
        return Err(RtError::PrecisionLoss {
            duration,
            granularity,
        });
    }

    u64::try_from(units)
        .ok()
        .filter(|units| *units <= MAX_UNITS)
        .ok_or(RtError::Argument("duration exceeds the protocol's integer range"))
}

/// Whole seconds in `duration`, or `PrecisionLoss`.
pub fn whole_seconds(duration: Duration) -> RtResult<u64> {
    quantize(duration, Granularity::Seconds)
}

/// Whole milliseconds in `duration`, or `PrecisionLoss`.
pub fn whole_millis(duration: Duration) -> RtResult<u64> {
    quantize(duration, Granularity::Milliseconds)
}

/// A timeout ready to be sent as an expiry argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Send with a second-precision command (EXPIRE).
    Seconds(u64),
    /// Send with a millisecond-precision command (PEXPIRE).
    Milliseconds(u64),
}

impl Expiry {
    /// Picks the coarsest granularity that represents `duration` exactly.
    ///
    /// Errors are reported against millisecond granularity since that is the
    /// finest unit the protocol offers.
    pub fn from_duration(duration: Duration) -> RtResult<Self> {
        if duration.subsec_nanos() == 0 {
            return whole_seconds(duration).map(Expiry::Seconds);
        }
        whole_millis(duration).map(Expiry::Milliseconds)
    }

    /// Unit count to place on the wire.
    pub fn units(&self) -> u64 {
        match self {
            Expiry::Seconds(units) | Expiry::Milliseconds(units) => *units,
        }
    }

    /// Granularity the unit count is expressed in.
    pub fn granularity(&self) -> Granularity {
        match self {
            Expiry::Seconds(_) => Granularity::Seconds,
            Expiry::Milliseconds(_) => Granularity::Milliseconds,
        }
    }
}
