//! Core value types shared across the acquisition engine.
//!
//! Provides scope-agnostic identifiers for channels and capture sources, the
//! cooperative tick status returned to the host loop, and the measurement
//! metadata attached to analog sample batches.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one capturable channel on the scope.
///
/// Analog channels are zero-indexed internally; the wire protocol addresses
/// them one-based (`C1`..`C4`). Digital (logic analyzer) channels are
/// zero-indexed both internally and on the wire (`D0`..`D15`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChannelId {
    /// Analog channel, index `0..analog_channels`.
    Analog(usize),
    /// Digital channel, index `0..16`.
    Digital(usize),
}

impl ChannelId {
    /// Returns true for digital (logic analyzer) channels.
    pub fn is_digital(&self) -> bool {
        matches!(self, ChannelId::Digital(_))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Analog(i) => write!(f, "CH{}", i + 1),
            ChannelId::Digital(i) => write!(f, "D{}", i),
        }
    }
}

/// Where a capture takes its frames from.
///
/// The source selects the arming and stop-detection path of the state
/// machine; the block read itself is identical for all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataSource {
    /// Arm the scope and capture what the screen shows.
    #[default]
    Screen,
    /// Replay frames recorded in the scope's segmented history buffer.
    History,
    /// Read whatever the scope currently holds without arming it.
    ReadOnly,
}

impl DataSource {
    /// Returns the display name for this data source.
    pub fn display_name(&self) -> &'static str {
        match self {
            DataSource::Screen => "Screen",
            DataSource::History => "History",
            DataSource::ReadOnly => "Read-only",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Result of one cooperative tick of the acquisition engine.
///
/// The host event loop keeps ticking while `NeedIo` is returned and removes
/// its poll source on `Done`. Errors are reported through the `Err` arm of
/// [`crate::Result`] instead of a status variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// The engine yielded with more work pending; tick again on the next
    /// I/O-ready or timer event.
    NeedIo,
    /// The acquisition finished and the engine is idle.
    Done,
}

/// Measured quantity of an analog sample batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Quantity {
    /// A voltage measurement.
    Voltage,
}

/// Unit of an analog sample batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Unit {
    /// Volts.
    Volt,
}

/// Measurement metadata attached to every analog sample batch.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalogMeaning {
    /// The measured quantity.
    pub quantity: Quantity,
    /// The unit the samples are expressed in.
    pub unit: Unit,
    /// Significant decimal digits, derived from the vertical scale.
    pub digits: i32,
}

impl AnalogMeaning {
    /// Volt samples with the given number of significant digits.
    pub fn volts(digits: i32) -> Self {
        Self {
            quantity: Quantity::Voltage,
            unit: Unit::Volt,
            digits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_display_is_one_based_for_analog() {
        assert_eq!(ChannelId::Analog(0).to_string(), "CH1");
        assert_eq!(ChannelId::Analog(3).to_string(), "CH4");
    }

    #[test]
    fn test_channel_display_is_zero_based_for_digital() {
        assert_eq!(ChannelId::Digital(0).to_string(), "D0");
        assert_eq!(ChannelId::Digital(15).to_string(), "D15");
    }

    #[test]
    fn test_data_source_display_uses_display_name() {
        assert_eq!(
            format!("{}", DataSource::ReadOnly),
            DataSource::ReadOnly.display_name()
        );
    }

    #[test]
    fn test_default_data_source_is_screen() {
        assert_eq!(DataSource::default(), DataSource::Screen);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_channel_id_serde_roundtrip() {
        let ch = ChannelId::Digital(9);
        let json = serde_json::to_string(&ch).expect("serialize");
        let back: ChannelId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(ch, back);
    }
}
