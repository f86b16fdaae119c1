//! Static registry of supported Siglent SDS scope models.
//!
//! Pure lookup data; all behavior differences between scope generations hang
//! off [`ScopeFamily`], which the engine matches on when arming, detecting
//! stop, and fetching per-channel waveforms.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Firmware-family protocol variant of a scope series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScopeFamily {
    /// First-generation models (CML/CNL/DL). Armed externally; the engine
    /// only waits for the trigger bit.
    NonSpo,
    /// SPO-display models (SDS1000X/SDS2000X). Armed with `ARM`, stop
    /// detected through the `INR?` status register.
    Spo,
    /// X-E models. Armed with `:TRMD SINGLE`, stop detected by polling
    /// `:TRMD?`, history replay driven through `:HSMD`/`:FRAM`.
    Eseries,
}

impl ScopeFamily {
    /// Returns the display name for this family.
    pub fn display_name(&self) -> &'static str {
        match self {
            ScopeFamily::NonSpo => "non-SPO",
            ScopeFamily::Spo => "SPO",
            ScopeFamily::Eseries => "E-series",
        }
    }
}

impl fmt::Display for ScopeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Immutable descriptor of one scope model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ScopeModel {
    /// Model name as reported in the `*IDN?` response.
    pub name: &'static str,
    /// Protocol variant of the model's series.
    pub family: ScopeFamily,
    /// Number of analog input channels.
    pub analog_channels: usize,
    /// Whether the model has a logic analyzer option.
    pub has_digital: bool,
    /// Number of horizontal graticule divisions.
    pub horizontal_divs: u32,
}

/// Number of logic analyzer channels on models that have the option.
pub const DIGITAL_CHANNELS: usize = 16;

/// All supported models.
pub static MODELS: &[ScopeModel] = &[
    // First generation, 18 horizontal divisions.
    ScopeModel { name: "SDS1052CML+", family: ScopeFamily::NonSpo, analog_channels: 2, has_digital: false, horizontal_divs: 18 },
    ScopeModel { name: "SDS1102CML+", family: ScopeFamily::NonSpo, analog_channels: 2, has_digital: false, horizontal_divs: 18 },
    ScopeModel { name: "SDS1152CML+", family: ScopeFamily::NonSpo, analog_channels: 2, has_digital: false, horizontal_divs: 18 },
    ScopeModel { name: "SDS1102CNL+", family: ScopeFamily::NonSpo, analog_channels: 2, has_digital: false, horizontal_divs: 18 },
    ScopeModel { name: "SDS1202DL+", family: ScopeFamily::NonSpo, analog_channels: 2, has_digital: false, horizontal_divs: 18 },
    // SPO display generation.
    ScopeModel { name: "SDS1102X", family: ScopeFamily::Spo, analog_channels: 2, has_digital: false, horizontal_divs: 14 },
    ScopeModel { name: "SDS1202X", family: ScopeFamily::Spo, analog_channels: 2, has_digital: false, horizontal_divs: 14 },
    ScopeModel { name: "SDS2102X", family: ScopeFamily::Spo, analog_channels: 2, has_digital: true, horizontal_divs: 14 },
    ScopeModel { name: "SDS2204X", family: ScopeFamily::Spo, analog_channels: 4, has_digital: true, horizontal_divs: 14 },
    ScopeModel { name: "SDS2304X", family: ScopeFamily::Spo, analog_channels: 4, has_digital: true, horizontal_divs: 14 },
    // E-series.
    ScopeModel { name: "SDS1202X-E", family: ScopeFamily::Eseries, analog_channels: 2, has_digital: false, horizontal_divs: 14 },
    ScopeModel { name: "SDS1104X-E", family: ScopeFamily::Eseries, analog_channels: 4, has_digital: true, horizontal_divs: 14 },
    ScopeModel { name: "SDS1204X-E", family: ScopeFamily::Eseries, analog_channels: 4, has_digital: true, horizontal_divs: 14 },
];

/// Look up a model descriptor by its `*IDN?` model name.
pub fn lookup(name: &str) -> Option<&'static ScopeModel> {
    let name = name.trim();
    MODELS.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive_and_trims() {
        let model = lookup(" sds1104x-e ").expect("model known");
        assert_eq!(model.name, "SDS1104X-E");
        assert_eq!(model.family, ScopeFamily::Eseries);
        assert!(model.has_digital);
        assert_eq!(model.analog_channels, 4);
    }

    #[test]
    fn test_lookup_unknown_model_is_none() {
        assert!(lookup("SDS9999Z").is_none());
    }

    #[test]
    fn test_non_spo_series_use_eighteen_divisions() {
        for model in MODELS.iter().filter(|m| m.family == ScopeFamily::NonSpo) {
            assert_eq!(model.horizontal_divs, 18, "{}", model.name);
        }
    }
}
