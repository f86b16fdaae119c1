//! Cached scope state, refreshed once at acquisition start.
//!
//! The engine drives a deterministic query sequence against the device and
//! snapshots everything the capture path needs: channel enables, vertical
//! and horizontal scales, trigger setup and memory depth. The snapshot is
//! read-only for the duration of a capture.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::model::{ScopeFamily, ScopeModel, DIGITAL_CHANNELS};
use crate::transport::ScpiTransport;
use log::debug;

/// Snapshot of the device state relevant to one acquisition.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceConfig {
    /// Per analog channel: trace enabled.
    pub analog_enabled: Vec<bool>,
    /// Per digital channel: trace enabled.
    pub digital_enabled: Vec<bool>,
    /// Logic analyzer master switch.
    pub la_enabled: bool,
    /// Timebase in seconds per division.
    pub timebase: f32,
    /// Derived sample rate in samples per second.
    pub samplerate: f32,
    /// Analog memory depth in samples.
    pub memory_depth_analog: u64,
    /// Digital memory depth in samples.
    pub memory_depth_digital: u64,
    /// Per analog channel: vertical scale in volts per division.
    pub vdiv: Vec<f32>,
    /// Per analog channel: vertical offset in volts.
    pub vert_offset: Vec<f32>,
    /// Per analog channel: input coupling as reported by the scope.
    pub coupling: Vec<String>,
    /// Per analog channel: probe attenuation ratio.
    pub attenuation: Vec<f32>,
    /// Trigger source as reported in `TRSE?` (e.g. `C1`, `EX`).
    pub trigger_source: String,
    /// Trigger slope of the source.
    pub trigger_slope: String,
    /// Trigger level in volts (analog sources only).
    pub trigger_level: f32,
    /// Horizontal trigger position in seconds.
    pub horiz_triggerpos: f32,
}

impl DeviceConfig {
    /// Empty snapshot sized for the given model.
    pub fn new(model: &ScopeModel) -> Self {
        let n = model.analog_channels;
        Self {
            analog_enabled: vec![false; n],
            digital_enabled: vec![false; DIGITAL_CHANNELS],
            vdiv: vec![0.0; n],
            vert_offset: vec![0.0; n],
            coupling: vec![String::new(); n],
            attenuation: vec![1.0; n],
            ..Default::default()
        }
    }

    /// Refresh the whole snapshot from the device.
    ///
    /// Queries are issued in a fixed order; any transport failure or
    /// malformed reply aborts with [`Error::Config`].
    pub fn refresh(
        &mut self,
        transport: &mut dyn ScpiTransport,
        model: &ScopeModel,
    ) -> Result<()> {
        // Analog channel state.
        for i in 0..model.analog_channels {
            self.analog_enabled[i] =
                cfg("analog enable", transport.get_bool(&Command::AnalogEnabledQuery(i)))?;
            debug!("CH{} {}", i + 1, if self.analog_enabled[i] { "on" } else { "off" });
        }

        // Logic analyzer state.
        self.la_enabled = false;
        if model.has_digital {
            let status = cfg("LA master", transport.get_bool(&Command::DigitalMasterQuery))?;
            debug!("logic analyzer: {}", if status { "on" } else { "off" });
            if status {
                self.la_enabled = true;
                for i in 0..DIGITAL_CHANNELS {
                    self.digital_enabled[i] =
                        cfg("digital enable", transport.get_bool(&Command::DigitalEnabledQuery(i)))?;
                    debug!("D{} {}", i, if self.digital_enabled[i] { "on" } else { "off" });
                }
            } else {
                self.digital_enabled.fill(false);
            }
        }

        // Timebase.
        self.timebase = cfg("timebase", transport.get_float(&Command::TimebaseQuery))?;
        debug!("timebase: {} s/div", self.timebase);

        // Probe attenuation.
        for i in 0..model.analog_channels {
            self.attenuation[i] =
                cfg("attenuation", transport.get_float(&Command::AttenuationQuery(i)))?;
        }

        // Vertical gain and offset.
        self.refresh_vertical(transport, model)?;

        // Coupling.
        for i in 0..model.analog_channels {
            self.coupling[i] = cfg("coupling", transport.get_string(&Command::CouplingQuery(i)))?
                .trim()
                .to_string();
        }

        // Trigger setup.
        self.refresh_trigger(transport)?;

        // Memory depth and derived sample rate.
        self.refresh_horizontal(transport, model)?;

        Ok(())
    }

    /// Refresh only the vertical scales and offsets.
    ///
    /// Cheap enough to call on the fly when the host reacts to front-panel
    /// changes between acquisitions.
    pub fn refresh_vertical(
        &mut self,
        transport: &mut dyn ScpiTransport,
        model: &ScopeModel,
    ) -> Result<()> {
        for i in 0..model.analog_channels {
            self.vdiv[i] = cfg("vdiv", transport.get_float(&Command::VoltsDivQuery(i)))?;
            debug!("CH{} {} V/div", i + 1, self.vdiv[i]);
        }
        for i in 0..model.analog_channels {
            self.vert_offset[i] = cfg("offset", transport.get_float(&Command::OffsetQuery(i)))?;
            debug!("CH{} offset {} V", i + 1, self.vert_offset[i]);
        }
        Ok(())
    }

    fn refresh_trigger(&mut self, transport: &mut dyn ScpiTransport) -> Result<()> {
        let response = cfg("trigger select", transport.get_string(&Command::TriggerSelectQuery))?;
        let tokens: Vec<&str> = response.split(',').collect();
        if tokens.len() < 4 {
            return Err(Error::config(format!(
                "trigger select reply has {} fields: {:?}",
                tokens.len(),
                response
            )));
        }
        self.trigger_source = tokens[2].trim().to_string();
        debug!("trigger source: {}", self.trigger_source);

        self.horiz_triggerpos = tokens
            .get(4)
            .map(|t| decode_trigger_position(t))
            .unwrap_or(0.0);
        debug!("horizontal trigger position: {} s", self.horiz_triggerpos);

        self.trigger_slope = cfg(
            "trigger slope",
            transport.get_string(&Command::TriggerSlopeQuery(&self.trigger_source)),
        )?
        .trim()
        .to_string();
        debug!("trigger slope: {}", self.trigger_slope);

        // Trigger level only exists for analog sources.
        if self.trigger_source.starts_with('C') {
            self.trigger_level = cfg(
                "trigger level",
                transport.get_float(&Command::TriggerLevelQuery(&self.trigger_source)),
            )?;
            debug!("trigger level: {} V", self.trigger_level);
        }
        Ok(())
    }

    fn refresh_horizontal(
        &mut self,
        transport: &mut dyn ScpiTransport,
        model: &ScopeModel,
    ) -> Result<()> {
        match model.family {
            ScopeFamily::Spo | ScopeFamily::NonSpo => {
                let reply = cfg("memory depth", transport.get_string(&Command::AnalogDepthQuery))?;
                self.memory_depth_analog = parse_memory_depth(&reply)
                    .ok_or_else(|| Error::config(format!("unparsable memory depth: {:?}", reply)))?;
            }
            ScopeFamily::Eseries => {
                self.memory_depth_analog =
                    cfg("memory depth", transport.get_float(&Command::AnalogDepthQuery))? as u64;
                if self.la_enabled {
                    self.memory_depth_digital =
                        cfg("digital depth", transport.get_float(&Command::DigitalDepthQuery))?
                            as u64;
                }
            }
        }

        self.timebase = cfg("timebase", transport.get_float(&Command::TimebaseQuery))?;
        self.samplerate = self.memory_depth_analog as f32
            / (self.timebase * model.horizontal_divs as f32);
        debug!(
            "memory depth {} samples, samplerate {} Sa/s",
            self.memory_depth_analog, self.samplerate
        );
        Ok(())
    }
}

fn cfg<T>(what: &str, result: Result<T>) -> Result<T> {
    result.map_err(|e| match e {
        Error::Config(_) => e,
        other => Error::config(format!("{}: {}", what, other)),
    })
}

/// Decode the horizontal trigger position field of a `TRSE?` reply.
///
/// The suffix ratios mirror the firmware driver this engine was validated
/// against: `us` divides by 1e9 and `ns` by 1e6, swapped from their SI
/// meaning. Do not "fix" without revalidating against captures.
pub(crate) fn decode_trigger_position(token: &str) -> f32 {
    let token = token.trim();
    let (digits, divisor) = if ends_with_ignore_case(token, "us") {
        (&token[..token.len() - 2], 1e9)
    } else if ends_with_ignore_case(token, "ns") {
        (&token[..token.len() - 2], 1e6)
    } else if ends_with_ignore_case(token, "ms") {
        (&token[..token.len() - 2], 1e3)
    } else if ends_with_ignore_case(token, "s") {
        (&token[..token.len() - 1], 1.0)
    } else {
        return 0.0;
    };
    digits.trim().parse::<f32>().unwrap_or(0.0) / divisor
}

fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len() && s[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Parse a `SANU?` reply on SPO and non-SPO models.
///
/// The reply carries a `Mpts` or `Kpts` suffix. `Kpts` scales by 1e4, not
/// 1e3 — that is what the deployed firmware actually reports.
pub(crate) fn parse_memory_depth(reply: &str) -> Option<u64> {
    let reply = reply.trim();
    let (digits, scale) = if let Some(stripped) = reply.strip_suffix("Mpts") {
        (stripped, 1e6)
    } else if let Some(stripped) = reply.strip_suffix("Kpts") {
        (stripped, 1e4)
    } else {
        (reply, 1.0)
    };
    digits.trim().parse::<f32>().ok().map(|v| (v * scale) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_position_suffix_ratios() {
        assert_eq!(decode_trigger_position("2.00us"), 2.0 / 1e9);
        assert_eq!(decode_trigger_position("5.00ns"), 5.0 / 1e6);
        assert_eq!(decode_trigger_position("1.50ms"), 1.5 / 1e3);
        assert_eq!(decode_trigger_position("0.25s"), 0.25);
    }

    #[test]
    fn test_trigger_position_without_suffix_is_zero() {
        assert_eq!(decode_trigger_position("HT"), 0.0);
        assert_eq!(decode_trigger_position(""), 0.0);
    }

    #[test]
    fn test_memory_depth_suffix_scaling() {
        assert_eq!(parse_memory_depth("14Mpts"), Some(14_000_000));
        // Kpts scales by 1e4 on the deployed firmware.
        assert_eq!(parse_memory_depth("28Kpts"), Some(280_000));
        assert_eq!(parse_memory_depth("7000"), Some(7000));
        assert_eq!(parse_memory_depth("junk"), None);
    }
}
