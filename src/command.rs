//! Typed builders for the SCPI dialect spoken by SDS-family scopes.
//!
//! Commands are rendered through `Display`, so a transport can log or frame
//! them without caring which operation they encode. Analog channel arguments
//! take the zero-based index used everywhere else in the crate and render
//! one-based (`C1`..`C4`); digital channels are zero-based on the wire too.

use std::fmt;

/// One SCPI command or query understood by the acquisition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `ARM` — single-shot arm on SPO models.
    Arm,
    /// `:TRMD SINGLE` — single-shot arm on E-series models.
    TriggerModeSingle,
    /// `:TRMD?` — trigger mode query, stop detection on E-series.
    TriggerModeQuery,
    /// `:HSMD ON` / `:HSMD OFF` — history mode switch.
    HistoryMode(bool),
    /// `:HSMD?` — history mode query.
    HistoryModeQuery,
    /// `:FRAM <n>` — select a history frame (one-based cursor, E-series).
    FrameCursor(u64),
    /// `FRAM <n>` — select a history frame on SPO models.
    FrameSelect(u64),
    /// `:FRAM?` — current history frame cursor.
    FrameCursorQuery,
    /// `FPAR?` — history frame parameter block.
    FrameParamQuery,
    /// `INR?` — internal state change register.
    StatusQuery,
    /// `TDIV?` — timebase in seconds per division.
    TimebaseQuery,
    /// `TRSE?` — trigger select (type, source, hold parameters).
    TriggerSelectQuery,
    /// `{src}:TRSL?` — trigger slope of the given source.
    TriggerSlopeQuery(&'a str),
    /// `{src}:TRLV?` — trigger level of the given source.
    TriggerLevelQuery(&'a str),
    /// `C{i}:TRA?` — analog trace enable.
    AnalogEnabledQuery(usize),
    /// `C{i}:VDIV?` — vertical scale in volts per division.
    VoltsDivQuery(usize),
    /// `C{i}:OFST?` — vertical offset in volts.
    OffsetQuery(usize),
    /// `C{i}:CPL?` — input coupling.
    CouplingQuery(usize),
    /// `C{i}:ATTN?` — probe attenuation ratio.
    AttenuationQuery(usize),
    /// `DI:SW?` — logic analyzer master switch.
    DigitalMasterQuery,
    /// `D{i}:TRA?` — digital trace enable.
    DigitalEnabledQuery(usize),
    /// `SANU? C1` — analog sample count (memory depth).
    AnalogDepthQuery,
    /// `SANU? D0` — digital sample count (memory depth).
    DigitalDepthQuery,
    /// `C{i}:WF? ALL` — analog waveform fetch, descriptor plus data.
    AnalogWaveform(usize),
    /// `D{i}:WF?` — legacy digital waveform fetch.
    DigitalWaveform(usize),
    /// `D{i}:WF? DAT2` — digital waveform data fetch.
    DigitalWaveformData(usize),
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Arm => write!(f, "ARM"),
            Command::TriggerModeSingle => write!(f, ":TRMD SINGLE"),
            Command::TriggerModeQuery => write!(f, ":TRMD?"),
            Command::HistoryMode(true) => write!(f, ":HSMD ON"),
            Command::HistoryMode(false) => write!(f, ":HSMD OFF"),
            Command::HistoryModeQuery => write!(f, ":HSMD?"),
            Command::FrameCursor(n) => write!(f, ":FRAM {}", n),
            Command::FrameSelect(n) => write!(f, "FRAM {}", n),
            Command::FrameCursorQuery => write!(f, ":FRAM?"),
            Command::FrameParamQuery => write!(f, "FPAR?"),
            Command::StatusQuery => write!(f, "INR?"),
            Command::TimebaseQuery => write!(f, "TDIV?"),
            Command::TriggerSelectQuery => write!(f, "TRSE?"),
            Command::TriggerSlopeQuery(src) => write!(f, "{}:TRSL?", src),
            Command::TriggerLevelQuery(src) => write!(f, "{}:TRLV?", src),
            Command::AnalogEnabledQuery(i) => write!(f, "C{}:TRA?", i + 1),
            Command::VoltsDivQuery(i) => write!(f, "C{}:VDIV?", i + 1),
            Command::OffsetQuery(i) => write!(f, "C{}:OFST?", i + 1),
            Command::CouplingQuery(i) => write!(f, "C{}:CPL?", i + 1),
            Command::AttenuationQuery(i) => write!(f, "C{}:ATTN?", i + 1),
            Command::DigitalMasterQuery => write!(f, "DI:SW?"),
            Command::DigitalEnabledQuery(i) => write!(f, "D{}:TRA?", i),
            Command::AnalogDepthQuery => write!(f, "SANU? C1"),
            Command::DigitalDepthQuery => write!(f, "SANU? D0"),
            Command::AnalogWaveform(i) => write!(f, "C{}:WF? ALL", i + 1),
            Command::DigitalWaveform(i) => write!(f, "D{}:WF?", i),
            Command::DigitalWaveformData(i) => write!(f, "D{}:WF? DAT2", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analog_commands_render_one_based() {
        assert_eq!(Command::AnalogEnabledQuery(0).to_string(), "C1:TRA?");
        assert_eq!(Command::VoltsDivQuery(3).to_string(), "C4:VDIV?");
        assert_eq!(Command::AnalogWaveform(1).to_string(), "C2:WF? ALL");
    }

    #[test]
    fn test_digital_commands_render_zero_based() {
        assert_eq!(Command::DigitalEnabledQuery(0).to_string(), "D0:TRA?");
        assert_eq!(Command::DigitalWaveformData(9).to_string(), "D9:WF? DAT2");
        assert_eq!(Command::DigitalWaveform(3).to_string(), "D3:WF?");
    }

    #[test]
    fn test_control_commands_render_literally() {
        assert_eq!(Command::Arm.to_string(), "ARM");
        assert_eq!(Command::TriggerModeSingle.to_string(), ":TRMD SINGLE");
        assert_eq!(Command::HistoryMode(true).to_string(), ":HSMD ON");
        assert_eq!(Command::HistoryMode(false).to_string(), ":HSMD OFF");
        assert_eq!(Command::FrameCursor(10_000_000).to_string(), ":FRAM 10000000");
        assert_eq!(Command::FrameSelect(2).to_string(), "FRAM 2");
        assert_eq!(Command::AnalogDepthQuery.to_string(), "SANU? C1");
    }

    #[test]
    fn test_trigger_queries_embed_the_source() {
        assert_eq!(Command::TriggerSlopeQuery("C1").to_string(), "C1:TRSL?");
        assert_eq!(Command::TriggerLevelQuery("EX").to_string(), "EX:TRLV?");
    }
}
