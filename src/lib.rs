//! Acquisition engine for Siglent SDS digital storage oscilloscopes.
//!
//! This crate drives an SDS-family scope over an SCPI command channel
//! (typically tunnelled through USBTMC) from "idle" through arming, trigger
//! and stop detection, binary waveform block reads for every enabled channel
//! and frame, sample decoding, and delivery on a session bus.
//!
//! Three firmware generations with divergent arming and stop semantics are
//! supported; see [`ScopeFamily`]. The transport and the packet sink are
//! injected capabilities ([`ScpiTransport`], [`SessionSink`]), so the crate
//! itself performs no device I/O and works against anything that can pass
//! SCPI lines and raw response bytes back and forth.
//!
//! # Cooperative Polling
//!
//! The engine never blocks the host for long: [`AcquisitionEngine::tick`]
//! performs one bounded step and reports whether more work is pending. Drive
//! it from an event loop on transport-readable and ~10 ms timer events.
//!
//! ```no_run
//! use siglent_sds::{lookup, AcquisitionEngine, DataSource, TickStatus};
//! # use siglent_sds::{AnalogMeaning, ChannelId, Command, ReadOutcome, Result,
//! #                   ScpiTransport, SessionSink};
//! # struct Usbtmc;
//! # impl ScpiTransport for Usbtmc {
//! #     fn send(&mut self, _: &Command<'_>) -> Result<()> { todo!() }
//! #     fn get_string(&mut self, _: &Command<'_>) -> Result<String> { todo!() }
//! #     fn read_begin(&mut self) -> Result<()> { todo!() }
//! #     fn read_data(&mut self, _: &mut [u8]) -> Result<ReadOutcome> { todo!() }
//! #     fn read_complete(&mut self) -> bool { todo!() }
//! # }
//! # struct Bus;
//! # impl SessionSink for Bus {
//! #     fn frame_begin(&mut self) {}
//! #     fn frame_end(&mut self) {}
//! #     fn analog(&mut self, _: ChannelId, _: &[f32], _: &AnalogMeaning) {}
//! #     fn logic(&mut self, _: &[u8], _: usize) {}
//! #     fn end(&mut self) {}
//! #     fn stop_acquisition(&mut self) {}
//! # }
//! let model = lookup("SDS1104X-E").expect("supported model");
//! let mut engine = AcquisitionEngine::new(model, Box::new(Usbtmc), Box::new(Bus))
//!     .with_data_source(DataSource::Screen)
//!     .with_frame_limit(1);
//!
//! engine.start()?;
//! while engine.tick(true)? == TickStatus::NeedIo {}
//! # Ok::<(), siglent_sds::Error>(())
//! ```
//!
//! # Features
//!
//! - `serde`: `Serialize`/`Deserialize` derives on the public value types.

mod command;
mod config;
mod engine;
mod error;
pub mod model;
mod session;
mod transport;
mod types;

// Crate-level error types
pub use error::{Error, Result};

// Injected capabilities
pub use session::SessionSink;
pub use transport::{ReadOutcome, ScpiTransport};

// Engine and configuration
pub use config::DeviceConfig;
pub use engine::AcquisitionEngine;

// SCPI dialect
pub use command::Command;

// Model registry
pub use model::{lookup, ScopeFamily, ScopeModel, DIGITAL_CHANNELS, MODELS};

// Core types
pub use types::{AnalogMeaning, ChannelId, DataSource, Quantity, TickStatus, Unit};
