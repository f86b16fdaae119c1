//! SCPI transport seam consumed by the acquisition engine.
//!
//! The engine never opens a device itself; the host injects something that
//! speaks SCPI over USBTMC (or serial, VXI-11, ...) and implements
//! [`ScpiTransport`]. The key contract is [`ReadOutcome`]: USBTMC caps reads
//! at the 64-byte packet size and the scope's internal send buffer runs dry
//! every 61440 bytes, which surfaces as a transient failed read while the
//! buffer refills. Implementations must report that condition as
//! [`ReadOutcome::Stall`] so the engine can retry, and reserve `Err` for
//! unrecoverable transport faults.

use crate::command::Command;
use crate::error::{Error, Result};

/// Result of one [`ScpiTransport::read_data`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were read into the buffer. `Data(0)` means the current
    /// response is exhausted. A `Data(2)` with no payload read before it is
    /// an empty waveform: the two line feeds that terminate every response.
    Data(usize),
    /// The read failed transiently (USBTMC buffer refill). Retry shortly.
    Stall,
}

/// Capability injected by the host: a command channel to one scope.
///
/// All methods are synchronous; the engine bounds how much it requests per
/// tick. Query helpers have default implementations on top of
/// [`get_string`](Self::get_string), so a transport only has to provide the
/// raw command, string and block-read primitives.
pub trait ScpiTransport {
    /// Send a line-terminated ASCII command.
    fn send(&mut self, cmd: &Command<'_>) -> Result<()>;

    /// Send a query and return the reply as a string.
    fn get_string(&mut self, query: &Command<'_>) -> Result<String>;

    /// Arm the transport to receive a response block.
    fn read_begin(&mut self) -> Result<()>;

    /// Read up to `buf.len()` bytes of the current response.
    fn read_data(&mut self, buf: &mut [u8]) -> Result<ReadOutcome>;

    /// True once the current response is fully drained.
    fn read_complete(&mut self) -> bool;

    /// Send a query and parse the reply as an integer.
    fn get_int(&mut self, query: &Command<'_>) -> Result<i32> {
        let reply = self.get_string(query)?;
        reply
            .trim()
            .parse()
            .map_err(|_| Error::protocol(format!("unparsable integer reply: {:?}", reply)))
    }

    /// Send a query and parse the reply as a float.
    fn get_float(&mut self, query: &Command<'_>) -> Result<f32> {
        let reply = self.get_string(query)?;
        reply
            .trim()
            .parse()
            .map_err(|_| Error::protocol(format!("unparsable float reply: {:?}", reply)))
    }

    /// Send a query and parse the reply as a boolean.
    fn get_bool(&mut self, query: &Command<'_>) -> Result<bool> {
        let reply = self.get_string(query)?;
        parse_scpi_bool(&reply)
            .ok_or_else(|| Error::protocol(format!("unparsable boolean reply: {:?}", reply)))
    }
}

/// Parse the boolean spellings SDS firmware uses in replies.
fn parse_scpi_bool(reply: &str) -> Option<bool> {
    let reply = reply.trim();
    if reply.eq_ignore_ascii_case("on")
        || reply.eq_ignore_ascii_case("true")
        || reply.eq_ignore_ascii_case("yes")
        || reply == "1"
    {
        Some(true)
    } else if reply.eq_ignore_ascii_case("off")
        || reply.eq_ignore_ascii_case("false")
        || reply.eq_ignore_ascii_case("no")
        || reply == "0"
    {
        Some(false)
    } else {
        None
    }
}
