//! Session bus seam: where decoded capture data is delivered.
//!
//! The engine pushes packets into an injected [`SessionSink`]; the session
//! front-end that routes them to files, plots or downstream consumers stays
//! outside this crate. Ordering is guaranteed per frame: `frame_begin`
//! strictly precedes any data packet of that frame, `frame_end` strictly
//! follows, and frame N+1 begins only after frame N ended.

use crate::types::{AnalogMeaning, ChannelId};

/// Sink for the packets produced during an acquisition.
///
/// The engine never calls the sink while a transport operation is
/// outstanding, so implementations may talk back to the engine's owner
/// without re-entrancy hazards.
pub trait SessionSink {
    /// A new frame starts.
    fn frame_begin(&mut self);

    /// The current frame is complete (or was cut short by an error).
    fn frame_end(&mut self);

    /// One batch of calibrated analog samples for `channel`.
    ///
    /// Batches arrive in capture order; a channel's batches within one frame
    /// concatenate to the full waveform.
    fn analog(&mut self, channel: ChannelId, samples: &[f32], meaning: &AnalogMeaning);

    /// One frame worth of logic analyzer data, bit-packed with `unit_size`
    /// bytes per sample point (low bank first, then high bank).
    fn logic(&mut self, data: &[u8], unit_size: usize);

    /// The acquisition ended; no further packets will arrive.
    fn end(&mut self);

    /// The engine released the device. Idempotent; the host uses this to
    /// unhook its poll source.
    fn stop_acquisition(&mut self);
}
