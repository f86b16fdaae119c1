//! The acquisition engine: a cooperative state machine that drives one scope
//! from arming through trigger, per-channel block reads and frame sequencing.
//!
//! # Cooperative Model
//!
//! The engine owns no threads. The host event loop calls
//! [`AcquisitionEngine::tick`] on I/O-ready or ~10 ms timer events; every
//! tick performs a bounded amount of work (one wait-predicate resolution,
//! one descriptor read, or one payload chunk of at most 10 KiB, plus at most
//! one short sleep) and returns [`TickStatus::NeedIo`] until the frame limit
//! is reached.
//!
//! # Transport Quirks
//!
//! USBTMC never returns more than 64 bytes per read, and the scope's 61440
//! byte send buffer surfaces a transient read failure every time it
//! refills. The payload pump treats those stalls as retryable (5 attempts,
//! 1 ms apart) and only escalates to [`Error::Transport`] when the budget is
//! spent. A block that was promised but arrives as a bare terminator is
//! retried on a slower schedule (5 attempts, 100 ms apart) and then skipped.

mod block;
mod decode;

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, trace, warn};

use crate::command::Command;
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::model::{ScopeFamily, ScopeModel, DIGITAL_CHANNELS};
use crate::session::SessionSink;
use crate::transport::{ReadOutcome, ScpiTransport};
use crate::types::{ChannelId, DataSource, TickStatus};

/// `INR?` value once the scope armed and waits for a trigger.
const DEVICE_STATE_TRIG_RDY: i32 = 8192;

/// `INR?` value once the scope armed and already captured data.
const DEVICE_STATE_DATA_TRIG_RDY: i32 = 8193;

/// Budget for one wait predicate before the tick gives up.
const WAIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Pause between wait-predicate polls, in microseconds.
const WAIT_POLL_US: u64 = 10_000;

/// Upper bound on payload bytes consumed per tick.
const PAYLOAD_BUDGET: usize = 10_240;

/// Retries per block before a stall or empty waveform becomes fatal.
const MAX_RETRIES: u32 = 5;

/// Pause after a USBTMC refill stall, in microseconds.
const STALL_RETRY_US: u64 = 1_000;

/// Pause before re-requesting a promised-but-missing waveform.
const EMPTY_RETRY_US: u64 = 100_000;

/// Bytes per sample point on the logic output: low bank, high bank.
const LOGIC_UNIT_SIZE: usize = 2;

/// What the state machine is waiting for before it can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitEvent {
    /// Nothing; proceed with the current block.
    None,
    /// Trigger bit in `INR?`.
    Trigger,
    /// Next channel block: re-issue the fetch command first.
    Block,
    /// Scope reaching its stopped state.
    Stop,
}

/// Progress of one analog block after a payload tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockProgress {
    /// Block incomplete; tick again.
    Yield,
    /// Block complete, terminator consumed.
    Complete,
    /// Channel abandoned after repeated empty waveforms.
    Abandoned,
}

/// Mutable per-capture state. Created at start, dropped at stop.
#[derive(Debug)]
struct CaptureState {
    wait_event: WaitEvent,
    wait_status: u8,
    num_frames: u64,
    limit_frames: u64,
    enabled_channels: Vec<ChannelId>,
    channel_cursor: usize,
    /// Expected payload bytes of the current block.
    num_samples: usize,
    /// Payload bytes received so far.
    num_block_bytes: usize,
    /// Successful reads within the current block.
    num_block_read: usize,
    num_header_bytes: usize,
    block_header_size: usize,
    retry_count: u32,
    /// E-series history replay opened the history view and must close it.
    close_history: bool,
    /// Whether a frame-begin has been emitted without its frame-end yet.
    in_frame: bool,
    /// Staging area for header and payload bytes.
    buffer: Vec<u8>,
    /// Scratch for decoded samples, reused across chunks.
    float_buf: Vec<f32>,
    /// Interleaved logic words of the current frame.
    dig_buffer: Vec<u8>,
}

impl CaptureState {
    fn new(enabled_channels: Vec<ChannelId>, limit_frames: u64) -> Self {
        Self {
            wait_event: WaitEvent::None,
            wait_status: 0,
            num_frames: 0,
            limit_frames,
            enabled_channels,
            channel_cursor: 0,
            num_samples: 0,
            num_block_bytes: 0,
            num_block_read: 0,
            num_header_bytes: 0,
            block_header_size: 0,
            retry_count: 0,
            close_history: false,
            in_frame: false,
            buffer: vec![0u8; PAYLOAD_BUDGET],
            float_buf: Vec::new(),
            dig_buffer: Vec::new(),
        }
    }

    fn set_wait(&mut self, event: WaitEvent) {
        self.wait_event = event;
        self.wait_status = match event {
            WaitEvent::Trigger => 1,
            WaitEvent::Stop => 2,
            WaitEvent::None | WaitEvent::Block => 0,
        };
    }

    fn current_channel(&self) -> Result<ChannelId> {
        self.enabled_channels
            .get(self.channel_cursor)
            .copied()
            .ok_or_else(|| Error::protocol("channel cursor ran past the enabled channels"))
    }

    fn reset_block(&mut self) {
        self.num_header_bytes = 0;
        self.num_block_bytes = 0;
        self.num_block_read = 0;
        self.num_samples = 0;
        self.block_header_size = 0;
    }
}

/// Drives one Siglent SDS scope through a capture.
///
/// The transport and the session sink are injected capabilities; the engine
/// holds no global state and no back-references. See the crate docs for the
/// host-loop contract.
pub struct AcquisitionEngine {
    transport: Box<dyn ScpiTransport>,
    sink: Box<dyn SessionSink>,
    model: &'static ScopeModel,
    data_source: DataSource,
    frame_limit: u64,
    config: DeviceConfig,
    capture: Option<CaptureState>,
}

impl AcquisitionEngine {
    /// Create an idle engine for the given model.
    pub fn new(
        model: &'static ScopeModel,
        transport: Box<dyn ScpiTransport>,
        sink: Box<dyn SessionSink>,
    ) -> Self {
        Self {
            transport,
            sink,
            model,
            data_source: DataSource::Screen,
            frame_limit: 1,
            config: DeviceConfig::new(model),
            capture: None,
        }
    }

    /// Select where frames are taken from (builder style).
    pub fn with_data_source(mut self, source: DataSource) -> Self {
        self.data_source = source;
        self
    }

    /// Set the number of frames to capture (builder style).
    ///
    /// `0` means "all available" and is only meaningful for
    /// [`DataSource::History`], where the device reports the frame count.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = frames;
        self
    }

    /// The model this engine drives.
    pub fn model(&self) -> &'static ScopeModel {
        self.model
    }

    /// The configuration snapshot of the last started acquisition.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// True while a capture is in progress.
    pub fn is_running(&self) -> bool {
        self.capture.is_some()
    }

    /// Refresh the configuration and arm the scope.
    ///
    /// On success the engine expects to be ticked; the first frame-begin has
    /// already been emitted. On failure nothing was emitted and the engine
    /// is idle again.
    pub fn start(&mut self) -> Result<()> {
        if self.capture.is_some() {
            return Err(Error::protocol("acquisition already running"));
        }

        self.config.refresh(self.transport.as_mut(), self.model)?;

        let mut channels: Vec<ChannelId> = (0..self.model.analog_channels)
            .filter(|&i| self.config.analog_enabled[i])
            .map(ChannelId::Analog)
            .collect();
        if self.config.la_enabled {
            // All enabled logic channels are fetched in one bulk pass,
            // represented by a single entry carrying the first enabled index.
            if let Some(first) = (0..DIGITAL_CHANNELS).find(|&i| self.config.digital_enabled[i]) {
                channels.push(ChannelId::Digital(first));
            }
        }
        if channels.is_empty() {
            return Err(Error::config("no channels enabled on the device"));
        }
        debug!(
            "starting {} acquisition, {} channel(s), frame limit {}",
            self.data_source, channels.len(), self.frame_limit
        );

        self.capture = Some(CaptureState::new(channels, self.frame_limit));
        if let Err(e) = self.capture_start() {
            self.capture = None;
            return Err(e);
        }
        self.sink.frame_begin();
        if let Some(cap) = self.capture.as_mut() {
            cap.in_frame = true;
        }
        Ok(())
    }

    /// Advance the state machine by one bounded step.
    ///
    /// `io_ready` is the host's hint that the event came from the transport
    /// descriptor rather than the periodic timer; both drive the same
    /// transitions. Any error tears the acquisition down (frame-end if a
    /// frame was open, then end) before it is returned.
    pub fn tick(&mut self, io_ready: bool) -> Result<TickStatus> {
        if self.capture.is_none() {
            return Ok(TickStatus::Done);
        }
        trace!("tick (io_ready: {})", io_ready);
        match self.tick_inner() {
            Ok(status) => Ok(status),
            Err(e) => {
                error!("acquisition failed: {}", e);
                self.teardown();
                Err(e)
            }
        }
    }

    /// Cancel the acquisition. Idempotent.
    ///
    /// Emits a frame-end if a frame was open, closes the E-series history
    /// view when this capture opened it, and releases the capture buffers.
    /// The scope is otherwise left in whatever run state it is in.
    pub fn stop(&mut self) {
        self.teardown();
    }

    // =========================================================================
    // State machine
    // =========================================================================

    fn tick_inner(&mut self) -> Result<TickStatus> {
        let wait = self.cap()?.wait_event;
        debug_assert!(
            !(self.model.family == ScopeFamily::Eseries && wait == WaitEvent::Trigger),
            "E-series scopes arm straight into the stop wait"
        );
        match wait {
            WaitEvent::None => {}
            WaitEvent::Trigger | WaitEvent::Stop => {
                self.wait_for_event()?;
                self.channel_start()?;
                return Ok(TickStatus::NeedIo);
            }
            WaitEvent::Block => {
                self.channel_start()?;
                return Ok(TickStatus::NeedIo);
            }
        }

        match self.cap()?.current_channel()? {
            ChannelId::Analog(i) => match self.read_analog_block(i)? {
                BlockProgress::Yield => Ok(TickStatus::NeedIo),
                BlockProgress::Complete => self.advance_channel(),
                BlockProgress::Abandoned => {
                    warn!("abandoning channel after {} empty waveforms", MAX_RETRIES);
                    self.advance_channel()
                }
            },
            ChannelId::Digital(_) => {
                self.read_digital_frame()?;
                // The bulk digital pass is always the last entry of a frame.
                self.finish_frame()
            }
        }
    }

    /// Per-family arming; runs at start and again before every frame on
    /// families that re-arm per frame.
    fn capture_start(&mut self) -> Result<()> {
        self.cap()?.retry_count = 0;
        match self.model.family {
            ScopeFamily::Spo => match self.data_source {
                DataSource::Screen => {
                    {
                        let cap = self.cap()?;
                        debug!(
                            "arming for frame {} of {}",
                            cap.num_frames + 1,
                            cap.limit_frames
                        );
                    }
                    self.transport.send(&Command::Arm)?;
                    let state = self.transport.get_int(&Command::StatusQuery)?;
                    if state == DEVICE_STATE_TRIG_RDY {
                        self.cap()?.set_wait(WaitEvent::Trigger);
                    } else if state == DEVICE_STATE_DATA_TRIG_RDY {
                        trace!("device triggered before the arm round-trip finished");
                        self.cap()?.set_wait(WaitEvent::Block);
                    } else {
                        return Err(Error::protocol(format!(
                            "device did not enter ARM mode (INR {})",
                            state
                        )));
                    }
                }
                DataSource::History => {
                    self.transport.send(&Command::FrameParamQuery)?;
                    self.transport.read_begin()?;
                    let total = read_frame_count(self.transport.as_mut())? as u64;
                    let next = {
                        let cap = self.cap()?;
                        if cap.limit_frames == 0 {
                            cap.limit_frames = total;
                        } else if cap.limit_frames > total {
                            error!(
                                "frame limit {} exceeds the {} frames buffered on the device",
                                cap.limit_frames, total
                            );
                        }
                        debug!(
                            "history frame {} of {}",
                            cap.num_frames + 1,
                            cap.limit_frames
                        );
                        cap.num_frames + 1
                    };
                    self.transport.send(&Command::FrameSelect(next))?;
                    self.channel_start()?;
                    self.cap()?.set_wait(WaitEvent::Stop);
                }
                DataSource::ReadOnly => self.cap()?.set_wait(WaitEvent::Stop),
            },
            ScopeFamily::Eseries => match self.data_source {
                DataSource::Screen => {
                    {
                        let cap = self.cap()?;
                        cap.limit_frames = 1;
                        cap.close_history = false;
                    }
                    self.transport.send(&Command::TriggerModeSingle)?;
                    self.cap()?.set_wait(WaitEvent::Stop);
                }
                DataSource::History => {
                    // A stopped scope resumes run mode when history closes;
                    // leave the view open in that case.
                    let mode = self.transport.get_string(&Command::TriggerModeQuery)?;
                    self.cap()?.close_history = mode.trim() != "STOP";

                    let hsmd = self.transport.get_string(&Command::HistoryModeQuery)?;
                    if hsmd.trim() == "OFF" {
                        self.transport.send(&Command::HistoryMode(true))?;
                    } else {
                        // History already open: `:FRAM?` only reports the
                        // cursor. Push it past the end so it clamps to the
                        // last frame.
                        self.transport.send(&Command::FrameCursor(10_000_000))?;
                    }

                    let total = self.transport.get_int(&Command::FrameCursorQuery)?;
                    if total < 1 {
                        return Err(Error::protocol("history buffer reports no frames"));
                    }
                    self.cap()?.limit_frames = total as u64;
                    self.transport.send(&Command::FrameCursor(1))?;
                    debug!("history capture with {} frames", total);
                    self.cap()?.set_wait(WaitEvent::Stop);
                }
                DataSource::ReadOnly => {
                    let cap = self.cap()?;
                    cap.close_history = false;
                    cap.limit_frames = 1;
                    cap.set_wait(WaitEvent::Stop);
                }
            },
            ScopeFamily::NonSpo => self.cap()?.set_wait(WaitEvent::Trigger),
        }
        Ok(())
    }

    /// Send the fetch command for the current channel and reset the block
    /// counters.
    fn channel_start(&mut self) -> Result<()> {
        let ch = self.cap()?.current_channel()?;
        debug!("start reading channel {}", ch);
        match self.model.family {
            ScopeFamily::NonSpo | ScopeFamily::Spo => match ch {
                ChannelId::Analog(i) => self.transport.send(&Command::AnalogWaveform(i))?,
                ChannelId::Digital(i) => self.transport.send(&Command::DigitalWaveform(i))?,
            },
            ScopeFamily::Eseries => {
                // Digital data is pulled in the bulk pass instead.
                if let ChannelId::Analog(i) = ch {
                    self.transport.send(&Command::AnalogWaveform(i))?;
                }
            }
        }
        let cap = self.cap()?;
        cap.reset_block();
        cap.set_wait(WaitEvent::None);
        Ok(())
    }

    /// Block on the pending wait predicate, polling every 10 ms with a 3 s
    /// budget so the host loop is never starved for long.
    fn wait_for_event(&mut self) -> Result<()> {
        let status = self.cap()?.wait_status;
        let start = Instant::now();
        match status {
            1 => {
                debug!("waiting for trigger");
                loop {
                    if start.elapsed() >= WAIT_TIMEOUT {
                        return Err(Error::Timeout("trigger"));
                    }
                    let inr = self.transport.get_int(&Command::StatusQuery)?;
                    if inr & 1 == 1 {
                        debug!("device triggered (INR {})", inr);
                        break;
                    }
                    sleep_us(WAIT_POLL_US);
                }
                // On mid-range timebases give the scope most of a sweep to
                // fill its acquisition buffer before pulling data.
                let tb = self.config.timebase;
                if tb < 0.51 && tb > 0.99e-6 {
                    let us = (tb as f64 * self.model.horizontal_divs as f64 * 1000.0) as u64;
                    trace!("post-trigger settle: {} us", us);
                    sleep_us(us);
                }
            }
            2 => match self.model.family {
                ScopeFamily::Eseries => {
                    debug!("waiting for stop");
                    loop {
                        if start.elapsed() >= WAIT_TIMEOUT {
                            return Err(Error::Timeout("stop"));
                        }
                        let mode = self.transport.get_string(&Command::TriggerModeQuery)?;
                        if mode.trim() == "STOP" {
                            break;
                        }
                        sleep_us(WAIT_POLL_US);
                    }
                }
                _ => {
                    // Older firmware has no reliable stop report; the
                    // acquired bit doubles as the stop indicator.
                    debug!("waiting for stop via the trigger bit");
                    loop {
                        if start.elapsed() >= WAIT_TIMEOUT {
                            return Err(Error::Timeout("stop"));
                        }
                        let inr = self.transport.get_int(&Command::StatusQuery)?;
                        if inr & 1 == 1 {
                            break;
                        }
                        sleep_us(WAIT_POLL_US);
                    }
                }
            },
            other => {
                return Err(Error::protocol(format!("unknown wait status {}", other)));
            }
        }
        Ok(())
    }

    /// One bounded step of an analog block: descriptor first, then payload
    /// chunks of at most [`PAYLOAD_BUDGET`] bytes, decoded and emitted as
    /// they arrive.
    fn read_analog_block(&mut self, ch: usize) -> Result<BlockProgress> {
        let Self {
            transport,
            sink,
            capture,
            config,
            model,
            ..
        } = self;
        let cap = capture
            .as_mut()
            .ok_or_else(|| Error::protocol("no active capture"))?;
        let transport = transport.as_mut();

        if cap.num_header_bytes < block::SIGLENT_HEADER_SIZE {
            // Fresh block: give the scope time to stage its output buffer,
            // then pull the whole descriptor.
            match model.family {
                ScopeFamily::NonSpo | ScopeFamily::Spo => {
                    // Older models prepare the buffer at CPU speed.
                    let us = (config.memory_depth_analog as f64 * 2.5) as u64;
                    trace!("pre-read settle: {} us", us);
                    sleep_us(us);
                    transport.read_begin()?;
                }
                ScopeFamily::Eseries => {
                    transport.read_begin()?;
                    let us = (config.timebase as f64
                        * model.horizontal_divs as f64
                        * 100_000.0) as u64;
                    trace!("pre-read settle: {} us", us.min(10_000));
                    sleep_us(us.min(10_000));
                }
            }
            let header = block::read_header(transport, &mut cap.buffer)?;
            cap.num_header_bytes = block::SIGLENT_HEADER_SIZE;
            cap.block_header_size = header.block_header_size();
            cap.num_samples = header.data_length;
            cap.num_block_bytes = 0;
            cap.num_block_read = 0;
            trace!(
                "expecting {} payload bytes after a {} byte descriptor",
                cap.num_samples,
                cap.block_header_size
            );
            return Ok(BlockProgress::Yield);
        }

        let remaining = cap
            .num_samples
            .checked_sub(cap.num_block_bytes)
            .ok_or_else(|| Error::protocol("received more block bytes than announced"))?;
        let budget = remaining.min(PAYLOAD_BUDGET);
        let mut got = 0usize;
        let mut abandoned = false;
        while got < budget {
            match transport.read_data(&mut cap.buffer[got..budget])? {
                ReadOutcome::Stall => {
                    if got > 0 {
                        // Pass what we already have forward; the stall is
                        // retried on the next tick.
                        break;
                    }
                    if cap.retry_count < MAX_RETRIES {
                        cap.retry_count += 1;
                        debug!(
                            "read stalled at {} block bytes, retry {}",
                            cap.num_block_bytes, cap.retry_count
                        );
                        sleep_us(STALL_RETRY_US);
                        return Ok(BlockProgress::Yield);
                    }
                    return Err(Error::transport("read stalled beyond the retry budget"));
                }
                ReadOutcome::Data(0) => {
                    return Err(Error::transport("response ended inside the data block"));
                }
                ReadOutcome::Data(n) if n == block::TERMINATOR_LEN && cap.num_block_read == 0 => {
                    // The descriptor promised data, the stream delivered only
                    // the terminator.
                    error!("promised waveform missing from the data stream");
                    if cap.retry_count < MAX_RETRIES {
                        cap.retry_count += 1;
                        sleep_us(EMPTY_RETRY_US);
                        cap.set_wait(WaitEvent::Block);
                        return Ok(BlockProgress::Yield);
                    }
                    abandoned = true;
                    break;
                }
                ReadOutcome::Data(n) => {
                    got += n;
                    cap.num_block_bytes += n;
                    cap.num_block_read += 1;
                    cap.retry_count = 0;
                }
            }
        }

        if abandoned {
            cap.retry_count = 0;
            cap.reset_block();
            return Ok(BlockProgress::Abandoned);
        }

        trace!(
            "{} of {} block bytes read",
            cap.num_block_bytes,
            cap.num_samples
        );
        if got > 0 {
            decode::decode_analog(
                &cap.buffer[..got],
                config.vdiv[ch],
                config.vert_offset[ch],
                &mut cap.float_buf,
            );
            let meaning = decode::analog_meaning(config.vdiv[ch]);
            sink.analog(ChannelId::Analog(ch), &cap.float_buf, &meaning);
        }

        if cap.num_block_bytes < cap.num_samples {
            return Ok(BlockProgress::Yield);
        }

        // Block complete: consume the two line feeds and verify the
        // response is drained.
        let mut tail = [0u8; 3];
        match transport.read_data(&mut tail)? {
            ReadOutcome::Data(n) if n == block::TERMINATOR_LEN => {}
            other => {
                error!("expected terminator, transport returned {:?}", other);
                return Err(Error::MissingTerminator);
            }
        }
        if !transport.read_complete() {
            return Err(Error::protocol("response not drained at block end"));
        }
        cap.reset_block();
        Ok(BlockProgress::Complete)
    }

    /// Fetch every enabled logic channel in one pass, transpose into the
    /// packed low/high banks and emit the frame's logic packet.
    fn read_digital_frame(&mut self) -> Result<()> {
        let Self {
            transport,
            sink,
            capture,
            config,
            ..
        } = self;
        let cap = capture
            .as_mut()
            .ok_or_else(|| Error::protocol("no active capture"))?;
        let transport = transport.as_mut();

        let depth = config.memory_depth_digital as usize;
        let mut banks = decode::LogicBanks::new(depth);
        for i in 0..DIGITAL_CHANNELS {
            if !config.digital_enabled[i] {
                continue;
            }
            debug!("fetching logic channel D{}", i);
            transport.send(&Command::DigitalWaveformData(i))?;
            transport.read_begin()?;
            let payload = read_digital_response(transport)?;
            banks.transpose_channel(i, &payload);
        }
        banks.interleave(&mut cap.dig_buffer);
        sink.logic(&cap.dig_buffer, LOGIC_UNIT_SIZE);
        Ok(())
    }

    /// Move to the next enabled channel, or close the frame if this was the
    /// last one.
    fn advance_channel(&mut self) -> Result<TickStatus> {
        {
            let cap = self.cap()?;
            cap.channel_cursor += 1;
            if cap.channel_cursor < cap.enabled_channels.len() {
                debug!("proceeding to the next channel");
                cap.set_wait(WaitEvent::Block);
                return Ok(TickStatus::NeedIo);
            }
        }
        self.finish_frame()
    }

    /// Frame boundary: emit frame-end, then either finish the acquisition or
    /// set up the next frame per family.
    fn finish_frame(&mut self) -> Result<TickStatus> {
        self.sink.frame_end();
        let (frames, limit) = {
            let cap = self.cap()?;
            cap.in_frame = false;
            cap.num_frames += 1;
            (cap.num_frames, cap.limit_frames)
        };
        if frames >= limit {
            debug!("last frame done, stopping capture");
            self.teardown();
            return Ok(TickStatus::Done);
        }

        self.cap()?.channel_cursor = 0;
        match self.model.family {
            ScopeFamily::Eseries => {
                self.transport.send(&Command::FrameCursor(frames + 1))?;
                self.sink.frame_begin();
                let cap = self.cap()?;
                cap.in_frame = true;
                cap.set_wait(WaitEvent::Block);
            }
            _ => {
                self.capture_start()?;
                self.sink.frame_begin();
                self.cap()?.in_frame = true;
            }
        }
        Ok(TickStatus::NeedIo)
    }

    /// Release the capture: frame-end if one is open, history cleanup,
    /// end-of-stream packets. Safe to call at any time.
    fn teardown(&mut self) {
        let Some(cap) = self.capture.take() else {
            return;
        };
        if cap.in_frame {
            self.sink.frame_end();
        }
        if self.model.family == ScopeFamily::Eseries
            && self.data_source == DataSource::History
            && cap.close_history
        {
            if let Err(e) = self.transport.send(&Command::HistoryMode(false)) {
                error!("failed to close history mode: {}", e);
            }
        }
        self.sink.end();
        self.sink.stop_acquisition();
    }

    fn cap(&mut self) -> Result<&mut CaptureState> {
        self.capture
            .as_mut()
            .ok_or_else(|| Error::protocol("no active capture"))
    }
}

/// Read the `FPAR?` frame parameter block and extract the frame count at
/// offset 40.
fn read_frame_count(transport: &mut dyn ScpiTransport) -> Result<u32> {
    let mut buf = [0u8; 200];
    let mut total = 0;
    while total < buf.len() {
        match transport.read_data(&mut buf[total..])? {
            ReadOutcome::Stall => {
                return Err(Error::transport("read error in the frame parameter block"));
            }
            ReadOutcome::Data(0) => break,
            ReadOutcome::Data(n) => total += n,
        }
    }
    if total < 44 {
        return Err(Error::protocol(format!(
            "frame parameter block truncated at {} bytes",
            total
        )));
    }
    Ok(u32::from_le_bytes([buf[40], buf[41], buf[42], buf[43]]))
}

/// Drain one digital waveform response and strip its 15-byte header.
fn read_digital_response(transport: &mut dyn ScpiTransport) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut retries = 0u32;
    loop {
        match transport.read_data(&mut chunk)? {
            ReadOutcome::Stall => {
                if retries >= MAX_RETRIES {
                    return Err(Error::transport("digital read stalled beyond the retry budget"));
                }
                retries += 1;
                sleep_us(STALL_RETRY_US);
            }
            ReadOutcome::Data(0) => break,
            ReadOutcome::Data(n) => {
                data.extend_from_slice(&chunk[..n]);
                retries = 0;
                if transport.read_complete() {
                    break;
                }
            }
        }
    }
    if data.len() < block::DESCRIPTOR_OFFSET {
        return Err(Error::MalformedHeader(format!(
            "digital response only {} bytes",
            data.len()
        )));
    }
    data.drain(..block::DESCRIPTOR_OFFSET);
    Ok(data)
}

fn sleep_us(us: u64) {
    if us > 0 {
        thread::sleep(Duration::from_micros(us));
    }
}
