//! Shared test harness: a scripted SCPI transport and a recording session
//! sink, so the full engine can be driven without hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use siglent_sds::{
    AnalogMeaning, ChannelId, Command, Error, ReadOutcome, Result, ScpiTransport, SessionSink,
};

/// One step of a scripted response stream.
#[derive(Debug, Clone)]
pub enum ReadStep {
    /// Hand these bytes to the engine (split across calls when its buffer is
    /// smaller).
    Bytes(Vec<u8>),
    /// Report one transient stall.
    Stall,
}

/// Transport double that replays canned query replies and response streams.
///
/// Query replies are looked up by the rendered command text, first from a
/// per-query FIFO and then from a sticky fallback. Response streams are
/// armed by the `send` of their fetch command and drained through
/// `read_begin`/`read_data`, mimicking the USBTMC read path.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: HashMap<String, VecDeque<String>>,
    sticky: HashMap<String, String>,
    streams: HashMap<String, VecDeque<Vec<ReadStep>>>,
    pending: Option<Vec<ReadStep>>,
    current: VecDeque<ReadStep>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to everything sent, rendered to wire form.
    pub fn sent_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }

    /// Fallback reply for a query, reused every time its FIFO is empty.
    pub fn sticky(&mut self, query: &str, reply: &str) -> &mut Self {
        self.sticky.insert(query.to_string(), reply.to_string());
        self
    }

    /// Queue one reply for a query, consumed before the sticky fallback.
    pub fn push_reply(&mut self, query: &str, reply: &str) -> &mut Self {
        self.replies
            .entry(query.to_string())
            .or_default()
            .push_back(reply.to_string());
        self
    }

    /// Queue one response stream for a fetch command; each `send` of that
    /// command consumes the next stream.
    pub fn push_stream(&mut self, command: &str, steps: Vec<ReadStep>) -> &mut Self {
        self.streams
            .entry(command.to_string())
            .or_default()
            .push_back(steps);
        self
    }
}

impl ScpiTransport for ScriptedTransport {
    fn send(&mut self, cmd: &Command<'_>) -> Result<()> {
        let rendered = cmd.to_string();
        self.sent.lock().unwrap().push(rendered.clone());
        if let Some(stream) = self.streams.get_mut(&rendered).and_then(|q| q.pop_front()) {
            self.pending = Some(stream);
        }
        Ok(())
    }

    fn get_string(&mut self, query: &Command<'_>) -> Result<String> {
        let rendered = query.to_string();
        self.sent.lock().unwrap().push(rendered.clone());
        if let Some(reply) = self.replies.get_mut(&rendered).and_then(|q| q.pop_front()) {
            return Ok(reply);
        }
        if let Some(reply) = self.sticky.get(&rendered) {
            return Ok(reply.clone());
        }
        Err(Error::transport(format!("unscripted query {:?}", rendered)))
    }

    fn read_begin(&mut self) -> Result<()> {
        if let Some(stream) = self.pending.take() {
            self.current = stream.into();
        }
        Ok(())
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        match self.current.front_mut() {
            None => Ok(ReadOutcome::Data(0)),
            Some(ReadStep::Stall) => {
                self.current.pop_front();
                Ok(ReadOutcome::Stall)
            }
            Some(ReadStep::Bytes(bytes)) => {
                let n = buf.len().min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                bytes.drain(..n);
                if bytes.is_empty() {
                    self.current.pop_front();
                }
                Ok(ReadOutcome::Data(n))
            }
        }
    }

    fn read_complete(&mut self) -> bool {
        self.current.is_empty()
    }
}

/// Everything the engine pushed onto the session bus, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    FrameBegin,
    FrameEnd,
    Analog {
        channel: ChannelId,
        samples: Vec<f32>,
        digits: i32,
    },
    Logic {
        data: Vec<u8>,
        unit_size: usize,
    },
    End,
    Stopped,
}

/// Session sink double that records every packet.
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Packet>>>,
}

impl RecordingSink {
    pub fn new() -> (Self, Arc<Mutex<Vec<Packet>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: Arc::clone(&events),
            },
            events,
        )
    }
}

impl SessionSink for RecordingSink {
    fn frame_begin(&mut self) {
        self.events.lock().unwrap().push(Packet::FrameBegin);
    }

    fn frame_end(&mut self) {
        self.events.lock().unwrap().push(Packet::FrameEnd);
    }

    fn analog(&mut self, channel: ChannelId, samples: &[f32], meaning: &AnalogMeaning) {
        self.events.lock().unwrap().push(Packet::Analog {
            channel,
            samples: samples.to_vec(),
            digits: meaning.digits,
        });
    }

    fn logic(&mut self, data: &[u8], unit_size: usize) {
        self.events.lock().unwrap().push(Packet::Logic {
            data: data.to_vec(),
            unit_size,
        });
    }

    fn end(&mut self) {
        self.events.lock().unwrap().push(Packet::End);
    }

    fn stop_acquisition(&mut self) {
        self.events.lock().unwrap().push(Packet::Stopped);
    }
}

// =============================================================================
// Block builders
// =============================================================================

/// Size of the fixed waveform response header.
pub const HEADER_SIZE: usize = 363;

/// USBTMC hands over at most this many payload bytes per packet.
pub const USBTMC_CHUNK: usize = 52;

/// Build a waveform response header announcing `data_length` sample bytes.
pub fn wave_header(desc_length: u32, data_length: u32) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_SIZE];
    buf[15 + 36..15 + 40].copy_from_slice(&desc_length.to_le_bytes());
    buf[15 + 60..15 + 64].copy_from_slice(&data_length.to_le_bytes());
    buf
}

/// A complete, well-formed analog waveform response stream, with the header
/// delivered in USBTMC-sized pieces.
pub fn wave_block(payload: &[u8]) -> Vec<ReadStep> {
    let mut steps = header_steps(payload.len() as u32);
    steps.push(ReadStep::Bytes(payload.to_vec()));
    steps.push(ReadStep::Bytes(b"\n\n".to_vec()));
    steps
}

/// A response whose descriptor promises `data_length` bytes but whose data
/// stream carries only the terminator.
pub fn promised_but_empty_block(data_length: u32) -> Vec<ReadStep> {
    let mut steps = header_steps(data_length);
    steps.push(ReadStep::Bytes(b"\n\n".to_vec()));
    steps
}

/// Header of a well-formed response, split into USBTMC-sized pieces.
pub fn header_steps(data_length: u32) -> Vec<ReadStep> {
    wave_header(346, data_length)
        .chunks(USBTMC_CHUNK)
        .map(|c| ReadStep::Bytes(c.to_vec()))
        .collect()
}

/// A digital waveform response: 15 header bytes, then one byte per eight
/// samples.
pub fn digital_block(payload: &[u8]) -> Vec<ReadStep> {
    let mut bytes = vec![0u8; 15];
    bytes.extend_from_slice(payload);
    vec![ReadStep::Bytes(bytes)]
}

/// A 200-byte `FPAR?` frame parameter block reporting `frames` frames.
pub fn frame_param_block(frames: u32) -> Vec<ReadStep> {
    let mut bytes = vec![0u8; 200];
    bytes[40..44].copy_from_slice(&frames.to_le_bytes());
    vec![ReadStep::Bytes(bytes)]
}

// =============================================================================
// Canned configurations
// =============================================================================

/// Script the configuration queries of a two-channel scope with C1 enabled
/// at 1 V/div, no logic analyzer, 1 ms/div and a small memory depth.
pub fn two_channel_config(t: &mut ScriptedTransport) {
    t.sticky("C1:TRA?", "ON");
    t.sticky("C2:TRA?", "OFF");
    t.sticky("TDIV?", "1.00E-03");
    t.sticky("C1:ATTN?", "1");
    t.sticky("C2:ATTN?", "1");
    t.sticky("C1:VDIV?", "1.00E+00");
    t.sticky("C2:VDIV?", "1.00E+00");
    t.sticky("C1:OFST?", "0.00E+00");
    t.sticky("C2:OFST?", "0.00E+00");
    t.sticky("C1:CPL?", "D1M");
    t.sticky("C2:CPL?", "D1M");
    t.sticky("TRSE?", "EDGE,SR,C1,HT,0.00us");
    t.sticky("C1:TRSL?", "POS");
    t.sticky("C1:TRLV?", "0.00E+00");
    t.sticky("SANU? C1", "16");
}

/// Script a four-channel logic-analyzer scope with every analog channel off
/// and digital channels D0 and D9 enabled at a depth of 8 samples.
pub fn logic_analyzer_config(t: &mut ScriptedTransport) {
    for i in 1..=4 {
        t.sticky(&format!("C{}:TRA?", i), "OFF");
        t.sticky(&format!("C{}:ATTN?", i), "1");
        t.sticky(&format!("C{}:VDIV?", i), "1.00E+00");
        t.sticky(&format!("C{}:OFST?", i), "0.00E+00");
        t.sticky(&format!("C{}:CPL?", i), "D1M");
    }
    t.sticky("DI:SW?", "ON");
    for i in 0..16 {
        let on = i == 0 || i == 9;
        t.sticky(&format!("D{}:TRA?", i), if on { "ON" } else { "OFF" });
    }
    t.sticky("TDIV?", "1.00E-03");
    t.sticky("TRSE?", "EDGE,SR,C1,HT,0.00us");
    t.sticky("C1:TRSL?", "POS");
    t.sticky("C1:TRLV?", "0.00E+00");
    t.sticky("SANU? C1", "16");
    t.sticky("SANU? D0", "8");
}
