//! Binary waveform block layout and descriptor parsing.
//!
//! Every `C{i}:WF? ALL` response starts with a fixed-size header: a 15-byte
//! ASCII preamble followed by the little-endian WAVEDESC descriptor block.
//! Two fields matter here: the descriptor's own length (it may carry
//! user-text and trigger-time trailers) and the sample data length. The
//! payload of signed 8-bit samples follows, closed by two line feeds.

use crate::error::{Error, Result};
use crate::transport::{ReadOutcome, ScpiTransport};

/// Total bytes to consume before the sample payload starts.
pub(crate) const SIGLENT_HEADER_SIZE: usize = 363;

/// ASCII preamble before the WAVEDESC block.
pub(crate) const DESCRIPTOR_OFFSET: usize = 15;

/// Offset of the descriptor length field inside WAVEDESC.
const DESC_LENGTH_OFFSET: usize = 36;

/// Offset of the data length field inside WAVEDESC.
const DATA_LENGTH_OFFSET: usize = 60;

/// Line feeds closing every waveform response.
pub(crate) const TERMINATOR_LEN: usize = 2;

/// The two WAVEDESC fields the block reader needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaveHeader {
    /// Descriptor block length including variable trailers, preamble
    /// excluded.
    pub desc_length: usize,
    /// Number of sample bytes that follow the descriptor.
    pub data_length: usize,
}

impl WaveHeader {
    /// Size of everything preceding the sample payload.
    pub fn block_header_size(&self) -> usize {
        self.desc_length + DESCRIPTOR_OFFSET
    }
}

/// Extract the descriptor fields from a fully received header buffer.
pub(crate) fn parse_wave_header(buf: &[u8]) -> Result<WaveHeader> {
    if buf.len() < SIGLENT_HEADER_SIZE {
        return Err(Error::MalformedHeader(format!(
            "descriptor truncated at {} bytes",
            buf.len()
        )));
    }
    let desc = &buf[DESCRIPTOR_OFFSET..];
    Ok(WaveHeader {
        desc_length: read_u32_le(desc, DESC_LENGTH_OFFSET) as usize,
        data_length: read_u32_le(desc, DATA_LENGTH_OFFSET) as usize,
    })
}

/// Read the fixed-size block header from the transport.
///
/// USBTMC hands over at most 52 payload bytes per packet, so the descriptor
/// arrives in several reads. A stall or an early end of response here is not
/// recoverable: the header either arrives whole or the block is lost.
pub(crate) fn read_header(
    transport: &mut dyn ScpiTransport,
    buf: &mut [u8],
) -> Result<WaveHeader> {
    let mut total = 0;
    while total < SIGLENT_HEADER_SIZE {
        match transport.read_data(&mut buf[total..SIGLENT_HEADER_SIZE])? {
            ReadOutcome::Stall => {
                return Err(Error::transport("read error inside wave descriptor"));
            }
            ReadOutcome::Data(0) => {
                return Err(Error::transport(format!(
                    "response ended {} bytes into the wave descriptor",
                    total
                )));
            }
            ReadOutcome::Data(n) => total += n,
        }
    }

    let header = parse_wave_header(&buf[..total])?;
    log::debug!(
        "wave descriptor: desc_length={} data_length={} (header {} bytes)",
        header.desc_length,
        header.data_length,
        header.block_header_size()
    );

    if header.data_length == 0 {
        // The scope promised a waveform but the descriptor says there is
        // none. Distinguish the clean empty response (just the two line
        // feeds) from trailing garbage.
        let mut tail = [0u8; 3];
        return match transport.read_data(&mut tail)? {
            ReadOutcome::Data(TERMINATOR_LEN) => Err(Error::EmptyWaveform),
            _ => Err(Error::MalformedHeader("zero data length".into())),
        };
    }

    Ok(header)
}

fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(desc_length: u32, data_length: u32) -> Vec<u8> {
        let mut buf = vec![0u8; SIGLENT_HEADER_SIZE];
        buf[DESCRIPTOR_OFFSET + DESC_LENGTH_OFFSET..][..4]
            .copy_from_slice(&desc_length.to_le_bytes());
        buf[DESCRIPTOR_OFFSET + DATA_LENGTH_OFFSET..][..4]
            .copy_from_slice(&data_length.to_le_bytes());
        buf
    }

    #[test]
    fn test_parse_extracts_little_endian_fields() {
        let buf = header_bytes(346, 0x0001_2345);
        let header = parse_wave_header(&buf).expect("valid header");
        assert_eq!(header.desc_length, 346);
        assert_eq!(header.data_length, 0x0001_2345);
        assert_eq!(header.block_header_size(), 361);
    }

    #[test]
    fn test_parse_rejects_short_buffers() {
        let buf = vec![0u8; SIGLENT_HEADER_SIZE - 1];
        assert!(matches!(
            parse_wave_header(&buf),
            Err(Error::MalformedHeader(_))
        ));
    }
}
