//! Shared test support: a minimal LZMA2 engine that understands only
//! uncompressed chunks, and builders that assemble well-formed `.xz` streams
//! byte by byte.
#![allow(dead_code)]

use crc::{Crc, CRC_32_ISO_HDLC, CRC_64_XZ};
use xzmini::{BcjFilter, Lzma2Engine, Step, XzError, XzIoBuffer};

pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
pub const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// Position inside an LZMA2 uncompressed chunk.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum ChunkState {
    Control,
    SizeHigh,
    SizeLow,
    Data,
}

/// LZMA2 engine that decodes only uncompressed chunks (control bytes 0x01
/// and 0x02). Enough to exercise the container decoder, and resumable at
/// every byte boundary like a real engine.
#[derive(Debug)]
pub struct StoredEngine {
    state: ChunkState,
    remaining: usize,
    /// Number of times `reset` was called, so tests can assert per-block
    /// re-arming.
    pub resets: usize,
}

impl StoredEngine {
    pub fn new() -> Self {
        Self {
            state: ChunkState::Control,
            remaining: 0,
            resets: 0,
        }
    }
}

impl Lzma2Engine for StoredEngine {
    fn reset(&mut self, dict_props: u8) -> Result<(), XzError> {
        // Valid dictionary size codes are 0..=40.
        if dict_props > 40 {
            return Err(XzError::UnsupportedDictionaryProperties);
        }
        self.state = ChunkState::Control;
        self.remaining = 0;
        self.resets += 1;
        Ok(())
    }

    fn run(&mut self, buf: &mut XzIoBuffer<'_>) -> Result<Step, XzError> {
        loop {
            match self.state {
                ChunkState::Control => {
                    let Some(control) = buf.read_byte() else {
                        return Ok(Step::NeedMore);
                    };
                    match control {
                        0x00 => return Ok(Step::Finished),
                        0x01 | 0x02 => self.state = ChunkState::SizeHigh,
                        _ => return Err(XzError::CorruptedData),
                    }
                }
                ChunkState::SizeHigh => {
                    let Some(byte) = buf.read_byte() else {
                        return Ok(Step::NeedMore);
                    };
                    self.remaining = usize::from(byte) << 8;
                    self.state = ChunkState::SizeLow;
                }
                ChunkState::SizeLow => {
                    let Some(byte) = buf.read_byte() else {
                        return Ok(Step::NeedMore);
                    };
                    self.remaining |= usize::from(byte);
                    self.remaining += 1;
                    self.state = ChunkState::Data;
                }
                ChunkState::Data => {
                    let amount = self
                        .remaining
                        .min(buf.input_remaining())
                        .min(buf.output_remaining());
                    if amount == 0 {
                        return Ok(Step::NeedMore);
                    }
                    buf.copy_through(amount);
                    self.remaining -= amount;
                    if self.remaining == 0 {
                        self.state = ChunkState::Control;
                    }
                }
            }
        }
    }
}

/// BCJ filter stand-in that accepts the standard branch filter IDs and
/// passes the LZMA2 output through unchanged.
#[derive(Debug, Default)]
pub struct PassthroughFilter {
    /// Filter ID the chain was last armed with, if any.
    pub armed_with: Option<u8>,
}

impl BcjFilter for PassthroughFilter {
    fn reset(&mut self, filter_id: u8) -> Result<(), XzError> {
        // 0x04 (x86) through 0x09 (SPARC).
        if !(0x04..=0x09).contains(&filter_id) {
            return Err(XzError::UnsupportedFilter(filter_id));
        }
        self.armed_with = Some(filter_id);
        Ok(())
    }

    fn run(
        &mut self,
        lzma2: &mut dyn Lzma2Engine,
        buf: &mut XzIoBuffer<'_>,
    ) -> Result<Step, XzError> {
        lzma2.run(buf)
    }
}

/// Encode a variable-length integer (little-endian base-128).
pub fn encode_vli(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    while value >= 0x80 {
        out.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
    out
}

/// Check field size in bytes for a wire Check ID.
pub fn check_len(check_id: u8) -> usize {
    usize::from([0u8, 4, 4, 4, 8, 8, 8, 16, 16, 16, 32, 32, 32, 64, 64, 64][usize::from(check_id)])
}

/// The 12-byte Stream Header for a Check ID.
pub fn stream_header(check_id: u8) -> Vec<u8> {
    let mut out = b"\xFD7zXZ\x00".to_vec();
    out.extend_from_slice(&[0x00, check_id]);
    let crc = CRC32.checksum(&out[6..8]);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// LZMA2 representation of `payload` as uncompressed chunks of at most
/// `chunk` bytes each, plus the end marker.
pub fn lzma2_store(payload: &[u8], chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut first = true;
    for piece in payload.chunks(chunk.max(1)) {
        out.push(if first { 0x01 } else { 0x02 });
        first = false;
        let size = piece.len() - 1;
        out.push((size >> 8) as u8);
        out.push((size & 0xFF) as u8);
        out.extend_from_slice(piece);
    }
    out.push(0x00);
    out
}

/// A Block Header with the single mandatory LZMA2 filter entry and optional
/// declared sizes. `dict_props` is the LZMA2 dictionary size code.
pub fn block_header(
    compressed: Option<u64>,
    uncompressed: Option<u64>,
    dict_props: u8,
) -> Vec<u8> {
    let mut flags = 0u8;
    if compressed.is_some() {
        flags |= 0x40;
    }
    if uncompressed.is_some() {
        flags |= 0x80;
    }

    let mut body = vec![0u8, flags];
    if let Some(size) = compressed {
        body.extend_from_slice(&encode_vli(size));
    }
    if let Some(size) = uncompressed {
        body.extend_from_slice(&encode_vli(size));
    }
    body.extend_from_slice(&[0x21, 0x01, dict_props]);

    // Header Padding up to (size byte encodes multiples of four, counting
    // the trailing crc32).
    while (body.len() + 4) % 4 != 0 {
        body.push(0x00);
    }
    body[0] = ((body.len() + 4) / 4 - 1) as u8;

    let crc = CRC32.checksum(&body);
    body.extend_from_slice(&crc.to_le_bytes());
    body
}

/// A Block Header declaring a leading BCJ filter entry ahead of the
/// mandatory LZMA2 one.
pub fn bcj_block_header(filter_id: u8, props_size: u8, dict_props: u8) -> Vec<u8> {
    let mut body = vec![0u8, 0x01, filter_id, props_size, 0x21, 0x01, dict_props];
    while (body.len() + 4) % 4 != 0 {
        body.push(0x00);
    }
    body[0] = ((body.len() + 4) / 4 - 1) as u8;

    let crc = CRC32.checksum(&body);
    body.extend_from_slice(&crc.to_le_bytes());
    body
}

/// Assemble a whole stream holding `payload` in one BCJ-filtered Block.
pub fn build_bcj_stream(payload: &[u8], filter_id: u8, check_id: u8) -> Vec<u8> {
    let header = bcj_block_header(filter_id, 0, 40);
    let body = lzma2_store(payload, 1 << 12);

    let mut block = header.clone();
    block.extend_from_slice(&body);
    while block.len() % 4 != 0 {
        block.push(0x00);
    }
    match check_id {
        0 => {}
        1 => block.extend_from_slice(&CRC32.checksum(payload).to_le_bytes()),
        4 => block.extend_from_slice(&CRC64.checksum(payload).to_le_bytes()),
        other => block.extend_from_slice(&vec![0xAA; check_len(other)]),
    }
    let unpadded = (header.len() + body.len() + check_len(check_id)) as u64;

    let mut out = stream_header(check_id);
    out.extend_from_slice(&block);
    let index = build_index(&[(unpadded, payload.len() as u64)]);
    out.extend_from_slice(&index);
    out.extend_from_slice(&stream_footer(index.len(), check_id));
    out
}

/// One complete Block plus its Index record (unpadded size, uncompressed
/// size).
pub struct BuiltBlock {
    pub bytes: Vec<u8>,
    pub unpadded: u64,
    pub uncompressed: u64,
}

/// Assemble one Block: header, stored LZMA2 body, Block Padding and the
/// Check field matching `check_id`.
pub fn build_block(payload: &[u8], check_id: u8, declare_sizes: bool) -> BuiltBlock {
    let body = lzma2_store(payload, 1 << 12);
    let (compressed, uncompressed) = if declare_sizes {
        (Some(body.len() as u64), Some(payload.len() as u64))
    } else {
        (None, None)
    };
    let header = block_header(compressed, uncompressed, 40);

    let mut bytes = header.clone();
    bytes.extend_from_slice(&body);
    while bytes.len() % 4 != 0 {
        bytes.push(0x00);
    }
    match check_id {
        0 => {}
        1 => bytes.extend_from_slice(&CRC32.checksum(payload).to_le_bytes()),
        4 => bytes.extend_from_slice(&CRC64.checksum(payload).to_le_bytes()),
        other => bytes.extend_from_slice(&vec![0xAA; check_len(other)]),
    }

    BuiltBlock {
        bytes,
        unpadded: (header.len() + body.len() + check_len(check_id)) as u64,
        uncompressed: payload.len() as u64,
    }
}

/// The Index for a list of (unpadded, uncompressed) records, including its
/// trailing CRC32.
pub fn build_index(records: &[(u64, u64)]) -> Vec<u8> {
    let mut out = vec![0x00];
    out.extend_from_slice(&encode_vli(records.len() as u64));
    for &(unpadded, uncompressed) in records {
        out.extend_from_slice(&encode_vli(unpadded));
        out.extend_from_slice(&encode_vli(uncompressed));
    }
    while out.len() % 4 != 0 {
        out.push(0x00);
    }
    let crc = CRC32.checksum(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// The 12-byte Stream Footer. `index_len` is the full Index size including
/// its CRC32 field.
pub fn stream_footer(index_len: usize, check_id: u8) -> Vec<u8> {
    let backward = (index_len / 4 - 1) as u32;
    let mut tail = backward.to_le_bytes().to_vec();
    tail.extend_from_slice(&[0x00, check_id]);
    let crc = CRC32.checksum(&tail);

    let mut out = crc.to_le_bytes().to_vec();
    out.extend_from_slice(&tail);
    out.extend_from_slice(b"YZ");
    out
}

/// Assemble a whole `.xz` stream holding `payloads` as one Block each.
pub fn build_stream(payloads: &[&[u8]], check_id: u8) -> Vec<u8> {
    build_stream_opts(payloads, check_id, false)
}

/// Like [`build_stream`], optionally declaring both sizes in every Block
/// Header.
pub fn build_stream_opts(payloads: &[&[u8]], check_id: u8, declare_sizes: bool) -> Vec<u8> {
    let mut out = stream_header(check_id);
    let mut records = Vec::new();
    for payload in payloads {
        let block = build_block(payload, check_id, declare_sizes);
        out.extend_from_slice(&block.bytes);
        records.push((block.unpadded, block.uncompressed));
    }
    let index = build_index(&records);
    out.extend_from_slice(&index);
    out.extend_from_slice(&stream_footer(index.len(), check_id));
    out
}

/// The concatenated payloads a stream built from `payloads` must decode to.
pub fn expected_output(payloads: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for payload in payloads {
        out.extend_from_slice(payload);
    }
    out
}
