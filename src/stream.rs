use crate::buffer::XzIoBuffer;
use crate::check::{crc32, crc64, CheckKind};
use crate::engine::{BcjFilter, Lzma2Engine, NoBcj, Step};
use crate::error::XzError;
use crate::temp::TempBuffer;
use crate::vli::{VliDecoder, VliResult};
use crate::{STREAM_HEADER_SIZE, VLI_UNKNOWN};

/// Operation mode of the decoder.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum XzMode {
    /// The whole stream must be decoded in one `run` call. The decoder
    /// resets itself at the start of every call, and a failed call reports
    /// no consumed or produced bytes.
    SingleCall,
    /// The stream may be fed and drained incrementally across many calls.
    MultiCall,
}

/// Construction-time configuration of [`XzStreamDecoder`].
#[derive(Debug, Clone, Copy)]
pub struct XzOptions {
    /// Single-call or multi-call operation.
    pub mode: XzMode,
    /// Whether CRC64 Block Checks are verified. When false, a CRC64 stream
    /// is treated like any other unverifiable check.
    pub crc64: bool,
    /// Whether streams with an unverifiable check are decoded anyway. The
    /// check bytes are then skipped and [`XzStatus::UnsupportedCheck`] is
    /// surfaced once, right after the Stream Header.
    pub tolerate_unknown_check: bool,
}

impl Default for XzOptions {
    fn default() -> Self {
        Self {
            mode: XzMode::MultiCall,
            crc64: true,
            tolerate_unknown_check: false,
        }
    }
}

/// Successful outcome of one [`XzStreamDecoder::run`] call.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum XzStatus {
    /// More input and/or output space is needed to continue.
    NeedMore {
        /// Input bytes consumed by this call.
        read: usize,
        /// Output bytes produced by this call.
        written: usize,
    },
    /// The stream's integrity check cannot be verified; decoding continues
    /// on the next call, skipping check fields. Reported at most once per
    /// stream.
    UnsupportedCheck {
        /// The Check ID from the Stream Header.
        check_id: u8,
        /// Input bytes consumed by this call.
        read: usize,
        /// Output bytes produced by this call.
        written: usize,
    },
    /// The whole container was decoded and validated.
    StreamEnd {
        /// Input bytes consumed by this call.
        read: usize,
        /// Output bytes produced by this call.
        written: usize,
    },
}

impl XzStatus {
    /// Input bytes consumed by the call.
    #[must_use]
    pub const fn read(&self) -> usize {
        match self {
            Self::NeedMore { read, .. }
            | Self::UnsupportedCheck { read, .. }
            | Self::StreamEnd { read, .. } => *read,
        }
    }

    /// Output bytes produced by the call.
    #[must_use]
    pub const fn written(&self) -> usize {
        match self {
            Self::NeedMore { written, .. }
            | Self::UnsupportedCheck { written, .. }
            | Self::StreamEnd { written, .. } => *written,
        }
    }

    /// True once the stream has been fully decoded and validated.
    #[must_use]
    pub const fn is_stream_end(&self) -> bool {
        matches!(self, Self::StreamEnd { .. })
    }

    /// True if the call consumed input or produced output.
    #[must_use]
    pub const fn made_progress(&self) -> bool {
        self.read() != 0 || self.written() != 0
    }
}

/// Position in the top-level state machine.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Phase {
    /// Staging and validating the 12-byte Stream Header.
    StreamHeader,
    /// Peeking the byte that is either a Block Header size or the Index
    /// indicator.
    BlockStart,
    /// Staging and parsing a Block Header.
    BlockHeader,
    /// Pumping the Block body through the LZMA2 engine (and BCJ filter).
    BlockUncompress,
    /// Consuming zero bytes up to 4-byte alignment after the Block body.
    BlockPadding,
    /// Validating (or skipping) the Block Check field.
    BlockCheck,
    /// Decoding the Index record VLIs.
    Index,
    /// Consuming zero bytes up to 4-byte alignment after the Index records.
    IndexPadding,
    /// Validating the Index's trailing CRC32.
    IndexCrc32,
    /// Staging and validating the 12-byte Stream Footer.
    StreamFooter,
}

/// Result of one pass through the state machine loop.
enum MainStatus {
    /// Out of input or output space; resume on the next call.
    NeedMore,
    /// Tolerated unverifiable check, surfaced once (carries the Check ID).
    UnsupportedCheck(u8),
    /// The Stream Footer validated; the container is done.
    StreamEnd,
}

/// Accumulating triple used to cross-check the Index against the Blocks
/// actually decoded. One instance grows per Block, the other per Index
/// record; a valid stream ends with both identical.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
struct BlockHash {
    /// Sum of Unpadded Sizes.
    unpadded: u64,
    /// Sum of Uncompressed Sizes.
    uncompressed: u64,
    /// Chained CRC32 over the triple itself, refolded after every addition.
    crc32: u32,
}

impl BlockHash {
    /// Refold the CRC32 over the whole triple, chained onto its prior value.
    /// The triple is serialized little-endian so the value is the same on
    /// every target.
    fn fold_crc32(&mut self) {
        let mut buf = [0u8; 20];
        buf[..8].copy_from_slice(&self.unpadded.to_le_bytes());
        buf[8..16].copy_from_slice(&self.uncompressed.to_le_bytes());
        buf[16..].copy_from_slice(&self.crc32.to_le_bytes());
        self.crc32 = crc32(self.crc32, &buf);
    }
}

/// Sizes parsed from the current Block Header.
#[derive(Debug, Clone, Copy, Default)]
struct BlockHeaderInfo {
    /// Declared Compressed Size, or [`VLI_UNKNOWN`] when absent.
    compressed: u64,
    /// Declared Uncompressed Size, or [`VLI_UNKNOWN`] when absent.
    uncompressed: u64,
    /// Size of the whole Block Header field in bytes.
    size: usize,
}

/// Running totals collected while decoding Blocks.
#[derive(Debug, Clone, Copy, Default)]
struct BlockTally {
    /// Observed compressed size of the current Block.
    compressed: u64,
    /// Observed uncompressed size of the current Block.
    uncompressed: u64,
    /// Blocks decoded so far.
    count: u64,
    /// Zero bytes still owed by the current Block Padding field.
    padding: u32,
    /// Hash over all completed Blocks, compared against the Index at the end.
    hash: BlockHash,
}

/// Sub-position inside the Index record decoder.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
enum IndexStage {
    /// Expecting the Number of Records.
    #[default]
    Count,
    /// Expecting a record's Unpadded Size.
    Unpadded,
    /// Expecting a record's Uncompressed Size.
    Uncompressed,
}

/// State of the Index decoder.
#[derive(Debug, Clone, Copy, Default)]
struct IndexTally {
    /// Which VLI comes next.
    stage: IndexStage,
    /// Index bytes seen so far (indicator, records and padding; never the
    /// trailing CRC32 field).
    size: u64,
    /// Records still to decode.
    remaining: u64,
    /// Hash over the decoded records, compared against [`BlockTally::hash`].
    hash: BlockHash,
}

/// Resumable `.xz` container decoder.
///
/// `E` is the external LZMA2 engine; `F` an optional byte-conversion filter.
/// A decoder built with [`XzStreamDecoder::new`] has no filter support and
/// rejects streams whose Block Headers request one.
///
/// The decoder is single-threaded and non-reentrant: all resume state lives
/// in this struct, nothing survives on the call stack between `run` calls.
#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct XzStreamDecoder<E: Lzma2Engine, F: BcjFilter = NoBcj> {
    /// Current phase of the state machine.
    phase: Phase,
    /// Bit/byte sub-position shared by the CRC validation sub-machine and
    /// the check-skip loop. Zeroed whenever a new field begins.
    pos: u32,
    /// Resumable VLI decoder shared by all VLI fields.
    vli: VliDecoder,
    /// Running CRC32/CRC64 over Block output, or CRC32 over the Index.
    /// Reused per phase, explicitly zeroed on transition.
    crc: u64,
    /// Integrity check selected by the Stream Header.
    check: CheckKind,
    /// Operation mode.
    mode: XzMode,
    /// Whether CRC64 checks are verified.
    crc64: bool,
    /// Whether unverifiable checks are tolerated.
    tolerate_unknown_check: bool,
    /// Flip-flop suppressing the first no-progress buffer error.
    allow_buf_error: bool,
    /// Set after a fatal error or stream end; cleared by `reset`.
    needs_reset: bool,
    /// Sizes from the current Block Header.
    header: BlockHeaderInfo,
    /// Running Block totals and hash.
    block: BlockTally,
    /// Index decoder state.
    index: IndexTally,
    /// Staging buffer for headers and the footer.
    temp: TempBuffer,
    /// The external LZMA2 engine.
    engine: E,
    /// Optional byte-conversion filter.
    filter: Option<F>,
    /// Whether the current Block chains the filter before LZMA2.
    bcj_active: bool,
}

impl<E: Lzma2Engine> XzStreamDecoder<E, NoBcj> {
    /// Create a decoder without byte-conversion-filter support.
    #[must_use]
    pub fn new(engine: E, options: XzOptions) -> Self {
        Self::build(engine, None, options)
    }
}

impl<E: Lzma2Engine, F: BcjFilter> XzStreamDecoder<E, F> {
    /// Create a decoder that accepts one BCJ filter chained before LZMA2.
    #[must_use]
    pub fn with_filter(engine: E, filter: F, options: XzOptions) -> Self {
        Self::build(engine, Some(filter), options)
    }

    /// Shared constructor.
    fn build(engine: E, filter: Option<F>, options: XzOptions) -> Self {
        let mut decoder = Self {
            phase: Phase::StreamHeader,
            pos: 0,
            vli: VliDecoder::new(),
            crc: 0,
            check: CheckKind::None,
            mode: options.mode,
            crc64: options.crc64,
            tolerate_unknown_check: options.tolerate_unknown_check,
            allow_buf_error: false,
            needs_reset: false,
            header: BlockHeaderInfo::default(),
            block: BlockTally::default(),
            index: IndexTally::default(),
            temp: TempBuffer::new(),
            engine,
            filter,
            bcj_active: false,
        };
        decoder.reset();
        decoder
    }

    /// Re-arm for a new stream without tearing the decoder down.
    ///
    /// Required between streams in multi-call mode and after any fatal
    /// error; single-call mode resets implicitly on every `run`.
    pub fn reset(&mut self) {
        self.phase = Phase::StreamHeader;
        self.pos = 0;
        self.vli.reset();
        self.crc = 0;
        self.allow_buf_error = false;
        self.needs_reset = false;
        self.block = BlockTally::default();
        self.index = IndexTally::default();
        self.bcj_active = false;
        self.temp.start(STREAM_HEADER_SIZE);
    }

    /// Consume the decoder and hand back the engine.
    #[must_use]
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Decode as much of the stream as the given buffers allow.
    ///
    /// Returns how many bytes were consumed and produced, and whether the
    /// stream is complete. Feeding the same total input split at different
    /// byte boundaries yields byte-identical output.
    ///
    /// # Errors
    /// See [`XzError`]; all errors are fatal for the current stream. In
    /// single-call mode an error additionally means no consumed/produced
    /// counts are reported, so the caller observes no partial progress.
    pub fn run(&mut self, input: &[u8], output: &mut [u8]) -> Result<XzStatus, XzError> {
        if self.mode == XzMode::SingleCall {
            self.reset();
        } else if self.needs_reset {
            return Err(XzError::NeedsReset);
        }

        let mut buf = XzIoBuffer::new(input, output);
        let result = self.dec_main(&mut buf);

        match self.mode {
            XzMode::SingleCall => self.finish_single_call(&buf, result),
            XzMode::MultiCall => self.finish_multi_call(&buf, result),
        }
    }

    /// Single-call epilogue: reclassify "need more" and hide partial
    /// progress on failure.
    ///
    /// The format guarantees that the last input byte never produces output,
    /// so "need more input with all input consumed" can only mean a
    /// truncated or corrupt stream, never a legitimate pause.
    fn finish_single_call(
        &mut self,
        buf: &XzIoBuffer<'_>,
        result: Result<MainStatus, XzError>,
    ) -> Result<XzStatus, XzError> {
        self.needs_reset = true;
        match result {
            Ok(MainStatus::StreamEnd) => Ok(XzStatus::StreamEnd {
                read: buf.input_position(),
                written: buf.output_position(),
            }),
            // The header consumed is not reported: like every non-success
            // outcome in this mode, buffer positions roll back to zero.
            Ok(MainStatus::UnsupportedCheck(check_id)) => Ok(XzStatus::UnsupportedCheck {
                check_id,
                read: 0,
                written: 0,
            }),
            Ok(MainStatus::NeedMore) => {
                if buf.input_remaining() == 0 {
                    Err(XzError::TruncatedStream)
                } else {
                    Err(XzError::BufferError)
                }
            }
            Err(error) => Err(error),
        }
    }

    /// Multi-call epilogue: the no-progress flip-flop.
    ///
    /// One call without progress is tolerated, since zlib-style callers only
    /// refill input once output stops; a second consecutive one means the
    /// session is stuck (truncated input or an undersized output buffer).
    fn finish_multi_call(
        &mut self,
        buf: &XzIoBuffer<'_>,
        result: Result<MainStatus, XzError>,
    ) -> Result<XzStatus, XzError> {
        let read = buf.input_position();
        let written = buf.output_position();
        match result {
            Ok(MainStatus::NeedMore) => {
                if read == 0 && written == 0 {
                    if self.allow_buf_error {
                        return Err(XzError::BufferError);
                    }
                    self.allow_buf_error = true;
                } else {
                    self.allow_buf_error = false;
                }
                Ok(XzStatus::NeedMore { read, written })
            }
            Ok(MainStatus::UnsupportedCheck(check_id)) => {
                self.allow_buf_error = false;
                Ok(XzStatus::UnsupportedCheck {
                    check_id,
                    read,
                    written,
                })
            }
            Ok(MainStatus::StreamEnd) => {
                self.allow_buf_error = false;
                self.needs_reset = true;
                log::debug!("stream end after {} blocks", self.block.count);
                Ok(XzStatus::StreamEnd { read, written })
            }
            Err(error) => {
                self.needs_reset = true;
                Err(error)
            }
        }
    }

    /// The state machine proper. Runs through as many phases as the buffers
    /// allow without returning to the caller.
    fn dec_main(&mut self, b: &mut XzIoBuffer<'_>) -> Result<MainStatus, XzError> {
        // Start position for Index bookkeeping when resuming mid-Index.
        let mut in_start = b.input_position();
        loop {
            match self.phase {
                Phase::StreamHeader => {
                    if !self.temp.fill(b) {
                        return Ok(MainStatus::NeedMore);
                    }
                    // Advance the phase before parsing so a tolerated
                    // unsupported-check warning resumes at the first Block.
                    self.phase = Phase::BlockStart;
                    if let Some(id) = self.dec_stream_header()? {
                        log::warn!("check id {id} cannot be verified; check fields are skipped");
                        return Ok(MainStatus::UnsupportedCheck(id));
                    }
                }
                Phase::BlockStart => {
                    let Some(first) = b.peek_byte() else {
                        return Ok(MainStatus::NeedMore);
                    };

                    if first == 0 {
                        // Index indicator. The byte itself counts toward the
                        // Index size and its CRC32, hence the mark before it.
                        in_start = b.input_position();
                        b.input_skip(1);
                        self.phase = Phase::Index;
                    } else {
                        let header_size = (usize::from(first) + 1) * 4;
                        self.header.size = header_size;
                        self.temp.start(header_size);
                        self.phase = Phase::BlockHeader;
                    }
                }
                Phase::BlockHeader => {
                    if !self.temp.fill(b) {
                        return Ok(MainStatus::NeedMore);
                    }
                    self.dec_block_header()?;
                    self.phase = Phase::BlockUncompress;
                }
                Phase::BlockUncompress => match self.dec_block(b)? {
                    Step::Finished => {
                        self.block.padding = padding_to_4(self.block.compressed);
                        self.phase = Phase::BlockPadding;
                    }
                    Step::NeedMore => return Ok(MainStatus::NeedMore),
                },
                Phase::BlockPadding => {
                    // Compressed Data plus Block Padding must be a multiple
                    // of four bytes.
                    while self.block.padding != 0 {
                        let Some(byte) = b.read_byte() else {
                            return Ok(MainStatus::NeedMore);
                        };
                        if byte != 0 {
                            return Err(XzError::NonZeroPadding);
                        }
                        self.block.padding -= 1;
                    }
                    self.phase = Phase::BlockCheck;
                }
                Phase::BlockCheck => {
                    match self.check {
                        CheckKind::Crc32 => {
                            if self.crc_validate(b, 32, XzError::BlockCheckMismatch)?
                                == Step::NeedMore
                            {
                                return Ok(MainStatus::NeedMore);
                            }
                        }
                        CheckKind::Crc64 => {
                            if self.crc_validate(b, 64, XzError::BlockCheckMismatch)?
                                == Step::NeedMore
                            {
                                return Ok(MainStatus::NeedMore);
                            }
                        }
                        CheckKind::Unsupported(_) => {
                            if !self.check_skip(b) {
                                return Ok(MainStatus::NeedMore);
                            }
                        }
                        CheckKind::None => {}
                    }
                    self.phase = Phase::BlockStart;
                }
                Phase::Index => match self.dec_index(b, in_start)? {
                    Step::Finished => self.phase = Phase::IndexPadding,
                    Step::NeedMore => return Ok(MainStatus::NeedMore),
                },
                Phase::IndexPadding => {
                    while self
                        .index
                        .size
                        .wrapping_add(offset_u64(b.input_position() - in_start))
                        & 3
                        != 0
                    {
                        let Some(byte) = b.read_byte() else {
                            // Padding consumed so far still counts toward the
                            // Index size and CRC32.
                            self.index_update(b, in_start);
                            return Ok(MainStatus::NeedMore);
                        };
                        if byte != 0 {
                            return Err(XzError::NonZeroPadding);
                        }
                    }
                    self.index_update(b, in_start);

                    if self.block.hash != self.index.hash {
                        return Err(XzError::IndexHashMismatch);
                    }
                    self.phase = Phase::IndexCrc32;
                }
                Phase::IndexCrc32 => {
                    if self.crc_validate(b, 32, XzError::IndexCrc32Mismatch)? == Step::NeedMore {
                        return Ok(MainStatus::NeedMore);
                    }
                    self.temp.start(STREAM_HEADER_SIZE);
                    self.phase = Phase::StreamFooter;
                }
                Phase::StreamFooter => {
                    if !self.temp.fill(b) {
                        return Ok(MainStatus::NeedMore);
                    }
                    self.dec_stream_footer()?;
                    return Ok(MainStatus::StreamEnd);
                }
            }
        }
    }

    /// Validate the staged 12-byte Stream Header. Returns the Check ID when
    /// a tolerated unsupported check must be surfaced.
    fn dec_stream_header(&mut self) -> Result<Option<u8>, XzError> {
        /// Magic bytes opening every `.xz` stream.
        const MAGIC: &[u8; 6] = b"\xFD7zXZ\x00";

        let data = self.temp.bytes();
        if &data[..6] != MAGIC {
            return Err(XzError::StreamHeaderMagicMismatch);
        }

        let expected = le32(&data[8..12]);
        let actual = crc32(0, &data[6..8]);
        if actual != expected {
            return Err(XzError::StreamHeaderCrc32Mismatch(actual, expected));
        }

        if data[6] != 0 {
            return Err(XzError::UnsupportedStreamFlags);
        }

        let check_id = data[7];
        let (check, warn) =
            CheckKind::from_id(check_id, self.crc64, self.tolerate_unknown_check)?;
        self.check = check;
        Ok(warn.then_some(check_id))
    }

    /// Validate the staged 12-byte Stream Footer against the decoded Index.
    fn dec_stream_footer(&self) -> Result<(), XzError> {
        /// Magic bytes closing every `.xz` stream.
        const MAGIC: &[u8; 2] = b"YZ";

        let data = self.temp.bytes();
        if &data[10..12] != MAGIC {
            return Err(XzError::FooterMagicMismatch);
        }

        let expected = le32(&data[0..4]);
        let actual = crc32(0, &data[4..10]);
        if actual != expected {
            return Err(XzError::FooterCrc32Mismatch(actual, expected));
        }

        // The Index's trailing crc32 field was never counted into
        // index.size, so the stored Backward Size equals index.size / 4
        // with no correction term.
        let backward = u64::from(le32(&data[4..8]));
        if self.index.size >> 2 != backward {
            return Err(XzError::FooterBackwardSizeMismatch(
                backward,
                self.index.size >> 2,
            ));
        }

        if data[8] != 0 || data[9] != self.check.id() {
            return Err(XzError::FooterFlagsMismatch);
        }
        Ok(())
    }

    /// Parse the staged Block Header and re-arm the filter chain.
    fn dec_block_header(&mut self) -> Result<(), XzError> {
        // The smallest legal header is 8 bytes, so the crc32 split is safe.
        let data = self.temp.bytes();
        debug_assert!(data.len() >= 8);
        let body_len = data.len() - 4;

        let expected = le32(&data[body_len..]);
        let actual = crc32(0, &data[..body_len]);
        if actual != expected {
            return Err(XzError::BlockHeaderCrc32Mismatch(actual, expected));
        }

        // With filter support one chained filter is allowed (bit 0x01);
        // without it that bit is reserved too.
        let flags = data[1];
        let reserved_mask: u8 = if self.filter.is_some() { 0x3E } else { 0x3F };
        if flags & reserved_mask != 0 {
            return Err(XzError::UnsupportedBlockFlags);
        }

        let mut pos = 2usize;

        if flags & 0x40 == 0 {
            self.header.compressed = VLI_UNKNOWN;
        } else {
            let (value, consumed) = self
                .vli
                .decode_all(&data[pos..body_len])
                .ok_or(XzError::InvalidVli)?;
            self.header.compressed = value;
            pos += consumed;
        }

        if flags & 0x80 == 0 {
            self.header.uncompressed = VLI_UNKNOWN;
        } else {
            let (value, consumed) = self
                .vli
                .decode_all(&data[pos..body_len])
                .ok_or(XzError::InvalidVli)?;
            self.header.uncompressed = value;
            pos += consumed;
        }

        if let Some(filter) = self.filter.as_mut() {
            self.bcj_active = flags & 0x01 != 0;
            if self.bcj_active {
                if body_len.saturating_sub(pos) < 2 {
                    return Err(XzError::FilterChainTruncated);
                }
                filter.reset(data[pos])?;
                pos += 1;

                // Custom start offsets are not supported, so Size of
                // Properties must be zero.
                if data[pos] != 0 {
                    return Err(XzError::FilterPropertiesNotSupported);
                }
                pos += 1;
            }
        }

        // The mandatory last filter entry: LZMA2 with a one-byte
        // dictionary size code.
        if body_len.saturating_sub(pos) < 2 {
            return Err(XzError::BlockHeaderTruncated);
        }
        if data[pos] != 0x21 {
            return Err(XzError::UnsupportedFilterChain);
        }
        pos += 1;
        if data[pos] != 0x01 {
            return Err(XzError::UnsupportedFilterChain);
        }
        pos += 1;
        if body_len.saturating_sub(pos) < 1 {
            return Err(XzError::BlockHeaderTruncated);
        }
        self.engine.reset(data[pos])?;
        pos += 1;

        // The rest must be Header Padding.
        while pos < body_len {
            if data[pos] != 0 {
                return Err(XzError::NonZeroHeaderPadding);
            }
            pos += 1;
        }

        self.block.compressed = 0;
        self.block.uncompressed = 0;
        Ok(())
    }

    /// Drive one iteration of the Block body pipeline and meter it against
    /// the Block Header; fold completed Blocks into the running hash.
    fn dec_block(&mut self, b: &mut XzIoBuffer<'_>) -> Result<Step, XzError> {
        let in_start = b.input_position();
        let out_start = b.output_position();

        let step = match self.filter.as_mut() {
            Some(filter) if self.bcj_active => filter.run(&mut self.engine, b)?,
            _ => self.engine.run(b)?,
        };

        self.block.compressed = self
            .block
            .compressed
            .wrapping_add(offset_u64(b.input_position() - in_start));
        self.block.uncompressed = self
            .block
            .uncompressed
            .wrapping_add(offset_u64(b.output_position() - out_start));

        // Observed sizes are always below VLI_UNKNOWN, so the sentinel needs
        // no separate case.
        if self.block.compressed > self.header.compressed
            || self.block.uncompressed > self.header.uncompressed
        {
            return Err(XzError::BlockSizeExceedsHeader);
        }

        match self.check {
            CheckKind::Crc32 => {
                self.crc = u64::from(crc32(low32(self.crc), b.output_since(out_start)));
            }
            CheckKind::Crc64 => {
                self.crc = crc64(self.crc, b.output_since(out_start));
            }
            CheckKind::None | CheckKind::Unsupported(_) => {}
        }

        if step == Step::Finished {
            if self.header.compressed != VLI_UNKNOWN
                && self.header.compressed != self.block.compressed
            {
                return Err(XzError::BlockSizeMismatch);
            }
            if self.header.uncompressed != VLI_UNKNOWN
                && self.header.uncompressed != self.block.uncompressed
            {
                return Err(XzError::BlockSizeMismatch);
            }

            self.block.hash.unpadded = self
                .block
                .hash
                .unpadded
                .wrapping_add(offset_u64(self.header.size))
                .wrapping_add(self.block.compressed)
                .wrapping_add(offset_u64(self.check.field_size()));
            self.block.hash.uncompressed = self
                .block
                .hash
                .uncompressed
                .wrapping_add(self.block.uncompressed);
            self.block.hash.fold_crc32();
            self.block.count = self.block.count.wrapping_add(1);
            log::debug!(
                "block {}: {} compressed -> {} uncompressed bytes",
                self.block.count,
                self.block.compressed,
                self.block.uncompressed
            );
        }

        Ok(step)
    }

    /// Decode the Number of Records and the Unpadded/Uncompressed Size pairs
    /// of the Index. Index Padding and the trailing CRC32 are not consumed
    /// here.
    fn dec_index(&mut self, b: &mut XzIoBuffer<'_>, in_start: usize) -> Result<Step, XzError> {
        loop {
            let value = match self.vli.decode(b.input_slice()) {
                VliResult::Complete(value, consumed) => {
                    b.input_skip(consumed);
                    value
                }
                VliResult::NeedMore(consumed) => {
                    // Partial VLI bytes still count toward the Index size
                    // and CRC32.
                    b.input_skip(consumed);
                    self.index_update(b, in_start);
                    return Ok(Step::NeedMore);
                }
                VliResult::Malformed => return Err(XzError::InvalidVli),
            };

            match self.index.stage {
                IndexStage::Count => {
                    if value != self.block.count {
                        return Err(XzError::IndexRecordCountMismatch(value, self.block.count));
                    }
                    self.index.remaining = value;
                    self.index.stage = IndexStage::Unpadded;
                }
                IndexStage::Unpadded => {
                    self.index.hash.unpadded = self.index.hash.unpadded.wrapping_add(value);
                    self.index.stage = IndexStage::Uncompressed;
                }
                IndexStage::Uncompressed => {
                    self.index.hash.uncompressed =
                        self.index.hash.uncompressed.wrapping_add(value);
                    self.index.hash.fold_crc32();
                    self.index.remaining -= 1;
                    self.index.stage = IndexStage::Unpadded;
                }
            }

            if self.index.remaining == 0 {
                return Ok(Step::Finished);
            }
        }
    }

    /// Fold the input consumed since `in_start` into the Index size and its
    /// running CRC32.
    fn index_update(&mut self, b: &XzIoBuffer<'_>, in_start: usize) {
        let used = b.input_since(in_start);
        self.index.size = self.index.size.wrapping_add(offset_u64(used.len()));
        self.crc = u64::from(crc32(low32(self.crc), used));
    }

    /// Compare the next `bits / 8` input bytes against the little-endian
    /// running check value, one byte per step. Shared by Block Check and
    /// Index CRC32 validation.
    fn crc_validate(
        &mut self,
        b: &mut XzIoBuffer<'_>,
        bits: u32,
        mismatch: XzError,
    ) -> Result<Step, XzError> {
        while self.pos < bits {
            let Some(byte) = b.read_byte() else {
                return Ok(Step::NeedMore);
            };
            if byte_at(self.crc, self.pos) != byte {
                return Err(mismatch);
            }
            self.pos += 8;
        }

        self.crc = 0;
        self.pos = 0;
        Ok(Step::Finished)
    }

    /// Skip the Check field of an unverifiable check. Returns true once the
    /// whole field has been skipped.
    fn check_skip(&mut self, b: &mut XzIoBuffer<'_>) -> bool {
        let total = field_size_u32(self.check);
        while self.pos < total {
            if b.read_byte().is_none() {
                return false;
            }
            self.pos += 1;
        }
        self.pos = 0;
        true
    }
}

/// Little-endian u32 from the first four bytes of a slice.
const fn le32(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

/// Zero bytes needed to pad `size` up to a multiple of four.
#[allow(clippy::cast_possible_truncation)] // value is 0..=3
const fn padding_to_4(size: u64) -> u32 {
    (4 - (size & 3)) as u32 & 3
}

/// Buffer offsets and field sizes as u64. Lossless on every supported
/// target.
#[allow(clippy::cast_possible_truncation)]
const fn offset_u64(value: usize) -> u64 {
    value as u64
}

/// The CRC32 half of the running check value.
#[allow(clippy::cast_possible_truncation)]
const fn low32(value: u64) -> u32 {
    value as u32
}

/// Byte `bit / 8` of a little-endian check value.
#[allow(clippy::cast_possible_truncation)]
const fn byte_at(value: u64, bit: u32) -> u8 {
    (value >> bit) as u8
}

/// Check field size as the same type as the skip counter.
#[allow(clippy::cast_possible_truncation)] // sizes are at most 64
const fn field_size_u32(check: CheckKind) -> u32 {
    check.field_size() as u32
}
