use thiserror::Error;

/// Coarse classification of an [`XzError`], mirroring the failure taxonomy of
/// the original XZ Embedded decoder (format / options / data / buffer /
/// memlimit).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum XzErrorKind {
    /// The input is not a `.xz` stream at all.
    Format,
    /// A structurally valid field requests an option this decoder does not
    /// support.
    Options,
    /// A consistency or integrity check failed; the stream is corrupt.
    Data,
    /// The decoder cannot make progress with the buffers it is given.
    Buffer,
    /// The stream needs a larger LZMA2 dictionary than the engine allows.
    MemLimit,
    /// The decoder was used after a fatal error or after stream end.
    Misuse,
}

/// Errors reported by [`crate::XzStreamDecoder`] and its collaborators.
///
/// Every variant is fatal for the stream being decoded: the decoder must be
/// reset before it is used again. Needing more input is not an error; it is
/// reported through [`crate::XzStatus::NeedMore`].
#[derive(Error, Debug, Clone, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum XzError {
    /// `run` was called after a fatal error or a finished stream.
    #[error("decoder must be reset before further use")]
    NeedsReset,

    /// The first six bytes are not the `.xz` magic.
    #[error("stream header magic number mismatch")]
    StreamHeaderMagicMismatch,

    /// The Stream Header flag bytes fail their CRC32.
    #[error("stream header crc32 mismatch (actual={0:#010x}, expected={1:#010x})")]
    StreamHeaderCrc32Mismatch(u32, u32),

    /// Reserved Stream Header flag bits are set, or the Check ID is outside
    /// the legal encoding range.
    #[error("unsupported stream header flags")]
    UnsupportedStreamFlags,

    /// The stream uses an integrity check this decoder cannot verify and the
    /// decoder was not configured to tolerate unknown checks.
    #[error("unsupported check id {0}")]
    UnsupportedCheckId(u8),

    /// A Block Header fails its CRC32.
    #[error("block header crc32 mismatch (actual={0:#010x}, expected={1:#010x})")]
    BlockHeaderCrc32Mismatch(u32, u32),

    /// Reserved Block Header flag bits are set.
    #[error("unsupported block header flags")]
    UnsupportedBlockFlags,

    /// A declared field does not fit inside the Block Header.
    #[error("block header too small for its declared fields")]
    BlockHeaderTruncated,

    /// A Block Header that declares a chained filter but has no room for its
    /// entry.
    #[error("block header too small for its filter chain")]
    FilterChainTruncated,

    /// The filter chain is not the single mandatory LZMA2 entry (plus at most
    /// one leading BCJ filter).
    #[error("unsupported filter chain in block header")]
    UnsupportedFilterChain,

    /// A BCJ filter ID the configured filter does not recognize.
    #[error("unsupported filter id {0}")]
    UnsupportedFilter(u8),

    /// A BCJ filter entry with a non-empty properties field (custom start
    /// offsets are not supported).
    #[error("filter properties not supported")]
    FilterPropertiesNotSupported,

    /// Non-zero byte inside Block Header padding.
    #[error("non-zero block header padding")]
    NonZeroHeaderPadding,

    /// The LZMA2 dictionary size code is invalid.
    #[error("unsupported lzma2 dictionary properties")]
    UnsupportedDictionaryProperties,

    /// The Block needs a larger dictionary than the engine permits.
    #[error("lzma2 dictionary of {0} bytes exceeds the configured limit")]
    MemLimit(u64),

    /// Malformed variable-length integer (non-minimal or over-long).
    #[error("invalid variable-length integer")]
    InvalidVli,

    /// A Block consumed or produced more bytes than its header declared.
    #[error("block exceeds sizes declared in its header")]
    BlockSizeExceedsHeader,

    /// A finished Block's observed sizes differ from the declared ones.
    #[error("block sizes do not match the block header")]
    BlockSizeMismatch,

    /// A Block Check field does not match the computed check.
    #[error("block check mismatch")]
    BlockCheckMismatch,

    /// Non-zero byte inside Block Padding or Index Padding.
    #[error("non-zero padding byte")]
    NonZeroPadding,

    /// The Index's Number of Records differs from the Blocks decoded.
    #[error("index lists {0} records but {1} blocks were decoded")]
    IndexRecordCountMismatch(u64, u64),

    /// The Index records do not match the Blocks actually decoded.
    #[error("index does not match decoded blocks")]
    IndexHashMismatch,

    /// The Index's trailing CRC32 does not match the Index bytes.
    #[error("index crc32 mismatch")]
    IndexCrc32Mismatch,

    /// The Stream Footer magic is wrong.
    #[error("stream footer magic number mismatch")]
    FooterMagicMismatch,

    /// The Stream Footer fails its CRC32.
    #[error("stream footer crc32 mismatch (actual={0:#010x}, expected={1:#010x})")]
    FooterCrc32Mismatch(u32, u32),

    /// The Footer's Backward Size disagrees with the observed Index size.
    #[error("backward size mismatch (actual={0}, expected={1})")]
    FooterBackwardSizeMismatch(u64, u64),

    /// The Footer's reserved byte or repeated Check ID is wrong.
    #[error("stream footer flags mismatch")]
    FooterFlagsMismatch,

    /// Corrupt compressed data reported by the LZMA2 engine.
    #[error("corrupted data in block body")]
    CorruptedData,

    /// Input ended mid-stream in single-call mode.
    #[error("truncated or corrupt stream")]
    TruncatedStream,

    /// No forward progress is possible: the output buffer is too small, or a
    /// multi-call session was starved of input twice in a row.
    #[error("cannot make progress with the given buffers")]
    BufferError,
}

impl XzError {
    /// The taxonomy bucket this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> XzErrorKind {
        match self {
            Self::NeedsReset => XzErrorKind::Misuse,
            Self::StreamHeaderMagicMismatch => XzErrorKind::Format,
            Self::UnsupportedStreamFlags
            | Self::UnsupportedCheckId(_)
            | Self::UnsupportedBlockFlags
            | Self::FilterChainTruncated
            | Self::UnsupportedFilterChain
            | Self::UnsupportedFilter(_)
            | Self::FilterPropertiesNotSupported
            | Self::NonZeroHeaderPadding
            | Self::UnsupportedDictionaryProperties => XzErrorKind::Options,
            Self::MemLimit(_) => XzErrorKind::MemLimit,
            Self::BufferError => XzErrorKind::Buffer,
            _ => XzErrorKind::Data,
        }
    }
}
