use crate::error::XzError;
use crc::{Crc, Table, CRC_32_ISO_HDLC, CRC_64_XZ};

/// CRC32 as used by every checksummed field of the container.
const CRC32: Crc<u32, Table<16>> = Crc::<u32, Table<16>>::new(&CRC_32_ISO_HDLC);

/// CRC64 as used by the optional Block Check field.
const CRC64: Crc<u64, Table<16>> = Crc::<u64, Table<16>>::new(&CRC_64_XZ);

/// Check field sizes in bytes, indexed by Check ID. IDs above 15 are invalid.
const CHECK_SIZES: [u8; 16] = [0, 4, 4, 4, 8, 8, 8, 16, 16, 16, 32, 32, 32, 64, 64, 64];

/// Fold `data` into a running CRC32. A fresh computation starts from seed 0.
///
/// The `crc` crate seeds digests with the pre-finalization register value, so
/// resuming from an already finalized CRC undoes the final xor and the
/// reflection applied by `digest_with_initial`.
pub fn crc32(seed: u32, data: &[u8]) -> u32 {
    let mut digest = CRC32.digest_with_initial((!seed).reverse_bits());
    digest.update(data);
    digest.finalize()
}

/// Fold `data` into a running CRC64 (the xz variant). Seed 0 starts fresh.
pub fn crc64(seed: u64, data: &[u8]) -> u64 {
    let mut digest = CRC64.digest_with_initial((!seed).reverse_bits());
    digest.update(data);
    digest.finalize()
}

/// Integrity check selected by the Stream Header.
///
/// `Unsupported` carries a Check ID this decoder recognizes as legal but
/// cannot verify (for example SHA-256, or CRC64 on a decoder constructed
/// without CRC64 support). It only occurs when the decoder was configured to
/// tolerate such streams; the check bytes are then skipped, not verified.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CheckKind {
    /// No integrity check; the Check field is empty.
    #[default]
    None,
    /// CRC32 over each Block's uncompressed data.
    Crc32,
    /// CRC64 over each Block's uncompressed data.
    Crc64,
    /// Recognized but unverifiable check; field bytes are skipped.
    Unsupported(u8),
}

impl CheckKind {
    /// Resolve a Stream Header Check ID.
    ///
    /// Returns the kind and whether the caller must surface an
    /// unsupported-check warning.
    pub(crate) fn from_id(
        id: u8,
        crc64_enabled: bool,
        tolerate_unknown: bool,
    ) -> Result<(Self, bool), XzError> {
        if usize::from(id) >= CHECK_SIZES.len() {
            return Err(XzError::UnsupportedStreamFlags);
        }
        match id {
            0 => Ok((Self::None, false)),
            1 => Ok((Self::Crc32, false)),
            4 if crc64_enabled => Ok((Self::Crc64, false)),
            other if tolerate_unknown => Ok((Self::Unsupported(other), true)),
            other => Err(XzError::UnsupportedCheckId(other)),
        }
    }

    /// The wire Check ID of this kind.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Crc32 => 1,
            Self::Crc64 => 4,
            Self::Unsupported(id) => id,
        }
    }

    /// Size in bytes of the Block Check field for this kind.
    #[allow(clippy::cast_lossless)] // From is not const
    #[must_use]
    pub const fn field_size(self) -> usize {
        CHECK_SIZES[self.id() as usize] as usize
    }
}
