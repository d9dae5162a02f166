use crate::buffer::XzIoBuffer;
use crate::BLOCK_HEADER_SIZE_MAX;

/// Staging buffer for multi-byte fields that may arrive split across calls:
/// the Stream Header and Footer (12 bytes each) and Block Headers (up to
/// 1024 bytes, the format's maximum).
///
/// A caller announces the field size with [`TempBuffer::start`] and then
/// pumps [`TempBuffer::fill`] until it reports completion, at which point the
/// field bytes are read back through [`TempBuffer::bytes`].
#[derive(Clone, Debug)]
pub struct TempBuffer {
    /// Bytes accumulated so far.
    pos: usize,
    /// Size of the field being staged, always <= 1024.
    target: usize,
    /// Backing storage, sized for the largest legal Block Header.
    buf: [u8; BLOCK_HEADER_SIZE_MAX],
}

impl TempBuffer {
    /// Constructor.
    pub const fn new() -> Self {
        Self {
            pos: 0,
            target: 0,
            buf: [0; BLOCK_HEADER_SIZE_MAX],
        }
    }

    /// Begin staging a field of `target` bytes, discarding any previous
    /// content. `target` beyond the buffer is a caller bug, not a runtime
    /// condition.
    pub const fn start(&mut self, target: usize) {
        debug_assert!(target <= BLOCK_HEADER_SIZE_MAX);
        self.pos = 0;
        self.target = target;
    }

    /// Copy as much input as is available toward the target size.
    /// Returns true exactly when the field is complete; the position is then
    /// reset so the buffer can be reused for the next field.
    pub fn fill(&mut self, b: &mut XzIoBuffer<'_>) -> bool {
        let input = b.input_slice();
        let copy_size = (self.target - self.pos).min(input.len());
        self.buf[self.pos..self.pos + copy_size].copy_from_slice(&input[..copy_size]);
        b.input_skip(copy_size);
        self.pos += copy_size;

        if self.pos == self.target {
            self.pos = 0;
            return true;
        }
        false
    }

    /// The completed field. Only meaningful right after [`TempBuffer::fill`]
    /// returned true.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.target]
    }
}

impl Default for TempBuffer {
    fn default() -> Self {
        Self::new()
    }
}
