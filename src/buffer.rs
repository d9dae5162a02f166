/// Shared input/output buffer.
///
/// One instance travels through the whole decoder and into the external
/// LZMA2 engine and BCJ filter. Positions advance in place as bytes are
/// consumed and produced; the caller reads them back to learn how much
/// progress a call made.
#[derive(Debug)]
pub struct XzIoBuffer<'a> {
    /// Input slice.
    input: &'a [u8],
    /// Read position in `input`.
    input_pos: usize,
    /// Output slice.
    out: &'a mut [u8],
    /// Write position in `out`.
    out_pos: usize,
}

impl<'a> XzIoBuffer<'a> {
    /// Constructor.
    pub const fn new(input: &'a [u8], output: &'a mut [u8]) -> Self {
        Self {
            input,
            input_pos: 0,
            out: output,
            out_pos: 0,
        }
    }

    /// Current input position.
    #[must_use]
    pub const fn input_position(&self) -> usize {
        self.input_pos
    }

    /// Bytes of input not yet consumed.
    #[must_use]
    pub const fn input_remaining(&self) -> usize {
        debug_assert!(self.input_pos <= self.input.len());
        self.input.len() - self.input_pos
    }

    /// Remaining input, starting at the current position.
    #[must_use]
    pub fn input_slice(&self) -> &[u8] {
        &self.input[self.input_pos..]
    }

    /// Advance the input position by `amount` bytes.
    pub const fn input_skip(&mut self, amount: usize) {
        self.input_pos += amount;
        debug_assert!(self.input_pos <= self.input.len());
    }

    /// Input bytes consumed between `start` and the current position.
    /// Used to fold already-consumed bytes into a running check.
    ///
    /// # Panics
    /// If `start` is past the current input position.
    #[must_use]
    pub fn input_since(&self, start: usize) -> &[u8] {
        &self.input[start..self.input_pos]
    }

    /// Look at the next input byte without consuming it.
    #[must_use]
    pub fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.input_pos).copied()
    }

    /// Consume and return the next input byte.
    pub fn read_byte(&mut self) -> Option<u8> {
        let byte = self.input.get(self.input_pos).copied()?;
        self.input_pos += 1;
        Some(byte)
    }

    /// Current output position.
    #[must_use]
    pub const fn output_position(&self) -> usize {
        self.out_pos
    }

    /// Total size of the output buffer.
    #[must_use]
    pub const fn output_len(&self) -> usize {
        self.out.len()
    }

    /// Bytes of output space still free.
    #[must_use]
    pub const fn output_remaining(&self) -> usize {
        self.out.len() - self.out_pos
    }

    /// Output bytes written between `start` and the current position.
    /// Used to fold freshly produced bytes into a running check.
    ///
    /// # Panics
    /// If `start` is past the current output position.
    #[must_use]
    pub fn output_since(&self, start: usize) -> &[u8] {
        &self.out[start..self.out_pos]
    }

    /// Copy `amount` bytes straight from input to output, advancing both
    /// positions.
    ///
    /// # Panics
    /// If either side has fewer than `amount` bytes left.
    pub fn copy_through(&mut self, amount: usize) {
        let new_in = self.input_pos + amount;
        let new_out = self.out_pos + amount;
        self.out[self.out_pos..new_out].copy_from_slice(&self.input[self.input_pos..new_in]);
        self.input_pos = new_in;
        self.out_pos = new_out;
    }

    /// Append a slice to the output, advancing the output position.
    ///
    /// # Panics
    /// If the output has insufficient space left.
    pub fn push_output(&mut self, data: &[u8]) {
        let new_out = self.out_pos + data.len();
        self.out[self.out_pos..new_out].copy_from_slice(data);
        self.out_pos = new_out;
    }
}
