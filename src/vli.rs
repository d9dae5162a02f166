use core::mem;

/// Stateful decoder for the little-endian base-128 variable-length integers
/// used for all size fields in the `.xz` container. The top bit of each byte
/// is a continuation flag; an encoding is at most nine bytes long.
#[derive(Clone, Copy, Default, Debug)]
pub struct VliDecoder {
    /// Value accumulated so far.
    value: u64,
    /// Bit position of the next 7-bit group, 0 when no decode is in flight.
    shift: u8,
}

/// Outcome of one [`VliDecoder::decode`] call.
#[derive(Debug, Eq, PartialEq)]
pub enum VliResult {
    /// Integer complete: (value, bytes consumed from the input slice).
    Complete(u64, usize),
    /// Input ran out mid-integer; all given bytes were consumed.
    NeedMore(usize),
    /// Non-minimal or over-long encoding. Fatal for the current field.
    Malformed,
}

impl VliDecoder {
    /// Constructor.
    pub const fn new() -> Self {
        Self { value: 0, shift: 0 }
    }

    /// Drop any in-flight decode.
    pub const fn reset(&mut self) {
        self.value = 0;
        self.shift = 0;
    }

    /// Decode one integer, resuming from the previous call if that call
    /// returned [`VliResult::NeedMore`].
    pub fn decode(&mut self, input: &[u8]) -> VliResult {
        if self.shift == 0 {
            // Guards against stale state from a prior field.
            self.value = 0;
        }

        let mut consumed = 0usize;
        while consumed < input.len() {
            let byte = input[consumed];
            consumed += 1;
            self.value |= u64::from(byte & 0x7F) << self.shift;
            if byte & 0x80 == 0 {
                // A trailing zero byte after a continuation byte encodes the
                // same value in fewer bytes; the format forbids it.
                if byte == 0 && self.shift != 0 {
                    self.shift = 0;
                    return VliResult::Malformed;
                }
                self.shift = 0;
                return VliResult::Complete(mem::take(&mut self.value), consumed);
            }
            self.shift += 7;
            if self.shift == 63 {
                self.shift = 0;
                return VliResult::Malformed;
            }
        }
        VliResult::NeedMore(consumed)
    }

    /// Decode an integer that must be fully contained in `input`.
    /// Returns `None` if the encoding is malformed or runs past the slice.
    pub fn decode_all(&mut self, input: &[u8]) -> Option<(u64, usize)> {
        debug_assert_eq!(self.shift, 0);
        match self.decode(input) {
            VliResult::Complete(value, consumed) => Some((value, consumed)),
            VliResult::NeedMore(_) => {
                self.reset();
                None
            }
            VliResult::Malformed => None,
        }
    }
}
