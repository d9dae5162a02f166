use crate::buffer::XzIoBuffer;
use crate::error::XzError;

/// Progress report shared by the decoder and its collaborators.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Default)]
pub enum Step {
    /// More input (or output space) is required to continue.
    #[default]
    NeedMore,
    /// The current structure (LZMA2 body, Index, ...) is fully decoded.
    Finished,
}

/// External LZMA2 decompression engine driven by the stream decoder.
///
/// The engine owns its history buffer (dictionary) and any memory limits;
/// the container decoder only tells it when a new Block starts and hands it
/// the shared [`XzIoBuffer`] to pump.
///
/// An engine must be resumable: `run` may be called with arbitrarily little
/// input or output space and must pick up where it stopped. It must consume
/// input and produce output exclusively through the buffer positions, since
/// the container decoder meters both against the Block Header's declared
/// sizes.
pub trait Lzma2Engine {
    /// Re-arm for a new Block. `dict_props` is the one-byte LZMA2 dictionary
    /// size code from the Block Header's filter properties.
    ///
    /// # Errors
    /// [`XzError::UnsupportedDictionaryProperties`] for an invalid code, or
    /// [`XzError::MemLimit`] when the implied dictionary exceeds the engine's
    /// configured ceiling.
    fn reset(&mut self, dict_props: u8) -> Result<(), XzError>;

    /// Decode as much of the Block body as the buffer allows.
    ///
    /// Returns [`Step::Finished`] exactly once, when the LZMA2 end marker has
    /// been consumed.
    ///
    /// # Errors
    /// Any [`XzError`] the engine deems fitting; it is propagated verbatim.
    fn run(&mut self, buf: &mut XzIoBuffer<'_>) -> Result<Step, XzError>;
}

/// External byte-conversion ("BCJ") filter chained in front of LZMA2.
pub trait BcjFilter {
    /// Re-arm for a new Block with the given wire filter ID.
    ///
    /// # Errors
    /// [`XzError::UnsupportedFilter`] for an ID this filter cannot handle.
    fn reset(&mut self, filter_id: u8) -> Result<(), XzError>;

    /// Run the filter over the engine's output.
    ///
    /// # Errors
    /// Propagated from the engine or the filter itself.
    fn run(&mut self, lzma2: &mut dyn Lzma2Engine, buf: &mut XzIoBuffer<'_>)
        -> Result<Step, XzError>;
}

/// Placeholder filter for decoders built without BCJ support. A Block Header
/// requesting any filter chain is rejected before this type is ever invoked.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBcj;

impl BcjFilter for NoBcj {
    fn reset(&mut self, filter_id: u8) -> Result<(), XzError> {
        Err(XzError::UnsupportedFilter(filter_id))
    }

    fn run(
        &mut self,
        _lzma2: &mut dyn Lzma2Engine,
        _buf: &mut XzIoBuffer<'_>,
    ) -> Result<Step, XzError> {
        Err(XzError::UnsupportedFilter(0))
    }
}
