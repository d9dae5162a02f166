use std::boxed::Box;
use std::io::{self, Read};
use std::vec;

use crate::engine::{BcjFilter, Lzma2Engine, NoBcj};
use crate::error::XzError;
use crate::stream::{XzMode, XzOptions, XzStatus, XzStreamDecoder};

/// Size of the internal staging buffer between the inner reader and the
/// decoder.
const BUFFER_SIZE: usize = 32 * 1024;

/// `std::io::Read` adapter over [`XzStreamDecoder`].
///
/// Pulls compressed bytes from an inner reader on demand and serves the
/// decoded stream through `read`. Decoding errors surface as
/// `io::ErrorKind::InvalidData`; a source that ends mid-stream surfaces as
/// `io::ErrorKind::UnexpectedEof`.
#[derive(Debug)]
pub struct XzReader<R: Read, E: Lzma2Engine, F: BcjFilter = NoBcj> {
    /// Source of compressed bytes.
    inner: R,
    /// The container decoder, always in multi-call mode.
    decoder: XzStreamDecoder<E, F>,
    /// Staging buffer for compressed bytes.
    buf: Box<[u8]>,
    /// First unconsumed byte in `buf`.
    start: usize,
    /// One past the last valid byte in `buf`.
    end: usize,
    /// The inner reader has reported end of file.
    eof: bool,
    /// The decoder has reported stream end.
    finished: bool,
}

impl<R: Read, E: Lzma2Engine> XzReader<R, E, NoBcj> {
    /// Wrap a reader, decoding without BCJ filter support.
    ///
    /// `options.mode` is ignored; the adapter always drives the decoder in
    /// multi-call mode.
    #[must_use]
    pub fn new(inner: R, engine: E, options: XzOptions) -> Self {
        let options = XzOptions {
            mode: XzMode::MultiCall,
            ..options
        };
        Self::wrap(inner, XzStreamDecoder::new(engine, options))
    }
}

impl<R: Read, E: Lzma2Engine, F: BcjFilter> XzReader<R, E, F> {
    /// Wrap a reader, decoding with one BCJ filter available.
    #[must_use]
    pub fn with_filter(inner: R, engine: E, filter: F, options: XzOptions) -> Self {
        let options = XzOptions {
            mode: XzMode::MultiCall,
            ..options
        };
        Self::wrap(inner, XzStreamDecoder::with_filter(engine, filter, options))
    }

    /// Shared constructor.
    fn wrap(inner: R, decoder: XzStreamDecoder<E, F>) -> Self {
        Self {
            inner,
            decoder,
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            start: 0,
            end: 0,
            eof: false,
            finished: false,
        }
    }

    /// Unwrap the inner reader, discarding decoder state and any buffered
    /// compressed bytes.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read, E: Lzma2Engine, F: BcjFilter> Read for XzReader<R, E, F> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() || self.finished {
            return Ok(0);
        }

        loop {
            if self.start == self.end && !self.eof {
                let filled = self.inner.read(&mut self.buf)?;
                self.start = 0;
                self.end = filled;
                if filled == 0 {
                    self.eof = true;
                }
            }

            let status = self
                .decoder
                .run(&self.buf[self.start..self.end], out)
                .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
            self.start += status.read();

            match status {
                XzStatus::StreamEnd { written, .. } => {
                    self.finished = true;
                    return Ok(written);
                }
                XzStatus::NeedMore { written, .. } | XzStatus::UnsupportedCheck { written, .. } => {
                    if written > 0 {
                        return Ok(written);
                    }
                    if self.eof && self.start == self.end {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            XzError::TruncatedStream,
                        ));
                    }
                    // Nothing produced yet; loop to pull more compressed
                    // bytes.
                }
            }
        }
    }
}
