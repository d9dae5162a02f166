//! # xzmini
//! Resumable, memory safe `.xz` container decoder for firmware-style callers.
//!
//! This crate implements the stream-level `.xz` state machine (Stream Header,
//! Block Headers, Block Padding and Check fields, Index, Stream Footer) and
//! drives an external LZMA2 engine through the [`Lzma2Engine`] trait. The
//! LZMA2 algorithm itself and the optional byte-conversion ("BCJ") filters are
//! deliberately not part of this crate.
//!
//! The decoder is built to be called repeatedly with small input and output
//! buffers: it suspends at arbitrary byte boundaries and resumes exactly where
//! it left off, with all state held in [`XzStreamDecoder`].
#![no_std]
#![deny(unsafe_code)]
#![deny(
    clippy::correctness,
    clippy::perf,
    clippy::complexity,
    clippy::style,
    clippy::nursery,
    clippy::pedantic,
    clippy::clone_on_ref_ptr,
    clippy::decimal_literal_representation,
    clippy::float_cmp_const,
    clippy::missing_docs_in_private_items,
    clippy::multiple_inherent_impl,
    clippy::unwrap_used,
    clippy::cargo_common_metadata,
    clippy::used_underscore_binding
)]

#[cfg(feature = "std")]
extern crate std;

/// Shared input/output buffer handed to the decoder and its collaborators.
mod buffer;

/// Integrity check selection and the CRC32/CRC64 running primitives.
mod check;

/// Collaborator traits for the external LZMA2 engine and BCJ filters.
mod engine;

/// Error taxonomy of the decoder.
mod error;

/// `std::io::Read` adapter over the multi-call decoder.
#[cfg(feature = "std")]
mod reader;

/// The stream-level state machine, field codecs and call wrapper.
mod stream;

/// Staging buffer for headers that may not arrive in one call.
mod temp;

/// Variable-length integer decoding.
mod vli;

#[cfg(feature = "std")]
pub use reader::XzReader;
pub use {
    buffer::XzIoBuffer,
    check::CheckKind,
    engine::{BcjFilter, Lzma2Engine, NoBcj, Step},
    error::{XzError, XzErrorKind},
    stream::{XzMode, XzOptions, XzStatus, XzStreamDecoder},
};

/// Sentinel for a size field that is absent from a Block Header.
/// Never produced by the VLI decoder itself; real values are at most
/// `2^63 - 1`.
pub const VLI_UNKNOWN: u64 = u64::MAX;

/// Size of the Stream Header and the Stream Footer in bytes.
pub const STREAM_HEADER_SIZE: usize = 12;

/// Largest legal Block Header: the size byte encodes `(n + 1) * 4`,
/// so `(255 + 1) * 4`.
pub const BLOCK_HEADER_SIZE_MAX: usize = 1024;
