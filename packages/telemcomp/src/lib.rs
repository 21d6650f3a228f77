//! TelemComp is a Rust library for bit-exact, lossless or lossy
//! entropy-coding compression of spacecraft science telemetry. It is the
//! software counterpart of a hardware compressor: both sides render
//! bit-identical streams for a shared decompressor, so every detail of the
//! stream layout — codeword shapes, escape protocols, field order, byte
//! order and padding — is wire-observable and preserved exactly.
//!
//! # Pipeline
//!
//! [`compress`] runs a four-stage pipeline over a single, fully
//! materialized input region:
//!
//! 1. **Pre-processing** turns raw samples into small prediction
//!    residuals, in place. The difference families subtract each sample's
//!    predecessor; the model families subtract a caller-owned per-sample
//!    model that is updated as a weighted mean after every record.
//!    Optional lossy rounding drops low bits first.
//! 2. **Folding** maps the signed residuals onto non-negative codebook
//!    indices with the zig-zag transformation, field by field at each
//!    field's natural width.
//! 3. **Entropy coding** emits one variable-length codeword per value: a
//!    Rice code when the Golomb parameter is a power of two, the general
//!    Golomb code otherwise. Rare large values escape the code through one
//!    of two outlier protocols: the zero escape mechanism reserves the
//!    symbol 0 and follows it with the value at its full field width,
//!    while the multi escape mechanism reserves sixteen graduated symbols
//!    above the spillover threshold, each announcing a raw field sized to
//!    the value's magnitude.
//! 4. **Bit packing** renders the codewords most significant bit first
//!    into the caller's fixed-capacity output region, as big-endian 32-bit
//!    words, padded with zero bits to the next word boundary.
//!
//! The raw modes skip stages 1 to 3 and emit the samples in big-endian
//! byte order without framing.
//!
//! Every stage is polymorphic over the closed set of telemetry record
//! layouts through the [`SampleRecord`] trait, from plain 16-bit imagette
//! samples up to compound star records with six 32-bit fields.
//!
//! [`decompress`] is the symmetric peer: driven by the
//! [report](CompressionInfo) of the producing run, it undoes each stage in
//! reverse and keeps the model region synchronized with the compressor.
//!
//! # Buffers and resources
//!
//! The library never allocates, performs no I/O and spawns no threads:
//! every region involved is borrowed from the caller for the duration of
//! one call, and a call is bounded by `O(samples)` work. The output
//! capacity is checked before every write, and a stream that does not fit
//! is reported as a distinguished error rather than truncated.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://crates.io/crates/log) crate for
//! logging status and diagnostic messages to any interested consumers.
//! Conditions that do not prevent a run from completing, such as an empty
//! input region, are logged as warnings and never fail the call.
//!
//! # Example
//!
//! ```
//! use telemcomp::{CompressionInfo, CompressorConfig, ModeFamily, compress, decompress};
//!
//! let mut samples: [u16; 4] = [60, 62, 65, 61];
//! let original = samples;
//! let mut output = [0u8; 16];
//! let mut info = CompressionInfo::default();
//!
//! compress(
//! 	CompressorConfig {
//! 		family: ModeFamily::DiffZero,
//! 		golomb_par: 4,
//! 		spill: 16,
//! 		model_value: 0,
//! 		round: 0,
//! 		input: &mut samples,
//! 		model: None,
//! 		updated_model: None,
//! 		output: &mut output
//! 	},
//! 	Some(&mut info)
//! )?;
//!
//! // The padded stream occupies whole 32-bit words
//! let compressed = &output[..info.cmp_size.div_ceil(32) as usize * 4];
//!
//! let mut decoded = [0u16; 4];
//! decompress(compressed, &info, None, &mut decoded)?;
//! assert_eq!(decoded, original);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]
#![deny(non_ascii_idents)]
#![deny(clippy::print_stdout)]
#![deny(clippy::unimplemented)]
#![warn(explicit_outlives_requirements)]
#![warn(noop_method_call)]
#![warn(unused_import_braces)]
#![warn(unused_qualifications)]
#![warn(clippy::empty_enum)]
#![warn(clippy::enum_glob_use)]
#![warn(clippy::invalid_upcast_comparisons)]
#![warn(clippy::multiple_inherent_impl)]
#![warn(clippy::use_self)]
#![warn(clippy::used_underscore_binding)]

pub use compressor::{CompressionError, CompressorConfig, ValueEncoder, compress};
pub use decompressor::{DecompressionError, ValueDecoder, decompress};
pub use params::{
	CompressionInfo, CompressionMode, EscapeMechanism, GOLOMB_PAR_EXPOSURE_FLAGS,
	MAX_CODEWORD_BITS, MAX_GOLOMB_PAR, MAX_MODEL_VALUE, MAX_ROUND, MIN_GOLOMB_PAR, MIN_SPILL,
	MULTI_ESCAPE_SYMBOLS, ModeFamily, SampleShape, UnknownModeId, max_spill
};
pub use record::{FFx, SFx, SFxEfx, SFxEfxNcobEcob, SFxNcob, SampleRecord};

mod compressor;
mod decompressor;
mod params;
mod record;
