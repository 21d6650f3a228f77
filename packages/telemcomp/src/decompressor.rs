//! The decompression driver: reconstructs telemetry records from a
//! compressed stream and the report of the run that produced it, updating
//! the model region exactly as the compressor did so chained model-mode
//! runs stay synchronized.

use telem_bitpack::{BitReader, BitpackError};
use thiserror::Error;

use crate::params::{
	CompressionInfo, CompressionMode, EscapeMechanism, MAX_GOLOMB_PAR, MAX_MODEL_VALUE, MAX_ROUND,
	MIN_GOLOMB_PAR, SampleShape, UnknownModeId
};
use crate::record::SampleRecord;

mod decode;

pub use decode::ValueDecoder;

/// Represents an error that may occur while decompressing a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecompressionError {
	/// The report names a compression mode this library does not know.
	#[error("the report names an unsupported compression mode: {0}")]
	UnknownMode(#[from] UnknownModeId),
	/// The stream was produced for a different sample shape than the one
	/// requested.
	#[error("the stream was produced for the {actual:?} shape, not {requested:?}")]
	ShapeMismatch {
		/// The shape recorded in the report.
		actual: SampleShape,
		/// The shape of the requested record type.
		requested: SampleShape
	},
	/// The output region holds fewer records than the report announces.
	#[error("the output buffer holds {output_samples} record(s), fewer than the {samples} in the report")]
	ShortOutputBuffer {
		/// The number of records the output region can hold.
		output_samples: usize,
		/// The number of records recorded in the report.
		samples: usize
	},
	/// A model mode needs a model region to reconstruct from.
	#[error("the stream was produced by a model mode, but no model buffer was provided")]
	MissingModelBuffer,
	/// The model region holds fewer records than the report announces.
	#[error("the model buffer holds {model_samples} record(s), fewer than the {samples} in the report")]
	ShortModelBuffer {
		/// The number of records in the model region.
		model_samples: usize,
		/// The number of records recorded in the report.
		samples: usize
	},
	/// The Golomb parameter in the report is out of range.
	#[error("Golomb parameter {golomb_par} in the report is out of range [{}, {}]", MIN_GOLOMB_PAR, MAX_GOLOMB_PAR)]
	InvalidGolombParameter {
		/// The rejected Golomb parameter.
		golomb_par: u32
	},
	/// The model weighting value in the report is out of range.
	#[error("model value {model_value} in the report is out of range [0, {}]", MAX_MODEL_VALUE)]
	InvalidModelValue {
		/// The rejected model weighting value.
		model_value: u32
	},
	/// The rounding parameter in the report is out of range.
	#[error("rounding parameter {round} in the report exceeds the maximum of {}", MAX_ROUND)]
	InvalidRound {
		/// The rejected rounding parameter.
		round: u32
	},
	/// The stream ended before every record was decoded.
	#[error("the compressed stream ended prematurely ({0})")]
	TruncatedStream(#[from] BitpackError),
	/// The stream holds raw samples but is shorter than the announced
	/// record count requires.
	#[error("the raw stream holds {available_bytes} byte(s), fewer than the {needed_bytes} the report requires")]
	ShortRawStream {
		/// The number of bytes the announced records occupy.
		needed_bytes: usize,
		/// The number of bytes available in the stream.
		available_bytes: usize
	},
	/// The stream contains a codeword no encoder could have produced
	/// within the 32-bit codeword limit.
	#[error("the stream contains a codeword exceeding the 32 bit limit")]
	OversizedCodeword,
	/// The stream contains an escape symbol outside the assigned range.
	#[error("the stream contains the unassigned escape symbol {symbol}")]
	InvalidEscapeSymbol {
		/// The decoded symbol.
		symbol: u32
	}
}

/// Decompresses a stream produced by [`compress`](crate::compress) back
/// into telemetry records, using the report of the producing run as the
/// decoding contract.
///
/// `output` receives the reconstructed records; it must hold at least the
/// number of records the report announces. For model modes, `model` must
/// hold the same model the compressor started from and is updated in
/// place, mirroring the compressor's in-place update.
pub fn decompress<R: SampleRecord>(
	compressed: &[u8],
	info: &CompressionInfo,
	model: Option<&mut [R]>,
	output: &mut [R]
) -> Result<(), DecompressionError> {
	let mode = CompressionMode::try_from(info.cmp_mode_used)?;
	if mode.shape != R::SHAPE {
		return Err(DecompressionError::ShapeMismatch {
			actual: mode.shape,
			requested: R::SHAPE
		});
	}

	let samples = info.samples_used as usize;
	if output.len() < samples {
		return Err(DecompressionError::ShortOutputBuffer {
			output_samples: output.len(),
			samples
		});
	}
	let output = &mut output[..samples];

	let escape = match mode.family.escape_mechanism() {
		Some(escape) => escape,
		None => return decode_raw(compressed, output)
	};

	let round = u32::from(info.round_used);
	if round > MAX_ROUND {
		return Err(DecompressionError::InvalidRound { round });
	}
	if !(MIN_GOLOMB_PAR..=MAX_GOLOMB_PAR).contains(&info.golomb_par_used) {
		return Err(DecompressionError::InvalidGolombParameter {
			golomb_par: info.golomb_par_used
		});
	}

	let mut reader = BitReader::new(compressed);
	let mut decoder = ValueDecoder::new(&mut reader, info.golomb_par_used, info.spill_used, escape);
	for slot in output.iter_mut() {
		*slot = R::decode(&mut decoder)?;
	}
	drop(decoder);

	let zero_escape = escape == EscapeMechanism::Zero;
	for record in output.iter_mut() {
		*record = record.unfold(zero_escape);
	}

	if mode.family.uses_model() {
		let model_value = u32::from(info.model_value_used);
		if model_value > MAX_MODEL_VALUE {
			return Err(DecompressionError::InvalidModelValue { model_value });
		}

		let model = model.ok_or(DecompressionError::MissingModelBuffer)?;
		if model.len() < samples {
			return Err(DecompressionError::ShortModelBuffer {
				model_samples: model.len(),
				samples
			});
		}

		for i in 0..samples {
			// The residual was formed at the rounded scale; reconstruct
			// there, scale back up, and update the model exactly as the
			// compressor did
			let rounded = output[i].wrapping_add(model[i].lossy_round(round));
			let reconstructed = rounded.restore_round(round);

			model[i] = reconstructed.update_model(model[i], model_value);
			output[i] = reconstructed;
		}
	} else {
		// Undo the tail-to-head differencing with a head-to-tail prefix
		// sum over the rounded values, then scale them back up
		for i in 1..samples {
			output[i] = output[i].wrapping_add(output[i - 1]);
		}

		if round > 0 {
			for record in output.iter_mut() {
				*record = record.restore_round(round);
			}
		}
	}

	Ok(())
}

fn decode_raw<R: SampleRecord>(
	compressed: &[u8],
	output: &mut [R]
) -> Result<(), DecompressionError> {
	let needed_bytes = output.len() * R::RAW_SIZE;
	if compressed.len() < needed_bytes {
		return Err(DecompressionError::ShortRawStream {
			needed_bytes,
			available_bytes: compressed.len()
		});
	}

	for (slot, chunk) in output.iter_mut().zip(compressed.chunks_exact(R::RAW_SIZE)) {
		*slot = R::read_raw(chunk);
	}

	Ok(())
}
