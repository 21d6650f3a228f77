//! The compression driver: configuration validation and the four-stage
//! pipeline (pre-process, fold, entropy-code, pad) over a caller-owned set
//! of buffers.

use log::{error, warn};
use telem_bitpack::{BitWriter, BitpackError};
use thiserror::Error;

use preprocess::{diff_preprocess, model_preprocess};

use crate::params::{
	CompressionInfo, CompressionMode, EscapeMechanism, MAX_GOLOMB_PAR, MAX_MODEL_VALUE, MAX_ROUND,
	MIN_GOLOMB_PAR, MIN_SPILL, ModeFamily, max_spill
};
use crate::record::SampleRecord;

pub(crate) mod encode;
mod preprocess;

pub use encode::ValueEncoder;

/// Everything one compression run needs: the mode parameters and the
/// caller-owned buffer regions.
///
/// The record type fixes the sample shape of the mode; the family fixes
/// the transformation. The input region is transformed in place into
/// residuals, and its length is the number of records to compress. For
/// model families the model region is read, and the updated model is
/// written to the updated-model region, or back into the model region
/// itself when none is given.
#[derive(Debug)]
pub struct CompressorConfig<'buffers, R: SampleRecord> {
	/// The transformation family of the compression mode.
	pub family: ModeFamily,
	/// The Golomb parameter of the entropy coder.
	pub golomb_par: u32,
	/// The spillover threshold above which values take the outlier path.
	pub spill: u32,
	/// The model weighting value, used only by the model families.
	pub model_value: u32,
	/// The number of bits dropped by lossy rounding; 0 compresses
	/// losslessly.
	pub round: u32,
	/// The samples to compress. Overwritten with intermediate residuals.
	pub input: &'buffers mut [R],
	/// The per-sample model, required by the model families.
	pub model: Option<&'buffers mut [R]>,
	/// Where the updated model is stored. Defaults to the model region.
	pub updated_model: Option<&'buffers mut [R]>,
	/// The output region the compressed stream is rendered into. Its
	/// length is the capacity in bytes.
	pub output: &'buffers mut [u8]
}

/// Represents an error that may occur while compressing telemetry samples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CompressionError {
	/// Samples were provided but the output region is empty.
	#[error("cannot compress {samples} record(s) into an empty output buffer")]
	EmptyOutputBuffer {
		/// The number of input records.
		samples: usize
	},
	/// A model family was selected without providing a model region.
	#[error("the {family:?} family requires a model buffer, but none was provided")]
	MissingModelBuffer {
		/// The selected mode family.
		family: ModeFamily
	},
	/// The model region holds fewer records than the input region.
	#[error("the model buffer holds {model_samples} record(s), fewer than the {samples} input record(s)")]
	ShortModelBuffer {
		/// The number of records in the model region.
		model_samples: usize,
		/// The number of input records.
		samples: usize
	},
	/// The updated-model region holds fewer records than the input region.
	#[error(
		"the updated-model buffer holds {updated_model_samples} record(s), \
		fewer than the {samples} input record(s)"
	)]
	ShortUpdatedModelBuffer {
		/// The number of records in the updated-model region.
		updated_model_samples: usize,
		/// The number of input records.
		samples: usize
	},
	/// The input region holds more records than the report format can
	/// describe.
	#[error("{samples} record(s) exceed the report's 32-bit sample counter")]
	TooManySamples {
		/// The number of input records.
		samples: usize
	},
	/// The model weighting value is out of range.
	#[error("model value {model_value} is out of range [0, {}]", MAX_MODEL_VALUE)]
	InvalidModelValue {
		/// The rejected model weighting value.
		model_value: u32
	},
	/// The Golomb parameter is out of range.
	#[error("Golomb parameter {golomb_par} is out of range [{}, {}]", MIN_GOLOMB_PAR, MAX_GOLOMB_PAR)]
	InvalidGolombParameter {
		/// The rejected Golomb parameter.
		golomb_par: u32
	},
	/// The spillover threshold is out of range for the mode and Golomb
	/// parameter.
	#[error("spillover threshold {spill} is out of range [{}, {max_spill}] for this mode", MIN_SPILL)]
	InvalidSpill {
		/// The rejected spillover threshold.
		spill: u32,
		/// The largest threshold the mode and Golomb parameter support.
		max_spill: u32
	},
	/// The lossy rounding parameter is out of range.
	#[error("rounding parameter {round} exceeds the maximum of {}", MAX_ROUND)]
	InvalidRound {
		/// The rejected rounding parameter.
		round: u32
	},
	/// A value cannot be represented within the 32-bit codeword limit.
	#[error("a codeword for the value {value} would exceed the 32 bit limit")]
	OversizedCodeword {
		/// The value whose codeword was refused.
		value: u32
	},
	/// The output region is too small to hold the compressed bitstream.
	#[error("the output buffer is too small to hold the compressed data ({0})")]
	SmallOutputBuffer(#[from] BitpackError),
	/// The output region is too small to hold the raw big-endian samples.
	#[error("the output buffer of {capacity_bytes} byte(s) cannot hold {needed_bytes} byte(s) of raw samples")]
	SmallRawBuffer {
		/// The number of bytes the raw samples need.
		needed_bytes: usize,
		/// The output region capacity in bytes.
		capacity_bytes: usize
	}
}

impl CompressionError {
	fn is_small_buffer(&self) -> bool {
		matches!(
			self,
			Self::SmallOutputBuffer(_) | Self::SmallRawBuffer { .. }
		)
	}
}

/// Compresses the configured input region into the output region and
/// reports the outcome through `info`.
///
/// The run executes the stages in order: report initialization,
/// configuration validation, pre-processing, folding, entropy coding and
/// padding. Validation runs every check and ORs one error bit per failure
/// class into the report before the first failure is returned. Any failure
/// terminates the run with `cmp_size` zeroed in the report; on success
/// `cmp_size` holds the payload length in bits, excluding padding.
///
/// The call is synchronous, single-threaded and allocation-free, and
/// performs `O(samples)` work.
pub fn compress<R: SampleRecord>(
	cfg: CompressorConfig<'_, R>,
	mut info: Option<&mut CompressionInfo>
) -> Result<(), CompressionError> {
	let mode = CompressionMode { family: cfg.family, shape: R::SHAPE };

	if info.is_none() {
		warn!("No compression report record was provided; the outcome of this run will not be reported");
	}

	if let Some(info) = info.as_deref_mut() {
		*info = CompressionInfo {
			cmp_mode_used: mode.id(),
			model_value_used: cfg.model_value as u8,
			round_used: cfg.round as u8,
			spill_used: cfg.spill,
			golomb_par_used: cfg.golomb_par,
			samples_used: u32::try_from(cfg.input.len()).unwrap_or(u32::MAX),
			cmp_size: 0,
			cmp_err: 0
		};
	}

	let result = run(cfg, &mut info);

	if let Err(error) = &result {
		if let Some(info) = info {
			if error.is_small_buffer() {
				info.flag_error(CompressionInfo::SMALL_BUFFER_ERR);
			}
			info.cmp_size = 0;
		}
	}

	result
}

fn run<R: SampleRecord>(
	cfg: CompressorConfig<'_, R>,
	info: &mut Option<&mut CompressionInfo>
) -> Result<(), CompressionError> {
	validate(&cfg, info)?;

	let CompressorConfig {
		family,
		golomb_par,
		spill,
		model_value,
		round,
		input,
		model,
		updated_model,
		output
	} = cfg;

	let escape = match family.escape_mechanism() {
		Some(escape) => escape,
		None => {
			// Raw mode: big-endian serialization, no transformation, no
			// padding
			let needed_bytes = input.len() * R::RAW_SIZE;
			let chunks = output[..needed_bytes].chunks_exact_mut(R::RAW_SIZE);
			for (record, chunk) in input.iter().zip(chunks) {
				record.write_raw(chunk);
			}

			if let Some(info) = info.as_deref_mut() {
				info.cmp_size = (needed_bytes * 8) as u32;
			}

			return Ok(());
		}
	};

	if family.uses_model() {
		let model = model.ok_or(CompressionError::MissingModelBuffer { family })?;
		model_preprocess(input, model, updated_model, model_value, round);
	} else {
		diff_preprocess(input, round);
	}

	let zero_escape = escape == EscapeMechanism::Zero;
	for record in input.iter_mut() {
		*record = record.fold(zero_escape);
	}

	let mut writer = BitWriter::new(output);
	let mut encoder = ValueEncoder::new(&mut writer, golomb_par, spill, escape);
	for record in input.iter() {
		record.encode(&mut encoder)?;
	}
	drop(encoder);

	// The padding is not part of the payload and is not counted
	let payload_bits = writer.bit_position();
	if payload_bits > 0 {
		writer.pad_to_word_boundary()?;
	}

	if let Some(info) = info.as_deref_mut() {
		info.cmp_size = payload_bits as u32;
	}

	Ok(())
}

/// Runs every configuration check, ORs one report error bit per failure
/// class, and returns the first failure. For raw modes only the basic
/// buffer checks and the output size check apply.
fn validate<R: SampleRecord>(
	cfg: &CompressorConfig<'_, R>,
	info: &mut Option<&mut CompressionInfo>
) -> Result<(), CompressionError> {
	let samples = cfg.input.len();
	let mut first_error: Option<CompressionError> = None;

	macro_rules! fail {
		($error:expr) => {{
			let error = $error;
			error!("{error}");
			if first_error.is_none() {
				first_error = Some(error);
			}
		}};
		($error:expr, $error_bit:expr) => {{
			if let Some(info) = info.as_deref_mut() {
				info.flag_error($error_bit);
			}
			fail!($error);
		}};
	}

	if samples == 0 {
		warn!("The input buffer holds no records; nothing will be compressed. This may not be intended");
	}

	if cfg.output.is_empty() && samples > 0 {
		fail!(CompressionError::EmptyOutputBuffer { samples });
	}

	if samples > u32::MAX as usize {
		fail!(CompressionError::TooManySamples { samples });
	}

	if cfg.family.uses_model() {
		match &cfg.model {
			None => fail!(CompressionError::MissingModelBuffer { family: cfg.family }),
			Some(model) if model.len() < samples => {
				fail!(CompressionError::ShortModelBuffer {
					model_samples: model.len(),
					samples
				});
			}
			Some(_) => ()
		}

		if let Some(updated_model) = &cfg.updated_model {
			if updated_model.len() < samples {
				fail!(CompressionError::ShortUpdatedModelBuffer {
					updated_model_samples: updated_model.len(),
					samples
				});
			}
		}
	}

	if cfg.family.is_raw() {
		// No further parameter checks apply to the raw modes
		let needed_bytes = samples * R::RAW_SIZE;
		if needed_bytes > cfg.output.len() {
			fail!(
				CompressionError::SmallRawBuffer {
					needed_bytes,
					capacity_bytes: cfg.output.len()
				},
				CompressionInfo::SMALL_BUFFER_ERR
			);
		}

		return match first_error {
			Some(error) => Err(error),
			None => Ok(())
		};
	}

	if cfg.family.uses_model() && cfg.model_value > MAX_MODEL_VALUE {
		fail!(
			CompressionError::InvalidModelValue { model_value: cfg.model_value },
			CompressionInfo::MODEL_VALUE_ERR
		);
	}

	if !(MIN_GOLOMB_PAR..=MAX_GOLOMB_PAR).contains(&cfg.golomb_par) {
		fail!(
			CompressionError::InvalidGolombParameter { golomb_par: cfg.golomb_par },
			CompressionInfo::CMP_PAR_ERR
		);
	}

	let max_spill = max_spill(cfg.golomb_par, cfg.family);
	if !(MIN_SPILL..=max_spill).contains(&cfg.spill) {
		fail!(
			CompressionError::InvalidSpill { spill: cfg.spill, max_spill },
			CompressionInfo::CMP_PAR_ERR
		);
	}

	if cfg.round > MAX_ROUND {
		fail!(CompressionError::InvalidRound { round: cfg.round });
	}

	if cfg.output.len() * 3 < samples * R::RAW_SIZE {
		warn!(
			"The output buffer is more than 3 times smaller than the input; the compressed data may not fit"
		);
	}

	match first_error {
		Some(error) => Err(error),
		None => Ok(())
	}
}

#[cfg(test)]
mod test;
