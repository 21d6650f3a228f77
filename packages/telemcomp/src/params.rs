//! Compression modes, parameter limits and the compression report shared by
//! the compressor, the decompressor and their hardware peer.

use thiserror::Error;

/// The largest supported model weighting value. A weight of this value
/// keeps the model unchanged, a weight of zero replaces it with the
/// observed data.
pub const MAX_MODEL_VALUE: u32 = 16;

/// The smallest supported Golomb parameter.
pub const MIN_GOLOMB_PAR: u32 = 1;

/// The largest supported Golomb parameter. The limit keeps every shift in
/// the codeword construction within a 32-bit word.
pub const MAX_GOLOMB_PAR: u32 = 0x7FFF_FFFF;

/// The smallest supported spillover threshold.
pub const MIN_SPILL: u32 = 2;

/// The largest supported lossy rounding parameter, in dropped bits.
pub const MAX_ROUND: u32 = 3;

/// The longest codeword, in bits, the entropy coder may emit for a single
/// value. The hardware peer renders codewords into 32-bit registers, so
/// this limit is wire-observable.
pub const MAX_CODEWORD_BITS: u32 = 32;

/// The number of escape symbols reserved above the spillover threshold by
/// the multi escape mechanism (`spill + 0` up to `spill + 15`).
pub const MULTI_ESCAPE_SYMBOLS: u32 = 16;

/// The fixed Golomb parameter used to encode the exposure flags field of
/// the S_FX sample shape. With this parameter every folded 8-bit value has
/// a codeword of at most 20 bits, so the field can never overrun the
/// codeword length limit.
pub const GOLOMB_PAR_EXPOSURE_FLAGS: u32 = 16;

/// The transformation family of a compression mode: what the pre-processor
/// does to the samples and which outlier escape mechanism the entropy
/// coder uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeFamily {
	/// No transformation and no entropy coding: samples are copied to the
	/// output in big-endian byte order.
	Raw,
	/// Model prediction residuals with the zero escape mechanism.
	ModelZero,
	/// 1D-difference residuals with the zero escape mechanism.
	DiffZero,
	/// Model prediction residuals with the multi escape mechanism.
	ModelMulti,
	/// 1D-difference residuals with the multi escape mechanism.
	DiffMulti
}

/// The outlier escape mechanism used by the entropy coder of a non-raw
/// compression mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EscapeMechanism {
	/// The folded value 0 is reserved as the escape symbol and every other
	/// folded value is incremented by one. The escape codeword is followed
	/// by the symbol, uninterpreted, at the full width of its field.
	Zero,
	/// The sixteen symbols at and above the spillover threshold are
	/// reserved as graduated escape symbols, each followed by the distance
	/// to the threshold in a raw field whose width scales with magnitude.
	Multi
}

impl ModeFamily {
	/// Returns whether this family passes samples through untransformed.
	pub const fn is_raw(self) -> bool {
		matches!(self, Self::Raw)
	}

	/// Returns whether this family predicts samples with a per-sample
	/// model and therefore needs model buffers.
	pub const fn uses_model(self) -> bool {
		matches!(self, Self::ModelZero | Self::ModelMulti)
	}

	/// Returns whether this family computes 1D-difference residuals.
	pub const fn uses_diff(self) -> bool {
		matches!(self, Self::DiffZero | Self::DiffMulti)
	}

	/// Returns the outlier escape mechanism of this family, or `None` for
	/// the raw family, which does not entropy-code at all.
	pub const fn escape_mechanism(self) -> Option<EscapeMechanism> {
		match self {
			Self::Raw => None,
			Self::ModelZero | Self::DiffZero => Some(EscapeMechanism::Zero),
			Self::ModelMulti | Self::DiffMulti => Some(EscapeMechanism::Multi)
		}
	}

	const fn id_offset(self) -> u8 {
		match self {
			Self::Raw => 0,
			Self::ModelZero => 1,
			Self::DiffZero => 2,
			Self::ModelMulti => 3,
			Self::DiffMulti => 4
		}
	}

	const fn from_id_offset(offset: u8) -> Option<Self> {
		match offset {
			0 => Some(Self::Raw),
			1 => Some(Self::ModelZero),
			2 => Some(Self::DiffZero),
			3 => Some(Self::ModelMulti),
			4 => Some(Self::DiffMulti),
			_ => None
		}
	}
}

/// The record layout of the samples a compression mode operates on.
///
/// Every shape is carried by exactly one Rust type implementing
/// [`SampleRecord`](crate::SampleRecord); the shape tag exists so the
/// 8-bit mode identifier in the [compression report](CompressionInfo) can
/// describe the full mode to peers that exchange reports as plain bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleShape {
	/// A single 16-bit value per record.
	U16,
	/// A single 32-bit value per record.
	U32,
	/// Exposure flags and a normal flux value.
	SFx,
	/// Exposure flags, a normal and an extended flux value.
	SFxEfx,
	/// Exposure flags, a normal flux value and a center-of-brightness
	/// coordinate pair.
	SFxNcob,
	/// Exposure flags, normal and extended flux values and both
	/// center-of-brightness coordinate pairs.
	SFxEfxNcobEcob,
	/// A single 32-bit fast-cadence flux value per record.
	FFx
}

impl SampleShape {
	const fn id_base(self) -> u8 {
		match self {
			Self::U16 => 0,
			Self::U32 => 8,
			Self::SFx => 16,
			Self::SFxEfx => 24,
			Self::SFxNcob => 32,
			Self::SFxEfxNcobEcob => 40,
			Self::FFx => 48
		}
	}

	const fn from_id_base(base: u8) -> Option<Self> {
		match base {
			0 => Some(Self::U16),
			8 => Some(Self::U32),
			16 => Some(Self::SFx),
			24 => Some(Self::SFxEfx),
			32 => Some(Self::SFxNcob),
			40 => Some(Self::SFxEfxNcobEcob),
			48 => Some(Self::FFx),
			_ => None
		}
	}
}

/// A complete compression mode: a transformation family applied to a
/// sample shape.
///
/// Modes convert to and from stable 8-bit identifiers. Each shape owns a
/// block of eight identifiers and the family selects the entry within the
/// block, so the identifier table is closed under future shape additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressionMode {
	/// The transformation family.
	pub family: ModeFamily,
	/// The sample shape.
	pub shape: SampleShape
}

/// The error type for fallible conversions from an 8-bit identifier to a
/// [`CompressionMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown compression mode identifier: {0}")]
pub struct UnknownModeId(u8);

impl UnknownModeId {
	/// Returns the identifier whose conversion failed.
	pub const fn identifier(&self) -> u8 {
		self.0
	}
}

impl CompressionMode {
	/// Returns the stable 8-bit identifier of this mode, as echoed in the
	/// [compression report](CompressionInfo).
	pub const fn id(self) -> u8 {
		self.shape.id_base() + self.family.id_offset()
	}
}

impl TryFrom<u8> for CompressionMode {
	type Error = UnknownModeId;

	fn try_from(id: u8) -> Result<Self, Self::Error> {
		let shape = SampleShape::from_id_base(id & !0x7).ok_or(UnknownModeId(id))?;
		let family = ModeFamily::from_id_offset(id & 0x7).ok_or(UnknownModeId(id))?;

		Ok(Self { family, shape })
	}
}

/// Computes the largest spillover threshold usable with the specified
/// Golomb parameter and mode family, derived from the codeword length
/// limit: with `k = ⌊log₂ m⌋` and `cutoff = 2^(k+1) − m`, the largest
/// value whose codeword still fits is `(31 − k)·m + cutoff − 1`. The
/// multi escape mechanism additionally needs its sixteen escape symbols
/// above the threshold to be encodable, while the zero escape mechanism
/// only ever encodes symbols below the threshold.
///
/// Returns 0 for the raw family and for out-of-range Golomb parameters,
/// making every spillover threshold invalid for them.
pub fn max_spill(golomb_par: u32, family: ModeFamily) -> u32 {
	if !(MIN_GOLOMB_PAR..=MAX_GOLOMB_PAR).contains(&golomb_par) {
		return 0;
	}

	let log2_par = golomb_par.ilog2();
	let cutoff = (2u32 << log2_par) - golomb_par;
	let max_encodable = (MAX_CODEWORD_BITS - 1 - log2_par) * golomb_par + cutoff - 1;

	match family.escape_mechanism() {
		Some(EscapeMechanism::Multi) => max_encodable - MULTI_ESCAPE_SYMBOLS + 1,
		Some(EscapeMechanism::Zero) => max_encodable + 1,
		None => 0
	}
}

/// The report of one compression run: the parameters that were in effect,
/// truncated to the widths of the on-wire report format, the resulting
/// payload size and an error bitset describing why a run failed.
///
/// The report doubles as the decompression contract: together with the
/// compressed bytes it carries everything the decompressor needs to
/// reconstruct the samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionInfo {
	/// The identifier of the compression mode used.
	pub cmp_mode_used: u8,
	/// The model weighting value used, truncated to 8 bits.
	pub model_value_used: u8,
	/// The lossy rounding parameter used, truncated to 8 bits.
	pub round_used: u8,
	/// The spillover threshold used.
	pub spill_used: u32,
	/// The Golomb parameter used.
	pub golomb_par_used: u32,
	/// The number of records that were compressed.
	pub samples_used: u32,
	/// The length of the compressed payload in bits, excluding padding.
	/// Zero after a failed run.
	pub cmp_size: u32,
	/// The error bitset of the run. Zero after a successful run.
	pub cmp_err: u8
}

impl CompressionInfo {
	/// Error bit: the compression mode is not supported.
	pub const MODE_ERR: u8 = 1 << 0;
	/// Error bit: the model weighting value is out of range.
	pub const MODEL_VALUE_ERR: u8 = 1 << 1;
	/// Error bit: the Golomb parameter or the spillover threshold is out
	/// of range for the mode.
	pub const CMP_PAR_ERR: u8 = 1 << 2;
	/// Error bit: the output buffer is too small to hold the compressed
	/// data.
	pub const SMALL_BUFFER_ERR: u8 = 1 << 3;

	/// Returns whether the specified error bit is set in this report.
	pub const fn has_error(&self, error_bit: u8) -> bool {
		self.cmp_err & error_bit != 0
	}

	pub(crate) fn flag_error(&mut self, error_bit: u8) {
		self.cmp_err |= error_bit;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mode_identifiers_roundtrip() {
		let families = [
			ModeFamily::Raw,
			ModeFamily::ModelZero,
			ModeFamily::DiffZero,
			ModeFamily::ModelMulti,
			ModeFamily::DiffMulti
		];
		let shapes = [
			SampleShape::U16,
			SampleShape::U32,
			SampleShape::SFx,
			SampleShape::SFxEfx,
			SampleShape::SFxNcob,
			SampleShape::SFxEfxNcobEcob,
			SampleShape::FFx
		];

		for family in families {
			for shape in shapes {
				let mode = CompressionMode { family, shape };
				assert_eq!(CompressionMode::try_from(mode.id()), Ok(mode));
			}
		}
	}

	#[test]
	fn unknown_mode_identifiers_are_rejected() {
		// Offsets 5 to 7 of every shape block are unassigned, and so is
		// everything past the F_FX block
		assert_eq!(CompressionMode::try_from(5), Err(UnknownModeId(5)));
		assert_eq!(CompressionMode::try_from(23), Err(UnknownModeId(23)));
		assert_eq!(CompressionMode::try_from(56), Err(UnknownModeId(56)));
		assert_eq!(CompressionMode::try_from(0xFF), Err(UnknownModeId(0xFF)));
	}

	#[test]
	fn max_spill_honors_the_codeword_length_limit() {
		// For a power of two parameter m = 2^k the largest encodable value
		// is (32 − k)·m − 1
		assert_eq!(max_spill(1, ModeFamily::DiffZero), 32);
		assert_eq!(max_spill(1, ModeFamily::DiffMulti), 16);
		assert_eq!(max_spill(4, ModeFamily::DiffZero), 120);
		assert_eq!(max_spill(4, ModeFamily::DiffMulti), 104);

		// m = 3: k = 1, cutoff = 1, so values up to 30·3 + 1 − 1 = 90 fit
		assert_eq!(max_spill(3, ModeFamily::ModelZero), 91);
		assert_eq!(max_spill(3, ModeFamily::ModelMulti), 75);
	}

	#[test]
	fn max_spill_is_zero_for_unusable_parameters() {
		assert_eq!(max_spill(0, ModeFamily::DiffZero), 0);
		assert_eq!(max_spill(MAX_GOLOMB_PAR + 1, ModeFamily::DiffZero), 0);
		assert_eq!(max_spill(4, ModeFamily::Raw), 0);
	}

	#[test]
	fn error_bits_accumulate() {
		let mut info = CompressionInfo::default();

		info.flag_error(CompressionInfo::CMP_PAR_ERR);
		info.flag_error(CompressionInfo::SMALL_BUFFER_ERR);

		assert!(info.has_error(CompressionInfo::CMP_PAR_ERR));
		assert!(info.has_error(CompressionInfo::SMALL_BUFFER_ERR));
		assert!(!info.has_error(CompressionInfo::MODE_ERR));
	}
}
