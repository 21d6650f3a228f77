//! The closed set of telemetry record layouts the pipeline is polymorphic
//! over, and the per-field arithmetic every pipeline stage is built from.
//!
//! Each sample shape implements [`SampleRecord`] once; the compressor and
//! decompressor drivers are generic over the trait, so the per-stage
//! behavior of a shape (which fields it has, their widths and their order
//! on the wire) lives in exactly one place.

use telem_bitpack::bit_width;

use crate::compressor::ValueEncoder;
use crate::decompressor::ValueDecoder;
use crate::params::{MAX_MODEL_VALUE, SampleShape};
use crate::{CompressionError, DecompressionError};

/// A telemetry record the compression pipeline can operate on.
///
/// The trait exposes one hook per pipeline stage: lossy rounding and its
/// inverse, field-wise modular arithmetic for the difference and model
/// pre-processors, the signed-to-unsigned fold and its inverse, entropy
/// encoding and decoding of the fields in their fixed wire order, and the
/// big-endian serialization used by the raw modes.
///
/// The set of record layouts is fixed by the wire format shared with the
/// hardware peer; implementing this trait for further types is not
/// supported.
pub trait SampleRecord: Copy {
	/// The shape tag of this record layout, used to form mode identifiers.
	const SHAPE: SampleShape;

	/// The serialized size of one record in the raw modes, in bytes.
	const RAW_SIZE: usize;

	/// Drops the `round` least significant bits of every lossy field.
	fn lossy_round(self, round: u32) -> Self;

	/// Scales every lossy field back up by `round` bits, approximating the
	/// value [`lossy_round`](Self::lossy_round) consumed.
	fn restore_round(self, round: u32) -> Self;

	/// Field-wise modular subtraction at each field's natural width. The
	/// wrap-around on underflow is intended and undone by the decoder's
	/// matching modular addition.
	fn wrapping_sub(self, other: Self) -> Self;

	/// Field-wise modular addition at each field's natural width.
	fn wrapping_add(self, other: Self) -> Self;

	/// Computes the updated model record from this observed record and the
	/// previous model record, as the field-wise weighted mean
	/// `(observed·(16 − model_value) + model·model_value) / 16`. The
	/// decompressor applies the identical update to stay synchronized.
	fn update_model(self, model: Self, model_value: u32) -> Self;

	/// Folds the signed interpretation of every field into a non-negative
	/// codebook index. With `zero_escape` set, every field except exposure
	/// flags is additionally incremented by one (modular at the field
	/// width) so the index 0 remains reserved as the escape symbol.
	fn fold(self, zero_escape: bool) -> Self;

	/// The inverse of [`fold`](Self::fold).
	fn unfold(self, zero_escape: bool) -> Self;

	/// Entropy-encodes the fields of this record in their wire order.
	fn encode(self, encoder: &mut ValueEncoder<'_, '_>) -> Result<(), CompressionError>;

	/// Decodes one record from the bitstream, field by field in wire
	/// order. The returned record still holds folded values.
	fn decode(decoder: &mut ValueDecoder<'_, '_>) -> Result<Self, DecompressionError>;

	/// Serializes this record into `bytes` with every field in big-endian
	/// byte order.
	///
	/// # Panics
	/// If `bytes` is shorter than [`RAW_SIZE`](Self::RAW_SIZE).
	fn write_raw(self, bytes: &mut [u8]);

	/// Deserializes one record from `bytes`, with every field in
	/// big-endian byte order.
	///
	/// # Panics
	/// If `bytes` is shorter than [`RAW_SIZE`](Self::RAW_SIZE).
	fn read_raw(bytes: &[u8]) -> Self;
}

/// Generates the fold and unfold functions for one unsigned field width.
///
/// The fold is the zig-zag map `x ≥ 0 → 2x`, `x < 0 → −2x − 1` computed on
/// the signed interpretation of the stored bits, with modular arithmetic
/// throughout: the minimum signed value folds to the all-ones bit pattern,
/// and unfolding takes it back.
macro_rules! fold_fns {
	($fold:ident, $unfold:ident, $unsigned:ty, $signed:ty) => {
		const fn $fold(value: $unsigned) -> $unsigned {
			if (value as $signed) < 0 {
				value.wrapping_neg().wrapping_mul(2).wrapping_sub(1)
			} else {
				value.wrapping_mul(2)
			}
		}

		const fn $unfold(value: $unsigned) -> $unsigned {
			if value & 1 != 0 {
				(value / 2).wrapping_add(1).wrapping_neg()
			} else {
				value / 2
			}
		}
	};
}

fold_fns!(fold_u8, unfold_u8, u8, i8);
fold_fns!(fold_u16, unfold_u16, u16, i16);
fold_fns!(fold_u32, unfold_u32, u32, i32);

/// The model update at 32 bits: a weighted mean of the observed value and
/// the previous model, computed without intermediate overflow.
fn update_model_u32(observed: u32, model: u32, model_value: u32) -> u32 {
	let weighted = u64::from(observed) * u64::from(MAX_MODEL_VALUE - model_value)
		+ u64::from(model) * u64::from(model_value);

	(weighted / u64::from(MAX_MODEL_VALUE)) as u32
}

fn update_model_u16(observed: u16, model: u16, model_value: u32) -> u16 {
	update_model_u32(u32::from(observed), u32::from(model), model_value) as u16
}

fn update_model_u8(observed: u8, model: u8, model_value: u32) -> u8 {
	update_model_u32(u32::from(observed), u32::from(model), model_value) as u8
}

impl SampleRecord for u16 {
	const SHAPE: SampleShape = SampleShape::U16;
	const RAW_SIZE: usize = 2;

	fn lossy_round(self, round: u32) -> Self {
		self >> round
	}

	fn restore_round(self, round: u32) -> Self {
		self << round
	}

	fn wrapping_sub(self, other: Self) -> Self {
		u16::wrapping_sub(self, other)
	}

	fn wrapping_add(self, other: Self) -> Self {
		u16::wrapping_add(self, other)
	}

	fn update_model(self, model: Self, model_value: u32) -> Self {
		update_model_u16(self, model, model_value)
	}

	fn fold(self, zero_escape: bool) -> Self {
		fold_u16(self).wrapping_add(zero_escape as u16)
	}

	fn unfold(self, zero_escape: bool) -> Self {
		unfold_u16(u16::wrapping_sub(self, zero_escape as u16))
	}

	fn encode(self, encoder: &mut ValueEncoder<'_, '_>) -> Result<(), CompressionError> {
		encoder.encode_value(u32::from(self), bit_width!(16))
	}

	fn decode(decoder: &mut ValueDecoder<'_, '_>) -> Result<Self, DecompressionError> {
		Ok(decoder.decode_value(bit_width!(16))? as u16)
	}

	fn write_raw(self, bytes: &mut [u8]) {
		bytes[..2].copy_from_slice(&self.to_be_bytes());
	}

	fn read_raw(bytes: &[u8]) -> Self {
		u16::from_be_bytes([bytes[0], bytes[1]])
	}
}

impl SampleRecord for u32 {
	const SHAPE: SampleShape = SampleShape::U32;
	const RAW_SIZE: usize = 4;

	fn lossy_round(self, round: u32) -> Self {
		self >> round
	}

	fn restore_round(self, round: u32) -> Self {
		self << round
	}

	fn wrapping_sub(self, other: Self) -> Self {
		u32::wrapping_sub(self, other)
	}

	fn wrapping_add(self, other: Self) -> Self {
		u32::wrapping_add(self, other)
	}

	fn update_model(self, model: Self, model_value: u32) -> Self {
		update_model_u32(self, model, model_value)
	}

	fn fold(self, zero_escape: bool) -> Self {
		fold_u32(self).wrapping_add(zero_escape as u32)
	}

	fn unfold(self, zero_escape: bool) -> Self {
		unfold_u32(u32::wrapping_sub(self, zero_escape as u32))
	}

	fn encode(self, encoder: &mut ValueEncoder<'_, '_>) -> Result<(), CompressionError> {
		encoder.encode_value(self, bit_width!(32))
	}

	fn decode(decoder: &mut ValueDecoder<'_, '_>) -> Result<Self, DecompressionError> {
		decoder.decode_value(bit_width!(32))
	}

	fn write_raw(self, bytes: &mut [u8]) {
		bytes[..4].copy_from_slice(&self.to_be_bytes());
	}

	fn read_raw(bytes: &[u8]) -> Self {
		u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
	}
}

/// A fast-cadence flux record: a single 32-bit flux value. The record
/// layout matches [`u32`], but fast-cadence flux data carries its own
/// compression mode identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct FFx(
	/// The flux value of this record.
	pub u32
);

impl SampleRecord for FFx {
	const SHAPE: SampleShape = SampleShape::FFx;
	const RAW_SIZE: usize = 4;

	fn lossy_round(self, round: u32) -> Self {
		Self(self.0 >> round)
	}

	fn restore_round(self, round: u32) -> Self {
		Self(self.0 << round)
	}

	fn wrapping_sub(self, other: Self) -> Self {
		Self(self.0.wrapping_sub(other.0))
	}

	fn wrapping_add(self, other: Self) -> Self {
		Self(self.0.wrapping_add(other.0))
	}

	fn update_model(self, model: Self, model_value: u32) -> Self {
		Self(update_model_u32(self.0, model.0, model_value))
	}

	fn fold(self, zero_escape: bool) -> Self {
		Self(SampleRecord::fold(self.0, zero_escape))
	}

	fn unfold(self, zero_escape: bool) -> Self {
		Self(SampleRecord::unfold(self.0, zero_escape))
	}

	fn encode(self, encoder: &mut ValueEncoder<'_, '_>) -> Result<(), CompressionError> {
		encoder.encode_value(self.0, bit_width!(32))
	}

	fn decode(decoder: &mut ValueDecoder<'_, '_>) -> Result<Self, DecompressionError> {
		Ok(Self(decoder.decode_value(bit_width!(32))?))
	}

	fn write_raw(self, bytes: &mut [u8]) {
		self.0.write_raw(bytes);
	}

	fn read_raw(bytes: &[u8]) -> Self {
		Self(u32::read_raw(bytes))
	}
}

/// Generates a compound record struct and its [`SampleRecord`]
/// implementation from a field list.
///
/// The exposure flags field is always first, is 8 bits wide and follows
/// the special conventions of that field: it never takes part in the zero
/// escape increment, and (for the S_FX shape only) it is entropy-coded
/// through the dedicated fixed-parameter path. All remaining fields are
/// 32-bit values in the declared wire order.
macro_rules! compound_record {
	(
		$(#[$doc:meta])*
		$name:ident, $shape:ident, $raw_size:expr, flags_via_fixed_code: $fixed_flags:tt,
		fields: [$($field:ident),+]
	) => {
		$(#[$doc])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
		pub struct $name {
			/// The exposure flags of this record.
			pub exposure_flags: u8,
			$(
				/// A 32-bit data field of this record.
				pub $field: u32,
			)+
		}

		impl SampleRecord for $name {
			const SHAPE: SampleShape = SampleShape::$shape;
			const RAW_SIZE: usize = $raw_size;

			fn lossy_round(self, round: u32) -> Self {
				// Exposure flags are a bit field, not a measurement, and
				// are never rounded
				Self {
					exposure_flags: self.exposure_flags,
					$($field: self.$field >> round,)+
				}
			}

			fn restore_round(self, round: u32) -> Self {
				Self {
					exposure_flags: self.exposure_flags,
					$($field: self.$field << round,)+
				}
			}

			fn wrapping_sub(self, other: Self) -> Self {
				Self {
					exposure_flags: self.exposure_flags.wrapping_sub(other.exposure_flags),
					$($field: self.$field.wrapping_sub(other.$field),)+
				}
			}

			fn wrapping_add(self, other: Self) -> Self {
				Self {
					exposure_flags: self.exposure_flags.wrapping_add(other.exposure_flags),
					$($field: self.$field.wrapping_add(other.$field),)+
				}
			}

			fn update_model(self, model: Self, model_value: u32) -> Self {
				Self {
					exposure_flags: update_model_u8(
						self.exposure_flags,
						model.exposure_flags,
						model_value
					),
					$($field: update_model_u32(self.$field, model.$field, model_value),)+
				}
			}

			fn fold(self, zero_escape: bool) -> Self {
				Self {
					exposure_flags: fold_u8(self.exposure_flags),
					$($field: fold_u32(self.$field).wrapping_add(zero_escape as u32),)+
				}
			}

			fn unfold(self, zero_escape: bool) -> Self {
				Self {
					exposure_flags: unfold_u8(self.exposure_flags),
					$($field: unfold_u32(self.$field.wrapping_sub(zero_escape as u32)),)+
				}
			}

			fn encode(self, encoder: &mut ValueEncoder<'_, '_>) -> Result<(), CompressionError> {
				compound_record!(@encode_flags $fixed_flags, self, encoder);
				$(encoder.encode_value(self.$field, bit_width!(32))?;)+
				Ok(())
			}

			fn decode(decoder: &mut ValueDecoder<'_, '_>) -> Result<Self, DecompressionError> {
				Ok(Self {
					exposure_flags: compound_record!(@decode_flags $fixed_flags, decoder),
					$($field: decoder.decode_value(bit_width!(32))?,)+
				})
			}

			fn write_raw(self, bytes: &mut [u8]) {
				bytes[0] = self.exposure_flags;
				let mut offset = 1;
				$(
					bytes[offset..offset + 4].copy_from_slice(&self.$field.to_be_bytes());
					offset += 4;
				)+
				let _ = offset;
			}

			fn read_raw(bytes: &[u8]) -> Self {
				let mut offset = 1;
				Self {
					exposure_flags: bytes[0],
					$($field: {
						let field = u32::from_be_bytes([
							bytes[offset],
							bytes[offset + 1],
							bytes[offset + 2],
							bytes[offset + 3]
						]);
						offset += 4;
						let _ = offset;
						field
					},)+
				}
			}
		}
	};

	(@encode_flags fixed, $self:ident, $encoder:ident) => {
		$encoder.encode_exposure_flags($self.exposure_flags.into())?
	};
	(@encode_flags generic, $self:ident, $encoder:ident) => {
		$encoder.encode_value($self.exposure_flags.into(), bit_width!(8))?
	};
	(@decode_flags fixed, $decoder:ident) => {
		$decoder.decode_exposure_flags()? as u8
	};
	(@decode_flags generic, $decoder:ident) => {
		$decoder.decode_value(bit_width!(8))? as u8
	};
}

compound_record! {
	/// A normal-cadence star record: exposure flags and a flux value.
	///
	/// Uniquely among the compound shapes, the exposure flags of this
	/// record are entropy-coded through the normal path with the dedicated
	/// [`GOLOMB_PAR_EXPOSURE_FLAGS`](crate::GOLOMB_PAR_EXPOSURE_FLAGS)
	/// parameter, bypassing the outlier escape logic entirely.
	SFx, SFx, 5, flags_via_fixed_code: fixed,
	fields: [fx]
}

compound_record! {
	/// A star record with a normal and an extended flux value.
	SFxEfx, SFxEfx, 9, flags_via_fixed_code: generic,
	fields: [fx, efx]
}

compound_record! {
	/// A star record with a flux value and a center-of-brightness
	/// coordinate pair.
	SFxNcob, SFxNcob, 13, flags_via_fixed_code: generic,
	fields: [fx, ncob_x, ncob_y]
}

compound_record! {
	/// A star record with normal and extended flux values and both
	/// center-of-brightness coordinate pairs.
	SFxEfxNcobEcob, SFxEfxNcobEcob, 25, flags_via_fixed_code: generic,
	fields: [fx, ncob_x, ncob_y, efx, ecob_x, ecob_y]
}
