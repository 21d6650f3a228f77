//! Codeword decoding for the Rice and Golomb codes, and the value decoder
//! that undoes the outlier escape protocols.

use telem_bitpack::{BitReader, BitWidth, bit_width};

use crate::DecompressionError;
use crate::compressor::encode::{CodeKind, GolombCode};
use crate::params::{EscapeMechanism, GOLOMB_PAR_EXPOSURE_FLAGS, MAX_CODEWORD_BITS, MULTI_ESCAPE_SYMBOLS};

/// Decodes folded values from a bitstream, reversing the normal
/// Golomb/Rice path and the outlier escape path of the mode.
#[derive(Debug)]
pub struct ValueDecoder<'reader, 'buffer> {
	reader: &'reader mut BitReader<'buffer>,
	code: GolombCode,
	exposure_flags_code: GolombCode,
	spill: u32,
	escape: EscapeMechanism
}

impl<'reader, 'buffer> ValueDecoder<'reader, 'buffer> {
	pub(crate) fn new(
		reader: &'reader mut BitReader<'buffer>,
		golomb_par: u32,
		spill: u32,
		escape: EscapeMechanism
	) -> Self {
		Self {
			reader,
			code: GolombCode::new(golomb_par),
			exposure_flags_code: GolombCode::new(GOLOMB_PAR_EXPOSURE_FLAGS),
			spill,
			escape
		}
	}

	/// Decodes one folded value whose originating field is `width` bits
	/// wide, resolving escape symbols into their raw payloads.
	pub fn decode_value(&mut self, width: BitWidth) -> Result<u32, DecompressionError> {
		let symbol = self.decode_codeword(self.code)?;

		match self.escape {
			EscapeMechanism::Zero => {
				if symbol == 0 {
					// The payload after the escape is the folded value at
					// the full field width, uninterpreted
					Ok(self.reader.read_bits(width)?)
				} else {
					Ok(symbol)
				}
			}
			EscapeMechanism::Multi => {
				if symbol < self.spill {
					return Ok(symbol);
				}

				let offset = symbol - self.spill;
				if offset >= MULTI_ESCAPE_SYMBOLS {
					return Err(DecompressionError::InvalidEscapeSymbol { symbol });
				}

				// offset is at most 15, so the width always fits
				let raw_width = BitWidth::new(((offset + 1) * 2) as u8)
					.ok_or(DecompressionError::InvalidEscapeSymbol { symbol })?;
				let unencoded = self.reader.read_bits(raw_width)?;

				Ok(unencoded.wrapping_add(self.spill))
			}
		}
	}

	/// Decodes the exposure flags of an S_FX record, which are always on
	/// the normal path with the dedicated fixed parameter.
	pub fn decode_exposure_flags(&mut self) -> Result<u32, DecompressionError> {
		self.decode_codeword(self.exposure_flags_code)
	}

	fn decode_codeword(&mut self, code: GolombCode) -> Result<u32, DecompressionError> {
		let quotient = self.read_unary(code)?;

		match code.kind {
			CodeKind::Rice => {
				let remainder = self.reader.read_bits(width_of(code.log2_par))?;

				Ok((quotient << code.log2_par) | remainder)
			}
			CodeKind::Golomb => {
				// Truncated binary remainder: the values below the cutoff
				// take one bit fewer than the rest
				let mut remainder = self.reader.read_bits(width_of(code.log2_par))?;
				if remainder >= code.cutoff() {
					let extra_bit = u32::from(self.reader.read_bit()?);
					remainder = (remainder << 1 | extra_bit) - code.cutoff();
				}

				Ok(quotient * code.par + remainder)
			}
		}
	}

	/// Reads the unary quotient of a codeword: the run of ones before the
	/// stop bit. A quotient that cannot belong to any codeword within the
	/// 32-bit length limit is rejected before it can run away.
	fn read_unary(&mut self, code: GolombCode) -> Result<u32, DecompressionError> {
		let longest_quotient = MAX_CODEWORD_BITS - 1 - code.log2_par;
		let mut quotient = 0;

		while self.reader.read_bit()? {
			quotient += 1;
			if quotient > longest_quotient {
				return Err(DecompressionError::OversizedCodeword);
			}
		}

		Ok(quotient)
	}
}

/// Builds the run-time width of a code's remainder field. Golomb
/// parameters are limited such that this is always at most 31 bits.
fn width_of(log2_par: u32) -> BitWidth {
	BitWidth::new(log2_par as u8).unwrap_or(bit_width!(31))
}
