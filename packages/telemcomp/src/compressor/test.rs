use test_log::test;

use super::*;
use crate::record::{SFx, SFxNcob};

/// Runs a compression with the given parameters over `input`, expecting
/// success, and returns the report together with the padded output bytes.
fn compress_expecting_success<R: SampleRecord>(
	family: ModeFamily,
	golomb_par: u32,
	spill: u32,
	input: &mut [R],
	output_capacity: usize
) -> (CompressionInfo, Vec<u8>) {
	let mut output = vec![0xA5; output_capacity];
	let mut info = CompressionInfo::default();

	compress(
		CompressorConfig {
			family,
			golomb_par,
			spill,
			model_value: 0,
			round: 0,
			input,
			model: None,
			updated_model: None,
			output: &mut output
		},
		Some(&mut info)
	)
	.expect("Unexpected compression error");

	(info, output)
}

#[test]
fn diff_zero_streams_match_the_reference_bits() {
	// Residuals [10, 1, 2, -3] fold to [20, 2, 4, 5] and shift up by one
	// for the reserved zero symbol; 21 is above the threshold and escapes
	// with the Rice codeword for 0 followed by 16 raw bits
	let mut input: [u16; 4] = [10, 11, 13, 10];

	let (info, output) = compress_expecting_success(ModeFamily::DiffZero, 4, 8, &mut input, 8);

	assert_eq!(info.cmp_size, 30);
	assert_eq!(info.cmp_err, 0);
	assert_eq!(&output[..4], &[0x00, 0x02, 0xAE, 0x68]);
	// The stream is padded to a word boundary and goes no further
	assert_eq!(&output[4..], &[0xA5; 4]);
}

#[test]
fn model_multi_streams_match_the_reference_bits() {
	let mut input: [u16; 2] = [100, 105];
	let mut model: [u16; 2] = [99, 106];
	let mut output = [0u8; 4];
	let mut info = CompressionInfo::default();

	compress(
		CompressorConfig {
			family: ModeFamily::ModelMulti,
			golomb_par: 3,
			spill: 6,
			model_value: 8,
			round: 0,
			input: &mut input,
			model: Some(&mut model),
			updated_model: None,
			output: &mut output
		},
		Some(&mut info)
	)
	.expect("Unexpected compression error");

	// Residuals 1 and -1 fold to the Golomb codewords 010 and 011
	assert_eq!(info.cmp_size, 6);
	assert_eq!(output, [0x68, 0x00, 0x00, 0x00]);
	// The model is updated in place with the floored weighted mean
	assert_eq!(model, [99, 105]);
}

#[test]
fn model_updates_to_a_separate_region_leave_the_model_intact() {
	let run = |updated_region: bool| {
		let mut input: [u16; 2] = [100, 105];
		let mut model: [u16; 2] = [99, 106];
		let mut updated_model: [u16; 2] = [0, 0];
		let mut output = [0u8; 4];

		compress(
			CompressorConfig {
				family: ModeFamily::ModelMulti,
				golomb_par: 3,
				spill: 6,
				model_value: 8,
				round: 0,
				input: &mut input,
				model: Some(&mut model),
				updated_model: updated_region.then_some(&mut updated_model[..]),
				output: &mut output
			},
			None
		)
		.expect("Unexpected compression error");

		(output, if updated_region { updated_model } else { model })
	};

	// The stream and the updated model must not depend on where the
	// update is stored
	assert_eq!(run(false), run(true));
}

#[test]
fn raw_streams_are_big_endian_samples() {
	let mut input: [u16; 3] = [0x1234, 0x5678, 0x9ABC];

	let (info, output) = compress_expecting_success(ModeFamily::Raw, 4, 8, &mut input, 6);

	assert_eq!(info.cmp_size, 48);
	assert_eq!(output, [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
	// Raw streams are not transformed: the input is left untouched
	assert_eq!(input, [0x1234, 0x5678, 0x9ABC]);
}

#[test]
fn raw_streams_refuse_too_small_buffers() {
	let mut input: [u16; 3] = [0x1234, 0x5678, 0x9ABC];
	let mut output = [0u8; 5];
	let mut info = CompressionInfo::default();

	let result = compress(
		CompressorConfig {
			family: ModeFamily::Raw,
			golomb_par: 4,
			spill: 8,
			model_value: 0,
			round: 0,
			input: &mut input,
			model: None,
			updated_model: None,
			output: &mut output
		},
		Some(&mut info)
	);

	assert_eq!(
		result,
		Err(CompressionError::SmallRawBuffer {
			needed_bytes: 6,
			capacity_bytes: 5
		})
	);
	assert!(info.has_error(CompressionInfo::SMALL_BUFFER_ERR));
	assert_eq!(info.cmp_size, 0);
}

#[test]
fn multi_escape_symbols_carry_magnitude_scaled_payloads() {
	// The folded value 42 exceeds the threshold by 32, which the offset
	// table places in the third magnitude class: escape symbol 12, then
	// 6 raw bits
	let mut input: [u16; 1] = [21];

	let (info, output) = compress_expecting_success(ModeFamily::DiffMulti, 5, 10, &mut input, 4);

	// Golomb codeword for 12 (11010), then 100000
	assert_eq!(info.cmp_size, 11);
	assert_eq!(output, [0xD4, 0x00, 0x00, 0x00]);
}

#[test]
fn s_fx_exposure_flags_use_the_dedicated_normal_path() {
	let mut input = [SFx { exposure_flags: 1, fx: 0 }];

	let (info, output) = compress_expecting_success(ModeFamily::DiffZero, 4, 4, &mut input, 4);

	// The flags fold to 2 and take the fixed-parameter Rice codeword
	// 00010; the flux folds to 0 and shifts to the symbol 1, which stays
	// on the normal path as 001
	assert_eq!(info.cmp_size, 8);
	assert_eq!(output, [0x11, 0x00, 0x00, 0x00]);
}

#[test]
fn wrapped_zero_symbols_take_the_escape_path() {
	// A flux residual at the minimum signed value folds to all ones and
	// wraps to the reserved symbol on the zero escape increment; the
	// escape payload carries it at the full field width
	let mut input = [SFx {
		exposure_flags: 0,
		fx: i32::MIN as u32
	}];

	let (info, _) = compress_expecting_success(ModeFamily::DiffZero, 4, 4, &mut input, 8);

	// Flags codeword (5 bits), flux escape codeword (3 bits), 32 raw bits
	assert_eq!(info.cmp_size, 40);
}

#[test]
fn empty_inputs_succeed_with_an_empty_stream() {
	let mut input: [u16; 0] = [];
	let mut output = [0xA5u8; 4];
	let mut info = CompressionInfo::default();

	compress(
		CompressorConfig {
			family: ModeFamily::DiffZero,
			golomb_par: 4,
			spill: 8,
			model_value: 0,
			round: 0,
			input: &mut input,
			model: None,
			updated_model: None,
			output: &mut output
		},
		Some(&mut info)
	)
	.expect("Unexpected compression error");

	assert_eq!(info.cmp_size, 0);
	assert_eq!(info.cmp_err, 0);
	// An empty stream is not padded
	assert_eq!(output, [0xA5; 4]);
}

#[test]
fn the_report_echoes_the_run_parameters() {
	let mut input: [u32; 1] = [7];
	let mut output = [0u8; 8];
	let mut info = CompressionInfo::default();

	compress(
		CompressorConfig {
			family: ModeFamily::DiffMulti,
			golomb_par: 7,
			spill: 20,
			model_value: 0,
			round: 1,
			input: &mut input,
			model: None,
			updated_model: None,
			output: &mut output
		},
		Some(&mut info)
	)
	.expect("Unexpected compression error");

	let mode = CompressionMode {
		family: ModeFamily::DiffMulti,
		shape: crate::SampleShape::U32
	};
	assert_eq!(info.cmp_mode_used, mode.id());
	assert_eq!(info.golomb_par_used, 7);
	assert_eq!(info.spill_used, 20);
	assert_eq!(info.round_used, 1);
	assert_eq!(info.samples_used, 1);
}

#[test]
fn parameter_limits_are_sharp() {
	let run = |family: ModeFamily, golomb_par, spill, model_value, round| {
		let mut input: [u16; 2] = [1, 2];
		let mut model: [u16; 2] = [0, 0];
		let mut output = [0u8; 16];
		let mut info = CompressionInfo::default();

		let result = compress(
			CompressorConfig {
				family,
				golomb_par,
				spill,
				model_value,
				round,
				input: &mut input,
				model: Some(&mut model),
				updated_model: None,
				output: &mut output
			},
			Some(&mut info)
		);

		(result, info.cmp_err)
	};

	// Every limit value is accepted...
	assert_eq!(run(ModeFamily::DiffZero, 1, MIN_SPILL, 0, 0).0, Ok(()));
	assert_eq!(run(ModeFamily::DiffZero, 4, 120, 0, MAX_ROUND).0, Ok(()));
	assert_eq!(run(ModeFamily::ModelZero, 1, 32, MAX_MODEL_VALUE, 0).0, Ok(()));
	assert_eq!(
		run(ModeFamily::DiffZero, MAX_GOLOMB_PAR, 1 << 31, 0, 0).0,
		Ok(())
	);

	// ...and one past each limit is rejected with its error bit
	let (result, cmp_err) = run(ModeFamily::DiffZero, 4, MIN_SPILL - 1, 0, 0);
	assert_eq!(
		result,
		Err(CompressionError::InvalidSpill {
			spill: MIN_SPILL - 1,
			max_spill: 120
		})
	);
	assert_eq!(cmp_err, CompressionInfo::CMP_PAR_ERR);

	let (result, cmp_err) = run(ModeFamily::DiffZero, 4, 121, 0, 0);
	assert!(matches!(result, Err(CompressionError::InvalidSpill { .. })));
	assert_eq!(cmp_err, CompressionInfo::CMP_PAR_ERR);

	let (result, cmp_err) = run(ModeFamily::DiffZero, MAX_GOLOMB_PAR + 1, 8, 0, 0);
	assert!(matches!(result, Err(CompressionError::InvalidGolombParameter { .. })));
	assert_eq!(cmp_err, CompressionInfo::CMP_PAR_ERR);

	let (result, cmp_err) = run(ModeFamily::ModelZero, 4, 8, MAX_MODEL_VALUE + 1, 0);
	assert!(matches!(result, Err(CompressionError::InvalidModelValue { .. })));
	assert_eq!(cmp_err, CompressionInfo::MODEL_VALUE_ERR);

	// An out-of-range rounding parameter fails without an error bit
	let (result, cmp_err) = run(ModeFamily::DiffZero, 4, 8, 0, MAX_ROUND + 1);
	assert_eq!(
		result,
		Err(CompressionError::InvalidRound { round: MAX_ROUND + 1 })
	);
	assert_eq!(cmp_err, 0);
}

#[test]
fn model_modes_require_a_model_buffer() {
	let mut input: [u16; 2] = [1, 2];
	let mut output = [0u8; 8];
	let mut info = CompressionInfo::default();

	let result = compress(
		CompressorConfig {
			family: ModeFamily::ModelZero,
			golomb_par: 4,
			spill: 8,
			model_value: 8,
			round: 0,
			input: &mut input,
			model: None,
			updated_model: None,
			output: &mut output
		},
		Some(&mut info)
	);

	assert_eq!(
		result,
		Err(CompressionError::MissingModelBuffer {
			family: ModeFamily::ModelZero
		})
	);
	assert_eq!(info.cmp_size, 0);
}

#[test]
fn small_buffers_are_reported_faithfully() {
	// This input compresses to exactly 32 payload bits
	let samples: [u16; 4] = [60, 62, 65, 61];

	for capacity in 0..16 {
		let mut input = samples;
		let mut output = vec![0u8; capacity];
		let mut info = CompressionInfo::default();

		let result = compress(
			CompressorConfig {
				family: ModeFamily::DiffZero,
				golomb_par: 4,
				spill: 16,
				model_value: 0,
				round: 0,
				input: &mut input,
				model: None,
				updated_model: None,
				output: &mut output
			},
			Some(&mut info)
		);

		if capacity < 4 {
			assert!(result.is_err(), "capacity {capacity} unexpectedly sufficed");
			assert!(info.has_error(CompressionInfo::SMALL_BUFFER_ERR) || capacity == 0);
			assert_eq!(info.cmp_size, 0);
		} else {
			assert_eq!(result, Ok(()), "capacity {capacity} unexpectedly failed");
			assert_eq!(info.cmp_size, 32);
		}
	}
}

#[test]
fn streams_are_padded_to_word_boundaries() {
	for samples in 1..40u16 {
		let mut input: Vec<u16> = (0..samples).map(|i| 1000 + (i % 7)).collect();
		let (info, output) =
			compress_expecting_success(ModeFamily::DiffMulti, 4, 16, &mut input, 512);

		let padded_bytes = info.cmp_size.div_ceil(32) as usize * 4;

		// Everything beyond the padded stream is untouched...
		assert!(output[padded_bytes..].iter().all(|&byte| byte == 0xA5));

		// ...and the padding bits themselves are zero
		let mut reader = telem_bitpack::BitReader::new(&output[..padded_bytes]);
		for _ in 0..info.cmp_size {
			reader.read_bit().unwrap();
		}
		while reader.bit_position() < padded_bytes * 8 {
			assert!(!reader.read_bit().unwrap(), "Non-zero padding bit");
		}
	}
}

#[test]
fn doubling_periodic_inputs_never_more_than_doubles_the_stream() {
	let period: Vec<u16> = vec![500, 510, 490, 505, 500, 495, 515, 500];

	let mut single: Vec<u16> = period.clone();
	let mut double: Vec<u16> = period.iter().chain(period.iter()).copied().collect();

	let (info_single, _) =
		compress_expecting_success(ModeFamily::DiffMulti, 4, 16, &mut single, 256);
	let (info_double, _) =
		compress_expecting_success(ModeFamily::DiffMulti, 4, 16, &mut double, 256);

	assert!(info_double.cmp_size <= 2 * info_single.cmp_size);
}

#[test]
fn compound_records_encode_their_fields_in_wire_order() {
	// Two identical records: the second differences to all zeros, whose
	// codewords under the multi mechanism are all the three-bit Rice
	// codeword for 0
	let record = SFxNcob {
		exposure_flags: 1,
		fx: 3,
		ncob_x: 2,
		ncob_y: 1
	};
	let mut input = [record, record];

	let (info, _) = compress_expecting_success(ModeFamily::DiffMulti, 4, 16, &mut input, 64);

	// First record: folded fields [2, 6, 4, 2] take Rice codewords of
	// 3 + 4 + 4 + 3 bits; second record: four zeros of 3 bits each
	assert_eq!(info.cmp_size, 14 + 12);
}
