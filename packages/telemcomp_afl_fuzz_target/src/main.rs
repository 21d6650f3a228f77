use telemcomp::{CompressionInfo, decompress};

fn main() {
	afl::fuzz!(|data: &[u8]| {
		// Each fuzz run has to be pretty fast. Just check that no crashes
		// happen: arbitrary reports and streams must only ever yield
		// decoding errors
		if data.len() < 8 {
			return;
		}

		let info = CompressionInfo {
			cmp_mode_used: data[0],
			model_value_used: data[1],
			round_used: data[2],
			spill_used: u32::from_be_bytes([0, 0, data[3], data[4]]),
			golomb_par_used: u32::from_be_bytes([0, data[5], data[6], data[7]]),
			samples_used: u32::from(data[1]) % 64,
			cmp_size: 0,
			cmp_err: 0
		};

		let mut output = [0u16; 64];
		let mut model = [0u16; 64];
		decompress(&data[8..], &info, Some(&mut model), &mut output).ok();

		let mut output = [telemcomp::SFx::default(); 64];
		let mut model = [telemcomp::SFx::default(); 64];
		decompress(&data[8..], &info, Some(&mut model), &mut output).ok();
	})
}
