use std::borrow::Cow;
use std::env;
use std::fs;
use std::io::{Write, stdout};
use std::process::exit;
use std::str::FromStr;
use std::time::Instant;

use getopts::{Matches, Options, ParsingStyle};
use log::info;
use stderrlog::ColorChoice;

use telemcomp::{
	CompressionInfo, CompressorConfig, MAX_CODEWORD_BITS, MAX_MODEL_VALUE, MAX_ROUND,
	MULTI_ESCAPE_SYMBOLS, ModeFamily, compress, max_spill
};

fn main() {
	exit(match run() {
		Ok(_) => 0,
		Err(err) => {
			eprintln!("{}", err);
			1
		}
	})
}

fn run() -> Result<(), Cow<'static, str>> {
	let mut options = Options::new();

	options
		.optflag(
			"h",
			"help",
			"Prints information about the accepted command line arguments and exits."
		)
		.optflag(
			"",
			"version",
			"Prints version and copyright information, then exits."
		)
		.optflag(
			"q",
			"quiet",
			"When enabled, the program will only print error messages, unless -h is specified."
		)
		.optflagmulti(
			"v",
			"verbose",
			"Increases the verbosity of the messages. Can be repeated several times."
		)
		.optopt(
			"m",
			"mode",
			"The compression mode family to use.\n\
			Available families: raw, diff-zero, diff-multi, model-zero, model-multi",
			"FAMILY"
		)
		.optopt(
			"g",
			"golomb-par",
			"The Golomb parameter of the entropy coder. The default value is 4.",
			"INTEGER"
		)
		.optopt(
			"s",
			"spill",
			"The spillover threshold at and above which values are emitted through \
			the outlier escape path. If not specified, the largest threshold the \
			mode and Golomb parameter support is used.",
			"INTEGER"
		)
		.optopt(
			"r",
			"round",
			"The number of least significant bits dropped by lossy rounding. \
			The default value is 0, which compresses losslessly.",
			"INTEGER"
		)
		.optopt(
			"",
			"model",
			"A file holding the model samples, required by the model families. \
			Interpreted, like the input file, as big-endian 16-bit samples.",
			"FILE"
		)
		.optopt(
			"",
			"model-value",
			"The model weighting value used by the model families. \
			The default value is 8.",
			"INTEGER"
		)
		.optopt(
			"",
			"updated-model",
			"A file the updated model samples are written to after a model \
			family compression.",
			"FILE"
		)
		.parsing_style(ParsingStyle::StopAtFirstFree);

	match options.parse(env::args().skip(1)) {
		Ok(matches) => {
			if matches.opt_present("h") {
				print_header();
				println!();
				println!("Usage:");
				print!(
					"    {} [OPTION]... <input file> <output file or ->",
					env!("CARGO_BIN_NAME")
				);
				println!("{}", options.usage(""));
			} else if matches.opt_present("version") {
				print_header();
			} else {
				let quiet_mode = matches.opt_present("q");

				if !quiet_mode {
					print_header();
					println!();
				}

				if matches.free.len() != 2 {
					return Err(format!(
						"Too many or few file arguments specified. Run {} -h to see command line argument help",
						env!("CARGO_BIN_NAME")
					))?;
				}

				init_logging(&matches, quiet_mode);

				compress_file(&matches, &matches.free[0], &matches.free[1])?;
			}

			Ok(())
		}
		Err(parse_err) => Err(format!(
			"{}\nRun {} -h to see command line argument help",
			parse_err,
			env!("CARGO_BIN_NAME")
		))?
	}
}

fn compress_file(
	option_matches: &Matches,
	input_file_name: &str,
	output_file_name: &str
) -> Result<(), Cow<'static, str>> {
	let family = option_matches
		.opt_str("mode")
		.as_deref()
		.map(CliModeFamily::from_str)
		.transpose()?
		.ok_or("No compression mode family was specified")?
		.0;

	let golomb_par = parse_integer_option(option_matches, "golomb-par")?.unwrap_or(4);
	let spill = match parse_integer_option(option_matches, "spill")? {
		Some(spill) => spill,
		None => max_spill(golomb_par, family)
	};
	let round = parse_integer_option(option_matches, "round")?.unwrap_or(0);
	let model_value = parse_integer_option(option_matches, "model-value")?.unwrap_or(8);

	if round > MAX_ROUND && !family.is_raw() {
		return Err(format!("The rounding parameter must be at most {}", MAX_ROUND))?;
	}
	if model_value > MAX_MODEL_VALUE {
		return Err(format!("The model value must be at most {}", MAX_MODEL_VALUE))?;
	}

	let mut samples = read_sample_file(input_file_name)?;

	let mut model = match option_matches.opt_str("model") {
		Some(model_file_name) => {
			let model = read_sample_file(&model_file_name)?;
			if model.len() < samples.len() {
				return Err(format!(
					"The model file holds {} sample(s), fewer than the {} input sample(s)",
					model.len(),
					samples.len()
				))?;
			}

			Some(model)
		}
		None if family.uses_model() => {
			return Err("The selected mode family requires a model file")?;
		}
		None => None
	};

	// The worst case per value is a maximum-length escape codeword
	// followed by the widest multi-escape raw payload, plus one word of
	// padding for the stream
	let worst_case_sample_bits = (MAX_CODEWORD_BITS + MULTI_ESCAPE_SYMBOLS * 2) as usize;
	let mut output = vec![0u8; samples.len() * worst_case_sample_bits.div_ceil(8) + 4];
	let mut info = CompressionInfo::default();

	info!(
		"Compressing {} sample(s) from {} with the {:?} family...",
		samples.len(),
		input_file_name,
		family
	);

	let compress_begin = Instant::now();

	compress(
		CompressorConfig {
			family,
			golomb_par,
			spill,
			model_value,
			round,
			input: &mut samples,
			model: model.as_deref_mut(),
			updated_model: None,
			output: &mut output
		},
		Some(&mut info)
	)
	.map_err(|err| format!("Error while compressing the input file: {}", err))?;

	let stream_bytes = if family.is_raw() {
		samples.len() * 2
	} else {
		info.cmp_size.div_ceil(32) as usize * 4
	};

	match output_file_name {
		"-" => stdout()
			.lock()
			.write_all(&output[..stream_bytes])
			.map_err(|err| format!("Could not write the compressed stream: {}", err))?,
		file_path => fs::write(file_path, &output[..stream_bytes])
			.map_err(|err| format!("Could not write the output file: {}", err))?
	}

	if let (Some(model), Some(updated_model_file_name)) =
		(&model, option_matches.opt_str("updated-model"))
	{
		write_sample_file(&updated_model_file_name, &model[..samples.len()])?;
	}

	info!(
		"Compression completed in {:.3} s. Have a nice day!",
		compress_begin.elapsed().as_secs_f64()
	);
	info!(
		"Report: mode {}, {} payload bit(s), {} stream byte(s), ratio {:.3}",
		info.cmp_mode_used,
		info.cmp_size,
		stream_bytes,
		if stream_bytes > 0 {
			samples.len() as f64 * 2.0 / stream_bytes as f64
		} else {
			0.0
		}
	);

	Ok(())
}

/// Reads a file of big-endian 16-bit samples.
fn read_sample_file(file_name: &str) -> Result<Vec<u16>, Cow<'static, str>> {
	let bytes =
		fs::read(file_name).map_err(|err| format!("Could not read {}: {}", file_name, err))?;

	if bytes.len() % 2 != 0 {
		return Err(format!(
			"{} holds {} byte(s), which is not a whole number of 16-bit samples",
			file_name,
			bytes.len()
		))?;
	}

	Ok(bytes
		.chunks_exact(2)
		.map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
		.collect())
}

/// Writes a file of big-endian 16-bit samples.
fn write_sample_file(file_name: &str, samples: &[u16]) -> Result<(), Cow<'static, str>> {
	let mut bytes = Vec::with_capacity(samples.len() * 2);
	for sample in samples {
		bytes.extend_from_slice(&sample.to_be_bytes());
	}

	fs::write(file_name, bytes)
		.map_err(|err| format!("Could not write {}: {}", file_name, err).into())
}

fn parse_integer_option(
	option_matches: &Matches,
	option: &str
) -> Result<Option<u32>, Cow<'static, str>> {
	option_matches
		.opt_str(option)
		.map(|value| value.parse())
		.transpose()
		.map_err(|err| format!("Invalid value for the {} option: {}", option, err).into())
}

fn init_logging(option_matches: &Matches, quiet_mode: bool) {
	let verbosity_level = option_matches.opt_count("v");

	stderrlog::new()
		.module("telemcomp")
		.verbosity(2 + verbosity_level)
		.show_level(false)
		.quiet(quiet_mode)
		.color(ColorChoice::Never)
		.init()
		.unwrap();
}

fn print_header() {
	println!(
		"TelemComp v{} ({})",
		env!("CARGO_PKG_VERSION"),
		env!("CARGO_BIN_NAME")
	);
	println!("{}", env!("CARGO_PKG_DESCRIPTION"));
	println!("Copyright (C) {}", env!("CARGO_PKG_AUTHORS"));
}

struct CliModeFamily(ModeFamily);

impl FromStr for CliModeFamily {
	type Err = Cow<'static, str>;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"raw" => Ok(Self(ModeFamily::Raw)),
			"diff-zero" => Ok(Self(ModeFamily::DiffZero)),
			"diff-multi" => Ok(Self(ModeFamily::DiffMulti)),
			"model-zero" => Ok(Self(ModeFamily::ModelZero)),
			"model-multi" => Ok(Self(ModeFamily::ModelMulti)),
			_ => Err(format!("The specified mode family is not valid: {}", s).into())
		}
	}
}
