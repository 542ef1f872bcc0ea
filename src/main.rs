use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use num_bigint::{BigUint, RandBigInt};
use tracing_subscriber::EnvFilter;

use lcg_state_recovery::samples::{self, Radix};
use lcg_state_recovery::{
	batch, Error, LllConfig, Preset, RecoveryConfig, RecurrenceParameters, Result, SelectionPolicy, StateRecovery,
};

#[derive(Parser)]
#[command(name = "lcg-recover", version, about = "Recover the hidden state of a truncated LCG")]
struct Cli {
	/// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbose: u8,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Recover the first state from a list of truncated samples
	Recover(RecoverArgs),
	/// Recover freshly generated runs with known answers
	Demo,
	/// Poll a page showing several generators and predict their next outputs
	Lottery(LotteryArgs),
}

#[derive(Args)]
struct GeneratorArgs {
	/// Named parameter set
	#[arg(long, conflicts_with_all = ["modulus", "multiplier", "increment"])]
	preset: Option<Preset>,

	#[arg(long, value_parser = parse_number)]
	modulus: Option<BigUint>,

	#[arg(long, value_parser = parse_number)]
	multiplier: Option<BigUint>,

	/// Zero selects the Lehmer (multiplicative) variant
	#[arg(long, value_parser = parse_number, default_value = "0")]
	increment: BigUint,

	/// Number of hidden low bits per sample (overrides the preset's)
	#[arg(long)]
	shift: Option<u32>,

	#[arg(long, value_enum, default_value_t = PolicyArg::Centered)]
	policy: PolicyArg,

	/// Longest rows re-tried by the search policy
	#[arg(long, default_value_t = 2)]
	search_rows: usize,

	/// Largest multiple of the modulus tried per row by the search policy
	#[arg(long, default_value_t = 1)]
	search_radius: u32,

	/// Lovász constant as NUM/DEN
	#[arg(long, default_value = "99/100", value_parser = parse_delta)]
	delta: LllConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
	Centered,
	Certified,
	Search,
}

#[derive(Clone, Copy, ValueEnum)]
enum RadixArg {
	Dec,
	Hex,
}

#[derive(Args)]
struct RecoverArgs {
	#[command(flatten)]
	generator: GeneratorArgs,

	#[arg(long, value_enum, default_value_t = RadixArg::Dec)]
	radix: RadixArg,

	/// Samples are full-width values with the low bits zeroed, not visible outputs
	#[arg(long)]
	aligned: bool,

	/// Read samples from a file instead of the command line
	#[arg(long)]
	file: Option<PathBuf>,

	/// Print this many states following the last sample
	#[arg(long, default_value_t = 0)]
	predict: usize,

	/// Print this many states preceding the first sample
	#[arg(long, default_value_t = 0)]
	history: usize,

	samples: Vec<String>,
}

#[derive(Args)]
struct LotteryArgs {
	#[command(flatten)]
	generator: GeneratorArgs,

	#[arg(long, default_value = "http://localhost:8080")]
	url: String,

	/// Page loads used as samples
	#[arg(long, default_value_t = 10)]
	rounds: usize,

	/// Upcoming draws to predict
	#[arg(long, default_value_t = 1)]
	predict: usize,
}

fn parse_number(s: &str) -> Result<BigUint> {
	if s.starts_with("0x") || s.starts_with("0X") {
		samples::parse_hex(s)
	} else {
		samples::parse_decimal(s)
	}
}

fn parse_delta(s: &str) -> Result<LllConfig> {
	let invalid = || Error::InvalidParameters(format!("delta {:?} is not NUM/DEN", s));
	let (num, den) = s.split_once('/').ok_or_else(invalid)?;
	let config = LllConfig {
		delta_num: num.trim().parse().map_err(|_| invalid())?,
		delta_den: den.trim().parse().map_err(|_| invalid())?,
	};
	config.validate()?;
	Ok(config)
}

impl GeneratorArgs {
	fn params(&self) -> Result<RecurrenceParameters> {
		let params = match (self.preset, &self.modulus, &self.multiplier) {
			(Some(preset), _, _) => preset.params(),
			(None, Some(m), Some(a)) => RecurrenceParameters::new(m.clone(), a.clone(), self.increment.clone(), 0)?,
			_ => return Err(Error::InvalidParameters(
				"either --preset or both --modulus and --multiplier are required".into(),
			)),
		};
		match self.shift {
			Some(shift) => params.with_shift(shift),
			None => Ok(params),
		}
	}

	fn config(&self) -> RecoveryConfig {
		let policy = match self.policy {
			PolicyArg::Centered => SelectionPolicy::CenteredSolve,
			PolicyArg::Certified => SelectionPolicy::CertifiedRows,
			PolicyArg::Search => SelectionPolicy::OffsetSearch { rows: self.search_rows, radius: self.search_radius },
		};
		RecoveryConfig::default().with_policy(policy).with_reduction(self.delta)
	}
}

fn recover(args: RecoverArgs) -> Result<()> {
	let params = args.generator.params()?;
	let text = match &args.file {
		Some(path) => std::fs::read_to_string(path)
			.map_err(|err| Error::Acquisition(format!("{}: {}", path.display(), err)))?,
		None => args.samples.join(" "),
	};
	let radix = match args.radix {
		RadixArg::Dec => Radix::Decimal,
		RadixArg::Hex => Radix::Hex,
	};
	let shift = if args.aligned { 0 } else { params.shift() };
	let samples = samples::parse_samples(&text, radix, shift)?;

	let mut run = StateRecovery::new(params.clone(), samples, &args.generator.config())?;
	let first = run.reconstruct_first_state()?;
	println!("first state: {} (0x{:X})", first, first);

	let history = if args.history > 0 { run.history(args.history)? } else { Vec::new() };
	for (i, state) in history.iter().enumerate() {
		println!("state -{}: {} (output 0x{:X})", i + 1, state, params.output(state));
	}
	for (i, state) in run.predict(args.predict)?.iter().enumerate() {
		println!("state +{}: {} (output 0x{:X})", i + 1, state, params.output(state));
	}
	Ok(())
}

fn demo() -> Result<()> {
	let mut rng = rand::thread_rng();
	let mut failures = 0;

	{ // Lehmer, m = nextprime(2^32), a = nextprime(2^30), 16 hidden bits, 20 samples
		let params = RecurrenceParameters::lehmer(BigUint::from(4294967311u64), BigUint::from(1073741827u32), 16)?;
		failures += demo_run("Lehmer 32-bit", &params, rng.gen_biguint_below(params.modulus()), 20)?;
	}

	{ // java.util.Random constants without the increment, 32 hidden bits, 5 samples
		let params = RecurrenceParameters::lehmer(BigUint::from(1u8) << 48, BigUint::from(0x5DEECE66Du64), 32)?;
		failures += demo_run("Lehmer 48-bit", &params, rng.gen_biguint_below(params.modulus()), 5)?;
	}

	{ // java.util.Random as is, next(16) outputs
		let params = RecurrenceParameters::java();
		failures += demo_run("java.util.Random", &params, rng.gen_biguint_below(params.modulus()), 8)?;
	}

	{ // glibc with the low half hidden
		let params = RecurrenceParameters::glibc().with_shift(16)?;
		failures += demo_run("glibc rand_r", &params, rng.gen_biguint_below(params.modulus()), 6)?;
	}

	if failures > 0 {
		return Err(Error::AmbiguousReconstruction(format!("{} demo run(s) recovered a wrong state", failures)));
	}
	Ok(())
}

fn demo_run(name: &str, params: &RecurrenceParameters, seed: BigUint, count: usize) -> Result<usize> {
	let states: Vec<BigUint> = params.states(seed.clone()).take(count + 3).collect();
	let samples = states[..count].iter().map(|s| params.truncate(s)).collect();

	let mut run = StateRecovery::new(params.clone(), samples, &RecoveryConfig::default())?;
	let first = run.reconstruct_first_state()?;
	let predicted = run.predict(3)?;
	let ok = first == states[0] && predicted[..] == states[count..];
	println!(
		"{}: seed {} -> first state {} ({})",
		name, seed, first, if ok { "ok" } else { "MISMATCH" }
	);
	Ok(usize::from(!ok))
}

fn lottery(args: LotteryArgs) -> Result<()> {
	let params = args.generator.params()?;
	let sequences = samples::poll(&args.url, args.rounds, params.shift())?;
	tracing::info!(generators = sequences.len(), rounds = args.rounds, "collected samples");

	let predictions = batch::predict_all(&params, sequences, &args.generator.config(), args.predict);

	println!("Your next lottery numbers are:");
	for line in draw_lines(predictions, args.predict) {
		println!("{}", line);
	}
	Ok(())
}

// One line per upcoming draw, one column per generator. A generator that
// could not be recovered shows `??` and is reported with its 1-based column.
fn draw_lines(predictions: Vec<Result<Vec<BigUint>>>, draws: usize) -> Vec<String> {
	let columns: Vec<Vec<String>> = predictions.into_iter()
		.enumerate()
		.map(|(column, outputs)| match outputs {
			Ok(outputs) => outputs.iter().map(|n| format!("{:02X}", n)).collect(),
			Err(err) => {
				tracing::error!(column = column + 1, error = %err, "no prediction for this column");
				vec!["??".to_owned(); draws]
			}
		})
		.collect();

	(0..draws)
		.map(|draw| columns.iter().map(|c| c[draw].as_str()).collect::<Vec<_>>().join(" "))
		.collect()
}

fn init_tracing(verbose: u8) {
	let level = match verbose {
		0 => "info",
		1 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	let result = match cli.command {
		Command::Recover(args) => recover(args),
		Command::Demo => demo(),
		Command::Lottery(args) => lottery(args),
	};
	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("error: {}", err);
			ExitCode::FAILURE
		}
	}
}
