use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid recurrence parameters: {0}")]
	InvalidParameters(String),

	#[error("invalid lattice size {size}: at least {min} samples are required")]
	InvalidLatticeSize { size: usize, min: usize },

	#[error("multiplier is not invertible modulo the modulus (gcd = {gcd})")]
	NonInvertibleMultiplier { gcd: String },

	#[error("lattice reduction failed: {0}")]
	ReductionFailed(String),

	#[error("no bounded candidate found in the reduced basis: {0}")]
	AmbiguousReconstruction(String),

	#[error("state has not been reconstructed yet (currently {phase})")]
	StateNotReconstructed { phase: &'static str },

	#[error("malformed sample {input:?}: {reason}")]
	SampleParse { input: String, reason: &'static str },

	#[error("failed to acquire samples: {0}")]
	Acquisition(String),
}

impl From<ureq::Error> for Error {
	fn from(err: ureq::Error) -> Self {
		Error::Acquisition(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
