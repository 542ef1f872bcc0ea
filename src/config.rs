use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::lll::LllConfig;
use crate::reconstruct::SelectionPolicy;
use crate::recurrence::RecurrenceParameters;

/// Knobs of a single recovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryConfig {
	pub policy: SelectionPolicy,
	pub reduction: LllConfig,
}

impl RecoveryConfig {
	pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
		self.policy = policy;
		self
	}

	pub fn with_reduction(mut self, reduction: LllConfig) -> Self {
		self.reduction = reduction;
		self
	}
}

/// Well-known generators, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
	Glibc,
	Java,
}

impl Preset {
	pub fn params(self) -> RecurrenceParameters {
		match self {
			Preset::Glibc => RecurrenceParameters::glibc(),
			Preset::Java => RecurrenceParameters::java(),
		}
	}
}

impl FromStr for Preset {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		match s.to_ascii_lowercase().as_str() {
			"glibc" => Ok(Preset::Glibc),
			"java" => Ok(Preset::Java),
			_ => Err(Error::InvalidParameters(format!("unknown preset {:?} (expected glibc or java)", s))),
		}
	}
}

impl fmt::Display for Preset {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Preset::Glibc => write!(f, "glibc"),
			Preset::Java => write!(f, "java"),
		}
	}
}
