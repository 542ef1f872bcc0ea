//! Recovering many independent generators at once.

use num_bigint::BigUint;
use rayon::prelude::*;

use crate::config::RecoveryConfig;
use crate::error::Result;
use crate::recover::StateRecovery;
use crate::recurrence::RecurrenceParameters;

/// One reconstructed run per sample sequence, in input order. Instances share
/// nothing and run on the rayon pool; a failing instance does not affect the
/// others.
pub fn recover_all(
	params: &RecurrenceParameters,
	sequences: Vec<Vec<BigUint>>,
	config: &RecoveryConfig,
) -> Vec<Result<StateRecovery>> {
	sequences.into_par_iter()
		.enumerate()
		.map(|(instance, samples)| {
			let mut run = StateRecovery::new(params.clone(), samples, config)?;
			match run.reconstruct_first_state() {
				Ok(_) => Ok(run),
				Err(err) => {
					tracing::warn!(instance, error = %err, "recovery failed");
					Err(err)
				}
			}
		})
		.collect()
}

/// The next `count` visible outputs of every instance.
pub fn predict_all(
	params: &RecurrenceParameters,
	sequences: Vec<Vec<BigUint>>,
	config: &RecoveryConfig,
	count: usize,
) -> Vec<Result<Vec<BigUint>>> {
	recover_all(params, sequences, config)
		.into_iter()
		.map(|run| run.and_then(|mut run| run.predict_outputs(count)))
		.collect()
}
