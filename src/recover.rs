//! End-to-end recovery of a truncated generator's state, and prediction.

use num_bigint::{BigInt, BigUint};

use crate::config::RecoveryConfig;
use crate::error::{Error, Result};
use crate::lattice::{Lattice, MIN_SAMPLES};
use crate::lll::IntegralLll;
use crate::reconstruct::{self, HiddenRange, SelectionStrategy};
use crate::recurrence::{RecurrenceParameters, Variant};
use crate::reduction::{self, LatticeReducer, ReducedBasis};

enum Phase {
	Uninitialized,
	LatticeBuilt(Lattice),
	Reduced(ReducedBasis),
	Reconstructed(BigUint),
	Stepping { first: BigUint, predictor: Predictor },
}

impl Phase {
	fn name(&self) -> &'static str {
		match self {
			Phase::Uninitialized => "uninitialized",
			Phase::LatticeBuilt(_) => "lattice built",
			Phase::Reduced(_) => "reduced",
			Phase::Reconstructed(_) => "reconstructed",
			Phase::Stepping { .. } => "stepping",
		}
	}
}

/// One attack run against one generator instance.
///
/// Moves through `uninitialized -> lattice built -> reduced -> reconstructed
/// -> stepping`, one transition per [`advance`](Self::advance). Any failure
/// is terminal for the attempt and drops the run back to `uninitialized`.
pub struct StateRecovery {
	params: RecurrenceParameters,
	samples: Vec<BigUint>,
	// what the lattice is built over: the samples themselves, or for an
	// additive recurrence the differences of consecutive samples
	targets: Vec<BigUint>,
	strategy: Box<dyn SelectionStrategy>,
	reducer: Box<dyn LatticeReducer>,
	phase: Phase,
}

impl StateRecovery {
	/// `samples` are consecutive truncated states, high bits in place. Any
	/// stray low bits are cleared.
	pub fn new(params: RecurrenceParameters, samples: Vec<BigUint>, config: &RecoveryConfig) -> Result<Self> {
		config.reduction.validate()?;
		let required = match params.variant() {
			Variant::Multiplicative => MIN_SAMPLES,
			Variant::Additive { .. } => MIN_SAMPLES + 1,
		};
		if samples.len() < required {
			return Err(Error::InvalidLatticeSize { size: samples.len(), min: required });
		}

		let m = params.modulus();
		let samples: Vec<BigUint> = samples.iter().map(|s| params.truncate(&(s % m))).collect();
		let targets = match params.variant() {
			Variant::Multiplicative => samples.clone(),
			Variant::Additive { .. } => samples.windows(2)
				.map(|pair| (&pair[1] + m - &pair[0]) % m)
				.collect(),
		};

		Ok(Self {
			params,
			samples,
			targets,
			strategy: Box::new(config.policy.clone()),
			reducer: Box::new(IntegralLll::new(config.reduction)),
			phase: Phase::Uninitialized,
		})
	}

	pub fn with_reducer(mut self, reducer: Box<dyn LatticeReducer>) -> Self {
		self.reducer = reducer;
		self
	}

	pub fn with_strategy(mut self, strategy: Box<dyn SelectionStrategy>) -> Self {
		self.strategy = strategy;
		self
	}

	pub fn params(&self) -> &RecurrenceParameters {
		&self.params
	}

	pub fn samples(&self) -> &[BigUint] {
		&self.samples
	}

	pub fn phase(&self) -> &'static str {
		self.phase.name()
	}

	pub fn lattice(&self) -> Option<&Lattice> {
		match &self.phase {
			Phase::LatticeBuilt(lattice) => Some(lattice),
			_ => None,
		}
	}

	pub fn reduced_basis(&self) -> Option<&ReducedBasis> {
		match &self.phase {
			Phase::Reduced(basis) => Some(basis),
			_ => None,
		}
	}

	/// Performs the next transition. Past reconstruction this is a no-op.
	pub fn advance(&mut self) -> Result<()> {
		let phase = std::mem::replace(&mut self.phase, Phase::Uninitialized);
		self.phase = match phase {
			Phase::Uninitialized => {
				let m = self.params.modulus();
				Phase::LatticeBuilt(Lattice::build(m, self.params.multiplier(), self.targets.len())?)
			}
			Phase::LatticeBuilt(lattice) => Phase::Reduced(reduction::reduce(lattice, self.reducer.as_ref())?),
			Phase::Reduced(basis) => Phase::Reconstructed(self.reconstruct(&basis)?),
			done @ (Phase::Reconstructed(_) | Phase::Stepping { .. }) => done,
		};
		Ok(())
	}

	/// Runs every remaining transition up to reconstruction and returns the
	/// state behind the first sample.
	pub fn reconstruct_first_state(&mut self) -> Result<BigUint> {
		loop {
			if let Ok(first) = self.first_state() {
				return Ok(first.clone());
			}
			self.advance()?;
		}
	}

	pub fn first_state(&self) -> Result<&BigUint> {
		match &self.phase {
			Phase::Reconstructed(first) | Phase::Stepping { first, .. } => Ok(first),
			other => Err(Error::StateNotReconstructed { phase: other.name() }),
		}
	}

	/// The next `count` raw states after the last sample. Successive calls
	/// continue where the previous one stopped.
	pub fn predict(&mut self, count: usize) -> Result<Vec<BigUint>> {
		Ok(self.predictor()?.next_states(count))
	}

	/// Like [`predict`](Self::predict) but yields what an observer would see.
	pub fn predict_outputs(&mut self, count: usize) -> Result<Vec<BigUint>> {
		Ok(self.predictor()?.next_outputs(count))
	}

	/// The `count` states before the first sample, nearest first. Stepping
	/// back needs an invertible multiplier unless `count` is zero.
	pub fn history(&self, count: usize) -> Result<Vec<BigUint>> {
		let first = self.first_state()?;
		if count == 0 {
			return Ok(Vec::new());
		}
		Ok(self.params.predecessors(first.clone())?.take(count).collect())
	}

	fn predictor(&mut self) -> Result<&mut Predictor> {
		if let Phase::Reconstructed(first) = &self.phase {
			let first = first.clone();
			let last = self.params.jump(&first, (self.samples.len() - 1) as u64);
			let predictor = Predictor::new(self.params.clone(), last);
			self.phase = Phase::Stepping { first, predictor };
		}
		match &mut self.phase {
			Phase::Stepping { predictor, .. } => Ok(predictor),
			other => Err(Error::StateNotReconstructed { phase: other.name() }),
		}
	}

	fn reconstruct(&self, basis: &ReducedBasis) -> Result<BigUint> {
		let m = self.params.modulus();
		let bound = self.params.hidden_bound();
		let first = match self.params.variant() {
			Variant::Multiplicative => {
				let range = HiddenRange::Unsigned(bound);
				let offsets = reconstruct::hidden_bits(basis, m, &self.targets, &range, self.strategy.as_ref())?;
				let states = reconstruct::combine(m, &self.targets, &offsets);
				if self.params.step(&states[0]) != states[1] {
					return Err(Error::AmbiguousReconstruction(
						"recovered first state does not lead to the second".into(),
					));
				}
				states[0].clone()
			}
			Variant::Additive { .. } => {
				let range = HiddenRange::Signed(bound);
				let offsets = reconstruct::hidden_bits(basis, m, &self.targets, &range, self.strategy.as_ref())?;
				let difference = reconstruct::combine(m, &self.targets[..1], &offsets[..1]).remove(0);
				reconstruct::first_state_from_difference(&self.params, &difference, &self.samples)?
			}
		};
		tracing::info!(
			policy = self.strategy.name(),
			samples = self.samples.len(),
			shift = self.params.shift(),
			"reconstructed first state"
		);
		Ok(first)
	}
}

/// Restartable stream of the states following a known one.
#[derive(Debug, Clone)]
pub struct Predictor {
	params: RecurrenceParameters,
	state: BigUint,
}

impl Predictor {
	pub fn new(params: RecurrenceParameters, state: BigUint) -> Self {
		Self { params, state }
	}

	pub fn next_states(&mut self, count: usize) -> Vec<BigUint> {
		self.by_ref().take(count).collect()
	}

	pub fn next_outputs(&mut self, count: usize) -> Vec<BigUint> {
		let states = self.next_states(count);
		states.iter().map(|s| self.params.output(s)).collect()
	}
}

impl Iterator for Predictor {
	type Item = BigUint;

	fn next(&mut self) -> Option<BigUint> {
		self.state = self.params.step(&self.state);
		Some(self.state.clone())
	}
}

/// Hidden offsets for the samples of a Lehmer run, without the state machine.
pub fn recover_lower_bits(
	params: &RecurrenceParameters,
	samples: &[BigUint],
	range: &HiddenRange,
	reducer: &dyn LatticeReducer,
	strategy: &dyn SelectionStrategy,
) -> Result<Vec<BigInt>> {
	let m = params.modulus();
	let lattice = Lattice::build(m, params.multiplier(), samples.len())?;
	let basis = reduction::reduce(lattice, reducer)?;
	reconstruct::hidden_bits(&basis, m, samples, range, strategy)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reconstruct::SelectionPolicy;

	fn lehmer() -> RecurrenceParameters {
		RecurrenceParameters::lehmer(BigUint::from(4294967291u64), BigUint::from(598176085u32), 16).unwrap()
	}

	fn observe(params: &RecurrenceParameters, seed: u64, count: usize) -> (Vec<BigUint>, Vec<BigUint>) {
		let states: Vec<BigUint> = params.states(BigUint::from(seed)).take(count).collect();
		let samples = states.iter().map(|s| params.truncate(s)).collect();
		(states, samples)
	}

	#[test]
	fn walks_every_phase_in_order() {
		let params = lehmer();
		let (states, samples) = observe(&params, 252291025, 4);
		let mut run = StateRecovery::new(params, samples, &RecoveryConfig::default()).unwrap();

		assert_eq!(run.phase(), "uninitialized");
		run.advance().unwrap();
		assert_eq!(run.phase(), "lattice built");
		assert_eq!(run.lattice().unwrap().dimension(), 4);
		run.advance().unwrap();
		assert_eq!(run.phase(), "reduced");
		assert!(run.reduced_basis().is_some());
		run.advance().unwrap();
		assert_eq!(run.phase(), "reconstructed");
		assert_eq!(run.first_state().unwrap(), &states[0]);
		run.advance().unwrap();
		assert_eq!(run.phase(), "reconstructed");
	}

	#[test]
	fn predict_requires_reconstruction() {
		let params = lehmer();
		let (_, samples) = observe(&params, 252291025, 4);
		let mut run = StateRecovery::new(params, samples, &RecoveryConfig::default()).unwrap();

		assert!(matches!(run.predict(3), Err(Error::StateNotReconstructed { phase: "uninitialized" })));
		run.advance().unwrap();
		assert!(matches!(run.predict(3), Err(Error::StateNotReconstructed { phase: "lattice built" })));
		assert!(matches!(run.history(1), Err(Error::StateNotReconstructed { .. })));
	}

	#[test]
	fn prediction_continues_across_calls() {
		let params = lehmer();
		let (states, samples) = observe(&params, 252291025, 10);
		let mut run = StateRecovery::new(params.clone(), samples[..6].to_vec(), &RecoveryConfig::default()).unwrap();

		assert_eq!(run.reconstruct_first_state().unwrap(), states[0]);
		assert_eq!(run.predict(2).unwrap(), states[6..8].to_vec());
		assert_eq!(run.phase(), "stepping");
		assert_eq!(run.predict_outputs(2).unwrap(), vec![params.output(&states[8]), params.output(&states[9])]);
		assert_eq!(run.reconstruct_first_state().unwrap(), states[0]);
	}

	#[test]
	fn history_steps_backwards() {
		let params = lehmer();
		let (states, samples) = observe(&params, 252291025, 8);
		let mut run = StateRecovery::new(params, samples[3..].to_vec(), &RecoveryConfig::default()).unwrap();
		run.reconstruct_first_state().unwrap();
		assert_eq!(run.history(3).unwrap(), vec![states[2].clone(), states[1].clone(), states[0].clone()]);
	}

	#[test]
	fn empty_history_needs_no_inverse() {
		let params = RecurrenceParameters::lehmer(BigUint::from(1u8) << 32, BigUint::from(1103515246u32), 8).unwrap();
		let (states, samples) = observe(&params, 252291025, 8);
		let mut run = StateRecovery::new(params, samples[..6].to_vec(), &RecoveryConfig::default()).unwrap();

		assert_eq!(run.reconstruct_first_state().unwrap(), states[0]);
		assert_eq!(run.history(0).unwrap(), Vec::<BigUint>::new());
		assert!(matches!(run.history(1), Err(Error::NonInvertibleMultiplier { .. })));
		assert_eq!(run.predict(2).unwrap(), states[6..8].to_vec());
	}

	#[test]
	fn rejects_short_sequences() {
		let params = lehmer();
		let (_, samples) = observe(&params, 252291025, 3);
		assert!(matches!(
			StateRecovery::new(params.clone(), samples[..2].to_vec(), &RecoveryConfig::default()),
			Err(Error::InvalidLatticeSize { size: 2, min: 3 })
		));

		let additive = RecurrenceParameters::java();
		assert!(matches!(
			StateRecovery::new(additive, samples, &RecoveryConfig::default()),
			Err(Error::InvalidLatticeSize { size: 3, min: 4 })
		));
	}

	#[test]
	fn failed_reduction_is_terminal() {
		struct Broken;
		impl LatticeReducer for Broken {
			fn reduce(&self, _rows: Vec<crate::lattice::Row>) -> Result<Vec<crate::lattice::Row>> {
				Err(Error::ReductionFailed("numerical overflow".into()))
			}
		}

		let params = lehmer();
		let (_, samples) = observe(&params, 252291025, 4);
		let mut run = StateRecovery::new(params, samples, &RecoveryConfig::default())
			.unwrap()
			.with_reducer(Box::new(Broken));
		assert!(matches!(run.reconstruct_first_state(), Err(Error::ReductionFailed(_))));
		assert_eq!(run.phase(), "uninitialized");
	}

	#[test]
	fn lower_bits_without_state_machine() {
		let params = lehmer();
		let (_, samples) = observe(&params, 252291025, 4);
		let range = HiddenRange::Unsigned(params.hidden_bound());
		let z = recover_lower_bits(&params, &samples, &range, &IntegralLll::default(), &SelectionPolicy::CertifiedRows).unwrap();
		assert_eq!(z.len(), 4);
		assert!(z.iter().all(|v| range.contains(v)));
	}
}
