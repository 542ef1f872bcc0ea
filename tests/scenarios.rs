use lcg_state_recovery::reconstruct::combine;
use lcg_state_recovery::{
	recover_lower_bits, Error, HiddenRange, IntegralLll, Lattice, RecoveryConfig, RecurrenceParameters,
	SelectionPolicy, StateRecovery,
};
use num_bigint::BigUint;
use proptest::prelude::*;

// nextprime(2^32), nextprime(2^30), nextprime(2^10), nextprime(2^64)
const P32: u64 = 4294967311;
const P30: u64 = 1073741827;
const P10: u64 = 1031;
const P64: u128 = 18446744073709551629;

fn run(params: &RecurrenceParameters, seed: BigUint, count: usize) -> (Vec<BigUint>, Vec<BigUint>) {
	let states: Vec<BigUint> = params.states(seed).take(count).collect();
	let samples = states.iter().map(|s| params.truncate(s)).collect();
	(states, samples)
}

fn recover(params: &RecurrenceParameters, samples: Vec<BigUint>, config: &RecoveryConfig) -> Result<BigUint, Error> {
	StateRecovery::new(params.clone(), samples, config)?.reconstruct_first_state()
}

fn prime_32() -> RecurrenceParameters {
	RecurrenceParameters::lehmer(BigUint::from(P32), BigUint::from(P30), 16).unwrap()
}

fn java_lehmer() -> RecurrenceParameters {
	RecurrenceParameters::lehmer(BigUint::from(1u8) << 48, BigUint::from(0x5DEECE66Du64), 32).unwrap()
}

mod lehmer {
	use super::*;

	#[test]
	fn prime_modulus_twenty_samples() {
		let params = prime_32();
		let (states, samples) = run(&params, BigUint::from(252291025u32), 20);
		for policy in [SelectionPolicy::CenteredSolve, SelectionPolicy::CertifiedRows] {
			let config = RecoveryConfig::default().with_policy(policy);
			assert_eq!(recover(&params, samples.clone(), &config).unwrap(), states[0]);
		}
	}

	#[test]
	fn java_multiplier_five_samples() {
		let params = java_lehmer();
		let (states, samples) = run(&params, BigUint::from(252291025u32), 5);
		assert_eq!(recover(&params, samples.clone(), &RecoveryConfig::default()).unwrap(), states[0]);

		let search = RecoveryConfig::default().with_policy(SelectionPolicy::OffsetSearch { rows: 2, radius: 1 });
		assert_eq!(recover(&params, samples, &search).unwrap(), states[0]);
	}

	#[test]
	fn every_offset_is_recovered() {
		let params = prime_32();
		let (states, samples) = run(&params, BigUint::from(252291025u32), 20);
		let range = HiddenRange::Unsigned(params.hidden_bound());
		let z = recover_lower_bits(&params, &samples, &range, &IntegralLll::default(), &SelectionPolicy::CenteredSolve).unwrap();
		assert_eq!(combine(params.modulus(), &samples, &z), states);
	}

	#[test]
	fn two_samples_are_rejected() {
		let params = prime_32();
		let (_, samples) = run(&params, BigUint::from(252291025u32), 2);
		assert!(matches!(
			recover(&params, samples, &RecoveryConfig::default()),
			Err(Error::InvalidLatticeSize { size: 2, .. })
		));
		assert!(matches!(
			Lattice::build(params.modulus(), params.multiplier(), 2),
			Err(Error::InvalidLatticeSize { size: 2, .. })
		));
	}

	#[test]
	fn round_trip_prediction() {
		let params = prime_32();
		let (states, samples) = run(&params, BigUint::from(252291025u32), 30);
		let mut recovery = StateRecovery::new(params.clone(), samples[..20].to_vec(), &RecoveryConfig::default()).unwrap();
		let first = recovery.reconstruct_first_state().unwrap();
		assert_eq!(first, states[0]);

		let mut predicted = recovery.predict(4).unwrap();
		predicted.extend(recovery.predict(6).unwrap());
		assert_eq!(predicted, states[20..].to_vec());
		assert_eq!(params.jump(&first, 29), states[29]);
	}

	// Hiding the upper half and keeping the low bits is not what the lattice
	// is built for; it must not pretend to succeed.
	#[test]
	fn upper_bits_are_not_recovered() {
		let params = RecurrenceParameters::lehmer(BigUint::from(P64), BigUint::from(2u8), 32).unwrap();
		let states: Vec<BigUint> = params.states(BigUint::from(252291025u32)).take(10).collect();
		let low: Vec<BigUint> = states.iter().map(|s| s - params.truncate(s)).collect();

		let range = HiddenRange::Unsigned(params.modulus().clone());
		match recover_lower_bits(&params, &low, &range, &IntegralLll::default(), &SelectionPolicy::CenteredSolve) {
			Err(Error::AmbiguousReconstruction(_)) => {}
			Ok(z) => assert_ne!(combine(params.modulus(), &low, &z)[0], states[0]),
			Err(other) => panic!("unexpected error {:?}", other),
		}
	}

	#[test]
	fn too_many_hidden_bits_never_panics() {
		let params = RecurrenceParameters::lehmer(BigUint::from(P64), BigUint::from(P32), 48).unwrap();
		let (states, samples) = run(&params, BigUint::from(252291025u32), 3);
		match recover(&params, samples, &RecoveryConfig::default()) {
			Ok(first) => assert!(params.matches(&first, &params.truncate(&states[0]))),
			Err(err) => assert!(matches!(err, Error::AmbiguousReconstruction(_))),
		}
	}
}

mod additive {
	use super::*;

	#[test]
	fn prime_modulus_with_increment() {
		let params = RecurrenceParameters::new(BigUint::from(P32), BigUint::from(P30), BigUint::from(P10), 16).unwrap();
		let (states, samples) = run(&params, BigUint::from(252291025u32), 20);
		assert_eq!(recover(&params, samples, &RecoveryConfig::default()).unwrap(), states[0]);
	}

	#[test]
	fn java_random() {
		let params = RecurrenceParameters::java();
		let (states, samples) = run(&params, BigUint::from(252291025u32), 8);
		let mut recovery = StateRecovery::new(params.clone(), samples, &RecoveryConfig::default()).unwrap();
		assert_eq!(recovery.reconstruct_first_state().unwrap(), states[0]);

		let next = params.states(states[7].clone()).nth(0).unwrap();
		assert_eq!(recovery.predict_outputs(1).unwrap(), vec![params.output(&next)]);
	}

	#[test]
	fn glibc_with_hidden_half() {
		let params = RecurrenceParameters::glibc().with_shift(16).unwrap();
		let (states, samples) = run(&params, BigUint::from(252291025u32), 6);
		assert_eq!(recover(&params, samples, &RecoveryConfig::default()).unwrap(), states[0]);
	}

	#[test]
	fn java_history_is_unreachable() {
		let params = RecurrenceParameters::new(BigUint::from(1u8) << 48, BigUint::from(6u8), BigUint::from(0xBu8), 0).unwrap();
		assert!(matches!(params.step_back(&BigUint::from(5u8), 1), Err(Error::NonInvertibleMultiplier { .. })));
	}
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(24))]

	#[test]
	fn lehmer_prime_any_seed(seed in 1u64..P32) {
		let params = prime_32();
		let (states, samples) = run(&params, BigUint::from(seed), 20);
		prop_assert_eq!(recover(&params, samples, &RecoveryConfig::default()).unwrap(), states[0].clone());
	}

	#[test]
	fn java_lehmer_any_seed(seed in 0u64..(1u64 << 48)) {
		let params = java_lehmer();
		let (states, samples) = run(&params, BigUint::from(seed), 5);
		prop_assert_eq!(recover(&params, samples, &RecoveryConfig::default()).unwrap(), states[0].clone());
	}

	#[test]
	fn java_random_any_seed(seed in 0u64..(1u64 << 48)) {
		let params = RecurrenceParameters::java();
		let (states, samples) = run(&params, BigUint::from(seed), 8);
		prop_assert_eq!(recover(&params, samples, &RecoveryConfig::default()).unwrap(), states[0].clone());
	}

	#[test]
	fn lattice_is_reproducible(size in 3usize..12) {
		let m = BigUint::from(P32);
		let a = BigUint::from(P30);
		prop_assert_eq!(Lattice::build(&m, &a, size).unwrap(), Lattice::build(&m, &a, size).unwrap());
	}
}
