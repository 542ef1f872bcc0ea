//! Recovering the state of truncated linear congruential generators.
//!
//! Given consecutive outputs of `s -> (a*s + b) mod m` that only reveal the
//! high bits of each state, the hidden low bits are found by reducing a
//! lattice of relations between the states and solving for the short error
//! vector. Once the state is known the generator can be run forwards and,
//! when `a` is invertible, backwards.
//!
//! ```no_run
//! use lcg_state_recovery::{RecoveryConfig, RecurrenceParameters, StateRecovery};
//! use num_bigint::BigUint;
//!
//! let params = RecurrenceParameters::java();
//! let samples: Vec<BigUint> = params.states(BigUint::from(1234u32))
//! 	.take(6)
//! 	.map(|s| params.truncate(&s))
//! 	.collect();
//! let mut run = StateRecovery::new(params, samples, &RecoveryConfig::default())?;
//! let first = run.reconstruct_first_state()?;
//! let next = run.predict(3)?;
//! # Ok::<(), lcg_state_recovery::Error>(())
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod lattice;
pub mod lll;
pub mod reconstruct;
pub mod recover;
pub mod recurrence;
pub mod reduction;
pub mod samples;

pub use config::{Preset, RecoveryConfig};
pub use error::{Error, Result};
pub use lattice::{Lattice, MIN_SAMPLES};
pub use lll::{IntegralLll, LllConfig};
pub use reconstruct::{HiddenRange, SelectionPolicy, SelectionStrategy};
pub use recover::{recover_lower_bits, Predictor, StateRecovery};
pub use recurrence::{RecurrenceParameters, Variant};
pub use reduction::{LatticeReducer, ReducedBasis};
