//! Lattice of relations between consecutive Lehmer states.
//!
//! Every vector `v` of the lattice satisfies `v . (x_1, ..., x_N) = 0 (mod m)`
//! for any run of states with `x_{i+1} = a^i * x_1 mod m`. Row 0 is `m*e_0`,
//! row `i` is `a^i*e_0 - e_i`.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};

use crate::error::{Error, Result};

/// Fewer samples leave the hidden bits under-determined.
pub const MIN_SAMPLES: usize = 3;

pub type Row = Vec<BigInt>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lattice {
	rows: Vec<Row>,
}

impl Lattice {
	pub fn build(modulus: &BigUint, multiplier: &BigUint, size: usize) -> Result<Self> {
		if size < MIN_SAMPLES {
			return Err(Error::InvalidLatticeSize { size, min: MIN_SAMPLES });
		}
		if *modulus <= BigUint::one() || (multiplier % modulus).is_zero() {
			return Err(Error::InvalidParameters(format!(
				"cannot build a lattice for multiplier {} modulo {}", multiplier, modulus
			)));
		}

		let mut rows = vec![vec![BigInt::zero(); size]; size];
		rows[0][0] = BigInt::from(modulus.clone());

		let mut power = BigUint::one();
		for (i, row) in rows.iter_mut().enumerate().skip(1) {
			power = (power * multiplier) % modulus;
			row[0] = BigInt::from(power.clone());
			row[i] = -BigInt::one();
		}

		tracing::debug!(dimension = size, modulus_bits = modulus.bits(), "built relation lattice");
		Ok(Self { rows })
	}

	pub fn dimension(&self) -> usize {
		self.rows.len()
	}

	pub fn rows(&self) -> &[Row] {
		&self.rows
	}

	pub fn into_rows(self) -> Vec<Row> {
		self.rows
	}
}
