//! Boundary to the lattice-reduction primitive.

use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::lattice::{Lattice, Row};

/// An LLL-class basis reduction over exact integers.
///
/// Takes the basis vectors as rows of a square matrix and returns a basis of
/// the same lattice, same dimension, whose leading rows are short. Must be
/// deterministic for a fixed input.
pub trait LatticeReducer: Send + Sync {
	fn reduce(&self, rows: Vec<Row>) -> Result<Vec<Row>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducedBasis {
	rows: Vec<Row>,
}

impl ReducedBasis {
	pub fn rows(&self) -> &[Row] {
		&self.rows
	}

	pub fn dimension(&self) -> usize {
		self.rows.len()
	}

	/// Sum of absolute entries of each row.
	pub fn l1_norms(&self) -> Vec<BigInt> {
		self.rows.iter()
			.map(|row| row.iter().map(|x| BigInt::from(x.magnitude().clone())).sum())
			.collect()
	}
}

/// Hands `lattice` to `reducer` and returns its answer untouched. Nothing is
/// retried here.
pub fn reduce(lattice: Lattice, reducer: &dyn LatticeReducer) -> Result<ReducedBasis> {
	let dimension = lattice.dimension();
	let rows = reducer.reduce(lattice.into_rows())?;
	if rows.len() != dimension || rows.iter().any(|r| r.len() != dimension) {
		return Err(Error::ReductionFailed(format!(
			"reducer returned a {}-row basis for a {}-dimensional lattice", rows.len(), dimension
		)));
	}
	Ok(ReducedBasis { rows })
}
