//! Recovering hidden low bits from a reduced relation basis.
//!
//! Every row `r` of the reduced basis satisfies `r . x = 0 (mod m)` for the
//! true states `x = y + z`, where `y` are the known high parts and `z` the
//! hidden offsets. Rows are short and `z` is small, so `r . z` is a small
//! integer congruent to `-(r . y)`. Once the exact value of `r . z` is known
//! for all rows, `z` is the solution of a square integer system.
//!
//! How those exact values are picked out of their residues is the selection
//! policy. It is the step that can go wrong: a wrong pick either fails to
//! give an integral, in-range `z` (reported as ambiguous) or, rarely, gives a
//! bounded but wrong `z` that only an outside check can catch.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::error::{Error, Result};
use crate::lattice::Row;
use crate::recurrence::RecurrenceParameters;
use crate::reduction::ReducedBasis;

/// Roots of `(a - 1)*x = c` tried before giving up on an additive recovery.
pub const MAX_ROOTS: u64 = 1 << 16;

/// Where a hidden offset is allowed to lie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HiddenRange {
	/// `0 <= z < bound`: low bits of a state.
	Unsigned(BigUint),
	/// `-bound < z < bound`: low bits of a difference of two states.
	Signed(BigUint),
}

impl HiddenRange {
	pub fn contains(&self, z: &BigInt) -> bool {
		match self {
			HiddenRange::Unsigned(bound) => !z.is_negative() && z.magnitude() < bound,
			HiddenRange::Signed(bound) => z.magnitude() < bound,
		}
	}

	/// Largest `|z|` the range admits.
	pub fn max_magnitude(&self) -> BigUint {
		match self {
			HiddenRange::Unsigned(bound) | HiddenRange::Signed(bound) => {
				if bound.is_zero() { BigUint::zero() } else { bound.clone() - 1u32 }
			}
		}
	}
}

/// Turns a reduced basis and the known high parts into hidden offsets.
pub trait SelectionStrategy: fmt::Debug + Send + Sync {
	fn name(&self) -> &'static str;

	fn select(
		&self,
		basis: &ReducedBasis,
		modulus: &BigUint,
		samples: &[BigUint],
		range: &HiddenRange,
	) -> Result<Vec<BigInt>>;
}

/// Built-in selection policies.
///
/// - `CenteredSolve` assumes every `|r . z| < m/2` and solves once. Fastest,
///   and right whenever the hidden bits are comfortably fewer than the
///   lattice can pin down.
/// - `CertifiedRows` proves that assumption from the row norms before
///   solving and refuses otherwise. It never returns an unproven answer, at
///   the price of rejecting instances the other policies would solve.
/// - `OffsetSearch` also tries `r . z = k + t*m` for `|t| <= radius` on the
///   `rows` longest rows and demands a single bounded solution. Costs
///   `(2*radius + 1)^rows` solves; helps when the longest rows are too long
///   for the centered guess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
	#[default]
	CenteredSolve,
	CertifiedRows,
	OffsetSearch { rows: usize, radius: u32 },
}

impl SelectionStrategy for SelectionPolicy {
	fn name(&self) -> &'static str {
		match self {
			SelectionPolicy::CenteredSolve => "centered-solve",
			SelectionPolicy::CertifiedRows => "certified-rows",
			SelectionPolicy::OffsetSearch { .. } => "offset-search",
		}
	}

	fn select(
		&self,
		basis: &ReducedBasis,
		modulus: &BigUint,
		samples: &[BigUint],
		range: &HiddenRange,
	) -> Result<Vec<BigInt>> {
		if samples.len() != basis.dimension() {
			return Err(Error::AmbiguousReconstruction(format!(
				"{} samples for a {}-dimensional basis", samples.len(), basis.dimension()
			)));
		}
		let m = BigInt::from(modulus.clone());
		let residues = residues(basis.rows(), &m, samples);

		match self {
			SelectionPolicy::CenteredSolve => centered_solve(basis.rows(), &residues, range),
			SelectionPolicy::CertifiedRows => {
				let limit = BigInt::from(range.max_magnitude());
				for (i, norm) in basis.l1_norms().into_iter().enumerate() {
					if (norm * &limit) << 1usize >= m {
						return Err(Error::AmbiguousReconstruction(format!(
							"row {} is too long to bound its product with the hidden bits", i
						)));
					}
				}
				centered_solve(basis.rows(), &residues, range)
			}
			SelectionPolicy::OffsetSearch { rows, radius } => {
				offset_search(basis, &m, &residues, range, *rows, *radius)
			}
		}
	}
}

/// The hidden offsets `z` with `samples[i] + z[i]` the true values.
pub fn hidden_bits(
	basis: &ReducedBasis,
	modulus: &BigUint,
	samples: &[BigUint],
	range: &HiddenRange,
	strategy: &dyn SelectionStrategy,
) -> Result<Vec<BigInt>> {
	let offsets = strategy.select(basis, modulus, samples, range)?;
	tracing::debug!(policy = strategy.name(), dimension = basis.dimension(), "selected hidden bits");
	Ok(offsets)
}

/// Adds offsets to their samples modulo `modulus`.
pub fn combine(modulus: &BigUint, samples: &[BigUint], offsets: &[BigInt]) -> Vec<BigUint> {
	let m = BigInt::from(modulus.clone());
	samples.iter()
		.zip(offsets)
		.map(|(y, z)| {
			let x = (BigInt::from(y.clone()) + z).mod_floor(&m);
			x.magnitude().clone()
		})
		.collect()
}

/// Solves `(a - 1)*x0 = difference - b (mod m)` for the state of the first
/// sample, keeping only roots whose whole run agrees with `samples`.
pub fn first_state_from_difference(
	params: &RecurrenceParameters,
	difference: &BigUint,
	samples: &[BigUint],
) -> Result<BigUint> {
	let m = params.modulus();
	let slope = (params.multiplier() + m - 1u32) % m;
	let rhs = (difference + m - params.increment()) % m;
	let g = slope.gcd(m);
	if !(&rhs % &g).is_zero() {
		return Err(Error::AmbiguousReconstruction(
			"recovered difference is incompatible with the increment".into(),
		));
	}

	let step = m / &g;
	let root = if step.is_one() {
		BigUint::zero()
	} else {
		let inverse = ((&slope / &g) % &step).modinv(&step).ok_or_else(|| {
			Error::AmbiguousReconstruction("reduced slope is not invertible".into())
		})?;
		((&rhs / &g) * inverse) % &step
	};

	let Some(first) = samples.first() else {
		return Err(Error::AmbiguousReconstruction("no samples to anchor the first state".into()));
	};
	let upper = std::cmp::min(first + params.hidden_bound(), m.clone());
	let mut candidate = if &root >= first {
		root
	} else {
		let skip = Integer::div_ceil(&(first - &root), &step);
		root + skip * &step
	};

	let mut consistent = Vec::new();
	let mut tried = 0u64;
	while candidate < upper {
		tried += 1;
		if tried > MAX_ROOTS {
			return Err(Error::AmbiguousReconstruction(format!(
				"more than {} roots fall inside the first sample's window", MAX_ROOTS
			)));
		}
		if agrees(params, &candidate, samples) {
			consistent.push(candidate.clone());
		}
		candidate += &step;
	}
	tracing::debug!(gcd = %g, tried, consistent = consistent.len(), "enumerated additive roots");

	match consistent.len() {
		1 => Ok(consistent.swap_remove(0)),
		0 => Err(Error::AmbiguousReconstruction("no root agrees with every sample".into())),
		n => Err(Error::AmbiguousReconstruction(format!("{} roots agree with every sample", n))),
	}
}

fn agrees(params: &RecurrenceParameters, first: &BigUint, samples: &[BigUint]) -> bool {
	let mut state = first.clone();
	for (i, sample) in samples.iter().enumerate() {
		if i > 0 {
			state = params.step(&state);
		}
		if !params.matches(&state, sample) {
			return false;
		}
	}
	true
}

// k_i = -(r_i . y) mod m, lifted to (-m/2, m/2].
fn residues(rows: &[Row], modulus: &BigInt, samples: &[BigUint]) -> Vec<BigInt> {
	let y: Vec<BigInt> = samples.iter().map(|s| BigInt::from(s.clone())).collect();
	rows.iter()
		.map(|row| {
			let dot: BigInt = row.iter().zip(&y).map(|(r, y)| r * y).sum();
			let k = (-dot).mod_floor(modulus);
			if (&k << 1usize) > *modulus { k - modulus } else { k }
		})
		.collect()
}

fn centered_solve(rows: &[Row], residues: &[BigInt], range: &HiddenRange) -> Result<Vec<BigInt>> {
	let z = solve_integral(rows, residues).ok_or_else(|| {
		Error::AmbiguousReconstruction("centered residues give no integral solution".into())
	})?;
	if let Some(i) = z.iter().position(|v| !range.contains(v)) {
		return Err(Error::AmbiguousReconstruction(format!(
			"offset {} of the solution is out of the hidden-bit range", i
		)));
	}
	Ok(z)
}

fn offset_search(
	basis: &ReducedBasis,
	modulus: &BigInt,
	residues: &[BigInt],
	range: &HiddenRange,
	rows: usize,
	radius: u32,
) -> Result<Vec<BigInt>> {
	let mut order: Vec<(usize, BigInt)> = basis.l1_norms().into_iter().enumerate().collect();
	order.sort_by(|a, b| b.1.cmp(&a.1));
	let picked: Vec<usize> = order.into_iter().take(rows).map(|(i, _)| i).collect();

	let radius = i64::from(radius);
	let mut offsets = vec![-radius; picked.len()];
	let mut found: Vec<Vec<BigInt>> = Vec::new();
	let mut solves = 0usize;
	loop {
		let mut target = residues.to_vec();
		for (&row, &t) in picked.iter().zip(&offsets) {
			target[row] += modulus * BigInt::from(t);
		}
		solves += 1;
		if let Some(z) = solve_integral(basis.rows(), &target) {
			if z.iter().all(|v| range.contains(v)) && !found.contains(&z) {
				found.push(z);
			}
		}

		// odometer over [-radius, radius]^rows
		let mut digit = 0;
		while digit < offsets.len() && offsets[digit] == radius {
			offsets[digit] = -radius;
			digit += 1;
		}
		if digit == offsets.len() {
			break;
		}
		offsets[digit] += 1;
	}
	tracing::debug!(rows = picked.len(), solves, candidates = found.len(), "offset search finished");

	match found.len() {
		1 => Ok(found.swap_remove(0)),
		0 => Err(Error::AmbiguousReconstruction("no offset combination gives bounded hidden bits".into())),
		n => Err(Error::AmbiguousReconstruction(format!("{} offset combinations give bounded hidden bits", n))),
	}
}

/// Integral solution of the square system `rows * z = rhs`, if there is one.
///
/// Fraction-free (Bareiss) elimination keeps every intermediate value an
/// integer; back substitution fails as soon as a division is inexact.
pub fn solve_integral(rows: &[Row], rhs: &[BigInt]) -> Option<Vec<BigInt>> {
	let n = rows.len();
	let mut m: Vec<Vec<BigInt>> = rows.iter()
		.zip(rhs)
		.map(|(row, k)| {
			let mut augmented = row.clone();
			augmented.push(k.clone());
			augmented
		})
		.collect();

	let mut prev = BigInt::one();
	for k in 0..n {
		let pivot = (k..n).find(|&i| !m[i][k].is_zero())?;
		m.swap(k, pivot);
		for i in k + 1..n {
			for j in k + 1..=n {
				let v = (&m[k][k] * &m[i][j] - &m[i][k] * &m[k][j]) / &prev;
				m[i][j] = v;
			}
			m[i][k] = BigInt::zero();
		}
		prev = m[k][k].clone();
	}

	let mut z = vec![BigInt::zero(); n];
	for i in (0..n).rev() {
		let mut acc = m[i][n].clone();
		for j in i + 1..n {
			acc -= &m[i][j] * &z[j];
		}
		let (q, r) = acc.div_rem(&m[i][i]);
		if !r.is_zero() {
			return None;
		}
		z[i] = q;
	}
	Some(z)
}
