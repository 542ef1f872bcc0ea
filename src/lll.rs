//! Exact LLL reduction over the integers.
//!
//! Cohen's integral variant (A Course in Computational Algebraic Number
//! Theory, algorithm 2.6.7): instead of the rational Gram-Schmidt
//! coefficients `mu[i][j]` it tracks `lambda[i][j] = d[j] * mu[i][j]` and the
//! Gram determinants `d[i]`, all of which are integers. No floating point is
//! involved, so reduction is exact and deterministic for any entry size.
//!
//! Indices below follow the book: vectors are 1-based, `b[k - 1]` is `b_k`
//! and `d[0] = 1`.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::error::{Error, Result};
use crate::lattice::Row;
use crate::reduction::LatticeReducer;

/// Lovász constant `delta = delta_num / delta_den`, in (1/4, 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LllConfig {
	pub delta_num: u32,
	pub delta_den: u32,
}

impl Default for LllConfig {
	fn default() -> Self {
		Self { delta_num: 99, delta_den: 100 }
	}
}

impl LllConfig {
	/// The textbook delta = 3/4.
	pub fn classic() -> Self {
		Self { delta_num: 3, delta_den: 4 }
	}

	/// delta = 1/2, fewer swaps and a weaker basis.
	pub fn fast() -> Self {
		Self { delta_num: 1, delta_den: 2 }
	}

	pub fn validate(&self) -> Result<()> {
		let (num, den) = (u64::from(self.delta_num), u64::from(self.delta_den));
		if den == 0 || 4 * num <= den || num >= den {
			return Err(Error::ReductionFailed(format!(
				"delta {}/{} is outside (1/4, 1)", self.delta_num, self.delta_den
			)));
		}
		Ok(())
	}
}

#[derive(Debug, Clone, Default)]
pub struct LllStats {
	pub size_reductions: usize,
	pub swaps: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IntegralLll {
	config: LllConfig,
}

impl IntegralLll {
	pub fn new(config: LllConfig) -> Self {
		Self { config }
	}

	/// Reduces `basis` in place.
	pub fn reduce_in_place(&self, b: &mut [Row]) -> Result<LllStats> {
		self.config.validate()?;
		let n = b.len();
		if n == 0 {
			return Err(Error::ReductionFailed("empty basis".into()));
		}
		if let Some(row) = b.iter().position(|r| r.len() != n) {
			return Err(Error::ReductionFailed(format!(
				"basis is not square: row {} has {} entries, expected {}", row, b[row].len(), n
			)));
		}

		let p = BigInt::from(self.config.delta_num);
		let q = BigInt::from(self.config.delta_den);
		let mut g = Gram::new(n);
		let mut stats = LllStats::default();

		g.d[1] = dot(&b[0], &b[0]);
		if g.d[1].is_zero() {
			return Err(dependent(1));
		}

		let mut k = 2;
		let mut k_max = 1;
		while k <= n {
			if k > k_max {
				k_max = k;
				g.extend(b, k)?;
			}
			loop {
				if g.size_reduce(b, k, k - 1) {
					stats.size_reductions += 1;
				}
				let lhs = &q * &g.d[k] * &g.d[k - 2];
				let lambda = &g.lambda[k][k - 1];
				let rhs = &p * &g.d[k - 1] * &g.d[k - 1] - &q * lambda * lambda;
				if lhs < rhs {
					g.swap(b, k, k_max);
					stats.swaps += 1;
					k = std::cmp::max(2, k - 1);
				} else {
					for l in (1..k - 1).rev() {
						if g.size_reduce(b, k, l) {
							stats.size_reductions += 1;
						}
					}
					k += 1;
					break;
				}
			}
		}

		tracing::debug!(
			dimension = n,
			swaps = stats.swaps,
			size_reductions = stats.size_reductions,
			"LLL reduction finished"
		);
		Ok(stats)
	}
}

impl LatticeReducer for IntegralLll {
	fn reduce(&self, mut rows: Vec<Row>) -> Result<Vec<Row>> {
		self.reduce_in_place(&mut rows)?;
		Ok(rows)
	}
}

struct Gram {
	d: Vec<BigInt>,
	lambda: Vec<Vec<BigInt>>,
}

impl Gram {
	fn new(n: usize) -> Self {
		let mut d = vec![BigInt::zero(); n + 1];
		d[0] = BigInt::one();
		Self { d, lambda: vec![vec![BigInt::zero(); n + 1]; n + 1] }
	}

	// First visit of b_k: fill lambda[k][..k] and d[k].
	fn extend(&mut self, b: &[Row], k: usize) -> Result<()> {
		for j in 1..=k {
			let mut u = dot(&b[k - 1], &b[j - 1]);
			for i in 1..j {
				u = (&self.d[i] * &u - &self.lambda[k][i] * &self.lambda[j][i]) / &self.d[i - 1];
			}
			if j < k {
				self.lambda[k][j] = u;
			} else if u.is_zero() {
				return Err(dependent(k));
			} else {
				self.d[k] = u;
			}
		}
		Ok(())
	}

	fn size_reduce(&mut self, b: &mut [Row], k: usize, l: usize) -> bool {
		let twice = &self.lambda[k][l] << 1usize;
		if twice.magnitude() <= self.d[l].magnitude() {
			return false;
		}
		let den = &self.d[l] << 1usize;
		let r = (twice + &self.d[l]).div_floor(&den);

		let (head, tail) = b.split_at_mut(k - 1);
		for (x, y) in tail[0].iter_mut().zip(&head[l - 1]) {
			*x -= &r * y;
		}
		let shift = &r * &self.d[l];
		self.lambda[k][l] -= shift;
		for i in 1..l {
			let shift = &r * &self.lambda[l][i];
			self.lambda[k][i] -= shift;
		}
		true
	}

	fn swap(&mut self, b: &mut [Row], k: usize, k_max: usize) {
		b.swap(k - 1, k - 2);
		for j in 1..k - 1 {
			let (head, tail) = self.lambda.split_at_mut(k);
			std::mem::swap(&mut head[k - 1][j], &mut tail[0][j]);
		}

		let lambda = self.lambda[k][k - 1].clone();
		let big_b = (&self.d[k - 2] * &self.d[k] + &lambda * &lambda) / &self.d[k - 1];
		for i in k + 1..=k_max {
			let t = self.lambda[i][k].clone();
			self.lambda[i][k] = (&self.d[k] * &self.lambda[i][k - 1] - &lambda * &t) / &self.d[k - 1];
			self.lambda[i][k - 1] = (&big_b * &t + &lambda * &self.lambda[i][k]) / &self.d[k];
		}
		self.d[k - 1] = big_b;
	}
}

fn dot(a: &[BigInt], b: &[BigInt]) -> BigInt {
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn dependent(k: usize) -> Error {
	Error::ReductionFailed(format!("basis vector {} is linearly dependent on its predecessors", k))
}
