//! Affine recurrences `s -> (a*s + b) mod m` and their truncated outputs.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::error::{Error, Result};

/// Whether the recurrence carries a constant term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
	/// Standard LCG, `s -> a*s + b`.
	Additive { increment: BigUint },
	/// Lehmer generator, `s -> a*s`.
	Multiplicative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceParameters {
	modulus: BigUint,
	multiplier: BigUint,
	variant: Variant,
	shift: u32,
}

impl RecurrenceParameters {
	/// A zero increment (modulo `modulus`) selects the Lehmer variant.
	pub fn new(modulus: BigUint, multiplier: BigUint, increment: BigUint, shift: u32) -> Result<Self> {
		if modulus <= BigUint::one() {
			return Err(Error::InvalidParameters(format!("modulus {} must be greater than 1", modulus)));
		}
		let multiplier = multiplier % &modulus;
		if multiplier.is_zero() {
			return Err(Error::InvalidParameters("multiplier vanishes modulo the modulus".into()));
		}
		if u64::from(shift) >= modulus.bits() {
			return Err(Error::InvalidParameters(format!(
				"shift {} hides every bit of a {}-bit modulus", shift, modulus.bits()
			)));
		}
		let increment = increment % &modulus;
		let variant = if increment.is_zero() {
			Variant::Multiplicative
		} else {
			Variant::Additive { increment }
		};
		Ok(Self { modulus, multiplier, variant, shift })
	}

	pub fn lehmer(modulus: BigUint, multiplier: BigUint, shift: u32) -> Result<Self> {
		Self::new(modulus, multiplier, BigUint::zero(), shift)
	}

	/// glibc's `rand_r`, i.e. `initstate` with an 8 byte state. Nothing is truncated.
	pub fn glibc() -> Self {
		Self {
			modulus: BigUint::one() << 32,
			multiplier: BigUint::from(1103515245u32),
			variant: Variant::Additive { increment: BigUint::from(12345u32) },
			shift: 0,
		}
	}

	/// `java.util.Random`: a 48-bit state of which `next(16)` reveals the top 16 bits.
	pub fn java() -> Self {
		Self {
			modulus: BigUint::one() << 48,
			multiplier: BigUint::from(0x5DEECE66Du64),
			variant: Variant::Additive { increment: BigUint::from(0xBu32) },
			shift: 48 - 16,
		}
	}

	/// Same recurrence, different number of hidden bits.
	pub fn with_shift(&self, shift: u32) -> Result<Self> {
		Self::new(self.modulus.clone(), self.multiplier.clone(), self.increment(), shift)
	}

	pub fn modulus(&self) -> &BigUint {
		&self.modulus
	}

	pub fn multiplier(&self) -> &BigUint {
		&self.multiplier
	}

	pub fn variant(&self) -> &Variant {
		&self.variant
	}

	pub fn increment(&self) -> BigUint {
		match &self.variant {
			Variant::Additive { increment } => increment.clone(),
			Variant::Multiplicative => BigUint::zero(),
		}
	}

	pub fn shift(&self) -> u32 {
		self.shift
	}

	/// Exclusive upper bound of the hidden low bits, `2^shift`.
	pub fn hidden_bound(&self) -> BigUint {
		BigUint::one() << self.shift
	}

	pub fn step(&self, state: &BigUint) -> BigUint {
		(&self.multiplier * state + self.increment()) % &self.modulus
	}

	/// State reached after `count` forward steps, in O(log count) multiplications.
	pub fn jump(&self, state: &BigUint, count: u64) -> BigUint {
		self.forward().pow(count, &self.modulus).apply(state, &self.modulus)
	}

	pub fn step_back(&self, state: &BigUint, count: u64) -> Result<BigUint> {
		Ok(self.backward()?.pow(count, &self.modulus).apply(state, &self.modulus))
	}

	/// Infinite stream of the states following `seed`.
	pub fn states(&self, seed: BigUint) -> States<'_> {
		States { params: self, state: seed % &self.modulus }
	}

	/// Infinite stream of the states preceding `seed`, nearest first.
	pub fn predecessors(&self, seed: BigUint) -> Result<Predecessors> {
		Ok(Predecessors {
			map: self.backward()?,
			modulus: self.modulus.clone(),
			state: seed % &self.modulus,
		})
	}

	/// The state with its low `shift` bits cleared, as an observer sees it.
	pub fn truncate(&self, state: &BigUint) -> BigUint {
		(state >> self.shift) << self.shift
	}

	/// The visible high bits of `state`.
	pub fn output(&self, state: &BigUint) -> BigUint {
		state >> self.shift
	}

	/// Does `state` agree with the truncated `sample`?
	pub fn matches(&self, state: &BigUint, sample: &BigUint) -> bool {
		state < &self.modulus && self.truncate(state) == *sample
	}

	fn inverse_multiplier(&self) -> Result<BigUint> {
		self.multiplier.modinv(&self.modulus).ok_or_else(|| Error::NonInvertibleMultiplier {
			gcd: self.multiplier.gcd(&self.modulus).to_string(),
		})
	}

	fn forward(&self) -> Affine {
		Affine { scale: self.multiplier.clone(), offset: self.increment() }
	}

	fn backward(&self) -> Result<Affine> {
		let scale = self.inverse_multiplier()?;
		let shifted = (&scale * self.increment()) % &self.modulus;
		let offset = (&self.modulus - shifted) % &self.modulus;
		Ok(Affine { scale, offset })
	}
}

pub struct States<'a> {
	params: &'a RecurrenceParameters,
	state: BigUint,
}

impl Iterator for States<'_> {
	type Item = BigUint;

	fn next(&mut self) -> Option<BigUint> {
		self.state = self.params.step(&self.state);
		Some(self.state.clone())
	}
}

pub struct Predecessors {
	map: Affine,
	modulus: BigUint,
	state: BigUint,
}

impl Iterator for Predecessors {
	type Item = BigUint;

	fn next(&mut self) -> Option<BigUint> {
		self.state = self.map.apply(&self.state, &self.modulus);
		Some(self.state.clone())
	}
}

// s -> scale*s + offset
#[derive(Debug, Clone)]
struct Affine {
	scale: BigUint,
	offset: BigUint,
}

impl Affine {
	fn identity() -> Self {
		Self { scale: BigUint::one(), offset: BigUint::zero() }
	}

	fn apply(&self, state: &BigUint, modulus: &BigUint) -> BigUint {
		(&self.scale * state + &self.offset) % modulus
	}

	fn then(&self, next: &Affine, modulus: &BigUint) -> Affine {
		Affine {
			scale: (&next.scale * &self.scale) % modulus,
			offset: (&next.scale * &self.offset + &next.offset) % modulus,
		}
	}

	fn pow(&self, mut count: u64, modulus: &BigUint) -> Affine {
		let mut acc = Affine::identity();
		let mut base = self.clone();
		while count > 0 {
			if count & 1 == 1 {
				acc = acc.then(&base, modulus);
			}
			base = base.then(&base, modulus);
			count >>= 1;
		}
		acc
	}
}
