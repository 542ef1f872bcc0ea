//! Getting truncated outputs into the shape the recovery expects.

use num_bigint::BigUint;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
	Decimal,
	Hex,
}

const NUMBER_TAG: &str = "<span class=\"number\">";

/// Big-endian hex, with or without `0x` and of any length.
pub fn parse_hex(token: &str) -> Result<BigUint> {
	let digits = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).unwrap_or(token);
	let padded = if digits.len() % 2 == 1 { format!("0{}", digits) } else { digits.to_owned() };
	hex::decode(&padded).map_err(|err| Error::SampleParse {
		input: token.to_owned(),
		reason: match err {
			hex::FromHexError::InvalidHexCharacter { .. } => "invalid hex character",
			_ => "invalid hex length",
		},
	}).and_then(|bytes| if bytes.is_empty() {
		Err(Error::SampleParse { input: token.to_owned(), reason: "empty" })
	} else {
		Ok(BigUint::from_bytes_be(&bytes))
	})
}

pub fn parse_decimal(token: &str) -> Result<BigUint> {
	BigUint::parse_bytes(token.as_bytes(), 10).ok_or_else(|| Error::SampleParse {
		input: token.to_owned(),
		reason: "not a decimal integer",
	})
}

/// Whitespace separated visible outputs, moved up by `shift` bits so they
/// line up with the states they were cut from.
pub fn parse_samples(text: &str, radix: Radix, shift: u32) -> Result<Vec<BigUint>> {
	text.split_whitespace()
		.map(|token| match radix {
			Radix::Decimal => parse_decimal(token),
			Radix::Hex => parse_hex(token),
		})
		.map(|value| value.map(|v| v << shift))
		.collect()
}

/// Turns rounds of outputs (one value per generator) into one sequence per
/// generator. Rounds are cut to the shortest one.
pub fn transpose(rounds: Vec<Vec<BigUint>>) -> Vec<Vec<BigUint>> {
	let width = rounds.iter().map(Vec::len).min().unwrap_or(0);
	let mut sequences = vec![Vec::with_capacity(rounds.len()); width];
	for round in rounds {
		for (sequence, value) in sequences.iter_mut().zip(round) {
			sequence.push(value);
		}
	}
	sequences
}

/// Hex numbers inside `<span class="number">..</span>` tags, in page order.
pub fn extract_numbers(page: &str) -> Result<Vec<BigUint>> {
	page.split(NUMBER_TAG)
		.skip(1)
		.map(|rest| {
			let end = rest.find(|c: char| !c.is_ascii_alphanumeric()).unwrap_or(rest.len());
			parse_hex(&rest[..end])
		})
		.collect()
}

pub fn fetch(url: &str) -> Result<String> {
	let body = ureq::get(url).call()?.body_mut().read_to_string()?;
	Ok(body)
}

/// Loads `url` `rounds` times and returns one aligned sample sequence per
/// generator shown on the page.
pub fn poll(url: &str, rounds: usize, shift: u32) -> Result<Vec<Vec<BigUint>>> {
	let mut observed = Vec::with_capacity(rounds);
	for round in 0..rounds {
		let numbers = extract_numbers(&fetch(url)?)?;
		if numbers.is_empty() {
			return Err(Error::Acquisition(format!("no numbers on {} in round {}", url, round)));
		}
		tracing::debug!(round, count = numbers.len(), "polled outputs");
		observed.push(numbers.into_iter().map(|n| n << shift).collect());
	}
	Ok(transpose(observed))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn uints(values: &[u64]) -> Vec<BigUint> {
		values.iter().map(|&v| BigUint::from(v)).collect()
	}

	#[test]
	fn parses_hex_tokens() {
		assert_eq!(parse_hex("3F").unwrap(), BigUint::from(0x3Fu8));
		assert_eq!(parse_hex("0xabc").unwrap(), BigUint::from(0xABCu16));
		assert_eq!(parse_hex("0100000000000000000000").unwrap(), BigUint::from(1u8) << 80);
		assert!(matches!(parse_hex("zz"), Err(Error::SampleParse { reason: "invalid hex character", .. })));
		assert!(matches!(parse_hex("0x"), Err(Error::SampleParse { reason: "empty", .. })));
	}

	#[test]
	fn aligns_samples() {
		assert_eq!(parse_samples("1 2\n3", Radix::Decimal, 4).unwrap(), uints(&[16, 32, 48]));
		assert_eq!(parse_samples("ff 10", Radix::Hex, 0).unwrap(), uints(&[255, 16]));
		assert!(parse_samples("12 x", Radix::Decimal, 0).is_err());
	}

	#[test]
	fn transposes_rounds() {
		let rounds = vec![uints(&[1, 2, 3]), uints(&[4, 5, 6]), uints(&[7, 8])];
		assert_eq!(transpose(rounds), vec![uints(&[1, 4, 7]), uints(&[2, 5, 8])]);
		assert!(transpose(vec![]).is_empty());
	}

	#[test]
	fn extracts_numbers_from_page() {
		let page = r#"<ul><li><span class="number">0A</span></li><li><span class="number">ff</span></li></ul>"#;
		assert_eq!(extract_numbers(page).unwrap(), uints(&[10, 255]));
		assert!(extract_numbers("<p>closed</p>").unwrap().is_empty());
	}
}
