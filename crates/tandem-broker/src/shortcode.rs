//! Cryptographically random short-code generation (spec §4.G, §9 Design
//! Notes forbidding predictable/time-seeded randomness).

use rand::rngs::OsRng;
use rand::RngCore;

/// 32 symbols, excluding the visually-ambiguous `0`, `O`, `1`, `I`.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Draws a fresh `XXX-YY` code from [`OsRng`].
pub fn generate() -> String {
	let mut rng = OsRng;
	let mut pick = |n: usize| -> Vec<u8> {
		(0..n)
			.map(|_| ALPHABET[(rng.next_u32() as usize) % ALPHABET.len()])
			.collect()
	};
	let head = String::from_utf8(pick(3)).expect("alphabet is ASCII");
	let tail = String::from_utf8(pick(2)).expect("alphabet is ASCII");
	format!("{head}-{tail}")
}

/// Draws codes until `is_taken` reports `false`, for collision retry against
/// a broker's live `waiting`/`active` set.
pub fn generate_unique(mut is_taken: impl FnMut(&str) -> bool) -> String {
	loop {
		let code = generate();
		if !is_taken(&code) {
			return code;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generated_code_matches_shape() {
		let code = generate();
		assert_eq!(code.len(), 6);
		assert_eq!(code.as_bytes()[3], b'-');
		for b in code.bytes().filter(|&b| b != b'-') {
			assert!(ALPHABET.contains(&b), "unexpected symbol {}", b as char);
		}
	}

	#[test]
	fn excludes_ambiguous_symbols() {
		for forbidden in [b'0', b'O', b'1', b'I'] {
			assert!(!ALPHABET.contains(&forbidden));
		}
	}

	#[test]
	fn regenerates_on_collision() {
		let mut calls = 0;
		let code = generate_unique(|_| {
			calls += 1;
			calls < 3
		});
		assert_eq!(calls, 3);
		assert_eq!(code.len(), 6);
	}

	proptest::proptest! {
		#[test]
		fn every_generated_code_is_well_formed(_seed in 0u32..1000) {
			let code = generate();
			proptest::prop_assert_eq!(code.len(), 6);
			proptest::prop_assert_eq!(code.as_bytes()[3], b'-');
		}
	}
}
