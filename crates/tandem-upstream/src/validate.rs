//! Local pre-flight validation.
//!
//! All of this runs before any HTTP call is constructed; a failure here
//! never reaches the network (spec §7).

use tandem_core::Error;

/// Validates an owner or repo path segment: must be non-empty, ASCII
/// alphanumeric plus `-`, `_`, `.`, and must not itself contain a path
/// separator (which would otherwise let a caller smuggle an arbitrary
/// path into the request URL).
pub fn validate_path_segment(field: &str, value: &str) -> Result<(), Error> {
	if value.is_empty() {
		return Err(Error::validation(format!("{field} must not be empty")));
	}
	let is_safe = value
		.bytes()
		.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.');
	if !is_safe || value.contains('/') {
		return Err(Error::validation(format!("{field} contains unsafe characters: {value}")));
	}
	Ok(())
}

/// Validates `page >= 1`.
pub fn validate_page(page: u32) -> Result<(), Error> {
	if page < 1 {
		return Err(Error::validation("page must be >= 1"));
	}
	Ok(())
}

/// Validates `1 <= per_page <= 100`.
pub fn validate_per_page(per_page: u32) -> Result<(), Error> {
	if !(1..=100).contains(&per_page) {
		return Err(Error::validation("per_page must be between 1 and 100"));
	}
	Ok(())
}

/// Validates a commit SHA: 7 to 40 lowercase hex digits.
pub fn validate_sha(sha: &str) -> Result<(), Error> {
	let len_ok = (7..=40).contains(&sha.len());
	let hex_ok = sha.bytes().all(|b| b.is_ascii_hexdigit());
	if !len_ok || !hex_ok {
		return Err(Error::validation(format!("invalid SHA: {sha}")));
	}
	Ok(())
}

/// Validates a pull request / issue title is non-empty.
pub fn validate_title(title: &str) -> Result<(), Error> {
	if title.trim().is_empty() {
		return Err(Error::validation("title must not be empty"));
	}
	Ok(())
}

/// Validates a label name is non-empty and within GitHub's 50-character
/// limit.
pub fn validate_label_name(name: &str) -> Result<(), Error> {
	if name.trim().is_empty() {
		return Err(Error::validation("label name must not be empty"));
	}
	if name.chars().count() > 50 {
		return Err(Error::validation("label name exceeds 50 characters"));
	}
	Ok(())
}

/// Validates a label color: `#`-prefixed or bare 6-hex-digit string (spec
/// §8 boundary behavior).
pub fn validate_label_color(color: &str) -> Result<(), Error> {
	let hex = color.strip_prefix('#').unwrap_or(color);
	if hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
		Ok(())
	} else {
		Err(Error::validation(format!("invalid label color: {color}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_empty_owner() {
		assert!(validate_path_segment("owner", "").is_err());
	}

	#[test]
	fn rejects_path_traversal_in_repo() {
		assert!(validate_path_segment("repo", "../etc").is_err());
	}

	#[test]
	fn accepts_hyphenated_repo() {
		assert!(validate_path_segment("repo", "my-repo.rs").is_ok());
	}

	#[test]
	fn per_page_bounds() {
		assert!(validate_per_page(0).is_err());
		assert!(validate_per_page(101).is_err());
		assert!(validate_per_page(30).is_ok());
	}

	#[test]
	fn label_color_accepts_hash_prefix_and_bare() {
		assert!(validate_label_color("#1a2b3c").is_ok());
		assert!(validate_label_color("1a2b3c").is_ok());
	}

	#[test]
	fn label_color_rejects_wrong_length() {
		assert!(validate_label_color("#1a2b3").is_err());
		assert!(validate_label_color("notacolor").is_err());
	}

	#[test]
	fn sha_rejects_non_hex() {
		assert!(validate_sha("zzzzzzz").is_err());
	}

	#[test]
	fn sha_accepts_short_prefix() {
		assert!(validate_sha("abc1234").is_ok());
	}

	#[test]
	fn empty_title_is_validation_error() {
		assert!(validate_title("   ").is_err());
	}
}
