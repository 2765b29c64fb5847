use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static KEYWORD: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"[a-zA-Z]{3,}").expect("Keyword pattern must compile."));

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ParsedQuery {
	pub raw: String,
	pub keywords: Vec<String>,
}

/// Trims the prompt and extracts lowercase alphabetic keywords of three or
/// more characters, first occurrence kept.
pub fn parse_query(prompt: &str) -> ParsedQuery {
	let raw = prompt.trim().to_string();
	let mut keywords = Vec::new();

	for token in KEYWORD.find_iter(&raw.to_lowercase()) {
		let token = token.as_str().to_string();

		if !keywords.contains(&token) {
			keywords.push(token);
		}
	}

	ParsedQuery { raw, keywords }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keywords_are_lowercased_deduped_and_ordered() {
		let parsed = parse_query("  Space OPERA with space battles!  ");

		assert_eq!(parsed.raw, "Space OPERA with space battles!");
		assert_eq!(parsed.keywords, vec!["space", "opera", "with", "battles"]);
	}

	#[test]
	fn short_tokens_and_digits_are_dropped() {
		let parsed = parse_query("an AI in 2099");

		assert_eq!(parsed.keywords, Vec::<String>::new());
	}

	#[test]
	fn blank_prompt_parses_to_empty() {
		let parsed = parse_query("   ");

		assert_eq!(parsed.raw, "");
		assert!(parsed.keywords.is_empty());
	}
}
