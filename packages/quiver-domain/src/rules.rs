use regex::Regex;

use crate::intent::IntentLabel;

/// Canonical cache-key form of a query: case-folded, whitespace-collapsed.
pub fn normalize_query(raw: &str) -> String {
	raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Normalized text with punctuation flattened to spaces, used for word-level
/// pattern matching only. Underscores survive so compound identifiers stay
/// intact.
fn matchable_text(raw: &str) -> String {
	let flattened: String = normalize_query(raw)
		.chars()
		.map(|c| if c.is_alphanumeric() || c == '_' || c == ' ' { c } else { ' ' })
		.collect();

	flattened.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rule-based intent detection. Families are evaluated in priority order
/// (factual > keyword > exploratory > summary); the first match wins.
/// Returns `None` when no family matches.
pub fn classify_rules(raw: &str) -> Option<IntentLabel> {
	let text = matchable_text(raw);

	if matches_factual(&text) {
		return Some(IntentLabel::Factual);
	}
	if matches_keyword(raw, &text) {
		return Some(IntentLabel::Keyword);
	}
	if matches_exploratory(&text) {
		return Some(IntentLabel::Exploratory);
	}
	if matches_summary(&text) {
		return Some(IntentLabel::Summary);
	}

	None
}

fn matches_factual(text: &str) -> bool {
	let patterns = [
		r"^(what|who|whom|whose|when|where|which)\b",
		r"\b(define|definition of|meaning of|stands for)\b",
	];

	matches_any(&patterns, text)
}

/// Keyword signals live partly in the raw text: acronyms and quoted literals
/// are destroyed by case-folding and punctuation flattening.
fn matches_keyword(raw: &str, text: &str) -> bool {
	let raw_patterns = [r"\b[A-Z][A-Z0-9_]{2,}\b", r#""[^"]+""#, r"`[^`]+`", r"'[^' ]{2,}'"];
	let text_patterns = [r"\b[a-z0-9]+(_[a-z0-9]+)+\b"];

	matches_any(&raw_patterns, raw) || matches_any(&text_patterns, text)
}

fn matches_exploratory(text: &str) -> bool {
	let patterns = [
		r"^(how|why)\b",
		r"\b(explain|compare|comparison|difference between|trade ?offs?|versus|vs)\b",
	];

	matches_any(&patterns, text)
}

fn matches_summary(text: &str) -> bool {
	let patterns = [r"\b(summarize|summarise|summary|overview|tl ?dr|brief|recap|rundown)\b"];

	matches_any(&patterns, text)
}

fn matches_any(patterns: &[&str], text: &str) -> bool {
	for pattern in patterns {
		if Regex::new(pattern).map(|re| re.is_match(text)).unwrap_or(false) {
			return true;
		}
	}

	false
}
