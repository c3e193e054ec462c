use serde::{Deserialize, Serialize};

/// Coarse classification of a query's information need. Drives the
/// per-channel weight selection during fusion.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
	Factual,
	Keyword,
	Exploratory,
	Summary,
}
impl IntentLabel {
	/// Used when classification is inconclusive.
	pub const FALLBACK: Self = Self::Factual;
	/// Priority order for tie-breaking between rule families and for loose
	/// label parsing.
	pub const PRIORITY: [Self; 4] = [Self::Factual, Self::Keyword, Self::Exploratory, Self::Summary];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Factual => "factual",
			Self::Keyword => "keyword",
			Self::Exploratory => "exploratory",
			Self::Summary => "summary",
		}
	}

	/// Parse a label from free-form backend output: exact match first, then
	/// substring match, case-insensitive, trimmed. Ambiguity resolves by
	/// priority order.
	pub fn parse_loose(text: &str) -> Option<Self> {
		let lowered = text.trim().to_lowercase();

		for label in Self::PRIORITY {
			if lowered == label.as_str() {
				return Some(label);
			}
		}

		Self::PRIORITY.into_iter().find(|label| lowered.contains(label.as_str()))
	}
}
