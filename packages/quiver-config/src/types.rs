use serde::Deserialize;
use serde_json::{Map, Value};

use quiver_domain::{IntentLabel, WeightVector};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
	pub providers: Providers,
	pub classifier: Classifier,
	pub search: Search,
	pub expansion: Expansion,
	pub fusion: Fusion,
	pub weights: WeightProfiles,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Providers {
	/// Optional. Absent means the classifier never escalates and the
	/// three-stage expansion strategy degrades to its early exits.
	pub generation: Option<GenerationProviderConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GenerationProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub max_tokens: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Classifier {
	/// Bounded LRU entries keyed by normalized query text.
	pub cache_capacity: usize,
	/// Escalate inconclusive rule passes to the generation backend.
	pub llm_escalation: bool,
	/// Budget for the escalation call. Must stay short relative to
	/// `search.channel_timeout_ms` since it precedes the fan-out.
	pub llm_timeout_ms: u64,
}
impl Default for Classifier {
	fn default() -> Self {
		Self { cache_capacity: 1_000, llm_escalation: true, llm_timeout_ms: 800 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub top_k: u32,
	pub channel_timeout_ms: u64,
	/// Skip channels whose intent weight is exactly 0.0 instead of running
	/// them for observability.
	pub skip_zero_weight_channels: bool,
}
impl Default for Search {
	fn default() -> Self {
		Self { top_k: 10, channel_timeout_ms: 2_000, skip_zero_weight_channels: true }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Expansion {
	/// "vector_anchor" or "llm_3stage".
	pub strategy: String,
	/// Dense anchors fetched by the vector-anchor strategy.
	pub anchor_k: u32,
	/// Bound on the entity-overlap join.
	pub max_expansion: u32,
	/// Bound on graph traversal from extracted entities.
	pub max_hops: u32,
}
impl Default for Expansion {
	fn default() -> Self {
		Self { strategy: "vector_anchor".to_string(), anchor_k: 5, max_expansion: 64, max_hops: 2 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Fusion {
	/// RRF smoothing constant shared across channels.
	pub rrf_k: f32,
}
impl Default for Fusion {
	fn default() -> Self {
		Self { rrf_k: 60.0 }
	}
}

/// Static intent → per-channel weight table. Loaded once; validation
/// rejects profiles that do not sum to 1.0 within tolerance.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WeightProfiles {
	pub factual: WeightVector,
	pub keyword: WeightVector,
	pub exploratory: WeightVector,
	pub summary: WeightVector,
}
impl WeightProfiles {
	pub fn lookup(&self, intent: IntentLabel) -> WeightVector {
		match intent {
			IntentLabel::Factual => self.factual,
			IntentLabel::Keyword => self.keyword,
			IntentLabel::Exploratory => self.exploratory,
			IntentLabel::Summary => self.summary,
		}
	}
}
impl Default for WeightProfiles {
	fn default() -> Self {
		Self {
			factual: WeightVector::new(0.3, 0.3, 0.4, 0.0),
			keyword: WeightVector::new(0.1, 0.6, 0.3, 0.0),
			exploratory: WeightVector::new(0.2, 0.1, 0.2, 0.5),
			summary: WeightVector::new(0.1, 0.0, 0.1, 0.8),
		}
	}
}
