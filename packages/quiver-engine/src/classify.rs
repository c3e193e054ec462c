use std::{
	num::NonZeroUsize,
	sync::Mutex,
	time::{Duration, Instant},
};

use lru::LruCache;
use tracing::{debug, warn};

use crate::QuiverEngine;
use quiver_domain::{IntentLabel, WeightVector, rules};

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationPath {
	Rule,
	Llm,
	Cache,
	Override,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ClassificationResult {
	pub intent: IntentLabel,
	pub weights: WeightVector,
	pub path: ClassificationPath,
	pub latency_ms: f64,
}

/// Bounded LRU over normalized query text. Shared across concurrent queries;
/// the mutex is held only for point lookups and inserts.
pub struct ClassificationCache {
	inner: Mutex<LruCache<String, (IntentLabel, WeightVector)>>,
}
impl ClassificationCache {
	pub fn new(capacity: usize) -> Self {
		let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

		Self { inner: Mutex::new(LruCache::new(capacity)) }
	}

	fn get(&self, key: &str) -> Option<(IntentLabel, WeightVector)> {
		let mut cache = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		cache.get(key).copied()
	}

	fn put(&self, key: String, intent: IntentLabel, weights: WeightVector) {
		let mut cache = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		cache.put(key, (intent, weights));
	}

	pub fn len(&self) -> usize {
		self.inner.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl QuiverEngine {
	/// Resolve the query's intent and fusion weights. Never fails: backend
	/// trouble during escalation degrades to the rule-based fallback.
	pub async fn classify(
		&self,
		query_text: &str,
		override_intent: Option<IntentLabel>,
	) -> ClassificationResult {
		let started = Instant::now();

		if let Some(intent) = override_intent {
			return ClassificationResult {
				intent,
				weights: self.cfg.weights.lookup(intent),
				path: ClassificationPath::Override,
				latency_ms: elapsed_ms(started),
			};
		}

		let key = rules::normalize_query(query_text);

		if let Some((intent, weights)) = self.cache.get(&key) {
			return ClassificationResult {
				intent,
				weights,
				path: ClassificationPath::Cache,
				latency_ms: 0.0,
			};
		}

		let (intent, path) = match rules::classify_rules(query_text) {
			Some(intent) => (intent, ClassificationPath::Rule),
			None => match self.classify_llm(query_text).await {
				Some(intent) => (intent, ClassificationPath::Llm),
				None => (IntentLabel::FALLBACK, ClassificationPath::Rule),
			},
		};
		let weights = self.cfg.weights.lookup(intent);

		self.cache.put(key, intent, weights);
		debug!(intent = intent.as_str(), ?path, "query classified");

		ClassificationResult { intent, weights, path, latency_ms: elapsed_ms(started) }
	}

	/// Single short-budget escalation call. Any failure returns `None` so the
	/// caller falls back to the rule result.
	async fn classify_llm(&self, query_text: &str) -> Option<IntentLabel> {
		if !self.cfg.classifier.llm_escalation {
			return None;
		}

		let generation_cfg = self.cfg.providers.generation.as_ref()?;
		let prompt = classifier_prompt(query_text);
		let budget = Duration::from_millis(self.cfg.classifier.llm_timeout_ms);
		let call = self.backends.generation.generate(generation_cfg, &prompt);

		match tokio::time::timeout(budget, call).await {
			Ok(Ok(text)) => {
				let parsed = IntentLabel::parse_loose(&text);

				if parsed.is_none() {
					warn!(response = text.as_str(), "unparseable intent from backend");
				}

				parsed
			},
			Ok(Err(err)) => {
				warn!(error = %err, "intent escalation failed; using rule fallback");

				None
			},
			Err(_) => {
				warn!(
					timeout_ms = self.cfg.classifier.llm_timeout_ms,
					"intent escalation timed out; using rule fallback"
				);

				None
			},
		}
	}
}

fn classifier_prompt(query_text: &str) -> String {
	format!(
		"You are an intent classifier for a retrieval system. \
Respond with exactly one of: factual, keyword, exploratory, summary. \
Do not add explanations or extra words.\n\nQuery:\n{query_text}"
	)
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
	started.elapsed().as_secs_f64() * 1_000.0
}
