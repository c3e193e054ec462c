use std::time::Instant;

use tracing::info;

use crate::{
	QuiverEngine,
	channels::{ChannelResult, ChannelStatus},
	classify::{ClassificationPath, elapsed_ms},
	expansion::{EarlyExitReason, ExpansionStrategy, ExpansionStrategyKind},
	fusion::{FusedItem, fuse},
};
use quiver_domain::{ChannelId, IntentLabel};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RetrieveRequest {
	pub query: String,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub namespaces: Vec<String>,
	#[serde(default)]
	pub intent_override: Option<IntentLabel>,
	#[serde(default)]
	pub force_llm_expansion: bool,
}
impl RetrieveRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self {
			query: query.into(),
			top_k: None,
			namespaces: Vec::new(),
			intent_override: None,
			force_llm_expansion: false,
		}
	}
}

/// Per-channel outcome as surfaced to the caller: status and timing, without
/// the per-channel item lists that fusion already consumed.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ChannelMeta {
	pub channel: ChannelId,
	pub status: ChannelStatus,
	pub latency_ms: f64,
	pub error: Option<String>,
}
impl From<&ChannelResult> for ChannelMeta {
	fn from(result: &ChannelResult) -> Self {
		Self {
			channel: result.channel,
			status: result.status,
			latency_ms: result.latency_ms,
			error: result.error.clone(),
		}
	}
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FusedResult {
	pub items: Vec<FusedItem>,
	pub intent: IntentLabel,
	pub classification_path: ClassificationPath,
	pub classification_latency_ms: f64,
	pub channels: Vec<ChannelMeta>,
	/// The strategy that ran (or was cut off by the channel budget).
	pub expansion_strategy: ExpansionStrategyKind,
	pub expansion_early_exit: Option<EarlyExitReason>,
	/// `None` means the expansion itself never completed within the
	/// graph-local channel budget.
	pub expansion_latency_ms: Option<f64>,
	pub total_latency_ms: f64,
}

impl QuiverEngine {
	/// One full query round-trip: classify, fan out, fuse. Infallible by
	/// construction; channel trouble lands in the response metadata and the
	/// worst case is an empty item list.
	pub async fn retrieve(&self, req: RetrieveRequest) -> FusedResult {
		let started = Instant::now();
		let top_k = req.top_k.unwrap_or(self.cfg.search.top_k).max(1);
		let classification = self.classify(&req.query, req.intent_override).await;
		let strategy: &dyn ExpansionStrategy = if req.force_llm_expansion {
			self.llm_expansion.as_ref()
		} else {
			self.expansion.as_ref()
		};
		let (channel_results, expansion) = self
			.fan_out(&req.query, classification.weights, top_k, &req.namespaces, strategy)
			.await;
		let items =
			fuse(&channel_results, classification.weights, self.cfg.fusion.rrf_k as f64, top_k);
		let channels: Vec<ChannelMeta> = channel_results.iter().map(ChannelMeta::from).collect();

		info!(
			intent = classification.intent.as_str(),
			path = ?classification.path,
			items = items.len(),
			"retrieval complete"
		);

		FusedResult {
			items,
			intent: classification.intent,
			classification_path: classification.path,
			classification_latency_ms: classification.latency_ms,
			channels,
			expansion_strategy: expansion
				.as_ref()
				.map_or_else(|| strategy.kind(), |expansion| expansion.strategy_used),
			expansion_early_exit: expansion
				.as_ref()
				.and_then(|expansion| expansion.early_exit_reason),
			expansion_latency_ms: expansion.as_ref().map(|expansion| expansion.latency_ms),
			total_latency_ms: elapsed_ms(started),
		}
	}
}
