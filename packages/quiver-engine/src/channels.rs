use std::{
	sync::Mutex,
	time::{Duration, Instant},
};

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
	BackendResult, ChunkHit, QuiverEngine,
	classify::elapsed_ms,
	expansion::{EntityExpansionResult, ExpansionStrategy},
};
use quiver_domain::{ChannelId, WeightVector};

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
	Ok,
	Failed,
	TimedOut,
	Skipped,
}

/// One deduplicated hit with its 1-based rank inside its channel.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RankedItem {
	pub source_id: Uuid,
	pub chunk_id: Uuid,
	pub raw_score: f32,
	pub channel_rank: u32,
	pub excerpt: String,
	#[serde(default)]
	pub metadata: Value,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ChannelResult {
	pub channel: ChannelId,
	pub items: Vec<RankedItem>,
	pub status: ChannelStatus,
	pub latency_ms: f64,
	pub error: Option<String>,
}

impl QuiverEngine {
	/// Fans the query out to all four channels concurrently. Returns results
	/// in `ChannelId::ALL` order plus the expansion metadata the graph-local
	/// channel produced, which survives even when that channel times out.
	pub(crate) async fn fan_out(
		&self,
		query: &str,
		weights: WeightVector,
		top_k: u32,
		namespaces: &[String],
		strategy: &dyn ExpansionStrategy,
	) -> (Vec<ChannelResult>, Option<EntityExpansionResult>) {
		let skip_zero = self.cfg.search.skip_zero_weight_channels;
		let budget = Duration::from_millis(self.cfg.search.channel_timeout_ms);
		let expansion_slot = Mutex::new(None::<EntityExpansionResult>);
		let (dense, lexical, local, global) = tokio::join!(
			run_channel(
				ChannelId::DenseVector,
				weights.get(ChannelId::DenseVector),
				skip_zero,
				budget,
				self.backends.vector.search(query, top_k, namespaces),
			),
			run_channel(
				ChannelId::Lexical,
				weights.get(ChannelId::Lexical),
				skip_zero,
				budget,
				self.backends.lexical.search(query, top_k, namespaces),
			),
			run_channel(
				ChannelId::GraphLocal,
				weights.get(ChannelId::GraphLocal),
				skip_zero,
				budget,
				self.graph_local_hits(query, top_k, namespaces, strategy, &expansion_slot),
			),
			run_channel(
				ChannelId::GraphGlobal,
				weights.get(ChannelId::GraphGlobal),
				skip_zero,
				budget,
				self.backends.graph.query_communities(query, top_k, namespaces),
			),
		);
		let expansion =
			expansion_slot.lock().unwrap_or_else(|err| err.into_inner()).take();

		(vec![dense, lexical, local, global], expansion)
	}

	/// Expands the query into an entity set, publishes the expansion metadata,
	/// then queries the graph for chunks around those entities.
	async fn graph_local_hits(
		&self,
		query: &str,
		top_k: u32,
		namespaces: &[String],
		strategy: &dyn ExpansionStrategy,
		expansion_slot: &Mutex<Option<EntityExpansionResult>>,
	) -> BackendResult<Vec<ChunkHit>> {
		let expansion = strategy.expand(query, namespaces).await;
		let entities = expansion.entities.clone();
		let seed_chunks = expansion.expanded_chunk_ids.clone();

		// Publish before the graph query so a channel timeout still leaves
		// the expansion outcome observable in the response metadata.
		*expansion_slot.lock().unwrap_or_else(|err| err.into_inner()) = Some(expansion);

		// An overlap join can yield chunk ids without entity labels; either
		// half of the expansion product is enough to query the graph.
		if entities.is_empty() && seed_chunks.is_empty() {
			return Ok(Vec::new());
		}

		self.backends
			.graph
			.query_by_entities(&entities, &seed_chunks, self.cfg.expansion.max_hops, top_k, namespaces)
			.await
	}
}

/// Guards one channel call with the zero-weight skip and the shared timeout,
/// then normalizes the outcome into a `ChannelResult`.
async fn run_channel<F>(
	channel: ChannelId,
	weight: f32,
	skip_zero: bool,
	budget: Duration,
	call: F,
) -> ChannelResult
where
	F: Future<Output = BackendResult<Vec<ChunkHit>>>,
{
	if skip_zero && weight == 0.0 {
		return ChannelResult {
			channel,
			items: Vec::new(),
			status: ChannelStatus::Skipped,
			latency_ms: 0.0,
			error: None,
		};
	}

	let started = Instant::now();

	match tokio::time::timeout(budget, call).await {
		Ok(Ok(hits)) => {
			let items = rank_hits(hits);

			debug!(channel = channel.as_str(), items = items.len(), "channel complete");

			ChannelResult {
				channel,
				items,
				status: ChannelStatus::Ok,
				latency_ms: elapsed_ms(started),
				error: None,
			}
		},
		Ok(Err(err)) => {
			warn!(channel = channel.as_str(), error = %err, "channel failed");

			ChannelResult {
				channel,
				items: Vec::new(),
				status: ChannelStatus::Failed,
				latency_ms: elapsed_ms(started),
				error: Some(err.message),
			}
		},
		Err(_) => {
			warn!(
				channel = channel.as_str(),
				budget_ms = budget.as_millis() as u64,
				"channel timed out"
			);

			ChannelResult {
				channel,
				items: Vec::new(),
				status: ChannelStatus::TimedOut,
				latency_ms: elapsed_ms(started),
				error: Some(format!("Channel timed out after {}ms.", budget.as_millis())),
			}
		},
	}
}

/// Assigns 1-based ranks in backend order, keeping the first occurrence of
/// each `(source_id, chunk_id)` pair and clamping NaN scores to zero.
fn rank_hits(hits: Vec<ChunkHit>) -> Vec<RankedItem> {
	let mut seen = ahash::AHashSet::with_capacity(hits.len());
	let mut items = Vec::with_capacity(hits.len());

	for hit in hits {
		if !seen.insert((hit.source_id, hit.chunk_id)) {
			continue;
		}

		let channel_rank = items.len() as u32 + 1;

		items.push(RankedItem {
			source_id: hit.source_id,
			chunk_id: hit.chunk_id,
			raw_score: if hit.score.is_nan() { 0.0 } else { hit.score },
			channel_rank,
			excerpt: hit.excerpt,
			metadata: hit.metadata,
		});
	}

	items
}
