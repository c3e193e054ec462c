use std::cmp::Ordering;

use ahash::AHashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::channels::{ChannelResult, ChannelStatus};
use quiver_domain::{ChannelId, WeightVector};

/// One fused chunk with its provenance across channels.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FusedItem {
	pub source_id: Uuid,
	pub chunk_id: Uuid,
	pub fused_score: f64,
	pub contributing_channels: Vec<ChannelId>,
	pub excerpt: String,
	#[serde(default)]
	pub metadata: Value,
}

struct Accumulator {
	source_id: Uuid,
	chunk_id: Uuid,
	fused_score: f64,
	contributing_channels: Vec<ChannelId>,
	best_rank: u32,
	excerpt: String,
	metadata: Value,
}

/// Weighted reciprocal-rank fusion over the successful channels. Raw backend
/// scores never enter the formula; only the 1-based ranks do, so channels
/// with incompatible score scales still merge on equal footing.
pub fn fuse(
	channel_results: &[ChannelResult],
	weights: WeightVector,
	rrf_k: f64,
	top_k: u32,
) -> Vec<FusedItem> {
	let mut by_chunk: AHashMap<(Uuid, Uuid), Accumulator> = AHashMap::new();

	for result in channel_results {
		if result.status != ChannelStatus::Ok {
			continue;
		}

		let weight = weights.get(result.channel) as f64;

		for item in &result.items {
			let contribution = weight / (rrf_k + item.channel_rank as f64);
			let entry =
				by_chunk.entry((item.source_id, item.chunk_id)).or_insert_with(|| Accumulator {
					source_id: item.source_id,
					chunk_id: item.chunk_id,
					fused_score: 0.0,
					contributing_channels: Vec::new(),
					best_rank: item.channel_rank,
					excerpt: item.excerpt.clone(),
					metadata: item.metadata.clone(),
				});

			entry.fused_score += contribution;
			// Zero-weight channels still count as provenance.
			entry.contributing_channels.push(result.channel);

			if item.channel_rank < entry.best_rank {
				entry.best_rank = item.channel_rank;
				entry.excerpt = item.excerpt.clone();
				entry.metadata = item.metadata.clone();
			}
		}
	}

	let mut fused: Vec<Accumulator> = by_chunk.into_values().collect();

	fused.sort_by(|a, b| {
		cmp_f64_desc(a.fused_score, b.fused_score)
			.then_with(|| a.best_rank.cmp(&b.best_rank))
			.then_with(|| a.source_id.cmp(&b.source_id))
			.then_with(|| a.chunk_id.cmp(&b.chunk_id))
	});
	fused.truncate(top_k as usize);

	fused
		.into_iter()
		.map(|acc| FusedItem {
			source_id: acc.source_id,
			chunk_id: acc.chunk_id,
			fused_score: acc.fused_score,
			contributing_channels: acc.contributing_channels,
			excerpt: acc.excerpt,
			metadata: acc.metadata,
		})
		.collect()
}

fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
	b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
