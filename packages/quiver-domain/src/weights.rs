use serde::{Deserialize, Serialize};

/// One independent retrieval strategy queried during the fan-out.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
	DenseVector,
	Lexical,
	GraphLocal,
	GraphGlobal,
}
impl ChannelId {
	/// Configured fan-out order. Also the deterministic iteration order for
	/// provenance and tie-breaking.
	pub const ALL: [Self; 4] = [Self::DenseVector, Self::Lexical, Self::GraphLocal, Self::GraphGlobal];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::DenseVector => "dense_vector",
			Self::Lexical => "lexical",
			Self::GraphLocal => "graph_local",
			Self::GraphGlobal => "graph_global",
		}
	}
}

/// Per-channel fusion weights for one intent. Weights are non-negative and
/// sum to 1.0 within [`WeightVector::SUM_TOLERANCE`]; a weight of exactly
/// 0.0 means the channel is fused with zero influence.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct WeightVector {
	pub dense_vector: f32,
	pub lexical: f32,
	pub graph_local: f32,
	pub graph_global: f32,
}
impl WeightVector {
	pub const SUM_TOLERANCE: f32 = 0.01;

	pub const fn new(dense_vector: f32, lexical: f32, graph_local: f32, graph_global: f32) -> Self {
		Self { dense_vector, lexical, graph_local, graph_global }
	}

	pub fn get(&self, channel: ChannelId) -> f32 {
		match channel {
			ChannelId::DenseVector => self.dense_vector,
			ChannelId::Lexical => self.lexical,
			ChannelId::GraphLocal => self.graph_local,
			ChannelId::GraphGlobal => self.graph_global,
		}
	}

	pub fn sum(&self) -> f32 {
		self.dense_vector + self.lexical + self.graph_local + self.graph_global
	}

	pub fn is_normalized(&self) -> bool {
		let all_finite = [self.dense_vector, self.lexical, self.graph_local, self.graph_global]
			.into_iter()
			.all(|weight| weight.is_finite() && weight >= 0.0);

		all_finite && (self.sum() - 1.0).abs() <= Self::SUM_TOLERANCE
	}
}
