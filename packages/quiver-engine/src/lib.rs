pub mod channels;
pub mod classify;
pub mod expansion;
pub mod fusion;
pub mod retrieve;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use uuid::Uuid;

pub use channels::{ChannelResult, ChannelStatus, RankedItem};
pub use classify::{ClassificationCache, ClassificationPath, ClassificationResult};
pub use expansion::{
	EarlyExitReason, EntityExpansionResult, ExpansionStrategy, ExpansionStrategyKind,
	LlmThreeStageExpansion, VectorAnchorExpansion,
};
pub use fusion::{FusedItem, fuse};
use quiver_config::{Config, GenerationProviderConfig};
pub use retrieve::{ChannelMeta, FusedResult, RetrieveRequest};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type BackendResult<T> = Result<T, BackendError>;

/// Opaque failure from a retrieval backend. Never crosses the fan-out
/// boundary as an error; the orchestrator converts it into a channel status.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
	pub message: String,
}
impl BackendError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}

/// One scored chunk returned by a backend, before ranks are assigned.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ChunkHit {
	pub source_id: Uuid,
	pub chunk_id: Uuid,
	pub score: f32,
	pub excerpt: String,
	#[serde(default)]
	pub metadata: Value,
}

/// Output of the entity-overlap join: entities linked to the anchor chunks,
/// plus the chunks those entities connect to.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct EntityOverlap {
	pub entities: Vec<String>,
	pub chunk_ids: Vec<Uuid>,
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		query: &'a str,
		top_k: u32,
		namespaces: &'a [String],
	) -> BoxFuture<'a, BackendResult<Vec<ChunkHit>>>;
}

pub trait LexicalIndex
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		query: &'a str,
		top_k: u32,
		namespaces: &'a [String],
	) -> BoxFuture<'a, BackendResult<Vec<ChunkHit>>>;
}

pub trait GraphStore
where
	Self: Send + Sync,
{
	/// Number of entities indexed for the given namespaces. Zero lets the
	/// expensive expansion path exit before any generation call.
	fn entity_count<'a>(
		&'a self,
		namespaces: &'a [String],
	) -> BoxFuture<'a, BackendResult<u64>>;

	/// Entities reachable from the seed set within `max_hops`.
	fn neighbor_entities<'a>(
		&'a self,
		seeds: &'a [String],
		max_hops: u32,
	) -> BoxFuture<'a, BackendResult<Vec<String>>>;

	/// Chunks connected to the entity set, ranked by structural proximity.
	/// `seed_chunks` are expansion-provided candidates the backend folds into
	/// its result set; an overlap join can return chunk ids without entity
	/// labels, and those must still reach the channel.
	fn query_by_entities<'a>(
		&'a self,
		entities: &'a [String],
		seed_chunks: &'a [Uuid],
		max_hops: u32,
		top_k: u32,
		namespaces: &'a [String],
	) -> BoxFuture<'a, BackendResult<Vec<ChunkHit>>>;

	/// Precomputed community summaries ranked by relevance to the query.
	fn query_communities<'a>(
		&'a self,
		query: &'a str,
		top_k: u32,
		namespaces: &'a [String],
	) -> BoxFuture<'a, BackendResult<Vec<ChunkHit>>>;

	/// Entity-overlap join from anchor chunks, bounded by `max_expansion`.
	fn entity_overlap<'a>(
		&'a self,
		anchors: &'a [Uuid],
		max_expansion: u32,
	) -> BoxFuture<'a, BackendResult<EntityOverlap>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, quiver_providers::Result<String>>;
}

struct DefaultGeneration;

impl GenerationProvider for DefaultGeneration {
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, quiver_providers::Result<String>> {
		Box::pin(quiver_providers::generation::generate(cfg, prompt))
	}
}

#[derive(Clone)]
pub struct Backends {
	pub vector: Arc<dyn VectorIndex>,
	pub lexical: Arc<dyn LexicalIndex>,
	pub graph: Arc<dyn GraphStore>,
	pub generation: Arc<dyn GenerationProvider>,
}
impl Backends {
	pub fn new(
		vector: Arc<dyn VectorIndex>,
		lexical: Arc<dyn LexicalIndex>,
		graph: Arc<dyn GraphStore>,
	) -> Self {
		Self { vector, lexical, graph, generation: Arc::new(DefaultGeneration) }
	}

	pub fn with_generation(mut self, generation: Arc<dyn GenerationProvider>) -> Self {
		self.generation = generation;
		self
	}
}

pub struct QuiverEngine {
	pub cfg: Config,
	pub backends: Backends,
	cache: ClassificationCache,
	expansion: Arc<dyn ExpansionStrategy>,
	llm_expansion: Arc<LlmThreeStageExpansion>,
}
impl QuiverEngine {
	/// `cfg` is assumed validated via `quiver_config::validate`; malformed
	/// weight profiles must never reach per-query code.
	pub fn new(cfg: Config, backends: Backends) -> Self {
		let cache = ClassificationCache::new(cfg.classifier.cache_capacity);

		Self::with_cache(cfg, backends, cache)
	}

	/// Injects a caller-owned classification cache, so tests can assert
	/// eviction behavior against a fresh bounded instance.
	pub fn with_cache(cfg: Config, backends: Backends, cache: ClassificationCache) -> Self {
		let llm_expansion = Arc::new(LlmThreeStageExpansion::new(
			cfg.expansion.clone(),
			cfg.providers.generation.clone(),
			backends.graph.clone(),
			backends.generation.clone(),
		));
		let expansion: Arc<dyn ExpansionStrategy> = match cfg.expansion.strategy.as_str() {
			"llm_3stage" => llm_expansion.clone(),
			_ => Arc::new(VectorAnchorExpansion::new(
				cfg.expansion.clone(),
				backends.vector.clone(),
				backends.graph.clone(),
			)),
		};

		Self { cfg, backends, cache, expansion, llm_expansion }
	}
}
