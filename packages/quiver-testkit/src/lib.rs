//! Scripted in-memory backends for exercising the retrieval engine without
//! live services. Every fake is deterministic; delays and failures come from
//! the test's script, never from the environment.

use std::{
	collections::HashMap,
	sync::{
		Mutex, Once,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::Value;
use tokio::time;
use uuid::Uuid;

use quiver_config::GenerationProviderConfig;
use quiver_engine::{
	BackendError, BackendResult, BoxFuture, ChunkHit, EntityOverlap, GenerationProvider,
	GraphStore, LexicalIndex, VectorIndex,
};

static INIT_TRACING: Once = Once::new();

/// Installs a test subscriber once per process. Honors `RUST_LOG`.
pub fn init_tracing() {
	INIT_TRACING.call_once(|| {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_test_writer()
			.try_init();
	});
}

/// Deterministic chunk hit. `source` and `chunk` become stable UUIDs so
/// assertions can reconstruct them with [`source_id`] and [`chunk_id`].
pub fn hit(source: u8, chunk: u8, score: f32) -> ChunkHit {
	ChunkHit {
		source_id: source_id(source),
		chunk_id: chunk_id(chunk),
		score,
		excerpt: format!("chunk {chunk} from source {source}"),
		metadata: Value::Null,
	}
}

pub fn source_id(source: u8) -> Uuid {
	Uuid::from_u128(source as u128)
}

pub fn chunk_id(chunk: u8) -> Uuid {
	Uuid::from_u128(0x1000 + chunk as u128)
}

/// Generation backend settings pointing nowhere. Tests that reach a real
/// network call are broken; the fakes below should absorb every generate.
pub fn generation_config() -> GenerationProviderConfig {
	GenerationProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:0".to_string(),
		api_key: "test-key".to_string(),
		path: "/v1/chat/completions".to_string(),
		model: "test-model".to_string(),
		temperature: 0.0,
		max_tokens: 64,
		timeout_ms: 1_000,
		default_headers: serde_json::Map::new(),
	}
}

/// One channel's scripted behavior: optional delay, then either a failure
/// message or the scripted hits.
#[derive(Clone, Default)]
pub struct ChannelScript {
	pub hits: Vec<ChunkHit>,
	pub fail: Option<String>,
	pub delay_ms: u64,
}
impl ChannelScript {
	pub fn hits(hits: Vec<ChunkHit>) -> Self {
		Self { hits, ..Self::default() }
	}

	pub fn failing(message: impl Into<String>) -> Self {
		Self { fail: Some(message.into()), ..Self::default() }
	}

	pub fn delayed(hits: Vec<ChunkHit>, delay_ms: u64) -> Self {
		Self { hits, delay_ms, ..Self::default() }
	}

	async fn run(&self) -> BackendResult<Vec<ChunkHit>> {
		if self.delay_ms > 0 {
			time::sleep(Duration::from_millis(self.delay_ms)).await;
		}
		if let Some(message) = &self.fail {
			return Err(BackendError::new(message.clone()));
		}

		Ok(self.hits.clone())
	}
}

#[derive(Default)]
pub struct FakeVectorIndex {
	pub script: ChannelScript,
}
impl FakeVectorIndex {
	pub fn new(script: ChannelScript) -> Self {
		Self { script }
	}
}
impl VectorIndex for FakeVectorIndex {
	fn search<'a>(
		&'a self,
		_query: &'a str,
		top_k: u32,
		_namespaces: &'a [String],
	) -> BoxFuture<'a, BackendResult<Vec<ChunkHit>>> {
		Box::pin(async move {
			let mut hits = self.script.run().await?;

			hits.truncate(top_k as usize);

			Ok(hits)
		})
	}
}

#[derive(Default)]
pub struct FakeLexicalIndex {
	pub script: ChannelScript,
}
impl FakeLexicalIndex {
	pub fn new(script: ChannelScript) -> Self {
		Self { script }
	}
}
impl LexicalIndex for FakeLexicalIndex {
	fn search<'a>(
		&'a self,
		_query: &'a str,
		top_k: u32,
		_namespaces: &'a [String],
	) -> BoxFuture<'a, BackendResult<Vec<ChunkHit>>> {
		Box::pin(async move {
			let mut hits = self.script.run().await?;

			hits.truncate(top_k as usize);

			Ok(hits)
		})
	}
}

/// Scripted graph backend covering both graph channels and both expansion
/// strategies.
#[derive(Default)]
pub struct FakeGraphStore {
	pub entity_count: u64,
	pub entity_count_fail: Option<String>,
	/// Seed entity → connected entities, flattened across hops.
	pub neighbors: HashMap<String, Vec<String>>,
	/// Script for `query_by_entities` (graph-local channel).
	pub entity_chunks: ChannelScript,
	/// Script for `query_communities` (graph-global channel).
	pub communities: ChannelScript,
	pub overlap: EntityOverlap,
	pub overlap_fail: Option<String>,
}
impl GraphStore for FakeGraphStore {
	fn entity_count<'a>(
		&'a self,
		_namespaces: &'a [String],
	) -> BoxFuture<'a, BackendResult<u64>> {
		Box::pin(async move {
			if let Some(message) = &self.entity_count_fail {
				return Err(BackendError::new(message.clone()));
			}

			Ok(self.entity_count)
		})
	}

	fn neighbor_entities<'a>(
		&'a self,
		seeds: &'a [String],
		_max_hops: u32,
	) -> BoxFuture<'a, BackendResult<Vec<String>>> {
		Box::pin(async move {
			let connected = seeds
				.iter()
				.filter_map(|seed| self.neighbors.get(seed))
				.flatten()
				.cloned()
				.collect();

			Ok(connected)
		})
	}

	fn query_by_entities<'a>(
		&'a self,
		_entities: &'a [String],
		_seed_chunks: &'a [Uuid],
		_max_hops: u32,
		top_k: u32,
		_namespaces: &'a [String],
	) -> BoxFuture<'a, BackendResult<Vec<ChunkHit>>> {
		Box::pin(async move {
			let mut hits = self.entity_chunks.run().await?;

			hits.truncate(top_k as usize);

			Ok(hits)
		})
	}

	fn query_communities<'a>(
		&'a self,
		_query: &'a str,
		top_k: u32,
		_namespaces: &'a [String],
	) -> BoxFuture<'a, BackendResult<Vec<ChunkHit>>> {
		Box::pin(async move {
			let mut hits = self.communities.run().await?;

			hits.truncate(top_k as usize);

			Ok(hits)
		})
	}

	fn entity_overlap<'a>(
		&'a self,
		_anchors: &'a [Uuid],
		_max_expansion: u32,
	) -> BoxFuture<'a, BackendResult<EntityOverlap>> {
		Box::pin(async move {
			if let Some(message) = &self.overlap_fail {
				return Err(BackendError::new(message.clone()));
			}

			Ok(self.overlap.clone())
		})
	}
}

/// Scripted generation backend. Responses are consumed front to back; the
/// call counter lets tests assert that a path made no generation calls.
#[derive(Default)]
pub struct FakeGeneration {
	responses: Mutex<Vec<Result<String, String>>>,
	calls: AtomicUsize,
	delay_ms: u64,
}
impl FakeGeneration {
	pub fn scripted(responses: Vec<Result<String, String>>) -> Self {
		Self { responses: Mutex::new(responses), calls: AtomicUsize::new(0), delay_ms: 0 }
	}

	pub fn replying(responses: &[&str]) -> Self {
		Self::scripted(responses.iter().map(|r| Ok(r.to_string())).collect())
	}

	pub fn with_delay(mut self, delay_ms: u64) -> Self {
		self.delay_ms = delay_ms;
		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl GenerationProvider for FakeGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a GenerationProviderConfig,
		_prompt: &'a str,
	) -> BoxFuture<'a, quiver_providers::Result<String>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if self.delay_ms > 0 {
				time::sleep(Duration::from_millis(self.delay_ms)).await;
			}

			let mut responses = self.responses.lock().unwrap_or_else(|err| err.into_inner());

			if responses.is_empty() {
				return Err(quiver_providers::Error::InvalidResponse {
					message: "Generation script is exhausted.".to_string(),
				});
			}

			match responses.remove(0) {
				Ok(text) => Ok(text),
				Err(_) => Err(quiver_providers::Error::Backend { status: 500 }),
			}
		})
	}
}
