use std::{collections::BTreeSet, sync::Arc, time::Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
	BoxFuture, GenerationProvider, GraphStore, VectorIndex, classify::elapsed_ms,
};
use quiver_config::{Expansion, GenerationProviderConfig};

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionStrategyKind {
	#[serde(rename = "llm_3stage")]
	Llm3Stage,
	VectorAnchor,
}
impl ExpansionStrategyKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Llm3Stage => "llm_3stage",
			Self::VectorAnchor => "vector_anchor",
		}
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyExitReason {
	NamespaceEmpty,
	NoEntitiesExtracted,
	GraphExpansionEmpty,
}

/// Candidate entity/chunk set for the graph-local channel. Request-scoped:
/// consumed by that channel and discarded.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EntityExpansionResult {
	pub entities: Vec<String>,
	pub expanded_chunk_ids: Vec<Uuid>,
	pub strategy_used: ExpansionStrategyKind,
	pub early_exit_reason: Option<EarlyExitReason>,
	pub latency_ms: f64,
}
impl EntityExpansionResult {
	fn empty(
		strategy_used: ExpansionStrategyKind,
		early_exit_reason: Option<EarlyExitReason>,
		started: Instant,
	) -> Self {
		Self {
			entities: Vec::new(),
			expanded_chunk_ids: Vec::new(),
			strategy_used,
			early_exit_reason,
			latency_ms: elapsed_ms(started),
		}
	}
}

/// Interchangeable expansion strategies behind one contract, so deployments
/// switch without touching the orchestrator or fusion logic.
pub trait ExpansionStrategy
where
	Self: Send + Sync,
{
	fn kind(&self) -> ExpansionStrategyKind;

	fn expand<'a>(
		&'a self,
		query: &'a str,
		namespaces: &'a [String],
	) -> BoxFuture<'a, EntityExpansionResult>;
}

/// Anchors on a bounded dense search, then widens through a single
/// entity-overlap join. No generation calls on this path.
pub struct VectorAnchorExpansion {
	cfg: Expansion,
	vector: Arc<dyn VectorIndex>,
	graph: Arc<dyn GraphStore>,
}
impl VectorAnchorExpansion {
	pub fn new(cfg: Expansion, vector: Arc<dyn VectorIndex>, graph: Arc<dyn GraphStore>) -> Self {
		Self { cfg, vector, graph }
	}

	async fn run(&self, query: &str, namespaces: &[String]) -> EntityExpansionResult {
		let started = Instant::now();
		let kind = ExpansionStrategyKind::VectorAnchor;
		let anchors = match self.vector.search(query, self.cfg.anchor_k, namespaces).await {
			Ok(hits) => hits,
			Err(err) => {
				warn!(error = %err, "anchor search failed; expansion degrades to empty");

				return EntityExpansionResult::empty(kind, None, started);
			},
		};

		if anchors.is_empty() {
			return EntityExpansionResult::empty(
				kind,
				Some(EarlyExitReason::NoEntitiesExtracted),
				started,
			);
		}

		let anchor_ids: Vec<Uuid> = anchors.iter().map(|hit| hit.chunk_id).collect();
		let overlap = match self.graph.entity_overlap(&anchor_ids, self.cfg.max_expansion).await {
			Ok(overlap) => overlap,
			Err(err) => {
				warn!(error = %err, "entity-overlap join failed; expansion degrades to empty");

				return EntityExpansionResult::empty(kind, None, started);
			},
		};

		if overlap.entities.is_empty() && overlap.chunk_ids.is_empty() {
			return EntityExpansionResult::empty(
				kind,
				Some(EarlyExitReason::GraphExpansionEmpty),
				started,
			);
		}

		let entities = dedup_bounded(overlap.entities, self.cfg.max_expansion);
		let expanded_chunk_ids = dedup_chunk_ids(overlap.chunk_ids, self.cfg.max_expansion);

		debug!(
			anchors = anchor_ids.len(),
			entities = entities.len(),
			chunks = expanded_chunk_ids.len(),
			"vector-anchored expansion complete"
		);

		EntityExpansionResult {
			entities,
			expanded_chunk_ids,
			strategy_used: kind,
			early_exit_reason: None,
			latency_ms: elapsed_ms(started),
		}
	}
}
impl ExpansionStrategy for VectorAnchorExpansion {
	fn kind(&self) -> ExpansionStrategyKind {
		ExpansionStrategyKind::VectorAnchor
	}

	fn expand<'a>(
		&'a self,
		query: &'a str,
		namespaces: &'a [String],
	) -> BoxFuture<'a, EntityExpansionResult> {
		Box::pin(self.run(query, namespaces))
	}
}

/// Legacy expensive path: LLM entity extraction, bounded graph traversal,
/// LLM synonym widening. Each stage can exit early once the outcome is
/// known to be empty; the namespace gate runs before any generation call.
pub struct LlmThreeStageExpansion {
	cfg: Expansion,
	generation_cfg: Option<GenerationProviderConfig>,
	graph: Arc<dyn GraphStore>,
	generation: Arc<dyn GenerationProvider>,
}
impl LlmThreeStageExpansion {
	pub fn new(
		cfg: Expansion,
		generation_cfg: Option<GenerationProviderConfig>,
		graph: Arc<dyn GraphStore>,
		generation: Arc<dyn GenerationProvider>,
	) -> Self {
		Self { cfg, generation_cfg, graph, generation }
	}

	async fn run(&self, query: &str, namespaces: &[String]) -> EntityExpansionResult {
		let started = Instant::now();
		let kind = ExpansionStrategyKind::Llm3Stage;

		match self.graph.entity_count(namespaces).await {
			Ok(0) =>
				return EntityExpansionResult::empty(
					kind,
					Some(EarlyExitReason::NamespaceEmpty),
					started,
				),
			Ok(_) => {},
			Err(err) => {
				warn!(error = %err, "entity count lookup failed; expansion degrades to empty");

				return EntityExpansionResult::empty(kind, None, started);
			},
		}

		// Stage 1: entity extraction.
		let Some(generation_cfg) = &self.generation_cfg else {
			debug!("no generation backend configured; extraction yields nothing");

			return EntityExpansionResult::empty(
				kind,
				Some(EarlyExitReason::NoEntitiesExtracted),
				started,
			);
		};
		let extracted = match self.generation.generate(generation_cfg, &extraction_prompt(query)).await
		{
			Ok(raw) => parse_entity_list(&raw),
			Err(err) => {
				warn!(error = %err, "entity extraction failed; expansion degrades to empty");

				return EntityExpansionResult::empty(
					kind,
					Some(EarlyExitReason::NoEntitiesExtracted),
					started,
				);
			},
		};

		if extracted.is_empty() {
			return EntityExpansionResult::empty(
				kind,
				Some(EarlyExitReason::NoEntitiesExtracted),
				started,
			);
		}

		// Stage 2: bounded-hop traversal.
		let connected = match self.graph.neighbor_entities(&extracted, self.cfg.max_hops).await {
			Ok(connected) => connected,
			Err(err) => {
				warn!(error = %err, "graph traversal failed; keeping extracted entities only");

				Vec::new()
			},
		};

		if connected.is_empty() {
			// Stage 3 cannot widen an empty structural neighborhood.
			return EntityExpansionResult {
				entities: dedup_bounded(extracted, self.cfg.max_expansion),
				expanded_chunk_ids: Vec::new(),
				strategy_used: kind,
				early_exit_reason: Some(EarlyExitReason::GraphExpansionEmpty),
				latency_ms: elapsed_ms(started),
			};
		}

		let mut entities = extracted;

		entities.extend(connected);

		// Stage 3: synonym widening.
		match self.generation.generate(generation_cfg, &synonym_prompt(&entities)).await {
			Ok(raw) => entities.extend(parse_entity_list(&raw)),
			Err(err) => {
				warn!(error = %err, "synonym widening failed; keeping structural expansion");
			},
		}

		let entities = dedup_bounded(entities, self.cfg.max_expansion);

		debug!(entities = entities.len(), "three-stage expansion complete");

		EntityExpansionResult {
			entities,
			expanded_chunk_ids: Vec::new(),
			strategy_used: kind,
			early_exit_reason: None,
			latency_ms: elapsed_ms(started),
		}
	}
}
impl ExpansionStrategy for LlmThreeStageExpansion {
	fn kind(&self) -> ExpansionStrategyKind {
		ExpansionStrategyKind::Llm3Stage
	}

	fn expand<'a>(
		&'a self,
		query: &'a str,
		namespaces: &'a [String],
	) -> BoxFuture<'a, EntityExpansionResult> {
		Box::pin(self.run(query, namespaces))
	}
}

fn extraction_prompt(query: &str) -> String {
	format!(
		"You are an entity extraction engine for a retrieval system. \
Return a JSON array of the named entities mentioned in the query, most salient first. \
Return [] when there are none. Do not add explanations or extra fields.\n\nQuery:\n{query}"
	)
}

fn synonym_prompt(entities: &[String]) -> String {
	format!(
		"You are a term expansion engine for a retrieval system. \
Return a JSON array of synonyms and closely related terms for the entities below. \
Do not repeat the input terms. Do not add explanations or extra fields.\n\nEntities:\n{}",
		entities.join(", ")
	)
}

/// Backend output is a JSON array on the happy path, but models drift;
/// fall back to line/comma splitting before giving up.
fn parse_entity_list(raw: &str) -> Vec<String> {
	let trimmed = raw.trim();

	if let Ok(serde_json::Value::Array(values)) = serde_json::from_str::<serde_json::Value>(trimmed)
	{
		return values
			.into_iter()
			.filter_map(|value| value.as_str().map(clean_entity))
			.filter(|entity| !entity.is_empty())
			.collect();
	}

	trimmed
		.split(|c| c == '\n' || c == ',')
		.map(clean_entity)
		.filter(|entity| !entity.is_empty())
		.collect()
}

fn clean_entity(raw: &str) -> String {
	raw.trim().trim_start_matches(['-', '*', ' ']).trim_matches(['"', '\'', '`']).trim().to_string()
}

fn dedup_bounded(entities: Vec<String>, bound: u32) -> Vec<String> {
	let unique: BTreeSet<String> = entities.into_iter().collect();

	unique.into_iter().take(bound as usize).collect()
}

fn dedup_chunk_ids(chunk_ids: Vec<Uuid>, bound: u32) -> Vec<Uuid> {
	let unique: BTreeSet<Uuid> = chunk_ids.into_iter().collect();

	unique.into_iter().take(bound as usize).collect()
}
