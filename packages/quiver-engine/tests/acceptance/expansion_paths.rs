use quiver_domain::ChannelId;
use quiver_engine::{
	ChannelStatus, EarlyExitReason, EntityOverlap, ExpansionStrategyKind, RetrieveRequest,
};
use quiver_testkit::{
	ChannelScript, FakeGeneration, FakeGraphStore, FakeLexicalIndex, FakeVectorIndex, chunk_id,
	hit,
};

#[tokio::test]
async fn vector_anchor_feeds_graph_local_without_generation() {
	let vector = FakeVectorIndex::new(ChannelScript::hits(vec![hit(1, 1, 0.9)]));
	let lexical = FakeLexicalIndex::new(ChannelScript::default());
	let graph = FakeGraphStore {
		entity_count: 4,
		overlap: EntityOverlap {
			entities: vec!["alpha".to_string(), "beta".to_string()],
			chunk_ids: vec![chunk_id(7)],
		},
		entity_chunks: ChannelScript::hits(vec![hit(3, 7, 0.6)]),
		..FakeGraphStore::default()
	};
	let fx = crate::acceptance::fixture(
		crate::acceptance::test_config(),
		vector,
		lexical,
		graph,
		FakeGeneration::default(),
	);
	let result =
		fx.engine.retrieve(RetrieveRequest::new("What is the capital of France?")).await;

	assert_eq!(result.expansion_strategy, ExpansionStrategyKind::VectorAnchor);
	assert_eq!(result.expansion_early_exit, None);
	assert_eq!(fx.generation.calls(), 0);

	let graph_item = result
		.items
		.iter()
		.find(|item| item.chunk_id == chunk_id(7))
		.expect("expanded chunk missing from fused items");
	assert!(graph_item.contributing_channels.contains(&ChannelId::GraphLocal));
}

#[tokio::test]
async fn empty_namespace_exits_before_any_generation_call() {
	let vector = FakeVectorIndex::new(ChannelScript::hits(vec![hit(1, 1, 0.9)]));
	let lexical = FakeLexicalIndex::new(ChannelScript::default());
	let graph = FakeGraphStore { entity_count: 0, ..FakeGraphStore::default() };
	let fx = crate::acceptance::fixture(
		crate::acceptance::test_config(),
		vector,
		lexical,
		graph,
		FakeGeneration::default(),
	);
	let mut request = RetrieveRequest::new("What is the capital of France?");

	request.force_llm_expansion = true;

	let result = fx.engine.retrieve(request).await;

	assert_eq!(result.expansion_strategy, ExpansionStrategyKind::Llm3Stage);
	assert_eq!(result.expansion_early_exit, Some(EarlyExitReason::NamespaceEmpty));
	assert_eq!(fx.generation.calls(), 0);
	assert_eq!(result.channels[2].status, ChannelStatus::Ok);
}

#[tokio::test]
async fn forced_llm_expansion_runs_extraction_traversal_and_synonyms() {
	let vector = FakeVectorIndex::new(ChannelScript::hits(vec![hit(1, 1, 0.9)]));
	let lexical = FakeLexicalIndex::new(ChannelScript::default());
	let mut graph = FakeGraphStore {
		entity_count: 10,
		entity_chunks: ChannelScript::hits(vec![hit(4, 8, 0.5)]),
		..FakeGraphStore::default()
	};

	graph.neighbors.insert("France".to_string(), vec!["Paris".to_string()]);

	let generation =
		FakeGeneration::replying(&[r#"["France"]"#, r#"["French Republic"]"#]);
	let fx = crate::acceptance::fixture(
		crate::acceptance::test_config(),
		vector,
		lexical,
		graph,
		generation,
	);
	let mut request = RetrieveRequest::new("What is the capital of France?");

	request.force_llm_expansion = true;

	let result = fx.engine.retrieve(request).await;

	assert_eq!(result.expansion_strategy, ExpansionStrategyKind::Llm3Stage);
	assert_eq!(result.expansion_early_exit, None);
	// One extraction call plus one synonym call.
	assert_eq!(fx.generation.calls(), 2);
	assert!(result.items.iter().any(|item| item.chunk_id == chunk_id(8)));
}

#[tokio::test]
async fn llm_expansion_keeps_extracted_entities_when_graph_is_disconnected() {
	let vector = FakeVectorIndex::new(ChannelScript::hits(vec![hit(1, 1, 0.9)]));
	let lexical = FakeLexicalIndex::new(ChannelScript::default());
	let graph = FakeGraphStore {
		entity_count: 10,
		entity_chunks: ChannelScript::hits(vec![hit(4, 8, 0.5)]),
		..FakeGraphStore::default()
	};
	let generation = FakeGeneration::replying(&[r#"["France"]"#]);
	let fx = crate::acceptance::fixture(
		crate::acceptance::test_config(),
		vector,
		lexical,
		graph,
		generation,
	);
	let mut request = RetrieveRequest::new("What is the capital of France?");

	request.force_llm_expansion = true;

	let result = fx.engine.retrieve(request).await;

	assert_eq!(result.expansion_early_exit, Some(EarlyExitReason::GraphExpansionEmpty));
	// The synonym stage is skipped when traversal finds nothing.
	assert_eq!(fx.generation.calls(), 1);
	// Stage-one entities still reach the graph-local channel.
	assert!(result.items.iter().any(|item| item.chunk_id == chunk_id(8)));
}

#[tokio::test]
async fn chunks_only_overlap_still_feeds_graph_local() {
	let vector = FakeVectorIndex::new(ChannelScript::hits(vec![hit(1, 1, 0.9)]));
	let lexical = FakeLexicalIndex::new(ChannelScript::default());
	// The overlap join resolves related chunks without naming entities.
	let graph = FakeGraphStore {
		entity_count: 4,
		overlap: EntityOverlap { entities: Vec::new(), chunk_ids: vec![chunk_id(7)] },
		entity_chunks: ChannelScript::hits(vec![hit(3, 7, 0.6)]),
		..FakeGraphStore::default()
	};
	let fx = crate::acceptance::fixture(
		crate::acceptance::test_config(),
		vector,
		lexical,
		graph,
		FakeGeneration::default(),
	);
	let result =
		fx.engine.retrieve(RetrieveRequest::new("What is the capital of France?")).await;

	assert_eq!(result.expansion_early_exit, None);

	let graph_item = result
		.items
		.iter()
		.find(|item| item.chunk_id == chunk_id(7))
		.expect("chunk from the overlap join missing from fused items");
	assert!(graph_item.contributing_channels.contains(&ChannelId::GraphLocal));
}

#[tokio::test]
async fn empty_anchor_search_reports_early_exit() {
	let vector = FakeVectorIndex::new(ChannelScript::default());
	let lexical = FakeLexicalIndex::new(ChannelScript::hits(vec![hit(2, 2, 4.0)]));
	let graph = FakeGraphStore { entity_count: 3, ..FakeGraphStore::default() };
	let fx = crate::acceptance::fixture(
		crate::acceptance::test_config(),
		vector,
		lexical,
		graph,
		FakeGeneration::default(),
	);
	let result =
		fx.engine.retrieve(RetrieveRequest::new("What is the capital of France?")).await;

	assert_eq!(result.expansion_strategy, ExpansionStrategyKind::VectorAnchor);
	assert_eq!(result.expansion_early_exit, Some(EarlyExitReason::NoEntitiesExtracted));
	assert_eq!(result.channels[2].status, ChannelStatus::Ok);
	assert!(result.channels[2].latency_ms >= 0.0);
	assert_eq!(result.items[0].chunk_id, chunk_id(2));
}

#[tokio::test]
async fn expansion_metadata_survives_graph_local_timeout() {
	let vector = FakeVectorIndex::new(ChannelScript::hits(vec![hit(1, 1, 0.9)]));
	let lexical = FakeLexicalIndex::new(ChannelScript::default());
	let graph = FakeGraphStore {
		entity_count: 4,
		overlap: EntityOverlap { entities: vec!["alpha".to_string()], chunk_ids: Vec::new() },
		// The expansion publishes its result before this query hangs.
		entity_chunks: ChannelScript::delayed(vec![hit(3, 7, 0.6)], 1_000),
		..FakeGraphStore::default()
	};
	let fx = crate::acceptance::fixture(
		crate::acceptance::test_config(),
		vector,
		lexical,
		graph,
		FakeGeneration::default(),
	);
	let result =
		fx.engine.retrieve(RetrieveRequest::new("What is the capital of France?")).await;

	assert_eq!(result.channels[2].status, ChannelStatus::TimedOut);
	assert_eq!(result.expansion_strategy, ExpansionStrategyKind::VectorAnchor);
	assert!(result.expansion_latency_ms.is_some());
}

#[tokio::test]
async fn strategy_kind_is_reported_when_expansion_never_completes() {
	// Anchor search hangs past the channel budget, so the expansion itself is
	// cut off before it can publish a result.
	let vector = FakeVectorIndex::new(ChannelScript::delayed(vec![hit(1, 1, 0.9)], 1_000));
	let lexical = FakeLexicalIndex::new(ChannelScript::hits(vec![hit(2, 2, 4.0)]));
	let graph = FakeGraphStore { entity_count: 4, ..FakeGraphStore::default() };
	let fx = crate::acceptance::fixture(
		crate::acceptance::test_config(),
		vector,
		lexical,
		graph,
		FakeGeneration::default(),
	);
	let result =
		fx.engine.retrieve(RetrieveRequest::new("What is the capital of France?")).await;

	assert_eq!(result.channels[2].status, ChannelStatus::TimedOut);
	assert_eq!(result.expansion_strategy, ExpansionStrategyKind::VectorAnchor);
	assert_eq!(result.expansion_latency_ms, None);
	assert_eq!(result.expansion_early_exit, None);
}
