use quiver_domain::ChannelId;
use quiver_engine::{ChannelStatus, RetrieveRequest};
use quiver_testkit::{
	ChannelScript, FakeGeneration, FakeGraphStore, FakeLexicalIndex, FakeVectorIndex, chunk_id,
	hit,
};

#[tokio::test]
async fn single_channel_failure_degrades_not_aborts() {
	let vector = FakeVectorIndex::new(ChannelScript::hits(vec![hit(1, 1, 0.9)]));
	let lexical = FakeLexicalIndex::new(ChannelScript::failing("index unavailable"));
	let graph = FakeGraphStore { entity_count: 1, ..FakeGraphStore::default() };
	let fx = crate::acceptance::fixture(
		crate::acceptance::test_config(),
		vector,
		lexical,
		graph,
		FakeGeneration::default(),
	);
	let result =
		fx.engine.retrieve(RetrieveRequest::new("What is the capital of France?")).await;

	let lexical_meta = &result.channels[1];
	assert_eq!(lexical_meta.channel, ChannelId::Lexical);
	assert_eq!(lexical_meta.status, ChannelStatus::Failed);
	assert_eq!(lexical_meta.error.as_deref(), Some("index unavailable"));

	// The surviving channels still produce a ranked answer.
	assert_eq!(result.items[0].chunk_id, chunk_id(1));
}

#[tokio::test]
async fn every_backend_failing_yields_empty_result_without_panic() {
	let vector = FakeVectorIndex::new(ChannelScript::failing("vector down"));
	let lexical = FakeLexicalIndex::new(ChannelScript::failing("lexical down"));
	let graph = FakeGraphStore {
		entity_count: 1,
		overlap_fail: Some("graph down".to_string()),
		entity_chunks: ChannelScript::failing("graph down"),
		communities: ChannelScript::failing("graph down"),
		..FakeGraphStore::default()
	};
	let mut cfg = crate::acceptance::test_config();

	cfg.search.skip_zero_weight_channels = false;

	let fx = crate::acceptance::fixture(cfg, vector, lexical, graph, FakeGeneration::default());
	let result =
		fx.engine.retrieve(RetrieveRequest::new("What is the capital of France?")).await;

	assert!(result.items.is_empty());
	assert_eq!(result.channels[0].status, ChannelStatus::Failed);
	assert_eq!(result.channels[1].status, ChannelStatus::Failed);
	assert_eq!(result.channels[3].status, ChannelStatus::Failed);

	// Anchor search failure empties the expansion, so graph-local completes
	// with nothing rather than failing.
	assert_eq!(result.channels[2].status, ChannelStatus::Ok);
	assert!(result.channels.iter().take(2).all(|meta| meta.error.is_some()));
}

#[tokio::test]
async fn slow_channel_times_out_within_budget() {
	let vector = FakeVectorIndex::new(ChannelScript::delayed(vec![hit(1, 1, 0.9)], 1_000));
	let lexical = FakeLexicalIndex::new(ChannelScript::hits(vec![hit(2, 2, 5.0)]));
	let graph = FakeGraphStore { entity_count: 1, ..FakeGraphStore::default() };
	let fx = crate::acceptance::fixture(
		crate::acceptance::test_config(),
		vector,
		lexical,
		graph,
		FakeGeneration::default(),
	);
	let result =
		fx.engine.retrieve(RetrieveRequest::new("What is the capital of France?")).await;

	let dense = &result.channels[0];
	assert_eq!(dense.status, ChannelStatus::TimedOut);
	assert_eq!(dense.error.as_deref(), Some("Channel timed out after 200ms."));
	assert_eq!(result.items[0].chunk_id, chunk_id(2));
}

#[tokio::test]
async fn top_k_zero_clamps_to_one() {
	let vector = FakeVectorIndex::new(ChannelScript::hits(vec![hit(1, 1, 0.9), hit(1, 2, 0.8)]));
	let lexical = FakeLexicalIndex::new(ChannelScript::default());
	let graph = FakeGraphStore { entity_count: 1, ..FakeGraphStore::default() };
	let fx = crate::acceptance::fixture(
		crate::acceptance::test_config(),
		vector,
		lexical,
		graph,
		FakeGeneration::default(),
	);
	let mut request = RetrieveRequest::new("What is the capital of France?");

	request.top_k = Some(0);

	let result = fx.engine.retrieve(request).await;

	assert_eq!(result.items.len(), 1);
}
