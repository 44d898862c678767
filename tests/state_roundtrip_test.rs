//! Integration test for experiment state transfer
//!
//! Tests the complete checkpoint pipeline:
//! 1. Run a sweep and save it under a name
//! 2. Load the head revision and a pinned revision
//! 3. Keep extending the loaded experiment
//!
//! Toyota Way: Jidoka (Built-in Quality)

use promptgrid::{
    ChatExperiment, ChatMessage, ChatResponse, Error, ExperimentConfig, MemoryStateStore,
    MockChatClient, ParamValue, SaveEnvelope, StateStore,
};
use serde_json::{json, Value};

fn config() -> ExperimentConfig {
    ExperimentConfig::new()
        .with_credential("test-token")
        .with_mock_mode(true)
}

fn echoing_client() -> MockChatClient {
    MockChatClient::with_responder(|request| {
        let model = request.get("model").and_then(Value::as_str).unwrap_or("?");
        Ok(ChatResponse::from_text(model.to_string()))
    })
}

async fn run_sweep(config: ExperimentConfig) -> ChatExperiment {
    let mut experiment = ChatExperiment::builder()
        .config(config)
        .client(echoing_client())
        .models(["a", "b"])
        .message_lists([vec![ChatMessage::user("hello")]])
        .temperatures([0.0, 1.0])
        .build()
        .expect("Failed to build experiment");
    experiment.run().await.expect("Run failed");
    experiment
}

#[tokio::test]
async fn test_save_then_load_reproduces_the_table() {
    let store = MemoryStateStore::new();
    let mut experiment = run_sweep(config()).await;
    experiment
        .add_score_column("accuracy", vec![json!(1), json!(0), json!(1), json!(0)])
        .expect("Failed to add scores");

    let receipt = experiment
        .save(&store, Some("roundtrip"))
        .await
        .expect("Save failed");

    let loaded = ChatExperiment::load(&store, config(), &receipt.experiment_id)
        .await
        .expect("Load failed");

    // the table survives byte-for-byte, scores included
    assert_eq!(loaded.full_table(), experiment.full_table());
    assert_eq!(loaded.experiment_id(), Some(receipt.experiment_id.as_str()));
    assert_eq!(loaded.revision_id(), Some(receipt.revision_id.as_str()));
    assert_eq!(loaded.created_at(), experiment.created_at());

    // the parameter set and views survive too
    assert_eq!(loaded.parameter_set(), experiment.parameter_set());
    assert_eq!(
        loaded.partial_table().expect("No partial view"),
        experiment.partial_table().expect("No partial view")
    );
    assert_eq!(
        loaded
            .score_table()
            .expect("No score view")
            .column_names()
            .collect::<Vec<_>>(),
        vec!["accuracy"]
    );
}

#[tokio::test]
async fn test_loaded_experiment_keeps_extending() {
    let store = MemoryStateStore::new();
    let mut experiment = run_sweep(config()).await;
    let receipt = experiment
        .save(&store, Some("extend-me"))
        .await
        .expect("Save failed");

    let mut loaded = ChatExperiment::load(&store, config(), &receipt.experiment_id)
        .await
        .expect("Load failed");
    loaded.set_client(echoing_client());

    loaded
        .run_partial("model", ParamValue::Given(json!("c")))
        .await
        .expect("Partial run failed");

    // restored rows stay, the new model's rows append after them
    assert_eq!(loaded.full_table().row_count(), 6);
    let models = loaded.full_table().column("model").expect("No model column");
    assert_eq!(models[0], json!("a"));
    assert_eq!(models[4], json!("c"));
    assert_eq!(models[5], json!("c"));

    // saving again revises the same experiment
    let second = loaded.save(&store, None).await.expect("Re-save failed");
    assert_eq!(second.experiment_id, receipt.experiment_id);
    assert_ne!(second.revision_id, receipt.revision_id);
}

#[tokio::test]
async fn test_pinned_revision_load_sees_the_old_table() {
    let store = MemoryStateStore::new();
    let mut experiment = run_sweep(config()).await;
    let first = experiment
        .save(&store, Some("pinned"))
        .await
        .expect("Save failed");

    experiment
        .run_partial("model", ParamValue::Given(json!("c")))
        .await
        .expect("Partial run failed");
    let second = experiment.save(&store, None).await.expect("Re-save failed");

    // the head follows the latest revision
    let head = ChatExperiment::load(&store, config(), &second.experiment_id)
        .await
        .expect("Load failed");
    assert_eq!(head.full_table().row_count(), 6);
    assert_eq!(head.revision_id(), Some(second.revision_id.as_str()));

    // the pinned revision still shows the smaller table
    let pinned = ChatExperiment::load_revision(&store, config(), &first.revision_id)
        .await
        .expect("Revision load failed");
    assert_eq!(pinned.full_table().row_count(), 4);
    assert_eq!(pinned.revision_id(), Some(first.revision_id.as_str()));
}

#[tokio::test]
async fn test_load_rejects_foreign_experiment_types() {
    let store = MemoryStateStore::new();
    let mut experiment = run_sweep(config()).await;
    let receipt = experiment
        .save(&store, Some("tampered"))
        .await
        .expect("Save failed");

    // replay the persisted state under a different type tag
    let blob = store
        .fetch_experiment("test-token", &receipt.experiment_id)
        .await
        .expect("Fetch failed");
    let stored = promptgrid::StoredEnvelope::from_bytes(&blob).expect("Decode failed");
    let foreign = SaveEnvelope {
        name: Some("foreign".to_string()),
        experiment_id: None,
        experiment_type: "CompletionExperiment".to_string(),
        state: stored.state,
    };
    let foreign_receipt = store
        .save("test-token", &foreign.to_bytes().expect("Encode failed"))
        .await
        .expect("Save failed");

    let err = ChatExperiment::load(&store, config(), &foreign_receipt.experiment_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::TypeMismatch { expected, found }
            if expected == ChatExperiment::EXPERIMENT_TYPE && found == "CompletionExperiment"
    ));
}

#[tokio::test]
async fn test_load_rejects_ragged_snapshots() {
    let store = MemoryStateStore::new();
    let mut experiment = run_sweep(config()).await;
    let receipt = experiment
        .save(&store, Some("ragged"))
        .await
        .expect("Save failed");

    // replay the persisted state with one cell popped from a column; the
    // blob still decodes, so only the alignment check can catch it
    let blob = store
        .fetch_experiment("test-token", &receipt.experiment_id)
        .await
        .expect("Fetch failed");
    let stored = promptgrid::StoredEnvelope::from_bytes(&blob).expect("Decode failed");
    let replay = SaveEnvelope {
        name: Some("ragged".to_string()),
        experiment_id: None,
        experiment_type: ChatExperiment::EXPERIMENT_TYPE.to_string(),
        state: stored.state,
    };
    let mut raw: Value = serde_json::to_value(&replay).expect("Encode failed");
    raw.pointer_mut("/state/table/columns/latency/cells")
        .and_then(Value::as_array_mut)
        .expect("No latency cells")
        .pop();
    let ragged_blob = serde_json::to_vec(&raw).expect("Encode failed");
    let ragged_receipt = store
        .save("test-token", &ragged_blob)
        .await
        .expect("Save failed");

    let err = ChatExperiment::load(&store, config(), &ragged_receipt.experiment_id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StateShape(_)));
}

#[tokio::test]
async fn test_unknown_ids_surface_store_errors() {
    let store = MemoryStateStore::new();

    let missing = ChatExperiment::load(&store, config(), "exp-999")
        .await
        .unwrap_err();
    assert!(matches!(missing, Error::RemoteStore { status: 404, .. }));

    let missing_rev = ChatExperiment::load_revision(&store, config(), "rev-999")
        .await
        .unwrap_err();
    assert!(matches!(missing_rev, Error::RemoteStore { status: 404, .. }));
}

#[tokio::test]
async fn test_save_preconditions_never_touch_the_store() {
    let store = MemoryStateStore::new();

    // no name on first save
    let mut unnamed = run_sweep(config()).await;
    assert!(matches!(
        unnamed.save(&store, None).await.unwrap_err(),
        Error::UnnamedExperiment
    ));

    // no results yet
    let mut empty = ChatExperiment::builder()
        .config(config())
        .models(["a"])
        .message_lists([vec![ChatMessage::user("hello")]])
        .build()
        .expect("Failed to build experiment");
    assert!(matches!(
        empty.save(&store, Some("empty")).await.unwrap_err(),
        Error::EmptyExperiment
    ));

    // no credential configured
    let mut uncredentialed = run_sweep(ExperimentConfig::new().with_mock_mode(true)).await;
    assert!(matches!(
        uncredentialed.save(&store, Some("sweep")).await.unwrap_err(),
        Error::MissingCredential(_)
    ));

    assert!(store.is_empty(), "Preconditions must fail before the store");
}
