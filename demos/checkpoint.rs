//! Checkpoint Example
//!
//! Saves a finished sweep to a state store, loads it back, and keeps
//! extending the loaded experiment. Uses the in-memory store so it runs
//! offline; swap in `HttpStateStore` for a real deployment.
//!
//! Run with: cargo run --example checkpoint

use promptgrid::{
    ChatExperiment, ChatMessage, ChatResponse, ExperimentConfig, MemoryStateStore,
    MockChatClient, ParamValue,
};
use serde_json::{json, Value};

fn config() -> ExperimentConfig {
    ExperimentConfig::new()
        .with_credential("demo-token")
        .with_mock_mode(true)
}

fn echoing_client() -> MockChatClient {
    MockChatClient::with_responder(|request| {
        let model = request.get("model").and_then(Value::as_str).unwrap_or("?");
        Ok(ChatResponse::from_text(format!("{model} says hello")))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Promptgrid Checkpointing ===\n");

    let store = MemoryStateStore::new();

    // -------------------------------------------------------------------------
    // 1. Run a sweep and save it
    // -------------------------------------------------------------------------
    println!("1. Running and saving the first pass...");

    let mut experiment = ChatExperiment::builder()
        .config(config())
        .client(echoing_client())
        .models(["llama3.1", "phi3"])
        .message_lists([vec![ChatMessage::user("Say hello.")]])
        .temperatures([0.0, 1.0])
        .build()?;
    experiment.run().await?;

    let first = experiment.save(&store, Some("hello-sweep")).await?;
    println!("   Experiment id: {}", first.experiment_id);
    println!("   Revision id:   {}", first.revision_id);
    println!("   Rows saved:    {}", experiment.full_table().row_count());

    // -------------------------------------------------------------------------
    // 2. Load the head and keep going
    // -------------------------------------------------------------------------
    println!("\n2. Loading the head revision...");

    let mut loaded = ChatExperiment::load(&store, config(), &first.experiment_id).await?;
    loaded.set_client(echoing_client());
    println!("   Rows restored: {}", loaded.full_table().row_count());

    // -------------------------------------------------------------------------
    // 3. Extend and revise
    // -------------------------------------------------------------------------
    println!("\n3. Extending the loaded experiment...");

    loaded
        .run_partial("model", ParamValue::Given(json!("mistral")))
        .await?;
    println!("   Rows now:      {}", loaded.full_table().row_count());

    let second = loaded.save(&store, None).await?;
    println!("   New revision:  {}", second.revision_id);

    // -------------------------------------------------------------------------
    // 4. Pinned revisions stay addressable
    // -------------------------------------------------------------------------
    println!("\n4. Loading the pinned first revision...");

    let pinned = ChatExperiment::load_revision(&store, config(), &first.revision_id).await?;
    println!(
        "   Pinned rows:   {} (head has {})",
        pinned.full_table().row_count(),
        loaded.full_table().row_count()
    );

    println!("\n   Curated view of the head:\n");
    println!("{}", loaded.get_table(false));

    println!("\n=== Checkpointing Complete ===");
    Ok(())
}
