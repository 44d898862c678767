//! Parameter Sweep Example
//!
//! Expands a grid of models and temperatures over one conversation, runs
//! every combination against a mock client, and prints the folded table.
//!
//! Run with: cargo run --example sweep

use promptgrid::{
    ChatExperiment, ChatMessage, ChatResponse, ExperimentConfig, MockChatClient, ParamValue,
};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Promptgrid Parameter Sweep ===\n");

    // -------------------------------------------------------------------------
    // 1. Stage the grid
    // -------------------------------------------------------------------------
    println!("1. Building the experiment...");

    let mut experiment = ChatExperiment::builder()
        .config(ExperimentConfig::new().with_mock_mode(true))
        .client(MockChatClient::with_responder(|request| {
            let model = request.get("model").and_then(Value::as_str).unwrap_or("?");
            let temperature = request
                .get("temperature")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            Ok(ChatResponse::from_text(format!(
                "({model} at t={temperature}) George Washington."
            )))
        }))
        .models(["llama3.1", "phi3"])
        .message_lists([vec![
            ChatMessage::system("Answer in one short sentence."),
            ChatMessage::user("Who was the first US president?"),
        ]])
        .temperatures([0.0, 0.7, 1.0])
        .build()?;

    println!(
        "   Combinations: {}",
        experiment.argument_combos().len()
    );

    // -------------------------------------------------------------------------
    // 2. Run the full product
    // -------------------------------------------------------------------------
    println!("\n2. Running the sweep...");

    experiment.run().await?;
    println!("   Rows folded: {}", experiment.full_table().row_count());

    // -------------------------------------------------------------------------
    // 3. Extend with a partial run
    // -------------------------------------------------------------------------
    println!("\n3. Adding one model via a partial run...");

    experiment
        .run_partial("model", ParamValue::Given(json!("mistral")))
        .await?;
    println!("   Rows folded: {}", experiment.full_table().row_count());
    println!(
        "   Next full sweep would cover {} combinations",
        experiment.argument_combos().len()
    );

    // -------------------------------------------------------------------------
    // 4. Score and inspect
    // -------------------------------------------------------------------------
    println!("\n4. Attaching an evaluator score column...");

    let rows = experiment.full_table().row_count();
    let scores: Vec<Value> = (0..rows).map(|i| json!(i % 2)).collect();
    experiment.add_score_column("exact_match", scores)?;

    println!("\n   Curated view (varied inputs + responses + scores):\n");
    println!("{}", experiment.get_table(false));

    println!("\n=== Sweep Complete ===");
    Ok(())
}
