//! Stream a translation agent's answer.
//!
//! Run with:
//! ```bash
//! export ZAI_API_KEY="your-id.your-secret"
//! cargo run --example agent_streaming
//! ```

use futures::StreamExt;
use serde_json::json;
use zai::services::agents::{AgentContent, AgentMessage, AgentsCompletionRequest};
use zai::ZaiClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Key and base URL come from ZAI_API_KEY / ZAI_BASE_URL
    let client = ZaiClient::builder().build()?;

    let request = AgentsCompletionRequest::new(
        "general_translation",
        vec![AgentMessage::user_parts(vec![AgentContent::text(
            "Rust makes systems programming approachable.",
        )])],
    )
    .with_custom_variable("source_lang", json!("en"))
    .with_custom_variable("target_lang", json!("fr"))
    .with_stream(true);

    let envelope = client.agents().completion(request).await?;
    let Some(mut stream) = envelope.stream else {
        eprintln!("request failed: {:?}", envelope.error);
        return Ok(());
    };

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(data) => print!("{}", data.content()),
            Err(e) => eprintln!("\n[stream error] {}", e),
        }
    }
    println!();

    Ok(())
}
