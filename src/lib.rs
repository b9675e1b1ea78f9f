//! # zai - Z.AI / ZhipuAI platform client
//!
//! An async client for the Z.AI open platform with signed-token
//! authentication and uniform result envelopes.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Short-lived HS256 tokens signed from the API key, cached per key id
//! - Pluggable token cache via the [`TokenCache`](cache::TokenCache) trait
//! - Streaming support via Server-Sent Events
//! - Configuration from code, `ZAI_*` environment variables, or defaults
//!
//! ## Architecture
//!
//! Every call flows through the same layers:
//!
//! 1. **Services** (`agents`, `assistants`, `audio`, `files`, `videos`) map typed
//!    requests onto a path and verb.
//! 2. **[`RequestExecutor`]** runs the call and folds success or failure into an
//!    [`Envelope`].
//! 3. **[`AuthTransport`](http::AuthTransport)** stamps authentication and SDK
//!    headers on each outgoing request.
//! 4. **[`TokenManager`](token::TokenManager)** supplies signed tokens from its cache.
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use zai::services::agents::{AgentMessage, AgentsCompletionRequest};
//! use zai::ZaiClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ZaiClient::zai("your-id.your-secret")?;
//!
//!     let request = AgentsCompletionRequest::new(
//!         "general_translation",
//!         vec![AgentMessage::user("Hello!")],
//!     )
//!     .with_stream(true);
//!
//!     let envelope = client.agents().completion(request).await?;
//!     if let Some(mut stream) = envelope.stream {
//!         while let Some(chunk) = stream.next().await {
//!             print!("{}", chunk?.content());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod executor;
pub mod http;
pub mod model;
pub mod options;
pub mod services;
pub mod sse;
pub mod token;

// Re-exports for convenience
pub use client::{ZaiClient, ZaiClientBuilder};
pub use error::{ClientError, ConfigError, DecodeError, TransportError, ValidationError};
pub use executor::{Envelope, ErrorInfo, RequestExecutor};
pub use model::ModelData;
pub use options::{SecretString, ZaiConfig};
pub use sse::EventStream;
