//! # MedPulse Gemini
//!
//! HTTP adapters behind the collaborator traits of `medpulse-core`:
//! - [`GeminiClient`]: embeddings and generation over the generative-language REST API
//! - [`SearchClient`]: knowledge-base retrieval over a discovery-engine `:search` endpoint
//!
//! Configuration is passed in by the caller; nothing here reads the environment.

mod client;
mod config;
mod error;
mod search;

pub use client::GeminiClient;
pub use config::{GeminiConfig, SearchConfig};
pub use error::{GeminiError, GeminiResult};
pub use search::SearchClient;
