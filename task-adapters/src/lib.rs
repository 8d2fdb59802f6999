//! Language model adapters used by the task agent.
//!
//! Each provider module implements the shared [`ModelAdapter`] trait defined
//! in [`traits`]. [`ProviderRegistry`] resolves a provider name from
//! configuration into a ready adapter.

#![warn(missing_docs, clippy::pedantic)]

pub mod anthropic;
pub mod openai;
pub mod provider;
pub mod traits;

mod http_client;

pub use provider::{AdapterFactory, ProviderRegistry, ProviderSettings};
pub use traits::{
    AdapterError, AdapterMetadata, AdapterResult, AdapterStream, InferenceChunk, InferenceRequest,
    MessageRole, ModelAdapter, PromptMessage, collect_text,
};
