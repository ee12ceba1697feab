//! # SGR Research Core
//!
//! Domain types, traits, and error definitions for the SGR research agent.
//! This crate has **no transport dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external backend (LLM, web search) is a trait here. Implementations
//! live in their respective crates, so tests can swap in scripted stubs.

pub mod error;
pub mod message;
pub mod provider;
pub mod pruning;
pub mod research;
pub mod search;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, SearchError, ToolError};
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, ResponseFormat, StreamChunk, ToolChoice,
    ToolDefinition, Usage,
};
pub use research::{
    ContextSnapshot, ResearchContext, ResearchState, ResumeSignal, SearchResult, SharedContext,
    SourceData,
};
pub use search::{DisabledSearch, SearchProvider};
pub use tool::{Tool, ToolEnv};
