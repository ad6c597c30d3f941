//! # Stepwise Core
//!
//! Domain types, traits, and error definitions shared by every Stepwise crate.
//! This crate has **no framework dependencies**: it defines the vocabulary
//! the workflow engine, the ReAct agent, providers, and tools speak.
//!
//! ## Layout
//!
//! - [`message`]: chat messages and the bounded chat memory
//! - [`provider`]: the LLM backend trait and its request/stream types
//! - [`tool`]: the capability trait, invocation requests, and the registry
//! - [`error`]: the error taxonomy, one enum per bounded context

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{ChatMemory, ChatMessage, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use tool::{Tool, ToolArguments, ToolCall, ToolRegistry, ToolResult};
