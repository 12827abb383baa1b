//! # agent-loop
//!
//! An embeddable agent loop for local language models on constrained
//! devices.
//!
//! The host application supplies two things — a text [`Generator`] over its
//! inference engine and a [`ToolExecutor`] (usually a [`ToolRegistry`]) —
//! and the library drives the multi-turn conversation around them: it
//! builds the system prompt with the tool schema embedded, parses the
//! model's output into text / tool-call / thinking segments (streaming and
//! batch, including a bare-JSON fallback for models that skip the framing
//! tags), dispatches tool invocations, feeds results back into the working
//! history, and loops until the model produces a turn with no tool request
//! or the iteration cap is reached.
//!
//! ## What the library does *not* do
//!
//! Inference, tool implementations, audio/image capture, and UI all belong
//! to the host. They appear here only as the callback seams the
//! orchestrator consumes.
//!
//! ## Quick start
//!
//! ```
//! use agent_loop::{
//!     Agent, AgentOptions, FnGenerator, PropertySchema, ToolRegistry, tool,
//! };
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! // 1. Register the tools the model may call.
//! let mut registry = ToolRegistry::new();
//! registry.register(
//!     tool("get_time", "Get the current time")
//!         .param(PropertySchema::string("timezone", "IANA timezone", false))
//!         .build(|_args| async move { Ok(serde_json::json!("12:00")) }),
//! );
//!
//! // 2. Wrap the inference engine. Real hosts stream tokens; tests and
//! //    blocking engines can return the whole response at once.
//! let generator = FnGenerator::new(|_messages, _system_prompt| {
//!     Ok("Hello! How can I help you?".to_string())
//! });
//!
//! // 3. Run the loop.
//! let options = AgentOptions::builder()
//!     .generator(generator)
//!     .tools(Arc::new(registry))
//!     .build()
//!     .unwrap();
//! let mut agent = Agent::new(options);
//! agent.add_user_message("hi");
//! let result = agent.run().await.unwrap();
//! assert_eq!(result.response, "Hello! How can I help you?");
//! # });
//! ```
//!
//! ## Architecture
//!
//! | module | responsibility |
//! |--------|----------------|
//! | [`arena`] | per-conversation bump allocator; all parse-time values live in it |
//! | [`json`] | arena-backed JSON value model, lenient parser, canonical serializer |
//! | [`tools`] | typed schemas, tool registry, function-calling schema emission |
//! | [`parser`] | batch + streaming response parsing (tool calls, thinking, bare JSON) |
//! | [`agent`] | the orchestrator: iteration loop, histories, dispatch, cancellation |
//!
//! Memory discipline: transcripts are owned, serde-serializable
//! [`Message`]s; everything produced while *parsing* a turn references the
//! agent's [`Arena`] and is released wholesale on [`Agent::reset`].

/// Library version string (the crate version).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Per-conversation bump allocator with savepoints.
pub mod arena;

/// Arena-backed JSON value model, parser, and serializer.
pub mod json;

/// Tool definitions, registry, and schema emission.
pub mod tools;

/// Batch and streaming response parsing.
pub mod parser;

/// The orchestrator and its run loop.
pub mod agent;

/// Message, tool-call, run-result, and configuration types.
pub mod types;

/// The generation seam to the host's inference engine.
pub mod generator;

/// Notification hooks (token / tool-call / step).
pub mod hooks;

/// Error types.
pub mod error;

/// UTF-8 boundary scanning and truncation helpers.
pub mod utils;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

pub use agent::{Agent, StopHandle, format_tool_call};

pub use arena::{Arena, Savepoint};

pub use error::{Error, Result};

pub use generator::{FnGenerator, Generator, TokenStream};

pub use hooks::AgentHooks;

pub use json::Value;

pub use parser::{
    ParsedToolCall, Segment, StreamEvent, StreamingParser, has_incomplete_tool_call,
    has_tool_call, parse_response,
};

pub use tools::{
    PropertySchema, PropertyType, Tool, ToolBuilder, ToolExecutor, ToolOutput, ToolRegistry, tool,
};

pub use types::{
    AgentOptions, AgentOptionsBuilder, Message, MessageRole, RunResult, RunStatus, Step, ToolCall,
    ToolResult,
};

pub use utils::{truncate_with_ellipsis, utf8_char_length, utf8_complete_boundary};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The most commonly used types and functions in one import.
pub mod prelude {
    pub use crate::{
        Agent, AgentHooks, AgentOptions, Error, FnGenerator, Generator, Message, MessageRole,
        PropertySchema, Result, RunResult, RunStatus, Step, Tool, ToolCall, ToolExecutor,
        ToolRegistry, ToolResult, tool,
    };
}
