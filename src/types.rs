//! Core type definitions: messages, tool calls, run results, and agent
//! configuration.
//!
//! Messages are owned, serde-serializable records so transcripts can be
//! persisted by the host; the arena-backed parse types of
//! [`crate::json`]/[`crate::parser`] are converted into these at the end of
//! each iteration.
//!
//! [`AgentOptions`] follows the builder-with-validation pattern: the
//! generator and the tool executor are required, everything else has a
//! sensible default.

use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::hooks::AgentHooks;
use crate::tools::{ToolExecutor, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Default iteration cap for one [`crate::Agent::run`].
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Default byte cap for a single tool result fed back to the model.
pub const DEFAULT_MAX_TOOL_RESULT_LEN: usize = 3000;

/// Who produced a message.
///
/// Serializes to lowercase strings (`"user"`, `"assistant"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Context and instructions supplied by the host.
    System,
    /// Human or application input.
    User,
    /// Model output.
    Assistant,
    /// A tool execution result fed back to the model.
    Tool,
}

/// A structured invocation request emitted by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned when the call was parsed.
    pub id: Uuid,
    /// Tool name as the model emitted it.
    pub name: String,
    /// JSON argument object.
    pub arguments: serde_json::Value,
}

/// The outcome of dispatching one [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Identifier of this result record.
    pub id: Uuid,
    /// The call this result answers.
    pub tool_call_id: Uuid,
    /// Result text (possibly truncated with a trailing `"..."`).
    pub content: String,
    /// Tool-level failure flag; the model sees the content either way.
    pub is_error: bool,
}

/// One entry of a conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id.
    pub id: Uuid,
    /// Who produced it.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Tool calls this (assistant) message issued.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Tool results this (tool) message carries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
    /// Reasoning content extracted from `<think>` regions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Attached image bytes (JPEG), for hosts with camera input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
}

impl Message {
    /// Create a message with a fresh id and the current timestamp.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Message {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            thinking: None,
            image: None,
        }
    }

    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::new(MessageRole::User, content)
    }

    /// System message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::new(MessageRole::System, content)
    }

    /// Assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::new(MessageRole::Assistant, content)
    }

    /// Tool-result message.
    pub fn tool(content: impl Into<String>) -> Self {
        Message::new(MessageRole::Tool, content)
    }

    /// Attach image bytes to this message.
    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }
}

/// Coarse progress indicator reported through
/// [`AgentHooks::on_step_change`](crate::AgentHooks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    /// No run in progress.
    #[default]
    Idle,
    /// The generator is producing tokens.
    Generating,
    /// An unterminated tool call is being assembled; token forwarding is
    /// suppressed.
    Thinking,
    /// A tool is being executed (the hook receives its name).
    CallingTool,
    /// A tool finished; its result is being recorded.
    WaitingForResult,
}

/// How a run ended when it produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The model produced a turn with no tool call.
    Completed,
    /// The iteration cap was hit while tool calls were still being issued;
    /// the result still carries the last assistant text.
    MaxIterations,
}

/// The outcome of one [`crate::Agent::run`].
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The final assistant text (last assistant message of the run).
    pub response: String,
    /// Accumulated reasoning content, when the model emitted any.
    pub thinking: Option<String>,
    /// Every tool call executed during the run, in encounter order.
    pub tool_calls: Vec<ToolCall>,
    /// Number of generate→parse→dispatch cycles performed.
    pub iterations: u32,
    /// Whether the run completed or hit the iteration cap.
    pub status: RunStatus,
}

/// Schema-source override: returns the tools schema JSON for the current
/// iteration's system prompt.
pub type SchemaFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Configuration for an [`crate::Agent`].
///
/// Built via [`AgentOptions::builder`]; the generator and a tool executor
/// (usually a [`ToolRegistry`]) are required.
#[derive(Clone)]
pub struct AgentOptions {
    generator: Arc<dyn Generator>,
    executor: Arc<dyn ToolExecutor>,
    registry: Option<Arc<ToolRegistry>>,
    tools_schema_fn: Option<SchemaFn>,
    hooks: AgentHooks,
    max_iterations: u32,
    max_tool_result_len: usize,
    japanese: bool,
    custom_system_prompt: Option<String>,
}

impl AgentOptions {
    /// Start building options.
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::default()
    }

    /// The host-supplied generator.
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// The tool executor invocations are dispatched through.
    pub fn executor(&self) -> &Arc<dyn ToolExecutor> {
        &self.executor
    }

    /// The registry used as the schema source, when one was provided.
    pub fn registry(&self) -> Option<&Arc<ToolRegistry>> {
        self.registry.as_ref()
    }

    /// Schema-source override, when one was provided.
    pub fn tools_schema_fn(&self) -> Option<&SchemaFn> {
        self.tools_schema_fn.as_ref()
    }

    /// Notification hooks.
    pub fn hooks(&self) -> &AgentHooks {
        &self.hooks
    }

    /// Iteration cap per run.
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Byte cap for a single tool result.
    pub fn max_tool_result_len(&self) -> usize {
        self.max_tool_result_len
    }

    /// Whether the Japanese system-prompt template is selected.
    pub fn japanese(&self) -> bool {
        self.japanese
    }

    /// Host-supplied suffix appended to the system prompt.
    pub fn custom_system_prompt(&self) -> Option<&str> {
        self.custom_system_prompt.as_deref()
    }
}

impl std::fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptions")
            .field("registry", &self.registry.as_ref().map(|r| r.len()))
            .field("max_iterations", &self.max_iterations)
            .field("max_tool_result_len", &self.max_tool_result_len)
            .field("japanese", &self.japanese)
            .field("custom_system_prompt", &self.custom_system_prompt)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Builder for [`AgentOptions`].
///
/// `build()` validates that a generator and an executor are present; every
/// other field falls back to its default.
#[derive(Default)]
pub struct AgentOptionsBuilder {
    generator: Option<Arc<dyn Generator>>,
    executor: Option<Arc<dyn ToolExecutor>>,
    registry: Option<Arc<ToolRegistry>>,
    tools_schema_fn: Option<SchemaFn>,
    hooks: AgentHooks,
    max_iterations: Option<u32>,
    max_tool_result_len: Option<usize>,
    japanese: bool,
    custom_system_prompt: Option<String>,
}

impl AgentOptionsBuilder {
    /// Set the generator (required).
    pub fn generator(mut self, generator: impl Generator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Set an already-shared generator (required).
    pub fn generator_arc(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set a custom tool executor.
    ///
    /// Not needed when [`tools`](Self::tools) supplies a registry.
    pub fn executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Supply a tool registry: it becomes the schema source and, unless an
    /// explicit executor was set, the executor as well.
    pub fn tools(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Override the schema string embedded in the system prompt.
    ///
    /// The closure runs once per iteration, so a host may rotate the
    /// advertised tool set mid-conversation.
    pub fn tools_schema_fn(
        mut self,
        f: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.tools_schema_fn = Some(Arc::new(f));
        self
    }

    /// Set notification hooks.
    pub fn hooks(mut self, hooks: AgentHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the iteration cap (default 10).
    pub fn max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Set the tool-result byte cap (default 3000).
    pub fn max_tool_result_len(mut self, len: usize) -> Self {
        self.max_tool_result_len = Some(len);
        self
    }

    /// Select the Japanese system-prompt template.
    pub fn japanese(mut self, japanese: bool) -> Self {
        self.japanese = japanese;
        self
    }

    /// Append a host-specific suffix to the system prompt.
    pub fn custom_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_system_prompt = Some(prompt.into());
        self
    }

    /// Validate and produce the final [`AgentOptions`].
    ///
    /// # Errors
    ///
    /// Returns a config error when the generator is missing, when neither
    /// an executor nor a registry was provided, or when a cap is zero.
    pub fn build(self) -> Result<AgentOptions> {
        let generator = self
            .generator
            .ok_or_else(|| Error::config("generator is required"))?;

        let executor: Arc<dyn ToolExecutor> = match (self.executor, &self.registry) {
            (Some(executor), _) => executor,
            (None, Some(registry)) => registry.clone(),
            (None, None) => return Err(Error::config("tool executor is required")),
        };

        let max_iterations = self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS);
        if max_iterations == 0 {
            return Err(Error::config("max_iterations must be greater than 0"));
        }

        let max_tool_result_len = self
            .max_tool_result_len
            .unwrap_or(DEFAULT_MAX_TOOL_RESULT_LEN);
        if max_tool_result_len == 0 {
            return Err(Error::config("max_tool_result_len must be greater than 0"));
        }

        Ok(AgentOptions {
            generator,
            executor,
            registry: self.registry,
            tools_schema_fn: self.tools_schema_fn,
            hooks: self.hooks,
            max_iterations,
            max_tool_result_len,
            japanese: self.japanese,
            custom_system_prompt: self.custom_system_prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FnGenerator;

    fn noop_generator() -> FnGenerator<impl Fn(&[Message], &str) -> Result<String> + Send + Sync> {
        FnGenerator::new(|_messages, _system| Ok(String::from("ok")))
    }

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "hello");
        assert!(msg.tool_calls.is_empty());
        assert!(msg.timestamp_ms > 0);

        let with_image = Message::user("look").with_image(vec![0xFF, 0xD8]);
        assert_eq!(with_image.image.as_deref(), Some(&[0xFF, 0xD8][..]));
    }

    #[test]
    fn test_message_serde_round_trip() {
        let mut msg = Message::assistant("done");
        msg.thinking = Some("because".into());
        msg.tool_calls.push(ToolCall {
            id: Uuid::new_v4(),
            name: "t".into(),
            arguments: serde_json::json!({"x": 1}),
        });

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"assistant\""));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content, "done");
        assert_eq!(back.tool_calls.len(), 1);
        assert_eq!(back.thinking.as_deref(), Some("because"));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("thinking"));
        assert!(!json.contains("image"));
    }

    #[test]
    fn test_builder_requires_generator() {
        let registry = Arc::new(ToolRegistry::new());
        let result = AgentOptions::builder().tools(registry).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_requires_executor() {
        let result = AgentOptions::builder().generator(noop_generator()).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let options = AgentOptions::builder()
            .generator(noop_generator())
            .tools(Arc::new(ToolRegistry::new()))
            .build()
            .unwrap();
        assert_eq!(options.max_iterations(), DEFAULT_MAX_ITERATIONS);
        assert_eq!(options.max_tool_result_len(), DEFAULT_MAX_TOOL_RESULT_LEN);
        assert!(!options.japanese());
        assert!(options.custom_system_prompt().is_none());
    }

    #[test]
    fn test_builder_rejects_zero_caps() {
        let result = AgentOptions::builder()
            .generator(noop_generator())
            .tools(Arc::new(ToolRegistry::new()))
            .max_iterations(0)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
