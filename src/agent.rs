//! The orchestrator: the generate → parse → dispatch loop.
//!
//! An [`Agent`] owns a conversation: the permanent transcript, the working
//! history extended during a run, the per-conversation [`Arena`] every
//! parse-time value lives in, and the cancellation flag. One call to
//! [`Agent::run`] drives iterations until the model produces a turn with no
//! tool call, the iteration cap is hit, the run is cancelled, or the
//! generator fails.
//!
//! A conversation is single-threaded and cooperative: the agent itself
//! never blocks — all long-running work happens inside the host's
//! [`Generator`](crate::Generator) and
//! [`ToolExecutor`](crate::ToolExecutor) implementations. Concurrent runs
//! on one agent are rejected; independent conversations are independent
//! agents.
//!
//! # Example
//!
//! ```
//! use agent_loop::{Agent, AgentOptions, FnGenerator, ToolRegistry};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let options = AgentOptions::builder()
//!     .generator(FnGenerator::new(|_msgs, _sys| Ok("Hello!".to_string())))
//!     .tools(Arc::new(ToolRegistry::new()))
//!     .build()
//!     .unwrap();
//!
//! let mut agent = Agent::new(options);
//! agent.add_user_message("hi");
//! let result = agent.run().await.unwrap();
//! assert_eq!(result.response, "Hello!");
//! # });
//! ```

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::parser::{self, Segment, StreamEvent, StreamingParser};
use crate::tools::ToolOutput;
use crate::types::{
    AgentOptions, Message, MessageRole, RunResult, RunStatus, Step, ToolCall, ToolResult,
};
use crate::utils::truncate_with_ellipsis;
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

const SYSTEM_PROMPT_EN: &str = "You are a helpful AI assistant. You have access to various tools to help accomplish tasks.\n\n\
When you need to use a tool, output a tool call in this format:\n\
<tool_call>\n\
{\"name\": \"tool_name\", \"arguments\": {\"arg1\": \"value1\"}}\n\
</tool_call>\n\n\
Available tools:\n{tools_schema}\n";

const SYSTEM_PROMPT_JA: &str = "あなたは便利なAIアシスタントです。タスクを達成するためにさまざまなツールを使用できます。\n\n\
ツールを使用する必要がある場合は、次の形式でツール呼び出しを出力してください：\n\
<tool_call>\n\
{\"name\": \"ツール名\", \"arguments\": {\"引数1\": \"値1\"}}\n\
</tool_call>\n\n\
利用可能なツール:\n{tools_schema}\n";

/// Cloneable handle that cancels a running agent from another task.
///
/// [`Agent::run`] takes `&mut self`, so the agent itself cannot be poked
/// while a run is in flight; a handle taken beforehand can.
#[derive(Clone, Debug)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request cancellation of the current (or next) run.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// A single conversation and its run loop.
pub struct Agent {
    options: AgentOptions,
    arena: Arena,
    /// User-visible transcript: user/system inputs and final answers.
    messages: Vec<Message>,
    /// Per-run extension of the transcript with intermediate assistant and
    /// tool messages.
    working: Vec<Message>,
    stream_parser: StreamingParser,
    response_buf: String,
    thinking_buf: String,
    current_step: Step,
    processing: bool,
    should_stop: Arc<AtomicBool>,
}

impl Agent {
    /// Create an agent for a fresh conversation.
    pub fn new(options: AgentOptions) -> Self {
        Agent {
            options,
            arena: Arena::new(),
            messages: Vec::new(),
            working: Vec::new(),
            stream_parser: StreamingParser::new(),
            response_buf: String::new(),
            thinking_buf: String::new(),
            current_step: Step::Idle,
            processing: false,
            should_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Append a user message to the transcript.
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Append a user message carrying image bytes (JPEG).
    pub fn add_user_message_with_image(&mut self, content: impl Into<String>, image: Vec<u8>) {
        self.messages.push(Message::user(content).with_image(image));
    }

    /// Append a system message to the transcript.
    pub fn add_system_message(&mut self, content: impl Into<String>) {
        self.messages.push(Message::system(content));
    }

    /// The user-visible transcript.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// The step the agent is currently in.
    pub fn current_step(&self) -> Step {
        self.current_step
    }

    /// True while a run is in flight.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Request cancellation. Observed in the token loop and at iteration
    /// boundaries; a tool already executing runs to completion.
    pub fn stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }

    /// Handle for cancelling from another task while `run` holds the
    /// exclusive borrow.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: self.should_stop.clone(),
        }
    }

    /// Clear the conversation: both transcripts, all buffers, and the
    /// arena (every parse-time allocation is released).
    pub fn reset(&mut self) {
        self.arena.reset();
        self.messages.clear();
        self.working.clear();
        self.stream_parser.reset();
        self.response_buf.clear();
        self.thinking_buf.clear();
        self.current_step = Step::Idle;
        self.processing = false;
        self.should_stop.store(false, Ordering::SeqCst);
    }

    /// Build the system prompt for the current iteration: the template
    /// selected by the `japanese` option with the tools schema substituted,
    /// plus the custom suffix when set.
    pub fn build_system_prompt(&self) -> String {
        let schema = if let Some(f) = self.options.tools_schema_fn() {
            f()
        } else if let Some(registry) = self.options.registry() {
            registry.schema_json(false)
        } else {
            String::new()
        };

        let template = if self.options.japanese() {
            SYSTEM_PROMPT_JA
        } else {
            SYSTEM_PROMPT_EN
        };
        let mut prompt = template.replace("{tools_schema}", &schema);

        if let Some(custom) = self.options.custom_system_prompt() {
            prompt.push_str("\n\n");
            prompt.push_str(custom);
        }
        prompt
    }

    fn set_step(&mut self, step: Step, tool_name: Option<&str>) {
        self.current_step = step;
        self.options.hooks().emit_step(step, tool_name);
    }

    /// Drive the conversation until the model stops requesting tools.
    ///
    /// Returns the final assistant text plus everything the run produced;
    /// hitting the iteration cap is reported through
    /// [`RunStatus::MaxIterations`] on the result (the partial response is
    /// still populated). Cancellation yields [`Error::Cancelled`]; a
    /// generator failure propagates as its error.
    pub async fn run(&mut self) -> Result<RunResult> {
        if self.processing {
            return Err(Error::config("a run is already in progress"));
        }
        self.processing = true;
        self.should_stop.store(false, Ordering::SeqCst);
        self.thinking_buf.clear();

        self.working.clear();
        self.working.extend(self.messages.iter().cloned());

        let mut all_tool_calls: Vec<ToolCall> = Vec::new();
        let mut iterations: u32 = 0;
        let mut has_tool_call = true;
        let mut run_error: Option<Error> = None;

        while has_tool_call && iterations < self.options.max_iterations() {
            iterations += 1;
            log::debug!("iteration {iterations} of {}", self.options.max_iterations());

            match self.process_iteration(&mut all_tool_calls).await {
                Ok(had_call) => has_tool_call = had_call,
                Err(e) => {
                    run_error = Some(e);
                    break;
                }
            }

            if self.should_stop.load(Ordering::SeqCst) {
                run_error = Some(Error::Cancelled);
                break;
            }
        }

        self.processing = false;
        self.set_step(Step::Idle, None);

        if let Some(e) = run_error {
            log::debug!("run ended with error after {iterations} iteration(s): {e}");
            return Err(e);
        }

        let status = if has_tool_call {
            log::debug!("iteration cap reached with a tool call still pending");
            RunStatus::MaxIterations
        } else {
            RunStatus::Completed
        };

        // The final assistant answer is the last assistant message the run
        // appended to the working history.
        let response = self
            .working
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let thinking = if self.thinking_buf.is_empty() {
            None
        } else {
            Some(self.thinking_buf.clone())
        };

        // Promote the final answer onto the permanent transcript with the
        // run's tool calls and thinking attached.
        if !response.is_empty() {
            let mut final_msg = Message::assistant(response.clone());
            final_msg.thinking = thinking.clone();
            final_msg.tool_calls = all_tool_calls.clone();
            self.messages.push(final_msg);
        }

        Ok(RunResult {
            response,
            thinking,
            tool_calls: all_tool_calls,
            iterations,
            status,
        })
    }

    /// One generate → parse → dispatch cycle. Returns whether the turn
    /// produced a tool call.
    async fn process_iteration(&mut self, all_tool_calls: &mut Vec<ToolCall>) -> Result<bool> {
        let system_prompt = self.build_system_prompt();

        self.set_step(Step::Generating, None);
        self.response_buf.clear();
        self.stream_parser.reset();

        let mut stream = self
            .options
            .generator()
            .generate(&self.working, &system_prompt)
            .await?;

        let mut forwarding = true;
        'generation: while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if self.should_stop.load(Ordering::SeqCst) {
                return Err(Error::Cancelled);
            }

            self.response_buf.push_str(&chunk);
            let events = self.stream_parser.feed(&chunk);

            // An unterminated <tool_call> in the accumulated response means
            // the model is mid-invocation: stop forwarding tokens.
            if forwarding && parser::has_incomplete_tool_call(&self.response_buf) {
                forwarding = false;
                self.set_step(Step::Thinking, None);
            }

            if forwarding {
                for event in events {
                    if let StreamEvent::Text(text) = event {
                        if !self.options.hooks().emit_token(&text) {
                            log::debug!("token callback requested early termination");
                            break 'generation;
                        }
                    }
                }
            }
        }
        drop(stream);

        if self.should_stop.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }

        // Batch-parse the accumulated response and convert the segments to
        // owned data; no arena borrow may cross the executor await below.
        let mut turn_texts: Vec<String> = Vec::new();
        let mut invocations: Vec<ToolCall> = Vec::new();
        {
            let segments = parser::parse_response(&self.arena, &self.response_buf);
            for segment in &segments {
                match segment {
                    Segment::Text(text) => turn_texts.push((*text).to_string()),
                    Segment::Thinking(thinking) => self.thinking_buf.push_str(thinking),
                    Segment::ToolCall(tc) => invocations.push(ToolCall {
                        id: Uuid::new_v4(),
                        name: tc.name.to_string(),
                        arguments: tc.arguments.to_json(),
                    }),
                }
            }
        }

        let has_tool_call = !invocations.is_empty();

        for tool_call in &invocations {
            self.options.hooks().emit_tool_call(&tool_call.name);
            self.set_step(Step::CallingTool, Some(&tool_call.name));
            log::debug!("dispatching tool '{}'", tool_call.name);

            let output = match self
                .options
                .executor()
                .execute(&tool_call.name, &tool_call.arguments)
                .await
            {
                Ok(output) => output,
                // Executor failures surface to the model as error results;
                // the loop keeps going so the model can react.
                Err(e) => ToolOutput::error(e.to_string()),
            };

            let max_len = self.options.max_tool_result_len();
            if output.content.len() > max_len {
                log::debug!(
                    "truncating tool result from {} to {} bytes",
                    output.content.len(),
                    max_len
                );
            }
            let content = truncate_with_ellipsis(&output.content, max_len).into_owned();

            let result = ToolResult {
                id: Uuid::new_v4(),
                tool_call_id: tool_call.id,
                content: content.clone(),
                is_error: output.is_error,
            };
            self.set_step(Step::WaitingForResult, None);

            let mut tool_msg = Message::tool(content);
            tool_msg.tool_results = vec![result];
            self.working.push(tool_msg);

            all_tool_calls.push(tool_call.clone());
        }

        // Text segments join with single spaces into the turn's text. A
        // tool-call-only turn appends no assistant message.
        let turn_text = turn_texts.join(" ");
        if !turn_text.is_empty() || !has_tool_call {
            let mut assistant_msg = Message::assistant(turn_text);
            if !self.thinking_buf.is_empty() {
                assistant_msg.thinking = Some(self.thinking_buf.clone());
            }
            if has_tool_call {
                assistant_msg.tool_calls = invocations.clone();
            }
            self.working.push(assistant_msg);
        }

        Ok(has_tool_call)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("messages", &self.messages.len())
            .field("working", &self.working.len())
            .field("step", &self.current_step)
            .field("processing", &self.processing)
            .finish()
    }
}

/// Render a tool call for display: `Tool: name` plus an argument list,
/// localized like the system-prompt templates.
pub fn format_tool_call(tool_call: &ToolCall, japanese: bool) -> String {
    let mut out = String::new();
    out.push_str(if japanese { "ツール: " } else { "Tool: " });
    out.push_str(&tool_call.name);

    if let serde_json::Value::Object(map) = &tool_call.arguments {
        if !map.is_empty() {
            out.push('\n');
            out.push_str(if japanese { "引数:\n" } else { "Arguments:\n" });
            for (key, value) in map {
                out.push_str("  - ");
                out.push_str(key);
                out.push_str(": ");
                match value {
                    serde_json::Value::String(s) => out.push_str(s),
                    other => out.push_str(&other.to_string()),
                }
                out.push('\n');
            }
        }
    }
    out
}
