//! Notification hooks for observing a run.
//!
//! All hooks are informational; the one exception is `on_token`, whose
//! `bool` return lets the host request cooperative termination of the
//! current generation (e.g. a user pressing stop in the UI).
//!
//! # Examples
//!
//! ```
//! use agent_loop::{AgentHooks, Step};
//!
//! let hooks = AgentHooks::new()
//!     .on_token(|token| {
//!         print!("{token}");
//!         true // keep generating
//!     })
//!     .on_step_change(|step, tool| {
//!         if step == Step::CallingTool {
//!             eprintln!("calling {}", tool.unwrap_or("?"));
//!         }
//!     });
//! # let _ = hooks;
//! ```

use crate::types::Step;
use std::sync::Arc;

/// Token callback: receives each user-visible text chunk; returning `false`
/// requests generation stop.
pub type TokenHook = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Tool-call callback: receives the tool name just before execution.
pub type ToolCallHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Step callback: receives every step transition, with the tool name when
/// the step is [`Step::CallingTool`].
pub type StepHook = Arc<dyn Fn(Step, Option<&str>) + Send + Sync>;

/// Container for the optional notification callbacks.
#[derive(Clone, Default)]
pub struct AgentHooks {
    on_token: Option<TokenHook>,
    on_tool_call: Option<ToolCallHook>,
    on_step_change: Option<StepHook>,
}

impl AgentHooks {
    /// No-op hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token callback.
    pub fn on_token<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.on_token = Some(Arc::new(f));
        self
    }

    /// Set the tool-call notification.
    pub fn on_tool_call<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_tool_call = Some(Arc::new(f));
        self
    }

    /// Set the step-change notification.
    pub fn on_step_change<F>(mut self, f: F) -> Self
    where
        F: Fn(Step, Option<&str>) + Send + Sync + 'static,
    {
        self.on_step_change = Some(Arc::new(f));
        self
    }

    /// Forward a text chunk; true means keep generating.
    pub(crate) fn emit_token(&self, token: &str) -> bool {
        match &self.on_token {
            Some(f) => f(token),
            None => true,
        }
    }

    /// Announce a tool call by name.
    pub(crate) fn emit_tool_call(&self, name: &str) {
        if let Some(f) = &self.on_tool_call {
            f(name);
        }
    }

    /// Announce a step transition.
    pub(crate) fn emit_step(&self, step: Step, tool_name: Option<&str>) {
        if let Some(f) = &self.on_step_change {
            f(step, tool_name);
        }
    }
}

impl std::fmt::Debug for AgentHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHooks")
            .field("on_token", &self.on_token.is_some())
            .field("on_tool_call", &self.on_tool_call.is_some())
            .field("on_step_change", &self.on_step_change.is_some())
            .finish()
    }
}
