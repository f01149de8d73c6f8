//! Engine Adapter contract
//!
//! The playback controller drives an opaque story-execution engine through
//! the [`StoryEngine`] trait and constructs one from compiled source text
//! through [`EngineFactory`]. List evaluation, containers, and control flow
//! inside the script language are entirely the engine's business; the
//! controller only orchestrates.

use crate::types::{Choice, ContentUnit, ScriptValue};
use thiserror::Error;

/// Severity of an engine-reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Runtime error
    Error,
    /// Runtime warning
    Warning,
    /// Authoring-time diagnostic, never shown to runtime hosts
    Author,
}

/// Errors returned by the engine adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The source content was rejected during construction
    #[error("compile error: {0}")]
    Compile(String),

    /// A runtime operation failed
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A state snapshot was rejected
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Callback invoked when an observed variable changes.
pub type VariableObserver = Box<dyn FnMut(&str, &ScriptValue)>;

/// Native function callable from script.
///
/// The single variadic signature replaces per-arity overloads; argument
/// count and type validation happen inside the engine adapter.
pub type ExternalFn = Box<dyn FnMut(&[ScriptValue]) -> ScriptValue>;

/// Callback through which the engine reports mid-execution problems.
pub type ErrorHandler = Box<dyn FnMut(&str, ErrorSeverity)>;

/// Result of evaluating a script function outside normal playback.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResult {
    /// The function's return value
    pub value: ScriptValue,
    /// Text the function emitted while evaluating
    pub text_output: String,
}

/// One loaded story execution.
///
/// Adapter-side invariants the controller relies on:
/// - `choose_path` and `restore_state` never partially apply: on failure the
///   execution position is exactly what it was before the call.
/// - External functions bound with `lookahead_safe = false` are never invoked
///   during internal glue/lookahead passes.
/// - Multiple observers may be registered per variable name; the engine does
///   not deduplicate them.
pub trait StoryEngine {
    /// Whether a forward-advance step would produce content
    fn can_continue(&self) -> bool;

    /// Advance one step and return the produced content unit
    fn advance(&mut self) -> Result<ContentUnit, EngineError>;

    /// Text of the most recently produced content unit
    fn current_text(&self) -> String;

    /// Tags of the most recently produced content unit
    fn current_tags(&self) -> Vec<String>;

    /// Tags attached to the story as a whole
    fn global_tags(&self) -> Vec<String>;

    /// Choices pending at the current pause point; empty unless paused
    fn current_choices(&self) -> Vec<Choice>;

    /// Select a choice from the current list
    fn choose_choice_index(&mut self, index: usize) -> Result<(), EngineError>;

    /// Jump execution to a dot-separated content address
    fn choose_path(&mut self, path: &str) -> Result<(), EngineError>;

    /// Switch to the named flow, creating it if necessary
    fn switch_flow(&mut self, name: &str) -> Result<(), EngineError>;

    /// Switch back to the default flow
    fn switch_to_default_flow(&mut self) -> Result<(), EngineError>;

    /// Remove a named flow; removing the active flow is an engine error
    fn remove_flow(&mut self, name: &str) -> Result<(), EngineError>;

    /// Current value of a story variable, `None` when undefined
    fn variable(&self, name: &str) -> Option<ScriptValue>;

    /// Set a story variable
    fn set_variable(&mut self, name: &str, value: ScriptValue) -> Result<(), EngineError>;

    /// Register a change observer for a variable name
    fn observe_variable(&mut self, name: &str, observer: VariableObserver);

    /// Remove all observers registered for a variable name
    fn remove_variable_observer(&mut self, name: &str);

    /// Bind a native function callable from script
    fn bind_external_function(
        &mut self,
        name: &str,
        func: ExternalFn,
        lookahead_safe: bool,
    ) -> Result<(), EngineError>;

    /// Release a previously bound native function
    fn unbind_external_function(&mut self, name: &str) -> Result<(), EngineError>;

    /// Evaluate a script-defined function directly, outside normal playback.
    ///
    /// Must not move the main playback position or touch the current
    /// text/choice state; variable mutations the function performs persist.
    fn evaluate_function(
        &mut self,
        name: &str,
        args: &[ScriptValue],
    ) -> Result<FunctionResult, EngineError>;

    /// Serialize the full execution position to an opaque snapshot string
    fn export_state(&self) -> Result<String, EngineError>;

    /// Replace the execution position from a snapshot string
    fn restore_state(&mut self, snapshot: &str) -> Result<(), EngineError>;

    /// How many times the content at `path` has been visited
    fn visit_count_at_path(&self, path: &str) -> u32;

    /// Tags authored on the content at `path`, independent of position
    fn tags_for_content_at_path(&self, path: &str) -> Vec<String>;

    /// Register the callback through which the engine reports problems
    fn set_error_handler(&mut self, handler: ErrorHandler);
}

/// Constructs story executions from compiled source content.
pub trait EngineFactory {
    /// The engine type this factory produces
    type Engine: StoryEngine;

    /// Build a new execution from source content
    fn construct(&self, content: &str) -> Result<Self::Engine, EngineError>;
}
