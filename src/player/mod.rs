//! Playback controller
//!
//! [`Player`] owns at most one story execution and drives it through the
//! continue/choice/end state machine. The state is never cached: every call
//! re-derives it from the engine's `can_continue` predicate and choice count,
//! so the controller cannot drift from the actual engine position.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, error, warn};

use crate::engine::{
    EngineError, EngineFactory, ErrorSeverity, ExternalFn, StoryEngine, VariableObserver,
};
use crate::error::{PlayerError, PlayerResult};
use crate::storage;
use crate::types::{Choice, ScriptValue, Step};
#[cfg(test)]
use crate::types::ContentUnit;
use crate::vfs::StoryFs;

mod bridge;

use bridge::FunctionRegistry;

type ContinuedFn = Box<dyn FnMut(&str, &[String])>;
type ChoicesFn = Box<dyn FnMut(&[Choice])>;
type EndedFn = Box<dyn FnMut()>;
type ErrorFn = Box<dyn FnMut(&str, bool)>;

/// Observer lists, one per notification kind.
///
/// Each `continue_story` call fires exactly one of continued/choices/ended;
/// error notifications are relayed from the engine whenever it reports them.
#[derive(Default)]
struct Subscribers {
    continued: Vec<ContinuedFn>,
    choices: Vec<ChoicesFn>,
    ended: Vec<EndedFn>,
    error: Vec<ErrorFn>,
}

/// Queue the engine's error handler pushes into; drained after every engine
/// call so subscriber callbacks never run while the engine is borrowed.
type ReportQueue = Rc<RefCell<VecDeque<(String, ErrorSeverity)>>>;

/// The playback controller.
///
/// Generic over the engine factory that builds executions and the host
/// filesystem used for story content and saved state. All operations are
/// synchronous and meant for one logical thread of control; hosts running
/// from multiple threads must serialize their calls.
pub struct Player<F: EngineFactory, S: StoryFs> {
    factory: F,
    fs: S,
    engine: Option<F::Engine>,
    bindings: FunctionRegistry,
    subscribers: Subscribers,
    reports: ReportQueue,
}

impl<F: EngineFactory, S: StoryFs> Player<F, S> {
    /// Create a controller with no story loaded
    pub fn new(factory: F, fs: S) -> Self {
        Self {
            factory,
            fs,
            engine: None,
            bindings: FunctionRegistry::new(),
            subscribers: Subscribers::default(),
            reports: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    // ---- loading -------------------------------------------------------

    /// Load a story from compiled source content.
    ///
    /// Any previously loaded execution is discarded first, together with its
    /// external function bindings.
    pub fn load_story(&mut self, content: &str) -> PlayerResult<()> {
        self.reset();
        let mut engine = self.factory.construct(content).map_err(|e| match e {
            EngineError::Compile(message) => PlayerError::Parse(message),
            other => PlayerError::Engine(engine_message(other)),
        })?;
        let queue = Rc::clone(&self.reports);
        engine.set_error_handler(Box::new(move |message, severity| {
            queue.borrow_mut().push_back((message.to_string(), severity));
        }));
        self.engine = Some(engine);
        Ok(())
    }

    /// Load a story from a logical path in host storage
    pub fn load_story_from(&mut self, path: &str) -> PlayerResult<()> {
        let bytes = self.fs.read(path).map_err(|e| PlayerError::io(path, e))?;
        let content =
            String::from_utf8(bytes).map_err(|e| PlayerError::Parse(e.to_string()))?;
        self.load_story(&content)
    }

    /// Load a story and immediately restore a state snapshot.
    ///
    /// When loading fails the snapshot is not applied.
    pub fn load_story_and_set_state(&mut self, content: &str, snapshot: &str) -> PlayerResult<()> {
        self.load_story(content)?;
        self.set_state(snapshot)
    }

    /// Path-loading variant of [`Self::load_story_and_set_state`]
    pub fn load_story_from_and_set_state(
        &mut self,
        path: &str,
        snapshot: &str,
    ) -> PlayerResult<()> {
        self.load_story_from(path)?;
        self.set_state(snapshot)
    }

    /// Discard the current execution, if any
    pub fn reset(&mut self) {
        self.engine = None;
        self.bindings.clear();
        self.reports.borrow_mut().clear();
    }

    /// Whether a story execution is currently loaded
    pub fn is_loaded(&self) -> bool {
        self.engine.is_some()
    }

    // ---- playback ------------------------------------------------------

    /// Advance the story by one step.
    ///
    /// In the continuing state this produces one content unit and fires
    /// `continued`. Paused on choices it produces no text and fires
    /// `choices`; the host must select one before content resumes. Past the
    /// end it keeps firing `ended` idempotently.
    pub fn continue_story(&mut self) -> PlayerResult<Step> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        if engine.can_continue() {
            let advanced = engine.advance();
            self.pump_reports();
            let unit = advanced.map_err(|e| PlayerError::Engine(engine_message(e)))?;
            for f in &mut self.subscribers.continued {
                f(&unit.text, &unit.tags);
            }
            return Ok(Step::Line(unit));
        }

        let choices = engine.current_choices();
        self.pump_reports();
        if choices.is_empty() {
            for f in &mut self.subscribers.ended {
                f();
            }
            Ok(Step::End)
        } else {
            for f in &mut self.subscribers.choices {
                f(&choices);
            }
            Ok(Step::Choices(choices))
        }
    }

    /// Select a choice from the current list.
    ///
    /// Indices outside `[0, len)` are rejected before anything is forwarded,
    /// leaving the choice list unchanged.
    pub fn choose_choice_index(&mut self, index: usize) -> PlayerResult<()> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        let len = engine.current_choices().len();
        if index >= len {
            return Err(PlayerError::IndexOutOfRange { index, len });
        }
        let chosen = engine.choose_choice_index(index);
        self.pump_reports();
        chosen.map_err(|e| PlayerError::Engine(engine_message(e)))
    }

    /// Select a choice and advance one step in a single call
    pub fn choose_and_continue(&mut self, index: usize) -> PlayerResult<Step> {
        self.choose_choice_index(index)?;
        self.continue_story()
    }

    /// Jump execution to a dot-separated content address.
    ///
    /// On failure the prior position is left intact; the engine contract
    /// forbids partial application.
    pub fn choose_path(&mut self, path: &str) -> PlayerResult<()> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        let moved = engine.choose_path(path);
        self.pump_reports();
        moved.map_err(|e| PlayerError::Navigation {
            path: path.to_string(),
            message: engine_message(e),
        })
    }

    // ---- flows ---------------------------------------------------------

    /// Switch to the named flow
    pub fn switch_flow(&mut self, name: &str) -> PlayerResult<()> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        let switched = engine.switch_flow(name);
        self.pump_reports();
        switched.map_err(|e| PlayerError::Engine(engine_message(e)))
    }

    /// Switch back to the default flow
    pub fn switch_to_default_flow(&mut self) -> PlayerResult<()> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        let switched = engine.switch_to_default_flow();
        self.pump_reports();
        switched.map_err(|e| PlayerError::Engine(engine_message(e)))
    }

    /// Remove a named flow; removing the active flow is an engine error and
    /// is propagated, not swallowed
    pub fn remove_flow(&mut self, name: &str) -> PlayerResult<()> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        let removed = engine.remove_flow(name);
        self.pump_reports();
        removed.map_err(|e| PlayerError::Engine(engine_message(e)))
    }

    // ---- queries -------------------------------------------------------

    /// Whether a forward-advance step would produce content
    pub fn can_continue(&self) -> bool {
        self.engine.as_ref().is_some_and(StoryEngine::can_continue)
    }

    /// Whether choices are pending at the current pause point
    pub fn has_choices(&self) -> bool {
        self.engine
            .as_ref()
            .is_some_and(|e| !e.current_choices().is_empty())
    }

    /// Text of the most recently produced content unit
    pub fn current_text(&self) -> Option<String> {
        self.engine.as_ref().map(|e| e.current_text())
    }

    /// Tags of the most recently produced content unit
    pub fn current_tags(&self) -> Vec<String> {
        self.engine.as_ref().map(|e| e.current_tags()).unwrap_or_default()
    }

    /// Choices pending at the current pause point
    pub fn current_choices(&self) -> Vec<Choice> {
        self.engine
            .as_ref()
            .map(|e| e.current_choices())
            .unwrap_or_default()
    }

    /// Tags attached to the story as a whole
    pub fn global_tags(&self) -> Vec<String> {
        self.engine.as_ref().map(|e| e.global_tags()).unwrap_or_default()
    }

    /// Visit count for a content address; 0 when no story is loaded
    pub fn visit_count_at_path(&self, path: &str) -> u32 {
        self.engine
            .as_ref()
            .map_or(0, |e| e.visit_count_at_path(path))
    }

    /// Tags authored on the content at a path, independent of position
    pub fn tags_for_content_at_path(&self, path: &str) -> Vec<String> {
        self.engine
            .as_ref()
            .map(|e| e.tags_for_content_at_path(path))
            .unwrap_or_default()
    }

    // ---- variable & function bridge ------------------------------------

    /// Current value of a story variable.
    ///
    /// `None` is the absent sentinel, covering both an undefined variable
    /// and the no-story case.
    pub fn variable(&self, name: &str) -> Option<ScriptValue> {
        self.engine.as_ref().and_then(|e| e.variable(name))
    }

    /// Set a story variable. A no-op when no story is loaded.
    pub fn set_variable(&mut self, name: &str, value: ScriptValue) -> PlayerResult<()> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };
        let set = engine.set_variable(name, value);
        self.pump_reports();
        set.map_err(|e| PlayerError::Engine(engine_message(e)))
    }

    /// Register an observer for a variable name.
    ///
    /// Multiple independent observers per name are supported engine-side;
    /// the controller does not deduplicate.
    pub fn observe_variable(
        &mut self,
        name: &str,
        observer: impl FnMut(&str, &ScriptValue) + 'static,
    ) -> PlayerResult<()> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        engine.observe_variable(name, Box::new(observer) as VariableObserver);
        Ok(())
    }

    /// Remove all observers registered for a variable name
    pub fn remove_variable_observer(&mut self, name: &str) -> PlayerResult<()> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        engine.remove_variable_observer(name);
        Ok(())
    }

    /// Bind a native function callable from script.
    ///
    /// The name must be unique within the current execution; rebinding a
    /// live name fails with [`PlayerError::DuplicateBinding`] and leaves the
    /// original binding callable. Functions that have observable side
    /// effects must be bound with `lookahead_safe = false` so the engine
    /// keeps them out of its speculative glue passes.
    pub fn bind_function(
        &mut self,
        name: &str,
        func: impl FnMut(&[ScriptValue]) -> ScriptValue + 'static,
        lookahead_safe: bool,
    ) -> PlayerResult<()> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        self.bindings.claim(name)?;
        if let Err(e) = engine.bind_external_function(name, Box::new(func) as ExternalFn, lookahead_safe)
        {
            self.bindings.release_claim(name);
            return Err(PlayerError::Engine(engine_message(e)));
        }
        Ok(())
    }

    /// Release a bound native function, allowing the name to be rebound
    pub fn unbind_function(&mut self, name: &str) -> PlayerResult<()> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        engine
            .unbind_external_function(name)
            .map_err(|e| PlayerError::Engine(engine_message(e)))?;
        self.bindings.release(name);
        Ok(())
    }

    /// Evaluate a script-defined function outside normal playback.
    ///
    /// The playback position, current text, and pending choices are
    /// unaffected; variable mutations the function performs persist.
    pub fn evaluate_function(
        &mut self,
        name: &str,
        args: &[ScriptValue],
    ) -> PlayerResult<ScriptValue> {
        Ok(self.evaluate_function_with_output(name, args)?.0)
    }

    /// Evaluate a script-defined function and also collect the text it
    /// produced during evaluation
    pub fn evaluate_function_with_output(
        &mut self,
        name: &str,
        args: &[ScriptValue],
    ) -> PlayerResult<(ScriptValue, String)> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        let evaluated = engine.evaluate_function(name, args);
        self.pump_reports();
        let result = evaluated.map_err(|e| PlayerError::Engine(engine_message(e)))?;
        Ok((result.value, result.text_output))
    }

    // ---- state persistence ---------------------------------------------

    /// Serialize the current execution position to a snapshot string
    pub fn get_state(&self) -> PlayerResult<String> {
        let engine = self.engine.as_ref().ok_or(PlayerError::NoStoryLoaded)?;
        engine
            .export_state()
            .map_err(|e| PlayerError::Engine(engine_message(e)))
    }

    /// Replace the current execution position from a snapshot string.
    ///
    /// A malformed snapshot leaves the previous position intact.
    pub fn set_state(&mut self, snapshot: &str) -> PlayerResult<()> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NoStoryLoaded)?;
        storage::validate(snapshot)?;
        let restored = engine.restore_state(snapshot);
        self.pump_reports();
        restored.map_err(|e| PlayerError::MalformedState(engine_message(e)))
    }

    /// Save the current execution position to host storage
    pub fn save_state(&self, path: &str) -> PlayerResult<()> {
        let snapshot = self.get_state()?;
        self.fs
            .write(path, &storage::to_bytes(&snapshot))
            .map_err(|e| PlayerError::io(path, e))
    }

    /// Restore the execution position from host storage.
    ///
    /// A zero-length resource is tolerated as a silent no-op so that loading
    /// before any save exists does nothing.
    pub fn load_state(&mut self, path: &str) -> PlayerResult<()> {
        let bytes = self.fs.read(path).map_err(|e| PlayerError::io(path, e))?;
        match storage::from_bytes(&bytes)? {
            Some(snapshot) => self.set_state(&snapshot),
            None => {
                debug!("empty state resource at '{path}', position unchanged");
                Ok(())
            }
        }
    }

    // ---- notifications -------------------------------------------------

    /// Subscribe to content units produced by `continue_story`
    pub fn on_continued(&mut self, f: impl FnMut(&str, &[String]) + 'static) {
        self.subscribers.continued.push(Box::new(f));
    }

    /// Subscribe to pending choice lists
    pub fn on_choices(&mut self, f: impl FnMut(&[Choice]) + 'static) {
        self.subscribers.choices.push(Box::new(f));
    }

    /// Subscribe to story-end notifications
    pub fn on_ended(&mut self, f: impl FnMut() + 'static) {
        self.subscribers.ended.push(Box::new(f));
    }

    /// Subscribe to engine-reported errors and warnings.
    ///
    /// Without any subscriber, reports are written to the log instead;
    /// they are never dropped.
    pub fn on_error(&mut self, f: impl FnMut(&str, bool) + 'static) {
        self.subscribers.error.push(Box::new(f));
    }

    /// Deliver queued engine reports to error subscribers.
    ///
    /// Authoring-time diagnostics are filtered out before delivery.
    fn pump_reports(&mut self) {
        loop {
            let report = self.reports.borrow_mut().pop_front();
            let Some((message, severity)) = report else {
                break;
            };
            if severity == ErrorSeverity::Author {
                continue;
            }
            let is_warning = severity == ErrorSeverity::Warning;
            if self.subscribers.error.is_empty() {
                if is_warning {
                    warn!("story warning (no error subscriber registered): {message}");
                } else {
                    error!("story error (no error subscriber registered): {message}");
                }
            } else {
                for f in &mut self.subscribers.error {
                    f(&message, is_warning);
                }
            }
        }
    }
}

fn engine_message(e: EngineError) -> String {
    match e {
        EngineError::Compile(m) | EngineError::Runtime(m) | EngineError::InvalidState(m) => m,
    }
}
