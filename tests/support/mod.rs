//! Scripted reference engine for integration tests
//!
//! Implements `StoryEngine` over a tiny line-oriented script format, enough
//! to exercise every controller operation against real engine behavior:
//!
//! ```text
//! # global-tag              (before any content)
//! Hello. #greeting          (a content line; ` #word` suffixes become tags)
//! * Go -> end               (choice options; consecutive stars form one set)
//! * Stay -> stay
//! = stay                    (label, addressable via choose_path)
//! You stay.
//! = end
//! @call beep -> result      (invoke a bound external function, store result)
//! fn gold = 42 | Checked.   (script function: literal return, text output)
//! fn bless = set blessed true
//! ! message                 (engine error report; !w warning, !a author)
//! ```
//!
//! Each emitted line gets a trailing newline. Snapshots are JSON over the
//! full mutable state (flows, visit counts, variables) and restore is
//! all-or-nothing.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use kataribe::{
    Choice, ContentUnit, EngineError, EngineFactory, ErrorHandler, ErrorSeverity, ExternalFn,
    FunctionResult, ScriptValue, StoryEngine, VariableObserver,
};

const DEFAULT_FLOW: &str = "DEFAULT";

#[derive(Debug, Clone)]
enum Node {
    Line { text: String, tags: Vec<String> },
    Choices(Vec<ChoiceDef>),
    Call { func: String, store: Option<String> },
    Report { message: String, severity: Severity },
}

#[derive(Debug, Clone)]
struct ChoiceDef {
    text: String,
    target: usize,
}

#[derive(Debug, Clone, Copy)]
enum Severity {
    Error,
    Warning,
    Author,
}

#[derive(Debug, Clone)]
enum FnBody {
    Literal {
        value: ScriptValue,
        text: String,
    },
    SetVar {
        name: String,
        value: ScriptValue,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct FlowState {
    pc: usize,
    text: String,
    tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EngineState {
    current_flow: String,
    flows: BTreeMap<String, FlowState>,
    variables: BTreeMap<String, ScriptValue>,
    visits: BTreeMap<String, u32>,
}

impl Default for EngineState {
    fn default() -> Self {
        let mut flows = BTreeMap::new();
        flows.insert(DEFAULT_FLOW.to_string(), FlowState::default());
        Self {
            current_flow: DEFAULT_FLOW.to_string(),
            flows,
            variables: BTreeMap::new(),
            visits: BTreeMap::new(),
        }
    }
}

pub struct ScriptedEngine {
    nodes: Vec<Node>,
    labels: HashMap<String, usize>,
    labels_at: HashMap<usize, Vec<String>>,
    global_tags: Vec<String>,
    functions: HashMap<String, FnBody>,
    state: EngineState,
    externals: HashMap<String, ExternalFn>,
    observers: HashMap<String, Vec<VariableObserver>>,
    error_handler: Option<ErrorHandler>,
}

impl ScriptedEngine {
    fn parse(source: &str) -> Result<Self, EngineError> {
        struct RawChoice {
            text: String,
            target: String,
        }
        enum RawNode {
            Line { text: String, tags: Vec<String> },
            Choices(Vec<RawChoice>),
            Call { func: String, store: Option<String> },
            Report { message: String, severity: Severity },
        }

        let mut raw: Vec<RawNode> = Vec::new();
        let mut labels: HashMap<String, usize> = HashMap::new();
        let mut global_tags = Vec::new();
        let mut functions = HashMap::new();
        let mut seen_content = false;

        for line in source.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(tag) = line.strip_prefix("# ") {
                if !seen_content {
                    global_tags.push(tag.to_string());
                }
                continue;
            }
            seen_content = true;
            if let Some(label) = line.strip_prefix("= ") {
                if labels.insert(label.to_string(), raw.len()).is_some() {
                    return Err(EngineError::Compile(format!("duplicate label '{label}'")));
                }
            } else if let Some(rest) = line.strip_prefix("* ") {
                let (text, target) = rest
                    .rsplit_once(" -> ")
                    .ok_or_else(|| EngineError::Compile(format!("choice without target: {line}")))?;
                let option = RawChoice {
                    text: text.trim().to_string(),
                    target: target.trim().to_string(),
                };
                match raw.last_mut() {
                    Some(RawNode::Choices(options)) => options.push(option),
                    _ => raw.push(RawNode::Choices(vec![option])),
                }
            } else if let Some(rest) = line.strip_prefix("@call ") {
                let (func, store) = match rest.split_once(" -> ") {
                    Some((f, var)) => (f.trim().to_string(), Some(var.trim().to_string())),
                    None => (rest.trim().to_string(), None),
                };
                raw.push(RawNode::Call { func, store });
            } else if let Some(rest) = line.strip_prefix("fn ") {
                let (name, body) = rest
                    .split_once(" = ")
                    .ok_or_else(|| EngineError::Compile(format!("bad function def: {line}")))?;
                let body = if let Some(assign) = body.strip_prefix("set ") {
                    let (var, value) = assign
                        .split_once(' ')
                        .ok_or_else(|| EngineError::Compile(format!("bad set body: {line}")))?;
                    FnBody::SetVar {
                        name: var.to_string(),
                        value: parse_value(value)?,
                    }
                } else {
                    let (value, text) = match body.split_once(" | ") {
                        Some((v, t)) => (v, format!("{t}\n")),
                        None => (body, String::new()),
                    };
                    FnBody::Literal {
                        value: parse_value(value)?,
                        text,
                    }
                };
                functions.insert(name.to_string(), body);
            } else if let Some(message) = line.strip_prefix("!a ") {
                raw.push(RawNode::Report {
                    message: message.to_string(),
                    severity: Severity::Author,
                });
            } else if let Some(message) = line.strip_prefix("!w ") {
                raw.push(RawNode::Report {
                    message: message.to_string(),
                    severity: Severity::Warning,
                });
            } else if let Some(message) = line.strip_prefix("! ") {
                raw.push(RawNode::Report {
                    message: message.to_string(),
                    severity: Severity::Error,
                });
            } else {
                let mut parts = line.split(" #");
                let text = parts.next().unwrap_or_default().trim().to_string();
                let tags = parts.map(|t| t.trim().to_string()).collect();
                raw.push(RawNode::Line { text, tags });
            }
        }

        let end = raw.len();
        let resolve = |target: &str| -> Result<usize, EngineError> {
            if target == "END" {
                return Ok(end);
            }
            labels
                .get(target)
                .copied()
                .ok_or_else(|| EngineError::Compile(format!("undefined label '{target}'")))
        };

        let nodes = raw
            .into_iter()
            .map(|node| {
                Ok(match node {
                    RawNode::Line { text, tags } => Node::Line { text, tags },
                    RawNode::Call { func, store } => Node::Call { func, store },
                    RawNode::Report { message, severity } => Node::Report { message, severity },
                    RawNode::Choices(options) => Node::Choices(
                        options
                            .into_iter()
                            .map(|o| {
                                Ok(ChoiceDef {
                                    text: o.text,
                                    target: resolve(&o.target)?,
                                })
                            })
                            .collect::<Result<Vec<_>, EngineError>>()?,
                    ),
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        let mut labels_at: HashMap<usize, Vec<String>> = HashMap::new();
        for (label, pos) in &labels {
            labels_at.entry(*pos).or_default().push(label.clone());
        }

        Ok(Self {
            nodes,
            labels,
            labels_at,
            global_tags,
            functions,
            state: EngineState::default(),
            externals: HashMap::new(),
            observers: HashMap::new(),
            error_handler: None,
        })
    }

    fn flow(&self) -> &FlowState {
        &self.state.flows[&self.state.current_flow]
    }

    fn flow_mut(&mut self) -> &mut FlowState {
        self.state
            .flows
            .get_mut(&self.state.current_flow)
            .expect("current flow always present")
    }

    /// First non-transparent node from the current position.
    fn peek(&self) -> Option<(usize, &Node)> {
        let mut pc = self.flow().pc;
        while pc < self.nodes.len() {
            match &self.nodes[pc] {
                Node::Call { .. } | Node::Report { .. } => pc += 1,
                node => return Some((pc, node)),
            }
        }
        None
    }

    fn record_visit(&mut self, pc: usize) {
        if let Some(labels) = self.labels_at.get(&pc) {
            for label in labels.clone() {
                *self.state.visits.entry(label).or_insert(0) += 1;
            }
        }
    }

    fn report(&mut self, message: &str, severity: Severity) {
        let severity = match severity {
            Severity::Error => ErrorSeverity::Error,
            Severity::Warning => ErrorSeverity::Warning,
            Severity::Author => ErrorSeverity::Author,
        };
        if let Some(handler) = self.error_handler.as_mut() {
            handler(message, severity);
        }
    }

    fn set_var_inner(&mut self, name: &str, value: ScriptValue) {
        self.state
            .variables
            .insert(name.to_string(), value.clone());
        if let Some(observers) = self.observers.get_mut(name) {
            for observer in observers.iter_mut() {
                observer(name, &value);
            }
        }
    }
}

fn parse_value(raw: &str) -> Result<ScriptValue, EngineError> {
    serde_json::from_str(raw).map_err(|e| EngineError::Compile(format!("bad value '{raw}': {e}")))
}

impl StoryEngine for ScriptedEngine {
    fn can_continue(&self) -> bool {
        matches!(self.peek(), Some((_, Node::Line { .. })))
    }

    fn advance(&mut self) -> Result<ContentUnit, EngineError> {
        loop {
            let pc = self.flow().pc;
            if pc >= self.nodes.len() {
                return Err(EngineError::Runtime("cannot continue".to_string()));
            }
            match self.nodes[pc].clone() {
                Node::Report { message, severity } => {
                    self.report(&message, severity);
                    self.record_visit(pc);
                    self.flow_mut().pc = pc + 1;
                }
                Node::Call { func, store } => {
                    let external = self
                        .externals
                        .get_mut(&func)
                        .ok_or_else(|| EngineError::Runtime(format!("unbound external '{func}'")))?;
                    let result = external(&[]);
                    if let Some(var) = store {
                        self.set_var_inner(&var, result);
                    }
                    self.record_visit(pc);
                    self.flow_mut().pc = pc + 1;
                }
                Node::Line { text, tags } => {
                    let unit = ContentUnit::new(format!("{text}\n"), tags);
                    self.record_visit(pc);
                    let flow = self.flow_mut();
                    flow.pc = pc + 1;
                    flow.text = unit.text.clone();
                    flow.tags = unit.tags.clone();
                    return Ok(unit);
                }
                Node::Choices(_) => {
                    return Err(EngineError::Runtime(
                        "cannot continue: waiting for a choice".to_string(),
                    ));
                }
            }
        }
    }

    fn current_text(&self) -> String {
        self.flow().text.clone()
    }

    fn current_tags(&self) -> Vec<String> {
        self.flow().tags.clone()
    }

    fn global_tags(&self) -> Vec<String> {
        self.global_tags.clone()
    }

    fn current_choices(&self) -> Vec<Choice> {
        match self.peek() {
            Some((_, Node::Choices(options))) => options
                .iter()
                .enumerate()
                .map(|(index, o)| Choice {
                    index,
                    text: o.text.clone(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn choose_choice_index(&mut self, index: usize) -> Result<(), EngineError> {
        let target = match self.peek() {
            Some((_, Node::Choices(options))) => options
                .get(index)
                .map(|o| o.target)
                .ok_or_else(|| EngineError::Runtime(format!("choice index {index} out of range")))?,
            _ => return Err(EngineError::Runtime("no choices pending".to_string())),
        };
        self.flow_mut().pc = target;
        Ok(())
    }

    fn choose_path(&mut self, path: &str) -> Result<(), EngineError> {
        let target = self
            .labels
            .get(path)
            .copied()
            .ok_or_else(|| EngineError::Runtime(format!("unknown path '{path}'")))?;
        self.flow_mut().pc = target;
        Ok(())
    }

    fn switch_flow(&mut self, name: &str) -> Result<(), EngineError> {
        self.state
            .flows
            .entry(name.to_string())
            .or_insert_with(FlowState::default);
        self.state.current_flow = name.to_string();
        Ok(())
    }

    fn switch_to_default_flow(&mut self) -> Result<(), EngineError> {
        self.state.current_flow = DEFAULT_FLOW.to_string();
        Ok(())
    }

    fn remove_flow(&mut self, name: &str) -> Result<(), EngineError> {
        if name == self.state.current_flow {
            return Err(EngineError::Runtime(format!(
                "cannot remove the active flow '{name}'"
            )));
        }
        if self.state.flows.remove(name).is_none() {
            return Err(EngineError::Runtime(format!("unknown flow '{name}'")));
        }
        Ok(())
    }

    fn variable(&self, name: &str) -> Option<ScriptValue> {
        self.state.variables.get(name).cloned()
    }

    fn set_variable(&mut self, name: &str, value: ScriptValue) -> Result<(), EngineError> {
        self.set_var_inner(name, value);
        Ok(())
    }

    fn observe_variable(&mut self, name: &str, observer: VariableObserver) {
        self.observers.entry(name.to_string()).or_default().push(observer);
    }

    fn remove_variable_observer(&mut self, name: &str) {
        self.observers.remove(name);
    }

    fn bind_external_function(
        &mut self,
        name: &str,
        func: ExternalFn,
        _lookahead_safe: bool,
    ) -> Result<(), EngineError> {
        self.externals.insert(name.to_string(), func);
        Ok(())
    }

    fn unbind_external_function(&mut self, name: &str) -> Result<(), EngineError> {
        self.externals
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::Runtime(format!("'{name}' is not bound")))
    }

    fn evaluate_function(
        &mut self,
        name: &str,
        _args: &[ScriptValue],
    ) -> Result<FunctionResult, EngineError> {
        let body = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::Runtime(format!("unknown function '{name}'")))?;
        match body {
            FnBody::Literal { value, text } => Ok(FunctionResult {
                value,
                text_output: text,
            }),
            FnBody::SetVar { name, value } => {
                self.set_var_inner(&name, value);
                Ok(FunctionResult {
                    value: ScriptValue::Null,
                    text_output: String::new(),
                })
            }
        }
    }

    fn export_state(&self) -> Result<String, EngineError> {
        serde_json::to_string(&self.state).map_err(|e| EngineError::Runtime(e.to_string()))
    }

    fn restore_state(&mut self, snapshot: &str) -> Result<(), EngineError> {
        // Fully parse before replacing anything so a bad snapshot cannot
        // leave a half-applied position behind.
        let state: EngineState = serde_json::from_str(snapshot)
            .map_err(|e| EngineError::InvalidState(e.to_string()))?;
        if !state.flows.contains_key(&state.current_flow) {
            return Err(EngineError::InvalidState(format!(
                "snapshot names missing flow '{}'",
                state.current_flow
            )));
        }
        self.state = state;
        Ok(())
    }

    fn visit_count_at_path(&self, path: &str) -> u32 {
        self.state.visits.get(path).copied().unwrap_or(0)
    }

    fn tags_for_content_at_path(&self, path: &str) -> Vec<String> {
        let Some(pos) = self.labels.get(path) else {
            return Vec::new();
        };
        let mut pc = *pos;
        while pc < self.nodes.len() {
            match &self.nodes[pc] {
                Node::Line { tags, .. } => return tags.clone(),
                Node::Call { .. } | Node::Report { .. } => pc += 1,
                Node::Choices(_) => break,
            }
        }
        Vec::new()
    }

    fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.error_handler = Some(handler);
    }
}

/// Factory producing [`ScriptedEngine`] executions.
pub struct ScriptedFactory;

impl EngineFactory for ScriptedFactory {
    type Engine = ScriptedEngine;

    fn construct(&self, content: &str) -> Result<Self::Engine, EngineError> {
        ScriptedEngine::parse(content)
    }
}

/// A controller over the scripted engine and an in-memory filesystem.
pub fn scripted_player() -> kataribe::Player<ScriptedFactory, kataribe::MemoryFs> {
    kataribe::Player::new(ScriptedFactory, kataribe::MemoryFs::new())
}
