//! Plays a small branching story through the controller, end to end:
//! load, continue, choose, snapshot, restore. The engine here is a toy that
//! understands plain lines, `* text -> label` choices and `= label` marks,
//! just enough to drive the controller's full surface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use kataribe::{
    Choice, ContentUnit, EngineError, EngineFactory, ErrorHandler, ExternalFn, FunctionResult,
    MemoryFs, Player, ScriptValue, Step, StoryEngine, VariableObserver,
};

const STORY: &str = "
Hello.
* Go -> end
* Stay -> stay
= stay
You stay.
= end
";

#[derive(Clone)]
enum Node {
    Line(String),
    Choices(Vec<(String, usize)>),
}

#[derive(Serialize, Deserialize)]
struct DemoState {
    pc: usize,
    text: String,
    variables: HashMap<String, ScriptValue>,
}

struct DemoEngine {
    nodes: Vec<Node>,
    labels: HashMap<String, usize>,
    pc: usize,
    text: String,
    variables: HashMap<String, ScriptValue>,
}

struct DemoFactory;

impl EngineFactory for DemoFactory {
    type Engine = DemoEngine;

    fn construct(&self, content: &str) -> Result<Self::Engine, EngineError> {
        let mut labels = HashMap::new();
        let mut raw_choices: Vec<Vec<(String, String)>> = Vec::new();

        // First pass: gather nodes and label positions.
        let mut nodes: Vec<Node> = Vec::new();
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(label) = line.strip_prefix("= ") {
                labels.insert(label.to_string(), nodes.len());
            } else if let Some(rest) = line.strip_prefix("* ") {
                let (text, target) = rest
                    .rsplit_once(" -> ")
                    .ok_or_else(|| EngineError::Compile(format!("bad choice: {line}")))?;
                let option = (text.trim().to_string(), target.trim().to_string());
                if let (Some(Node::Choices(_)), Some(pending)) =
                    (nodes.last(), raw_choices.last_mut())
                {
                    pending.push(option);
                } else {
                    raw_choices.push(vec![option]);
                    nodes.push(Node::Choices(Vec::new()));
                }
            } else {
                nodes.push(Node::Line(format!("{line}\n")));
            }
        }

        // Second pass: resolve choice targets.
        let end = nodes.len();
        let mut pending = raw_choices.into_iter();
        for node in &mut nodes {
            if let Node::Choices(options) = node {
                for (text, target) in pending.next().unwrap_or_default() {
                    let pos = if target == "END" {
                        end
                    } else {
                        *labels
                            .get(&target)
                            .ok_or_else(|| EngineError::Compile(format!("no label {target}")))?
                    };
                    options.push((text, pos));
                }
            }
        }

        Ok(DemoEngine {
            nodes,
            labels,
            pc: 0,
            text: String::new(),
            variables: HashMap::new(),
        })
    }
}

impl StoryEngine for DemoEngine {
    fn can_continue(&self) -> bool {
        matches!(self.nodes.get(self.pc), Some(Node::Line(_)))
    }

    fn advance(&mut self) -> Result<ContentUnit, EngineError> {
        match self.nodes.get(self.pc) {
            Some(Node::Line(text)) => {
                self.text = text.clone();
                self.pc += 1;
                Ok(ContentUnit::new(text.clone(), Vec::new()))
            }
            _ => Err(EngineError::Runtime("cannot continue".into())),
        }
    }

    fn current_text(&self) -> String {
        self.text.clone()
    }

    fn current_tags(&self) -> Vec<String> {
        Vec::new()
    }

    fn global_tags(&self) -> Vec<String> {
        Vec::new()
    }

    fn current_choices(&self) -> Vec<Choice> {
        match self.nodes.get(self.pc) {
            Some(Node::Choices(options)) => options
                .iter()
                .enumerate()
                .map(|(index, (text, _))| Choice {
                    index,
                    text: text.clone(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn choose_choice_index(&mut self, index: usize) -> Result<(), EngineError> {
        match self.nodes.get(self.pc) {
            Some(Node::Choices(options)) => {
                let (_, target) = options
                    .get(index)
                    .ok_or_else(|| EngineError::Runtime("bad choice index".into()))?;
                self.pc = *target;
                Ok(())
            }
            _ => Err(EngineError::Runtime("no choices pending".into())),
        }
    }

    fn choose_path(&mut self, path: &str) -> Result<(), EngineError> {
        self.pc = *self
            .labels
            .get(path)
            .ok_or_else(|| EngineError::Runtime(format!("unknown path {path}")))?;
        Ok(())
    }

    fn switch_flow(&mut self, _name: &str) -> Result<(), EngineError> {
        Err(EngineError::Runtime("demo engine has no flows".into()))
    }

    fn switch_to_default_flow(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn remove_flow(&mut self, _name: &str) -> Result<(), EngineError> {
        Err(EngineError::Runtime("demo engine has no flows".into()))
    }

    fn variable(&self, name: &str) -> Option<ScriptValue> {
        self.variables.get(name).cloned()
    }

    fn set_variable(&mut self, name: &str, value: ScriptValue) -> Result<(), EngineError> {
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    fn observe_variable(&mut self, _name: &str, _observer: VariableObserver) {}

    fn remove_variable_observer(&mut self, _name: &str) {}

    fn bind_external_function(
        &mut self,
        _name: &str,
        _func: ExternalFn,
        _lookahead_safe: bool,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn unbind_external_function(&mut self, _name: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn evaluate_function(
        &mut self,
        name: &str,
        _args: &[ScriptValue],
    ) -> Result<FunctionResult, EngineError> {
        Err(EngineError::Runtime(format!("unknown function {name}")))
    }

    fn export_state(&self) -> Result<String, EngineError> {
        let state = DemoState {
            pc: self.pc,
            text: self.text.clone(),
            variables: self.variables.clone(),
        };
        serde_json::to_string(&state).map_err(|e| EngineError::Runtime(e.to_string()))
    }

    fn restore_state(&mut self, snapshot: &str) -> Result<(), EngineError> {
        let state: DemoState =
            serde_json::from_str(snapshot).map_err(|e| EngineError::InvalidState(e.to_string()))?;
        self.pc = state.pc;
        self.text = state.text;
        self.variables = state.variables;
        Ok(())
    }

    fn visit_count_at_path(&self, _path: &str) -> u32 {
        0
    }

    fn tags_for_content_at_path(&self, _path: &str) -> Vec<String> {
        Vec::new()
    }

    fn set_error_handler(&mut self, _handler: ErrorHandler) {}
}

fn main() -> anyhow::Result<()> {
    let mut player = Player::new(DemoFactory, MemoryFs::new());
    player.on_continued(|text, _tags| print!("  {text}"));
    player.on_ended(|| println!("  -- the end --"));

    player.load_story(STORY)?;
    player.set_variable("visits", ScriptValue::Int(1))?;

    loop {
        match player.continue_story()? {
            Step::Line(_) => {}
            Step::Choices(choices) => {
                for choice in &choices {
                    println!("  [{}] {}", choice.index, choice.text);
                }
                // Snapshot at the decision point, then take "Stay".
                player.save_state("decision.sav")?;
                player.choose_choice_index(1)?;
            }
            Step::End => break,
        }
    }

    // Rewind to the saved decision and take the other branch.
    println!("  (rewinding)");
    player.load_state("decision.sav")?;
    let mut step = player.choose_and_continue(0)?;
    while !step.is_end() {
        step = player.continue_story()?;
    }

    Ok(())
}
