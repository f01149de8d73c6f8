//! Narrative content produced by forward playback

use serde::{Deserialize, Serialize};

/// One emitted line of narrative text plus its tags.
///
/// Produced by a single forward-advance step and immutable afterwards; it is
/// never persisted on its own, only implicitly through the engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    /// The line of story text
    pub text: String,
    /// Tags attached to the line, in authoring order
    pub tags: Vec<String>,
}

impl ContentUnit {
    /// Create a content unit from text and tags
    pub fn new(text: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            text: text.into(),
            tags,
        }
    }
}

/// A selectable choice at the current pause point.
///
/// Indices are 0-based and stable only until the next successful selection or
/// story end; selecting invalidates the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Position within the current choice list
    pub index: usize,
    /// Display text for the choice
    pub text: String,
}

/// Outcome of one `continue` step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The story produced a line of content
    Line(ContentUnit),
    /// The story is paused on choices; select one before continuing
    Choices(Vec<Choice>),
    /// The story has ended
    End,
}

impl Step {
    /// Text of the produced line, if this step emitted one
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Line(unit) => Some(&unit.text),
            _ => None,
        }
    }

    /// Whether this step ended the story
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}
