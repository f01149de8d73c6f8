//! Shared data types for the playback controller

pub mod content;
pub mod value;

pub use content::{Choice, ContentUnit, Step};
pub use value::ScriptValue;
