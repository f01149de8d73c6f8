//! # kataribe
//!
//! A playback controller for compiled interactive-narrative scripts. The
//! controller drives an opaque story engine forward line-by-line, surfaces
//! pending choices, lets the host select one, switches between named flows,
//! persists and restores the execution position, and bridges story variables
//! and native functions between host code and script.
//!
//! The engine itself, including parsing and control flow inside the script
//! language, is a collaborator consumed through the [`StoryEngine`] and
//! [`EngineFactory`] traits. File access goes through [`StoryFs`], which
//! separates read-only content storage from writable user storage.
//!
//! ## Quick start
//!
//! ```rust
//! use kataribe::{EngineFactory, Player, PlayerResult, Step, StoryFs};
//!
//! fn play<F: EngineFactory, S: StoryFs>(
//!     player: &mut Player<F, S>,
//!     source: &str,
//! ) -> PlayerResult<()> {
//!     player.load_story(source)?;
//!     loop {
//!         match player.continue_story()? {
//!             Step::Line(unit) => println!("{}", unit.text),
//!             Step::Choices(_) => {
//!                 // Present the choices, then select one
//!                 player.choose_choice_index(0)?;
//!             }
//!             Step::End => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Hosts that prefer push delivery can register per-kind observers with
//! [`Player::on_continued`], [`Player::on_choices`], [`Player::on_ended`] and
//! [`Player::on_error`]; each `continue_story` call fires exactly one of the
//! first three.

pub mod engine;
pub mod error;
pub mod player;
pub mod storage;
pub mod types;
pub mod vfs;

pub use engine::{
    EngineError, EngineFactory, ErrorHandler, ErrorSeverity, ExternalFn, FunctionResult,
    StoryEngine, VariableObserver,
};
pub use error::{PlayerError, PlayerResult};
pub use player::Player;
pub use types::{Choice, ContentUnit, ScriptValue, Step};
pub use vfs::{DiskFs, MemoryFs, StoryFs, CONTENT_SCHEME, USER_SCHEME};
