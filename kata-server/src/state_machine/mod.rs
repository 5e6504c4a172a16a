//! Explicit state machine for submission moderation.
//!
//! The design separates:
//! - **State**: where a submission is in moderation (`ModerationState`)
//! - **Events**: what happened (`Event`)
//! - **Effects**: what to do about it (`Effect`)
//! - **Transition**: pure function `(State, Event) -> (State, Vec<Effect>)`
//!
//! The interpreter runs effects against the collaborator services and returns
//! result events, which are fed back through `transition`.

pub mod effect;
pub mod event;
pub mod interpreter;
pub mod repository;
pub mod state;
pub mod transition;

pub use effect::*;
pub use event::*;
pub use interpreter::{execute_effects, EffectOutcome};
pub use state::*;
pub use transition::*;
