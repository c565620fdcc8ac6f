//! Lesson report interview engine
//!
//! Drives the multi-turn report wizard tutors answer after a lesson: one
//! student for individual lessons, every student of the roster for group
//! lessons. Answers are written as they arrive and the interview can be
//! resumed from durable session state after a restart.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
mod flows;
pub mod notify;
pub mod prompts;
pub mod session_store;
pub mod state;
pub mod store;

pub use engine::{Engine, EngineError};
pub use state::AppState;
