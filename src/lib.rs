//! Expert Builder: a small conversation graph that helps a user define a
//! structured "Expert" profile (name, description, instructions) by chat.

pub mod config;
pub mod error;
pub mod expert;
pub mod graph;
pub mod llm;
pub mod memory;
pub mod session;
pub mod store;

pub use error::{Error, Result};
