//! Expert profile domain: the record being built, run configuration,
//! requested actions and prompts.

pub mod actions;
pub mod configuration;
pub mod model;
pub mod prompts;

pub use actions::{PendingAction, RequestedAction, action_tools};
pub use configuration::{ProfileOverride, ResolvedConfig};
pub use model::{ExpertProfile, FieldValue, NOT_SET, ProfileField};
