pub mod model;
pub mod store;

pub use model::{RoundStatus, RoundStatusMap, SessionState, SessionStatus};
pub use store::{FileStateStore, StateError, StateStore};
