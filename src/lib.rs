pub mod app;
pub mod changes;
pub mod config;
pub mod execution;
pub mod feedback;
pub mod history;
pub mod project;
pub mod rounds;
pub mod scaffold;
pub mod shared;
pub mod snapshot;
pub mod state;
pub mod verification;
pub mod workflow;
