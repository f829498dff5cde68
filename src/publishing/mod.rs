pub mod machine;
pub mod orchestrator;
pub mod polling;
pub mod recorder;
pub mod scheduler;
pub mod selector;

pub use machine::{ItemOutcome, ItemPublisher, ItemReport};
pub use orchestrator::{BatchReport, Orchestrator};
