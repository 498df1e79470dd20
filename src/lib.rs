//! mail2repo — turns inbound email into versioned file commits.

pub mod config;
pub mod error;
pub mod hosting;
pub mod intent;
pub mod mailbox;
pub mod orchestrator;
pub mod pump;
pub mod subject;
