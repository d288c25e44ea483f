//! Process engine boundary for flowbench
//!
//! This crate provides:
//! - The `Engine` trait the benchmark harness drives
//! - Process definitions (service tasks, user task groups, gateways)
//! - The built-in benchmark processes
//! - `EmbeddedEngine`, a sled-backed implementation of `Engine`

pub mod definition;
pub mod engine;
pub mod error;
pub mod processes;
pub mod store;

pub use definition::{Activity, Branch, Completion, ProcessDefinition, Step};
pub use engine::{Engine, InstanceId, Variables, WorkItem, WorkSelector};
pub use error::EngineError;
pub use store::{EmbeddedEngine, EngineOptions, EngineStats, HistoricInstance, HistoryLevel};
