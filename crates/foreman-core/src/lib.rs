//! Orchestration for the Foreman robot work engine.
//!
//! This crate owns the pieces that tie the task layer to a host world: the
//! agent manager and its per-tick scheduling loop, the job manager, the
//! above-head state display, engine configuration, and the [`Engine`] root
//! that holds all persisted state.
//!
//! # Modules
//!
//! - [`engine`] -- [`Engine`]: the persisted root and the tick loop.
//! - [`agent`] -- [`Agent`] records and [`AgentManager`].
//! - [`jobs`] -- [`Job`] records, [`JobData`] kinds, and [`JobManager`].
//! - [`display`] -- Idempotent above-head state text.
//! - [`config`] -- [`EngineConfig`] loaded from `foreman-config.yaml`.
//! - [`error`] -- [`EngineError`].
//!
//! [`Engine`]: engine::Engine
//! [`Agent`]: agent::Agent
//! [`AgentManager`]: agent::AgentManager
//! [`Job`]: jobs::Job
//! [`JobData`]: jobs::JobData
//! [`JobManager`]: jobs::JobManager
//! [`EngineConfig`]: config::EngineConfig
//! [`EngineError`]: error::EngineError

pub mod agent;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod jobs;

pub use agent::{Agent, AgentManager, NewAgentParams};
pub use config::{ConfigError, EngineConfig};
pub use display::StateDisplay;
pub use engine::Engine;
pub use error::EngineError;
pub use jobs::{Job, JobData, JobKind, JobManager};
