//! The world boundary of the Foreman engine.
//!
//! The engine never talks to the host simulation directly; everything goes
//! through the [`WorldAdapter`] trait defined here. The trait is deliberately
//! narrow: entity queries, the asynchronous pathfinder, mining, persistent
//! walking commands, prototype attribute lookups, debug rendering, and the
//! tick counter.
//!
//! # Modules
//!
//! - [`adapter`] -- The [`WorldAdapter`] trait and its auxiliary parameter
//!   structs.
//! - [`prototypes`] -- Process-wide lazy cache of prototype attributes.
//! - [`sim`] -- [`SimWorld`], a deterministic in-memory world used by the
//!   test suite and available to embedders as a reference implementation.
//! - [`error`] -- [`WorldError`].
//!
//! [`WorldAdapter`]: adapter::WorldAdapter
//! [`SimWorld`]: sim::SimWorld
//! [`WorldError`]: error::WorldError

pub mod adapter;
pub mod error;
pub mod prototypes;
pub mod sim;

pub use adapter::{TextRenderParams, WorldAdapter};
pub use error::WorldError;
pub use prototypes::PrototypeCache;
pub use sim::{SimEntitySpec, SimPathResponse, SimWorld};
