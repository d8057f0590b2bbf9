//! Lifecycle engine for managed IT assets: depreciation boards, health and
//! renewal scoring, deadline alert sweeps and contract invoicing.
//!
//! Persistence, notification delivery and document rendering are reached
//! through the collaborator traits in [`store`] and [`outbound`]; the
//! in-memory store in [`store::memory`] backs the worker binary and the tests.

pub mod config;
pub mod error;
pub mod import;
pub mod outbound;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod workflows;
