//! Embedded AI Horde text worker.
//!
//! Runs inside the server process and feeds cluster jobs through the same
//! coordinator as local HTTP clients, so one engine slot serves both.

#![deny(unsafe_code)]

pub mod client;
pub mod penalty;
pub mod worker;

pub use client::{DEFAULT_CLUSTER, HordeClient, HordeError};
pub use penalty::{Escalation, PenaltyState};
pub use worker::{HordeWorker, WorkerConfig};
