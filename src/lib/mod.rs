//! A single-node container worker.
//!
//! Tasks are queued on a [`worker::types::Worker`], which reconciles each
//! one against the [`registry::types::Registry`] and drives a
//! [`tasks::runtime::Runtime`] (Docker in production) to start or stop its
//! container.

pub mod config;
pub mod registry;
pub mod tasks;
pub mod worker;
