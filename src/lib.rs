//! Self-service provisioning service.
//!
//! Accepts requests to create a repository plus its surrounding
//! infrastructure and configuration, fires the external automation that does
//! the work, and reconciles the asynchronous, out-of-order, at-least-once
//! status events that automation reports back. All status writes funnel
//! through a single forward-only ordering guard over one shared store.

pub mod config;
pub mod error;
pub mod orchestrate;
pub mod platform;
pub mod queue;
pub mod reconcile;
pub mod server;
pub mod shutdown;
pub mod status;
pub mod webhook;
