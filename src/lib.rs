//! Financial and reference state engine for a client-services back office.
//!
//! Tracks organizations, projects, milestones, invoices, time entries and
//! monthly reports on top of a generic document store, and derives the
//! operational state the presentation layer renders: hierarchical reference
//! numbers, milestone payment status, invoice balances and overdue flags,
//! and monthly free-hours/overage billing. Derived values are never stored;
//! a read-through cache with a typed invalidation table keeps the expensive
//! aggregates cheap without serving stale data.
//!
//! Wire a [`registry::CoreServices`] from an object store, a cache and an
//! [`config::EngineConfig`] to get the full service graph.

// Public modules
pub mod cache;
pub mod config;
pub mod domains;
pub mod errors;
pub mod registry;
pub mod store;
pub mod types;
pub mod validation;

pub use config::EngineConfig;
pub use registry::CoreServices;
