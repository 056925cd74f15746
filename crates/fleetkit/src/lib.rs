//! # Fleetkit
//!
//! Tag-scoped policy reconciliation and parallel command fan-out for a
//! fleet of cloud virtual machines.
//!
//! ## Core Concepts
//!
//! - **Server**: A fleet member normalized from the provider's instance listing
//! - **ScopeKey**: Which servers a policy entry applies to (all, a tag key, or `key:value`)
//! - **PolicySet**: Declared firewall rules or alarm templates grouped by scope
//! - **AlarmPlan**: Skip / upsert / delete operations converging live alarms
//! - **FleetRun**: A streaming iterator of per-server command outcomes
//!
//! ## Example
//!
//! ```ignore
//! use fleetkit::{AlarmTemplate, PolicySet, TagFilter, alarms, catalog};
//!
//! let filter = TagFilter::parse("team:payments");
//! let servers = catalog::list_servers(&provider, filter.as_ref())?;
//!
//! let policies = PolicySet::<AlarmTemplate>::load_or_empty(&alarms_path);
//! let report = alarms::reconcile(&provider, &servers, &policies)?;
//! println!("{} created, {} unchanged", report.created(), report.unchanged());
//! ```
//!
//! ## Provider Traits
//!
//! - [`CloudProvider`]: Instance, alarm, port and key pair API
//! - [`RemoteExecutor`]: Runs one command on one host
//! - [`CredentialProvider`]: Supplies the SSH private key
//!
//! The binary supplies real implementations; tests use an in-memory provider.

pub mod alarms;
pub mod catalog;
pub mod error;
pub mod fanout;
pub mod firewall;
pub mod keys;
pub mod matcher;
pub mod policy;
pub mod provider;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use alarms::{AlarmChange, AlarmOp, AlarmPlan, AlarmReport, AlarmTemplate, Fingerprint};
pub use catalog::{Instance, TagFilter, list_servers};
pub use error::{Error, Result, TransportError};
pub use fanout::{FanoutOptions, FleetRun, WorkerCounts, WorkerLimit, run_on_fleet};
pub use keys::KeyStore;
pub use policy::{PolicySet, ScopeKey};
pub use provider::{CloudProvider, CredentialProvider, RemoteExecutor};
pub use types::{
    Alarm, AlarmDefinition, CommandOutcome, ComparisonOperator, Page, PortRule, Server, Tag,
    WorkerState,
};
