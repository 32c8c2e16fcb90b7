//! securityimport - bulk security configuration import
//!
//! Pushes groups, users and permission targets exported from one system into
//! another through its HTTP admin API, with bounded concurrency, bounded retries
//! and an operator-driven replay of whatever failed.
//!
//! # Core Concepts
//!
//! - **At-least-once**: every task ends applied, skipped, dropped or failed; failures can be replayed
//! - **Bounded everything**: worker count, retries per request and replay rounds are all capped
//! - **Drain before report**: the end of a round waits until nothing is queued or in flight
//!
//! # Modules
//!
//! - [`domain`] - task sum type, wire payloads, remote version
//! - [`remote`] - resilient request executor, transport seam, credentials, endpoints
//! - [`source`] - input file parsing into an import plan
//! - [`pipeline`] - producer, worker pool, completion barrier and replay
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod pipeline;
pub mod remote;
pub mod source;

pub use config::Config;
pub use domain::{Task, TaskKind, Version};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, RunOutcome};
pub use remote::{CredentialPool, Credentials, Endpoints, RemoteError, RequestExecutor, RetryPolicy};
pub use source::{ImportPlan, SourceError};
