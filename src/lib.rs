//! Resource provider for AWS Lambda constructs
//!
//! Implements the lifecycle a declarative infrastructure host needs for
//! functions, aliases, layer versions and event source mappings: fetch the
//! external state, deploy (create or update), destroy, and check whether a
//! resource has stabilised.
//!
//! - [`spec`] - specification tree engine (paths, changes, extractors, setters, tags)
//! - [`save`] - ordered fail-fast save pipeline with a typed shared context
//! - [`reconcile`] - remote response to spec tree reconciliation
//! - [`resource`] - per-type lifecycle and the [`Provider`](resource::Provider) entry point
//! - [`aws`] - Lambda REST API client and signing

pub mod aws;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod resource;
pub mod save;
pub mod spec;

/// Version injected at compile time via LAMBDA_PROVIDER_VERSION env var
/// (set by CI/CD), or the crate version for local builds.
pub const VERSION: &str = match option_env!("LAMBDA_PROVIDER_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

pub use error::{ProviderError, Result};
pub use resource::{
    DeployInput, DeployOutput, DestroyInput, FetchInput, Provider, ResourceKind, StabilisedInput,
};
