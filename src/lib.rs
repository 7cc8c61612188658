//! Conditional Container - rule-driven container visibility
//!
//! This library decides whether a content container is shown or hidden for
//! the current user, based on an ordered list of author-defined conditions
//! evaluated against the user's profile attributes.
//!
//! # Features
//!
//! - Evaluate `equal` / `not-equal` / `contains` conditions against a
//!   key/value attribute bag
//! - Handle attribute values stored as scalars, lists, JSON-encoded lists,
//!   or comma-delimited strings
//! - Track every rendered instance of a container, evaluating each identity
//!   slot once and replaying the cached decision to duplicates
//! - Resolve instances asynchronously with retry and exponential backoff,
//!   tolerating instances that have not mounted yet
//!
//! # Example
//!
//! ```
//! use conditional_container::{decide, ContainerConfig, Profile};
//!
//! let config: ContainerConfig = serde_json::from_str(
//!     r#"{
//!         "useAsConditionalContainer": [true],
//!         "conditions": [{
//!             "user_key": "role",
//!             "logic": "equal",
//!             "user_value": "admin",
//!             "visibility": "show"
//!         }]
//!     }"#,
//! )
//! .unwrap();
//!
//! let profile = Profile::from_attributes([("role", "admin")]);
//! assert!(decide(&config, Some(&profile), None));
//! ```

pub mod config;
pub mod evaluator;
pub mod lookup;
pub mod profile;
pub mod registry;
pub mod types;
pub mod value;

pub use config::{ContainerConfig, Toggle};
pub use evaluator::{decide, evaluate_rule};
pub use lookup::{BackoffPolicy, LookupFilter, LookupService, DEFAULT_MAX_WAIT};
pub use profile::{ChildInitializer, DiagnosticSink, Profile, ProfileStore};
pub use registry::{
    ContainerIdentity, Decision, InstanceContext, InstanceId, InstanceRegistry, InstanceSnapshot,
};
pub use types::{Logic, Rule, RuleOutcome, Visibility};
pub use value::{classify, display_string, ValueShape};

use thiserror::Error;

/// Errors surfaced by the conditional container engine
#[derive(Error, Debug)]
pub enum ContainerError {
    /// No instance matched a lookup within its wait budget. The only
    /// failure external callers are expected to observe.
    #[error("no matching instance found after {elapsed_ms}ms")]
    LookupTimeout { elapsed_ms: u64 },

    /// The host session store failed to produce a profile. Logged and
    /// resolved as hidden, never propagated to the page.
    #[error("profile fetch failed: {0}")]
    ProfileFetch(String),

    /// The host rendering layer failed to boot a container's children.
    #[error("child initialization failed: {0}")]
    ChildInit(String),

    #[error("invalid container configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ContainerError>;
