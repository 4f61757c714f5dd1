//! Registration and compilation errors.
//!
//! Neither type escapes the registry: both are logged and turned into a
//! `false` result at the registry boundary.

use thiserror::Error;

use crate::routing::model::{ControllerId, HttpMethod};
use crate::routing::resolver::ResolveError;

/// Error type for `register_*` operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("controller {0} has no definition")]
    UnknownController(ControllerId),

    #[error("endpoint {controller}::{method} has no definition")]
    UnknownEndpoint {
        controller: ControllerId,
        method: String,
    },

    #[error("duplicate parameter index {index} on {controller}::{method}; parameter ignored")]
    DuplicateParameter {
        controller: ControllerId,
        method: String,
        index: usize,
    },

    #[error("cannot resolve name of parameter {index} on {controller}::{method}: {source}")]
    UnresolvedArgument {
        controller: ControllerId,
        method: String,
        index: usize,
        #[source]
        source: ResolveError,
    },

    #[error("registry is sealed; routes were already compiled")]
    Sealed,

    #[error("registry lock poisoned")]
    Poisoned,
}

/// Error type for building or installing a single route.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("endpoint {0} has no target function")]
    MissingTarget(String),

    #[error("endpoint {endpoint} declares invalid success status `{status}`")]
    InvalidStatus { endpoint: String, status: String },

    #[error("endpoint {endpoint} binds parameter index {index}, past the largest supported arity")]
    ArityOverflow { endpoint: String, index: usize },

    #[error("invalid route path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("route {method} {path} conflicts with already installed {existing}")]
    Conflict {
        method: HttpMethod,
        path: String,
        existing: String,
    },

    #[error("router rejected {method} {path}")]
    RouterRejected { method: HttpMethod, path: String },
}
