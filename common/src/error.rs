// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Errors reported by the NSX backend
//!
//! Callers that clean up resources need to tell "already gone" and "still
//! referenced by something else" apart from real failures, so those two
//! conditions get their own variants instead of being folded into
//! [`Error::Manager`].

use crate::ResourceType;

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The object does not exist (or no longer exists).
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceType, id: String },

    /// The object cannot be deleted because other objects still use it.
    #[error("{kind} {id} is in use: {message}")]
    InUse { kind: ResourceType, id: String, message: String },

    /// The backend refused or failed the operation for any other reason.
    #[error(
        "backend operation on {kind} failed{}: {message}",
        status_suffix(.status, .error_code)
    )]
    Manager {
        kind: ResourceType,
        status: Option<u16>,
        error_code: Option<u64>,
        message: String,
    },

    /// Credentials were missing or were not accepted.
    #[error("backend rejected credentials: {0}")]
    Unauthenticated(String),

    /// The request never got a response.
    #[error("failed to communicate with backend: {0}")]
    Communication(String),

    /// The response could not be understood.
    #[error("unexpected response from backend: {0}")]
    InvalidResponse(String),

    /// The object type is only reachable through the Manager API and
    /// passthrough access has been turned off.
    #[error(
        "{0} is only available through the passthrough API, which is disabled"
    )]
    PassthroughDisabled(ResourceType),

    /// The caller did not supply the enclosing object ids this type needs.
    #[error("{kind} needs {expected} parent id(s), got {got}")]
    WrongParentCount { kind: ResourceType, expected: usize, got: usize },
}

fn status_suffix(status: &Option<u16>, error_code: &Option<u64>) -> String {
    match (status, error_code) {
        (Some(status), Some(code)) => format!(" ({status}, error {code})"),
        (Some(status), None) => format!(" ({status})"),
        (None, Some(code)) => format!(" (error {code})"),
        (None, None) => String::new(),
    }
}

impl Error {
    pub fn not_found(kind: ResourceType, id: &str) -> Error {
        Error::NotFound { kind, id: id.to_string() }
    }

    pub fn in_use(kind: ResourceType, id: &str, message: &str) -> Error {
        Error::InUse { kind, id: id.to_string(), message: message.to_string() }
    }

    pub fn manager(kind: ResourceType, message: &str) -> Error {
        Error::Manager {
            kind,
            status: None,
            error_code: None,
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_in_use(&self) -> bool {
        matches!(self, Error::InUse { .. })
    }

    /// Returns whether the error is likely transient and could reasonably be
    /// retried
    pub fn retryable(&self) -> bool {
        match self {
            Error::Communication(_) => true,
            Error::Manager { status: Some(status), .. } => *status >= 500,
            Error::NotFound { .. }
            | Error::InUse { .. }
            | Error::Manager { status: None, .. }
            | Error::Unauthenticated(_)
            | Error::InvalidResponse(_)
            | Error::PassthroughDisabled(_)
            | Error::WrongParentCount { .. } => false,
        }
    }
}
