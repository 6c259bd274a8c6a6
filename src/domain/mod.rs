//! Domain layer types for mailbox page retrieval.
//!
//! This module contains the request, connection, and message types shared by
//! the protocol clients and the retrieval service.

mod connection;
mod message;
mod page;

pub use connection::{
    ConnectionConfig, Credentials, OAuthCredentials, OAuthTokens, Protocol, ServerConfig,
};
pub use message::{Address, Attachment, NormalizedMessage};
pub use page::{ErrorBody, FetchRequest, PageRequest, PageResult};

/// A request parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field is absent or empty.
    #[error("missing {0}")]
    Missing(&'static str),

    /// A field is present but unusable.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Field name as seen by the caller.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl ValidationError {
    pub(crate) fn missing(field: &'static str) -> Self {
        Self::Missing(field)
    }

    pub(crate) fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}
