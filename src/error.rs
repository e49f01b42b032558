//! Errors that can end a single chat turn.
//!
//! None of these end the session: the chat loop reports them and goes back
//! to waiting for input. Application plumbing (config files, setup) uses
//! `anyhow` instead.

use thiserror::Error;

use crate::types::ProviderIdentity;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no providers are configured; run `jarvis setup` to add an API key")]
    NoProviderAvailable,

    #[error("{identity} request failed: {cause}")]
    ProviderRequest {
        identity: ProviderIdentity,
        #[source]
        cause: ProviderError,
    },

    #[error("shortcut '{prefix}:' points at unsupported provider '{target}'")]
    UnsupportedShortcut { prefix: String, target: String },
}

/// What went wrong talking to a vendor.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("could not reach the API: {0}")]
    Transport(String),

    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API reported an error: {0}")]
    Api(String),

    #[error("malformed stream event: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn into_chat_error(self, identity: ProviderIdentity) -> ChatError {
        ChatError::ProviderRequest {
            identity,
            cause: self,
        }
    }
}
