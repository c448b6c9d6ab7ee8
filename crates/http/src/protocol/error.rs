use thiserror::Error;

/// Errors raised by the request and response contracts.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("{what} is no longer available, the {owner} has been finalized")]
    Finalized { owner: &'static str, what: &'static str },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid query string: {reason}")]
    InvalidQuery { reason: String },
}

impl HttpError {
    pub fn finalized(owner: &'static str, what: &'static str) -> Self {
        Self::Finalized { owner, what }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_query<S: ToString>(str: S) -> Self {
        Self::InvalidQuery { reason: str.to_string() }
    }
}
