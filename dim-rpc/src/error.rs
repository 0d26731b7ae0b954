use thiserror::Error;

/// Errors surfaced by gateway operations.
///
/// Every variant is per-request; none of them is fatal to the process.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Vault miss or unknown network. The payload names what was missing.
    #[error("Could not find {0}")]
    NotFound(String),

    #[error("Ledger node request failed: {0}")]
    Transport(String),

    #[error("Couldn't find mosaic definition for fully qualified mosaic name: {0}")]
    DefinitionNotFound(String),

    #[error("Wrong parameters: {0}")]
    Validation(String),

    #[error("Vault error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Crypto(#[from] dim_crypto_nem::Error),

    #[error("Invalid ledger node response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

impl From<lmdb::Error> for GatewayError {
    fn from(e: lmdb::Error) -> Self {
        GatewayError::Persistence(e.to_string())
    }
}

impl From<tokio::task::JoinError> for GatewayError {
    fn from(e: tokio::task::JoinError) -> Self {
        GatewayError::Persistence(format!("blocking task failed: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
