//! Process-level errors.
//!
//! Request-scoped failures never surface here: the request handler always
//! turns them into an HTTP response. These errors stop the process before
//! or while serving.

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("upstream credential is missing")]
    MissingCredential,

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
