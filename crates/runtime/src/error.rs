use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The inference endpoint refused the connection.
    #[error("cannot connect to model backend at {url}: {message}\nEnsure the server is running: ollama serve")]
    Connect { url: String, message: String },

    /// The inference call exceeded the configured timeout.
    #[error("model backend request timed out: {0}")]
    Timeout(String),

    /// The backend does not have the requested model.
    #[error("model '{model}' not found on the backend\nPull it first: ollama pull {model}")]
    ModelMissing { model: String },

    /// Any other non-success backend response, carrying the body text.
    #[error("model backend error: {0}")]
    Api(String),

    /// The backend answered with a payload the client cannot interpret.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// A tool descriptor is missing a required field.
    #[error("malformed tool descriptor: {0}")]
    Descriptor(String),
}

pub type Result<T> = std::result::Result<T, Error>;
