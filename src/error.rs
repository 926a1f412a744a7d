//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("session store error: {0}")]
    Session(String),

    #[error("dispatch error: {0}")]
    Dispatch(String),

    #[error("completion error: {0}")]
    Completion(String),

    #[error("push error: {0}")]
    Push(String),

    #[error("server error: {0}")]
    Server(String),
}
