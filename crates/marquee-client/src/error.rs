use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("decode server message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("not connected to the display server")]
    NotConnected,

    #[error("client connection task has stopped")]
    Closed,
}
