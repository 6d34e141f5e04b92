use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("failed to open {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("link is not connected")]
    NotConnected,

    #[error("link is already listening")]
    AlreadyListening,

    #[error("failed to write command: {0}")]
    Write(#[source] io::Error),

    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[source] io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("token {0} is empty")]
    EmptyToken(&'static str),

    #[error("token {0} contains a line break")]
    LineBreak(&'static str),

    #[error("outbound token {0:?} is used for more than one command")]
    Duplicate(String),
}
