use thiserror::Error;

/// Domain errors for the core engine (metainfo, piece plan, session,
/// writer). Peer- and tracker-level code works in `anyhow::Result` and
/// wraps these at its boundary, matching the teacher's error-handling split
/// between hard-typed core errors and ad-hoc `anyhow` at the edges.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed metainfo: {0}")]
    MalformedMetainfo(String),

    #[error("tracker unreachable: {0}")]
    TrackerUnreachable(String),

    #[error("failed to connect to peer: {0}")]
    PeerConnectFailed(String),

    #[error("peer timed out")]
    PeerTimeout,

    #[error("handshake info-hash mismatch")]
    HandshakeMismatch,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("piece {0} failed hash verification")]
    HashMismatch(usize),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
