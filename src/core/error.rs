//! Typed errors for the session and transfer layers.
//!
//! `SessionError` covers everything up to an established connection;
//! `TransferError` covers a single transfer job. Only
//! `SessionError::Negotiation` has local recovery (one conservative
//! retry); every other variant surfaces as a terminal status line and
//! returns the controller to idle.

use thiserror::Error;

/// Failure while establishing or negotiating the remote session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: russh::Error,
    },

    #[error("authentication failed for user {user}")]
    Auth { user: String },

    /// The remote rejected the requested transfer parameters. Triggers
    /// exactly one fallback attempt; fatal if that also fails.
    #[error("parameter negotiation rejected: {0}")]
    Negotiation(String),

    #[error("sftp subsystem: {0}")]
    Subsystem(String),

    #[error(transparent)]
    Ssh(#[from] russh::Error),
}

/// Failure of a single transfer job.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A start request arrived while a job was active. The running job
    /// is untouched.
    #[error("a transfer is already running")]
    AlreadyRunning,

    /// The selected entry is a directory; rejected before any handle is
    /// opened.
    #[error("directories cannot be transferred")]
    SourceIsDirectory,

    #[error("open {path}: {detail}")]
    Open { path: String, detail: String },

    #[error("read at offset {offset}: {detail}")]
    Read { offset: u64, detail: String },

    #[error("write at offset {offset}: {detail}")]
    Write { offset: u64, detail: String },

    /// The source signalled end-of-data before the declared length was
    /// reached. Never silently truncate.
    #[error("unexpected end of data at offset {offset} ({remaining} bytes missing)")]
    ShortRead { offset: u64, remaining: u64 },

    #[error("close handle: {0}")]
    Close(String),

    #[error("prepare destination {path}: {detail}")]
    PrepareDestination { path: String, detail: String },

    /// Shutdown was signalled while the job was in flight.
    #[error("transfer interrupted by shutdown")]
    Interrupted,
}
