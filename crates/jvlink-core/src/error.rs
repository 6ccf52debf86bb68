//! Error taxonomy.
//!
//! Two levels: [`NativeFailure`] classifies what the native layer reported
//! (or failed to report), [`JvLinkError`] is the error every public API
//! returns. The native return codes `-1` (file boundary) and `-3` (download
//! pending) never appear here; they are control signals carried by
//! [`crate::contract::ReadOutcome`].

use thiserror::Error;

/// The synthetic return code used when a dispatched call exceeds its
/// timeout and the session is poisoned.
pub const TIMEOUT_CODE: i32 = -999;

/// Native return codes that mark a downloaded artefact as unusable (size
/// wrong, unopenable, corrupted). The orchestrator retries these and then
/// resolves them with `skip()`.
pub const RECOVERABLE_BY_SKIP: [i32; 3] = [-402, -403, -502];

// ---------------------------------------------------------------------------
// NativeFailure
// ---------------------------------------------------------------------------

/// A failure at the native boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeFailure {
    #[error("communication failure {code}: {message}")]
    Communication { code: i32, message: String },
    #[error("software activation or service key problem")]
    Activation,
    #[error("operation not supported by this client")]
    Unsupported,
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },
    #[error("unexpected native behaviour: {reason}")]
    Unexpected { reason: String },
}

impl NativeFailure {
    /// Classify a raw negative return code.
    ///
    /// `-1` and `-3` must be filtered out by the caller; they are control
    /// signals, not failures.
    pub fn from_code(code: i32) -> NativeFailure {
        match code {
            -114 | -115 | -301 | -302 | -303 => NativeFailure::Activation,
            _ => NativeFailure::Communication {
                code,
                message: code_message(code).to_owned(),
            },
        }
    }

    /// Synthetic failure for a dispatched call that timed out.
    pub fn timeout(operation: &str) -> NativeFailure {
        NativeFailure::Communication {
            code: TIMEOUT_CODE,
            message: format!("native call '{operation}' exceeded its timeout"),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> NativeFailure {
        NativeFailure::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn unexpected(reason: impl Into<String>) -> NativeFailure {
        NativeFailure::Unexpected {
            reason: reason.into(),
        }
    }

    /// The raw return code, where one exists.
    pub fn code(&self) -> Option<i32> {
        match self {
            NativeFailure::Communication { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the orchestrator may resolve this failure by skipping the
    /// current artefact.
    pub fn is_recoverable_by_skip(&self) -> bool {
        self.code()
            .is_some_and(|code| RECOVERABLE_BY_SKIP.contains(&code))
    }
}

/// Human-readable message for a known native return code.
///
/// | Code range | Meaning                          |
/// |------------|----------------------------------|
/// | -1xx       | Parameter / setup problems       |
/// | -2xx       | Call sequencing problems         |
/// | -3xx       | Authentication / activation      |
/// | -4xx       | Native component / server errors |
/// | -5xx       | Download and setup failures      |
pub fn code_message(code: i32) -> &'static str {
    match code {
        -100 => "invalid parameter",
        -101 => "software id is not configured",
        -102 => "software id exceeds 64 bytes",
        -103 => "software id contains invalid characters",
        -111 => "registry setup information is missing",
        -112 => "setup has not completed",
        -114 => "service key is invalid",
        -115 => "service key has expired",
        -116 => "dataspec and key combination is not valid",
        -201 => "init has not been called",
        -202 => "the previous session is still open",
        -203 => "open has not been called",
        -211 => "internal resources are busy",
        -301 => "authentication failed",
        -302 => "service key authentication failed",
        -303 => "service key is not registered",
        -305 => "too many concurrent users",
        -401 => "internal error in the native component",
        -402 => "downloaded file has an unexpected size",
        -403 => "downloaded file is missing or cannot be opened",
        -411 => "server error: invalid response",
        -412 => "server error: unreachable",
        -413 => "server error: unexpected http status",
        -431 => "invalid request sent to the server",
        -501 => "setup processing failed",
        -502 => "download failed or the transfer was corrupted",
        -503 => "file could not be fetched from the server",
        -504 => "server is under maintenance",
        TIMEOUT_CODE => "dispatched call exceeded its timeout",
        _ => "unrecognised native return code",
    }
}

// ---------------------------------------------------------------------------
// JvLinkError
// ---------------------------------------------------------------------------

/// The error algebra every public API returns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JvLinkError {
    /// The request never reached the native layer.
    #[error("validation error: {reason}")]
    Validation { reason: String },
    #[error(transparent)]
    Native(#[from] NativeFailure),
    /// Cooperative cancellation was observed. Streaming APIs terminate
    /// gracefully instead of yielding this.
    #[error("operation cancelled")]
    Cancelled,
    /// The watch-event queue dropped events under backpressure. Reported as
    /// an item on the event stream; it never terminates the stream.
    #[error("event queue overflow: {dropped} events dropped")]
    EventQueueOverflow { dropped: u64 },
}

impl JvLinkError {
    pub fn validation(reason: impl Into<String>) -> JvLinkError {
        JvLinkError::Validation {
            reason: reason.into(),
        }
    }

    /// The native return code behind this error, where one exists.
    pub fn code(&self) -> Option<i32> {
        match self {
            JvLinkError::Native(failure) => failure.code(),
            _ => None,
        }
    }
}
