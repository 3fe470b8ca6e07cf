use std::fmt::Display;

use tokio_tungstenite::tungstenite::protocol::CloseFrame;

/// Errors internal to the protocol engine.
///
/// These are never returned to a caller as-is; the protocol engine maps each
/// variant to an outbound `INVALID_SESSION` (with the appropriate `resumable`
/// flag) or a silent connection close.
#[derive(Debug)]
pub enum Error {
    /// Any opcode received outside the state that permits it (e.g. a
    /// `PRESENCE_UPDATE` before `IDENTIFY`/`RESUME` completed).
    OpcodeNotAllowedInState,
    /// The frame did not decode into a known envelope shape.
    MalformedPayload(serde_json::Error),
    /// `IDENTIFY`/`RESUME` carried a token the auth collaborator rejected.
    AuthFailed,
    /// `RESUME` named a `sessionId` with no (or an expired) `SessionIndex` entry.
    UnknownSession,
    /// `RESUME` requested a sequence the `ResumeBuffer` can no longer supply.
    ResumeBufferGap,
    /// The (session, opcode) pair exceeded its sliding-window budget.
    RateLimited,
    /// An inbound text frame exceeded the 1 MB payload cap.
    PayloadTooLarge,
    /// The transport closed, with or without a close frame.
    Closed(Option<CloseFrame<'static>>),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::OpcodeNotAllowedInState => write!(f, "opcode not allowed in current state"),
            Error::MalformedPayload(e) => write!(f, "malformed payload: {e}"),
            Error::AuthFailed => write!(f, "token rejected by auth collaborator"),
            Error::UnknownSession => write!(f, "no session index entry for resume"),
            Error::ResumeBufferGap => write!(f, "resume buffer cannot supply requested sequence"),
            Error::RateLimited => write!(f, "rate limit exceeded"),
            Error::PayloadTooLarge => write!(f, "inbound payload exceeded the 1 MB cap"),
            Error::Closed(frame) => match frame {
                Some(frame) => write!(f, "websocket closed with code {}", frame.code),
                None => write!(f, "websocket closed"),
            },
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MalformedPayload(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedPayload(e)
    }
}

/// Whether the client may attempt a `RESUME` after an `INVALID_SESSION`.
/// Protocol, auth, and rate-limit errors are never resumable; a resume-buffer
/// gap is the one case that is.
impl Error {
    pub fn resumable(&self) -> bool {
        matches!(self, Error::ResumeBufferGap)
    }
}
