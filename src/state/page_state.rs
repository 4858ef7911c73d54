/// Page state definitions for tracking crawl outcomes
///
/// Every URL taken from the frontier ends in exactly one state,
/// which is what the ledger records for it.
use std::fmt;

/// The outcome of one visited page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Terminal Success States =====
    /// Page was fetched, stored and turned into a record
    Processed,

    // ===== Terminal Error States =====
    /// Page returned a 4xx status other than 429 (permanent failure)
    DeadLink,

    /// Page could not be reached (timeout, connection refused, DNS failure, TLS error)
    Unreachable,

    /// Page returned a 5xx status
    ServerError,

    /// Page returned HTTP 429
    RateLimited,

    /// Page failed for other reasons (redirect limit, malformed URL, unreadable body)
    Failed,

    // ===== Special States =====
    /// Page Content-Type is not HTML; the bytes are stored but no record is produced
    ContentMismatch,

    /// Page is excluded by the host's robots.txt
    RobotsDenied,

    /// Host has hit the maximum request limit
    RequestLimitHit,

    /// Fetched bytes could not be written to the content store
    StorageFailed,
}

impl PageState {
    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Processed)
    }

    /// Returns true if a later attempt at the same URL might succeed
    ///
    /// Only transient states are eligible for retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable | Self::ServerError | Self::RateLimited
        )
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// Converts the page state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::DeadLink => "dead_link",
            Self::Unreachable => "unreachable",
            Self::ServerError => "server_error",
            Self::RateLimited => "rate_limited",
            Self::Failed => "failed",
            Self::ContentMismatch => "content_mismatch",
            Self::RobotsDenied => "robots_denied",
            Self::RequestLimitHit => "request_limit_hit",
            Self::StorageFailed => "storage_failed",
        }
    }

    /// Parses a page state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::all_states()
            .into_iter()
            .find(|state| state.to_db_string() == s)
    }

    /// Classifies a non-2xx HTTP status code
    pub fn from_status(status_code: u16) -> Self {
        match status_code {
            429 => Self::RateLimited,
            400..=499 => Self::DeadLink,
            500..=599 => Self::ServerError,
            _ => Self::Failed,
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Processed,
            Self::DeadLink,
            Self::Unreachable,
            Self::ServerError,
            Self::RateLimited,
            Self::Failed,
            Self::ContentMismatch,
            Self::RobotsDenied,
            Self::RequestLimitHit,
            Self::StorageFailed,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
