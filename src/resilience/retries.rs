//! Bootstrap-and-retry decision.
//!
//! # Responsibilities
//! - Recognize upstream responses meaning "no session" or "unknown session"
//! - Apply the configured strictness
//! - Guarantee at most one retry per inbound request
//!
//! # Design Decisions
//! - Only protocol `POST`s other than `initialize` are ever retried
//! - Strict signals are matched case-insensitively on the body text
//! - Liberal mode only widens the net for clients without a session id

use axum::http::StatusCode;

use crate::config::FailureDetection;

const NO_SESSION_YET: &str = "expect initialize request";
const SESSION_NOT_FOUND: &str = "session not found";

/// Facts about the inbound request that gate a retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryContext {
    /// Protocol-path `POST`.
    pub protocol_write: bool,
    /// The request is itself an `initialize` call.
    pub initialize_call: bool,
    /// The client presented its own session id.
    pub client_session: bool,
    /// A bootstrap already ran while handling this request.
    pub bootstrapped: bool,
}

/// Whether `status`/`body` is an explicit missing-or-stale-session signal.
pub fn is_session_failure(status: StatusCode, body: &[u8]) -> bool {
    let matches = |needle: &str| {
        String::from_utf8_lossy(body)
            .to_ascii_lowercase()
            .contains(needle)
    };

    match status {
        StatusCode::UNPROCESSABLE_ENTITY => matches(NO_SESSION_YET),
        StatusCode::UNAUTHORIZED => matches(SESSION_NOT_FOUND),
        _ => false,
    }
}

/// Decide whether the first response warrants bootstrap-and-retry.
pub fn needs_bootstrap(
    detection: FailureDetection,
    ctx: &RetryContext,
    status: StatusCode,
    body: &[u8],
) -> bool {
    if !ctx.protocol_write || ctx.initialize_call || ctx.bootstrapped {
        return false;
    }

    if is_session_failure(status, body) {
        return true;
    }

    match detection {
        FailureDetection::Strict => false,
        FailureDetection::Liberal => !ctx.client_session && status.as_u16() >= 400,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(client_session: bool) -> RetryContext {
        RetryContext {
            protocol_write: true,
            client_session,
            ..Default::default()
        }
    }

    #[test]
    fn strict_signals() {
        assert!(is_session_failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            b"Unprocessable Entity: Expect initialize request"
        ));
        assert!(is_session_failure(StatusCode::UNAUTHORIZED, b"Session not found"));

        // right text, wrong status
        assert!(!is_session_failure(StatusCode::BAD_REQUEST, b"session not found"));
        assert!(!is_session_failure(StatusCode::UNAUTHORIZED, b"invalid token"));
    }

    #[test]
    fn strict_ignores_other_errors() {
        let ctx = write(false);
        assert!(!needs_bootstrap(FailureDetection::Strict, &ctx, StatusCode::BAD_REQUEST, b"bad"));
        assert!(needs_bootstrap(
            FailureDetection::Strict,
            &write(true),
            StatusCode::UNAUTHORIZED,
            b"session not found"
        ));
    }

    #[test]
    fn liberal_covers_sessionless_clients_only() {
        assert!(needs_bootstrap(
            FailureDetection::Liberal,
            &write(false),
            StatusCode::BAD_REQUEST,
            b"Bad Request: missing session"
        ));
        assert!(!needs_bootstrap(
            FailureDetection::Liberal,
            &write(true),
            StatusCode::BAD_REQUEST,
            b"Bad Request"
        ));
        assert!(!needs_bootstrap(FailureDetection::Liberal, &write(false), StatusCode::OK, b"{}"));
    }

    #[test]
    fn never_retries_initialize_reads_or_second_attempts() {
        let signal = (StatusCode::UNAUTHORIZED, &b"session not found"[..]);

        let ctx = RetryContext { initialize_call: true, ..write(true) };
        assert!(!needs_bootstrap(FailureDetection::Liberal, &ctx, signal.0, signal.1));

        let ctx = RetryContext { bootstrapped: true, ..write(true) };
        assert!(!needs_bootstrap(FailureDetection::Liberal, &ctx, signal.0, signal.1));

        let ctx = RetryContext { protocol_write: false, ..write(true) };
        assert!(!needs_bootstrap(FailureDetection::Liberal, &ctx, signal.0, signal.1));
    }
}
