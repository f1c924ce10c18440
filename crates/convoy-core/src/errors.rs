/// Typed error hierarchy for the transport boundary of a worker session.
/// Everything here stays local to the session that hit it: fatal variants
/// drive the state machine into `error`/`disconnected` and the registry's
/// self-healing loop, they are never thrown past the session.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SessionError {
    // Fatal — the connection is unusable, destroy and respawn
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("disconnected: {0}")]
    Disconnected(String),

    // Per-action — the connection survives
    #[error("action failed: {0}")]
    ActionFailed(String),
    #[error("action timed out")]
    Timeout,

    // The session was torn down while work was in flight
    #[error("connection released")]
    Released,
}

impl SessionError {
    /// Fatal errors end the session; the registry recreates it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed(_) | Self::AuthFailed(_) | Self::Disconnected(_) | Self::Released
        )
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::ConnectFailed(_) => "connect_failed",
            Self::AuthFailed(_) => "auth_failed",
            Self::Disconnected(_) => "disconnected",
            Self::ActionFailed(_) => "action_failed",
            Self::Timeout => "timeout",
            Self::Released => "released",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(SessionError::ConnectFailed("dns".into()).is_fatal());
        assert!(SessionError::AuthFailed("bad pairing".into()).is_fatal());
        assert!(SessionError::Disconnected("eof".into()).is_fatal());
        assert!(SessionError::Released.is_fatal());
    }

    #[test]
    fn action_errors_are_not_fatal() {
        assert!(!SessionError::ActionFailed("rejected".into()).is_fatal());
        assert!(!SessionError::Timeout.is_fatal());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(SessionError::Timeout.error_kind(), "timeout");
        assert_eq!(SessionError::AuthFailed("x".into()).error_kind(), "auth_failed");
    }
}
