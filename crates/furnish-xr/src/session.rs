use std::fmt;
use std::future::Future;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a host-granted immersive session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImmersiveSession {
    pub id: SessionId,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("immersive sessions are not supported: {0}")]
    NotSupported(String),
    #[error("permission to start an immersive session was denied")]
    PermissionDenied,
    #[error("host failed to start the session: {0}")]
    Host(String),
}

pub trait SessionProvider {
    fn request_immersive_session(
        &mut self,
    ) -> impl Future<Output = Result<ImmersiveSession, SessionError>>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Inactive,
    Presenting(ImmersiveSession),
}

impl SessionState {
    pub fn is_presenting(&self) -> bool {
        matches!(self, SessionState::Presenting(_))
    }

    pub fn session(&self) -> Option<&ImmersiveSession> {
        match self {
            SessionState::Presenting(session) => Some(session),
            SessionState::Inactive => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Inactive => f.write_str("inactive"),
            SessionState::Presenting(session) => write!(f, "presenting ({})", session.id),
        }
    }
}
