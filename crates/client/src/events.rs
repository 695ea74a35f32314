use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionEventKind {
    ForcedLogout,
    TokenRefreshed,
}

impl SessionEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ForcedLogout => "forced-logout",
            Self::TokenRefreshed => "token-refreshed",
        }
    }
}

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// A request was rejected again after a successful refresh.
    SessionExpired,
    /// The refresh call failed, with the upstream status when one was received.
    RefreshFailed(Option<u16>),
    /// The user ended the session.
    UserLogout,
}

impl LogoutReason {
    /// Bounded label for metrics.
    pub fn kind(self) -> &'static str {
        match self {
            Self::SessionExpired => "session_expired",
            Self::RefreshFailed(_) => "refresh_failed",
            Self::UserLogout => "logout",
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefreshFailed(Some(status)) => write!(f, "refresh_failed_{status}"),
            other => f.write_str(other.kind()),
        }
    }
}

/// Notification published by the authenticated client.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ForcedLogout {
        reason: Option<String>,
        redirect: bool,
    },
    TokenRefreshed {
        access_token: String,
        refresh_token: String,
    },
}

impl SessionEvent {
    pub fn forced_logout(reason: LogoutReason) -> Self {
        Self::ForcedLogout {
            reason: Some(reason.to_string()),
            redirect: true,
        }
    }

    pub fn kind(&self) -> SessionEventKind {
        match self {
            Self::ForcedLogout { .. } => SessionEventKind::ForcedLogout,
            Self::TokenRefreshed { .. } => SessionEventKind::TokenRefreshed,
        }
    }

    /// JSON form safe to hand to browsers and logs; token values are masked.
    pub fn redacted(&self) -> Value {
        match self {
            Self::ForcedLogout { reason, redirect } => json!({
                "type": self.kind().as_str(),
                "reason": reason,
                "redirect": redirect,
            }),
            Self::TokenRefreshed { .. } => json!({
                "type": self.kind().as_str(),
                "accessToken": "<redacted>",
                "refreshToken": "<redacted>",
            }),
        }
    }
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForcedLogout { reason, redirect } => f
                .debug_struct("ForcedLogout")
                .field("reason", reason)
                .field("redirect", redirect)
                .finish(),
            Self::TokenRefreshed { .. } => f.write_str("TokenRefreshed { .. }"),
        }
    }
}

/// Broadcast hub for [`SessionEvent`]s.
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: SessionEvent) {
        let kind = event.kind();
        if self.sender.send(event).is_err() {
            debug!(stage = "auth", kind = kind.as_str(), "no session event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionEventFilter {
    kinds: Option<HashSet<SessionEventKind>>,
}

impl SessionEventFilter {
    pub fn from_kinds(kinds: Option<HashSet<SessionEventKind>>) -> Self {
        Self { kinds }
    }

    pub fn matches(&self, event: &SessionEvent) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&event.kind()),
            None => true,
        }
    }
}

/// Parses a comma separated kind list such as `forced-logout,token-refreshed`.
pub fn parse_kind_list(value: Option<&str>) -> Result<Option<HashSet<SessionEventKind>>, String> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let mut set = HashSet::new();
    for item in raw.split(',').filter(|s| !s.trim().is_empty()) {
        let kind = match item.trim().to_lowercase().as_str() {
            "forced-logout" => SessionEventKind::ForcedLogout,
            "token-refreshed" => SessionEventKind::TokenRefreshed,
            other => return Err(format!("unknown session event kind '{other}'")),
        };
        set.insert(kind);
    }

    if set.is_empty() {
        Ok(None)
    } else {
        Ok(Some(set))
    }
}
