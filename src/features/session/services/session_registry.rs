use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::session::dtos::SessionStatusDto;

/// How long a signed-out session id stays rejected. Provider tokens are
/// short-lived, so after this the token carrying the id has expired anyway.
const TOMBSTONE_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
struct SessionEntry {
    user_id: Uuid,
    last_activity: DateTime<Utc>,
    login_recorded: bool,
}

/// Result of registering activity on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Touch {
    /// First activity beacon of this session; the caller records a login
    pub first_beacon: bool,
}

#[derive(Default)]
struct Sessions {
    live: HashMap<String, SessionEntry>,
    /// Signed-out or expired session ids and when they ended
    ended: HashMap<String, DateTime<Utc>>,
}

/// Server-side session activity cache.
///
/// The auth middleware touches the caller's session on every request; idle
/// sessions are signed out by the sweeper and stay rejected afterwards.
pub struct SessionRegistry {
    sessions: RwLock<Sessions>,
    idle_timeout: ChronoDuration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(Sessions::default()),
            idle_timeout: ChronoDuration::from_std(idle_timeout)
                .unwrap_or_else(|_| ChronoDuration::minutes(30)),
        }
    }

    pub fn idle_timeout(&self) -> ChronoDuration {
        self.idle_timeout
    }

    /// Register request activity. Rejects signed-out and idle-expired sessions.
    pub async fn touch(&self, user: &AuthenticatedUser) -> Result<()> {
        self.touch_at(user, Utc::now(), false).await.map(|_| ())
    }

    /// Register an explicit activity beacon from the client.
    pub async fn beacon(&self, user: &AuthenticatedUser) -> Result<Touch> {
        self.touch_at(user, Utc::now(), true).await
    }

    pub(crate) async fn touch_at(
        &self,
        user: &AuthenticatedUser,
        now: DateTime<Utc>,
        beacon: bool,
    ) -> Result<Touch> {
        let mut sessions = self.sessions.write().await;

        if sessions.ended.contains_key(&user.session_id) {
            return Err(AppError::Unauthorized("Session has ended".to_string()));
        }

        let idle_timeout = self.idle_timeout;
        let expired = sessions
            .live
            .get(&user.session_id)
            .is_some_and(|entry| now - entry.last_activity > idle_timeout);
        if expired {
            sessions.live.remove(&user.session_id);
            sessions.ended.insert(user.session_id.clone(), now);
            tracing::info!(
                "Session {} of user {} expired after inactivity",
                user.session_id,
                user.user_id
            );
            return Err(AppError::Unauthorized(
                "Session expired due to inactivity".to_string(),
            ));
        }

        let entry = sessions
            .live
            .entry(user.session_id.clone())
            .or_insert_with(|| SessionEntry {
                user_id: user.user_id,
                last_activity: now,
                login_recorded: false,
            });
        entry.last_activity = now;

        let first_beacon = beacon && !entry.login_recorded;
        if first_beacon {
            entry.login_recorded = true;
        }
        Ok(Touch { first_beacon })
    }

    /// Whether the session is still signed in. Does not count as activity,
    /// so long-lived feeds can poll it without keeping an idle session alive.
    pub async fn is_live(&self, user: &AuthenticatedUser) -> bool {
        self.is_live_at(user, Utc::now()).await
    }

    pub(crate) async fn is_live_at(&self, user: &AuthenticatedUser, now: DateTime<Utc>) -> bool {
        let sessions = self.sessions.read().await;
        if sessions.ended.contains_key(&user.session_id) {
            return false;
        }
        sessions
            .live
            .get(&user.session_id)
            .is_some_and(|entry| now - entry.last_activity <= self.idle_timeout)
    }

    pub async fn status(&self, user: &AuthenticatedUser) -> Result<SessionStatusDto> {
        self.status_at(user, Utc::now()).await
    }

    pub(crate) async fn status_at(
        &self,
        user: &AuthenticatedUser,
        now: DateTime<Utc>,
    ) -> Result<SessionStatusDto> {
        let sessions = self.sessions.read().await;
        let entry = sessions
            .live
            .get(&user.session_id)
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        let expires_at = entry.last_activity + self.idle_timeout;
        let remaining = (expires_at - now).num_seconds().max(0);

        Ok(SessionStatusDto {
            session_id: user.session_id.clone(),
            last_activity: entry.last_activity,
            expires_at,
            remaining_seconds: remaining,
            expired: remaining == 0,
        })
    }

    /// Sign the session out. Returns false when it was not live.
    pub async fn sign_out(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let was_live = sessions.live.remove(session_id).is_some();
        sessions.ended.insert(session_id.to_string(), Utc::now());
        was_live
    }

    /// Expire idle sessions and forget old tombstones. Returns the expired ids.
    pub async fn sweep(&self) -> Vec<String> {
        self.sweep_at(Utc::now()).await
    }

    pub(crate) async fn sweep_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let idle_timeout = self.idle_timeout;

        let expired: Vec<String> = sessions
            .live
            .iter()
            .filter(|(_, entry)| now - entry.last_activity > idle_timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.live.remove(id);
            sessions.ended.insert(id.clone(), now);
        }

        let horizon = now - ChronoDuration::hours(TOMBSTONE_TTL_HOURS);
        sessions.ended.retain(|_, ended_at| *ended_at > horizon);

        expired
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.live.len()
    }

    /// Distinct users holding at least one live session.
    pub async fn active_users(&self) -> Vec<Uuid> {
        let sessions = self.sessions.read().await;
        let mut users: Vec<Uuid> = sessions.live.values().map(|e| e.user_id).collect();
        users.sort();
        users.dedup();
        users
    }
}
