//! Per-user replication sessions.
//!
//! A session ties a user to exactly one ingest mode at a time. Every
//! operation routed through a session passes the active-flag gate first;
//! that gate is the sole mechanism keeping late-arriving ingest events away
//! from the engine after a stop.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use tracing::info;

use crate::engine::{Engine, LogStore};
use crate::error::CopyError;
use crate::models::{Account, Action, ActivityLog, ExecutionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Websocket,
    Mirror,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Websocket => write!(f, "websocket"),
            SessionMode::Mirror => write!(f, "mirror"),
        }
    }
}

pub struct Session {
    user_id: i64,
    mode: SessionMode,
    active: RwLock<bool>,
    engine: Arc<Engine>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("mode", &self.mode)
            .field("active", &self.active)
            .finish()
    }
}

impl Session {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        *self.active.read().unwrap()
    }

    fn deactivate(&self) {
        *self.active.write().unwrap() = false;
    }

    fn ensure_active(&self) -> Result<(), CopyError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CopyError::SessionInactive)
        }
    }

    pub async fn master_account(&self) -> Result<Account, CopyError> {
        self.engine.master_account(self.user_id).await
    }

    /// Run one action through the engine. Fails with `session_inactive`
    /// once `stop` has returned.
    pub async fn dispatch(&self, action: Action) -> Result<ExecutionResult, CopyError> {
        self.ensure_active()?;
        self.engine.execute_action(self.user_id, action).await
    }

    /// Cache write-through for stop-order frames that carry their symbol.
    pub async fn save_stop_order(&self, order_id: &str, symbol: &str) -> Result<(), CopyError> {
        self.ensure_active()?;
        self.engine
            .save_stop_order(self.user_id, order_id, symbol)
            .await
    }
}

/// Owns every live session, keyed by user.
pub struct SessionManager {
    engine: Arc<Engine>,
    logs: Arc<dyn LogStore>,
    sessions: Mutex<HashMap<i64, Arc<Session>>>,
}

impl SessionManager {
    pub fn new(engine: Arc<Engine>, logs: Arc<dyn LogStore>) -> Self {
        Self {
            engine,
            logs,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Create (or return) the active session for the user. A session in a
    /// different mode rejects the start; starting also verifies a master
    /// account is configured.
    pub async fn start(
        &self,
        user_id: i64,
        mode: SessionMode,
    ) -> Result<Arc<Session>, CopyError> {
        self.engine.master_account(user_id).await?;

        let session = {
            let mut sessions = self.sessions.lock().unwrap();

            if let Some(existing) = sessions.get(&user_id) {
                if existing.mode != mode {
                    return Err(CopyError::ModeConflict {
                        active: existing.mode.to_string(),
                    });
                }
                if existing.is_active() {
                    return Ok(existing.clone());
                }
                // a stopped entry should have been removed; fall through and
                // replace it
            }

            let session = Arc::new(Session {
                user_id,
                mode,
                active: RwLock::new(true),
                engine: self.engine.clone(),
            });
            sessions.insert(user_id, session.clone());
            session
        };

        let _ = self
            .logs
            .add_log(&ActivityLog {
                user_id: Some(user_id),
                level: "info".into(),
                action: "copy_trading_start".into(),
                message: format!("Copy trading session started (mode: {})", mode),
                ..Default::default()
            })
            .await;

        info!(user_id, mode = %mode, "copy trading session started");

        Ok(session)
    }

    /// Return the session iff it exists in this mode and is active.
    pub fn get(&self, user_id: i64, mode: SessionMode) -> Result<Arc<Session>, CopyError> {
        let sessions = self.sessions.lock().unwrap();

        match sessions.get(&user_id) {
            Some(session) if session.mode != mode => Err(CopyError::ModeConflict {
                active: session.mode.to_string(),
            }),
            Some(session) if session.is_active() => Ok(session.clone()),
            _ => Err(CopyError::SessionInactive),
        }
    }

    /// Clear the active flag and drop the entry.
    pub async fn stop(&self, user_id: i64, mode: SessionMode) -> Result<(), CopyError> {
        {
            let mut sessions = self.sessions.lock().unwrap();

            let session = match sessions.get(&user_id) {
                None => return Err(CopyError::SessionInactive),
                Some(session) if session.mode != mode => {
                    return Err(CopyError::ModeConflict {
                        active: session.mode.to_string(),
                    })
                }
                Some(session) => session.clone(),
            };

            session.deactivate();
            sessions.remove(&user_id);
        }

        let _ = self
            .logs
            .add_log(&ActivityLog {
                user_id: Some(user_id),
                level: "info".into(),
                action: "copy_trading_stop".into(),
                message: format!("Copy trading session stopped (mode: {})", mode),
                ..Default::default()
            })
            .await;

        info!(user_id, mode = %mode, "copy trading session stopped");

        Ok(())
    }

    /// Stop every session. Used on shutdown; in-flight actions observe the
    /// cleared flag on their next gate check.
    pub async fn stop_all(&self) {
        let drained: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.drain().map(|(_, s)| s).collect()
        };

        for session in drained {
            session.deactivate();
            info!(user_id = session.user_id, mode = %session.mode, "session stopped (shutdown)");
        }
    }
}
