//! Per-browser session state, kept in memory.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{
    base::types::{ConversationTurn, ProjectReport},
    runtime::Runtime,
};

/// Sessions untouched for this long are dropped.
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// One browser's state: the initialized services, the chat so far, and the
/// report currently on screen.
#[derive(Default, Clone)]
pub struct Session {
    pub runtime: Option<Runtime>,
    pub history: Vec<ConversationTurn>,
    pub current: Option<ProjectReport>,
    /// Bumped on every clear; results computed before a clear are discarded.
    pub generation: u64,
}

impl Session {
    /// Forget everything, including the initialized services.
    pub fn clear(&mut self) {
        *self = Session {
            generation: self.generation + 1,
            ..Session::default()
        };
    }

    /// Apply `f` unless the session was cleared since `generation` was read.
    pub fn apply_if_current(&mut self, generation: u64, f: impl FnOnce(&mut Session)) -> bool {
        if self.generation != generation {
            return false;
        }

        f(self);
        true
    }

    pub fn view(&self, id: Uuid) -> SessionView {
        SessionView {
            id,
            initialized: self.runtime.is_some(),
            warnings: self.runtime.as_ref().map(|r| r.warnings.clone()).unwrap_or_default(),
            history: self.history.clone(),
            current: self.current.clone(),
        }
    }
}

/// What the page needs to render a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub initialized: bool,
    pub warnings: Vec<String>,
    pub history: Vec<ConversationTurn>,
    pub current: Option<ProjectReport>,
}

struct Slot {
    session: Session,
    touched: Instant,
}

/// All live sessions.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Slot>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a session, dropping any that expired.
    pub async fn create(&self) -> SessionView {
        let id = Uuid::new_v4();
        let session = Session::default();
        let view = session.view(id);

        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, slot| slot.touched.elapsed() <= self.ttl);
        if sessions.len() < before {
            debug!("Dropped {} expired sessions", before - sessions.len());
        }

        sessions.insert(id, Slot { session, touched: Instant::now() });

        view
    }

    /// A snapshot of a session.
    pub async fn get(&self, id: Uuid) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(&id)?;

        slot.touched = Instant::now();

        Some(slot.session.clone())
    }

    /// Apply `f` to a session, returning its view afterwards.
    pub async fn update<F>(&self, id: Uuid, f: F) -> Option<SessionView>
    where
        F: FnOnce(&mut Session),
    {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(&id)?;

        slot.touched = Instant::now();
        f(&mut slot.session);

        Some(slot.session.view(id))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
