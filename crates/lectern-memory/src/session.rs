//! In-process session store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use lectern_core::error::{LecternError, Result};
use lectern_core::types::{SessionMessage, Speaker};

type Transcript = Arc<Mutex<Vec<SessionMessage>>>;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Transcript>>,
    /// Oldest messages beyond this count are dropped. 0 keeps everything.
    max_retained: usize,
}

fn poisoned(e: impl std::fmt::Display) -> LecternError {
    LecternError::Other(format!("session lock poisoned: {e}"))
}

impl SessionStore {
    pub fn new(max_retained: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_retained,
        }
    }

    /// Return `id` if it names a live session, otherwise mint a fresh one.
    pub fn get_or_create(&self, id: Option<&str>) -> Result<String> {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            if self.sessions.read().map_err(poisoned)?.contains_key(id) {
                return Ok(id.to_string());
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.sessions
            .write()
            .map_err(poisoned)?
            .insert(id.clone(), Arc::default());
        tracing::debug!("🆕 Session created: {id}");
        Ok(id)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.sessions
            .read()
            .map(|s| s.contains_key(id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn transcript(&self, id: &str) -> Result<Transcript> {
        self.sessions
            .read()
            .map_err(poisoned)?
            .get(id)
            .cloned()
            .ok_or_else(|| LecternError::UnknownSession(id.to_string()))
    }

    fn push(&self, id: &str, messages: impl IntoIterator<Item = SessionMessage>) -> Result<()> {
        let transcript = self.transcript(id)?;
        let mut log = transcript.lock().map_err(poisoned)?;
        log.extend(messages);
        if self.max_retained > 0 && log.len() > self.max_retained {
            let excess = log.len() - self.max_retained;
            log.drain(..excess);
        }
        Ok(())
    }

    pub fn append_message(
        &self,
        id: &str,
        role: Speaker,
        content: &str,
        sources: Option<Vec<String>>,
    ) -> Result<()> {
        self.push(id, [SessionMessage::new(role, content, sources)])
    }

    /// Record a question and its answer under one lock so concurrent
    /// queries on the same session never interleave their turns.
    pub fn append_exchange(
        &self,
        id: &str,
        question: &str,
        answer: &str,
        sources: Vec<String>,
    ) -> Result<()> {
        self.push(
            id,
            [
                SessionMessage::new(Speaker::User, question, None),
                SessionMessage::new(Speaker::Assistant, answer, Some(sources)),
            ],
        )
    }

    /// The last `limit` messages, oldest first.
    pub fn recent_history(&self, id: &str, limit: usize) -> Result<Vec<SessionMessage>> {
        let transcript = self.transcript(id)?;
        let log = transcript.lock().map_err(poisoned)?;
        let start = log.len().saturating_sub(limit);
        Ok(log[start..].to_vec())
    }

    /// Empty a session's history. The id stays valid.
    pub fn clear(&self, id: &str) -> Result<()> {
        let transcript = self.transcript(id)?;
        transcript.lock().map_err(poisoned)?.clear();
        tracing::debug!("🧹 Session cleared: {id}");
        Ok(())
    }
}

/// Render history as `"User: ...\nAssistant: ..."`, or `None` when empty.
pub fn format_history(messages: &[SessionMessage]) -> Option<String> {
    if messages.is_empty() {
        return None;
    }
    Some(
        messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}
