use crate::models::chat::{ SessionId, SessionSummary };

/// Client-side cache of the backend session list.
///
/// Holds either the last server snapshot or that snapshot minus optimistic
/// removals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionDirectory {
    sessions: Vec<SessionSummary>,
}

impl SessionDirectory {
    pub fn set_all(self, sessions: Vec<SessionSummary>) -> Self {
        Self { sessions }
    }

    pub fn remove_by_id(mut self, id: &SessionId) -> Self {
        self.sessions.retain(|s| &s.id != id);
        self
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.iter().any(|s| &s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionSummary> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
