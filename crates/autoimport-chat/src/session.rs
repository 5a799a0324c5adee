//! Holder for the opaque session identifier issued by the backend.

/// The backend's conversation identifier, absent until the first reply that
/// carries one.
///
/// The identifier is never inspected or generated locally. A reply without a
/// `session_id` leaves the current value alone; a reply with one replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    id: Option<String>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Overwrite the identifier. Returns `true` if the stored value changed.
    pub fn set(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.id.as_deref() == Some(id.as_str()) {
            return false;
        }
        self.id = Some(id);
        true
    }

    pub fn clear(&mut self) {
        self.id = None;
    }

    pub fn is_assigned(&self) -> bool {
        self.id.is_some()
    }
}
