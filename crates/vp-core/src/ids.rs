use core::fmt;

use serde::{Deserialize, Serialize};

/// Integer handle assigned by the remote server to one of its objects.
pub type RemoteId = i64;

/// Value every id holds until a file has been opened.
pub const UNSET_ID: RemoteId = -1;

/// Role of a remote object within one opened file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectRole {
    File,
    View,
    Representation,
}

/// The three remote objects created for one opened file.
///
/// Kept as named fields: exactly these three roles exist.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyIds {
    pub file: RemoteId,
    pub view: RemoteId,
    pub representation: RemoteId,
}

impl ProxyIds {
    pub fn new(file: RemoteId, view: RemoteId, representation: RemoteId) -> Self {
        Self {
            file,
            view,
            representation,
        }
    }

    pub fn unset() -> Self {
        Self::new(UNSET_ID, UNSET_ID, UNSET_ID)
    }

    /// True once all three ids have been assigned by the server.
    pub fn is_set(&self) -> bool {
        self.file != UNSET_ID && self.view != UNSET_ID && self.representation != UNSET_ID
    }

    pub fn get(&self, role: ObjectRole) -> RemoteId {
        match role {
            ObjectRole::File => self.file,
            ObjectRole::View => self.view,
            ObjectRole::Representation => self.representation,
        }
    }
}

impl Default for ProxyIds {
    fn default() -> Self {
        Self::unset()
    }
}

impl fmt::Debug for ProxyIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProxyIds(file={}, view={}, rep={})",
            self.file, self.view, self.representation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ids_are_unset() {
        let ids = ProxyIds::default();
        assert_eq!(ids.file, UNSET_ID);
        assert_eq!(ids.view, UNSET_ID);
        assert_eq!(ids.representation, UNSET_ID);
        assert!(!ids.is_set());
    }

    #[test]
    fn role_lookup() {
        let ids = ProxyIds::new(1, 3, 2);
        assert!(ids.is_set());
        assert_eq!(ids.get(ObjectRole::File), 1);
        assert_eq!(ids.get(ObjectRole::View), 3);
        assert_eq!(ids.get(ObjectRole::Representation), 2);
    }

    #[test]
    fn partially_assigned_ids_are_not_set() {
        let ids = ProxyIds::new(1, UNSET_ID, 2);
        assert!(!ids.is_set());
    }
}
