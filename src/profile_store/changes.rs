use std::sync::Arc;

use super::StorageHandle;
use crate::connection::Connection;

/// A change of the exported profile set.
///
/// A `None` connection means the profile identified by `handle` went away;
/// otherwise `connection` is the new content exported under `handle`.
#[derive(Debug, Clone)]
pub struct ProfileChange {
    /// UUID of the affected profile.
    pub uuid: String,
    /// Handle the profile is (or was) exported under.
    pub handle: StorageHandle,
    /// The new content, or `None` for a removal.
    pub connection: Option<Arc<Connection>>,
}

impl ProfileChange {
    /// Whether this change removes the profile.
    pub fn is_removal(&self) -> bool {
        self.connection.is_none()
    }
}
