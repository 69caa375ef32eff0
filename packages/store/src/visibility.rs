use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// The caller on whose behalf rows are read and written.
///
/// Ownerless rows are visible to everyone; owned rows only to their owner.
/// An anonymous viewer sees system rows and cannot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewer {
    user_id: Option<Uuid>,
}

impl Viewer {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn can_see(&self, owner: Option<Uuid>) -> bool {
        match owner {
            None => true,
            Some(owner) => self.user_id == Some(owner),
        }
    }

    /// The user id writes are attributed to.
    pub fn require_user(&self) -> StoreResult<Uuid> {
        self.user_id
            .ok_or_else(|| StoreError::Authorization("a signed-in user is required".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_rows_are_visible_to_everyone() {
        assert!(Viewer::anonymous().can_see(None));
        assert!(Viewer::user(Uuid::new_v4()).can_see(None));
    }

    #[test]
    fn owned_rows_are_visible_to_their_owner_only() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        assert!(Viewer::user(alice).can_see(Some(alice)));
        assert!(!Viewer::user(bob).can_see(Some(alice)));
        assert!(!Viewer::anonymous().can_see(Some(alice)));
    }

    #[test]
    fn anonymous_viewer_cannot_write() {
        assert!(matches!(
            Viewer::anonymous().require_user(),
            Err(StoreError::Authorization(_))
        ));
    }
}
