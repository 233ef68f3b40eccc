//! Traversal state threaded through collection descent.

use crate::scene::EntityId;

/// Visibility state of the collection being expanded.
///
/// A collection is visible when it is not hidden for the graph's mode and
/// its parent is visible. The context is passed down by value, so returning
/// from a child restores the parent's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildContext {
    collection: Option<EntityId>,
    is_parent_collection_visible: bool,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::root()
    }
}

impl BuildContext {
    /// Context of a view layer's top level.
    pub fn root() -> Self {
        Self {
            collection: None,
            is_parent_collection_visible: true,
        }
    }

    /// Context for the collection instanced by an object.
    pub fn instanced(is_object_visible: bool) -> Self {
        Self {
            collection: None,
            is_parent_collection_visible: is_object_visible,
        }
    }

    /// Context for the children of `collection`.
    pub fn enter_collection(&self, collection: EntityId, is_visible: bool) -> Self {
        Self {
            collection: Some(collection),
            is_parent_collection_visible: is_visible,
        }
    }

    pub fn collection(&self) -> Option<EntityId> {
        self.collection
    }

    pub fn is_parent_collection_visible(&self) -> bool {
        self.is_parent_collection_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entering_does_not_change_parent() {
        let root = BuildContext::root();
        let child = root.enter_collection(EntityId::new(4), false);
        assert!(root.is_parent_collection_visible());
        assert!(!child.is_parent_collection_visible());
        assert_eq!(child.collection(), Some(EntityId::new(4)));
        assert_eq!(root.collection(), None);
    }

    #[test]
    fn instancing_follows_object_visibility() {
        assert!(BuildContext::instanced(true).is_parent_collection_visible());
        assert!(!BuildContext::instanced(false).is_parent_collection_visible());
        assert_eq!(BuildContext::default(), BuildContext::root());
    }
}
