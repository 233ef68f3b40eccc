//! Build-once bookkeeping.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::scene::EntityId;

bitflags! {
    /// Aspects of a data-block that are built separately.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BuildTag: u32 {
        const ANIMATION = 1 << 0;
        const PARAMETERS = 1 << 1;
        const SCENE_COMPOSITOR = 1 << 2;
        const SCENE_SEQUENCER = 1 << 3;
        const SCENE_AUDIO = 1 << 4;
        /// The whole data-block.
        const COMPLETE = u32::MAX;
    }
}

impl Default for BuildTag {
    fn default() -> Self {
        BuildTag::COMPLETE
    }
}

/// Records which aspects of which data-blocks were built in the current
/// pass. Unseen data-blocks have no bits set.
#[derive(Debug, Default)]
pub struct BuilderMap {
    built: HashMap<EntityId, BuildTag>,
}

impl BuilderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every bit of `tag` is already set for `id`.
    pub fn check_is_built(&self, id: EntityId, tag: BuildTag) -> bool {
        self.built
            .get(&id)
            .is_some_and(|built| built.contains(tag))
    }

    /// Set `tag` for `id`, returning whether it was already fully set.
    pub fn check_is_built_and_tag(&mut self, id: EntityId, tag: BuildTag) -> bool {
        let built = self.built.entry(id).or_insert_with(BuildTag::empty);
        let was_built = built.contains(tag);
        built.insert(tag);
        was_built
    }

    pub fn tag_build(&mut self, id: EntityId, tag: BuildTag) {
        self.built
            .entry(id)
            .or_insert_with(BuildTag::empty)
            .insert(tag);
    }

    pub fn clear(&mut self) {
        self.built.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_entity_is_not_built() {
        let map = BuilderMap::new();
        assert!(!map.check_is_built(EntityId::new(3), BuildTag::COMPLETE));
        assert!(!map.check_is_built(EntityId::new(3), BuildTag::PARAMETERS));
    }

    #[test]
    fn check_and_tag_reports_previous_state() {
        let mut map = BuilderMap::new();
        let id = EntityId::new(1);
        assert!(!map.check_is_built_and_tag(id, BuildTag::default()));
        assert!(map.check_is_built_and_tag(id, BuildTag::default()));
    }

    #[test]
    fn aspects_are_independent() {
        let mut map = BuilderMap::new();
        let scene = EntityId::new(1);
        map.tag_build(scene, BuildTag::PARAMETERS);
        assert!(map.check_is_built(scene, BuildTag::PARAMETERS));
        assert!(!map.check_is_built(scene, BuildTag::SCENE_AUDIO));
        assert!(!map.check_is_built(scene, BuildTag::COMPLETE));

        assert!(!map.check_is_built_and_tag(scene, BuildTag::SCENE_AUDIO));
        assert!(map.check_is_built(scene, BuildTag::PARAMETERS | BuildTag::SCENE_AUDIO));
    }

    #[test]
    fn complete_covers_every_aspect() {
        let mut map = BuilderMap::new();
        let id = EntityId::new(7);
        map.tag_build(id, BuildTag::COMPLETE);
        assert!(map.check_is_built(id, BuildTag::SCENE_SEQUENCER));
        assert!(map.check_is_built(id, BuildTag::ANIMATION));
    }
}
