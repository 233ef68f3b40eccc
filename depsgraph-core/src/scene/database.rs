//! Data-block Database
//!
//! [`Main`] owns every data-block of a session and hands out session
//! identifiers. The dependency graph only reads from it.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Deserialize;

use super::entity::{Entity, EntityData};
use super::id::{EntityId, IdType};
use crate::error::SceneError;

/// The database of all data-blocks in a session.
#[derive(Debug, Clone, Default)]
pub struct Main {
    entities: IndexMap<EntityId, Entity>,
    last_id: u32,
}

#[derive(Deserialize)]
struct Description {
    #[serde(default)]
    entities: Vec<Entity>,
}

impl Main {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data-block under a fresh session identifier.
    pub fn add(&mut self, mut entity: Entity) -> EntityId {
        self.last_id += 1;
        let id = EntityId::new(self.last_id);
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Add a data-block keeping its own session identifier.
    pub fn insert(&mut self, entity: Entity) -> Result<EntityId, SceneError> {
        let id = entity.id;
        if !id.is_set() {
            return Err(SceneError::UnsetId(entity.name));
        }
        if self.entities.contains_key(&id) {
            return Err(SceneError::DuplicateEntity(id));
        }
        entity.check_unique_names()?;
        self.last_id = self.last_id.max(id.raw());
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Remove a data-block. References to it elsewhere are left dangling,
    /// like a deleted data-block that was not yet unlinked from its users.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.shift_remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All data-blocks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All data-blocks of one type, in insertion order.
    pub fn iter_type(&self, id_type: IdType) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(move |entity| entity.id_type() == id_type)
    }

    /// Find a data-block by its display name (type code and name).
    pub fn find_by_name(&self, id_type: IdType, name: &str) -> Option<EntityId> {
        self.iter_type(id_type)
            .find(|entity| entity.name == name)
            .map(|entity| entity.id)
    }

    /// Load a database from a JSON description of the form
    /// `{"entities": [...]}`. Entities without an `id` get a fresh one after
    /// all explicit identifiers are registered.
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let description: Description = serde_json::from_str(json)?;
        let mut main = Main::new();
        let (explicit, implicit): (Vec<_>, Vec<_>) = description
            .entities
            .into_iter()
            .partition(|entity| entity.id.is_set());
        for entity in explicit {
            main.insert(entity)?;
        }
        for entity in implicit {
            entity.check_unique_names()?;
            main.add(entity);
        }
        Ok(main)
    }

    /// Outgoing references of a data-block, skipping embedded data.
    pub fn references(&self, id: EntityId) -> Vec<EntityId> {
        let mut references = Vec::new();
        if let Some(entity) = self.get(id) {
            entity.foreach_id(false, &mut |target| references.push(target));
        }
        references
    }

    /// Objects of a collection and of all its nested children, each listed
    /// once. Cycles in the collection hierarchy are cut.
    pub fn collection_objects_recursive(&self, collection: EntityId) -> Vec<EntityId> {
        let mut objects = Vec::new();
        let mut seen_objects = HashSet::new();
        let mut seen_collections = HashSet::new();
        let mut stack = vec![collection];
        while let Some(current) = stack.pop() {
            if !seen_collections.insert(current) {
                continue;
            }
            let Some(EntityData::Collection(data)) = self.get(current).map(|entity| &entity.data)
            else {
                continue;
            };
            for object in &data.objects {
                if seen_objects.insert(*object) {
                    objects.push(*object);
                }
            }
            stack.extend(data.children.iter().rev());
        }
        objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Collection, Object, ObjectType};

    #[test]
    fn add_assigns_increasing_ids() {
        let mut main = Main::new();
        let a = main.add(Entity::new("A", EntityData::Object(Object::new(ObjectType::Empty))));
        let b = main.add(Entity::new("B", EntityData::Object(Object::new(ObjectType::Empty))));
        assert!(a.is_set());
        assert!(b.raw() > a.raw());
        assert_eq!(main.get(a).map(|e| e.name.as_str()), Some("A"));
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut main = Main::new();
        let mut entity = Entity::new("A", EntityData::Action);
        entity.id = EntityId::new(3);
        main.insert(entity.clone()).unwrap();
        assert!(matches!(
            main.insert(entity),
            Err(SceneError::DuplicateEntity(id)) if id == EntityId::new(3)
        ));
        // Fresh ids continue after explicit ones.
        assert_eq!(main.add(Entity::new("B", EntityData::Action)), EntityId::new(4));
    }

    #[test]
    fn load_from_json() {
        let main = Main::from_json(
            r#"{"entities": [
                {"id": 1, "name": "Cube", "data": {"Object": {"object_type": "Mesh", "data": 2}}},
                {"id": 2, "name": "Cube", "data": {"Geometry": {"kind": "Mesh"}}},
                {"name": "Library", "data": {"Generic": "Library"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(main.len(), 3);
        assert_eq!(main.references(EntityId::new(1)), vec![EntityId::new(2)]);
        assert_eq!(main.find_by_name(IdType::Library, "Library"), Some(EntityId::new(3)));
    }

    #[test]
    fn load_rejects_repeated_operation_names() {
        let modifiers = Main::from_json(
            r#"{"entities": [
                {"id": 1, "name": "Cube", "data": {"Object": {
                    "object_type": "Mesh",
                    "modifiers": [{"name": "Bevel"}, {"name": "Bevel"}]
                }}}
            ]}"#,
        );
        assert!(matches!(
            modifiers,
            Err(SceneError::DuplicateName { kind: "modifier", .. })
        ));

        let pose = Main::from_json(
            r#"{"entities": [
                {"name": "Rig", "data": {"Object": {
                    "object_type": "Armature",
                    "pose": [{"name": "arm"}, {"name": "arm"}]
                }}}
            ]}"#,
        );
        assert!(matches!(
            pose,
            Err(SceneError::DuplicateName { kind: "pose channel", .. })
        ));
    }

    #[test]
    fn recursive_collection_objects_survive_cycles() {
        let mut main = Main::new();
        let object = main.add(Entity::new("Ob", EntityData::Object(Object::default())));
        let outer = main.add(Entity::new("Outer", EntityData::Collection(Collection::new())));
        let inner = main.add(Entity::new(
            "Inner",
            EntityData::Collection(
                Collection::new()
                    .with_objects([object])
                    .with_children([outer]),
            ),
        ));
        if let Some(EntityData::Collection(data)) = main.get_mut(outer).map(|e| &mut e.data) {
            data.children.push(inner);
            data.objects.push(object);
        }
        assert_eq!(main.collection_objects_recursive(outer), vec![object]);
    }
}
