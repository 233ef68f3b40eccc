//! Animation data, actions and drivers.

use super::DepsgraphNodeBuilder;
use crate::builder::map::BuildTag;
use crate::graph::{ComponentKey, NodeType, OpCode, OperationKey};
use crate::scene::api_path::resolve_custom_property;
use crate::scene::{Entity, EntityData, EntityId, FCurve, NlaStrip};

impl<'a> DepsgraphNodeBuilder<'a> {
    /// Animation of any data-block: action, NLA and drivers.
    pub fn build_animdata(&mut self, id: EntityId) {
        self.build_animation_images(id);
        let Some(entity) = self.entity(id) else {
            return;
        };
        let Some(anim_data) = &entity.anim_data else {
            return;
        };
        if let Some(action) = anim_data.action {
            self.build_action(action);
        }
        self.add_id_node(id);
        if anim_data.action.is_some() || !anim_data.nla_tracks.is_empty() {
            let op = self.add_operation_node(id, NodeType::Animation, OpCode::AnimationEntry, None);
            self.set_as_entry(op);
            self.add_operation_node(id, NodeType::Animation, OpCode::AnimationEval, None);
            let op = self.add_operation_node(id, NodeType::Animation, OpCode::AnimationExit, None);
            self.set_as_exit(op);
        }
        for track in &anim_data.nla_tracks {
            self.build_animdata_nlastrip_targets(&track.strips);
        }
        for fcurve in &anim_data.drivers {
            self.build_driver(id, fcurve);
        }
    }

    fn build_animdata_nlastrip_targets(&mut self, strips: &[NlaStrip]) {
        for strip in strips {
            match strip.action {
                Some(action) => self.build_action(action),
                None => self.build_animdata_nlastrip_targets(&strip.strips),
            }
        }
    }

    /// Image sequences and movies used by shading need per-frame updates.
    fn build_animation_images(&mut self, id: EntityId) {
        let Some(entity) = self.main.get(id) else {
            return;
        };
        if self.uses_image_animation(entity) {
            self.add_operation_node(id, NodeType::ImageAnimation, OpCode::ImageAnimation, None);
        }
    }

    fn uses_image_animation(&self, entity: &Entity) -> bool {
        let tree_animated = |tree: Option<EntityId>| {
            tree.and_then(|tree| self.main.get(tree))
                .and_then(Entity::as_node_tree)
                .is_some_and(|tree| tree.has_image_animation)
        };
        match &entity.data {
            EntityData::Material(material) => tree_animated(material.node_tree),
            EntityData::World(world) => tree_animated(world.node_tree),
            EntityData::Texture(texture) => texture
                .image
                .and_then(|image| self.main.get(image))
                .is_some_and(|image| matches!(&image.data, EntityData::Image(image) if image.animated)),
            _ => false,
        }
    }

    pub fn build_action(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        self.build_idproperties(&entity.properties);
        self.add_operation_node(id, NodeType::Animation, OpCode::AnimationEval, None);
    }

    /// One driver operation per (path, index). Drivers on the same
    /// property share it.
    pub fn build_driver(&mut self, id: EntityId, fcurve: &FCurve) {
        self.ensure_operation_node(
            id,
            NodeType::Parameters,
            OperationKey::new(OpCode::Driver, &fcurve.api_path, fcurve.array_index),
            None,
        );
        self.build_driver_variables(id, fcurve);
    }

    fn build_driver_variables(&mut self, id: EntityId, fcurve: &FCurve) {
        self.build_driver_id_property(id, &fcurve.api_path);
        for variable in &fcurve.variables {
            for target in &variable.targets {
                let Some(target_id) = target.id else {
                    continue;
                };
                self.build_id(target_id);
                self.build_driver_id_property(target_id, &target.api_path);
            }
        }
    }

    /// Custom properties read or written by drivers get their own
    /// operation. Properties of pose bones go to the bone component.
    pub fn build_driver_id_property(&mut self, id: EntityId, api_path: &str) {
        let Some(property) = resolve_custom_property(self.main, id, api_path) else {
            return;
        };
        let component = match &property.bone {
            Some(bone) => ComponentKey::new(NodeType::Bone, bone),
            None => ComponentKey::from(NodeType::Parameters),
        };
        self.ensure_operation_node(
            id,
            component,
            OperationKey::new(OpCode::IdProperty, &property.name, -1),
            None,
        );
    }
}
