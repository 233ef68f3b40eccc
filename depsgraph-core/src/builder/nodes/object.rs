//! Objects, their data and particle systems.

use tracing::trace;

use super::DepsgraphNodeBuilder;
use crate::builder::context::BuildContext;
use crate::builder::map::BuildTag;
use crate::graph::{ComponentKey, LinkedState, NodeType, OpCode, OperationFlags, OperationKey};
use crate::scene::{
    EntityData, EntityId, GeometryKind, Modifier, Object, ObjectType, ParticleRender,
};

impl<'a> DepsgraphNodeBuilder<'a> {
    fn is_scene_camera(&self, object: EntityId) -> bool {
        self.scene
            .and_then(|scene| self.main.get(scene))
            .and_then(|scene| scene.as_scene())
            .is_some_and(|scene| scene.camera == Some(object))
    }

    /// Build an object. `base_index` is the position of the object's base in
    /// the view layer, when the object is reached through one.
    ///
    /// A repeated request does not rebuild the object: it promotes the
    /// linked state and visibility, and walks the instanced collection
    /// again.
    pub fn build_object(
        &mut self,
        base_index: Option<usize>,
        object_id: EntityId,
        linked_state: LinkedState,
        is_visible: bool,
    ) {
        let ctx = BuildContext::root();
        self.build_object_in(base_index, object_id, linked_state, is_visible, &ctx);
    }

    /// Build an object reached from inside `ctx`. Collections the object
    /// references inherit the visibility of the collections around it.
    pub fn build_object_in(
        &mut self,
        base_index: Option<usize>,
        object_id: EntityId,
        linked_state: LinkedState,
        is_visible: bool,
        ctx: &BuildContext,
    ) {
        let Some(entity) = self.entity(object_id) else {
            return;
        };
        let Some(object) = entity.as_object() else {
            return;
        };

        if self.built_map.check_is_built_and_tag(object_id, BuildTag::COMPLETE) {
            let Some(id_node) = self.graph.find_id_node(object_id) else {
                return;
            };
            if id_node.linked_state == LinkedState::Indirectly {
                self.build_object_flags(base_index, object_id, linked_state);
            }
            if let Some(id_node) = self.graph.find_id_node_mut(object_id) {
                id_node.linked_state = id_node.linked_state.max(linked_state);
                id_node.is_directly_visible |= is_visible;
                id_node.has_base |= base_index.is_some();
            }
            self.build_object_instance_collection(object, is_visible);
            return;
        }

        let Some(index) = self.add_id_node(object_id) else {
            return;
        };
        let is_directly_visible = self.is_scene_camera(object_id) || is_visible;
        if let Some(id_node) = self.graph.id_node_mut(index) {
            id_node.linked_state = linked_state;
            id_node.is_directly_visible = is_directly_visible;
            id_node.has_base |= base_index.is_some();
        }
        trace!(object = %entity.display_name(), ?linked_state, is_visible, "building object");

        self.build_object_from_layer(base_index, object_id, linked_state);
        self.build_object_transform(object_id, object);
        if let Some(parent) = object.parent {
            self.build_object_in(None, parent, LinkedState::Indirectly, is_visible, ctx);
        }
        self.build_object_modifiers(object_id, object, is_visible, ctx);
        for modifier in object.grease_pencil_modifiers.iter().chain(&object.shader_effects) {
            self.build_modifier_references(modifier, is_visible, ctx);
        }
        for constraint in &object.constraints {
            for &target in &constraint.targets {
                self.build_referenced_id(target, is_visible, ctx);
            }
        }
        self.build_object_data(object_id, object);
        // Parameters are used by drivers and animation, and inform the
        // dependency on the object data.
        self.build_parameters(object_id);
        self.build_idproperties_in(&entity.properties, ctx);
        // After the data: the data can affect object level animation.
        self.build_animdata(object_id);
        if !object.particle_systems.is_empty() {
            self.build_particle_systems(object_id, object, is_visible, ctx);
        }
        if let Some(texture) = object.force_field_texture {
            self.build_texture(texture);
        }
        if object.instance_collection.is_some() {
            self.build_object_instance_collection(object, is_visible);
            let op = self.add_operation_node(object_id, NodeType::Dupli, OpCode::Dupli, None);
            self.add_flags(op, OperationFlags::PINNED);
        }
        self.add_operation_node(
            object_id,
            NodeType::Synchronization,
            OpCode::SynchronizeToOriginal,
            None,
        );
    }

    /// Base flags, only for objects reached through a view layer base.
    pub fn build_object_flags(
        &mut self,
        base_index: Option<usize>,
        object: EntityId,
        linked_state: LinkedState,
    ) {
        let Some(base_index) = base_index else {
            return;
        };
        trace!(%object, base_index, from_set = linked_state == LinkedState::ViaSet, "base flags");
        self.ensure_operation_node(object, NodeType::ObjectFromLayer, OpCode::ObjectBaseFlags, None);
    }

    fn build_object_from_layer(
        &mut self,
        base_index: Option<usize>,
        object: EntityId,
        linked_state: LinkedState,
    ) {
        let op = self.add_operation_node(
            object,
            NodeType::ObjectFromLayer,
            OpCode::ObjectFromLayerEntry,
            None,
        );
        self.set_as_entry(op);
        let op = self.add_operation_node(
            object,
            NodeType::ObjectFromLayer,
            OpCode::ObjectFromLayerExit,
            None,
        );
        self.set_as_exit(op);
        self.build_object_flags(base_index, object, linked_state);
    }

    /// Instancing creates dependency paths no relation captures, so the
    /// instanced collection is walked on every request.
    pub fn build_object_instance_collection(&mut self, object: &Object, is_object_visible: bool) {
        if let Some(collection) = object.instance_collection {
            self.build_collection(None, collection, &BuildContext::instanced(is_object_visible));
        }
    }

    fn build_object_transform(&mut self, object_id: EntityId, object: &Object) {
        let op = self.add_operation_node(object_id, NodeType::Transform, OpCode::TransformInit, None);
        self.set_as_entry(op);
        self.add_operation_node(object_id, NodeType::Transform, OpCode::TransformLocal, None);
        if object.parent.is_some() {
            self.add_operation_node(object_id, NodeType::Transform, OpCode::TransformParent, None);
        }
        if !object.constraints.is_empty() {
            self.build_object_constraints(object_id);
        }
        self.add_operation_node(object_id, NodeType::Transform, OpCode::TransformEval, None);
        // Rigid body and point cache invalidation hook here.
        self.add_operation_node(
            object_id,
            NodeType::Transform,
            OpCode::TransformSimulationInit,
            None,
        );
        let op = self.add_operation_node(object_id, NodeType::Transform, OpCode::TransformFinal, None);
        self.set_as_exit(op);
    }

    fn build_object_constraints(&mut self, object: EntityId) {
        self.add_operation_node(object, NodeType::Transform, OpCode::TransformConstraints, None);
    }

    fn build_object_modifiers(
        &mut self,
        object_id: EntityId,
        object: &Object,
        is_visible: bool,
        ctx: &BuildContext,
    ) {
        if object.modifiers.is_empty() {
            return;
        }
        let render = self.is_render();
        self.add_operation_node(object_id, NodeType::Geometry, OpCode::Visibility, None);
        for modifier in &object.modifiers {
            let op = self.add_operation_node(
                object_id,
                NodeType::Geometry,
                OperationKey::new(OpCode::Modifier, &modifier.name, -1),
                None,
            );
            if !modifier.is_enabled(render) {
                self.add_flags(op, OperationFlags::MUTE);
            }
        }
        for modifier in &object.modifiers {
            self.build_modifier_references(modifier, is_visible, ctx);
        }
    }

    fn build_modifier_references(
        &mut self,
        modifier: &Modifier,
        is_parent_visible: bool,
        ctx: &BuildContext,
    ) {
        for &id in &modifier.references {
            self.build_referenced_id(id, is_parent_visible, ctx);
        }
    }

    /// Build a data-block referenced by a modifier or constraint. Objects
    /// inherit the visibility of their user, collections the visibility of
    /// the collections around it.
    fn build_referenced_id(&mut self, id: EntityId, is_parent_visible: bool, ctx: &BuildContext) {
        match self.main.get(id).map(|entity| &entity.data) {
            Some(EntityData::Object(_)) => {
                self.build_object_in(None, id, LinkedState::Indirectly, is_parent_visible, ctx)
            }
            _ => self.build_id_in(id, ctx),
        }
    }

    fn build_object_data(&mut self, object_id: EntityId, object: &Object) {
        let Some(data) = object.data else {
            return;
        };
        match object.object_type {
            object_type if object_type.is_geometry() => {
                self.build_object_data_geometry(object_id, object, data)
            }
            ObjectType::Armature => self.build_rig(object_id, object, data),
            ObjectType::Light => self.build_light(data),
            ObjectType::Camera => self.build_camera(data),
            ObjectType::LightProbe => {
                self.build_lightprobe(data);
                self.add_operation_node(object_id, NodeType::Parameters, OpCode::LightProbeEval, None);
            }
            ObjectType::Speaker => {
                self.build_speaker(data);
                self.add_operation_node(object_id, NodeType::Audio, OpCode::SpeakerEval, None);
            }
            _ => {
                if !self.built_map.check_is_built(data, BuildTag::COMPLETE) {
                    self.build_animdata(data);
                }
            }
        }
    }

    fn build_object_data_geometry(&mut self, object_id: EntityId, object: &Object, data: EntityId) {
        let op = self.add_operation_node(object_id, NodeType::Geometry, OpCode::GeometryEvalInit, None);
        self.set_as_entry(op);
        let op = self.add_operation_node(object_id, NodeType::Geometry, OpCode::GeometryEval, None);
        self.set_as_exit(op);
        self.build_materials(&object.materials);
        if object.has_point_cache {
            self.add_operation_node(object_id, NodeType::PointCache, OpCode::PointCacheReset, None);
        }
        self.build_object_data_geometry_datablock(data);
        self.build_dimensions(object_id);
        self.add_operation_node(object_id, NodeType::BatchCache, OpCode::GeometrySelectUpdate, None);
    }

    /// Build a geometry data-block: mesh, curve, lattice and so on.
    pub fn build_object_data_geometry_datablock(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::Geometry(geometry) = &entity.data else {
            return;
        };
        self.add_id_node(id);
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        if let Some(key) = geometry.shape_key {
            self.build_shapekeys(key);
        }

        let op = self.add_operation_node(id, NodeType::Geometry, OpCode::GeometryEval, None);
        self.set_as_entry(op);
        match geometry.kind {
            GeometryKind::CurveLegacy => {
                let objects = [geometry.bevel_object, geometry.taper_object, geometry.text_on_curve];
                for object in objects.into_iter().flatten() {
                    self.build_object(None, object, LinkedState::Indirectly, false);
                }
            }
            GeometryKind::Curves => {
                if let Some(surface) = geometry.surface {
                    self.build_object(None, surface, LinkedState::Indirectly, false);
                }
            }
            _ => {}
        }
        let op = self.add_operation_node(id, NodeType::Geometry, OpCode::GeometryEvalDone, None);
        self.set_as_exit(op);

        // Parameters for driver sources.
        self.build_parameters(id);
        self.add_operation_node(id, NodeType::BatchCache, OpCode::GeometrySelectUpdate, None);
        self.add_operation_node(id, NodeType::Shading, OpCode::Shading, None);
        self.build_materials(&geometry.materials);
    }

    pub fn build_materials(&mut self, materials: &[Option<EntityId>]) {
        for &material in materials.iter().flatten() {
            self.build_material(material);
        }
    }

    pub fn build_shapekeys(&mut self, key_id: EntityId) {
        if self.built_map.check_is_built_and_tag(key_id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(key_id) else {
            return;
        };
        let EntityData::Key(key) = &entity.data else {
            return;
        };
        self.build_idproperties(&entity.properties);
        self.build_animdata(key_id);
        self.build_parameters(key_id);
        // Exit of the whole key, modifiers depend on it.
        self.add_operation_node(key_id, NodeType::Geometry, OpCode::GeometryShapekey, None);
        // Per block, so drivers can depend on single blocks.
        for block in &key.blocks {
            self.add_operation_node(
                key_id,
                NodeType::Parameters,
                OperationKey::new(OpCode::ParametersEval, block, -1),
                None,
            );
        }
    }

    fn build_particle_systems(
        &mut self,
        object_id: EntityId,
        object: &Object,
        is_visible: bool,
        ctx: &BuildContext,
    ) {
        let component = ComponentKey::from(NodeType::ParticleSystem);
        let op = self.add_operation_node(
            object_id,
            component.clone(),
            OpCode::ParticleSystemInit,
            None,
        );
        self.set_as_entry(op);

        for system in &object.particle_systems {
            // Built once, however many systems share the settings.
            self.build_particle_settings(system.settings);
            self.add_operation_node(
                object_id,
                component.clone(),
                OperationKey::new(OpCode::ParticleSystemEval, &system.name, -1),
                None,
            );
            let Some(EntityData::Particle(settings)) =
                self.main.get(system.settings).map(|entity| &entity.data)
            else {
                continue;
            };
            if settings.uses_targets() {
                for &target in system.targets.iter().filter(|&&target| target != object_id) {
                    self.build_object_in(None, target, LinkedState::Indirectly, is_visible, ctx);
                }
            }
            match settings.render_as {
                ParticleRender::Object => {
                    if let Some(instance) = settings.instance_object {
                        self.build_object_in(
                            None,
                            instance,
                            LinkedState::Indirectly,
                            is_visible,
                            ctx,
                        );
                    }
                }
                ParticleRender::Collection => {
                    if let Some(collection) = settings.instance_collection {
                        self.build_collection(None, collection, &BuildContext::instanced(is_visible));
                    }
                }
                ParticleRender::Halo | ParticleRender::Path => {}
            }
        }

        let op = self.add_operation_node(object_id, component, OpCode::ParticleSystemDone, None);
        self.set_as_exit(op);
    }

    pub fn build_particle_settings(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::Particle(settings) = &entity.data else {
            return;
        };
        self.add_id_node(id);
        self.build_animdata(id);
        self.build_parameters(id);
        self.build_idproperties(&entity.properties);

        let op = self.add_operation_node(id, NodeType::ParticleSettings, OpCode::ParticleSettingsInit, None);
        self.set_as_entry(op);
        self.add_operation_node(id, NodeType::ParticleSettings, OpCode::ParticleSettingsReset, None);
        let op = self.add_operation_node(id, NodeType::ParticleSettings, OpCode::ParticleSettingsEval, None);
        self.set_as_exit(op);

        for &texture in &settings.textures {
            self.build_texture(texture);
        }
    }

    pub fn build_camera(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::Camera(camera) = &entity.data else {
            return;
        };
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
        if let Some(focus) = camera.dof_object {
            self.build_object(None, focus, LinkedState::Indirectly, false);
        }
    }
}
