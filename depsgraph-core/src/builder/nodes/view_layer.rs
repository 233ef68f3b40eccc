//! View layer: the usual root of a build.

use tracing::{debug, warn};

use super::DepsgraphNodeBuilder;
use crate::builder::context::BuildContext;
use crate::graph::{LinkedState, NodeType, OpCode};
use crate::scene::{EntityId, IdType, LayerCollection, ObjectType};

impl<'a> DepsgraphNodeBuilder<'a> {
    /// Build view layer `view_layer_index` of `scene_id` and everything it
    /// shows. The background set scene follows with [`LinkedState::ViaSet`].
    pub fn build_view_layer(
        &mut self,
        scene_id: EntityId,
        view_layer_index: usize,
        linked_state: LinkedState,
    ) {
        let Some(entity) = self.entity(scene_id) else {
            return;
        };
        let Some(scene) = entity.as_scene() else {
            return;
        };
        let Some(view_layer) = scene.view_layers.get(view_layer_index) else {
            warn!(scene = %entity.display_name(), view_layer_index, "no such view layer");
            return;
        };
        if !self.scene_stack.insert(scene_id) {
            warn!(scene = %entity.display_name(), "background set loops back, not descending");
            return;
        }
        debug!(
            scene = %entity.display_name(),
            view_layer = %view_layer.name,
            ?linked_state,
            "building view layer"
        );

        let Some(index) = self.add_id_node(scene_id) else {
            self.scene_stack.remove(&scene_id);
            return;
        };
        if let Some(id_node) = self.graph.id_node_mut(index) {
            id_node.linked_state = linked_state;
        }
        self.add_time_source();
        let previous_scene = self.scene.replace(scene_id);
        let previous_view_layer_index = std::mem::replace(&mut self.view_layer_index, view_layer_index);

        // Objects count as visible even when their base is restricted, or
        // their drivers would never run.
        let render = self.is_render();
        let bases = view_layer.bases.iter().filter(|base| base.is_enabled(render));
        for (base_index, base) in bases.enumerate() {
            self.build_object(Some(base_index), base.object, linked_state, true);
        }
        self.build_layer_collections(&view_layer.layer_collections);
        if let Some(camera) = scene.camera {
            self.build_object(None, camera, LinkedState::Indirectly, true);
        }
        if scene.rigid_body_world.is_some() {
            self.build_rigidbody(scene_id);
        }
        if entity.anim_data.is_some() {
            self.build_animdata(scene_id);
        }
        if let Some(world) = scene.world {
            self.build_world(world);
        }

        let main = self.main;
        for cache_file in main.iter_type(IdType::CacheFile) {
            self.build_cachefile(cache_file.id);
        }
        for mask in main.iter_type(IdType::Mask) {
            self.build_mask(mask.id);
        }
        for clip in main.iter_type(IdType::MovieClip) {
            self.build_movieclip(clip.id);
        }

        if let Some(material) = view_layer.material_override {
            self.build_material(material);
        }
        for line_set in &view_layer.freestyle_line_sets {
            self.build_freestyle_lineset(line_set);
        }
        if linked_state == LinkedState::Directly {
            self.build_scene_audio(scene_id);
            self.build_scene_sequencer(scene_id);
        }
        self.add_operation_node(scene_id, NodeType::LayerCollections, OpCode::ViewLayerEval, None);
        self.build_scene_compositor(scene_id);
        self.build_scene_parameters(scene_id);

        if let Some(set) = scene.background_set {
            self.build_view_layer(set, 0, LinkedState::ViaSet);
        }

        self.scene = previous_scene;
        self.view_layer_index = previous_view_layer_index;
        self.scene_stack.remove(&scene_id);
    }

    /// Hidden collections cut their whole subtree. Excluded ones are not
    /// built but their children still are.
    fn build_layer_collections(&mut self, layer_collections: &[LayerCollection]) {
        let render = self.is_render();
        for layer_collection in layer_collections {
            let Some(collection) = self
                .entity(layer_collection.collection)
                .and_then(|entity| entity.as_collection())
            else {
                continue;
            };
            if collection.is_hidden(render) {
                continue;
            }
            if !layer_collection.exclude {
                self.build_collection(
                    Some(layer_collection),
                    layer_collection.collection,
                    &BuildContext::root(),
                );
            }
            self.build_layer_collections(&layer_collection.children);
        }
    }

    /// Rigid body world of a scene: the simulation lives in the scene's
    /// transform component, and each simulated mesh copies its result back.
    pub fn build_rigidbody(&mut self, scene_id: EntityId) {
        let Some(scene) = self.entity(scene_id).and_then(|entity| entity.as_scene()) else {
            return;
        };
        let Some(world) = &scene.rigid_body_world else {
            return;
        };
        self.add_operation_node(scene_id, NodeType::Transform, OpCode::RigidbodyRebuild, None);
        let sim = self.add_operation_node(scene_id, NodeType::Transform, OpCode::RigidbodySim, None);
        self.set_as_entry(sim);
        self.set_as_exit(sim);

        if let Some(collection) = world.collection {
            self.build_collection(None, collection, &BuildContext::root());
            let main = self.main;
            for object_id in main.collection_objects_recursive(collection) {
                let simulated = main
                    .get(object_id)
                    .and_then(|entity| entity.as_object())
                    .is_some_and(|object| object.object_type == ObjectType::Mesh && object.rigid_body);
                if simulated {
                    self.ensure_operation_node(
                        object_id,
                        NodeType::Transform,
                        OpCode::RigidbodyTransformCopy,
                        None,
                    );
                }
            }
        }
        if let Some(constraints) = world.constraints {
            self.build_collection(None, constraints, &BuildContext::root());
        }
    }
}
