//! Node trees and the shading data-blocks built around them.

use std::sync::Arc;

use tracing::error;

use super::DepsgraphNodeBuilder;
use crate::builder::context::BuildContext;
use crate::builder::map::BuildTag;
use crate::cow::CowHandle;
use crate::graph::{EvalCallback, EvalContext, LinkedState, NodeType, OpCode};
use crate::scene::{
    EntityData, EntityId, FreestyleLineSet, IdType, NodeTreeType, TreeNode, TreeSocket,
};

impl<'a> DepsgraphNodeBuilder<'a> {
    /// Build a node tree, its nodes and everything they reference. Group
    /// nodes recurse into their own tree.
    pub fn build_nodetree(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::NodeTree(tree) = &entity.data else {
            return;
        };
        self.add_id_node(id);
        self.build_parameters(id);
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.add_operation_node(id, NodeType::NtreeOutput, OpCode::NtreeOutput, None);
        if tree.tree_type == NodeTreeType::Geometry {
            let callback = self.get_cow_id(id).map(preprocess_node_tree_callback);
            self.add_operation_node(
                id,
                NodeType::NtreeGeometryPreprocess,
                OpCode::NtreeGeometryPreprocess,
                callback,
            );
        }

        for node in &tree.nodes {
            self.build_idproperties(&node.properties);
            for socket in node.inputs.iter().chain(&node.outputs) {
                self.build_nodetree_socket(socket);
            }
            self.build_nodetree_node_id(node);
        }

        for socket in tree.inputs.iter().chain(&tree.outputs) {
            self.build_idproperties(&socket.properties);
        }
    }

    fn build_nodetree_socket(&mut self, socket: &TreeSocket) {
        self.build_idproperties(&socket.properties);
        let Some(value) = socket.value else {
            return;
        };
        let Some(entity) = self.entity(value) else {
            return;
        };
        match &entity.data {
            EntityData::Object(_) => self.build_object(None, value, LinkedState::Indirectly, true),
            EntityData::Image(_) => self.build_image(value),
            EntityData::Collection(_) => self.build_collection(None, value, &BuildContext::root()),
            EntityData::Texture(_) => self.build_texture(value),
            EntityData::Material(_) => self.build_material(value),
            _ => {}
        }
    }

    fn build_nodetree_node_id(&mut self, node: &TreeNode) {
        let Some(id) = node.id else {
            return;
        };
        let Some(entity) = self.entity(id) else {
            return;
        };
        match &entity.data {
            EntityData::Material(_) => self.build_material(id),
            EntityData::Texture(_) => self.build_texture(id),
            EntityData::Image(_) => self.build_image(id),
            EntityData::Object(_) => self.build_object(None, id, LinkedState::Indirectly, true),
            EntityData::Scene(scene) => {
                self.build_scene_parameters(id);
                // Defocus nodes read the scene camera.
                if let Some(camera) = scene.camera {
                    self.build_object(None, camera, LinkedState::Indirectly, true);
                }
            }
            // Script nodes.
            EntityData::Text => {}
            EntityData::Mask(_) => self.build_mask(id),
            EntityData::MovieClip => self.build_movieclip(id),
            EntityData::VFont => self.build_vfont(id),
            EntityData::NodeTree(_) if node.is_group() => self.build_nodetree(id),
            _ => {
                error!(
                    node = %node.name,
                    id = %entity.display_name(),
                    id_type = entity.id_type().code(),
                    "unexpected data-block attached to node"
                );
                debug_assert!(false, "unexpected data-block attached to node {}", node.name);
            }
        }
    }

    pub fn build_material(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::Material(material) = &entity.data else {
            return;
        };
        self.add_id_node(id);
        self.add_operation_node(id, NodeType::Shading, OpCode::MaterialUpdate, None);
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
        if let Some(tree) = material.node_tree {
            self.build_nodetree(tree);
        }
    }

    pub fn build_texture(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::Texture(texture) = &entity.data else {
            return;
        };
        self.add_id_node(id);
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
        if let Some(tree) = texture.node_tree {
            self.build_nodetree(tree);
        }
        if let Some(image) = texture.image {
            self.build_image(image);
        }
        self.add_operation_node(id, NodeType::GenericDatablock, OpCode::GenericDatablockUpdate, None);
    }

    pub fn build_image(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        self.build_parameters(id);
        self.build_idproperties(&entity.properties);
        self.add_operation_node(id, NodeType::GenericDatablock, OpCode::GenericDatablockUpdate, None);
    }

    pub fn build_world(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::World(world) = &entity.data else {
            return;
        };
        self.add_id_node(id);
        self.add_operation_node(id, NodeType::Shading, OpCode::WorldUpdate, None);
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
        if let Some(tree) = world.node_tree {
            self.build_nodetree(tree);
        }
    }

    pub fn build_light(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::Light(light) = &entity.data else {
            return;
        };
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
        if let Some(tree) = light.node_tree {
            self.build_nodetree(tree);
        }
        self.add_operation_node(id, NodeType::Shading, OpCode::LightUpdate, None);
    }

    pub fn build_lightprobe(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        self.build_idproperties(&entity.properties);
        self.add_operation_node(id, NodeType::Parameters, OpCode::LightProbeEval, None);
        self.build_animdata(id);
        self.build_parameters(id);
    }

    pub fn build_vfont(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        self.build_parameters(id);
        self.build_idproperties(&entity.properties);
        self.add_operation_node(id, NodeType::GenericDatablock, OpCode::GenericDatablockUpdate, None);
    }

    pub fn build_freestyle_linestyle(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::LineStyle(line_style) = &entity.data else {
            return;
        };
        self.build_parameters(id);
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        if let Some(tree) = line_style.node_tree {
            self.build_nodetree(tree);
        }
        for &texture in &line_style.textures {
            self.build_texture(texture);
        }
    }

    pub fn build_freestyle_lineset(&mut self, line_set: &FreestyleLineSet) {
        if let Some(collection) = line_set.collection {
            self.build_collection(None, collection, &BuildContext::root());
        }
        if let Some(line_style) = line_set.line_style {
            self.build_freestyle_linestyle(line_style);
        }
    }
}

/// Geometry node trees are normalized once on their duplicate before
/// evaluation.
fn preprocess_node_tree_callback(handle: CowHandle) -> EvalCallback {
    Arc::new(move |_ctx: &EvalContext<'_>| {
        if let Some(cow) = handle.upgrade() {
            debug_assert_eq!(cow.id_type(), IdType::NodeTree);
            cow.mark_preprocessed();
        }
    })
}
