//! Node tree data-block payload.

use serde::{Deserialize, Serialize};

use super::anim::{foreach_property_id, IdProperty};
use super::id::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeTreeType {
    #[default]
    Shader,
    Compositor,
    Texture,
    Geometry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTree {
    pub tree_type: NodeTreeType,
    pub nodes: Vec<TreeNode>,
    /// Interface sockets of the tree.
    pub inputs: Vec<TreeSocket>,
    pub outputs: Vec<TreeSocket>,
    /// Set when an image texture node plays an image sequence or movie.
    pub has_image_animation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TreeNodeKind {
    #[default]
    Regular,
    Group,
    CustomGroup,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeNode {
    pub name: String,
    pub kind: TreeNodeKind,
    /// Data-block attached to the node (image, material, node group, ...).
    pub id: Option<EntityId>,
    pub properties: Vec<IdProperty>,
    pub inputs: Vec<TreeSocket>,
    pub outputs: Vec<TreeSocket>,
}

impl TreeNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, TreeNodeKind::Group | TreeNodeKind::CustomGroup)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeSocket {
    pub name: String,
    pub properties: Vec<IdProperty>,
    /// Default value of object, image, collection, texture and material
    /// sockets.
    pub value: Option<EntityId>,
}

impl TreeSocket {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: EntityId) -> Self {
        self.value = Some(value);
        self
    }
}

impl NodeTree {
    pub fn new(tree_type: NodeTreeType) -> Self {
        Self {
            tree_type,
            ..Self::default()
        }
    }

    pub fn with_node(mut self, node: TreeNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn foreach_id(&self, f: &mut impl FnMut(EntityId)) {
        for node in &self.nodes {
            if let Some(id) = node.id {
                f(id);
            }
            foreach_property_id(&node.properties, f);
            foreach_socket_id(&node.inputs, f);
            foreach_socket_id(&node.outputs, f);
        }
        foreach_socket_id(&self.inputs, f);
        foreach_socket_id(&self.outputs, f);
    }
}

fn foreach_socket_id(sockets: &[TreeSocket], f: &mut impl FnMut(EntityId)) {
    for socket in sockets {
        if let Some(value) = socket.value {
            f(value);
        }
        foreach_property_id(&socket.properties, f);
    }
}
