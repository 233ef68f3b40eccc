//! Id Nodes
//!
//! One node per data-block in the graph. Besides its components an id node
//! carries the bookkeeping that survives rebuilds: the copy-on-write
//! duplicate, visibility masks, evaluation flags and custom data masks.

use indexmap::IndexMap;

use super::component::ComponentNode;
use super::node::{
    ComponentKey, ComponentRef, CustomDataMasks, IdComponentsMask, LinkedState, NodeType,
    RecalcFlags,
};
use crate::cow::CowId;
use crate::scene::{EntityId, IdType};

#[derive(Debug)]
pub struct IdNode {
    index: usize,
    id_orig: EntityId,
    id_type: IdType,
    name: String,

    /// Evaluated duplicate. `None` when the type does not need one, or
    /// while a rebuild holds it in its snapshot.
    id_cow: Option<CowId>,

    components: IndexMap<ComponentKey, ComponentNode>,

    /// Evaluated because it is visible, not only as a dependency. New nodes
    /// start visible; objects and collections decide for themselves.
    pub is_directly_visible: bool,
    pub has_base: bool,
    pub linked_state: LinkedState,
    /// All objects and children of a collection were built.
    pub is_collection_fully_expanded: bool,

    pub visible_components_mask: IdComponentsMask,
    pub previously_visible_components_mask: IdComponentsMask,

    pub eval_flags: u32,
    pub previous_eval_flags: u32,

    pub customdata_masks: CustomDataMasks,
    pub previous_customdata_masks: CustomDataMasks,

    /// Update flags accumulated since the last evaluation.
    pub recalc: RecalcFlags,
}

impl IdNode {
    pub(crate) fn new(
        index: usize,
        id_orig: EntityId,
        id_type: IdType,
        name: String,
        id_cow: Option<CowId>,
    ) -> Self {
        Self {
            index,
            id_orig,
            id_type,
            name,
            id_cow,
            components: IndexMap::new(),
            is_directly_visible: true,
            has_base: false,
            linked_state: LinkedState::default(),
            is_collection_fully_expanded: false,
            visible_components_mask: 0,
            previously_visible_components_mask: 0,
            eval_flags: 0,
            previous_eval_flags: 0,
            customdata_masks: CustomDataMasks::default(),
            previous_customdata_masks: CustomDataMasks::default(),
            recalc: RecalcFlags::empty(),
        }
    }

    /// Position of this node in the graph.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id_orig(&self) -> EntityId {
        self.id_orig
    }

    pub fn id_type(&self) -> IdType {
        self.id_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_cow(&self) -> Option<&CowId> {
        self.id_cow.as_ref()
    }

    /// Move the duplicate out, leaving the node without one.
    pub(crate) fn take_cow(&mut self) -> Option<CowId> {
        self.id_cow.take()
    }

    /// Return the existing component, or create it.
    pub fn add_component(&mut self, node_type: NodeType, name: &str) -> ComponentRef {
        let key = ComponentKey::new(node_type, name);
        if let Some(component) = self.components.get_index_of(&key) {
            return ComponentRef {
                id_node: self.index,
                component,
            };
        }
        let this = ComponentRef {
            id_node: self.index,
            component: self.components.len(),
        };
        self.components
            .insert(key.clone(), ComponentNode::new(key, this));
        this
    }

    pub fn find_component(&self, node_type: NodeType, name: &str) -> Option<&ComponentNode> {
        self.components.get(&ComponentKey::new(node_type, name))
    }

    pub fn find_component_index(&self, node_type: NodeType, name: &str) -> Option<usize> {
        self.components.get_index_of(&ComponentKey::new(node_type, name))
    }

    pub fn component(&self, index: usize) -> Option<&ComponentNode> {
        self.components.get_index(index).map(|(_, comp)| comp)
    }

    pub fn component_mut(&mut self, index: usize) -> Option<&mut ComponentNode> {
        self.components.get_index_mut(index).map(|(_, comp)| comp)
    }

    pub fn components(&self) -> impl Iterator<Item = &ComponentNode> {
        self.components.values()
    }

    pub(crate) fn components_mut(&mut self) -> impl Iterator<Item = &mut ComponentNode> {
        self.components.values_mut()
    }

    /// No components yet: the node was created in the current build.
    pub fn is_newly_created(&self) -> bool {
        self.components.is_empty()
    }

    /// Bits of every component type present on the node.
    pub fn components_mask(&self) -> IdComponentsMask {
        self.components
            .keys()
            .fold(0, |mask, key| mask | key.node_type.bit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_component_is_idempotent() {
        let mut node = IdNode::new(3, EntityId::new(1), IdType::Object, "OBCube".into(), None);
        assert!(node.is_newly_created());
        let first = node.add_component(NodeType::Transform, "");
        let again = node.add_component(NodeType::Transform, "");
        let bone = node.add_component(NodeType::Bone, "Hand");
        assert_eq!(first, again);
        assert_ne!(first, bone);
        assert_eq!(first.id_node, 3);
        assert_eq!(node.components().count(), 2);
        assert!(node.find_component(NodeType::Bone, "Foot").is_none());
        assert_eq!(
            node.components_mask(),
            NodeType::Transform.bit() | NodeType::Bone.bit()
        );
    }
}
