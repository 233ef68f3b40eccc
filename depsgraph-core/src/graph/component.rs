//! Component Nodes
//!
//! A component groups the operations of one aspect of a data-block
//! (transform, geometry, one pose bone, ...). Operations are keyed by
//! (opcode, name, name tag) and the key is unique within the component.

use indexmap::IndexMap;

use super::node::{ComponentKey, ComponentRef, EvalCallback, NodeType, OpCode, OperationKey};
use super::operation::OperationNode;
use crate::error::GraphError;

#[derive(Debug)]
pub struct ComponentNode {
    key: ComponentKey,

    /// Address of this component; `id_node` is the owning id node.
    this: ComponentRef,

    operations: IndexMap<OperationKey, OperationNode>,

    entry_operation: Option<usize>,
    exit_operation: Option<usize>,
}

impl ComponentNode {
    pub(crate) fn new(key: ComponentKey, this: ComponentRef) -> Self {
        Self {
            key,
            this,
            operations: IndexMap::new(),
            entry_operation: None,
            exit_operation: None,
        }
    }

    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    pub fn node_type(&self) -> NodeType {
        self.key.node_type
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// Address of this component.
    pub fn this(&self) -> ComponentRef {
        self.this
    }

    /// Index of the owning id node.
    pub fn owner(&self) -> usize {
        self.this.id_node
    }

    pub fn identifier(&self) -> String {
        if self.key.name.is_empty() {
            self.key.node_type.to_string()
        } else {
            format!("{}({})", self.key.node_type, self.key.name)
        }
    }

    pub fn find_operation(&self, opcode: OpCode, name: &str, name_tag: i32) -> Option<&OperationNode> {
        self.operations.get(&OperationKey::new(opcode, name, name_tag))
    }

    pub fn find_operation_index(&self, opcode: OpCode, name: &str, name_tag: i32) -> Option<usize> {
        self.operations
            .get_index_of(&OperationKey::new(opcode, name, name_tag))
    }

    /// Create an operation. Fails with the index of the existing operation
    /// when the key is already taken.
    pub fn add_operation(
        &mut self,
        callback: Option<EvalCallback>,
        opcode: OpCode,
        name: &str,
        name_tag: i32,
    ) -> Result<usize, GraphError> {
        let key = OperationKey::new(opcode, name, name_tag);
        if let Some(existing) = self.operations.get_index_of(&key) {
            return Err(GraphError::DuplicateOperation {
                component: self.identifier(),
                opcode,
                name: name.to_string(),
                name_tag,
                existing,
            });
        }
        let (index, _) = self
            .operations
            .insert_full(key.clone(), OperationNode::new(key, callback, self.this));
        Ok(index)
    }

    pub fn operation(&self, index: usize) -> Option<&OperationNode> {
        self.operations.get_index(index).map(|(_, op)| op)
    }

    pub fn operation_mut(&mut self, index: usize) -> Option<&mut OperationNode> {
        self.operations.get_index_mut(index).map(|(_, op)| op)
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationNode> {
        self.operations.values()
    }

    pub(crate) fn operations_mut(&mut self) -> impl Iterator<Item = &mut OperationNode> {
        self.operations.values_mut()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn entry_operation(&self) -> Option<&OperationNode> {
        self.entry_operation.and_then(|index| self.operation(index))
    }

    pub fn exit_operation(&self) -> Option<&OperationNode> {
        self.exit_operation.and_then(|index| self.operation(index))
    }

    pub(crate) fn set_entry_operation(&mut self, index: usize) {
        debug_assert!(
            self.entry_operation.map_or(true, |current| current == index),
            "component {} already has an entry operation",
            self.identifier()
        );
        self.entry_operation = Some(index);
    }

    pub(crate) fn set_exit_operation(&mut self, index: usize) {
        debug_assert!(
            self.exit_operation.map_or(true, |current| current == index),
            "component {} already has an exit operation",
            self.identifier()
        );
        self.exit_operation = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component() -> ComponentNode {
        ComponentNode::new(
            ComponentKey::new(NodeType::Bone, "Hand"),
            ComponentRef {
                id_node: 0,
                component: 2,
            },
        )
    }

    #[test]
    fn add_and_find_operation() {
        let mut comp = component();
        let index = comp.add_operation(None, OpCode::BoneLocal, "", -1).unwrap();
        assert_eq!(comp.find_operation_index(OpCode::BoneLocal, "", -1), Some(index));
        assert!(comp.find_operation(OpCode::BoneDone, "", -1).is_none());
        assert_eq!(comp.operation(index).unwrap().owner(), comp.this());
        assert_eq!(comp.identifier(), "Bone(Hand)");
    }

    #[test]
    fn duplicate_operation_is_rejected() {
        let mut comp = component();
        let first = comp.add_operation(None, OpCode::Driver, "location", 0).unwrap();
        // Same opcode and name with another tag is a different operation.
        comp.add_operation(None, OpCode::Driver, "location", 1).unwrap();
        match comp.add_operation(None, OpCode::Driver, "location", 0) {
            Err(GraphError::DuplicateOperation { existing, .. }) => assert_eq!(existing, first),
            other => panic!("expected duplicate error, got {:?}", other),
        }
        assert_eq!(comp.len(), 2);
    }
}
