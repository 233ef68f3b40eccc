//! Graph statistics and structural checks.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::{ComponentRef, Depsgraph, OperationRef};

/// Node counts of a built graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub id_nodes: usize,
    pub components: usize,
    pub operations: usize,
    pub entry_tags: usize,
}

impl GraphStats {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn stats(graph: &Depsgraph) -> GraphStats {
    GraphStats {
        id_nodes: graph.id_node_count(),
        components: graph.id_nodes().map(|id_node| id_node.components().count()).sum(),
        operations: graph.operations().len(),
        entry_tags: graph.entry_tags().count(),
    }
}

/// Verify that every node addresses itself and its owner correctly, that
/// stored keys match the nodes they index, and that the flat operation list
/// covers exactly the operations owned by the components.
pub fn consistency_check(graph: &Depsgraph) -> Result<(), GraphError> {
    let mut owned_operations = 0;
    for (index, id_node) in graph.id_nodes().enumerate() {
        if id_node.index() != index {
            return Err(GraphError::InconsistentOwner(format!(
                "id node {} stored at {} claims index {}",
                id_node.name(),
                index,
                id_node.index()
            )));
        }
        if graph.find_id_node_index(id_node.id_orig()) != Some(index) {
            return Err(GraphError::DuplicateKey(format!("id node {}", id_node.name())));
        }
        for (component_index, comp) in id_node.components().enumerate() {
            let this = ComponentRef {
                id_node: index,
                component: component_index,
            };
            if comp.this() != this {
                return Err(GraphError::InconsistentOwner(format!(
                    "component {} of {} addresses {:?}",
                    comp.identifier(),
                    id_node.name(),
                    comp.this()
                )));
            }
            if id_node.find_component_index(comp.node_type(), comp.name()) != Some(component_index) {
                return Err(GraphError::DuplicateKey(format!(
                    "component {} of {}",
                    comp.identifier(),
                    id_node.name()
                )));
            }
            for (operation_index, op) in comp.operations().enumerate() {
                if op.owner() != this {
                    return Err(GraphError::InconsistentOwner(format!(
                        "operation {} of {} claims owner {:?}",
                        op.identifier(),
                        comp.identifier(),
                        op.owner()
                    )));
                }
                if comp.find_operation_index(op.opcode(), op.name(), op.name_tag())
                    != Some(operation_index)
                {
                    return Err(GraphError::DuplicateKey(format!(
                        "operation {} of {}",
                        op.identifier(),
                        comp.identifier()
                    )));
                }
            }
            owned_operations += comp.len();
        }
    }

    for &operation in graph.operations() {
        if graph.operation(operation).is_none() {
            return Err(GraphError::DanglingOperation(format_ref(operation)));
        }
    }
    if owned_operations != graph.operations().len() {
        return Err(GraphError::DanglingOperation(format!(
            "{} operations owned, {} listed",
            owned_operations,
            graph.operations().len()
        )));
    }
    Ok(())
}

fn format_ref(operation: OperationRef) -> String {
    format!(
        "{}/{}/{}",
        operation.component.id_node, operation.component.component, operation.operation
    )
}
