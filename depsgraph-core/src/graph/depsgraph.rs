//! The Dependency Graph
//!
//! [`Depsgraph`] owns every id node of one graph, the flat list of all
//! operations handed to the relation builder, and the set of operations
//! tagged for update ("entry tags").
//!
//! # Addressing
//!
//! Nodes are stored in insertion-ordered maps and addressed by index
//! ([`ComponentRef`], [`OperationRef`]). Nothing is removed between
//! `clear_all_nodes` calls, so handles stay valid for a whole build.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use super::component::ComponentNode;
use super::id_node::IdNode;
use super::node::{
    ComponentKey, ComponentRef, CustomDataMasks, EvalCallback, EvalContext, NodeType, OpCode,
    OperationFlags, OperationKey, OperationRef, RecalcFlags, UpdateSource,
};
use super::operation::OperationNode;
use crate::config::{BuildConfig, EvaluationMode};
use crate::cow::{self, CowHandle, CowId};
use crate::error::GraphError;
use crate::scene::{EntityId, IdType, Main};

/// The single time source of a graph.
#[derive(Debug, Default)]
pub struct TimeSourceNode {
    tagged: bool,
}

impl TimeSourceNode {
    pub fn is_tagged(&self) -> bool {
        self.tagged
    }
}

#[derive(Debug)]
pub struct Depsgraph {
    config: BuildConfig,
    id_nodes: IndexMap<EntityId, IdNode>,
    operations: Vec<OperationRef>,
    entry_tags: IndexSet<OperationRef>,
    time_source: Option<TimeSourceNode>,
    id_type_exists: u64,
}

impl Default for Depsgraph {
    fn default() -> Self {
        Self::new(BuildConfig::default())
    }
}

impl Depsgraph {
    /// Create an empty graph.
    pub fn new(config: BuildConfig) -> Self {
        let mut graph = Self {
            config,
            id_nodes: IndexMap::new(),
            operations: Vec::new(),
            entry_tags: IndexSet::new(),
            time_source: None,
            id_type_exists: 0,
        };
        graph.add_time_source();
        graph
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn mode(&self) -> EvaluationMode {
        self.config.mode
    }

    pub fn debug_name(&self) -> &str {
        &self.config.debug_name
    }

    // Id nodes.

    /// Return the id node of `id`, creating it when missing. A new node
    /// takes `id_cow_hint` as its duplicate, or allocates a fresh one when
    /// the type needs it.
    pub fn add_id_node(
        &mut self,
        id: EntityId,
        id_type: IdType,
        name: &str,
        id_cow_hint: Option<CowId>,
    ) -> usize {
        if let Some(index) = self.id_nodes.get_index_of(&id) {
            debug_assert!(
                id_cow_hint.is_none(),
                "copy-on-write hint passed for existing id node {}",
                name
            );
            return index;
        }
        let id_cow = match id_cow_hint {
            Some(cow) => Some(cow),
            None if cow::is_needed(id_type) => Some(CowId::new(id, id_type)),
            None => None,
        };
        let index = self.id_nodes.len();
        self.id_nodes
            .insert(id, IdNode::new(index, id, id_type, name.to_string(), id_cow));
        self.id_type_exists |= id_type.bit();
        index
    }

    pub fn find_id_node(&self, id: EntityId) -> Option<&IdNode> {
        self.id_nodes.get(&id)
    }

    pub fn find_id_node_mut(&mut self, id: EntityId) -> Option<&mut IdNode> {
        self.id_nodes.get_mut(&id)
    }

    pub fn find_id_node_index(&self, id: EntityId) -> Option<usize> {
        self.id_nodes.get_index_of(&id)
    }

    pub fn id_node(&self, index: usize) -> Option<&IdNode> {
        self.id_nodes.get_index(index).map(|(_, node)| node)
    }

    pub fn id_node_mut(&mut self, index: usize) -> Option<&mut IdNode> {
        self.id_nodes.get_index_mut(index).map(|(_, node)| node)
    }

    pub fn id_nodes(&self) -> impl Iterator<Item = &IdNode> {
        self.id_nodes.values()
    }

    pub(crate) fn id_nodes_mut(&mut self) -> impl Iterator<Item = &mut IdNode> {
        self.id_nodes.values_mut()
    }

    pub fn id_node_count(&self) -> usize {
        self.id_nodes.len()
    }

    /// Whether an id of this type was added since the last clear.
    pub fn id_type_exists(&self, id_type: IdType) -> bool {
        self.id_type_exists & id_type.bit() != 0
    }

    // Components and operations.

    pub fn component(&self, component: ComponentRef) -> Option<&ComponentNode> {
        self.id_node(component.id_node)?.component(component.component)
    }

    fn component_mut(&mut self, component: ComponentRef) -> Option<&mut ComponentNode> {
        self.id_node_mut(component.id_node)?
            .component_mut(component.component)
    }

    pub fn operation(&self, operation: OperationRef) -> Option<&OperationNode> {
        self.component(operation.component)?
            .operation(operation.operation)
    }

    pub fn operation_mut(&mut self, operation: OperationRef) -> Option<&mut OperationNode> {
        self.component_mut(operation.component)?
            .operation_mut(operation.operation)
    }

    /// Create an operation in `component` and append it to the flat list.
    pub fn add_operation(
        &mut self,
        component: ComponentRef,
        callback: Option<EvalCallback>,
        opcode: OpCode,
        name: &str,
        name_tag: i32,
    ) -> Result<OperationRef, GraphError> {
        let comp = self
            .component_mut(component)
            .ok_or_else(|| GraphError::InvalidHandle(format!("{:?}", component)))?;
        let operation = comp.add_operation(callback, opcode, name, name_tag)?;
        let operation = OperationRef {
            component,
            operation,
        };
        self.operations.push(operation);
        Ok(operation)
    }

    pub fn find_component(&self, id: EntityId, node_type: NodeType, name: &str) -> Option<&ComponentNode> {
        self.find_id_node(id)?.find_component(node_type, name)
    }

    pub fn find_operation_ref(
        &self,
        id: EntityId,
        node_type: NodeType,
        component_name: &str,
        opcode: OpCode,
        name: &str,
        name_tag: i32,
    ) -> Option<OperationRef> {
        let component = self.find_component(id, node_type, component_name)?;
        let operation = component.find_operation_index(opcode, name, name_tag)?;
        Some(OperationRef {
            component: component.this(),
            operation,
        })
    }

    pub fn find_operation(
        &self,
        id: EntityId,
        node_type: NodeType,
        component_name: &str,
        opcode: OpCode,
        name: &str,
        name_tag: i32,
    ) -> Option<&OperationNode> {
        self.find_component(id, node_type, component_name)?
            .find_operation(opcode, name, name_tag)
    }

    pub fn find_operation_by_key(
        &self,
        id: EntityId,
        component: &ComponentKey,
        operation: &OperationKey,
    ) -> Option<&OperationNode> {
        self.find_operation(
            id,
            component.node_type,
            &component.name,
            operation.opcode,
            &operation.name,
            operation.name_tag,
        )
    }

    /// Every operation of the graph in creation order.
    pub fn operations(&self) -> &[OperationRef] {
        &self.operations
    }

    /// Mark `operation` as the first one of its component.
    pub fn set_as_entry(&mut self, operation: OperationRef) {
        if let Some(comp) = self.component_mut(operation.component) {
            comp.set_entry_operation(operation.operation);
            if let Some(op) = comp.operation_mut(operation.operation) {
                op.flags |= OperationFlags::ENTRY;
            }
        }
    }

    /// Mark `operation` as the last one of its component.
    pub fn set_as_exit(&mut self, operation: OperationRef) {
        if let Some(comp) = self.component_mut(operation.component) {
            comp.set_exit_operation(operation.operation);
            if let Some(op) = comp.operation_mut(operation.operation) {
                op.flags |= OperationFlags::EXIT;
            }
        }
    }

    pub fn add_operation_flags(&mut self, operation: OperationRef, flags: OperationFlags) {
        if let Some(op) = self.operation_mut(operation) {
            op.flags |= flags;
        }
    }

    // Update tagging.

    /// Operations tagged for update, in tagging order.
    pub fn entry_tags(&self) -> impl Iterator<Item = OperationRef> + '_ {
        self.entry_tags.iter().copied()
    }

    /// Tag one operation for update.
    pub fn tag_operation(&mut self, operation: OperationRef, source: UpdateSource) {
        let Some(op) = self.operation_mut(operation) else {
            return;
        };
        let newly_tagged = !op.needs_update();
        op.flags |= OperationFlags::NEEDS_UPDATE | OperationFlags::DIRECTLY_MODIFIED;
        if source == UpdateSource::UserEdit {
            op.flags |= OperationFlags::USER_MODIFIED;
        }
        if newly_tagged {
            self.entry_tags.insert(operation);
        }
    }

    /// Tag the components of `id` that `flags` affect. The flags are also
    /// recorded on the id node and on its evaluated duplicate.
    pub fn id_tag_update(&mut self, id: EntityId, flags: RecalcFlags, source: UpdateSource) {
        let Some(id_node) = self.id_nodes.get_mut(&id) else {
            trace!(%id, ?flags, "update tag for id outside of the graph");
            return;
        };
        id_node.recalc |= flags;
        if let Some(cow) = id_node.id_cow() {
            cow.tag_recalc(flags);
        }
        let mut tagged = Vec::new();
        for flag in flags.iter() {
            let Some(node_type) = flag.component_type() else {
                continue;
            };
            for comp in id_node.components().filter(|comp| comp.node_type() == node_type) {
                tagged.extend((0..comp.len()).map(|operation| OperationRef {
                    component: comp.this(),
                    operation,
                }));
            }
        }
        trace!(%id, ?flags, ?source, operations = tagged.len(), "tagging id for update");
        for operation in tagged {
            self.tag_operation(operation, source);
        }
    }

    /// Drop all update tags, as done after an evaluation.
    pub fn clear_tags(&mut self) {
        let tag_flags = OperationFlags::NEEDS_UPDATE
            | OperationFlags::DIRECTLY_MODIFIED
            | OperationFlags::USER_MODIFIED;
        for id_node in self.id_nodes.values_mut() {
            id_node.recalc = RecalcFlags::empty();
            for comp in id_node.components_mut() {
                for op in comp.operations_mut() {
                    op.flags.remove(tag_flags);
                }
            }
        }
        self.entry_tags.clear();
        if let Some(time_source) = self.time_source.as_mut() {
            time_source.tagged = false;
        }
    }

    // Time source.

    pub fn add_time_source(&mut self) -> &TimeSourceNode {
        self.time_source.get_or_insert_with(TimeSourceNode::default)
    }

    pub fn time_source(&self) -> Option<&TimeSourceNode> {
        self.time_source.as_ref()
    }

    pub fn tag_time_source(&mut self) {
        if let Some(time_source) = self.time_source.as_mut() {
            time_source.tagged = true;
        }
    }

    // Copy-on-write.

    /// Evaluated duplicate of `id`, if the graph has one.
    pub fn get_cow_id(&self, id: EntityId) -> Option<&CowId> {
        self.find_id_node(id)?.id_cow()
    }

    pub fn cow_handle(&self, id: EntityId) -> Option<CowHandle> {
        self.get_cow_id(id).map(CowId::handle)
    }

    /// Run the copy-on-write operation of every visible id node. Returns the
    /// number of operations run.
    pub fn evaluate_copy_on_write(&self, main: &Main) -> usize {
        let ctx = EvalContext { main, graph: self };
        let mut evaluated = 0;
        for id_node in self.id_nodes.values() {
            if id_node.visible_components_mask == 0 {
                continue;
            }
            let Some(comp) = id_node.find_component(NodeType::CopyOnWrite, "") else {
                continue;
            };
            for op in comp.operations().filter(|op| !op.is_muted()) {
                if let Some(callback) = op.callback() {
                    callback(&ctx);
                    evaluated += 1;
                }
            }
        }
        debug!(graph = %self.debug_name(), evaluated, "copy-on-write evaluation done");
        evaluated
    }

    // Evaluation requests.

    pub fn add_special_eval_flag(&mut self, id: EntityId, flag: u32) -> Result<(), GraphError> {
        let id_node = self.find_id_node_mut(id).ok_or(GraphError::MissingIdNode(id))?;
        id_node.eval_flags |= flag;
        Ok(())
    }

    pub fn add_customdata_mask(
        &mut self,
        id: EntityId,
        masks: CustomDataMasks,
    ) -> Result<(), GraphError> {
        let id_node = self.find_id_node_mut(id).ok_or(GraphError::MissingIdNode(id))?;
        id_node.customdata_masks.merge(masks);
        Ok(())
    }

    // Build lifecycle.

    /// Remove every node. Duplicates still owned by id nodes are freed.
    pub fn clear_all_nodes(&mut self) {
        self.id_nodes.clear();
        self.operations.clear();
        self.entry_tags.clear();
        self.time_source = None;
        self.id_type_exists = 0;
    }

    /// Compute visibility masks once all nodes are built.
    pub fn finalize_build(&mut self) {
        for id_node in self.id_nodes.values_mut() {
            id_node.visible_components_mask = if id_node.is_directly_visible {
                id_node.components_mask()
            } else {
                0
            };
        }
        debug!(
            graph = %self.debug_name(),
            id_nodes = self.id_nodes.len(),
            operations = self.operations.len(),
            entry_tags = self.entry_tags.len(),
            "graph build finalized"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_object() -> (Depsgraph, EntityId, ComponentRef) {
        let mut graph = Depsgraph::default();
        let id = EntityId::new(1);
        let index = graph.add_id_node(id, IdType::Object, "OBCube", None);
        let comp = graph.id_node_mut(index).unwrap().add_component(NodeType::Transform, "");
        (graph, id, comp)
    }

    #[test]
    fn add_id_node_is_idempotent() {
        let mut graph = Depsgraph::default();
        let id = EntityId::new(1);
        let first = graph.add_id_node(id, IdType::Object, "OBCube", None);
        let second = graph.add_id_node(id, IdType::Object, "OBCube", None);
        assert_eq!(first, second);
        assert_eq!(graph.id_node_count(), 1);
        assert!(graph.id_type_exists(IdType::Object));
        assert!(!graph.id_type_exists(IdType::Mesh));
    }

    #[test]
    fn cow_allocated_only_when_needed() {
        let mut graph = Depsgraph::default();
        graph.add_id_node(EntityId::new(1), IdType::Object, "OBCube", None);
        graph.add_id_node(EntityId::new(2), IdType::Screen, "SRLayout", None);
        assert!(graph.get_cow_id(EntityId::new(1)).is_some());
        assert!(graph.get_cow_id(EntityId::new(2)).is_none());
    }

    #[test]
    fn cow_hint_is_reused() {
        let mut graph = Depsgraph::default();
        let cow = CowId::new(EntityId::new(1), IdType::Object);
        let ptr = cow.as_ptr();
        graph.add_id_node(EntityId::new(1), IdType::Object, "OBCube", Some(cow));
        assert_eq!(graph.get_cow_id(EntityId::new(1)).map(CowId::as_ptr), Some(ptr));
    }

    #[test]
    fn operations_are_listed_and_found() {
        let (mut graph, id, comp) = graph_with_object();
        let init = graph
            .add_operation(comp, None, OpCode::TransformInit, "", -1)
            .unwrap();
        graph.set_as_entry(init);
        let fin = graph
            .add_operation(comp, None, OpCode::TransformFinal, "", -1)
            .unwrap();
        graph.set_as_exit(fin);

        assert_eq!(graph.operations(), &[init, fin]);
        assert_eq!(
            graph.find_operation_ref(id, NodeType::Transform, "", OpCode::TransformFinal, "", -1),
            Some(fin)
        );
        let component = graph.component(comp).unwrap();
        assert_eq!(component.entry_operation().map(|op| op.opcode()), Some(OpCode::TransformInit));
        assert_eq!(component.exit_operation().map(|op| op.opcode()), Some(OpCode::TransformFinal));
        assert!(graph.operation(init).unwrap().is_entry());
    }

    #[test]
    fn tagging_adds_entry_tag_once() {
        let (mut graph, _, comp) = graph_with_object();
        let op = graph
            .add_operation(comp, None, OpCode::TransformLocal, "", -1)
            .unwrap();
        graph.tag_operation(op, UpdateSource::Relations);
        graph.tag_operation(op, UpdateSource::UserEdit);
        assert_eq!(graph.entry_tags().collect::<Vec<_>>(), vec![op]);
        let flags = graph.operation(op).unwrap().flags;
        assert!(flags.contains(OperationFlags::NEEDS_UPDATE | OperationFlags::USER_MODIFIED));

        graph.clear_tags();
        assert_eq!(graph.entry_tags().count(), 0);
        assert!(!graph.operation(op).unwrap().needs_update());
    }

    #[test]
    fn id_tag_update_tags_matching_components() {
        let (mut graph, id, comp) = graph_with_object();
        let op = graph
            .add_operation(comp, None, OpCode::TransformLocal, "", -1)
            .unwrap();
        graph.id_tag_update(id, RecalcFlags::GEOMETRY, UpdateSource::UserEdit);
        assert_eq!(graph.entry_tags().count(), 0);

        graph.id_tag_update(id, RecalcFlags::TRANSFORM | RecalcFlags::COPY_ON_WRITE, UpdateSource::UserEdit);
        assert_eq!(graph.entry_tags().collect::<Vec<_>>(), vec![op]);
        let cow = graph.get_cow_id(id).unwrap();
        assert!(cow.recalc().contains(RecalcFlags::COPY_ON_WRITE));
    }

    #[test]
    fn finalize_sets_visible_mask() {
        let (mut graph, id, _) = graph_with_object();
        graph.find_id_node_mut(id).unwrap().is_directly_visible = false;
        graph.finalize_build();
        assert_eq!(graph.find_id_node(id).unwrap().visible_components_mask, 0);
        graph.find_id_node_mut(id).unwrap().is_directly_visible = true;
        graph.finalize_build();
        assert_eq!(
            graph.find_id_node(id).unwrap().visible_components_mask,
            NodeType::Transform.bit()
        );
    }

    #[test]
    fn clear_removes_everything() {
        let (mut graph, id, comp) = graph_with_object();
        let op = graph.add_operation(comp, None, OpCode::TransformLocal, "", -1).unwrap();
        graph.tag_operation(op, UpdateSource::UserEdit);
        graph.clear_all_nodes();
        assert!(graph.find_id_node(id).is_none());
        assert!(graph.operations().is_empty());
        assert_eq!(graph.entry_tags().count(), 0);
        assert!(graph.time_source().is_none());
    }

    #[test]
    fn evaluation_requests_need_an_id_node() {
        let (mut graph, id, _) = graph_with_object();
        graph.add_special_eval_flag(id, 1 << 2).unwrap();
        graph.add_special_eval_flag(id, 1 << 0).unwrap();
        let masks = CustomDataMasks {
            vert: 0b10,
            ..CustomDataMasks::default()
        };
        graph.add_customdata_mask(id, masks).unwrap();
        graph
            .add_customdata_mask(
                id,
                CustomDataMasks {
                    vert: 0b01,
                    ..CustomDataMasks::default()
                },
            )
            .unwrap();

        let id_node = graph.find_id_node(id).unwrap();
        assert_eq!(id_node.eval_flags, 0b101);
        assert_eq!(id_node.customdata_masks.vert, 0b11);

        let missing = EntityId::new(42);
        assert_eq!(
            graph.add_special_eval_flag(missing, 1),
            Err(GraphError::MissingIdNode(missing))
        );
    }

    #[test]
    fn time_source_tag_is_cleared() {
        let mut graph = Depsgraph::default();
        graph.tag_time_source();
        assert!(graph.time_source().is_none());
        graph.add_time_source();
        graph.tag_time_source();
        assert!(graph.time_source().unwrap().is_tagged());
        graph.clear_tags();
        assert!(!graph.time_source().unwrap().is_tagged());
    }
}
