//! Node Builder
//!
//! [`DepsgraphNodeBuilder`] walks the data-blocks reachable from a root (a
//! view layer, or an explicit list of ids) and creates the id, component and
//! operation nodes that evaluate them. Relations between the operations are
//! not part of this pass.
//!
//! # Build once
//!
//! Every `build_*` entry point starts with a [`BuilderMap`] check, so a
//! data-block reached through several references is expanded once. Objects
//! and collections are the exception: a repeated request can promote their
//! visibility or linked state, so they accumulate that state instead of
//! returning early.
//!
//! # Rebuilds
//!
//! A graph is rebuilt in place:
//!
//! 1. [`begin_build`](DepsgraphNodeBuilder::begin_build) moves the evaluated
//!    duplicates and the update tags out of the old nodes and clears them.
//! 2. The root is built. New id nodes claim the duplicate of their id.
//! 3. [`end_build`](DepsgraphNodeBuilder::end_build) replays the saved tags
//!    and flushes duplicates whose references went stale.
//!
//! Duplicates no id node claimed are freed when the builder is dropped.

mod anim;
mod object;
mod rig;
mod scene;
mod shading;
mod view_layer;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{error, trace, warn};

use super::context::BuildContext;
use super::map::{BuildTag, BuilderMap};
use crate::config::EvaluationMode;
use crate::cow::{self, CowHandle, CowId, CowReference};
use crate::error::GraphError;
use crate::graph::{
    ComponentKey, ComponentRef, CustomDataMasks, Depsgraph, EvalCallback, EvalContext,
    IdComponentsMask, LinkedState, NodeType, OpCode, OperationFlags, OperationKey, OperationRef,
    RecalcFlags, UpdateSource,
};
use crate::scene::{
    foreach_property_id, Entity, EntityData, EntityId, IdProperty, IdType, LayerCollection, Main,
};

/// What an id node carried over from the previous build.
#[derive(Debug)]
pub struct IdInfo {
    /// Expanded duplicate, until a new id node claims it.
    id_cow: Option<CowId>,
    previously_visible_components_mask: IdComponentsMask,
    previous_eval_flags: u32,
    previous_customdata_masks: CustomDataMasks,
}

impl IdInfo {
    pub fn id_cow(&self) -> Option<&CowId> {
        self.id_cow.as_ref()
    }

    pub fn previously_visible_components_mask(&self) -> IdComponentsMask {
        self.previously_visible_components_mask
    }
}

/// An update tag saved across a rebuild, addressed by keys so it can be
/// located again in the new nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedEntryTag {
    pub id_orig: EntityId,
    pub component: ComponentKey,
    pub operation: OperationKey,
}

pub struct DepsgraphNodeBuilder<'a> {
    main: &'a Main,
    graph: &'a mut Depsgraph,
    built_map: BuilderMap,
    /// Snapshot of the previous build, keyed by session identifier.
    id_info_hash: HashMap<EntityId, IdInfo>,
    saved_entry_tags: Vec<SavedEntryTag>,
    /// Scene of the view layer being built.
    scene: Option<EntityId>,
    view_layer_index: usize,
    /// Collections currently being expanded, innermost last.
    collection_stack: SmallVec<[EntityId; 8]>,
    /// Scenes whose view layer is being built, to stop at set loops.
    scene_stack: HashSet<EntityId>,
}

impl<'a> DepsgraphNodeBuilder<'a> {
    pub fn new(main: &'a Main, graph: &'a mut Depsgraph) -> Self {
        Self {
            main,
            graph,
            built_map: BuilderMap::new(),
            id_info_hash: HashMap::new(),
            saved_entry_tags: Vec::new(),
            scene: None,
            view_layer_index: 0,
            collection_stack: SmallVec::new(),
            scene_stack: HashSet::new(),
        }
    }

    pub fn graph(&self) -> &Depsgraph {
        self.graph
    }

    pub fn main(&self) -> &'a Main {
        self.main
    }

    pub fn scene(&self) -> Option<EntityId> {
        self.scene
    }

    pub fn view_layer_index(&self) -> usize {
        self.view_layer_index
    }

    pub fn id_info(&self, id: EntityId) -> Option<&IdInfo> {
        self.id_info_hash.get(&id)
    }

    pub fn saved_entry_tags(&self) -> &[SavedEntryTag] {
        &self.saved_entry_tags
    }

    fn is_render(&self) -> bool {
        self.graph.mode() == EvaluationMode::Render
    }

    /// Look up a referenced data-block. Dangling references are skipped.
    fn entity(&self, id: EntityId) -> Option<&'a Entity> {
        let entity = self.main.get(id);
        if entity.is_none() {
            warn!(%id, "skipping reference to missing data-block");
        }
        entity
    }

    // Rebuild bookkeeping.

    /// Save what the next build reuses, then clear the graph.
    pub fn begin_build(&mut self) {
        self.saved_entry_tags = self
            .graph
            .entry_tags()
            .filter_map(|operation| {
                let id_node = self.graph.id_node(operation.component.id_node)?;
                let comp = id_node.component(operation.component.component)?;
                let op = comp.operation(operation.operation)?;
                Some(SavedEntryTag {
                    id_orig: id_node.id_orig(),
                    component: comp.key().clone(),
                    operation: op.key().clone(),
                })
            })
            .collect();

        for id_node in self.graph.id_nodes_mut() {
            let id_type = id_node.id_type();
            let id_cow = id_node
                .take_cow()
                .filter(|cow| cow::is_needed(id_type) && cow.is_expanded());
            let id_info = IdInfo {
                id_cow,
                previously_visible_components_mask: id_node.visible_components_mask,
                previous_eval_flags: id_node.eval_flags,
                previous_customdata_masks: id_node.customdata_masks,
            };
            let previous = self.id_info_hash.insert(id_node.id_orig(), id_info);
            debug_assert!(previous.is_none(), "id node {} saved twice", id_node.name());
        }

        trace!(
            ids = self.id_info_hash.len(),
            entry_tags = self.saved_entry_tags.len(),
            "saved previous build state"
        );
        self.graph.clear_all_nodes();
    }

    pub fn end_build(&mut self) {
        self.tag_previously_tagged_nodes();
        self.update_invalid_cow_pointers();
    }

    fn tag_previously_tagged_nodes(&mut self) {
        for entry_tag in std::mem::take(&mut self.saved_entry_tags) {
            let Some(id_node) = self.graph.find_id_node(entry_tag.id_orig) else {
                continue;
            };
            let Some(comp) =
                id_node.find_component(entry_tag.component.node_type, &entry_tag.component.name)
            else {
                continue;
            };
            let Some(operation) = comp.find_operation_index(
                entry_tag.operation.opcode,
                &entry_tag.operation.name,
                entry_tag.operation.name_tag,
            ) else {
                continue;
            };
            let operation = OperationRef {
                component: comp.this(),
                operation,
            };
            self.graph.tag_operation(operation, UpdateSource::UserEdit);
        }
    }

    /// Flag duplicates whose references no longer match the graph: either
    /// they point at an original that now has a duplicate, or at a duplicate
    /// that is no longer owned by the graph.
    fn update_invalid_cow_pointers(&mut self) {
        let mut stale = Vec::new();
        for id_node in self.graph.id_nodes() {
            if id_node.previously_visible_components_mask == 0 {
                continue;
            }
            let Some(cow) = id_node.id_cow() else {
                continue;
            };
            if cow.recalc().contains(RecalcFlags::COPY_ON_WRITE) || cow.is_embedded() {
                continue;
            }
            let needs_update = cow.references().iter().any(|reference| match reference {
                CowReference::Original(id) => self.graph.get_cow_id(*id).is_some(),
                CowReference::Evaluated { orig, handle } => match self.graph.get_cow_id(*orig) {
                    Some(current) => !handle.points_to(current),
                    None => true,
                },
            });
            if needs_update {
                stale.push(id_node.id_orig());
            }
        }
        for id in stale {
            trace!(%id, "copy-on-write references went stale");
            self.graph
                .id_tag_update(id, RecalcFlags::COPY_ON_WRITE, UpdateSource::Relations);
        }
    }

    // Node creation.

    /// Return the id node of `id`, creating it when missing. A new node
    /// claims the duplicate saved by `begin_build` and gets its
    /// copy-on-write and visibility components.
    pub fn add_id_node(&mut self, id: EntityId) -> Option<usize> {
        debug_assert!(id.is_set(), "building unregistered data-block");
        if let Some(index) = self.graph.find_id_node_index(id) {
            return Some(index);
        }
        let entity = self.entity(id)?;
        let id_type = entity.id_type();

        let mut id_cow = None;
        let mut previously_visible_components_mask = 0;
        let mut previous_eval_flags = 0;
        let mut previous_customdata_masks = CustomDataMasks::default();
        if let Some(id_info) = self.id_info_hash.get_mut(&id) {
            id_cow = id_info.id_cow.take();
            previously_visible_components_mask = id_info.previously_visible_components_mask;
            previous_eval_flags = id_info.previous_eval_flags;
            previous_customdata_masks = id_info.previous_customdata_masks;
        }

        let index = self
            .graph
            .add_id_node(id, id_type, &entity.display_name(), id_cow);
        let id_node = self.graph.id_node_mut(index)?;
        id_node.previously_visible_components_mask = previously_visible_components_mask;
        id_node.previous_eval_flags = previous_eval_flags;
        id_node.previous_customdata_masks = previous_customdata_masks;

        if id_node.is_newly_created() {
            let handle = id_node
                .id_cow()
                .map(CowId::handle)
                .filter(|_| cow::is_needed(id_type));
            let cow_component = handle
                .as_ref()
                .map(|_| id_node.add_component(NodeType::CopyOnWrite, ""));
            let visibility_component = id_node.add_component(NodeType::Visibility, "");
            if let (Some(handle), Some(cow_component)) = (handle, cow_component) {
                let callback = copy_on_write_callback(handle);
                self.add_operation(cow_component, OpCode::CopyOnWrite.into(), Some(callback));
            }
            if let Some(op) = self.add_operation(visibility_component, OpCode::Operation.into(), None) {
                self.graph.add_operation_flags(op, OperationFlags::PINNED);
            }
        }
        trace!(id = %entity.display_name(), "id node");
        Some(index)
    }

    pub fn find_id_node(&self, id: EntityId) -> Option<usize> {
        self.graph.find_id_node_index(id)
    }

    pub fn add_time_source(&mut self) {
        self.graph.add_time_source();
    }

    pub fn add_component_node(
        &mut self,
        id: EntityId,
        component: impl Into<ComponentKey>,
    ) -> Option<ComponentRef> {
        let component = component.into();
        let index = self.add_id_node(id)?;
        let id_node = self.graph.id_node_mut(index)?;
        Some(id_node.add_component(component.node_type, &component.name))
    }

    /// Create an operation in an existing component. A duplicate key is a
    /// construction bug: it is reported and the existing operation returned.
    fn add_operation(
        &mut self,
        component: ComponentRef,
        operation: OperationKey,
        callback: Option<EvalCallback>,
    ) -> Option<OperationRef> {
        match self.graph.add_operation(
            component,
            callback,
            operation.opcode,
            &operation.name,
            operation.name_tag,
        ) {
            Ok(op) => Some(op),
            Err(err @ GraphError::DuplicateOperation { existing, .. }) => {
                error!(%err, "operation added twice");
                debug_assert!(false, "{}", err);
                Some(OperationRef {
                    component,
                    operation: existing,
                })
            }
            Err(err) => {
                error!(%err, "failed to add operation");
                None
            }
        }
    }

    /// Create an operation. The key must not exist yet.
    pub fn add_operation_node(
        &mut self,
        id: EntityId,
        component: impl Into<ComponentKey>,
        operation: impl Into<OperationKey>,
        callback: Option<EvalCallback>,
    ) -> Option<OperationRef> {
        let component = self.add_component_node(id, component)?;
        self.add_operation(component, operation.into(), callback)
    }

    /// Return the operation with this key, creating it when missing.
    pub fn ensure_operation_node(
        &mut self,
        id: EntityId,
        component: impl Into<ComponentKey>,
        operation: impl Into<OperationKey>,
        callback: Option<EvalCallback>,
    ) -> Option<OperationRef> {
        let component = self.add_component_node(id, component)?;
        let operation = operation.into();
        let existing = self.graph.component(component).and_then(|comp| {
            comp.find_operation_index(operation.opcode, &operation.name, operation.name_tag)
        });
        match existing {
            Some(index) => Some(OperationRef {
                component,
                operation: index,
            }),
            None => self.add_operation(component, operation, callback),
        }
    }

    pub fn has_operation_node(
        &self,
        id: EntityId,
        component: impl Into<ComponentKey>,
        operation: impl Into<OperationKey>,
    ) -> bool {
        let component = component.into();
        let operation = operation.into();
        self.graph
            .find_operation(
                id,
                component.node_type,
                &component.name,
                operation.opcode,
                &operation.name,
                operation.name_tag,
            )
            .is_some()
    }

    /// Find an operation. The component is created when missing.
    pub fn find_operation_node(
        &mut self,
        id: EntityId,
        component: impl Into<ComponentKey>,
        operation: impl Into<OperationKey>,
    ) -> Option<OperationRef> {
        let component = self.add_component_node(id, component)?;
        let operation = operation.into();
        let index = self.graph.component(component)?.find_operation_index(
            operation.opcode,
            &operation.name,
            operation.name_tag,
        )?;
        Some(OperationRef {
            component,
            operation: index,
        })
    }

    fn set_as_entry(&mut self, operation: Option<OperationRef>) {
        if let Some(operation) = operation {
            self.graph.set_as_entry(operation);
        }
    }

    fn set_as_exit(&mut self, operation: Option<OperationRef>) {
        if let Some(operation) = operation {
            self.graph.set_as_exit(operation);
        }
    }

    fn add_flags(&mut self, operation: Option<OperationRef>, flags: OperationFlags) {
        if let Some(operation) = operation {
            self.graph.add_operation_flags(operation, flags);
        }
    }

    // Copy-on-write.

    pub fn get_cow_id(&self, id: EntityId) -> Option<CowHandle> {
        self.graph.cow_handle(id)
    }

    /// Duplicate of `id`, creating its id node when needed.
    pub fn ensure_cow_id(&mut self, id: EntityId) -> Option<CowHandle> {
        self.add_id_node(id)?;
        self.get_cow_id(id)
    }

    // Dispatch.

    /// Build any data-block, dispatching on its type.
    pub fn build_id(&mut self, id: EntityId) {
        self.build_id_in(id, &BuildContext::root());
    }

    /// Build any data-block from inside `ctx`. A collection takes its
    /// visibility from the collections around the reference.
    pub fn build_id_in(&mut self, id: EntityId, ctx: &BuildContext) {
        let Some(entity) = self.entity(id) else {
            return;
        };
        match &entity.data {
            EntityData::Action => self.build_action(id),
            EntityData::Armature(_) => self.build_armature(id),
            EntityData::Camera(_) => self.build_camera(id),
            EntityData::Collection(_) => self.build_collection(None, id, ctx),
            // Reached through a driver or a property: whether the object is
            // visible is decided by the paths that really show it.
            EntityData::Object(_) => {
                self.build_object_in(None, id, LinkedState::Indirectly, false, ctx)
            }
            EntityData::Key(_) => self.build_shapekeys(id),
            EntityData::Light(_) => self.build_light(id),
            EntityData::LightProbe => self.build_lightprobe(id),
            EntityData::NodeTree(_) => self.build_nodetree(id),
            EntityData::Material(_) => self.build_material(id),
            EntityData::Texture(_) => self.build_texture(id),
            EntityData::Image(_) => self.build_image(id),
            EntityData::World(_) => self.build_world(id),
            EntityData::Mask(_) => self.build_mask(id),
            EntityData::LineStyle(_) => self.build_freestyle_linestyle(id),
            EntityData::MovieClip => self.build_movieclip(id),
            EntityData::Geometry(_) => self.build_object_data_geometry_datablock(id),
            EntityData::Speaker(_) => self.build_speaker(id),
            EntityData::Sound => self.build_sound(id),
            // Not part of the graph.
            EntityData::Text => {}
            EntityData::CacheFile => self.build_cachefile(id),
            EntityData::Scene(_) => self.build_scene_parameters(id),
            EntityData::Simulation(_) => self.build_simulation(id),
            EntityData::Particle(_) => self.build_particle_settings(id),
            EntityData::VFont | EntityData::Generic(_) => {
                debug_assert!(!cow::is_needed(entity.id_type()));
                self.build_generic_id(id)
            }
        }
    }

    /// Data-blocks without a dedicated rule: properties, animation and
    /// parameters only.
    pub fn build_generic_id(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
    }

    /// Build every data-block referenced from a property tree.
    pub fn build_idproperties(&mut self, properties: &[IdProperty]) {
        self.build_idproperties_in(properties, &BuildContext::root());
    }

    pub fn build_idproperties_in(&mut self, properties: &[IdProperty], ctx: &BuildContext) {
        foreach_property_id(properties, &mut |id| self.build_id_in(id, ctx));
    }

    // Shared building blocks.

    /// Parameters component: entry, evaluation and exit.
    pub fn build_parameters(&mut self, id: EntityId) {
        let Some(entity) = self.entity(id) else {
            return;
        };
        let callback = match entity.id_type() {
            IdType::Mesh => self.ensure_cow_id(id).map(|handle| copy_properties_callback(id, handle)),
            _ => None,
        };
        let op = self.add_operation_node(id, NodeType::Parameters, OpCode::ParametersEntry, None);
        self.set_as_entry(op);
        self.add_operation_node(id, NodeType::Parameters, OpCode::ParametersEval, callback);
        let op = self.add_operation_node(id, NodeType::Parameters, OpCode::ParametersExit, None);
        self.set_as_exit(op);
    }

    /// Bounding box of an object, depending on both geometry and transform.
    pub fn build_dimensions(&mut self, object: EntityId) {
        self.add_operation_node(object, NodeType::Parameters, OpCode::Dimensions, None);
    }

    // Collections.

    /// Build a collection. `from_layer_collection` is set when the view
    /// layer builds the collection itself: the collection's content is then
    /// left to the layer walk.
    pub fn build_collection(
        &mut self,
        from_layer_collection: Option<&LayerCollection>,
        collection_id: EntityId,
        ctx: &BuildContext,
    ) {
        let Some(entity) = self.entity(collection_id) else {
            return;
        };
        let Some(collection) = entity.as_collection() else {
            return;
        };
        if self.collection_stack.contains(&collection_id) {
            warn!(collection = %entity.display_name(), "collection contains itself, not descending");
            return;
        }
        let is_collection_visible =
            !collection.is_hidden(self.is_render()) && ctx.is_parent_collection_visible();

        if self.built_map.check_is_built_and_tag(collection_id, BuildTag::COMPLETE) {
            let Some(id_node) = self.graph.find_id_node_mut(collection_id) else {
                return;
            };
            if is_collection_visible
                && !id_node.is_directly_visible
                && id_node.is_collection_fully_expanded
            {
                // Became visible: poke the content with the new visibility.
                id_node.is_directly_visible = true;
            } else if from_layer_collection.is_none() && !id_node.is_collection_fully_expanded {
                // First built by the layer walk without its content.
            } else {
                return;
            }
        } else {
            let Some(index) = self.add_id_node(collection_id) else {
                return;
            };
            if let Some(id_node) = self.graph.id_node_mut(index) {
                id_node.is_directly_visible = is_collection_visible;
            }
            self.build_idproperties_in(&entity.properties, ctx);
            self.add_operation_node(collection_id, NodeType::Geometry, OpCode::GeometryEvalDone, None);
        }
        if from_layer_collection.is_some() {
            return;
        }

        trace!(
            collection = %entity.display_name(),
            parent = ?ctx.collection(),
            visible = is_collection_visible,
            "expanding collection"
        );
        let child_ctx = ctx.enter_collection(collection_id, is_collection_visible);
        self.collection_stack.push(collection_id);
        for &object in &collection.objects {
            self.build_object_in(
                None,
                object,
                LinkedState::Indirectly,
                is_collection_visible,
                &child_ctx,
            );
        }
        for &child in &collection.children {
            self.build_collection(None, child, &child_ctx);
        }
        self.collection_stack.pop();

        if let Some(id_node) = self.graph.find_id_node_mut(collection_id) {
            id_node.is_collection_fully_expanded = true;
        }
    }
}

fn copy_on_write_callback(handle: CowHandle) -> EvalCallback {
    Arc::new(move |ctx: &EvalContext<'_>| {
        if let Some(cow) = handle.upgrade() {
            cow::update_datablock(ctx.main, &cow, |id| ctx.graph.cow_handle(id));
        }
    })
}

fn copy_properties_callback(id: EntityId, handle: CowHandle) -> EvalCallback {
    Arc::new(move |ctx: &EvalContext<'_>| {
        if let (Some(cow), Some(orig)) = (handle.upgrade(), ctx.main.get(id)) {
            cow.copy_properties(orig);
        }
    })
}
