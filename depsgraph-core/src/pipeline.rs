//! Build Pipelines
//!
//! A pipeline decides what the root of a build is. The surrounding steps are
//! the same for all of them:
//!
//! 1. `begin_build` saves what the previous graph leaves behind.
//! 2. The pipeline builds its root.
//! 3. `end_build` replays saved update tags and flushes stale duplicates.
//! 4. The graph computes its visibility masks.

use tracing::{debug, debug_span};

use crate::builder::DepsgraphNodeBuilder;
use crate::debug::{stats, GraphStats};
use crate::graph::{Depsgraph, LinkedState};
use crate::scene::{EntityId, IdType, Main};

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub stats: GraphStats,
    /// Update tags carried over from the previous graph.
    pub saved_entry_tags: usize,
}

pub trait BuildPipeline {
    /// Build the root of the graph.
    fn build_nodes(&self, builder: &mut DepsgraphNodeBuilder<'_>);

    /// Rebuild `graph` from `main`. The graph's previous content is replaced;
    /// duplicates and update tags of ids that survive are carried over.
    fn build(&self, main: &Main, graph: &mut Depsgraph) -> BuildReport {
        let span = debug_span!("build", graph = %graph.debug_name());
        let _enter = span.enter();

        let saved_entry_tags = {
            let mut builder = DepsgraphNodeBuilder::new(main, graph);
            builder.begin_build();
            let saved = builder.saved_entry_tags().len();
            self.build_nodes(&mut builder);
            builder.end_build();
            saved
        };
        graph.finalize_build();

        let stats = stats(graph);
        debug!(
            id_nodes = stats.id_nodes,
            operations = stats.operations,
            entry_tags = stats.entry_tags,
            saved_entry_tags,
            "build finished"
        );
        BuildReport {
            stats,
            saved_entry_tags,
        }
    }
}

/// Everything one view layer of a scene shows.
#[derive(Debug, Clone, Copy)]
pub struct ViewLayerPipeline {
    pub scene: EntityId,
    pub view_layer_index: usize,
}

impl ViewLayerPipeline {
    pub fn new(scene: EntityId, view_layer_index: usize) -> Self {
        Self {
            scene,
            view_layer_index,
        }
    }
}

impl BuildPipeline for ViewLayerPipeline {
    fn build_nodes(&self, builder: &mut DepsgraphNodeBuilder<'_>) {
        builder.build_view_layer(self.scene, self.view_layer_index, LinkedState::Directly);
        if builder.graph().config().build_all_objects {
            build_all_objects(builder);
        }
    }
}

/// Only the given data-blocks and what they depend on.
#[derive(Debug, Clone, Default)]
pub struct FromIdsPipeline {
    pub ids: Vec<EntityId>,
}

impl FromIdsPipeline {
    pub fn new(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

impl BuildPipeline for FromIdsPipeline {
    fn build_nodes(&self, builder: &mut DepsgraphNodeBuilder<'_>) {
        builder.add_time_source();
        for &id in &self.ids {
            builder.build_id(id);
        }
    }
}

/// A view layer plus every object of the database, hidden and indirectly
/// linked unless the view layer shows it.
#[derive(Debug, Clone, Copy)]
pub struct AllObjectsPipeline {
    pub view_layer: ViewLayerPipeline,
}

impl AllObjectsPipeline {
    pub fn new(scene: EntityId, view_layer_index: usize) -> Self {
        Self {
            view_layer: ViewLayerPipeline::new(scene, view_layer_index),
        }
    }
}

impl BuildPipeline for AllObjectsPipeline {
    fn build_nodes(&self, builder: &mut DepsgraphNodeBuilder<'_>) {
        let ViewLayerPipeline {
            scene,
            view_layer_index,
        } = self.view_layer;
        builder.build_view_layer(scene, view_layer_index, LinkedState::Directly);
        build_all_objects(builder);
    }
}

fn build_all_objects(builder: &mut DepsgraphNodeBuilder<'_>) {
    let main = builder.main();
    for object in main.iter_type(IdType::Object) {
        builder.build_object(None, object.id, LinkedState::Indirectly, false);
    }
}
