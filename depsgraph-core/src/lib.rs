//! Depsgraph Core
//!
//! This crate builds the nodes of a scene dependency graph: the operations
//! that evaluate a scene's data-blocks (objects, collections, modifiers,
//! constraints, drivers, particle systems, node trees, animation), grouped
//! into components and id nodes. It implements:
//!
//! - A node model of id nodes, components and operations with stable handles
//! - Per-type construction rules walking everything a view layer shows
//! - Copy-on-write duplicates that survive a rebuild
//! - Update tags replayed onto the rebuilt graph
//!
//! Relations between operations and their scheduling are built by later
//! passes on top of the node graph.
//!
//! # Architecture
//!
//! - `scene`: the data-blocks the graph is built from
//! - `graph`: the node model and the [`Depsgraph`](graph::Depsgraph) container
//! - `cow`: evaluated duplicates of data-blocks
//! - `builder`: the node builder and its bookkeeping
//! - `pipeline`: the build entry points
//! - `debug`: statistics and consistency checks
//!
//! # Example
//!
//! ```rust,ignore
//! use depsgraph_core::graph::Depsgraph;
//! use depsgraph_core::pipeline::{BuildPipeline, ViewLayerPipeline};
//! use depsgraph_core::scene::{IdType, Main};
//!
//! let main = Main::from_json(include_str!("scene.json"))?;
//! let scene = main.find_by_name(IdType::Scene, "Scene").unwrap();
//!
//! let mut graph = Depsgraph::default();
//! let report = ViewLayerPipeline::new(scene, 0).build(&main, &mut graph);
//! println!("{} operations", report.stats.operations);
//!
//! // After an edit, rebuilding keeps the evaluated duplicates.
//! ViewLayerPipeline::new(scene, 0).build(&main, &mut graph);
//! ```

pub mod builder;
pub mod config;
pub mod cow;
pub mod debug;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod scene;
