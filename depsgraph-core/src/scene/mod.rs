//! Scene Data
//!
//! The data-blocks the dependency graph is built from. This is a read-only
//! view for the builder: it walks references between data-blocks and reads
//! per-type fields, it never edits them.
//!
//! # Overview
//!
//! - [`Main`] is the database, keyed by [`EntityId`].
//! - [`Entity`] is one data-block; [`EntityData`] carries its type-specific
//!   payload (objects, collections, scenes, node trees, ...).
//! - [`Entity::foreach_id`] is the generic outgoing-reference walker.
//! - [`api_path`] resolves the driver paths that name custom properties.

mod anim;
pub mod api_path;
mod database;
mod entity;
mod id;
mod layer;
mod node_tree;
mod object;

pub use anim::{
    find_property, foreach_property_id, AnimData, DriverTarget, DriverVariable, FCurve,
    IdProperty, NlaStrip, NlaTrack, PropertyValue,
};
pub use database::Main;
pub use entity::{
    Armature, Bone, Camera, Entity, EntityData, Geometry, GeometryKind, Image, Key, Light,
    LineStyle, Mask, MaskLayer, MaskSpline, Material, ParticlePhysics, ParticleRender,
    ParticleSettings, Simulation, Speaker, Texture, World,
};
pub use id::{EntityId, IdFlags, IdType};
pub use layer::{
    Base, Collection, FreestyleLineSet, LayerCollection, RigidBodyWorld, Scene, SequenceEditor,
    Strip, ViewLayer,
};
pub use node_tree::{NodeTree, NodeTreeType, TreeNode, TreeNodeKind, TreeSocket};
pub use object::{
    ik_chain_root, spline_ik_chain_root, Constraint, ConstraintKind, Modifier, Object,
    ObjectType, ParticleSystem, PoseChannel,
};
