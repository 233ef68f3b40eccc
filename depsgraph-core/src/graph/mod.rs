//! Dependency Graph
//!
//! The node model the builder fills in: id nodes own components, components
//! own operations.
//!
//! # Overview
//!
//! - [`IdNode`]: one per data-block, keyed by its session identifier.
//! - [`ComponentNode`]: one per (type, name) within an id node.
//! - [`OperationNode`]: one per (opcode, name, name tag) within a component,
//!   with its evaluation callback and flags.
//! - [`Depsgraph`]: owns the id nodes, the flat operation list used by the
//!   relation builder, and the entry tags.
//!
//! Relations and scheduling are built on top of this by other passes.

mod component;
mod depsgraph;
mod id_node;
mod node;
mod operation;

pub use component::ComponentNode;
pub use depsgraph::{Depsgraph, TimeSourceNode};
pub use id_node::IdNode;
pub use node::{
    ComponentKey, ComponentRef, CustomDataMasks, EvalCallback, EvalContext, IdComponentsMask,
    LinkedState, NodeType, OpCode, OperationFlags, OperationKey, OperationRef, RecalcFlags,
    UpdateSource,
};
pub use operation::OperationNode;
