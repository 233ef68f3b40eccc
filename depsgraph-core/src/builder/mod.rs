//! Graph Builder
//!
//! Turns the data-blocks of a [`Main`](crate::scene::Main) database into the
//! nodes of a [`Depsgraph`](crate::graph::Depsgraph).
//!
//! # Overview
//!
//! - [`BuilderMap`]: which data-blocks (and which aspects of them) were
//!   already built in the current pass.
//! - [`BuildContext`]: the collection being expanded and whether it is
//!   visible, passed down the collection recursion.
//! - [`DepsgraphNodeBuilder`]: the per-type construction rules, plus the
//!   bookkeeping that carries duplicates and update tags across a rebuild.

mod context;
mod map;
mod nodes;

pub use context::BuildContext;
pub use map::{BuildTag, BuilderMap};
pub use nodes::{DepsgraphNodeBuilder, IdInfo, SavedEntryTag};
