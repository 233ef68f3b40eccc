//! Copy-on-Write Data-blocks
//!
//! Evaluation never touches the data-blocks in [`Main`]. Each id node of a
//! type that needs it owns an evaluated duplicate instead, created empty when
//! the node is built and filled ("expanded") the first time its
//! `CopyOnWrite` operation runs.
//!
//! # Ownership
//!
//! [`CowId`] is the single owner of a duplicate. It is not `Clone`: moving it
//! from the previous build's snapshot into a new id node is the only way to
//! hand a duplicate over, so a duplicate can never be owned twice. Operation
//! callbacks and references between duplicates hold a [`CowHandle`] instead,
//! which does not keep the duplicate alive.

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::trace;

use crate::graph::RecalcFlags;
use crate::scene::{Entity, EntityId, IdFlags, IdType, Main};

/// Whether data-blocks of this type get an evaluated duplicate.
pub fn is_needed(id_type: IdType) -> bool {
    !matches!(
        id_type,
        IdType::Library
            | IdType::Ipo
            | IdType::Screen
            | IdType::VFont
            | IdType::Brush
            | IdType::WindowManager
            | IdType::Palette
            | IdType::PaintCurve
            | IdType::WorkSpace
            | IdType::Image
    )
}

/// A reference stored inside an expanded duplicate.
#[derive(Debug, Clone)]
pub enum CowReference {
    /// Points at the original data-block: the graph had no duplicate for it
    /// when this one was expanded.
    Original(EntityId),
    /// Points at the duplicate of `orig`.
    Evaluated { orig: EntityId, handle: CowHandle },
}

#[derive(Debug, Default)]
struct CowState {
    data: Option<Entity>,
    references: Vec<CowReference>,
    recalc: RecalcFlags,
    preprocessed: bool,
}

/// An evaluated duplicate of one data-block.
#[derive(Debug)]
pub struct CowDatablock {
    orig: EntityId,
    id_type: IdType,
    state: RwLock<CowState>,
}

impl CowDatablock {
    /// The original data-block.
    pub fn orig(&self) -> EntityId {
        self.orig
    }

    pub fn id_type(&self) -> IdType {
        self.id_type
    }

    /// Whether the duplicate holds a copy of the original.
    pub fn is_expanded(&self) -> bool {
        self.state.read().data.is_some()
    }

    /// Whether the duplicated data-block is embedded in another one.
    pub fn is_embedded(&self) -> bool {
        self.state
            .read()
            .data
            .as_ref()
            .is_some_and(|entity| entity.flags.contains(IdFlags::EMBEDDED_DATA))
    }

    pub fn recalc(&self) -> RecalcFlags {
        self.state.read().recalc
    }

    pub fn tag_recalc(&self, flags: RecalcFlags) {
        self.state.write().recalc |= flags;
    }

    pub fn clear_recalc(&self) {
        self.state.write().recalc = RecalcFlags::empty();
    }

    /// References held by the expanded copy, in walk order.
    pub fn references(&self) -> Vec<CowReference> {
        self.state.read().references.clone()
    }

    /// Run `f` on the expanded copy, if any.
    pub fn with_data<R>(&self, f: impl FnOnce(Option<&Entity>) -> R) -> R {
        f(self.state.read().data.as_ref())
    }

    /// Copy `orig` into the duplicate. Every reference that `resolve` maps to
    /// a duplicate is remapped to it; the rest keep pointing at originals.
    /// Embedded data-blocks are not remapped, their owner manages them.
    pub fn expand(&self, orig: &Entity, resolve: impl Fn(EntityId) -> Option<CowHandle>) {
        let mut references = Vec::new();
        let mut seen = HashSet::new();
        orig.foreach_id(false, &mut |id| {
            if !seen.insert(id) {
                return;
            }
            references.push(match resolve(id) {
                Some(handle) => CowReference::Evaluated { orig: id, handle },
                None => CowReference::Original(id),
            });
        });
        trace!(
            id = %self.orig,
            references = references.len(),
            "expanding copy-on-write datablock"
        );
        let mut state = self.state.write();
        state.data = Some(orig.clone());
        state.references = references;
        state.preprocessed = false;
    }

    /// Drop the copied data, leaving an empty duplicate.
    pub fn discard(&self) {
        let mut state = self.state.write();
        state.data = None;
        state.references.clear();
        state.preprocessed = false;
    }

    /// Copy custom properties from the original without a full expansion.
    pub fn copy_properties(&self, orig: &Entity) {
        if let Some(data) = self.state.write().data.as_mut() {
            data.properties = orig.properties.clone();
        }
    }

    /// Mark a node tree duplicate as prepared for evaluation.
    pub fn mark_preprocessed(&self) {
        let mut state = self.state.write();
        if state.data.is_some() {
            state.preprocessed = true;
        }
    }

    pub fn is_preprocessed(&self) -> bool {
        self.state.read().preprocessed
    }
}

/// Owning handle to an evaluated duplicate.
#[derive(Debug)]
pub struct CowId(Arc<CowDatablock>);

impl CowId {
    /// Allocate an empty, unexpanded duplicate for `orig`.
    pub fn new(orig: EntityId, id_type: IdType) -> Self {
        Self(Arc::new(CowDatablock {
            orig,
            id_type,
            state: RwLock::new(CowState::default()),
        }))
    }

    /// Non-owning handle to this duplicate.
    pub fn handle(&self) -> CowHandle {
        CowHandle(Arc::downgrade(&self.0))
    }

    /// Address of the duplicate, stable for its lifetime.
    pub fn as_ptr(&self) -> *const CowDatablock {
        Arc::as_ptr(&self.0)
    }

    pub fn ptr_eq(&self, other: &CowId) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for CowId {
    type Target = CowDatablock;

    fn deref(&self) -> &CowDatablock {
        &self.0
    }
}

/// Non-owning handle to an evaluated duplicate.
#[derive(Debug, Clone)]
pub struct CowHandle(Weak<CowDatablock>);

impl CowHandle {
    pub fn upgrade(&self) -> Option<Arc<CowDatablock>> {
        self.0.upgrade()
    }

    /// Whether the duplicate is still owned by some id node or snapshot.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Whether this handle points at `cow`.
    pub fn points_to(&self, cow: &CowId) -> bool {
        std::ptr::eq(self.0.as_ptr(), cow.as_ptr())
    }
}

/// Bring a duplicate up to date with its original: expand it when it is
/// empty or tagged for a copy-on-write update, then clear the tag.
pub fn update_datablock(
    main: &Main,
    cow: &CowDatablock,
    resolve: impl Fn(EntityId) -> Option<CowHandle>,
) {
    if !is_needed(cow.id_type()) {
        return;
    }
    let Some(orig) = main.get(cow.orig()) else {
        // Original deleted: keep an empty duplicate until its id node goes.
        cow.discard();
        return;
    };
    if !cow.is_expanded() || cow.recalc().contains(RecalcFlags::COPY_ON_WRITE) {
        cow.expand(orig, resolve);
    }
    cow.state.write().recalc.remove(RecalcFlags::COPY_ON_WRITE);
}
