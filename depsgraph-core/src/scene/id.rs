//! Data-block Identity
//!
//! Every top-level data-block has a session-unique identifier and a type tag.
//! The identifier is what the dependency graph keys its id nodes by, and what
//! survives across rebuilds so copy-on-write duplicates can be matched back up.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Session-unique identifier of a data-block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// The identifier of a data-block that was never registered.
    pub const UNSET: EntityId = EntityId(0);

    /// Wrap a raw session identifier.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw identifier value.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Whether this identifier was assigned by the database.
    pub fn is_set(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Type tag of a data-block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdType {
    Action,
    Armature,
    Brush,
    CacheFile,
    Camera,
    Collection,
    CurveLegacy,
    Curves,
    GreasePencil,
    Image,
    Ipo,
    Key,
    Lattice,
    Library,
    Light,
    LightProbe,
    LineStyle,
    Mask,
    Material,
    Mesh,
    MetaBall,
    MovieClip,
    NodeTree,
    Object,
    PaintCurve,
    Palette,
    Particle,
    PointCloud,
    Scene,
    Screen,
    Simulation,
    Sound,
    Speaker,
    Text,
    Texture,
    VFont,
    Volume,
    WindowManager,
    WorkSpace,
    World,
}

impl IdType {
    /// Two-letter code used as the name prefix in logs.
    pub fn code(&self) -> &'static str {
        match self {
            IdType::Action => "AC",
            IdType::Armature => "AR",
            IdType::Brush => "BR",
            IdType::CacheFile => "CF",
            IdType::Camera => "CA",
            IdType::Collection => "GR",
            IdType::CurveLegacy => "CU",
            IdType::Curves => "CV",
            IdType::GreasePencil => "GD",
            IdType::Image => "IM",
            IdType::Ipo => "IP",
            IdType::Key => "KE",
            IdType::Lattice => "LT",
            IdType::Library => "LI",
            IdType::Light => "LA",
            IdType::LightProbe => "LP",
            IdType::LineStyle => "LS",
            IdType::Mask => "MS",
            IdType::Material => "MA",
            IdType::Mesh => "ME",
            IdType::MetaBall => "MB",
            IdType::MovieClip => "MC",
            IdType::NodeTree => "NT",
            IdType::Object => "OB",
            IdType::PaintCurve => "PC",
            IdType::Palette => "PL",
            IdType::Particle => "PA",
            IdType::PointCloud => "PT",
            IdType::Scene => "SC",
            IdType::Screen => "SR",
            IdType::Simulation => "SI",
            IdType::Sound => "SO",
            IdType::Speaker => "SK",
            IdType::Text => "TX",
            IdType::Texture => "TE",
            IdType::VFont => "VF",
            IdType::Volume => "VO",
            IdType::WindowManager => "WM",
            IdType::WorkSpace => "WS",
            IdType::World => "WO",
        }
    }

    /// Bit used for this type in per-graph type masks.
    pub fn bit(&self) -> u64 {
        1u64 << (*self as u32)
    }
}

bitflags! {
    /// Flags stored on a data-block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct IdFlags: u32 {
        /// The data-block is owned by another data-block (a material's node
        /// tree, a scene's master collection) and shares its lifetime.
        const EMBEDDED_DATA = 1 << 0;
        /// The data-block comes from a linked library.
        const LINKED = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_id_is_not_set() {
        assert!(!EntityId::UNSET.is_set());
        assert!(EntityId::new(7).is_set());
        assert_eq!(EntityId::new(7).to_string(), "#7");
    }

    #[test]
    fn type_bits_fit_in_mask() {
        assert!((IdType::World as u32) < 64);
        assert_ne!(IdType::Object.bit(), IdType::Mesh.bit());
    }
}
