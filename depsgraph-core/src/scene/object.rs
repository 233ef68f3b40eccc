//! Object data-block payload.

use serde::{Deserialize, Serialize};

use super::anim::{foreach_property_id, IdProperty};
use super::id::EntityId;

/// What kind of data an object carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectType {
    #[default]
    Empty,
    Mesh,
    Curve,
    Surface,
    Font,
    MetaBall,
    Lattice,
    GreasePencil,
    Curves,
    PointCloud,
    Volume,
    Armature,
    Light,
    Camera,
    LightProbe,
    Speaker,
}

impl ObjectType {
    /// Whether the object data is evaluated as geometry.
    pub fn is_geometry(&self) -> bool {
        matches!(
            self,
            ObjectType::Mesh
                | ObjectType::Curve
                | ObjectType::Surface
                | ObjectType::Font
                | ObjectType::MetaBall
                | ObjectType::Lattice
                | ObjectType::GreasePencil
                | ObjectType::Curves
                | ObjectType::PointCloud
                | ObjectType::Volume
        )
    }
}

/// An object in the scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Object {
    pub object_type: ObjectType,

    /// Object data (mesh, armature, light, ...).
    pub data: Option<EntityId>,

    pub parent: Option<EntityId>,

    pub modifiers: Vec<Modifier>,
    pub grease_pencil_modifiers: Vec<Modifier>,
    pub shader_effects: Vec<Modifier>,
    pub constraints: Vec<Constraint>,

    /// Object-level material slots. Empty slots are kept.
    pub materials: Vec<Option<EntityId>>,

    pub particle_systems: Vec<ParticleSystem>,

    /// Pose channels of an armature object, parents before children.
    pub pose: Vec<PoseChannel>,

    /// Texture of a texture force field.
    pub force_field_texture: Option<EntityId>,

    /// Collection instanced by this object.
    pub instance_collection: Option<EntityId>,

    /// Whether the object owns a point cache (cloth, soft body, ...).
    pub has_point_cache: bool,

    /// Whether the object takes part in a rigid body simulation.
    pub rigid_body: bool,
}

impl Object {
    pub fn new(object_type: ObjectType) -> Self {
        Self {
            object_type,
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: EntityId) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Find a pose channel by bone name.
    pub fn pose_channel(&self, name: &str) -> Option<&PoseChannel> {
        self.pose.iter().find(|channel| channel.name == name)
    }

    /// Visit every data-block referenced by the object, including its data.
    pub fn foreach_id(&self, f: &mut impl FnMut(EntityId)) {
        let mut visit = |id: Option<EntityId>| {
            if let Some(id) = id {
                f(id)
            }
        };
        visit(self.data);
        visit(self.parent);
        for modifier in self
            .modifiers
            .iter()
            .chain(&self.grease_pencil_modifiers)
            .chain(&self.shader_effects)
        {
            modifier.references.iter().for_each(|id| visit(Some(*id)));
        }
        for constraint in &self.constraints {
            constraint.targets.iter().for_each(|id| visit(Some(*id)));
        }
        self.materials.iter().for_each(|slot| visit(*slot));
        for system in &self.particle_systems {
            visit(Some(system.settings));
            system.targets.iter().for_each(|id| visit(Some(*id)));
        }
        for channel in &self.pose {
            visit(channel.custom_shape);
            for constraint in &channel.constraints {
                constraint.targets.iter().for_each(|id| visit(Some(*id)));
            }
        }
        visit(self.force_field_texture);
        visit(self.instance_collection);
        for channel in &self.pose {
            foreach_property_id(&channel.properties, f);
        }
    }
}

/// A modifier, grease pencil modifier or shader effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifier {
    pub name: String,
    pub show_viewport: bool,
    pub show_render: bool,
    /// Data-blocks the modifier reads from. Unset pointers are not stored.
    pub references: Vec<EntityId>,
}

impl Default for Modifier {
    fn default() -> Self {
        Self {
            name: String::new(),
            show_viewport: true,
            show_render: true,
            references: Vec::new(),
        }
    }
}

impl Modifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether the modifier runs in render or viewport evaluation.
    pub fn is_enabled(&self, render: bool) -> bool {
        if render {
            self.show_render
        } else {
            self.show_viewport
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConstraintKind {
    #[default]
    Generic,
    /// Inverse kinematics. A chain length of zero reaches the root bone.
    Kinematic { chain_length: u32, use_tip: bool },
    SplineIk { chain_length: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraint {
    pub name: String,
    pub kind: ConstraintKind,
    pub targets: Vec<EntityId>,
}

impl Constraint {
    pub fn new(name: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            name: name.into(),
            kind,
            targets: Vec::new(),
        }
    }
}

/// A particle system instance on an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleSystem {
    pub name: String,
    pub settings: EntityId,
    /// Keyed and boids targets.
    #[serde(default)]
    pub targets: Vec<EntityId>,
}

/// Pose channel of an armature object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseChannel {
    pub name: String,
    pub parent: Option<String>,
    pub properties: Vec<IdProperty>,
    pub constraints: Vec<Constraint>,
    pub custom_shape: Option<EntityId>,
    pub bbone_segments: u32,
}

impl PoseChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn has_bbone(&self) -> bool {
        self.bbone_segments > 1
    }
}

/// Walk up the pose hierarchy to find the root of an IK chain ending at
/// `channel`. Returns the index of the root channel.
pub fn ik_chain_root(pose: &[PoseChannel], channel: usize, chain_length: u32, use_tip: bool) -> Option<usize> {
    let mut root = if use_tip {
        Some(channel)
    } else {
        parent_index(pose, channel)
    }?;
    let mut segments = 0;
    while let Some(parent) = parent_index(pose, root) {
        segments += 1;
        if segments == chain_length || segments as usize >= pose.len() {
            break;
        }
        root = parent;
    }
    Some(root)
}

/// Root of a spline IK chain ending at `channel`.
pub fn spline_ik_chain_root(pose: &[PoseChannel], channel: usize, chain_length: u32) -> usize {
    let mut root = channel;
    let mut segments = 0;
    while let Some(parent) = parent_index(pose, root) {
        segments += 1;
        if segments == chain_length || segments as usize >= pose.len() {
            break;
        }
        root = parent;
    }
    root
}

fn parent_index(pose: &[PoseChannel], channel: usize) -> Option<usize> {
    let parent = pose.get(channel)?.parent.as_deref()?;
    pose.iter().position(|candidate| candidate.name == parent)
}
