//! Graph Vocabulary
//!
//! Component types, operation codes and the flags carried by graph nodes.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::depsgraph::Depsgraph;
use crate::scene::Main;

/// Bitmask with one bit per [`NodeType`].
pub type IdComponentsMask = u64;

/// Type of a component node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    /// Animation-independent parameters and drivers.
    Parameters,
    /// Actions and NLA evaluation.
    Animation,
    Transform,
    Geometry,
    Sequencer,
    LayerCollections,
    CopyOnWrite,
    ObjectFromLayer,
    Audio,
    Armature,
    GenericDatablock,
    Visibility,
    /// Pose-level solvers.
    EvalPose,
    /// One per pose channel, named after the bone.
    Bone,
    ParticleSystem,
    ParticleSettings,
    Shading,
    Cache,
    PointCache,
    ImageAnimation,
    BatchCache,
    Dupli,
    Synchronization,
    NtreeOutput,
    NtreeGeometryPreprocess,
    Simulation,
}

impl NodeType {
    pub fn bit(&self) -> IdComponentsMask {
        1 << (*self as u32)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What an operation node evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpCode {
    /// Placeholder operation with no dedicated meaning.
    Operation,

    // Parameters.
    ParametersEntry,
    ParametersEval,
    ParametersExit,
    IdProperty,
    Dimensions,
    Driver,

    // Animation.
    AnimationEntry,
    AnimationEval,
    AnimationExit,

    // Transform.
    TransformInit,
    TransformLocal,
    TransformParent,
    TransformConstraints,
    TransformEval,
    TransformSimulationInit,
    TransformFinal,

    // Base flags.
    ObjectFromLayerEntry,
    ObjectBaseFlags,
    ObjectFromLayerExit,

    // Rigid body.
    RigidbodyRebuild,
    RigidbodySim,
    RigidbodyTransformCopy,

    // Geometry.
    GeometryEvalInit,
    GeometryEval,
    GeometryEvalDone,
    GeometryShapekey,
    GeometrySelectUpdate,
    Modifier,
    Visibility,

    // Shading.
    Shading,
    LightUpdate,
    WorldUpdate,
    MaterialUpdate,

    // Rig.
    ArmatureEval,
    PoseInit,
    PoseInitIk,
    PoseCleanup,
    PoseDone,
    PoseIkSolver,
    PoseSplineIkSolver,
    BoneLocal,
    BonePoseParent,
    BoneConstraints,
    BoneReady,
    BoneDone,
    BoneSegments,

    // Particles.
    ParticleSystemInit,
    ParticleSystemEval,
    ParticleSystemDone,
    ParticleSettingsInit,
    ParticleSettingsReset,
    ParticleSettingsEval,
    PointCacheReset,

    FileCacheUpdate,
    ImageAnimation,
    SequencesEval,

    // Audio.
    AudioEntry,
    SoundEval,
    AudioVolume,
    SpeakerEval,

    ViewLayerEval,
    SceneEval,
    MaskAnimation,
    MaskEval,
    MovieclipEval,
    MovieclipSelectUpdate,
    LightProbeEval,
    GenericDatablockUpdate,
    Dupli,
    SimulationEval,
    SynchronizeToOriginal,
    NtreeOutput,
    NtreeGeometryPreprocess,
    CopyOnWrite,
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags! {
    /// State and scheduling flags of an operation node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct OperationFlags: u32 {
        /// Tagged for evaluation.
        const NEEDS_UPDATE = 1 << 0;
        /// The tag was placed on this node, not flushed to it.
        const DIRECTLY_MODIFIED = 1 << 1;
        /// The tag came from a user edit.
        const USER_MODIFIED = 1 << 2;
        /// Kept by unused node removal.
        const PINNED = 1 << 3;
        /// Skipped during evaluation.
        const MUTE = 1 << 4;
        /// First operation of its component.
        const ENTRY = 1 << 5;
        /// Last operation of its component.
        const EXIT = 1 << 6;
    }
}

bitflags! {
    /// What changed on a data-block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct RecalcFlags: u32 {
        const TRANSFORM = 1 << 0;
        const GEOMETRY = 1 << 1;
        const ANIMATION = 1 << 2;
        const PARAMETERS = 1 << 3;
        const SHADING = 1 << 4;
        const COPY_ON_WRITE = 1 << 5;
        const SYNC_TO_EVAL = 1 << 6;
    }
}

impl RecalcFlags {
    /// Component type whose operations a single recalc flag tags.
    pub fn component_type(self) -> Option<NodeType> {
        const MAPPING: [(RecalcFlags, NodeType); 7] = [
            (RecalcFlags::TRANSFORM, NodeType::Transform),
            (RecalcFlags::GEOMETRY, NodeType::Geometry),
            (RecalcFlags::ANIMATION, NodeType::Animation),
            (RecalcFlags::PARAMETERS, NodeType::Parameters),
            (RecalcFlags::SHADING, NodeType::Shading),
            (RecalcFlags::COPY_ON_WRITE, NodeType::CopyOnWrite),
            (RecalcFlags::SYNC_TO_EVAL, NodeType::Synchronization),
        ];
        MAPPING
            .iter()
            .find(|(flag, _)| *flag == self)
            .map(|(_, node_type)| *node_type)
    }
}

/// Origin of an update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateSource {
    Visibility,
    Time,
    UserEdit,
    Relations,
}

/// How directly a data-block takes part in evaluation. Later variants win
/// when an id is reached along several paths.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum LinkedState {
    #[default]
    NotLinked,
    Indirectly,
    Directly,
    ViaSet,
}

/// Custom data layers requested from geometry evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CustomDataMasks {
    pub vert: u64,
    pub edge: u64,
    pub face: u64,
    pub loop_: u64,
    pub poly: u64,
}

impl CustomDataMasks {
    pub fn merge(&mut self, other: CustomDataMasks) {
        self.vert |= other.vert;
        self.edge |= other.edge;
        self.face |= other.face;
        self.loop_ |= other.loop_;
        self.poly |= other.poly;
    }
}

/// Context handed to operation callbacks.
pub struct EvalContext<'a> {
    pub main: &'a Main,
    pub graph: &'a Depsgraph,
}

/// Evaluation callback of an operation.
pub type EvalCallback = Arc<dyn Fn(&EvalContext<'_>) + Send + Sync>;

/// Address of a component node: id node index and component index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentRef {
    pub id_node: usize,
    pub component: usize,
}

/// Address of an operation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationRef {
    pub component: ComponentRef,
    pub operation: usize,
}

/// Key of a component within its id node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    pub node_type: NodeType,
    pub name: String,
}

impl ComponentKey {
    pub fn new(node_type: NodeType, name: &str) -> Self {
        Self {
            node_type,
            name: name.to_string(),
        }
    }
}

impl From<NodeType> for ComponentKey {
    fn from(node_type: NodeType) -> Self {
        Self::new(node_type, "")
    }
}

/// Key of an operation within its component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub opcode: OpCode,
    pub name: String,
    pub name_tag: i32,
}

impl OperationKey {
    pub fn new(opcode: OpCode, name: &str, name_tag: i32) -> Self {
        Self {
            opcode,
            name: name.to_string(),
            name_tag,
        }
    }
}

impl From<OpCode> for OperationKey {
    fn from(opcode: OpCode) -> Self {
        Self::new(opcode, "", -1)
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.opcode, self.name)?;
        if self.name_tag != -1 {
            write!(f, "[{}]", self.name_tag)?;
        }
        Ok(())
    }
}
