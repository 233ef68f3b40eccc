//! Data-blocks
//!
//! An [`Entity`] is one top-level data-block. Its type tag is derived from the
//! payload variant, so the tag and the payload never disagree.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::anim::{foreach_property_id, AnimData, IdProperty, NlaStrip};
use super::id::{EntityId, IdFlags, IdType};
use super::layer::{Collection, Scene};
use super::node_tree::NodeTree;
use super::object::Object;
use crate::error::SceneError;

/// A top-level data-block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Session identifier. Assigned by [`Main`](super::Main) when unset.
    #[serde(default = "unset_id")]
    pub id: EntityId,

    pub name: String,

    #[serde(default)]
    pub flags: IdFlags,

    /// Custom properties.
    #[serde(default)]
    pub properties: Vec<IdProperty>,

    #[serde(default)]
    pub anim_data: Option<AnimData>,

    pub data: EntityData,
}

fn unset_id() -> EntityId {
    EntityId::UNSET
}

/// Type-specific payload of a data-block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityData {
    Action,
    Armature(Armature),
    CacheFile,
    Camera(Camera),
    Collection(Collection),
    Geometry(Geometry),
    Image(Image),
    Key(Key),
    Light(Light),
    LightProbe,
    LineStyle(LineStyle),
    Mask(Mask),
    Material(Material),
    MovieClip,
    NodeTree(NodeTree),
    Object(Object),
    Particle(ParticleSettings),
    Scene(Scene),
    Simulation(Simulation),
    Sound,
    Speaker(Speaker),
    Text,
    Texture(Texture),
    VFont,
    World(World),
    /// Data-blocks that never take part in evaluation beyond their custom
    /// properties and animation (libraries, screens, brushes, ...).
    Generic(IdType),
}

impl EntityData {
    pub fn id_type(&self) -> IdType {
        match self {
            EntityData::Action => IdType::Action,
            EntityData::Armature(_) => IdType::Armature,
            EntityData::CacheFile => IdType::CacheFile,
            EntityData::Camera(_) => IdType::Camera,
            EntityData::Collection(_) => IdType::Collection,
            EntityData::Geometry(geometry) => geometry.kind.id_type(),
            EntityData::Image(_) => IdType::Image,
            EntityData::Key(_) => IdType::Key,
            EntityData::Light(_) => IdType::Light,
            EntityData::LightProbe => IdType::LightProbe,
            EntityData::LineStyle(_) => IdType::LineStyle,
            EntityData::Mask(_) => IdType::Mask,
            EntityData::Material(_) => IdType::Material,
            EntityData::MovieClip => IdType::MovieClip,
            EntityData::NodeTree(_) => IdType::NodeTree,
            EntityData::Object(_) => IdType::Object,
            EntityData::Particle(_) => IdType::Particle,
            EntityData::Scene(_) => IdType::Scene,
            EntityData::Simulation(_) => IdType::Simulation,
            EntityData::Sound => IdType::Sound,
            EntityData::Speaker(_) => IdType::Speaker,
            EntityData::Text => IdType::Text,
            EntityData::Texture(_) => IdType::Texture,
            EntityData::VFont => IdType::VFont,
            EntityData::World(_) => IdType::World,
            EntityData::Generic(id_type) => *id_type,
        }
    }
}

impl Entity {
    /// Create an entity with an unset identifier.
    pub fn new(name: impl Into<String>, data: EntityData) -> Self {
        Self {
            id: EntityId::UNSET,
            name: name.into(),
            flags: IdFlags::empty(),
            properties: Vec::new(),
            anim_data: None,
            data,
        }
    }

    pub fn with_property(mut self, property: IdProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_anim_data(mut self, anim_data: AnimData) -> Self {
        self.anim_data = Some(anim_data);
        self
    }

    pub fn with_flags(mut self, flags: IdFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn id_type(&self) -> IdType {
        self.data.id_type()
    }

    /// Name prefixed with the type code, as shown in logs.
    pub fn display_name(&self) -> String {
        format!("{}{}", self.id_type().code(), self.name)
    }

    /// Modifiers, pose channels, particle systems and shape-key blocks name
    /// their operations, so each list needs unique names.
    pub fn check_unique_names(&self) -> Result<(), SceneError> {
        match &self.data {
            EntityData::Object(object) => {
                self.check_unique("modifier", object.modifiers.iter().map(|m| m.name.as_str()))?;
                self.check_unique("pose channel", object.pose.iter().map(|c| c.name.as_str()))?;
                self.check_unique(
                    "particle system",
                    object.particle_systems.iter().map(|system| system.name.as_str()),
                )
            }
            EntityData::Key(key) => {
                self.check_unique("shape key block", key.blocks.iter().map(String::as_str))
            }
            _ => Ok(()),
        }
    }

    fn check_unique<'n>(
        &self,
        kind: &'static str,
        names: impl Iterator<Item = &'n str>,
    ) -> Result<(), SceneError> {
        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name) {
                return Err(SceneError::DuplicateName {
                    entity: self.display_name(),
                    kind,
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn is_embedded(&self) -> bool {
        self.flags.contains(IdFlags::EMBEDDED_DATA)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match &self.data {
            EntityData::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match &self.data {
            EntityData::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn as_scene(&self) -> Option<&Scene> {
        match &self.data {
            EntityData::Scene(scene) => Some(scene),
            _ => None,
        }
    }

    pub fn as_node_tree(&self) -> Option<&NodeTree> {
        match &self.data {
            EntityData::NodeTree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Visit every data-block this one points at: payload references, custom
    /// properties and animation. Embedded data-blocks (node trees owned by
    /// materials, a scene's master collection) are visited only when
    /// `embedded` is set.
    pub fn foreach_id(&self, embedded: bool, f: &mut impl FnMut(EntityId)) {
        foreach_property_id(&self.properties, f);
        if let Some(anim_data) = &self.anim_data {
            foreach_anim_id(anim_data, f);
        }
        let mut visit = |id: Option<EntityId>| {
            if let Some(id) = id {
                f(id)
            }
        };
        let owned = |id: Option<EntityId>| id.filter(|_| embedded);
        match &self.data {
            EntityData::Action
            | EntityData::CacheFile
            | EntityData::LightProbe
            | EntityData::MovieClip
            | EntityData::Sound
            | EntityData::Text
            | EntityData::VFont
            | EntityData::Generic(_) => {}
            EntityData::Armature(armature) => {
                armature.foreach_bone(&mut |bone| {
                    foreach_property_id(&bone.properties, &mut |id| visit(Some(id)))
                });
            }
            EntityData::Camera(camera) => visit(camera.dof_object),
            EntityData::Collection(collection) => {
                collection.objects.iter().for_each(|id| visit(Some(*id)));
                collection.children.iter().for_each(|id| visit(Some(*id)));
            }
            EntityData::Geometry(geometry) => {
                geometry.materials.iter().for_each(|slot| visit(*slot));
                visit(geometry.shape_key);
                visit(geometry.bevel_object);
                visit(geometry.taper_object);
                visit(geometry.text_on_curve);
                visit(geometry.surface);
            }
            EntityData::Image(_) | EntityData::Key(_) => {}
            EntityData::Light(light) => visit(owned(light.node_tree)),
            EntityData::LineStyle(line_style) => {
                visit(owned(line_style.node_tree));
                line_style.textures.iter().for_each(|id| visit(Some(*id)));
            }
            EntityData::Mask(mask) => {
                for layer in &mask.layers {
                    for spline in &layer.splines {
                        spline.point_parents.iter().for_each(|id| visit(*id));
                    }
                }
            }
            EntityData::Material(material) => visit(owned(material.node_tree)),
            EntityData::NodeTree(tree) => tree.foreach_id(&mut |id| visit(Some(id))),
            EntityData::Object(object) => object.foreach_id(&mut |id| visit(Some(id))),
            EntityData::Particle(settings) => {
                visit(settings.instance_object);
                visit(settings.instance_collection);
                settings.textures.iter().for_each(|id| visit(Some(*id)));
            }
            EntityData::Scene(scene) => scene.foreach_id(embedded, &mut |id| visit(Some(id))),
            EntityData::Simulation(simulation) => visit(owned(simulation.node_tree)),
            EntityData::Speaker(speaker) => visit(speaker.sound),
            EntityData::Texture(texture) => {
                visit(owned(texture.node_tree));
                visit(texture.image);
            }
            EntityData::World(world) => visit(owned(world.node_tree)),
        }
    }
}

fn foreach_anim_id(anim_data: &AnimData, f: &mut impl FnMut(EntityId)) {
    fn strips(list: &[NlaStrip], f: &mut impl FnMut(EntityId)) {
        for strip in list {
            if let Some(action) = strip.action {
                f(action);
            }
            strips(&strip.strips, f);
        }
    }
    if let Some(action) = anim_data.action {
        f(action);
    }
    for track in &anim_data.nla_tracks {
        strips(&track.strips, f);
    }
    for driver in &anim_data.drivers {
        for variable in &driver.variables {
            for target in &variable.targets {
                if let Some(id) = target.id {
                    f(id);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Mesh,
    CurveLegacy,
    Curves,
    GreasePencil,
    Lattice,
    MetaBall,
    PointCloud,
    Volume,
}

impl GeometryKind {
    pub fn id_type(&self) -> IdType {
        match self {
            GeometryKind::Mesh => IdType::Mesh,
            GeometryKind::CurveLegacy => IdType::CurveLegacy,
            GeometryKind::Curves => IdType::Curves,
            GeometryKind::GreasePencil => IdType::GreasePencil,
            GeometryKind::Lattice => IdType::Lattice,
            GeometryKind::MetaBall => IdType::MetaBall,
            GeometryKind::PointCloud => IdType::PointCloud,
            GeometryKind::Volume => IdType::Volume,
        }
    }
}

/// Geometry object data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub kind: GeometryKind,
    #[serde(default)]
    pub materials: Vec<Option<EntityId>>,
    #[serde(default)]
    pub shape_key: Option<EntityId>,
    /// Legacy curve bevel object.
    #[serde(default)]
    pub bevel_object: Option<EntityId>,
    /// Legacy curve taper object.
    #[serde(default)]
    pub taper_object: Option<EntityId>,
    /// Curve a text object follows.
    #[serde(default)]
    pub text_on_curve: Option<EntityId>,
    /// Surface mesh object hair curves are attached to.
    #[serde(default)]
    pub surface: Option<EntityId>,
}

impl Geometry {
    pub fn new(kind: GeometryKind) -> Self {
        Self {
            kind,
            materials: Vec::new(),
            shape_key: None,
            bevel_object: None,
            taper_object: None,
            text_on_curve: None,
            surface: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Armature {
    pub bones: Vec<Bone>,
}

impl Armature {
    pub fn foreach_bone(&self, f: &mut impl FnMut(&Bone)) {
        fn walk(bones: &[Bone], f: &mut impl FnMut(&Bone)) {
            for bone in bones {
                f(bone);
                walk(&bone.children, f);
            }
        }
        walk(&self.bones, f);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bone {
    pub name: String,
    pub properties: Vec<IdProperty>,
    pub children: Vec<Bone>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    /// Depth of field focus object.
    pub dof_object: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    /// Image sequence or movie, needs per-frame updates.
    pub animated: bool,
}

/// Shape keys of a geometry data-block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Key {
    /// Key block names.
    pub blocks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    pub node_tree: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineStyle {
    pub node_tree: Option<EntityId>,
    pub textures: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mask {
    pub layers: Vec<MaskLayer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskLayer {
    pub splines: Vec<MaskSpline>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskSpline {
    /// Parent data-block of each point, typically a movie clip.
    pub point_parents: Vec<Option<EntityId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub node_tree: Option<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParticlePhysics {
    #[default]
    Newtonian,
    Keyed,
    Boids,
    Fluid,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParticleRender {
    #[default]
    Halo,
    Path,
    Object,
    Collection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
    pub physics: ParticlePhysics,
    pub render_as: ParticleRender,
    pub instance_object: Option<EntityId>,
    pub instance_collection: Option<EntityId>,
    /// Texture slots.
    pub textures: Vec<EntityId>,
}

impl ParticleSettings {
    /// Whether the system follows keyed or boids targets.
    pub fn uses_targets(&self) -> bool {
        matches!(self.physics, ParticlePhysics::Keyed | ParticlePhysics::Boids)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Simulation {
    pub node_tree: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Speaker {
    pub sound: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Texture {
    pub node_tree: Option<EntityId>,
    /// Image of an image texture.
    pub image: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct World {
    pub node_tree: Option<EntityId>,
}
