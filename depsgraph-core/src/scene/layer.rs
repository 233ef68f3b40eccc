//! Scenes, view layers and collections.

use serde::{Deserialize, Serialize};

use super::anim::{foreach_property_id, IdProperty};
use super::id::EntityId;

/// A collection of objects and child collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collection {
    pub hide_viewport: bool,
    pub hide_render: bool,
    pub objects: Vec<EntityId>,
    pub children: Vec<EntityId>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(mut self, objects: impl IntoIterator<Item = EntityId>) -> Self {
        self.objects.extend(objects);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = EntityId>) -> Self {
        self.children.extend(children);
        self
    }

    /// Whether the collection is hidden for the given evaluation purpose.
    pub fn is_hidden(&self, render: bool) -> bool {
        if render {
            self.hide_render
        } else {
            self.hide_viewport
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub camera: Option<EntityId>,
    pub world: Option<EntityId>,
    pub view_layers: Vec<ViewLayer>,
    pub master_collection: Option<EntityId>,

    /// Background scene shown behind this one.
    pub background_set: Option<EntityId>,

    pub rigid_body_world: Option<RigidBodyWorld>,
    pub sequence_editor: Option<SequenceEditor>,

    /// Compositor node tree.
    pub compositor: Option<EntityId>,

    /// Cameras bound to timeline markers.
    pub marker_cameras: Vec<EntityId>,
}

impl Scene {
    /// View layer used when the scene is pulled in as a background set or
    /// through a sequencer strip.
    pub fn default_view_layer(&self) -> Option<&ViewLayer> {
        self.view_layers.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewLayer {
    pub name: String,
    pub bases: Vec<Base>,
    pub layer_collections: Vec<LayerCollection>,
    pub material_override: Option<EntityId>,
    pub freestyle_line_sets: Vec<FreestyleLineSet>,
}

/// An object instanced into a view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Base {
    pub object: EntityId,
    pub enabled_viewport: bool,
    pub enabled_render: bool,
}

impl Default for Base {
    fn default() -> Self {
        Self {
            object: EntityId::UNSET,
            enabled_viewport: true,
            enabled_render: true,
        }
    }
}

impl Base {
    pub fn new(object: EntityId) -> Self {
        Self {
            object,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self, render: bool) -> bool {
        if render {
            self.enabled_render
        } else {
            self.enabled_viewport
        }
    }
}

/// View layer's wrapper around a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerCollection {
    pub collection: EntityId,
    #[serde(default)]
    pub exclude: bool,
    #[serde(default)]
    pub children: Vec<LayerCollection>,
}

impl LayerCollection {
    pub fn new(collection: EntityId) -> Self {
        Self {
            collection,
            exclude: false,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreestyleLineSet {
    pub name: String,
    pub collection: Option<EntityId>,
    pub line_style: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBodyWorld {
    /// Collection of simulated objects.
    pub collection: Option<EntityId>,
    /// Collection of rigid body constraint objects.
    pub constraints: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceEditor {
    pub strips: Vec<Strip>,
}

impl SequenceEditor {
    /// Visit every strip, descending into meta strips.
    pub fn foreach_strip(&self, f: &mut impl FnMut(&Strip)) {
        fn walk(strips: &[Strip], f: &mut impl FnMut(&Strip)) {
            for strip in strips {
                f(strip);
                walk(&strip.children, f);
            }
        }
        walk(&self.strips, f);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Strip {
    pub name: String,
    pub properties: Vec<IdProperty>,
    pub sound: Option<EntityId>,
    /// Scene rendered by a scene strip.
    pub scene: Option<EntityId>,
    /// Use the sequencer of the strip's scene instead of its render.
    pub use_scene_strips: bool,
    /// Strips nested in a meta strip.
    pub children: Vec<Strip>,
}

impl Scene {
    /// Visit every data-block referenced by the scene. `embedded` selects
    /// whether owned data (master collection, compositor tree) is included.
    pub fn foreach_id(&self, embedded: bool, f: &mut impl FnMut(EntityId)) {
        let mut visit = |id: Option<EntityId>| {
            if let Some(id) = id {
                f(id)
            }
        };
        visit(self.camera);
        visit(self.world);
        visit(self.background_set);
        if embedded {
            visit(self.master_collection);
            visit(self.compositor);
        }
        for view_layer in &self.view_layers {
            view_layer.bases.iter().for_each(|base| visit(Some(base.object)));
            visit_layer_collections(&view_layer.layer_collections, &mut visit);
            visit(view_layer.material_override);
            for line_set in &view_layer.freestyle_line_sets {
                visit(line_set.collection);
                visit(line_set.line_style);
            }
        }
        if let Some(world) = &self.rigid_body_world {
            visit(world.collection);
            visit(world.constraints);
        }
        self.marker_cameras.iter().for_each(|id| visit(Some(*id)));
        if let Some(editor) = &self.sequence_editor {
            editor.foreach_strip(&mut |strip| {
                visit(strip.sound);
                visit(strip.scene);
                foreach_property_id(&strip.properties, &mut |id| visit(Some(id)));
            });
        }
    }
}

fn visit_layer_collections(
    layer_collections: &[LayerCollection],
    visit: &mut impl FnMut(Option<EntityId>),
) {
    for layer_collection in layer_collections {
        visit(Some(layer_collection.collection));
        visit_layer_collections(&layer_collection.children, visit);
    }
}
