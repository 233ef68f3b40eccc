//! Custom properties and animation data attached to data-blocks.

use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// A named custom property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdProperty {
    pub name: String,
    pub value: PropertyValue,
}

/// Value of a custom property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    String(String),
    Group(Vec<IdProperty>),
    /// Reference to another data-block. Unset references are kept so that
    /// the property still exists for drivers.
    Id(Option<EntityId>),
}

impl IdProperty {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Shorthand for a data-block reference property.
    pub fn id_ref(name: impl Into<String>, target: EntityId) -> Self {
        Self::new(name, PropertyValue::Id(Some(target)))
    }
}

/// Call `f` for every data-block referenced anywhere in the property tree.
pub fn foreach_property_id(properties: &[IdProperty], f: &mut impl FnMut(EntityId)) {
    for property in properties {
        match &property.value {
            PropertyValue::Id(Some(id)) => f(*id),
            PropertyValue::Group(children) => foreach_property_id(children, f),
            _ => {}
        }
    }
}

/// Find a top-level property by name.
pub fn find_property<'a>(properties: &'a [IdProperty], name: &str) -> Option<&'a IdProperty> {
    properties.iter().find(|property| property.name == name)
}

/// Animation attached to a data-block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimData {
    /// Active action.
    #[serde(default)]
    pub action: Option<EntityId>,

    /// Non-linear animation tracks.
    #[serde(default)]
    pub nla_tracks: Vec<NlaTrack>,

    /// Driver F-curves.
    #[serde(default)]
    pub drivers: Vec<FCurve>,
}

impl AnimData {
    /// Whether there is anything to evaluate in the animation component.
    pub fn has_animation(&self) -> bool {
        self.action.is_some() || !self.nla_tracks.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NlaTrack {
    #[serde(default)]
    pub strips: Vec<NlaStrip>,
}

/// A strip either plays an action or groups nested strips (meta strip).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NlaStrip {
    #[serde(default)]
    pub action: Option<EntityId>,
    #[serde(default)]
    pub strips: Vec<NlaStrip>,
}

/// An F-curve carrying a driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FCurve {
    /// Path of the driven property, relative to the owning data-block.
    #[serde(default)]
    pub api_path: String,

    /// Array index of the driven property, `-1` for scalar properties.
    #[serde(default)]
    pub array_index: i32,

    #[serde(default)]
    pub variables: Vec<DriverVariable>,
}

impl FCurve {
    pub fn new(api_path: impl Into<String>, array_index: i32) -> Self {
        Self {
            api_path: api_path.into(),
            array_index,
            variables: Vec::new(),
        }
    }

    pub fn with_variable(mut self, variable: DriverVariable) -> Self {
        self.variables.push(variable);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverVariable {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub targets: Vec<DriverTarget>,
}

impl DriverVariable {
    /// A single-target variable reading `api_path` from `id`.
    pub fn single(name: impl Into<String>, id: EntityId, api_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: vec![DriverTarget {
                id: Some(id),
                api_path: api_path.into(),
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverTarget {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub api_path: String,
}
