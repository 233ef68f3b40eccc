//! Property paths used by drivers.
//!
//! Only the two forms that name a custom property are understood:
//! `["prop"]` on the data-block itself and `pose.bones["Bone"]["prop"]` on a
//! pose channel of an armature object. Everything else is an ordinary
//! property and resolves to `None`.

use super::anim::find_property;
use super::database::Main;
use super::id::EntityId;

/// A resolved custom property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomPropertyRef {
    /// Pose channel owning the property, `None` for the data-block itself.
    pub bone: Option<String>,
    pub name: String,
}

/// Resolve `path` relative to data-block `id` to an existing custom property.
pub fn resolve_custom_property(main: &Main, id: EntityId, path: &str) -> Option<CustomPropertyRef> {
    let entity = main.get(id)?;
    let path = path.trim();

    if let Some(rest) = path.strip_prefix("pose.bones") {
        let (bone, rest) = parse_key(rest)?;
        let (name, rest) = parse_key(rest)?;
        if !rest.is_empty() {
            return None;
        }
        let channel = entity.as_object()?.pose_channel(&bone)?;
        find_property(&channel.properties, &name)?;
        return Some(CustomPropertyRef {
            bone: Some(bone),
            name,
        });
    }

    let (name, rest) = parse_key(path)?;
    if !rest.is_empty() {
        return None;
    }
    find_property(&entity.properties, &name)?;
    Some(CustomPropertyRef { bone: None, name })
}

/// Parse a leading `["key"]` (or `['key']`), returning the key and the rest
/// of the path.
fn parse_key(path: &str) -> Option<(String, &str)> {
    let rest = path.strip_prefix('[')?;
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    let key = &rest[..end];
    let rest = rest[end + 1..].strip_prefix(']')?;
    Some((key.to_string(), rest))
}
