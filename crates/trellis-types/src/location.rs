use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::name::Name;
use crate::path::Path;
use crate::property::{Property, Value};

/// Name of the identification property carrying a node's UUID.
pub const UUID_PROPERTY: &str = "trellis:uuid";

fn uuid_property_name() -> &'static Name {
    static NAME: OnceLock<Name> = OnceLock::new();
    NAME.get_or_init(|| Name::new_unchecked(UUID_PROPERTY))
}

/// Identifies a node: a path, identification properties, or both.
///
/// A location handed to a request usually carries whatever the caller knows
/// (often just a path). Connectors answer with a fully populated location
/// (path plus UUID) as the request's actual location.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<Path>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    id_properties: Vec<Property>,
}

impl Location {
    /// A location identified only by its path.
    pub fn from_path(path: Path) -> Self {
        Self {
            path: Some(path),
            id_properties: Vec::new(),
        }
    }

    /// A location identified only by UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self::default().with_uuid(uuid)
    }

    /// The root location of a workspace.
    pub fn root() -> Self {
        Self::from_path(Path::root())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }

    pub fn id_properties(&self) -> &[Property] {
        &self.id_properties
    }

    pub fn has_id_properties(&self) -> bool {
        !self.id_properties.is_empty()
    }

    /// Look up one identification property by name.
    pub fn id_property(&self, name: &Name) -> Option<&Property> {
        self.id_properties.iter().find(|p| p.name() == name)
    }

    /// The UUID carried in the identification properties, if any.
    pub fn uuid(&self) -> Option<Uuid> {
        self.id_property(uuid_property_name())
            .and_then(Property::first_value)
            .and_then(Value::as_uuid)
    }

    /// Copy of this location with the path replaced.
    pub fn with_path(&self, path: Path) -> Self {
        Self {
            path: Some(path),
            id_properties: self.id_properties.clone(),
        }
    }

    /// Copy of this location with the UUID property set (replacing any existing one).
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        let name = uuid_property_name();
        self.id_properties.retain(|p| p.name() != name);
        self.id_properties
            .push(Property::single(name.clone(), Value::Uuid(uuid)));
        self
    }

    /// Copy of this location with an extra identification property.
    pub fn with_id_property(mut self, property: Property) -> Self {
        self.id_properties.retain(|p| p.name() != property.name());
        self.id_properties.push(property);
        self
    }

    /// Returns `true` if both locations name the same node.
    ///
    /// Paths are compared when both sides have one; otherwise the
    /// identification properties must match.
    pub fn is_same(&self, other: &Location) -> bool {
        match (&self.path, &other.path) {
            (Some(a), Some(b)) => a == b,
            _ => {
                if let (Some(a), Some(b)) = (self.uuid(), other.uuid()) {
                    return a == b;
                }
                self.has_id_properties() && self.id_properties == other.id_properties
            }
        }
    }
}

impl From<Path> for Location {
    fn from(path: Path) -> Self {
        Self::from_path(path)
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location({self})")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, self.uuid()) {
            (Some(path), Some(uuid)) => write!(f, "{path} ({uuid})"),
            (Some(path), None) => write!(f, "{path}"),
            (None, Some(uuid)) => write!(f, "<{uuid}>"),
            (None, None) if self.has_id_properties() => {
                let names: Vec<&str> = self.id_properties.iter().map(|p| p.name().as_str()).collect();
                write!(f, "<{}>", names.join(", "))
            }
            (None, None) => f.write_str("<unknown>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(s: &str) -> Location {
        Location::from_path(Path::parse(s).unwrap())
    }

    #[test]
    fn same_by_path() {
        let id = Uuid::new_v4();
        assert!(loc("/a").is_same(&loc("/a").with_uuid(id)));
        assert!(!loc("/a").is_same(&loc("/b")));
    }

    #[test]
    fn same_by_uuid_when_path_missing() {
        let id = Uuid::new_v4();
        let by_uuid = Location::from_uuid(id);
        assert!(by_uuid.is_same(&loc("/a").with_uuid(id)));
        assert!(!by_uuid.is_same(&Location::from_uuid(Uuid::new_v4())));
    }

    #[test]
    fn empty_locations_are_not_same() {
        assert!(!Location::default().is_same(&Location::default()));
    }

    #[test]
    fn with_uuid_replaces_previous() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let l = loc("/a").with_uuid(first).with_uuid(second);
        assert_eq!(l.uuid(), Some(second));
        assert_eq!(l.id_properties().len(), 1);
    }

    #[test]
    fn display_forms() {
        assert_eq!(loc("/a/b").to_string(), "/a/b");
        assert_eq!(Location::default().to_string(), "<unknown>");
    }
}
