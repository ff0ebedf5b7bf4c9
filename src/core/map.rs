// object map output model
use std::cell::RefCell;
use std::collections::HashSet;

use serde::ser::{SerializeMap, SerializeStruct, Serializer};
use serde::Serialize;

use crate::core::types::{MapId, TypeTag};
use crate::core::value::{Descriptor, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PropertyError {
    #[serde(rename = "MAX DEPTH REACHED")]
    MaxDepthReached,
    #[serde(rename = "INACCESSIBLE")]
    Inaccessible,
}

impl PropertyError {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyError::MaxDepthReached => "MAX DEPTH REACHED",
            PropertyError::Inaccessible => "INACCESSIBLE",
        }
    }
}

/// Leaf member, or a member that could not be mapped.
///
/// `error` never coexists with `type_tag`/`value`; use the constructors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub level: u32,
    pub property_key: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<TypeTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<Descriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PropertyError>,
}

impl PropertyRecord {
    pub fn leaf(level: u32, key: &str, type_tag: TypeTag, value: Value, descriptor: Option<Descriptor>) -> Self {
        PropertyRecord {
            level,
            property_key: key.to_string(),
            type_tag: Some(type_tag),
            value: Some(value),
            descriptor,
            error: None,
        }
    }

    pub fn failed(level: u32, key: &str, error: PropertyError) -> Self {
        PropertyRecord {
            level,
            property_key: key.to_string(),
            type_tag: None,
            value: None,
            descriptor: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One member slot of an ObjectMap.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Property {
    Record(PropertyRecord),
    Map {
        #[serde(rename = "ref")]
        id: MapId,
    },
}

impl Property {
    pub fn as_record(&self) -> Option<&PropertyRecord> {
        match self {
            Property::Record(r) => Some(r),
            Property::Map { .. } => None,
        }
    }

    pub fn map_id(&self) -> Option<MapId> {
        match self {
            Property::Map { id } => Some(*id),
            Property::Record(_) => None,
        }
    }
}

/// Insertion-ordered member table. Names are unique because enumeration dedups them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Vec<(String, Property)>);

impl Properties {
    pub fn new() -> Self {
        Properties(Vec::new())
    }

    pub fn insert(&mut self, name: String, property: Property) {
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = property,
            None => self.0.push((name, property)),
        }
    }

    /// Append without looking for an existing entry. `name` must not be present yet.
    pub(crate) fn push(&mut self, name: String, property: Property) {
        self.0.push((name, property));
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, p)| p)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> + '_ {
        self.0.iter().map(|(k, p)| (k.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, p) in &self.0 {
            map.serialize_entry(k, p)?;
        }
        map.end()
    }
}

/// Node for one distinct container value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectMap {
    pub id: MapId,
    pub level: u32,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    pub properties: Properties,
}

/// Every node produced by one mapping call, indexed by id. The root is id 0.
///
/// A member that links to a node (`Property::Map`) names it by id, so a
/// container reached twice is the same node, never a copy.
///
/// Serializes as a tree rooted at node 0: a node is written in full where it
/// is first reached and as `{ref: <id>}` everywhere after.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMapping {
    nodes: Vec<ObjectMap>,
}

impl ObjectMapping {
    pub(crate) fn from_nodes(nodes: Vec<ObjectMap>) -> Self {
        ObjectMapping { nodes }
    }

    pub fn root(&self) -> &ObjectMap {
        &self.nodes[0]
    }

    pub fn node(&self, id: MapId) -> Option<&ObjectMap> {
        self.nodes.get(id as usize)
    }

    /// Follow a member to the node it links to, if it is a container member.
    pub fn resolve(&self, property: &Property) -> Option<&ObjectMap> {
        property.map_id().and_then(|id| self.node(id))
    }

    /// Walk `path` from the root, one member name per step.
    pub fn lookup(&self, path: &[&str]) -> Option<&Property> {
        let (last, init) = path.split_last()?;
        let mut current = self.root();
        for name in init {
            current = self.resolve(current.properties.get(name)?)?;
        }
        current.properties.get(last)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectMap> + '_ {
        self.nodes.iter()
    }
}

impl Serialize for ObjectMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(root) = self.nodes.first() else {
            return serializer.serialize_none();
        };
        let expanded = RefCell::new(HashSet::from([root.id]));
        NestedNode { mapping: self, node: root, expanded: &expanded }.serialize(serializer)
    }
}

struct NestedNode<'m> {
    mapping: &'m ObjectMapping,
    node: &'m ObjectMap,
    expanded: &'m RefCell<HashSet<MapId>>,
}

impl Serialize for NestedNode<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ObjectMap", 4)?;
        state.serialize_field("id", &self.node.id)?;
        state.serialize_field("level", &self.node.level)?;
        state.serialize_field("type", &self.node.type_tag)?;
        state.serialize_field(
            "properties",
            &NestedProperties { mapping: self.mapping, properties: &self.node.properties, expanded: self.expanded },
        )?;
        state.end()
    }
}

struct NestedProperties<'m> {
    mapping: &'m ObjectMapping,
    properties: &'m Properties,
    expanded: &'m RefCell<HashSet<MapId>>,
}

impl Serialize for NestedProperties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.properties.len()))?;
        for (name, property) in self.properties.iter() {
            let Property::Map { id } = property else {
                map.serialize_entry(name, property)?;
                continue;
            };
            //the borrow must end before recursing
            let first_visit = self.expanded.borrow_mut().insert(*id);
            match self.mapping.node(*id) {
                Some(node) if first_visit => {
                    let nested = NestedNode { mapping: self.mapping, node, expanded: self.expanded };
                    map.serialize_entry(name, &nested)?;
                }
                _ => map.serialize_entry(name, property)?,
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(level: u32, key: &str) -> Property {
        Property::Record(PropertyRecord::leaf(level, key, TypeTag::String, Value::from(key), None))
    }

    fn sample() -> ObjectMapping {
        let mut root_props = Properties::new();
        root_props.insert("a".into(), Property::Map { id: 1 });
        root_props.insert("x".into(), leaf(0, "x"));
        let mut child_props = Properties::new();
        child_props.insert("y".into(), leaf(1, "y"));
        child_props.insert("up".into(), Property::Map { id: 0 });

        ObjectMapping::from_nodes(vec![
            ObjectMap { id: 0, level: 0, type_tag: TypeTag::Object, properties: root_props },
            ObjectMap { id: 1, level: 1, type_tag: TypeTag::Object, properties: child_props },
        ])
    }

    #[test]
    fn failed_record_carries_no_value_or_type() {
        let r = PropertyRecord::failed(2, "two", PropertyError::MaxDepthReached);
        assert!(r.is_error());
        assert_eq!(r.type_tag, None);
        assert_eq!(r.value, None);
        assert_eq!(r.error.unwrap().as_str(), "MAX DEPTH REACHED");
    }

    #[test]
    fn properties_keep_insertion_order_and_replace_in_place() {
        let mut props = Properties::new();
        props.insert("b".into(), leaf(0, "b"));
        props.insert("a".into(), leaf(0, "a"));
        props.insert("b".into(), Property::Map { id: 3 });

        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(props.get("b").unwrap().map_id(), Some(3));
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn push_appends_in_call_order() {
        let mut props = Properties::new();
        for name in ["z", "m", "a"] {
            props.push(name.into(), leaf(0, name));
        }
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["z", "m", "a"]);
        assert_eq!(props.get("m"), Some(&leaf(0, "m")));
    }

    #[test]
    fn lookup_follows_links_including_back_references() {
        let mapping = sample();

        let y = mapping.lookup(&["a", "y"]).unwrap().as_record().unwrap();
        assert_eq!(y.property_key, "y");

        let up = mapping.lookup(&["a", "up"]).unwrap();
        assert_eq!(mapping.resolve(up).unwrap().id, mapping.root().id);
        assert!(mapping.lookup(&["a", "up", "a", "y"]).is_some());
        assert!(mapping.lookup(&["x", "y"]).is_none());
        assert!(mapping.lookup(&[]).is_none());
    }
}
