//! Traversal engine.
//!
//! Walks a subject depth-first, creating one [`ObjectMap`] per distinct
//! container. A node is registered in the visited table *before* its members
//! are walked, so a member that leads back to it (directly or through a
//! longer cycle) resolves to the node instead of recursing again.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::core::describe;
use crate::core::enumerate::{self, Ancestor};
use crate::core::map::{ObjectMap, ObjectMapping, Properties, Property, PropertyError, PropertyRecord};
use crate::core::types::MapId;
use crate::core::value::{AccessError, ObjectRef, Value};
use crate::mapping::options::MapConfig;

/// Rewrite hook: `Ok(Some(v))` replaces the member on the subject before it is mapped.
pub type Rewrite<'a> = dyn FnMut(&Value, &str) -> Result<Option<Value>, AccessError> + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
    //every null is the same value
    Null,
    Object(usize),
}

impl Identity {
    fn of(value: &Value) -> Option<Identity> {
        match value {
            Value::Null => Some(Identity::Null),
            Value::Object(obj) => Some(Identity::Object(obj.identity())),
            _ => None,
        }
    }
}

/// Per-call traversal state. Never shared between calls.
pub struct TraversalContext {
    //holding the subject keeps its allocation alive, so an identity cannot be reused mid-walk
    visited: HashMap<Identity, (Value, MapId)>,
    nodes: Vec<ObjectMap>,
    next_id: MapId,
}

impl TraversalContext {
    pub fn new() -> Self {
        TraversalContext {
            visited: HashMap::new(),
            nodes: Vec::new(),
            next_id: 0,
        }
    }

    fn lookup(&self, identity: Option<Identity>) -> Option<MapId> {
        identity.and_then(|i| self.visited.get(&i).map(|(_, id)| *id))
    }

    fn register(&mut self, subject: &Value, identity: Option<Identity>, level: u32) -> MapId {
        let id = self.next_id;
        self.next_id += 1;

        self.nodes.push(ObjectMap {
            id,
            level,
            type_tag: subject.type_tag(),
            properties: Properties::new(),
        });
        if let Some(identity) = identity {
            self.visited.insert(identity, (subject.clone(), id));
        }
        trace!(id, level, type_tag = %subject.type_tag(), "registered object map");
        id
    }

    pub fn finish(self) -> ObjectMapping {
        ObjectMapping::from_nodes(self.nodes)
    }
}

impl Default for TraversalContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Engine<'c, 'f> {
    config: &'c MapConfig,
    //None walks ObjectRef::prototype
    ancestor: Option<&'c Ancestor<'c>>,
    callback: Option<&'f mut Rewrite<'f>>,
    context: TraversalContext,
}

impl<'c, 'f> Engine<'c, 'f> {
    pub fn new(config: &'c MapConfig, callback: Option<&'f mut Rewrite<'f>>) -> Self {
        Engine { config, ancestor: None, callback, context: TraversalContext::new() }
    }

    /// Use `step` instead of the prototype link when enumerating the inheritance chain.
    pub fn ancestry(mut self, step: &'c Ancestor<'c>) -> Self {
        self.ancestor = Some(step);
        self
    }

    pub fn run(mut self, subject: &Value) -> ObjectMapping {
        self.map_value(subject, 0);
        self.context.finish()
    }

    /// Map one container and return the id of its node, new or previously built.
    fn map_value(&mut self, subject: &Value, level: u32) -> MapId {
        let identity = Identity::of(subject);
        if let Some(id) = self.context.lookup(identity) {
            trace!(id, level, "reusing object map for revisited value");
            return id;
        }

        let id = self.context.register(subject, identity, level);
        let filter = self.config.property_filter.as_ref();
        let names = match self.ancestor {
            Some(step) => enumerate::enumerate_with(subject, self.config.key_inspector, filter, step),
            None => enumerate::enumerate(subject, self.config.key_inspector, filter),
        };

        let mut properties = Properties::new();
        for name in names {
            match self.map_member(subject, &name, level) {
                Ok(Some(property)) => properties.push(name, property),
                Ok(None) => {}
                Err(err) => {
                    debug!(key = %name, level, error = %err, "member inaccessible");
                    if !self.config.ignore_inaccessible {
                        let record = PropertyRecord::failed(level, &name, PropertyError::Inaccessible);
                        properties.push(name, Property::Record(record));
                    }
                }
            }
        }

        self.context.nodes[id as usize].properties = properties;
        id
    }

    /// `Ok(None)` means the member is deliberately left out of the map.
    fn map_member(&mut self, subject: &Value, name: &str, level: u32) -> Result<Option<Property>, AccessError> {
        if let Some(object) = subject.as_object() {
            self.rewrite(object, name)?;
        }

        let reading = describe::read(subject, name)?;
        if !reading.type_tag.is_container() {
            let record = PropertyRecord::leaf(level, name, reading.type_tag, reading.value, reading.descriptor);
            return Ok(Some(Property::Record(record)));
        }

        if self.config.max_depth.is_some_and(|max| max <= level) {
            debug!(key = %name, level, "max depth reached");
            if self.config.ignore_levels_beyond_max_depth {
                return Ok(None);
            }
            let record = PropertyRecord::failed(level + 1, name, PropertyError::MaxDepthReached);
            return Ok(Some(Property::Record(record)));
        }

        let id = self.map_value(&reading.value, level + 1);
        Ok(Some(Property::Map { id }))
    }

    fn rewrite(&mut self, object: &ObjectRef, name: &str) -> Result<(), AccessError> {
        let Some(callback) = self.callback.as_deref_mut() else {
            return Ok(());
        };
        let current = object.get(name)?;
        if let Some(replacement) = callback(&current, name)? {
            describe::write_value(object, name, replacement)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TypeTag;

    fn run(subject: &ObjectRef, config: &MapConfig) -> ObjectMapping {
        Engine::new(config, None).run(&Value::Object(subject.clone()))
    }

    #[test]
    fn self_reference_resolves_to_own_node() {
        let a = ObjectRef::new_object();
        a.define("name", "a");
        a.define("me", a.clone());

        let mapping = run(&a, &MapConfig::default());
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.root().properties.get("me").unwrap().map_id(), Some(0));
        a.clear();
    }

    #[test]
    fn shared_reference_keeps_level_of_first_visit() {
        let shared = ObjectRef::new_object();
        shared.define("v", 1.0);
        let deep = ObjectRef::new_object();
        deep.define("shared", shared.clone());
        let root = ObjectRef::new_object();
        root.define("deep", deep).define("shared", shared);

        let mapping = run(&root, &MapConfig::default());
        let via_deep = mapping.lookup(&["deep", "shared"]).unwrap().map_id().unwrap();
        let direct = mapping.root().properties.get("shared").unwrap().map_id().unwrap();

        assert_eq!(via_deep, direct);
        assert_eq!(mapping.node(direct).unwrap().level, 2);
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn null_members_collapse_to_one_empty_node() {
        let root = ObjectRef::new_object();
        root.define("a", Value::Null).define("b", Value::Null);

        let mapping = run(&root, &MapConfig::default());
        let a = mapping.lookup(&["a"]).unwrap().map_id().unwrap();
        let b = mapping.lookup(&["b"]).unwrap().map_id().unwrap();

        assert_eq!(a, b);
        let node = mapping.node(a).unwrap();
        assert_eq!(node.type_tag, TypeTag::Object);
        assert!(node.properties.is_empty());
    }

    #[test]
    fn inaccessible_member_does_not_abort_the_walk() {
        let root = ObjectRef::new_object();
        root.define("before", 1.0);
        root.define_getter("broken", |_| Err(AccessError::getter("broken", "boom")));
        root.define("after", 2.0);

        let quiet = run(&root, &MapConfig::default());
        assert_eq!(quiet.root().properties.keys().collect::<Vec<_>>(), vec!["before", "after"]);

        let loud = run(&root, &MapConfig { ignore_inaccessible: false, ..MapConfig::default() });
        let broken = loud.lookup(&["broken"]).unwrap().as_record().unwrap();
        assert_eq!(broken, &PropertyRecord::failed(0, "broken", PropertyError::Inaccessible));
        assert_eq!(loud.root().properties.len(), 3);
    }

    #[test]
    fn max_depth_zero_cuts_at_root_members() {
        let inner = ObjectRef::new_object();
        inner.define("x", 1.0);
        let root = ObjectRef::new_object();
        root.define("inner", inner).define("leaf", "kept");

        let mapping = run(&root, &MapConfig { max_depth: Some(0), ..MapConfig::default() });
        let cut = mapping.lookup(&["inner"]).unwrap().as_record().unwrap();
        assert_eq!(cut, &PropertyRecord::failed(1, "inner", PropertyError::MaxDepthReached));
        assert!(mapping.lookup(&["leaf"]).unwrap().as_record().is_some());
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn failing_callback_is_treated_as_inaccessible() {
        let root = ObjectRef::new_object();
        root.define("a", "x").define("b", "y");
        let config = MapConfig { ignore_inaccessible: false, ..MapConfig::default() };

        let mut callback = |_: &Value, key: &str| -> Result<Option<Value>, AccessError> {
            if key == "a" { Err(AccessError::callback(key, "refused")) } else { Ok(None) }
        };
        let callback: &mut Rewrite<'_> = &mut callback;
        let mapping = Engine::new(&config, Some(callback)).run(&Value::Object(root.clone()));

        assert!(mapping.lookup(&["a"]).unwrap().as_record().unwrap().is_error());
        assert_eq!(mapping.lookup(&["b"]).unwrap().as_record().unwrap().value, Some(Value::from("y")));
    }

    #[test]
    fn rejected_write_back_is_inaccessible() {
        let root = ObjectRef::new_object();
        root.define_with("fixed", Value::from(1.0), crate::core::value::Attributes::frozen());
        let config = MapConfig { ignore_inaccessible: false, ..MapConfig::default() };

        let mut callback = |_: &Value, _: &str| -> Result<Option<Value>, AccessError> { Ok(Some(Value::from(2.0))) };
        let callback: &mut Rewrite<'_> = &mut callback;
        let mapping = Engine::new(&config, Some(callback)).run(&Value::Object(root.clone()));

        let record = mapping.lookup(&["fixed"]).unwrap().as_record().unwrap();
        assert_eq!(record.error, Some(PropertyError::Inaccessible));
        assert_eq!(root.get("fixed").unwrap(), Value::from(1.0));
    }
}
