//! Host value model.
//!
//! Containers are shared through [`ObjectRef`] so the same allocation can be
//! reachable from several members (including itself). Identity is the
//! allocation, never structural equality.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::core::types::TypeTag;

/// Reading or writing a member faulted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("getter for `{key}` failed: {reason}")]
    Getter { key: String, reason: String },

    #[error("cannot assign to read only property `{key}`")]
    ReadOnly { key: String },

    #[error("cannot set property `{key}` which has only a getter")]
    NoSetter { key: String },

    #[error("setter for `{key}` failed: {reason}")]
    Setter { key: String, reason: String },

    #[error("rewrite callback failed for `{key}`: {reason}")]
    Callback { key: String, reason: String },
}

impl AccessError {
    pub fn getter(key: impl Into<String>, reason: impl Into<String>) -> Self {
        AccessError::Getter { key: key.into(), reason: reason.into() }
    }

    pub fn callback(key: impl Into<String>, reason: impl Into<String>) -> Self {
        AccessError::Callback { key: key.into(), reason: reason.into() }
    }
}

pub type Getter = Rc<dyn Fn(&ObjectRef) -> Result<Value, AccessError>>;
pub type Setter = Rc<dyn Fn(&ObjectRef, Value) -> Result<(), AccessError>>;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    BigInt(i128),
    String(String),
    Symbol(String),
    Object(ObjectRef),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Undefined => TypeTag::Undefined,
            Value::Null => TypeTag::Object,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Number(_) => TypeTag::Number,
            Value::BigInt(_) => TypeTag::BigInt,
            Value::String(_) => TypeTag::String,
            Value::Symbol(_) => TypeTag::Symbol,
            Value::Object(obj) if obj.is_function() => TypeTag::Function,
            Value::Object(_) => TypeTag::Object,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Descriptor of member `name` owned by this value itself.
    ///
    /// Primitive strings own `length` and one entry per UTF-16 code unit index;
    /// no other primitive owns anything.
    pub fn own_descriptor(&self, name: &str) -> Option<Descriptor> {
        match self {
            Value::Object(obj) => obj.own_descriptor(name),
            Value::String(s) => {
                let units: Vec<u16> = s.encode_utf16().collect();
                if name == "length" {
                    return Some(Descriptor::Data {
                        value: Value::Number(units.len() as f64),
                        attributes: Attributes::frozen(),
                    });
                }
                let index: usize = name.parse().ok()?;
                if index.to_string() != name {
                    return None;
                }
                //a lone surrogate half has no UTF-8 form and renders as U+FFFD
                units.get(index).map(|unit| Descriptor::Data {
                    value: Value::String(String::from_utf16_lossy(&[*unit])),
                    attributes: Attributes { writable: false, enumerable: true, configurable: false },
                })
            }
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

//containers are never recorded as leaf values, so they render as a placeholder
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::BigInt(n) => serializer.serialize_str(&format!("{n}n")),
            Value::String(s) => serializer.serialize_str(s),
            Value::Symbol(desc) => serializer.serialize_str(&format!("Symbol({desc})")),
            Value::Object(obj) => serializer.serialize_str(&obj.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Attributes {
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Attributes {
    pub const fn data() -> Self {
        Attributes { writable: true, enumerable: true, configurable: true }
    }

    pub const fn hidden() -> Self {
        Attributes { writable: true, enumerable: false, configurable: true }
    }

    pub const fn frozen() -> Self {
        Attributes { writable: false, enumerable: false, configurable: false }
    }
}

/// Accessor metadata of one member.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Descriptor {
    Data {
        value: Value,
        #[serde(flatten)]
        attributes: Attributes,
    },
    #[serde(rename_all = "camelCase")]
    Accessor {
        has_getter: bool,
        has_setter: bool,
        enumerable: bool,
        configurable: bool,
    },
}

#[derive(Clone)]
pub enum Slot {
    Data { value: Value, attributes: Attributes },
    /// Data member holding a non-owning reference; reads as `undefined` once the target is gone.
    Link { target: WeakObject, attributes: Attributes },
    Accessor { get: Option<Getter>, set: Option<Setter>, enumerable: bool, configurable: bool },
}

impl Slot {
    fn descriptor(&self) -> Descriptor {
        match self {
            Slot::Data { value, attributes } => Descriptor::Data { value: value.clone(), attributes: *attributes },
            Slot::Link { target, attributes } => Descriptor::Data { value: target.value(), attributes: *attributes },
            Slot::Accessor { get, set, enumerable, configurable } => Descriptor::Accessor {
                has_getter: get.is_some(),
                has_setter: set.is_some(),
                enumerable: *enumerable,
                configurable: *configurable,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Plain,
    Function,
}

struct ObjectData {
    kind: ObjectKind,
    label: String,
    members: Vec<(String, Slot)>,
    prototype: Option<ObjectRef>,
}

impl ObjectData {
    fn slot(&self, name: &str) -> Option<&Slot> {
        self.members.iter().find(|(k, _)| k == name).map(|(_, s)| s)
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Slot> {
        self.members.iter_mut().find(|(k, _)| k == name).map(|(_, s)| s)
    }
}

/// Shared handle to a container. Clones alias the same allocation.
///
/// Handles own their targets: a cycle built out of `define`/`put` keeps every
/// object in it alive until one of them is [`cleared`](ObjectRef::clear).
/// Back-references that should not own use [`ObjectRef::define_link`].
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<ObjectData>>);

/// Non-owning handle, see [`Slot::Link`].
#[derive(Clone)]
pub struct WeakObject(Weak<RefCell<ObjectData>>);

impl WeakObject {
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }

    fn value(&self) -> Value {
        self.upgrade().map_or(Value::Undefined, Value::Object)
    }
}

impl ObjectRef {
    fn alloc(kind: ObjectKind, label: impl Into<String>, prototype: Option<ObjectRef>) -> Self {
        ObjectRef(Rc::new(RefCell::new(ObjectData {
            kind,
            label: label.into(),
            members: Vec::new(),
            prototype,
        })))
    }

    pub fn new_object() -> Self {
        Self::alloc(ObjectKind::Plain, "Object", None)
    }

    pub fn with_prototype(prototype: &ObjectRef) -> Self {
        Self::alloc(ObjectKind::Plain, "Object", Some(prototype.clone()))
    }

    /// A function object owning `length`, `name` and a `prototype` object whose
    /// hidden `constructor` points back at the function.
    pub fn new_function(name: &str, length: u32) -> Self {
        let func = Self::alloc(ObjectKind::Function, name, None);
        func.define_with("length", Value::Number(f64::from(length)), Attributes {
            writable: false,
            enumerable: false,
            configurable: true,
        });
        func.define_with("name", Value::from(name), Attributes {
            writable: false,
            enumerable: false,
            configurable: true,
        });
        let proto = Self::new_object();
        proto.define_link("constructor", &func, Attributes::hidden());
        func.define_with("prototype", Value::Object(proto), Attributes {
            writable: true,
            enumerable: false,
            configurable: false,
        });
        func
    }

    pub fn kind(&self) -> ObjectKind {
        self.0.borrow().kind
    }

    pub fn is_function(&self) -> bool {
        self.kind() == ObjectKind::Function
    }

    /// Stable for as long as this allocation is alive.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    /// Drop every member and the prototype link, releasing whatever they owned.
    pub fn clear(&self) {
        let mut data = self.0.borrow_mut();
        data.members.clear();
        data.prototype = None;
    }

    pub fn prototype(&self) -> Option<ObjectRef> {
        self.0.borrow().prototype.clone()
    }

    pub fn set_prototype(&self, prototype: Option<ObjectRef>) {
        self.0.borrow_mut().prototype = prototype;
    }

    /// Define (or redefine) an enumerable, writable data member.
    pub fn define(&self, name: &str, value: impl Into<Value>) -> &Self {
        self.define_with(name, value.into(), Attributes::data());
        self
    }

    pub fn define_with(&self, name: &str, value: Value, attributes: Attributes) {
        self.define_slot(name, Slot::Data { value, attributes });
    }

    pub fn define_link(&self, name: &str, target: &ObjectRef, attributes: Attributes) {
        self.define_slot(name, Slot::Link { target: target.downgrade(), attributes });
    }

    pub fn define_getter<F>(&self, name: &str, get: F)
    where
        F: Fn(&ObjectRef) -> Result<Value, AccessError> + 'static,
    {
        self.define_slot(name, Slot::Accessor {
            get: Some(Rc::new(get)),
            set: None,
            enumerable: true,
            configurable: true,
        });
    }

    pub fn define_slot(&self, name: &str, slot: Slot) {
        let mut data = self.0.borrow_mut();
        match data.slot_mut(name) {
            Some(existing) => *existing = slot,
            None => data.members.push((name.to_string(), slot)),
        }
    }

    pub fn own_keys(&self) -> Vec<String> {
        self.0.borrow().members.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.borrow().slot(name).is_some()
    }

    pub fn own_descriptor(&self, name: &str) -> Option<Descriptor> {
        self.0.borrow().slot(name).map(Slot::descriptor)
    }

    fn find_slot(&self, name: &str) -> Option<Slot> {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            let data = obj.0.borrow();
            if let Some(slot) = data.slot(name) {
                return Some(slot.clone());
            }
            current = data.prototype.clone();
        }
        None
    }

    /// Read `name` through the prototype chain. Getters run with `self` as receiver.
    pub fn get(&self, name: &str) -> Result<Value, AccessError> {
        match self.find_slot(name) {
            None => Ok(Value::Undefined),
            Some(Slot::Data { value, .. }) => Ok(value),
            Some(Slot::Link { target, .. }) => Ok(target.value()),
            Some(Slot::Accessor { get: Some(get), .. }) => get(self),
            Some(Slot::Accessor { get: None, .. }) => Ok(Value::Undefined),
        }
    }

    /// Strict-mode assignment: read only members and setter-less accessors reject the write.
    pub fn put(&self, name: &str, value: Value) -> Result<(), AccessError> {
        match self.find_slot(name) {
            Some(Slot::Data { attributes, .. } | Slot::Link { attributes, .. }) if !attributes.writable => {
                Err(AccessError::ReadOnly { key: name.to_string() })
            }
            Some(Slot::Accessor { set: Some(set), .. }) => set(self, value),
            Some(Slot::Accessor { set: None, .. }) => Err(AccessError::NoSetter { key: name.to_string() }),
            _ => {
                let mut data = self.0.borrow_mut();
                match data.slot_mut(name) {
                    Some(Slot::Data { value: current, .. }) => *current = value,
                    Some(slot) => {
                        if let Slot::Link { attributes, .. } = slot {
                            let attributes = *attributes;
                            *slot = Slot::Data { value, attributes };
                        }
                    }
                    None => data.members.push((name.to_string(), Slot::Data { value, attributes: Attributes::data() })),
                }
                Ok(())
            }
        }
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:#x} {})", self.identity(), self)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        match data.kind {
            ObjectKind::Plain => write!(f, "[object {}]", data.label),
            ObjectKind::Function => write!(f, "[function {}]", data.label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_walks_prototype_chain_nearest_first() {
        let base = ObjectRef::new_object();
        base.define("greet", "base").define("shared", "base");
        let child = ObjectRef::with_prototype(&base);
        child.define("shared", "child");

        assert_eq!(child.get("greet").unwrap(), Value::from("base"));
        assert_eq!(child.get("shared").unwrap(), Value::from("child"));
        assert_eq!(child.get("missing").unwrap(), Value::Undefined);
        assert_eq!(child.own_keys(), vec!["shared".to_string()]);
    }

    #[test]
    fn put_rejects_read_only_and_getter_only_members() {
        let obj = ObjectRef::new_object();
        obj.define_with("fixed", Value::from(1.0), Attributes::frozen());
        obj.define_getter("computed", |_| Ok(Value::from(2.0)));

        assert_eq!(obj.put("fixed", Value::from(3.0)).unwrap_err(), AccessError::ReadOnly { key: "fixed".into() });
        assert!(matches!(obj.put("computed", Value::Null), Err(AccessError::NoSetter { .. })));

        obj.put("fresh", Value::from(true)).unwrap();
        assert_eq!(obj.get("fresh").unwrap(), Value::Boolean(true));
    }

    #[test]
    fn put_on_inherited_member_creates_own_member() {
        let base = ObjectRef::new_object();
        base.define("x", 1.0);
        let child = ObjectRef::with_prototype(&base);

        child.put("x", Value::from(2.0)).unwrap();

        assert!(child.has_own("x"));
        assert_eq!(base.get("x").unwrap(), Value::from(1.0));
        assert_eq!(child.get("x").unwrap(), Value::from(2.0));
    }

    #[test]
    fn getter_receives_original_receiver() {
        let base = ObjectRef::new_object();
        base.define_getter("who", |this| this.get("name"));
        let child = ObjectRef::with_prototype(&base);
        child.define("name", "child");

        assert_eq!(child.get("who").unwrap(), Value::from("child"));
    }

    #[test]
    fn function_prototype_points_back_at_function() {
        let func = ObjectRef::new_function("Emitter", 1);
        assert_eq!(Value::Object(func.clone()).type_tag(), TypeTag::Function);
        assert_eq!(func.own_keys(), vec!["length", "name", "prototype"]);

        let proto = func.get("prototype").unwrap();
        let ctor = proto.as_object().unwrap().get("constructor").unwrap();
        assert_eq!(ctor, Value::Object(func));
    }

    #[test]
    fn dropped_function_is_freed_with_its_prototype() {
        let func = ObjectRef::new_function("f", 0);
        let proto = func.get("prototype").unwrap().as_object().unwrap().downgrade();
        let weak = Rc::downgrade(&func.0);

        drop(func);

        assert!(weak.upgrade().is_none());
        assert!(proto.upgrade().is_none());
    }

    #[test]
    fn link_reads_undefined_after_target_is_gone() {
        let holder = ObjectRef::new_object();
        let target = ObjectRef::new_object();
        holder.define_link("back", &target, Attributes::hidden());
        assert_eq!(holder.get("back").unwrap(), Value::Object(target.clone()));

        drop(target);
        assert_eq!(holder.get("back").unwrap(), Value::Undefined);
    }

    #[test]
    fn writing_a_link_turns_it_into_owned_data() {
        let func = ObjectRef::new_function("f", 0);
        let proto = func.get("prototype").unwrap();
        let proto = proto.as_object().unwrap();

        proto.put("constructor", Value::from("replaced")).unwrap();

        assert_eq!(proto.own_keys(), vec!["constructor"]);
        assert!(matches!(
            proto.own_descriptor("constructor"),
            Some(Descriptor::Data { value: Value::String(s), attributes }) if s == "replaced" && !attributes.enumerable
        ));
    }

    #[test]
    fn clear_releases_a_caller_built_cycle() {
        let a = ObjectRef::new_object();
        let b = ObjectRef::new_object();
        a.define("next", b.clone());
        b.define("next", a.clone());
        let weak_a = Rc::downgrade(&a.0);
        let weak_b = Rc::downgrade(&b.0);

        a.clear();
        assert!(a.own_keys().is_empty());
        drop(a);
        drop(b);

        assert!(weak_a.upgrade().is_none());
        assert!(weak_b.upgrade().is_none());
    }

    #[test]
    fn typeof_null_is_object() {
        assert_eq!(Value::Null.type_tag(), TypeTag::Object);
        assert_eq!(Value::Undefined.type_tag(), TypeTag::Undefined);
        assert_eq!(Value::Symbol("id".into()).type_tag(), TypeTag::Symbol);
    }

    #[test]
    fn string_primitive_owns_length_and_indices_only() {
        let s = Value::from("héllo");
        assert!(matches!(s.own_descriptor("length"), Some(Descriptor::Data { value: Value::Number(n), .. }) if n == 5.0));
        assert!(matches!(s.own_descriptor("1"), Some(Descriptor::Data { value: Value::String(c), .. }) if c == "é"));
        assert_eq!(s.own_descriptor("01"), None);
        assert_eq!(s.own_descriptor("hola"), None);
        assert_eq!(Value::from(4.0).own_descriptor("length"), None);
    }

    #[test]
    fn string_length_counts_utf16_code_units() {
        let s = Value::from("a😀");
        assert!(matches!(s.own_descriptor("length"), Some(Descriptor::Data { value: Value::Number(n), .. }) if n == 3.0));
        assert!(matches!(s.own_descriptor("0"), Some(Descriptor::Data { value: Value::String(c), .. }) if c == "a"));
        assert!(s.own_descriptor("2").is_some());
        assert_eq!(s.own_descriptor("3"), None);
    }
}
