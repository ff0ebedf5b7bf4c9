//! Cycle-safe structural introspection of a value graph.
//!
//! [`map_object`] walks every reachable member of a subject and produces an
//! [`ObjectMapping`]: one [`ObjectMap`] node per distinct container, one
//! [`PropertyRecord`] per leaf. A container reached again (cycle or shared
//! reference) is linked to the node built on its first visit.

pub mod core;
pub mod mapping;

pub use crate::core::map::{ObjectMap, ObjectMapping, Properties, Property, PropertyError, PropertyRecord};
pub use crate::core::enumerate::Ancestor;
pub use crate::core::types::{KeyInspector, MapId, TypeTag};
pub use crate::core::value::{AccessError, Descriptor, ObjectRef, Value, WeakObject};
pub use crate::mapping::mapper::{map_object, map_object_with, ObjectMapper};
pub use crate::mapping::options::{ConfigError, MapConfig, MapObjectOptions, NameMatcher, PropertyFilter};
pub use crate::mapping::render::RenderError;
