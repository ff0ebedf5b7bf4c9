// ids and closed tags shared by the value model and the mapper
use std::fmt;

use serde::{Deserialize, Serialize};

//index of an ObjectMap inside its ObjectMapping, assigned in first-visit order
pub type MapId = u32;

/// Runtime type tag of a value, as `typeof` would report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Undefined,
    Object,
    Boolean,
    Number,
    BigInt,
    String,
    Symbol,
    Function,
}

impl TypeTag {
    /// Containers are expanded recursively, everything else is recorded as a leaf.
    pub fn is_container(self) -> bool {
        matches!(self, TypeTag::Object | TypeTag::Function)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Undefined => "undefined",
            TypeTag::Object => "object",
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::BigInt => "bigint",
            TypeTag::String => "string",
            TypeTag::Symbol => "symbol",
            TypeTag::Function => "function",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which member names of a container get visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyInspector {
    /// Own members only, in insertion order.
    #[default]
    Simple,
    /// Own members of the value and of every ancestor, nearest first.
    PrototypeChain,
}
