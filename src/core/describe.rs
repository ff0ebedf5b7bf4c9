// member descriptor reader
use crate::core::types::TypeTag;
use crate::core::value::{AccessError, Descriptor, ObjectRef, Value};

/// What reading one member produced.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberReading {
    pub value: Value,
    pub type_tag: TypeTag,
    /// Only looked up for leaves.
    pub descriptor: Option<Descriptor>,
}

/// Read member `name` of `subject`. A failing getter surfaces as `AccessError`;
/// a missing descriptor is simply `None`.
pub fn read(subject: &Value, name: &str) -> Result<MemberReading, AccessError> {
    let value = read_value(subject, name)?;
    let type_tag = value.type_tag();
    //the descriptor is looked up on the member's own value, not on the subject
    let descriptor = if type_tag.is_container() { None } else { value.own_descriptor(name) };

    Ok(MemberReading { value, type_tag, descriptor })
}

pub fn read_value(subject: &Value, name: &str) -> Result<Value, AccessError> {
    match subject.as_object() {
        Some(obj) => obj.get(name),
        None => Ok(Value::Undefined),
    }
}

/// Overwrite member `name` in place.
pub fn write_value(subject: &ObjectRef, name: &str, value: Value) -> Result<(), AccessError> {
    subject.put(name, value)
}
