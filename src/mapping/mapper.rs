// mapObject entry points: merge options, fresh context, walk from level 0
use tracing::debug;

use crate::core::engine::{Engine, Rewrite};
use crate::core::enumerate::Ancestor;
use crate::core::map::ObjectMapping;
use crate::core::value::{AccessError, Value};
use crate::mapping::options::{MapConfig, MapObjectOptions};

/// Map `subject` without a rewrite callback. Never fails: members that cannot
/// be read are degraded per the options.
pub fn map_object(subject: impl Into<Value>, options: &MapObjectOptions) -> ObjectMapping {
    ObjectMapper::new(options).map(subject)
}

/// Map `subject`, offering every member to `callback` first.
///
/// `callback` receives the member's current value and name. Returning
/// `Ok(Some(v))` writes `v` back onto the subject in place before the member is
/// mapped, so the change outlives the call and is seen by the rest of the walk.
/// `Ok(None)` leaves the member alone; `Err` makes the member INACCESSIBLE.
pub fn map_object_with<F>(subject: impl Into<Value>, options: &MapObjectOptions, callback: F) -> ObjectMapping
where
    F: FnMut(&Value, &str) -> Result<Option<Value>, AccessError>,
{
    ObjectMapper::new(options).map_with(subject, callback)
}

/// Resolved options plus the embedder's hooks, reusable across calls.
/// Each call still gets its own traversal context.
pub struct ObjectMapper<'a> {
    config: MapConfig,
    ancestor: Option<&'a Ancestor<'a>>,
}

impl<'a> ObjectMapper<'a> {
    pub fn new(options: &MapObjectOptions) -> Self {
        ObjectMapper { config: options.resolve(), ancestor: None }
    }

    /// Walk the inheritance chain with `step` instead of the prototype link.
    pub fn ancestry(mut self, step: &'a Ancestor<'a>) -> Self {
        self.ancestor = Some(step);
        self
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn map(&self, subject: impl Into<Value>) -> ObjectMapping {
        self.run(subject.into(), None)
    }

    pub fn map_with<F>(&self, subject: impl Into<Value>, mut callback: F) -> ObjectMapping
    where
        F: FnMut(&Value, &str) -> Result<Option<Value>, AccessError>,
    {
        let callback: &mut Rewrite<'_> = &mut callback;
        self.run(subject.into(), Some(callback))
    }

    fn run<'f>(&self, subject: Value, callback: Option<&'f mut Rewrite<'f>>) -> ObjectMapping {
        debug!(
            type_tag = %subject.type_tag(),
            key_inspector = ?self.config.key_inspector,
            max_depth = ?self.config.max_depth,
            custom_ancestry = self.ancestor.is_some(),
            "mapping object"
        );

        let mut engine = Engine::new(&self.config, callback);
        if let Some(step) = self.ancestor {
            engine = engine.ancestry(step);
        }
        let mapping = engine.run(&subject);

        debug!(nodes = mapping.len(), "object mapped");
        mapping
    }
}
