// member enumeration + include/exclude filtering
use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::core::types::KeyInspector;
use crate::core::value::{ObjectRef, Value};

/// Steps from a container to the next link of its inheritance chain.
pub type Ancestor<'a> = dyn Fn(&ObjectRef) -> Option<ObjectRef> + 'a;

/// Either a literal set of member names or a pattern searched within each name.
#[derive(Debug, Clone)]
pub enum NameMatcher {
    Names(Vec<String>),
    Pattern(Regex),
}

impl NameMatcher {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NameMatcher::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(NameMatcher::Pattern(Regex::new(pattern)?))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Names(names) => names.iter().any(|n| n == name),
            NameMatcher::Pattern(re) => re.is_match(name),
        }
    }
}

impl PartialEq for NameMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NameMatcher::Names(a), NameMatcher::Names(b)) => a == b,
            (NameMatcher::Pattern(a), NameMatcher::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

//a list is a name set, a bare string is a pattern
impl<'de> Deserialize<'de> for NameMatcher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Names(Vec<String>),
            Pattern(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Names(names) => Ok(NameMatcher::Names(names)),
            Raw::Pattern(p) => NameMatcher::pattern(&p).map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PropertyFilter {
    #[serde(default)]
    pub include: Option<NameMatcher>,
    #[serde(default)]
    pub exclude: Option<NameMatcher>,
}

impl PropertyFilter {
    pub fn include(matcher: NameMatcher) -> Self {
        PropertyFilter { include: Some(matcher), exclude: None }
    }

    pub fn exclude(matcher: NameMatcher) -> Self {
        PropertyFilter { include: None, exclude: Some(matcher) }
    }

    /// `exclude` wins outright: when present, `include` is not consulted at all.
    pub fn apply(&self, names: Vec<String>) -> Vec<String> {
        if let Some(exclude) = &self.exclude {
            return names.into_iter().filter(|n| !exclude.matches(n)).collect();
        }
        if let Some(include) = &self.include {
            return names.into_iter().filter(|n| include.matches(n)).collect();
        }
        names
    }
}

/// Member names of `value` to visit, in order and without duplicates.
pub fn enumerate(value: &Value, inspector: KeyInspector, filter: Option<&PropertyFilter>) -> Vec<String> {
    enumerate_with(value, inspector, filter, ObjectRef::prototype)
}

/// Same as [`enumerate`] with the ancestor step supplied by the caller.
pub fn enumerate_with<F>(
    value: &Value,
    inspector: KeyInspector,
    filter: Option<&PropertyFilter>,
    ancestor: F,
) -> Vec<String>
where
    F: Fn(&ObjectRef) -> Option<ObjectRef>,
{
    let names = match value.as_object() {
        None => Vec::new(),
        Some(obj) => match inspector {
            KeyInspector::Simple => obj.own_keys(),
            KeyInspector::PrototypeChain => chain_names(obj, ancestor),
        },
    };

    match filter {
        Some(filter) => filter.apply(names),
        None => names,
    }
}

fn chain_names<F>(start: &ObjectRef, ancestor: F) -> Vec<String>
where
    F: Fn(&ObjectRef) -> Option<ObjectRef>,
{
    let mut names = Vec::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    //a malformed chain that loops back on itself ends the walk
    let mut seen_links: HashSet<usize> = HashSet::new();

    let mut current = Some(start.clone());
    while let Some(obj) = current {
        if !seen_links.insert(obj.identity()) {
            break;
        }
        for name in obj.own_keys() {
            if seen_names.insert(name.clone()) {
                names.push(name);
            }
        }
        current = ancestor(&obj);
    }
    names
}
