//! Element schema nodes, segment schemas and the immutable registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{FintsError, Result};
use crate::protocol::element::Primitive;

/// How a group's members are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupShape {
    /// Positional members, decoded into a record.
    FixedTuple,
    /// One member repeated, decoded into a flat list.
    Repeated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSchema {
    pub shape: GroupShape,
    pub children: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Primitive(Primitive),
    Group(GroupSchema),
}

/// One schema node: a primitive or a nested group with cardinality and
/// version applicability.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: &'static str,
    pub min: usize,
    pub max: usize,
    pub min_version: Option<u16>,
    pub max_version: Option<u16>,
    pub kind: Kind,
}

impl Element {
    /// Optional, single occurrence, every version.
    pub fn new(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            min: 0,
            max: 1,
            min_version: None,
            max_version: None,
            kind,
        }
    }

    pub fn primitive(name: &'static str, p: Primitive) -> Self {
        Self::new(name, Kind::Primitive(p))
    }

    pub fn text(name: &'static str, max_len: usize) -> Self {
        Self::primitive(name, Primitive::Text { max_len: Some(max_len) })
    }

    pub fn alpha(name: &'static str, max_len: usize) -> Self {
        Self::primitive(name, Primitive::AlphaNumeric { max_len: Some(max_len) })
    }

    pub fn ident(name: &'static str) -> Self {
        Self::primitive(name, Primitive::IDENTIFICATION)
    }

    pub fn binary(name: &'static str, max_len: Option<usize>) -> Self {
        Self::primitive(name, Primitive::Binary { max_len })
    }

    pub fn numeric(name: &'static str, max_len: usize) -> Self {
        Self::primitive(name, Primitive::Numeric { max_len: Some(max_len) })
    }

    pub fn digits(name: &'static str, width: usize) -> Self {
        Self::primitive(name, Primitive::Digits { width })
    }

    pub fn float(name: &'static str, max_len: usize) -> Self {
        Self::primitive(name, Primitive::Float { max_len: Some(max_len) })
    }

    pub fn date(name: &'static str) -> Self {
        Self::primitive(name, Primitive::Date)
    }

    pub fn time(name: &'static str) -> Self {
        Self::primitive(name, Primitive::Time)
    }

    pub fn yes_no(name: &'static str) -> Self {
        Self::primitive(name, Primitive::Boolean)
    }

    pub fn group(name: &'static str, children: Vec<Element>) -> Self {
        Self::new(
            name,
            Kind::Group(GroupSchema {
                shape: GroupShape::FixedTuple,
                children,
            }),
        )
    }

    /// A group holding exactly one repeating member.
    pub fn repeated(name: &'static str, child: Element) -> Self {
        Self::new(
            name,
            Kind::Group(GroupSchema {
                shape: GroupShape::Repeated,
                children: vec![child],
            }),
        )
    }

    pub fn occurs(mut self, min: usize, max: usize) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn mandatory(self) -> Self {
        let max = self.max.max(1);
        self.occurs(1, max)
    }

    pub fn since(mut self, version: u16) -> Self {
        self.min_version = Some(version);
        self
    }

    pub fn until(mut self, version: u16) -> Self {
        self.max_version = Some(version);
        self
    }

    /// Whether this element takes part in `version`.
    pub fn applies(&self, version: u16) -> bool {
        self.min_version.map_or(true, |v| version >= v)
            && self.max_version.map_or(true, |v| version <= v)
    }

    /// Tokens one repetition occupies inside a group at `version`.
    pub fn slots(&self, version: u16) -> usize {
        if !self.applies(version) {
            return 0;
        }
        match &self.kind {
            Kind::Primitive(_) => 1,
            Kind::Group(g) => g.children.iter().map(|c| c.slots(version)).sum(),
        }
    }

    pub(crate) fn validate(&self, path: &str) -> Result<()> {
        let path = format!("{path}->{}", self.name);
        if self.min > self.max || self.max == 0 {
            return Err(FintsError::Schema(format!(
                "{path}: invalid count range {}..{}",
                self.min, self.max
            )));
        }
        if let (Some(lo), Some(hi)) = (self.min_version, self.max_version) {
            if lo > hi {
                return Err(FintsError::Schema(format!(
                    "{path}: invalid version range {lo}..{hi}"
                )));
            }
        }
        if let Kind::Group(g) = &self.kind {
            if g.children.is_empty() {
                return Err(FintsError::Schema(format!("{path}: group has no members")));
            }
            if g.shape == GroupShape::Repeated && g.children.len() != 1 {
                return Err(FintsError::Schema(format!(
                    "{path}: a repeated group must have exactly one member"
                )));
            }
            for child in &g.children {
                child.validate(&path)?;
            }
        }
        Ok(())
    }
}

/// The current schema for one segment id.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSchema {
    pub id: &'static str,
    /// Highest version this build understands.
    pub version: u16,
    pub elements: Vec<Element>,
}

impl SegmentSchema {
    pub fn new(id: &'static str, version: u16, elements: Vec<Element>) -> Self {
        Self {
            id,
            version,
            elements,
        }
    }

    pub fn elements_for(&self, version: u16) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(move |e| e.applies(version))
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() || self.version == 0 {
            return Err(FintsError::Schema(format!(
                "segment '{}' needs an id and a version",
                self.id
            )));
        }
        self.elements.iter().try_for_each(|e| e.validate(self.id))
    }
}

/// Immutable segment schema table.
///
/// Built once and shared (`Arc<Registry>`); there is no global instance.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    schemas: HashMap<&'static str, Arc<SegmentSchema>>,
}

impl Registry {
    pub fn new(schemas: impl IntoIterator<Item = SegmentSchema>) -> Result<Self> {
        Self::default().extend(schemas)
    }

    /// A new registry with `schemas` added. Duplicate ids are rejected.
    pub fn extend(&self, schemas: impl IntoIterator<Item = SegmentSchema>) -> Result<Self> {
        let mut table = self.schemas.clone();
        for schema in schemas {
            schema.validate()?;
            if table.contains_key(schema.id) {
                return Err(FintsError::Schema(format!(
                    "segment '{}' registered twice",
                    schema.id
                )));
            }
            table.insert(schema.id, Arc::new(schema));
        }
        Ok(Self { schemas: table })
    }

    pub fn lookup(&self, id: &str) -> Option<&SegmentSchema> {
        self.schemas.get(id).map(Arc::as_ref)
    }

    /// Whether `id`'s schema declares a top-level element `name`.
    pub fn has_element(&self, id: &str, name: &str) -> bool {
        self.lookup(id)
            .is_some_and(|s| s.elements.iter().any(|e| e.name == name))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn version_window_controls_slots() {
        let e = Element::numeric("n", 3).since(2).until(5);
        assert!(!e.applies(1));
        assert!(e.applies(2) && e.applies(5));
        assert_eq!(e.slots(6), 0);

        let g = Element::group(
            "g",
            vec![
                Element::numeric("a", 1),
                Element::numeric("b", 1).since(3),
                Element::group("c", vec![Element::numeric("x", 1), Element::numeric("y", 1)]),
            ],
        );
        assert_eq!(g.slots(2), 3);
        assert_eq!(g.slots(3), 4);
    }

    #[test]
    fn rejects_inconsistent_schemas() {
        let bad_count = SegmentSchema::new("XX", 1, vec![Element::numeric("n", 1).occurs(2, 1)]);
        assert_eq!(Registry::new([bad_count]).unwrap_err().class().as_str(), "SCHEMA");

        let bad_version =
            SegmentSchema::new("XX", 1, vec![Element::numeric("n", 1).since(4).until(2)]);
        assert!(Registry::new([bad_version]).is_err());

        let mut repeated = Element::repeated("r", Element::numeric("n", 1).occurs(1, 9));
        if let Kind::Group(g) = &mut repeated.kind {
            g.children.push(Element::numeric("m", 1));
        }
        assert!(Registry::new([SegmentSchema::new("XX", 1, vec![repeated])]).is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let a = SegmentSchema::new("XX", 1, vec![Element::numeric("n", 1)]);
        let reg = Registry::new([a.clone()]).unwrap();
        assert!(reg.extend([a]).is_err());
        assert!(reg.has_element("XX", "n"));
        assert!(!reg.has_element("XX", "m"));
        assert!(!reg.has_element("YY", "n"));
    }
}
