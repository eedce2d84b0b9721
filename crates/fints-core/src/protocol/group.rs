//! Element group composer: schema-driven encode/decode of delimited fields.
//!
//! Depth counts the nesting of the current element list: the segment body is
//! depth 1, a group directly inside it is depth 2. Trailing empty fields are
//! trimmed only below depth 3; deeper groups keep their placeholders so
//! positions inside the tuple survive.

use crate::error::{FintsError, Result, Violation};
use crate::protocol::element::{Fields, Value};
use crate::protocol::schema::{Element, GroupSchema, GroupShape, Kind};
use crate::protocol::syntax::{self, ELEMENT_SEPARATOR, GROUP_SEPARATOR};

/// Depth of a segment body.
pub const SEGMENT_DEPTH: usize = 1;
const TRIM_BELOW: usize = 3;

fn separator(depth: usize) -> u8 {
    if depth <= SEGMENT_DEPTH {
        ELEMENT_SEPARATOR
    } else {
        GROUP_SEPARATOR
    }
}

/// Decode `raw` against `elements` at `version`.
pub fn decode_elements(
    raw: &[u8],
    elements: &[Element],
    depth: usize,
    version: u16,
    context: &str,
) -> Result<Fields> {
    let sep = separator(depth);
    let tokens = syntax::split_ranges(raw, sep)?;
    let mut fields = Fields::new();
    let mut next = 0;
    let mut idx = 0;
    let mut count = 0;

    while idx < elements.len() {
        let element = &elements[idx];
        if !element.applies(version) {
            idx += 1;
            count = 0;
            continue;
        }

        let width = if sep == GROUP_SEPARATOR {
            element.slots(version)
        } else {
            1
        };
        let last = (next + width).min(tokens.len()).saturating_sub(1);
        let text: &[u8] = match (tokens.get(next), tokens.get(last)) {
            (Some(first), Some(last)) if width > 0 => {
                raw.get(first.start..last.end).unwrap_or_default()
            }
            _ => &[],
        };
        next += width;

        let value = if text.is_empty() {
            if count < element.min {
                return Err(FintsError::MissingMandatory {
                    element: element.name.to_string(),
                    context: context.to_string(),
                });
            }
            None
        } else {
            decode_value(text, element, depth, version)?
        };

        if let Some(value) = value {
            if element.max > 1 {
                push_repetition(&mut fields, element.name, value);
            } else {
                fields.set(element.name, value);
            }
        }

        count += 1;

        if next >= tokens.len() {
            if let Some(missing) = elements[idx + 1..]
                .iter()
                .find(|e| e.applies(version) && e.min > 0)
            {
                return Err(FintsError::MissingMandatory {
                    element: missing.name.to_string(),
                    context: context.to_string(),
                });
            }
            break;
        }

        if count >= element.max {
            idx += 1;
            count = 0;
        }
    }

    Ok(fields)
}

fn push_repetition(fields: &mut Fields, name: &'static str, value: Value) {
    let items = match fields.remove(name) {
        Some(Value::List(mut items)) => {
            items.push(value);
            items
        }
        Some(other) => vec![other, value],
        None => vec![value],
    };
    fields.set(name, Value::List(items));
}

fn decode_value(raw: &[u8], element: &Element, depth: usize, version: u16) -> Result<Option<Value>> {
    match &element.kind {
        Kind::Primitive(p) => p.decode(raw, element.name).map(Some),
        Kind::Group(group) => decode_group(raw, element.name, group, depth + 1, version),
    }
}

/// Decode one group occurrence. All-separator text is an absent group.
pub fn decode_group(
    raw: &[u8],
    name: &str,
    group: &GroupSchema,
    depth: usize,
    version: u16,
) -> Result<Option<Value>> {
    if raw.iter().all(|&b| b == GROUP_SEPARATOR) {
        return Ok(None);
    }
    let fields = decode_elements(raw, &group.children, depth, version, name)?;
    Ok(Some(match group.shape {
        GroupShape::FixedTuple => Value::Group(fields),
        GroupShape::Repeated => {
            let items = group
                .children
                .first()
                .and_then(|child| fields.get(child.name))
                .map(|v| v.as_list().to_vec())
                .unwrap_or_default();
            Value::List(items)
        }
    }))
}

/// Encode `fields` against `elements` at `version`.
pub fn encode_elements(
    fields: Option<&Fields>,
    elements: &[Element],
    depth: usize,
    version: u16,
) -> Result<Vec<u8>> {
    let sep = separator(depth);
    let fields = match fields {
        Some(f) if !f.is_empty() => f,
        _ => return Ok(placeholder(elements, sep, depth, version)),
    };

    let mut parts: Vec<Vec<u8>> = Vec::new();
    for element in elements.iter().filter(|e| e.applies(version)) {
        let value = fields.get(element.name);
        let part = if element.max > 1 {
            match value {
                Some(v) => join(
                    v.as_list()
                        .iter()
                        .map(|item| encode_value(Some(item), element, depth, version))
                        .collect::<Result<Vec<_>>>()?,
                    sep,
                ),
                None => Vec::new(),
            }
        } else {
            encode_value(value, element, depth, version)?
        };
        parts.push(part);
    }

    if depth < TRIM_BELOW {
        let keep = parts
            .iter()
            .rposition(|p| !p.iter().all(|&b| b == GROUP_SEPARATOR))
            .map_or(0, |i| i + 1);
        parts.truncate(keep);
    }

    Ok(join(parts, sep))
}

fn placeholder(elements: &[Element], sep: u8, depth: usize, version: u16) -> Vec<u8> {
    if depth < TRIM_BELOW {
        return Vec::new();
    }
    let slots: usize = elements.iter().map(|e| e.slots(version)).sum();
    vec![sep; slots.saturating_sub(1)]
}

fn encode_value(value: Option<&Value>, element: &Element, depth: usize, version: u16) -> Result<Vec<u8>> {
    match &element.kind {
        Kind::Primitive(p) => match value {
            Some(v) => p.encode(v, element.name),
            None => Ok(Vec::new()),
        },
        Kind::Group(group) => encode_group(value, group, depth + 1, version),
    }
}

/// Encode one group occurrence at `depth`.
pub fn encode_group(value: Option<&Value>, group: &GroupSchema, depth: usize, version: u16) -> Result<Vec<u8>> {
    match (group.shape, value) {
        (GroupShape::Repeated, Some(v)) => {
            let mut fields = Fields::new();
            if let Some(child) = group.children.first() {
                fields.set(child.name, Value::List(v.as_list().to_vec()));
            }
            encode_elements(Some(&fields), &group.children, depth, version)
        }
        (_, Some(Value::Group(fields))) => encode_elements(Some(fields), &group.children, depth, version),
        (GroupShape::FixedTuple, Some(_)) => Err(FintsError::encode(
            "group",
            Violation::WrongKind { expected: "group" },
        )),
        (_, None) => encode_elements(None, &group.children, depth, version),
    }
}

fn join(parts: Vec<Vec<u8>>, sep: u8) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            out.push(sep);
        }
        out.extend(part);
    }
    out
}

/// Diagnostic rendering of one element value (`name: value`, groups as `[..]`).
pub(crate) fn render(element: &Element, value: Option<&Value>, version: u16) -> String {
    match (&element.kind, value) {
        (Kind::Group(group), Some(v)) => render_group(group, v, version),
        (Kind::Group(_), None) => String::new(),
        (Kind::Primitive(_), Some(v)) => format!("{}: {v}", element.name),
        (Kind::Primitive(_), None) if element.min > 0 => format!("{}: <MISSING>", element.name),
        (Kind::Primitive(_), None) => String::new(),
    }
}

/// Renders every repetition of `element`, joined by `; `.
pub(crate) fn render_all(element: &Element, value: Option<&Value>, version: u16) -> String {
    match value {
        Some(v) if element.max > 1 => v
            .as_list()
            .iter()
            .map(|item| render(element, Some(item), version))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        _ => render(element, value, version),
    }
}

fn render_group(group: &GroupSchema, value: &Value, version: u16) -> String {
    let texts: Vec<String> = match (group.shape, value) {
        (GroupShape::Repeated, v) => group
            .children
            .iter()
            .map(|child| {
                v.as_list()
                    .iter()
                    .map(|item| render(child, Some(item), version))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .collect(),
        (GroupShape::FixedTuple, Value::Group(fields)) => group
            .children
            .iter()
            .filter(|c| c.applies(version))
            .map(|child| render_all(child, fields.get(child.name), version))
            .collect(),
        (GroupShape::FixedTuple, _) => Vec::new(),
    };
    let texts: Vec<String> = texts.into_iter().filter(|t| !t.is_empty()).collect();
    format!("[{}]", texts.join(", "))
}
