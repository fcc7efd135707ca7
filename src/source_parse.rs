//! Structural parsers that recover a schema from generated (or
//! hand-written) Java and Python source.
//!
//! The accepted grammar subset is deliberately narrow:
//!
//! - Java: `class Name [extends Parent] [implements A, B] { ... }`
//!   blocks with brace-matched bodies; `interface Name { ... }` blocks;
//!   field declarations `[visibility] Type name [= init];`; method
//!   declarations `visibility [static] [final] Ret name(params) {`.
//! - Python: top-level `class Name[(Parent)]:` blocks; `self.attr`
//!   assignments (typed via `self.attr: Type`); `def name(self, ...):`
//!   methods with optional `-> Ret` annotations.
//!
//! Anything outside the subset is skipped whole; a malformed class
//! never produces a partial entity. Attributes whose type cannot be
//! recovered get an empty type string.

use crate::compile::format_type;
use crate::schema::{Method, MethodKind, RelationKind, RelationshipDraft, SchemaState};
use indexmap::IndexMap;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Java,
    Python,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedClass {
    pub name: String,
    /// Attribute name -> recovered type string (may be empty).
    pub attributes: IndexMap<String, String>,
    pub methods: Vec<Method>,
    pub parent: Option<String>,
    pub is_interface: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedSource {
    pub classes: IndexMap<String, ParsedClass>,
    /// Implementation / composition / aggregation edges detected from
    /// field shapes and `implements` clauses.
    pub relationships: Vec<RelationshipDraft>,
}

const JAVA_PRIMITIVES: [&str; 10] = [
    "String", "int", "double", "float", "boolean", "char", "long", "short", "byte", "void",
];

// Statement keywords the loose field pattern can mistake for a type.
const JAVA_STMT_KEYWORDS: [&str; 8] = [
    "return", "new", "throw", "else", "case", "import", "package", "assert",
];

static JAVA_INTERFACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:public|protected|private)?\s*interface\s+(\w+)(?:\s+extends\s+(\w+))?\s*\{([^}]*)\}")
        .unwrap()
});
static JAVA_INTERFACE_METHOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+(?:<.*?>)?)\s+(\w+)\s*\(([^)]*)\)\s*;").unwrap());
static JAVA_CLASS_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:public|protected|private)?\s*class\s+(\w+)(?:\s+extends\s+(\w+))?(?:\s+implements\s+([\w\s,]+?))?\s*\{",
    )
    .unwrap()
});
static JAVA_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:private|protected|public)?\s+(\w+(?:<.*?>|\[\])?)\s+(\w+)(?:\s*=\s*[^;]*)?;")
        .unwrap()
});
static JAVA_AGGREGATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:private|protected|public)?\s+(List|Set|Map)\s*<(\w+)>\s+(\w+)\s*;").unwrap()
});
static JAVA_INSTANTIATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"this\.(\w+)\s*=\s*new\s+(\w+)\(").unwrap());
static JAVA_METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(public|private|protected)\s+(static\s+)?(?:final\s+)?(\w+(?:<.*?>)?)\s+(\w+)\s*\(([^)]*)\)[^;{]*\{",
    )
    .unwrap()
});

static PYTHON_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^class\s+(\w+)(?:\(([^)]+)\))?\s*:").unwrap());
static PYTHON_TYPED_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)self\.(\w+)\s*:\s*([\w\[\], ]+?)\s*(?:=|$)").unwrap());
static PYTHON_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"self\.(\w+)\s*=").unwrap());
static PYTHON_METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"def\s+(\w+)\s*\(\s*self(?:\s*,\s*([^)]*))?\)\s*(?:->\s*([\w\[\], ]+?)\s*)?:")
        .unwrap()
});

/// Parses source text into a schema-shaped map. Does not touch any
/// live state; callers apply the result through the mutation API (see
/// [`sync_code_with_schema`]).
pub fn parse_code_to_schema(code: &str, language: SourceLanguage) -> ParsedSource {
    match language {
        SourceLanguage::Java => parse_java(code),
        SourceLanguage::Python => parse_python(code),
    }
}

/// Converts a Java `Type name` parameter into display form `name: Type`.
fn java_parameter_list(params: &str) -> Vec<String> {
    params
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|param| {
            let parts: Vec<&str> = param.split_whitespace().collect();
            if parts.len() >= 2 {
                format!("{}: {}", parts[1], format_type(parts[0]))
            } else {
                param.to_string()
            }
        })
        .collect()
}

fn decapitalize(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn classify_accessor(method: &mut Method) {
    if let Some(property) = method.name.strip_prefix("get") {
        if method.parameters.is_empty() && method.return_type != "void" && !property.is_empty() {
            method.kind = MethodKind::Getter;
            method.property_name = Some(decapitalize(property));
        }
    } else if let Some(property) = method.name.strip_prefix("set") {
        if method.parameters.len() == 1 && !property.is_empty() {
            method.kind = MethodKind::Setter;
            method.property_name = Some(decapitalize(property));
        }
    }
}

/// Finds the matching close brace for the block opened at `open_idx`.
fn matching_brace(text: &str, open_idx: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut idx = open_idx + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
        idx += 1;
    }
    None
}

fn parse_java(code: &str) -> ParsedSource {
    let mut out = ParsedSource::default();

    for caps in JAVA_INTERFACE_RE.captures_iter(code) {
        let name = caps[1].to_string();
        let parent = caps.get(2).map(|m| m.as_str().to_string());
        let body = &caps[3];

        let mut methods = Vec::new();
        for m in JAVA_INTERFACE_METHOD_RE.captures_iter(body) {
            let mut method = Method::named(&m[2]);
            method.return_type = m[1].to_string();
            method.parameters = java_parameter_list(&m[3]);
            method.kind = MethodKind::Abstract;
            methods.push(method);
        }

        out.classes.insert(
            name.clone(),
            ParsedClass {
                name,
                attributes: IndexMap::new(),
                methods,
                parent,
                is_interface: true,
            },
        );
    }

    let mut search_from = 0usize;
    while let Some(caps) = JAVA_CLASS_START_RE.captures(&code[search_from..]) {
        let whole = caps.get(0).unwrap();
        let open_idx = search_from + whole.end() - 1;
        let Some(close_idx) = matching_brace(code, open_idx) else {
            // Unbalanced body: skip this declaration entirely.
            warn!("parse_java: unbalanced class body for '{}', skipping", &caps[1]);
            search_from += whole.end();
            continue;
        };

        let class_name = caps[1].to_string();
        let parent = caps.get(2).map(|m| m.as_str().to_string());
        let implements: Vec<String> = caps
            .get(3)
            .map(|m| m.as_str().split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();
        let body = &code[open_idx + 1..close_idx];
        search_from = close_idx + 1;

        for interface in &implements {
            out.relationships.push(
                RelationshipDraft::new(class_name.clone(), interface.clone(), RelationKind::Implementation)
                    .with_id(format!("{class_name}-implements-{interface}")),
            );
        }

        let mut parsed = ParsedClass {
            name: class_name.clone(),
            parent,
            ..Default::default()
        };

        for field in JAVA_FIELD_RE.captures_iter(body) {
            let declared_type = field[1].to_string();
            let field_name = field[2].to_string();
            if JAVA_STMT_KEYWORDS.contains(&declared_type.as_str()) {
                continue;
            }
            if parsed.attributes.contains_key(&field_name) {
                continue;
            }
            debug!("parse_java: field {field_name}: {declared_type} on {class_name}");
            parsed.attributes.insert(field_name, declared_type.clone());

            // Container-shaped fields are not compositions; List/Set/Map
            // generics become aggregation edges in the pass below.
            if declared_type.contains('<') || declared_type.ends_with("[]") {
                continue;
            }
            if !JAVA_PRIMITIVES.contains(&declared_type.as_str()) {
                out.relationships.push(
                    RelationshipDraft::new(class_name.clone(), declared_type.clone(), RelationKind::composition())
                        .with_label("Composition")
                        .with_id(format!("{class_name}-{declared_type}")),
                );
            }
        }

        for agg in JAVA_AGGREGATION_RE.captures_iter(body) {
            let item_type = agg[2].to_string();
            let field_name = agg[3].to_string();
            parsed
                .attributes
                .insert(field_name, format!("{}<{item_type}>", &agg[1]));
            out.relationships.push(
                RelationshipDraft::new(class_name.clone(), item_type.clone(), RelationKind::aggregation())
                    .with_label("Aggregation")
                    .with_id(format!("{class_name}-{item_type}")),
            );
        }

        for inst in JAVA_INSTANTIATION_RE.captures_iter(body) {
            let field_name = inst[1].to_string();
            let instantiated = inst[2].to_string();
            parsed.attributes.insert(field_name, instantiated.clone());
            out.relationships.push(
                RelationshipDraft::new(class_name.clone(), instantiated.clone(), RelationKind::composition())
                    .with_label("Composition")
                    .with_id(format!("{class_name}-{instantiated}")),
            );
        }

        for m in JAVA_METHOD_RE.captures_iter(body) {
            let return_type = m[3].to_string();
            let mut method = Method::named(&m[4]);
            method.visibility = crate::schema::Visibility::from_keyword(&m[1]);
            method.is_static = m.get(2).is_some();
            method.return_type = return_type;
            method.parameters = java_parameter_list(&m[5]);
            classify_accessor(&mut method);
            parsed.methods.push(method);
        }

        if parsed.methods.is_empty() {
            debug!("parse_java: no methods found for {class_name}");
        }

        out.classes.insert(class_name, parsed);
    }

    if out.classes.is_empty() {
        warn!("parse_java: no classes recognized in source");
    }
    out
}

fn parse_python(code: &str) -> ParsedSource {
    let mut out = ParsedSource::default();

    let headers: Vec<(usize, usize, String, Option<String>)> = PYTHON_CLASS_RE
        .captures_iter(code)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            (
                whole.start(),
                whole.end(),
                caps[1].to_string(),
                caps.get(2).map(|m| m.as_str().trim().to_string()),
            )
        })
        .collect();

    for (idx, (_, body_start, name, parent)) in headers.iter().enumerate() {
        let body_end = headers
            .get(idx + 1)
            .map(|next| next.0)
            .unwrap_or(code.len());
        let body = &code[*body_start..body_end];

        let mut parsed = ParsedClass {
            name: name.clone(),
            parent: parent.clone(),
            ..Default::default()
        };

        for attr in PYTHON_TYPED_ATTR_RE.captures_iter(body) {
            parsed
                .attributes
                .insert(attr[1].to_string(), attr[2].trim().to_string());
        }
        for attr in PYTHON_ATTR_RE.captures_iter(body) {
            let attr_name = attr[1].to_string();
            // Untyped assignment: keep the attribute, type unknown.
            parsed.attributes.entry(attr_name).or_insert_with(String::new);
        }

        for m in PYTHON_METHOD_RE.captures_iter(body) {
            let method_name = m[1].to_string();
            let mut method = Method::named(&method_name);
            method.return_type = m.get(3).map(|r| r.as_str().trim().to_string()).unwrap_or_else(|| "Any".to_string());
            method.parameters = m
                .get(2)
                .map(|params| {
                    params
                        .as_str()
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty() && *p != "self")
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            if method_name == "__init__" {
                method.kind = MethodKind::Constructor;
            } else if let Some(property) = method_name.strip_prefix("get_") {
                method.kind = MethodKind::Getter;
                method.property_name = Some(property.to_string());
            } else if let Some(property) = method_name.strip_prefix("set_") {
                method.kind = MethodKind::Setter;
                method.property_name = Some(property.to_string());
            }
            parsed.methods.push(method);
        }

        out.classes.insert(name.clone(), parsed);
    }

    if out.classes.is_empty() {
        warn!("parse_python: no classes recognized in source");
    }
    out
}

/// Applies parsed source to a state in two passes: entities and
/// attributes first, then methods, so method targets always exist.
/// Detected relationship edges are attached last.
pub fn sync_code_with_schema(state: &SchemaState, code: &str, language: SourceLanguage) -> SchemaState {
    let parsed = parse_code_to_schema(code, language);
    let mut next = state.clone();

    for (name, class) in &parsed.classes {
        next = next.add_entity(name, Vec::new());
        for (attr_name, ty) in &class.attributes {
            next = next.add_attribute(name, attr_name, crate::schema::AttributeKey::None, ty);
        }
        if class.is_interface || class.parent.is_some() {
            next = next.set_entity_shape(name, class.is_interface, class.parent.clone());
        }
    }

    for (name, class) in &parsed.classes {
        if !class.methods.is_empty() {
            next = next.add_methods(name, class.methods.clone());
        }
    }

    for draft in parsed.relationships {
        next = next.add_relationship(draft);
    }

    next
}

/// Diff-applies a freshly parsed schema onto the live one: entities and
/// attributes that disappeared from the source are removed, changed
/// attribute types are replaced, new entities are created.
pub fn apply_schema_updates(state: &SchemaState, parsed: &ParsedSource) -> SchemaState {
    use crate::schema::normalize_entity_name;

    let parsed_keys: Vec<String> = parsed
        .classes
        .keys()
        .map(|name| normalize_entity_name(name))
        .collect();

    let mut next = state.clone();
    let existing: Vec<String> = next.schema.keys().cloned().collect();
    for key in existing {
        if !parsed_keys.contains(&key) {
            next = next.remove_entity(&key);
        }
    }

    for (name, class) in &parsed.classes {
        let key = normalize_entity_name(name);
        match next.schema.get(&key).cloned() {
            Some(current) => {
                for attr_name in current.attributes.keys() {
                    if !class.attributes.contains_key(attr_name) {
                        next = next.remove_attribute(&key, attr_name);
                    }
                }
                for (attr_name, ty) in &class.attributes {
                    let unchanged = current
                        .attributes
                        .get(attr_name)
                        .is_some_and(|a| &a.ty == ty);
                    if !ty.is_empty() && !unchanged {
                        next = next.add_attribute(&key, attr_name, crate::schema::AttributeKey::None, ty);
                    }
                }
            }
            None => {
                next = next.add_entity(name, Vec::new());
                for (attr_name, ty) in &class.attributes {
                    next = next.add_attribute(&key, attr_name, crate::schema::AttributeKey::None, ty);
                }
            }
        }
    }

    next
}
