use crate::schema::{Entity, Method, MethodKind, RelationKind, SchemaState};
use once_cell::sync::Lazy;
use regex::Regex;

static ARRAY_ANNOTATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());

pub fn capitalize_first_letter(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Java-convention spelling for well-known type names. Primitives stay
/// lowercase, reference types get capitalized.
fn map_known_type(lower: &str) -> Option<&'static str> {
    let mapped = match lower {
        "int" | "integer" => "int",
        "double" => "double",
        "float" => "float",
        "boolean" => "boolean",
        "char" => "char",
        "byte" => "byte",
        "short" => "short",
        "long" => "long",
        "void" => "void",
        "string" => "String",
        "object" => "Object",
        "list" => "List",
        "map" => "Map",
        "set" => "Set",
        "collection" => "Collection",
        "arraylist" => "ArrayList",
        "hashmap" => "HashMap",
        "hashset" => "HashSet",
        _ => return None,
    };
    Some(mapped)
}

/// Normalizes a type string for diagram display: bracketed array
/// annotations collapse to a trailing `[]`, stray parentheses are
/// stripped, and capitalization follows Java conventions. Generic
/// arguments are formatted recursively, so `list<string>` becomes
/// `List<String>`.
pub fn format_type(ty: &str) -> String {
    if ty.is_empty() {
        return String::new();
    }
    let collapsed = ARRAY_ANNOTATION_RE.replace_all(ty, "[]");
    let cleaned: String = collapsed.chars().filter(|c| *c != '(' && *c != ')').collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        return String::new();
    }
    let lower = cleaned.to_lowercase();

    if let Some(mapped) = map_known_type(&lower) {
        return mapped.to_string();
    }

    if let Some(base) = lower.strip_suffix("[]") {
        if let Some(mapped) = map_known_type(base) {
            return format!("{mapped}[]");
        }
    }

    if let (Some(open), Some(close)) = (lower.find('<'), lower.rfind('>')) {
        if open < close {
            let main = &lower[..open];
            let inner = &lower[open + 1..close];
            let formatted_main = map_known_type(main)
                .map(str::to_string)
                .unwrap_or_else(|| capitalize_first_letter(main));
            let parts: Vec<String> = inner.split(',').map(|part| format_type(part.trim())).collect();
            return format!("{formatted_main}<{}>", parts.join(", "));
        }
    }

    let mut chars = cleaned.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str()
        }
        None => String::new(),
    }
}

fn method_signature(class_name: &str, method: &Method) -> String {
    if method.kind == MethodKind::Constructor {
        return format!("  +{class_name}({})", method.parameters.join(", "));
    }
    let symbol = method.visibility.symbol();
    let params: Vec<String> = method
        .parameters
        .iter()
        .map(|param| {
            if param.contains(':') {
                return param.clone();
            }
            // Setters without typed parameters display as property: Type.
            if method.kind == MethodKind::Setter {
                if let Some(property) = &method.property_name {
                    return format!("{property}: {}", method.return_type);
                }
            }
            param.clone()
        })
        .collect();
    let classifier = if method.is_static { "$" } else { "" };
    let return_type = if method.return_type.is_empty() {
        "void".to_string()
    } else {
        format_type(&method.return_type)
    };
    format!("  {symbol}{}({}){classifier}: {return_type}", method.name, params.join(", "))
}

fn interface_block(class_name: &str, entity: &Entity) -> String {
    let mut block = format!("class {class_name} {{\n");
    block.push_str("  <<interface>>\n");
    for method in &entity.methods {
        let return_type = if method.return_type.is_empty() {
            "void".to_string()
        } else {
            format_type(&method.return_type)
        };
        block.push_str(&format!(
            "  +{}({}): {return_type}\n",
            method.name,
            method.parameters.join(", ")
        ));
    }
    block.push_str("}\n");
    block
}

fn class_block(class_name: &str, entity: &Entity) -> String {
    let mut block = format!("class {class_name} {{\n");

    let mut attribute_lines: Vec<String> = Vec::new();
    for attr in entity.attributes.values() {
        let line = format!("  {}{}: {}", attr.visibility.symbol(), attr.name, format_type(&attr.ty));
        if !attribute_lines.contains(&line) {
            attribute_lines.push(line);
        }
    }
    if attribute_lines.is_empty() {
        attribute_lines.push("  // No attributes".to_string());
    }

    let mut method_lines: Vec<String> = Vec::new();
    for method in &entity.methods {
        let line = method_signature(class_name, method);
        if !method_lines.contains(&line) {
            method_lines.push(line);
        }
    }

    block.push_str(&attribute_lines.join("\n"));
    block.push('\n');
    if !method_lines.is_empty() {
        block.push('\n');
        block.push_str(&method_lines.join("\n"));
        block.push('\n');
    }
    block.push_str("}\n");
    block
}

/// Compiles the schema into the body of a mermaid `classDiagram`.
/// Deterministic and pure: the same state always yields byte-identical
/// output, which is what the render gate compares against.
pub fn schema_to_mermaid_source(state: &SchemaState) -> String {
    let mut sections: Vec<String> = Vec::new();

    for (key, entity) in &state.schema {
        let class_name = capitalize_first_letter(key);
        if entity.is_interface {
            sections.push(interface_block(&class_name, entity));
        } else {
            sections.push(class_block(&class_name, entity));
            if let Some(parent) = &entity.parent {
                let parent_name = capitalize_first_letter(parent);
                sections.push(format!("{parent_name} <|-- {class_name}"));
            }
        }
    }

    for rel in state.relationships.values() {
        let relation_a = capitalize_first_letter(&rel.relation_a);
        let relation_b = capitalize_first_letter(&rel.relation_b);
        let line = match &rel.kind {
            RelationKind::Inheritance => format!("{relation_b} <|-- {relation_a}"),
            RelationKind::Implementation => format!("{relation_b} <|.. {relation_a}"),
            RelationKind::Composition { cardinality_a, .. } => format!(
                "{relation_a} *-- \"{cardinality_a}\" {relation_b} : \"{}\"",
                rel.label.as_deref().unwrap_or("Composition")
            ),
            RelationKind::Aggregation { cardinality_a, .. } => format!(
                "{relation_a} o-- \"{cardinality_a}\" {relation_b} : \"{}\"",
                rel.label.as_deref().unwrap_or("Aggregation")
            ),
            RelationKind::Cardinality {
                cardinality_a,
                cardinality_b,
            } => {
                let mut edge = format!(
                    "{relation_a} \"{cardinality_a}\" -- \"{cardinality_b}\" {relation_b}"
                );
                if let Some(label) = rel.label.as_deref().filter(|l| !l.is_empty()) {
                    edge.push_str(&format!(" : {label}"));
                }
                edge
            }
        };
        sections.push(line);
    }

    sections.join("\n")
}

/// The full diagram text handed to the rendering library.
pub fn compile_diagram_source(state: &SchemaState) -> String {
    format!("classDiagram\n{}", schema_to_mermaid_source(state))
}
