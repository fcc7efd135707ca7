//! Class-skeleton generation from mermaid `classDiagram` text.
//!
//! The generator never reads the live schema; it round-trips through
//! the diagram source, which is the interchange format between the
//! editor model and generated code. Accepted syntax is the subset the
//! compiler emits: `class Name { ... }` blocks with `+name: Type`
//! attribute lines and `+name(params)$?: Ret` method lines, plus
//! `<|--` / `<|..` connector lines in either orientation.

use crate::schema::Visibility;
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLanguage {
    Java,
    Python,
}

#[derive(Debug, Clone)]
pub struct GeneratedAttribute {
    pub visibility: Visibility,
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedMethod {
    pub visibility: Visibility,
    pub name: String,
    /// `(name, type)` pairs; untyped parameters default to `Object`.
    pub params: Vec<(String, String)>,
    pub return_type: String,
    pub is_static: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedClass {
    pub name: String,
    pub attributes: Vec<GeneratedAttribute>,
    pub methods: Vec<GeneratedMethod>,
    pub extends: Option<String>,
    pub implements: Vec<String>,
}

static CLASS_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"class\s+(\w+)\s*\{([^}]*)\}").unwrap());
static METHOD_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([+\-#]?)\s*(\w+)\s*\(([^)]*)\)\s*(\$)?\s*:?\s*(.*)").unwrap());
static ATTRIBUTE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([+\-#]?)\s*(\w+)\s*:\s*(.*)").unwrap());
static PARAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)\s*:\s*(.*)").unwrap());
// Both orientations of the class connectors: `Parent <|-- Child` and
// `Child --|> Parent` mean the same edge.
static EXTENDS_LEFT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)\s*<\|--\s*(\w+)").unwrap());
static EXTENDS_RIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)\s*--\|>\s*(\w+)").unwrap());
static IMPLEMENTS_LEFT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)\s*<\|\.\.\s*(\w+)").unwrap());
static IMPLEMENTS_RIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)\s*\.\.\|>\s*(\w+)").unwrap());

fn parse_params(param_str: &str) -> Vec<(String, String)> {
    param_str
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|part| match PARAM_RE.captures(part) {
            Some(caps) => (caps[1].to_string(), caps[2].trim().to_string()),
            None => (part.to_string(), "Object".to_string()),
        })
        .collect()
}

fn parse_class_body(body: &str) -> (Vec<GeneratedAttribute>, Vec<GeneratedMethod>) {
    let mut attributes = Vec::new();
    let mut methods = Vec::new();

    for raw_line in body.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("//") || line.starts_with("<<") {
            continue;
        }
        if line.contains('(') && line.contains(')') {
            if let Some(caps) = METHOD_LINE_RE.captures(line) {
                let return_info = caps[5].trim();
                methods.push(GeneratedMethod {
                    visibility: Visibility::from_symbol(caps[1].chars().next().unwrap_or('+')),
                    name: caps[2].to_string(),
                    params: parse_params(&caps[3]),
                    return_type: if return_info.is_empty() {
                        "void".to_string()
                    } else {
                        return_info.to_string()
                    },
                    is_static: caps.get(4).is_some(),
                });
            }
        } else if let Some(caps) = ATTRIBUTE_LINE_RE.captures(line) {
            attributes.push(GeneratedAttribute {
                visibility: Visibility::from_symbol(caps[1].chars().next().unwrap_or('+')),
                name: caps[2].to_string(),
                ty: caps[3].trim().to_string(),
            });
        }
    }

    (attributes, methods)
}

/// Parses class blocks and inheritance/implementation edges out of
/// diagram source. Unrecognized lines are ignored; a malformed block
/// simply yields no class.
pub fn parse_mermaid_classes(source: &str) -> Vec<GeneratedClass> {
    let source = source.trim_start().trim_start_matches("classDiagram");
    let mut classes: Vec<GeneratedClass> = Vec::new();

    for caps in CLASS_BLOCK_RE.captures_iter(source) {
        let (attributes, methods) = parse_class_body(&caps[2]);
        classes.push(GeneratedClass {
            name: caps[1].to_string(),
            attributes,
            methods,
            extends: None,
            implements: Vec::new(),
        });
    }

    let mut extends_edges: Vec<(String, String)> = Vec::new();
    for caps in EXTENDS_LEFT_RE.captures_iter(source) {
        extends_edges.push((caps[2].to_string(), caps[1].to_string()));
    }
    for caps in EXTENDS_RIGHT_RE.captures_iter(source) {
        extends_edges.push((caps[1].to_string(), caps[2].to_string()));
    }
    let mut implements_edges: Vec<(String, String)> = Vec::new();
    for caps in IMPLEMENTS_LEFT_RE.captures_iter(source) {
        implements_edges.push((caps[2].to_string(), caps[1].to_string()));
    }
    for caps in IMPLEMENTS_RIGHT_RE.captures_iter(source) {
        implements_edges.push((caps[1].to_string(), caps[2].to_string()));
    }

    for (child, parent) in extends_edges {
        if let Some(class) = classes.iter_mut().find(|c| c.name == child) {
            class.extends = Some(parent);
        }
    }
    for (class_name, interface) in implements_edges {
        if let Some(class) = classes.iter_mut().find(|c| c.name == class_name) {
            if !class.implements.contains(&interface) {
                class.implements.push(interface);
            }
        }
    }

    classes
}

/// `generate(diagram_source, target)` — one skeleton per parsed class.
pub fn generate(source: &str, target: TargetLanguage) -> String {
    let classes = parse_mermaid_classes(source);
    match target {
        TargetLanguage::Java => generate_java(&classes),
        TargetLanguage::Python => generate_python(&classes),
    }
}

fn java_stub_return(return_type: &str) -> Option<&'static str> {
    match return_type {
        "void" => None,
        "boolean" | "Boolean" => Some("        return false;\n"),
        "int" | "Integer" | "float" | "Float" | "double" | "Double" | "long" | "Long" => {
            Some("        return 0;\n")
        }
        "String" => Some("        return \"\";\n"),
        ty if ty.contains("List") => Some("        return new ArrayList<>();\n"),
        _ => Some("        return null;\n"),
    }
}

fn generate_java_class(class: &GeneratedClass) -> String {
    let mut code = format!("public class {}", class.name);
    if let Some(parent) = &class.extends {
        code.push_str(&format!(" extends {parent}"));
    }
    if !class.implements.is_empty() {
        code.push_str(&format!(" implements {}", class.implements.join(", ")));
    }
    code.push_str(" {\n");

    if !class.attributes.is_empty() {
        for attr in &class.attributes {
            code.push_str(&format!(
                "    {} {} {};\n",
                attr.visibility.keyword(),
                attr.ty,
                attr.name
            ));
        }
        code.push('\n');
    }

    for method in &class.methods {
        let params: Vec<String> = method
            .params
            .iter()
            .map(|(name, ty)| format!("{ty} {name}"))
            .collect();
        if method.name == class.name {
            // Constructor row from the diagram.
            code.push_str(&format!(
                "    {} {}({}) {{\n    }}\n\n",
                method.visibility.keyword(),
                method.name,
                params.join(", ")
            ));
            continue;
        }
        let modifier = if method.is_static { "static " } else { "" };
        code.push_str(&format!(
            "    {} {modifier}{} {}({}) {{\n",
            method.visibility.keyword(),
            method.return_type,
            method.name,
            params.join(", ")
        ));
        if let Some(stub) = java_stub_return(&method.return_type) {
            code.push_str(stub);
        }
        code.push_str("    }\n\n");
    }

    code.push('}');
    code
}

pub fn generate_java(classes: &[GeneratedClass]) -> String {
    classes
        .iter()
        .map(generate_java_class)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fixed Java -> Python type-name mapping; generic `List<T>` recurses
/// into the inner type, unknown class names pass through unchanged.
pub fn java_to_python_type(java_type: &str) -> String {
    if java_type.is_empty() {
        return "Any".to_string();
    }
    if let (Some(open), Some(close)) = (java_type.find('<'), java_type.rfind('>')) {
        if open < close {
            let base = java_type[..open].trim();
            let inner = java_type[open + 1..close].trim();
            if base == "List" {
                return format!("List[{}]", java_to_python_type(inner));
            }
            return "Any".to_string();
        }
    }
    match java_type {
        "String" => "str".to_string(),
        "Integer" | "int" => "int".to_string(),
        "Float" | "float" | "Double" | "double" => "float".to_string(),
        "Boolean" | "boolean" => "bool".to_string(),
        "Date" => "date".to_string(),
        "void" => "None".to_string(),
        other => other.to_string(),
    }
}

fn python_stub_return(return_type: &str) -> &'static str {
    match return_type {
        "void" => "        pass\n",
        "boolean" | "Boolean" => "        return False\n",
        "int" | "Integer" | "float" | "Float" | "double" | "Double" | "long" | "Long" => {
            "        return 0\n"
        }
        "String" => "        return \"\"\n",
        ty if ty.contains("List") => "        return []\n",
        _ => "        return None\n",
    }
}

fn generate_python_class(class: &GeneratedClass) -> String {
    let mut code = String::from("@dataclass\n");
    code.push_str(&format!("class {}", class.name));
    if let Some(parent) = &class.extends {
        code.push_str(&format!("({parent})"));
    }
    code.push_str(":\n");

    if class.attributes.is_empty() {
        code.push_str("    pass\n\n");
    } else {
        for attr in &class.attributes {
            code.push_str(&format!("    {}: {} = None\n", attr.name, java_to_python_type(&attr.ty)));
        }
        code.push('\n');
    }

    for method in &class.methods {
        if method.name == class.name {
            // Dataclasses synthesize __init__; skip constructor rows.
            continue;
        }
        let mut params = vec!["self".to_string()];
        params.extend(
            method
                .params
                .iter()
                .map(|(name, ty)| format!("{name}: {}", java_to_python_type(ty))),
        );
        let return_annotation = if method.return_type == "void" {
            "None".to_string()
        } else {
            java_to_python_type(&method.return_type)
        };
        code.push_str(&format!(
            "    def {}({}) -> {return_annotation}:\n",
            method.name,
            params.join(", ")
        ));
        code.push_str(python_stub_return(&method.return_type));
        code.push('\n');
    }

    code
}

pub fn generate_python(classes: &[GeneratedClass]) -> String {
    let mut code = String::from("from typing import List, Optional, Any\n");
    code.push_str("from dataclasses import dataclass\n");
    code.push_str("from datetime import date, datetime\n\n");
    code.push_str(
        &classes
            .iter()
            .map(generate_python_class)
            .collect::<Vec<_>>()
            .join("\n\n"),
    );
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "classDiagram\nclass Car {\n  -color: String\n  -speed: int\n\n  +getColor(): String\n  +setColor(color: String): void\n  +count()$: int\n}\nclass Vehicle {\n  // No attributes\n}\nVehicle <|-- Car\nDrivable <|.. Car";

    #[test]
    fn parses_classes_and_edges() {
        let classes = parse_mermaid_classes(SOURCE);
        assert_eq!(classes.len(), 2);
        let car = classes.iter().find(|c| c.name == "Car").unwrap();
        assert_eq!(car.extends.as_deref(), Some("Vehicle"));
        assert_eq!(car.implements, vec!["Drivable"]);
        assert_eq!(car.attributes.len(), 2);
        assert_eq!(car.methods.len(), 3);
        let vehicle = classes.iter().find(|c| c.name == "Vehicle").unwrap();
        assert!(vehicle.attributes.is_empty());
    }

    #[test]
    fn parses_static_classifier() {
        let classes = parse_mermaid_classes(SOURCE);
        let car = &classes[0];
        let count = car.methods.iter().find(|m| m.name == "count").unwrap();
        assert!(count.is_static);
        assert_eq!(count.return_type, "int");
    }

    #[test]
    fn untyped_params_default_to_object() {
        let params = parse_params("color: String, flag");
        assert_eq!(params[0], ("color".to_string(), "String".to_string()));
        assert_eq!(params[1], ("flag".to_string(), "Object".to_string()));
    }

    #[test]
    fn java_output_shape() {
        let code = generate(SOURCE, TargetLanguage::Java);
        assert!(code.contains("public class Car extends Vehicle implements Drivable {"));
        assert!(code.contains("    private String color;"));
        assert!(code.contains("    public String getColor() {"));
        assert!(code.contains("        return \"\";"));
        assert!(code.contains("    public static int count() {"));
        assert!(code.contains("        return 0;"));
        assert!(code.contains("public class Vehicle {"));
    }

    #[test]
    fn java_stub_defaults() {
        assert_eq!(java_stub_return("void"), None);
        assert!(java_stub_return("boolean").unwrap().contains("false"));
        assert!(java_stub_return("List<Car>").unwrap().contains("ArrayList"));
        assert!(java_stub_return("Engine").unwrap().contains("null"));
    }

    #[test]
    fn python_output_shape() {
        let code = generate(SOURCE, TargetLanguage::Python);
        assert!(code.starts_with("from typing import List, Optional, Any\n"));
        assert!(code.contains("@dataclass\nclass Car(Vehicle):"));
        assert!(code.contains("    color: str = None"));
        assert!(code.contains("    def getColor(self) -> str:"));
        assert!(code.contains("        return \"\""));
        assert!(code.contains("class Vehicle:\n    pass"));
    }

    #[test]
    fn python_type_mapping() {
        assert_eq!(java_to_python_type("String"), "str");
        assert_eq!(java_to_python_type("Integer"), "int");
        assert_eq!(java_to_python_type("double"), "float");
        assert_eq!(java_to_python_type("Boolean"), "bool");
        assert_eq!(java_to_python_type("Date"), "date");
        assert_eq!(java_to_python_type("List<String>"), "List[str]");
        assert_eq!(java_to_python_type("List<List<Integer>>"), "List[List[int]]");
        assert_eq!(java_to_python_type("Map<String, int>"), "Any");
        assert_eq!(java_to_python_type("Engine"), "Engine");
    }

    #[test]
    fn malformed_blocks_are_skipped() {
        let classes = parse_mermaid_classes("classDiagram\nclass Broken {\n  -x: int\n");
        assert!(classes.is_empty());
    }
}
