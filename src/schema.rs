use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Canonical key for an entity: whitespace removed, lowercased. The
/// display name keeps its original spelling on the [`Entity`] itself.
pub fn normalize_entity_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn symbol(self) -> char {
        match self {
            Self::Public => '+',
            Self::Protected => '#',
            Self::Private => '-',
        }
    }

    pub fn from_symbol(symbol: char) -> Self {
        match symbol {
            '-' => Self::Private,
            '#' => Self::Protected,
            _ => Self::Public,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Private => "private",
        }
    }

    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "private" => Self::Private,
            "protected" => Self::Protected,
            _ => Self::Public,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttributeKey {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "PK")]
    Primary,
    #[serde(rename = "PPK")]
    PartialPrimary,
    #[serde(rename = "AK")]
    Alternate,
}

impl AttributeKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Primary => "PK",
            Self::PartialPrimary => "PPK",
            Self::Alternate => "AK",
        }
    }

    pub fn from_token(token: &str) -> Self {
        match token {
            "PK" => Self::Primary,
            "PPK" => Self::PartialPrimary,
            "AK" => Self::Alternate,
            _ => Self::None,
        }
    }

    /// Keyed attributes sort ahead of keyless ones within an entity.
    pub fn is_key(self) -> bool {
        self != Self::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub key: AttributeKey,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    #[default]
    Regular,
    Getter,
    Setter,
    Constructor,
    Abstract,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub visibility: Visibility,
    pub return_type: String,
    /// Parameters in `name: Type` form, insertion order.
    pub parameters: Vec<String>,
    pub is_static: bool,
    pub kind: MethodKind,
    pub property_name: Option<String>,
}

impl Method {
    /// A method with the documented defaults: public, `void`, no
    /// parameters, regular.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            return_type: "void".to_string(),
            parameters: Vec::new(),
            is_static: false,
            kind: MethodKind::Regular,
            property_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Display name as the user typed it.
    pub name: String,
    pub attributes: IndexMap<String, Attribute>,
    pub methods: Vec<Method>,
    /// Parent class recovered from parsed source; compiles to an
    /// inheritance edge without a relationship record.
    pub parent: Option<String>,
    pub is_interface: bool,
}

impl Entity {
    fn new(display_name: &str) -> Self {
        Self {
            name: display_name.trim().to_string(),
            attributes: IndexMap::new(),
            methods: Vec::new(),
            parent: None,
            is_interface: false,
        }
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }

    /// Rebuilds the attribute map with keyed attributes first. Order
    /// within each group stays insertion order.
    fn resort_attributes(&mut self) {
        let old = std::mem::take(&mut self.attributes);
        let mut sorted = IndexMap::with_capacity(old.len());
        for (name, attr) in old.iter().filter(|(_, a)| a.key.is_key()) {
            sorted.insert(name.clone(), attr.clone());
        }
        for (name, attr) in old.iter().filter(|(_, a)| !a.key.is_key()) {
            sorted.insert(name.clone(), attr.clone());
        }
        self.attributes = sorted;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelationKind {
    Cardinality {
        cardinality_a: String,
        cardinality_b: String,
    },
    Inheritance,
    Implementation,
    Composition {
        cardinality_a: String,
        cardinality_b: String,
    },
    Aggregation {
        cardinality_a: String,
        cardinality_b: String,
    },
}

impl RelationKind {
    pub fn cardinality(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self::Cardinality {
            cardinality_a: a.into(),
            cardinality_b: b.into(),
        }
    }

    /// Whole owns part, 1-to-1 by default.
    pub fn composition() -> Self {
        Self::Composition {
            cardinality_a: "1".to_string(),
            cardinality_b: "1".to_string(),
        }
    }

    /// Whole aggregates many parts by default.
    pub fn aggregation() -> Self {
        Self::Aggregation {
            cardinality_a: "1".to_string(),
            cardinality_b: "many".to_string(),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Cardinality { .. } => "cardinality",
            Self::Inheritance => "inheritance",
            Self::Implementation => "implementation",
            Self::Composition { .. } => "composition",
            Self::Aggregation { .. } => "aggregation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    /// Child / implementing class / owner side, normalized.
    pub relation_a: String,
    /// Parent / interface / part side, normalized.
    pub relation_b: String,
    pub label: Option<String>,
    #[serde(flatten)]
    pub kind: RelationKind,
}

/// Input to [`SchemaState::add_relationship`]; the id is assigned on
/// insert when the caller leaves it out.
#[derive(Debug, Clone)]
pub struct RelationshipDraft {
    pub id: Option<String>,
    pub relation_a: String,
    pub relation_b: String,
    pub label: Option<String>,
    pub kind: RelationKind,
}

impl RelationshipDraft {
    pub fn new(relation_a: impl Into<String>, relation_b: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            id: None,
            relation_a: relation_a.into(),
            relation_b: relation_b.into(),
            label: None,
            kind,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Shallow patch for [`SchemaState::edit_relationship`]; `None` fields
/// keep their current value, the id is never touched.
#[derive(Debug, Clone, Default)]
pub struct RelationshipPatch {
    pub relation_a: Option<String>,
    pub relation_b: Option<String>,
    pub label: Option<String>,
    pub kind: Option<RelationKind>,
}

/// The whole editable model: entities keyed by normalized name plus the
/// relationship set keyed by id, both insertion ordered.
///
/// Every operation is a pure function over `&self` producing the next
/// snapshot. Invalid operations log a warning and return a snapshot
/// equal to the input, so callers detect no-ops by comparison instead
/// of catching errors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaState {
    pub schema: IndexMap<String, Entity>,
    pub relationships: IndexMap<String, Relationship>,
    next_relationship_id: u64,
}

impl SchemaState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.schema.get(&normalize_entity_name(name))
    }

    pub fn add_entity(&self, name: &str, methods: Vec<Method>) -> Self {
        let key = normalize_entity_name(name);
        if key.is_empty() {
            warn!("add_entity: empty entity name rejected");
            return self.clone();
        }
        if self.schema.contains_key(&key) {
            warn!("add_entity: entity '{key}' already exists, ignoring");
            return self.clone();
        }
        let mut next = self.clone();
        let mut entity = Entity::new(name);
        for method in methods {
            if entity.has_method(&method.name) {
                warn!("add_entity: duplicate method '{}' on '{key}' skipped", method.name);
                continue;
            }
            entity.methods.push(method);
        }
        next.schema.insert(key, entity);
        next
    }

    /// Removes an entity and every relationship that references it.
    pub fn remove_entity(&self, name: &str) -> Self {
        let key = normalize_entity_name(name);
        if !self.schema.contains_key(&key) {
            warn!("remove_entity: unknown entity '{key}', ignoring");
            return self.clone();
        }
        let mut next = self.clone();
        next.schema.shift_remove(&key);
        next.relationships
            .retain(|_, rel| rel.relation_a != key && rel.relation_b != key);
        next
    }

    /// Adds or replaces an attribute. Replacement reinserts the
    /// attribute, so a changed key lands in the right ordering group.
    pub fn add_attribute(&self, entity: &str, attr_name: &str, key: AttributeKey, ty: &str) -> Self {
        let entity_key = normalize_entity_name(entity);
        let Some(_) = self.schema.get(&entity_key) else {
            warn!("add_attribute: unknown entity '{entity_key}', ignoring");
            return self.clone();
        };
        if ty.is_empty() {
            debug!("add_attribute: '{attr_name}' on '{entity_key}' has no type");
        }
        let mut next = self.clone();
        let data = next.schema.get_mut(&entity_key).unwrap();
        data.attributes.shift_remove(attr_name);
        data.attributes.insert(
            attr_name.to_string(),
            Attribute {
                name: attr_name.to_string(),
                ty: ty.to_string(),
                key,
                visibility: Visibility::Private,
            },
        );
        data.resort_attributes();
        next
    }

    pub fn update_attribute_key(&self, entity: &str, attr_name: &str, new_key: AttributeKey) -> Self {
        let entity_key = normalize_entity_name(entity);
        let has_attr = self
            .schema
            .get(&entity_key)
            .is_some_and(|e| e.attributes.contains_key(attr_name));
        if !has_attr {
            warn!("update_attribute_key: no attribute '{attr_name}' on '{entity_key}', ignoring");
            return self.clone();
        }
        let mut next = self.clone();
        let data = next.schema.get_mut(&entity_key).unwrap();
        data.attributes.get_mut(attr_name).unwrap().key = new_key;
        data.resort_attributes();
        next
    }

    pub fn remove_attribute(&self, entity: &str, attr_name: &str) -> Self {
        let entity_key = normalize_entity_name(entity);
        let has_attr = self
            .schema
            .get(&entity_key)
            .is_some_and(|e| e.attributes.contains_key(attr_name));
        if !has_attr {
            warn!("remove_attribute: no attribute '{attr_name}' on '{entity_key}', ignoring");
            return self.clone();
        }
        let mut next = self.clone();
        next.schema
            .get_mut(&entity_key)
            .unwrap()
            .attributes
            .shift_remove(attr_name);
        next
    }

    pub fn add_method(&self, entity: &str, method: Method) -> Self {
        let entity_key = normalize_entity_name(entity);
        let Some(data) = self.schema.get(&entity_key) else {
            warn!("add_method: unknown entity '{entity_key}', ignoring");
            return self.clone();
        };
        if data.has_method(&method.name) {
            warn!("add_method: '{}' already exists on '{entity_key}', ignoring", method.name);
            return self.clone();
        }
        let mut next = self.clone();
        next.schema.get_mut(&entity_key).unwrap().methods.push(method);
        next
    }

    /// Bulk attach for parsed source code; duplicates are skipped
    /// individually so one collision does not drop the batch.
    pub fn add_methods(&self, entity: &str, methods: Vec<Method>) -> Self {
        let entity_key = normalize_entity_name(entity);
        if !self.schema.contains_key(&entity_key) {
            warn!("add_methods: unknown entity '{entity_key}', ignoring");
            return self.clone();
        }
        let mut next = self.clone();
        let data = next.schema.get_mut(&entity_key).unwrap();
        for method in methods {
            if data.has_method(&method.name) {
                warn!("add_methods: duplicate '{}' on '{entity_key}' skipped", method.name);
                continue;
            }
            data.methods.push(method);
        }
        next
    }

    pub fn remove_method(&self, entity: &str, method_name: &str) -> Self {
        let entity_key = normalize_entity_name(entity);
        if !self.schema.contains_key(&entity_key) {
            warn!("remove_method: unknown entity '{entity_key}', ignoring");
            return self.clone();
        }
        let mut next = self.clone();
        next.schema
            .get_mut(&entity_key)
            .unwrap()
            .methods
            .retain(|m| m.name != method_name);
        next
    }

    /// Marks an entity as interface / sets its parsed parent. Used by
    /// the source-code sync path.
    pub fn set_entity_shape(&self, entity: &str, is_interface: bool, parent: Option<String>) -> Self {
        let entity_key = normalize_entity_name(entity);
        if !self.schema.contains_key(&entity_key) {
            warn!("set_entity_shape: unknown entity '{entity_key}', ignoring");
            return self.clone();
        }
        let mut next = self.clone();
        let data = next.schema.get_mut(&entity_key).unwrap();
        data.is_interface = is_interface;
        data.parent = parent.map(|p| normalize_entity_name(&p));
        next
    }

    /// Direction matters: `(A, B, kind)` and `(B, A, kind)` are
    /// distinct relationships.
    pub fn add_relationship(&self, draft: RelationshipDraft) -> Self {
        let relation_a = normalize_entity_name(&draft.relation_a);
        let relation_b = normalize_entity_name(&draft.relation_b);
        if relation_a.is_empty() || relation_b.is_empty() {
            warn!("add_relationship: missing endpoint, ignoring");
            return self.clone();
        }
        let duplicate = self.relationships.values().any(|rel| {
            rel.relation_a == relation_a
                && rel.relation_b == relation_b
                && rel.kind.tag() == draft.kind.tag()
        });
        if duplicate {
            warn!(
                "add_relationship: duplicate {} edge {relation_a} -> {relation_b}, ignoring",
                draft.kind.tag()
            );
            return self.clone();
        }

        let mut next = self.clone();
        let id = match draft.id {
            Some(id) => id,
            None => {
                next.next_relationship_id += 1;
                format!("rel-{}", next.next_relationship_id)
            }
        };
        let label = draft.label.or_else(|| match draft.kind {
            RelationKind::Inheritance => Some("extends".to_string()),
            RelationKind::Implementation => Some("implements".to_string()),
            _ => None,
        });
        next.relationships.insert(
            id.clone(),
            Relationship {
                id,
                relation_a,
                relation_b,
                label,
                kind: draft.kind,
            },
        );
        next
    }

    pub fn edit_relationship(&self, id: &str, patch: RelationshipPatch) -> Self {
        if !self.relationships.contains_key(id) {
            warn!("edit_relationship: unknown id '{id}', ignoring");
            return self.clone();
        }
        let mut next = self.clone();
        let rel = next.relationships.get_mut(id).unwrap();
        if let Some(relation_a) = patch.relation_a {
            rel.relation_a = normalize_entity_name(&relation_a);
        }
        if let Some(relation_b) = patch.relation_b {
            rel.relation_b = normalize_entity_name(&relation_b);
        }
        if let Some(label) = patch.label {
            rel.label = Some(label);
        }
        if let Some(kind) = patch.kind {
            rel.kind = kind;
        }
        next
    }

    pub fn remove_relationship(&self, id: &str) -> Self {
        if !self.relationships.contains_key(id) {
            warn!("remove_relationship: unknown id '{id}', ignoring");
            return self.clone();
        }
        let mut next = self.clone();
        next.relationships.shift_remove(id);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_names_are_normalized() {
        let state = SchemaState::new().add_entity("Charging Station", Vec::new());
        assert!(state.schema.contains_key("chargingstation"));
        assert_eq!(state.entity("charging station").unwrap().name, "Charging Station");
    }

    #[test]
    fn duplicate_entity_is_a_noop() {
        let first = SchemaState::new().add_entity("Car", Vec::new());
        let second = first.add_entity("Car", Vec::new());
        assert_eq!(first, second);
        assert_eq!(second.schema.len(), 1);
        assert!(second.schema.contains_key("car"));
    }

    #[test]
    fn remove_entity_cascades_relationships() {
        let state = SchemaState::new()
            .add_entity("Tank", Vec::new())
            .add_entity("Fish", Vec::new())
            .add_relationship(RelationshipDraft::new(
                "Tank",
                "Fish",
                RelationKind::cardinality("1", "many"),
            ));
        assert_eq!(state.relationships.len(), 1);

        let after = state.remove_entity("Tank");
        assert!(!after.schema.contains_key("tank"));
        assert!(after.schema.contains_key("fish"));
        assert!(after.relationships.is_empty());
    }

    #[test]
    fn keyed_attributes_sort_first() {
        let state = SchemaState::new()
            .add_entity("Fish", Vec::new())
            .add_attribute("Fish", "color", AttributeKey::None, "String")
            .add_attribute("Fish", "id", AttributeKey::Primary, "int");
        let names: Vec<&str> = state
            .entity("fish")
            .unwrap()
            .attributes
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, vec!["id", "color"]);
    }

    #[test]
    fn update_attribute_key_resorts() {
        let state = SchemaState::new()
            .add_entity("Fish", Vec::new())
            .add_attribute("Fish", "color", AttributeKey::None, "String")
            .add_attribute("Fish", "id", AttributeKey::None, "int")
            .update_attribute_key("Fish", "id", AttributeKey::Primary);
        let names: Vec<&str> = state
            .entity("fish")
            .unwrap()
            .attributes
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, vec!["id", "color"]);
    }

    #[test]
    fn add_attribute_replaces_same_name() {
        let state = SchemaState::new()
            .add_entity("Fish", Vec::new())
            .add_attribute("Fish", "color", AttributeKey::None, "String")
            .add_attribute("Fish", "color", AttributeKey::None, "Color");
        let entity = state.entity("fish").unwrap();
        assert_eq!(entity.attributes.len(), 1);
        assert_eq!(entity.attributes["color"].ty, "Color");
    }

    #[test]
    fn duplicate_method_is_a_noop() {
        let base = SchemaState::new()
            .add_entity("Car", Vec::new())
            .add_method("Car", Method::named("drive"));
        let again = base.add_method("Car", Method::named("drive"));
        assert_eq!(base, again);
        assert_eq!(again.entity("car").unwrap().methods.len(), 1);
    }

    #[test]
    fn method_defaults() {
        let method = Method::named("start");
        assert_eq!(method.visibility, Visibility::Public);
        assert_eq!(method.return_type, "void");
        assert!(method.parameters.is_empty());
        assert_eq!(method.kind, MethodKind::Regular);
    }

    #[test]
    fn duplicate_relationship_rejected() {
        let base = SchemaState::new()
            .add_entity("Car", Vec::new())
            .add_entity("Vehicle", Vec::new())
            .add_relationship(RelationshipDraft::new("Car", "Vehicle", RelationKind::Inheritance));
        let again =
            base.add_relationship(RelationshipDraft::new("Car", "Vehicle", RelationKind::Inheritance));
        assert_eq!(base, again);
        assert_eq!(again.relationships.len(), 1);
    }

    #[test]
    fn swapped_direction_is_not_a_duplicate() {
        let state = SchemaState::new()
            .add_entity("Garage", Vec::new())
            .add_entity("Car", Vec::new())
            .add_relationship(RelationshipDraft::new("Garage", "Car", RelationKind::composition()))
            .add_relationship(RelationshipDraft::new("Car", "Garage", RelationKind::composition()));
        assert_eq!(state.relationships.len(), 2);
    }

    #[test]
    fn relationship_ids_are_deterministic() {
        let make = || {
            SchemaState::new()
                .add_entity("A", Vec::new())
                .add_entity("B", Vec::new())
                .add_relationship(RelationshipDraft::new("A", "B", RelationKind::cardinality("1", "1")))
        };
        let a = make();
        let b = make();
        assert_eq!(a, b);
        assert!(a.relationships.contains_key("rel-1"));
    }

    #[test]
    fn inheritance_label_defaults_to_extends() {
        let state = SchemaState::new()
            .add_entity("Car", Vec::new())
            .add_entity("Vehicle", Vec::new())
            .add_relationship(RelationshipDraft::new("Car", "Vehicle", RelationKind::Inheritance));
        let rel = state.relationships.values().next().unwrap();
        assert_eq!(rel.label.as_deref(), Some("extends"));
    }

    #[test]
    fn edit_relationship_preserves_id_and_merges() {
        let state = SchemaState::new()
            .add_entity("Tank", Vec::new())
            .add_entity("Fish", Vec::new())
            .add_relationship(
                RelationshipDraft::new("Tank", "Fish", RelationKind::cardinality("1", "many"))
                    .with_id("edge"),
            );
        let edited = state.edit_relationship(
            "edge",
            RelationshipPatch {
                label: Some("holds".to_string()),
                ..Default::default()
            },
        );
        let rel = &edited.relationships["edge"];
        assert_eq!(rel.id, "edge");
        assert_eq!(rel.relation_a, "tank");
        assert_eq!(rel.label.as_deref(), Some("holds"));
    }

    #[test]
    fn edit_unknown_relationship_is_a_noop() {
        let state = SchemaState::new();
        assert_eq!(state, state.edit_relationship("nope", RelationshipPatch::default()));
        assert_eq!(state, state.remove_relationship("nope"));
    }

    #[test]
    fn mutations_on_absent_entities_are_noops() {
        let state = SchemaState::new();
        assert_eq!(state, state.add_attribute("ghost", "x", AttributeKey::None, "int"));
        assert_eq!(state, state.remove_attribute("ghost", "x"));
        assert_eq!(state, state.add_method("ghost", Method::named("m")));
        assert_eq!(state, state.remove_method("ghost", "m"));
        assert_eq!(state, state.remove_entity("ghost"));
    }
}
