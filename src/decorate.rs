//! Post-render decoration of the SVG diagram: per-entity floating
//! toolbars and clickable method rows. The rendered tree itself lives
//! on the host side of the [`DiagramTree`] boundary; this module only
//! decides what to attach where.

use crate::schema::{normalize_entity_name, SchemaState};
use log::debug;

/// Maps a rendered node id back to the schema key. Rendered ids look
/// like `classId-Fish-0`; anything without that shape is treated as a
/// bare class name.
pub fn extract_entity_name(node_id: &str) -> String {
    let parts: Vec<&str> = node_id.split('-').collect();
    if parts.len() >= 2 {
        normalize_entity_name(parts[1])
    } else {
        normalize_entity_name(node_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarButton {
    Delete,
    Inspect,
    AddAttribute,
    RemoveLastAttribute,
    AddMethod,
    RemoveLastMethod,
}

impl ToolbarButton {
    pub const ALL: [ToolbarButton; 6] = [
        ToolbarButton::Delete,
        ToolbarButton::Inspect,
        ToolbarButton::AddAttribute,
        ToolbarButton::RemoveLastAttribute,
        ToolbarButton::AddMethod,
        ToolbarButton::RemoveLastMethod,
    ];

    pub fn glyph(self) -> &'static str {
        match self {
            ToolbarButton::Delete => "x",
            ToolbarButton::Inspect => "i",
            ToolbarButton::AddAttribute => "+a",
            ToolbarButton::RemoveLastAttribute => "-a",
            ToolbarButton::AddMethod => "+m",
            ToolbarButton::RemoveLastMethod => "-m",
        }
    }
}

/// Toolbar item placed beside an entity box, in diagram coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolbarItem {
    pub button: ToolbarButton,
    pub x: f32,
    pub y: f32,
}

/// One floating toolbar per rendered entity, hidden until the entity
/// is clicked.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityToolbar {
    pub entity: String,
    pub items: Vec<ToolbarItem>,
    pub visible: bool,
}

const TOOLBAR_GAP_X: f32 = 15.0;
const TOOLBAR_START_Y: f32 = 15.0;
const TOOLBAR_STEP_Y: f32 = 20.0;

impl EntityToolbar {
    fn beside(entity: &str, bounds: Rect) -> Self {
        let x = bounds.x + bounds.width + TOOLBAR_GAP_X;
        let items = ToolbarButton::ALL
            .iter()
            .enumerate()
            .map(|(i, button)| ToolbarItem {
                button: *button,
                x,
                y: bounds.y + TOOLBAR_START_Y + TOOLBAR_STEP_Y * i as f32,
            })
            .collect();
        Self {
            entity: entity.to_string(),
            items,
            visible: false,
        }
    }
}

/// A clickable method row inside an entity box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodTarget {
    pub entity: String,
    pub method: String,
}

/// Host-side view of the rendered SVG. Node ids and row text come from
/// the rendering library's output; attachment hooks mutate the live
/// tree.
pub trait DiagramTree {
    fn entity_node_ids(&self) -> Vec<String>;
    fn node_bounds(&self, node_id: &str) -> Option<Rect>;
    /// Text rows inside the node, in visual order. The first row is the
    /// class title.
    fn row_text(&self, node_id: &str) -> Vec<String>;
    fn attach_toolbar(&mut self, node_id: &str, toolbar: &EntityToolbar);
    fn mark_method_row(&mut self, node_id: &str, row_index: usize, target: &MethodTarget);
}

/// Strips the visibility symbol and parameter list from a rendered
/// method row, leaving the bare method name.
fn method_name_from_row(row: &str) -> Option<String> {
    let open = row.find('(')?;
    row.find(')')?;
    let name = row[..open].trim_start_matches(['+', '-', '#', '~']).trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Walks the rendered entity nodes, attaching a toolbar to each one
/// that maps back to a schema entity and marking its method rows.
pub fn decorate(tree: &mut dyn DiagramTree, state: &SchemaState) -> Vec<EntityToolbar> {
    let mut toolbars = Vec::new();
    for node_id in tree.entity_node_ids() {
        let entity = extract_entity_name(&node_id);
        if !state.schema.contains_key(&entity) {
            debug!("rendered node {node_id} has no schema entity, skipping");
            continue;
        }
        let Some(bounds) = tree.node_bounds(&node_id) else {
            continue;
        };

        let toolbar = EntityToolbar::beside(&entity, bounds);
        tree.attach_toolbar(&node_id, &toolbar);

        // Row 0 is the class title; method rows are the ones carrying a
        // parameter list.
        for (index, row) in tree.row_text(&node_id).iter().enumerate().skip(1) {
            if let Some(method) = method_name_from_row(row) {
                let target = MethodTarget {
                    entity: entity.clone(),
                    method,
                };
                tree.mark_method_row(&node_id, index, &target);
            }
        }

        toolbars.push(toolbar);
    }
    toolbars
}
