//! The editor facade: one mutable session owning the schema snapshot,
//! the render sync engine, the viewport, and the click-selection state.
//! Hosts feed it commands and clock ticks; it hands back the actions
//! and render results they need to reflect on screen.

use crate::decorate::ToolbarButton;
use crate::schema::{
    AttributeKey, Method, RelationshipDraft, RelationshipPatch, SchemaState,
};
use crate::source_parse::{sync_code_with_schema, SourceLanguage};
use crate::sync::{RenderOutcome, Renderer, SyncAction, SyncEngine};
use crate::viewport::Viewport;
use log::debug;
use std::time::Instant;

/// What the user currently has selected in the diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveElement {
    Entity(String),
    Method { entity: String, method: String },
}

/// Every schema mutation the editor surface can issue.
#[derive(Debug, Clone)]
pub enum Command {
    AddEntity { name: String, methods: Vec<Method> },
    RemoveEntity { name: String },
    AddAttribute { entity: String, name: String, key: AttributeKey, ty: String },
    UpdateAttributeKey { entity: String, name: String, key: AttributeKey },
    RemoveAttribute { entity: String, name: String },
    AddMethod { entity: String, method: Method },
    RemoveMethod { entity: String, name: String },
    AddRelationship(RelationshipDraft),
    EditRelationship { id: String, patch: RelationshipPatch },
    RemoveRelationship { id: String },
    /// Re-derive the whole schema from workbench source code.
    SyncSourceCode { code: String, language: SourceLanguage },
}

#[derive(Debug)]
pub struct Editor {
    state: SchemaState,
    sync: SyncEngine,
    pub viewport: Viewport,
    selection: Option<ActiveElement>,
    open_toolbar: Option<String>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self {
            state: SchemaState::new(),
            sync: SyncEngine::new(),
            viewport: Viewport::new(),
            selection: None,
            open_toolbar: None,
        }
    }

    pub fn with_state(state: SchemaState) -> Self {
        Self {
            state,
            ..Self::new()
        }
    }

    pub fn state(&self) -> &SchemaState {
        &self.state
    }

    pub fn selection(&self) -> Option<&ActiveElement> {
        self.selection.as_ref()
    }

    pub fn open_toolbar(&self) -> Option<&str> {
        self.open_toolbar.as_deref()
    }

    /// Applies a schema command and reports what the render side should
    /// do next. Invalid commands leave the state untouched and come
    /// back as [`SyncAction::RefreshStyles`].
    pub fn apply(&mut self, command: Command, now: Instant) -> SyncAction {
        let next = match command {
            Command::AddEntity { name, methods } => self.state.add_entity(&name, methods),
            Command::RemoveEntity { name } => {
                self.clear_selection_for(&name);
                self.state.remove_entity(&name)
            }
            Command::AddAttribute { entity, name, key, ty } => {
                self.state.add_attribute(&entity, &name, key, &ty)
            }
            Command::UpdateAttributeKey { entity, name, key } => {
                self.state.update_attribute_key(&entity, &name, key)
            }
            Command::RemoveAttribute { entity, name } => {
                self.state.remove_attribute(&entity, &name)
            }
            Command::AddMethod { entity, method } => self.state.add_method(&entity, method),
            Command::RemoveMethod { entity, name } => self.state.remove_method(&entity, &name),
            Command::AddRelationship(draft) => self.state.add_relationship(draft),
            Command::EditRelationship { id, patch } => self.state.edit_relationship(&id, patch),
            Command::RemoveRelationship { id } => self.state.remove_relationship(&id),
            Command::SyncSourceCode { code, language } => {
                sync_code_with_schema(&self.state, &code, language)
            }
        };
        self.state = next;
        self.sync.model_changed(&self.state, now)
    }

    /// Dispatches a toolbar button press against its entity.
    pub fn entity_action(&mut self, entity: &str, button: ToolbarButton, now: Instant) -> SyncAction {
        match button {
            ToolbarButton::Delete => self.apply(
                Command::RemoveEntity { name: entity.to_string() },
                now,
            ),
            ToolbarButton::Inspect => {
                self.selection = Some(ActiveElement::Entity(entity.to_string()));
                self.sync.model_changed(&self.state, now)
            }
            ToolbarButton::AddAttribute => {
                let name = self.fresh_name(entity, "attribute");
                self.apply(
                    Command::AddAttribute {
                        entity: entity.to_string(),
                        name,
                        key: AttributeKey::None,
                        ty: String::new(),
                    },
                    now,
                )
            }
            ToolbarButton::RemoveLastAttribute => {
                let last = self
                    .state
                    .entity(entity)
                    .and_then(|e| e.attributes.keys().last().cloned());
                match last {
                    Some(name) => self.apply(
                        Command::RemoveAttribute { entity: entity.to_string(), name },
                        now,
                    ),
                    None => {
                        debug!("no attributes left on '{entity}'");
                        self.sync.model_changed(&self.state, now)
                    }
                }
            }
            ToolbarButton::AddMethod => {
                let name = self.fresh_name(entity, "method");
                self.apply(
                    Command::AddMethod {
                        entity: entity.to_string(),
                        method: Method::named(name),
                    },
                    now,
                )
            }
            ToolbarButton::RemoveLastMethod => {
                let last = self
                    .state
                    .entity(entity)
                    .and_then(|e| e.methods.last().map(|m| m.name.clone()));
                match last {
                    Some(name) => self.apply(
                        Command::RemoveMethod { entity: entity.to_string(), name },
                        now,
                    ),
                    None => {
                        debug!("no methods left on '{entity}'");
                        self.sync.model_changed(&self.state, now)
                    }
                }
            }
        }
    }

    /// Placeholder member names for the quick-add toolbar buttons:
    /// `attribute1`, `attribute2`, ... skipping names already taken.
    fn fresh_name(&self, entity: &str, prefix: &str) -> String {
        let data = self.state.entity(entity);
        let mut n = 1;
        loop {
            let candidate = format!("{prefix}{n}");
            let taken = data.is_some_and(|e| {
                e.attributes.contains_key(&candidate) || e.has_method(&candidate)
            });
            if !taken {
                return candidate;
            }
            n += 1;
        }
    }

    /// Clicking an entity toggles its floating toolbar.
    pub fn entity_clicked(&mut self, entity: &str) {
        if self.open_toolbar.as_deref() == Some(entity) {
            self.open_toolbar = None;
        } else {
            self.open_toolbar = Some(entity.to_string());
        }
    }

    pub fn method_clicked(&mut self, entity: &str, method: &str) {
        self.selection = Some(ActiveElement::Method {
            entity: entity.to_string(),
            method: method.to_string(),
        });
    }

    /// A click outside the diagram dismisses toolbars and selection.
    pub fn outside_click(&mut self) {
        self.open_toolbar = None;
        self.selection = None;
    }

    fn clear_selection_for(&mut self, entity: &str) {
        let key = crate::schema::normalize_entity_name(entity);
        let selected = match &self.selection {
            Some(ActiveElement::Entity(e)) => crate::schema::normalize_entity_name(e) == key,
            Some(ActiveElement::Method { entity: e, .. }) => {
                crate::schema::normalize_entity_name(e) == key
            }
            None => false,
        };
        if selected {
            self.selection = None;
        }
        if self
            .open_toolbar
            .as_deref()
            .is_some_and(|open| crate::schema::normalize_entity_name(open) == key)
        {
            self.open_toolbar = None;
        }
    }

    pub fn last_rendered_source(&self) -> Option<&str> {
        self.sync.last_rendered_source()
    }

    /// Runs the renderer if the debounced render is due, applying the
    /// result. Selection state is dropped on failure since the target
    /// it pointed at is gone.
    pub fn render_if_due(&mut self, renderer: &mut dyn Renderer, now: Instant) -> Option<RenderOutcome> {
        match self.sync.poll(now) {
            crate::sync::RenderStart::Waiting => None,
            crate::sync::RenderStart::Start { ticket, source } => {
                let result = renderer.render(&source);
                let outcome = self.sync.render_completed(ticket, result);
                if outcome == RenderOutcome::Failed {
                    self.outside_click();
                }
                Some(outcome)
            }
        }
    }
}
