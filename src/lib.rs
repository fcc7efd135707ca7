//! Engine for a UML class-diagram editor built on mermaid
//! `classDiagram` text.
//!
//! The schema model is the single source of truth: mutation commands
//! produce immutable snapshots, the compiler turns each snapshot into
//! deterministic diagram source, and the sync engine debounces and
//! gates renders against the last text actually drawn. Around that
//! core sit the inverse paths (Java/Python parsing into the schema,
//! and skeleton generation back out of diagram text), plus the
//! viewport and the post-render decoration hooks a host UI needs.
//!
//! Rendering itself stays behind the [`sync::Renderer`] trait; this
//! crate never touches a DOM.

pub mod codegen;
pub mod compile;
pub mod decorate;
pub mod editor;
pub mod schema;
pub mod source_parse;
pub mod sync;
pub mod viewport;
pub mod wire;

pub use compile::compile_diagram_source;
pub use editor::{Command, Editor};
pub use schema::SchemaState;
pub use source_parse::SourceLanguage;
pub use sync::{RenderOutcome, Renderer, SyncEngine};
