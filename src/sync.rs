//! Keeps the rendered diagram a faithful projection of the schema
//! without unnecessary re-renders.
//!
//! The engine is an explicit state machine driven by the host clock:
//! `model_changed` recompiles and gates on the last-rendered source,
//! `poll` fires the debounced render once it is due, and
//! `render_completed` applies or discards the result by ticket. The
//! external rendering call itself lives on the host side of the
//! [`Renderer`] boundary, so overlapping completions arriving out of
//! order can be exercised directly in tests.

use crate::compile::compile_diagram_source;
use crate::schema::SchemaState;
use log::warn;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Settle delay between a model change and the render it triggers.
pub const RENDER_DEBOUNCE: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("rendering library failed: {0}")]
    Library(#[from] anyhow::Error),
}

/// The external diagram-rendering library boundary: source text in,
/// SVG markup out. Failures are surfaced, never panicked on.
pub trait Renderer {
    fn render(&mut self, source: &str) -> Result<String, RenderError>;
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Scheduled { due: Instant, source: String },
    Rendering { ticket: u64, source: String },
}

/// What the host should do right after a model change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Source unchanged: refresh cosmetic styles only, no re-render.
    RefreshStyles,
    /// Schema is empty: clear the target to its placeholder state.
    Clear,
    /// A render was (re)scheduled; poll once the debounce elapses.
    Scheduled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStart {
    Waiting,
    Start { ticket: u64, source: String },
}

#[derive(Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Insert this markup and decorate it; the source is now cached.
    Applied { svg: String },
    /// A newer change superseded this render; leave the DOM alone.
    Superseded,
    /// Render failed: clear the target and any selection state.
    Failed,
}

#[derive(Debug)]
pub struct SyncEngine {
    phase: Phase,
    last_rendered: Option<String>,
    next_ticket: u64,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEngine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            last_rendered: None,
            next_ticket: 0,
        }
    }

    /// The source text backing the currently displayed diagram, if any.
    pub fn last_rendered_source(&self) -> Option<&str> {
        self.last_rendered.as_deref()
    }

    /// Recompiles the diagram source and decides whether a re-render
    /// is needed. A pending schedule is always superseded by the
    /// latest snapshot; only one render is conceptually in flight.
    pub fn model_changed(&mut self, state: &SchemaState, now: Instant) -> SyncAction {
        if state.is_empty() {
            self.phase = Phase::Idle;
            self.last_rendered = None;
            return SyncAction::Clear;
        }

        let source = compile_diagram_source(state);
        if self.last_rendered.as_deref() == Some(source.as_str()) {
            // Cancels any pending schedule for an intermediate state
            // the model has since moved back from.
            self.phase = Phase::Idle;
            return SyncAction::RefreshStyles;
        }

        self.phase = Phase::Scheduled {
            due: now + RENDER_DEBOUNCE,
            source,
        };
        SyncAction::Scheduled
    }

    /// Fires the scheduled render once its debounce is due.
    pub fn poll(&mut self, now: Instant) -> RenderStart {
        match &self.phase {
            Phase::Scheduled { due, source } if now >= *due => {
                let source = source.clone();
                self.next_ticket += 1;
                let ticket = self.next_ticket;
                self.phase = Phase::Rendering {
                    ticket,
                    source: source.clone(),
                };
                RenderStart::Start { ticket, source }
            }
            _ => RenderStart::Waiting,
        }
    }

    /// Applies a completed render unless a newer change superseded it.
    /// Stale completions never touch the cache or the DOM.
    pub fn render_completed(
        &mut self,
        ticket: u64,
        result: Result<String, RenderError>,
    ) -> RenderOutcome {
        let current = match &self.phase {
            Phase::Rendering { ticket: t, source } if *t == ticket => source.clone(),
            _ => return RenderOutcome::Superseded,
        };
        self.phase = Phase::Idle;
        match result {
            Ok(svg) => {
                self.last_rendered = Some(current);
                RenderOutcome::Applied { svg }
            }
            Err(err) => {
                warn!("render failed: {err:#}");
                self.last_rendered = None;
                RenderOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaState;

    fn one_entity(name: &str) -> SchemaState {
        SchemaState::new().add_entity(name, Vec::new())
    }

    #[test]
    fn empty_schema_clears() {
        let mut engine = SyncEngine::new();
        let action = engine.model_changed(&SchemaState::new(), Instant::now());
        assert_eq!(action, SyncAction::Clear);
        assert!(engine.last_rendered_source().is_none());
    }

    #[test]
    fn render_applies_and_caches_source() {
        let mut engine = SyncEngine::new();
        let state = one_entity("Car");
        let now = Instant::now();
        assert_eq!(engine.model_changed(&state, now), SyncAction::Scheduled);
        assert_eq!(engine.poll(now), RenderStart::Waiting);

        let RenderStart::Start { ticket, source } = engine.poll(now + RENDER_DEBOUNCE) else {
            panic!("render should be due");
        };
        assert!(source.contains("class Car"));

        let outcome = engine.render_completed(ticket, Ok("<svg/>".to_string()));
        assert_eq!(
            outcome,
            RenderOutcome::Applied {
                svg: "<svg/>".to_string()
            }
        );
        assert_eq!(engine.last_rendered_source(), Some(source.as_str()));
    }

    #[test]
    fn unchanged_source_skips_re_render() {
        let mut engine = SyncEngine::new();
        let state = one_entity("Car");
        let now = Instant::now();
        engine.model_changed(&state, now);
        if let RenderStart::Start { ticket, .. } = engine.poll(now + RENDER_DEBOUNCE) {
            engine.render_completed(ticket, Ok("<svg/>".to_string()));
        }
        // A cosmetic pass, like a viewport change, recompiles to the
        // same text.
        assert_eq!(engine.model_changed(&state, now), SyncAction::RefreshStyles);
    }

    #[test]
    fn overlapping_changes_coalesce_to_latest() {
        let mut engine = SyncEngine::new();
        let now = Instant::now();
        engine.model_changed(&one_entity("Car"), now);
        engine.model_changed(&one_entity("Car").add_entity("Boat", Vec::new()), now);

        let RenderStart::Start { source, .. } = engine.poll(now + RENDER_DEBOUNCE) else {
            panic!("render should be due");
        };
        assert!(source.contains("class Boat"));
        // Only one render in flight.
        assert_eq!(engine.poll(now + RENDER_DEBOUNCE), RenderStart::Waiting);
    }

    #[test]
    fn stale_render_is_discarded() {
        let mut engine = SyncEngine::new();
        let now = Instant::now();
        let s1 = one_entity("Car");
        let s2 = s1.add_entity("Boat", Vec::new());

        engine.model_changed(&s1, now);
        let RenderStart::Start { ticket: ticket1, .. } = engine.poll(now + RENDER_DEBOUNCE) else {
            panic!("first render should start");
        };

        // A newer change lands while ticket1 is in flight.
        engine.model_changed(&s2, now + RENDER_DEBOUNCE);
        let RenderStart::Start { ticket: ticket2, source: source2 } =
            engine.poll(now + RENDER_DEBOUNCE * 2)
        else {
            panic!("second render should start");
        };

        // Completions arrive out of order: newer first, stale after.
        assert_eq!(
            engine.render_completed(ticket2, Ok("<svg>s2</svg>".to_string())),
            RenderOutcome::Applied {
                svg: "<svg>s2</svg>".to_string()
            }
        );
        assert_eq!(
            engine.render_completed(ticket1, Ok("<svg>s1</svg>".to_string())),
            RenderOutcome::Superseded
        );
        assert_eq!(engine.last_rendered_source(), Some(source2.as_str()));
    }

    #[test]
    fn failure_clears_cache_and_allows_retry() {
        let mut engine = SyncEngine::new();
        let now = Instant::now();
        let state = one_entity("Car");
        engine.model_changed(&state, now);
        let RenderStart::Start { ticket, .. } = engine.poll(now + RENDER_DEBOUNCE) else {
            panic!("render should start");
        };
        assert_eq!(
            engine.render_completed(ticket, Err(RenderError::Library(anyhow::anyhow!("boom")))),
            RenderOutcome::Failed
        );
        assert!(engine.last_rendered_source().is_none());
        // The same state schedules again instead of skipping.
        assert_eq!(engine.model_changed(&state, now), SyncAction::Scheduled);
    }

    #[test]
    fn reverting_cancels_pending_schedule() {
        let mut engine = SyncEngine::new();
        let now = Instant::now();
        let s1 = one_entity("Car");
        engine.model_changed(&s1, now);
        let RenderStart::Start { ticket, .. } = engine.poll(now + RENDER_DEBOUNCE) else {
            panic!("render should start");
        };
        engine.render_completed(ticket, Ok("<svg/>".to_string()));

        let s2 = s1.add_entity("Boat", Vec::new());
        engine.model_changed(&s2, now);
        // Model reverts before the debounce fires.
        assert_eq!(engine.model_changed(&s1, now), SyncAction::RefreshStyles);
        assert_eq!(engine.poll(now + RENDER_DEBOUNCE * 4), RenderStart::Waiting);
    }
}
