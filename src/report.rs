//! Observability hook for rule evaluation and action resolution.
//!
//! The engine never logs directly; it hands events to a [`Reporter`] so that
//! evaluation stays a pure function of its inputs and tests can assert on
//! exactly what was reported.

use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::rules::{Action, ResolveError};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A condition could not be evaluated. In ALL mode the rule stops; in
    /// ANY mode the condition is skipped.
    UnresolvedCondition {
        rule: usize,
        condition: usize,
        error: ResolveError,
    },
    /// A rule matched and contributed its actions.
    RuleFired { rule: usize, actions: usize },
    /// An action was dropped because the labels already satisfy it.
    ActionSatisfied { action: Action },
}

pub trait Reporter: Send + Sync {
    fn report(&self, event: EngineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: EngineEvent) {
        match event {
            EngineEvent::UnresolvedCondition {
                rule,
                condition,
                error,
            } => warn!(rule, condition, error = %error, "Condition could not be evaluated"),
            EngineEvent::RuleFired { rule, actions } => {
                debug!(rule, actions, "Rule matched")
            }
            EngineEvent::ActionSatisfied { action } => {
                info!(action = %action, "Skipping action, labels already satisfy it")
            }
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<EngineEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, event: EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
