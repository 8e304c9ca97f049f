//! Turns requested actions into the smallest label change that realizes them.

use super::Action;
use crate::models::UNREAD;
use crate::report::{EngineEvent, Reporter};

/// Labels to add and remove on one message.
///
/// Both lists are duplicate-free, disjoint, and only contain changes that
/// would alter the labels they were resolved against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelDelta {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl LabelDelta {
    /// No mutation is needed; the remote call must be skipped.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Apply the delta to a local label list, keeping existing order.
    pub fn apply_to(&self, labels: &mut Vec<String>) {
        labels.retain(|label| !self.remove.contains(label));
        for label in &self.add {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
    }

    fn push_add(&mut self, label: &str) {
        if !self.add.iter().any(|l| l == label) {
            self.add.push(label.to_string());
        }
    }

    fn push_remove(&mut self, label: &str) {
        if !self.remove.iter().any(|l| l == label) {
            self.remove.push(label.to_string());
        }
    }
}

/// Resolve `actions` against the message's current labels.
pub fn resolve_actions(
    actions: &[Action],
    current_labels: &[String],
    reporter: &dyn Reporter,
) -> LabelDelta {
    let has = |label: &str| current_labels.iter().any(|l| l == label);
    let mut delta = LabelDelta::default();

    for action in actions {
        let applies = match action {
            Action::MoveMessage { mailbox } => {
                let needed = !has(mailbox);
                if needed {
                    delta.push_add(mailbox);
                }
                needed
            }
            Action::MarkRead => {
                let needed = has(UNREAD);
                if needed {
                    delta.push_remove(UNREAD);
                }
                needed
            }
            Action::MarkUnread => {
                let needed = !has(UNREAD);
                if needed {
                    delta.push_add(UNREAD);
                }
                needed
            }
        };

        if !applies {
            reporter.report(EngineEvent::ActionSatisfied {
                action: action.clone(),
            });
        }
    }

    delta
}
