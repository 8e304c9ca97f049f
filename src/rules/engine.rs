use std::path::Path;

use chrono::{DateTime, Utc};

use super::{Action, Condition, Mode, Predicate, ResolveError, Rule, load_rules, resolve_field};
use crate::models::EmailRecord;
use crate::report::{EngineEvent, Reporter};

/// Evaluates an ordered rule set against messages.
///
/// Holds no state beyond the rules; `evaluate` is a pure function of the
/// record, the rules and `now`.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Load rules from `path`. A missing or invalid file gives an engine
    /// that never produces actions.
    pub fn from_file(path: &Path) -> Self {
        Self::new(load_rules(path))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Collect the actions of every rule that fires, in rule order and then
    /// per-rule action order. Duplicates are kept.
    pub fn evaluate(
        &self,
        record: &EmailRecord,
        now: DateTime<Utc>,
        reporter: &dyn Reporter,
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            if rule_fires(index, rule, record, now, reporter) {
                reporter.report(EngineEvent::RuleFired {
                    rule: index,
                    actions: rule.actions.len(),
                });
                actions.extend(rule.actions.iter().cloned());
            }
        }
        actions
    }
}

fn condition_holds(
    condition: &Condition,
    record: &EmailRecord,
    now: DateTime<Utc>,
) -> Result<bool, ResolveError> {
    let value = resolve_field(record, &condition.field, now)?;
    let predicate: Predicate = condition.predicate.parse()?;
    predicate.apply(value, &condition.value)
}

fn rule_fires(
    index: usize,
    rule: &Rule,
    record: &EmailRecord,
    now: DateTime<Utc>,
    reporter: &dyn Reporter,
) -> bool {
    let unresolved = |condition: usize, error: ResolveError| {
        reporter.report(EngineEvent::UnresolvedCondition {
            rule: index,
            condition,
            error,
        })
    };

    match rule.mode {
        Mode::All => {
            for (position, condition) in rule.conditions.iter().enumerate() {
                match condition_holds(condition, record, now) {
                    Ok(true) => {}
                    Ok(false) => return false,
                    Err(error) => {
                        unresolved(position, error);
                        return false;
                    }
                }
            }
            true
        }
        // Unresolvable conditions are skipped here rather than counted as false.
        Mode::Any => {
            for (position, condition) in rule.conditions.iter().enumerate() {
                match condition_holds(condition, record, now) {
                    Ok(true) => return true,
                    Ok(false) => {}
                    Err(error) => unresolved(position, error),
                }
            }
            false
        }
    }
}
