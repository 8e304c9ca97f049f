use std::fmt;
use std::str::FromStr;

use chrono::Duration;

use super::field::FieldValue;
use super::{ConditionValue, ResolveError};

/// The fixed set of comparisons a condition can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Contains,
    DoesNotContain,
    Equals,
    DoesNotEqual,
    LessThanDays,
    GreaterThanDays,
}

impl Predicate {
    pub const ALL: [Predicate; 6] = [
        Self::Contains,
        Self::DoesNotContain,
        Self::Equals,
        Self::DoesNotEqual,
        Self::LessThanDays,
        Self::GreaterThanDays,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::DoesNotContain => "does_not_contain",
            Self::Equals => "equals",
            Self::DoesNotEqual => "does_not_equal",
            Self::LessThanDays => "less_than_days",
            Self::GreaterThanDays => "greater_than_days",
        }
    }

    /// Compare a resolved field against the condition's operand.
    pub fn apply(self, value: FieldValue<'_>, target: &ConditionValue) -> Result<bool, ResolveError> {
        match (self, value) {
            (Self::Contains, FieldValue::Text(text)) => {
                let target = self.text_operand(target)?;
                Ok(!text.is_empty() && text.contains(target))
            }
            (Self::DoesNotContain, FieldValue::Text(text)) => {
                let target = self.text_operand(target)?;
                Ok(text.is_empty() || !text.contains(target))
            }
            (Self::Equals, FieldValue::Text(text)) => Ok(text == self.text_operand(target)?),
            (Self::DoesNotEqual, FieldValue::Text(text)) => Ok(text != self.text_operand(target)?),
            (Self::LessThanDays, FieldValue::Age(age)) => Ok(age < self.days_operand(target)?),
            (Self::GreaterThanDays, FieldValue::Age(age)) => Ok(age > self.days_operand(target)?),
            (_, FieldValue::Text(_)) => Err(self.mismatch("a text field")),
            (_, FieldValue::Age(_)) => Err(self.mismatch("a date field")),
        }
    }

    /// Non-text operands are a mismatch for every text predicate, including
    /// `does_not_equal`, so `5` never silently differs from a subject.
    fn text_operand(self, target: &ConditionValue) -> Result<&str, ResolveError> {
        match target {
            ConditionValue::Text(s) => Ok(s),
            other => Err(self.mismatch(&format!("against {other}"))),
        }
    }

    fn days_operand(self, target: &ConditionValue) -> Result<Duration, ResolveError> {
        let days = match target {
            ConditionValue::Integer(n) => Some(*n),
            ConditionValue::Text(s) => s.trim().parse::<i64>().ok(),
            ConditionValue::Other(_) => None,
        };
        days.and_then(Duration::try_days)
            .ok_or_else(|| self.mismatch(&format!("against {target}")))
    }

    fn mismatch(self, found: &str) -> ResolveError {
        ResolveError::ValueMismatch {
            predicate: self,
            found: found.to_string(),
        }
    }
}

impl FromStr for Predicate {
    type Err = ResolveError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| ResolveError::UnknownPredicate(name.to_string()))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(p: Predicate, value: &str, target: &str) -> bool {
        p.apply(FieldValue::Text(value), &ConditionValue::from(target)).unwrap()
    }

    fn age(p: Predicate, hours: i64, days: impl Into<ConditionValue>) -> bool {
        p.apply(FieldValue::Age(Duration::hours(hours)), &days.into()).unwrap()
    }

    #[test]
    fn names_round_trip() {
        for p in Predicate::ALL {
            assert_eq!(p.name().parse::<Predicate>(), Ok(p));
        }
        assert_eq!(
            "matches".parse::<Predicate>(),
            Err(ResolveError::UnknownPredicate("matches".into()))
        );
    }

    #[test]
    fn contains_never_matches_empty_value() {
        assert!(text(Predicate::Contains, "weekly newsletter", "newsletter"));
        assert!(!text(Predicate::Contains, "weekly digest", "newsletter"));
        assert!(!text(Predicate::Contains, "", ""));
    }

    #[test]
    fn does_not_contain_is_vacuous_on_empty_value() {
        assert!(text(Predicate::DoesNotContain, "", "anything"));
        assert!(text(Predicate::DoesNotContain, "hello", "bye"));
        assert!(!text(Predicate::DoesNotContain, "hello", "ell"));
    }

    #[test]
    fn equality_is_exact() {
        assert!(text(Predicate::Equals, "Exact Match", "Exact Match"));
        assert!(!text(Predicate::Equals, "Exact Match", "exact match"));
        assert!(text(Predicate::DoesNotEqual, "Exact Match", "Exact Match!"));
        assert!(!text(Predicate::DoesNotEqual, "", ""));
    }

    #[test]
    fn day_comparisons_are_strict() {
        assert!(age(Predicate::LessThanDays, 47, 2));
        assert!(!age(Predicate::LessThanDays, 48, 2));
        assert!(age(Predicate::GreaterThanDays, 49, 2));
        assert!(!age(Predicate::GreaterThanDays, 48, 2));
    }

    #[test]
    fn days_accept_numeric_strings() {
        assert!(age(Predicate::LessThanDays, 1, "7"));
        assert!(age(Predicate::GreaterThanDays, 24 * 10, " 7 "));
    }

    #[test]
    fn mismatched_operands_fail() {
        let days = Predicate::LessThanDays.apply(FieldValue::Text("x"), &ConditionValue::Integer(1));
        assert!(matches!(days, Err(ResolveError::ValueMismatch { .. })));

        let contains = Predicate::Contains.apply(
            FieldValue::Age(Duration::hours(1)),
            &ConditionValue::from("x"),
        );
        assert!(matches!(contains, Err(ResolveError::ValueMismatch { .. })));

        let not_a_number =
            Predicate::GreaterThanDays.apply(FieldValue::Age(Duration::hours(1)), &"week".into());
        assert!(matches!(not_a_number, Err(ResolveError::ValueMismatch { .. })));

        let numeric_text = Predicate::Equals.apply(FieldValue::Text("5"), &ConditionValue::Integer(5));
        assert!(matches!(numeric_text, Err(ResolveError::ValueMismatch { .. })));

        let numeric_differs =
            Predicate::DoesNotEqual.apply(FieldValue::Text("Hello"), &ConditionValue::Integer(5));
        assert!(matches!(numeric_differs, Err(ResolveError::ValueMismatch { .. })));
    }
}
