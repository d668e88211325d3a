//! Value-to-color classification
//!
//! Rules are grouped by condition and checked in a fixed order:
//! equal-to rules in their given order, then greater-than rules from the
//! highest threshold down, then less-than rules from the lowest threshold
//! up. The first satisfied rule wins, so a value lands in the closest
//! bracket it satisfies.

use crate::rules::{ColorRule, Condition};
use crate::types::Color;

/// Pick the display color for `value` under `rules`
pub fn classify(value: Option<f64>, rules: &[ColorRule]) -> Color {
    let Some(value) = value else {
        return Color::neutral();
    };

    matching_rule(value, rules)
        .map(|rule| rule.color.clone())
        .unwrap_or_default()
}

/// The rule that decides the color for `value`, if any
pub fn matching_rule(value: f64, rules: &[ColorRule]) -> Option<&ColorRule> {
    let by_condition = |condition: Condition| rules.iter().filter(move |r| r.condition == condition);

    if let Some(rule) = by_condition(Condition::EqualTo).find(|r| value == r.value) {
        return Some(rule);
    }

    // Stable sorts keep insertion order among equal thresholds
    let mut greater: Vec<&ColorRule> = by_condition(Condition::GreaterThan).collect();
    greater.sort_by(|a, b| b.value.total_cmp(&a.value));
    if let Some(rule) = greater.into_iter().find(|r| value > r.value) {
        return Some(rule);
    }

    let mut less: Vec<&ColorRule> = by_condition(Condition::LessThan).collect();
    less.sort_by(|a, b| a.value.total_cmp(&b.value));
    less.into_iter().find(|r| value < r.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_COLOR;

    fn rule(condition: Condition, value: f64, color: &str) -> ColorRule {
        ColorRule::new(condition, value, color)
    }

    #[test]
    fn test_absent_value_or_no_rules() {
        let rules = vec![rule(Condition::GreaterThan, 0.0, "a")];
        assert_eq!(classify(None, &rules).as_str(), DEFAULT_COLOR);
        assert_eq!(classify(Some(5.0), &[]).as_str(), DEFAULT_COLOR);
    }

    #[test]
    fn test_greater_than_picks_highest_satisfied() {
        let rules = vec![
            rule(Condition::GreaterThan, 1.0, "a"),
            rule(Condition::GreaterThan, 3.0, "b"),
        ];
        assert_eq!(classify(Some(5.0), &rules).as_str(), "b");
        assert_eq!(classify(Some(2.0), &rules).as_str(), "a");
        assert_eq!(classify(Some(1.0), &rules).as_str(), DEFAULT_COLOR);
    }

    #[test]
    fn test_less_than_picks_lowest_satisfied() {
        let rules = vec![
            rule(Condition::LessThan, 1.0, "a"),
            rule(Condition::LessThan, -1.0, "b"),
        ];
        assert_eq!(classify(Some(-5.0), &rules).as_str(), "b");
        assert_eq!(classify(Some(0.0), &rules).as_str(), "a");
        assert_eq!(classify(Some(1.0), &rules).as_str(), DEFAULT_COLOR);
    }

    #[test]
    fn test_equal_to_takes_precedence() {
        let rules = vec![
            rule(Condition::GreaterThan, 0.0, "gt"),
            rule(Condition::LessThan, 100.0, "lt"),
            rule(Condition::EqualTo, 10.0, "eq"),
        ];
        assert_eq!(classify(Some(10.0), &rules).as_str(), "eq");
        assert_eq!(classify(Some(10.5), &rules).as_str(), "gt");
    }

    #[test]
    fn test_greater_than_before_less_than() {
        let rules = vec![
            rule(Condition::LessThan, 20.0, "cold"),
            rule(Condition::GreaterThan, 5.0, "warm"),
        ];
        assert_eq!(classify(Some(10.0), &rules).as_str(), "warm");
        assert_eq!(classify(Some(2.0), &rules).as_str(), "cold");
    }

    #[test]
    fn test_equal_rules_in_given_order() {
        let rules = vec![
            rule(Condition::EqualTo, 3.0, "first"),
            rule(Condition::EqualTo, 3.0, "second"),
        ];
        assert_eq!(classify(Some(3.0), &rules).as_str(), "first");
    }

    #[test]
    fn test_tied_thresholds_keep_insertion_order() {
        let rules = vec![
            rule(Condition::GreaterThan, 3.0, "first"),
            rule(Condition::GreaterThan, 3.0, "second"),
        ];
        assert_eq!(classify(Some(4.0), &rules).as_str(), "first");
    }

    #[test]
    fn test_nan_threshold_never_matches() {
        let rules = vec![
            rule(Condition::GreaterThan, f64::NAN, "nan"),
            rule(Condition::GreaterThan, 0.0, "zero"),
        ];
        assert_eq!(classify(Some(1.0), &rules).as_str(), "zero");
    }

    #[test]
    fn test_deterministic() {
        let rules = vec![
            rule(Condition::GreaterThan, 10.0, "a"),
            rule(Condition::LessThan, 0.0, "b"),
            rule(Condition::EqualTo, 5.0, "c"),
        ];
        for v in [-3.0, 0.0, 5.0, 7.5, 12.0] {
            assert_eq!(classify(Some(v), &rules), classify(Some(v), &rules));
        }
    }
}
