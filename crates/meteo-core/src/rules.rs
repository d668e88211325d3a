//! Threshold-based color rules and rule-set editing

use crate::types::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule identifier, unique within one polygon's rule set
pub type RuleId = String;

/// Comparison applied between a value and a rule's threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "eq")]
    EqualTo,
}

impl Condition {
    pub fn matches(self, value: f64, threshold: f64) -> bool {
        match self {
            Condition::GreaterThan => value > threshold,
            Condition::LessThan => value < threshold,
            Condition::EqualTo => value == threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Condition::GreaterThan => "gt",
            Condition::LessThan => "lt",
            Condition::EqualTo => "eq",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Condition::GreaterThan => ">",
            Condition::LessThan => "<",
            Condition::EqualTo => "=",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Condition {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" | ">" => Ok(Condition::GreaterThan),
            "lt" | "<" => Ok(Condition::LessThan),
            "eq" | "=" | "==" => Ok(Condition::EqualTo),
            other => Err(RuleError::UnknownCondition(other.to_string())),
        }
    }
}

/// Rule editing error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    #[error("Unknown rule: {0}")]
    UnknownRule(RuleId),

    #[error("Duplicate rule id: {0}")]
    DuplicateRule(RuleId),

    #[error("Unknown condition: {0}")]
    UnknownCondition(String),
}

/// Maps values satisfying `condition` against `value` to `color`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRule {
    pub id: RuleId,
    pub condition: Condition,
    pub value: f64,
    pub color: Color,
}

impl ColorRule {
    /// New rule with a fresh identifier
    pub fn new(condition: Condition, value: f64, color: impl Into<Color>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            condition,
            value,
            color: color.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<RuleId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn apply(&mut self, update: RuleUpdate) {
        match update {
            RuleUpdate::Condition(condition) => self.condition = condition,
            RuleUpdate::Value(value) => self.value = value,
            RuleUpdate::Color(color) => self.color = color,
        }
    }
}

impl Default for ColorRule {
    /// The rule a user starts from when adding one: `< 0` in blue
    fn default() -> Self {
        Self::new(Condition::LessThan, 0.0, "#0000ff")
    }
}

/// Single-field change to an existing rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "lowercase")]
pub enum RuleUpdate {
    Condition(Condition),
    Value(f64),
    Color(Color),
}

/// Check that no two rules share an id
pub fn validate_rules(rules: &[ColorRule]) -> Result<(), RuleError> {
    let mut seen = std::collections::HashSet::with_capacity(rules.len());
    for rule in rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(RuleError::DuplicateRule(rule.id.clone()));
        }
    }
    Ok(())
}

/// Rule set with `rule` appended
pub fn with_rule_added(rules: &[ColorRule], rule: ColorRule) -> Result<Vec<ColorRule>, RuleError> {
    if rules.iter().any(|r| r.id == rule.id) {
        return Err(RuleError::DuplicateRule(rule.id));
    }
    let mut next = rules.to_vec();
    next.push(rule);
    Ok(next)
}

/// Rule set with `update` applied to the rule named `id`
pub fn with_rule_updated(
    rules: &[ColorRule],
    id: &str,
    update: RuleUpdate,
) -> Result<Vec<ColorRule>, RuleError> {
    let mut next = rules.to_vec();
    let rule = next
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| RuleError::UnknownRule(id.to_string()))?;
    rule.apply(update);
    Ok(next)
}

/// Rule set without the rule named `id`
pub fn with_rule_removed(rules: &[ColorRule], id: &str) -> Result<Vec<ColorRule>, RuleError> {
    if !rules.iter().any(|r| r.id == id) {
        return Err(RuleError::UnknownRule(id.to_string()));
    }
    Ok(rules.iter().filter(|r| r.id != id).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_parsing() {
        assert_eq!("gt".parse::<Condition>().unwrap(), Condition::GreaterThan);
        assert_eq!("<".parse::<Condition>().unwrap(), Condition::LessThan);
        assert_eq!("eq".parse::<Condition>().unwrap(), Condition::EqualTo);
        assert!("gte".parse::<Condition>().is_err());
    }

    #[test]
    fn test_rule_wire_format() {
        let rule = ColorRule::new(Condition::GreaterThan, 30.0, "#ff0000").with_id("r1");
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "r1", "condition": "gt", "value": 30.0, "color": "#ff0000"})
        );
    }

    #[test]
    fn test_default_rule() {
        let rule = ColorRule::default();
        assert_eq!(rule.condition, Condition::LessThan);
        assert_eq!(rule.value, 0.0);
        assert_eq!(rule.color.as_str(), "#0000ff");
        assert_ne!(ColorRule::default().id, rule.id);
    }

    #[test]
    fn test_rule_editing() {
        let rules = with_rule_added(&[], ColorRule::default().with_id("a")).unwrap();
        let rules = with_rule_added(&rules, ColorRule::default().with_id("b")).unwrap();
        assert!(matches!(
            with_rule_added(&rules, ColorRule::default().with_id("a")),
            Err(RuleError::DuplicateRule(_))
        ));

        let rules = with_rule_updated(&rules, "b", RuleUpdate::Value(12.5)).unwrap();
        let rules =
            with_rule_updated(&rules, "b", RuleUpdate::Condition(Condition::EqualTo)).unwrap();
        assert_eq!(rules[1].value, 12.5);
        assert_eq!(rules[1].condition, Condition::EqualTo);
        assert_eq!(rules[0].value, 0.0);

        let rules = with_rule_removed(&rules, "a").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "b");

        assert_eq!(
            with_rule_removed(&rules, "a"),
            Err(RuleError::UnknownRule("a".to_string()))
        );
    }

    #[test]
    fn test_validate_rules_rejects_shared_ids() {
        let distinct = vec![
            ColorRule::new(Condition::GreaterThan, 1.0, "#aa0000").with_id("a"),
            ColorRule::new(Condition::LessThan, 1.0, "#0000aa").with_id("b"),
        ];
        assert_eq!(validate_rules(&distinct), Ok(()));
        assert_eq!(validate_rules(&[]), Ok(()));

        let shared = vec![
            ColorRule::new(Condition::GreaterThan, 1.0, "#aa0000").with_id("r"),
            ColorRule::new(Condition::LessThan, 1.0, "#0000aa").with_id("r"),
        ];
        assert_eq!(
            validate_rules(&shared),
            Err(RuleError::DuplicateRule("r".to_string()))
        );
    }

    #[test]
    fn test_rule_update_wire_format() {
        let update: RuleUpdate =
            serde_json::from_str(r##"{"field":"color","value":"#00ff00"}"##).unwrap();
        assert_eq!(update, RuleUpdate::Color(Color::new("#00ff00")));

        let update: RuleUpdate =
            serde_json::from_str(r#"{"field":"condition","value":"lt"}"#).unwrap();
        assert_eq!(update, RuleUpdate::Condition(Condition::LessThan));
    }
}
