// harvest-core/src/domain/governance/safety.rs

use regex::{RegexSet, RegexSetBuilder};
use serde::Serialize;
use serde_json::Value;

use super::configuration::SafetySettings;
use crate::domain::error::DomainError;

/// A forbidden pattern found in a rule payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyFinding {
    /// Location of the offending key or value (`/resources/x/selector`).
    pub path: String,
    pub pattern: String,
}

/// Scans rule payloads for dynamic-code constructs.
/// Patterns are literal, case-insensitive substrings compiled once into a set.
pub struct SafetyScanner {
    patterns: Vec<String>,
    set: Option<RegexSet>,
}

impl SafetyScanner {
    pub fn new(settings: &SafetySettings) -> Result<Self, DomainError> {
        if !settings.reject_dynamic_code || settings.forbidden_patterns.is_empty() {
            return Ok(Self {
                patterns: vec![],
                set: None,
            });
        }

        let escaped: Vec<String> = settings
            .forbidden_patterns
            .iter()
            .map(|p| regex::escape(p))
            .collect();
        let set = RegexSetBuilder::new(&escaped)
            .case_insensitive(true)
            .build()
            .map_err(|e| DomainError::SafetyConfig(e.to_string()))?;

        Ok(Self {
            patterns: settings.forbidden_patterns.clone(),
            set: Some(set),
        })
    }

    pub fn enabled(&self) -> bool {
        self.set.is_some()
    }

    /// Every key and string value of `payload` that contains a forbidden
    /// pattern, in document order.
    pub fn scan(&self, payload: &Value) -> Vec<SafetyFinding> {
        let mut findings = Vec::new();
        if let Some(set) = &self.set {
            self.walk(set, payload, String::new(), &mut findings);
        }
        findings
    }

    fn check(&self, set: &RegexSet, text: &str, path: &str, findings: &mut Vec<SafetyFinding>) {
        for index in set.matches(text).iter() {
            findings.push(SafetyFinding {
                path: path.to_string(),
                pattern: self.patterns[index].clone(),
            });
        }
    }

    fn walk(&self, set: &RegexSet, value: &Value, path: String, findings: &mut Vec<SafetyFinding>) {
        match value {
            Value::String(s) => self.check(set, s, &path, findings),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.walk(set, item, format!("{path}/{i}"), findings);
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    let child = format!("{path}/{key}");
                    self.check(set, key, &child, findings);
                    self.walk(set, item, child, findings);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }
}
