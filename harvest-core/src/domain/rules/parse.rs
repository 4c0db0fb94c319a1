// harvest-core/src/domain/rules/parse.rs

// Structural validation of the JSON wire format. Every problem is collected
// with a path into the payload; nothing stops at the first error.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::document::{
    FieldRule, QualityGate, RULESET_VERSION, ResourceKind, ResourceRule, ResourceShape,
    RuleDocument, TransformStep, split_key,
};
use crate::domain::error::{ValidationError, ValidationIssue};
use crate::domain::transform::TransformRegistry;

const TOP_LEVEL_KEYS: [&str; 5] = [
    "version",
    "resources",
    "mapping",
    "quality_gates",
    "transforms",
];
const RESOURCE_KEYS: [&str; 6] = [
    "kind",
    "selector",
    "extends",
    "item_selector",
    "fields",
    "columns",
];

impl RuleDocument {
    /// Parses and validates a JSON rule document against the built-in transforms.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        Self::parse_with_registry(raw, &TransformRegistry::builtin())
    }

    pub fn parse_with_registry(
        raw: &str,
        registry: &TransformRegistry,
    ) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ValidationError::single("", format!("invalid JSON: {e}")))?;
        Self::from_value_with_registry(value, registry)
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        Self::from_value_with_registry(value, &TransformRegistry::builtin())
    }

    pub fn from_value_with_registry(
        value: Value,
        registry: &TransformRegistry,
    ) -> Result<Self, ValidationError> {
        let mut validator = Validator::new(registry);
        let document = validator.document(&value);

        match document {
            Some(document) if validator.issues.is_empty() => Ok(document),
            _ => {
                debug!(issues = validator.issues.len(), "Rule document rejected");
                Err(ValidationError {
                    issues: validator.issues,
                })
            }
        }
    }
}

/// A resource as written, before `extends` is resolved.
#[derive(Debug, Default)]
struct DraftResource {
    kind: Option<ResourceKind>,
    selector: Option<String>,
    extends: Option<String>,
    item_selector: Option<String>,
    fields: Option<IndexMap<String, FieldRule>>,
    columns: Option<Vec<String>>,
}

struct Validator<'r> {
    registry: &'r TransformRegistry,
    issues: Vec<ValidationIssue>,
    /// Resources already reported; references to them are not reported again.
    broken: HashSet<String>,
}

impl<'r> Validator<'r> {
    fn new(registry: &'r TransformRegistry) -> Self {
        Self {
            registry,
            issues: Vec::new(),
            broken: HashSet::new(),
        }
    }

    fn issue(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::new(path, message));
    }

    fn document(&mut self, value: &Value) -> Option<RuleDocument> {
        let Some(root) = value.as_object() else {
            self.issue("", "rule document must be a JSON object");
            return None;
        };

        for key in root.keys() {
            if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
                self.issue(format!("/{key}"), "unknown top-level key");
            }
        }

        let version = self.version(root.get("version"));
        let resources = match root.get("resources") {
            Some(value) => self.resources(value),
            None => {
                self.issue("/resources", "missing required key");
                IndexMap::new()
            }
        };
        let mapping = match root.get("mapping") {
            Some(value) => self.mapping(value, &resources),
            None => IndexMap::new(),
        };
        let quality_gates = match root.get("quality_gates") {
            Some(value) => self.quality_gates(value, &resources),
            None => IndexMap::new(),
        };
        let transforms = match root.get("transforms") {
            None => Map::new(),
            Some(Value::Object(hints)) => hints.clone(),
            Some(_) => {
                self.issue("/transforms", "must be an object");
                Map::new()
            }
        };

        Some(RuleDocument {
            version,
            resources,
            mapping,
            quality_gates,
            transforms,
        })
    }

    fn version(&mut self, value: Option<&Value>) -> u32 {
        match value {
            None => RULESET_VERSION,
            Some(v) if v.as_u64() == Some(u64::from(RULESET_VERSION)) => RULESET_VERSION,
            Some(v) => {
                self.issue(
                    "/version",
                    format!("unsupported version {v} (expected {RULESET_VERSION})"),
                );
                RULESET_VERSION
            }
        }
    }

    // --- RESOURCES ---

    fn resources(&mut self, value: &Value) -> IndexMap<String, ResourceRule> {
        let Some(raw) = value.as_object() else {
            self.issue("/resources", "must be an object keyed by resource name");
            return IndexMap::new();
        };
        if raw.is_empty() {
            self.issue("/resources", "at least one resource is required");
        }

        let mut drafts = IndexMap::new();
        for (name, body) in raw {
            let path = format!("/resources/{name}");
            if name.trim().is_empty() {
                self.issue(path, "resource name must not be empty");
                continue;
            }
            if name.contains('.') {
                self.issue(path, "resource name must not contain '.'");
                self.broken.insert(name.clone());
                continue;
            }
            match self.draft(&path, body) {
                Some(draft) => {
                    drafts.insert(name.clone(), draft);
                }
                None => {
                    self.broken.insert(name.clone());
                }
            }
        }

        let mut resolved: HashMap<String, Option<ResourceRule>> = HashMap::new();
        let mut resources = IndexMap::new();
        for name in drafts.keys() {
            let mut stack = Vec::new();
            if let Some(rule) = self.resolve(name, &drafts, &mut resolved, &mut stack) {
                resources.insert(name.clone(), rule);
            }
        }
        resources
    }

    /// Reads one resource body. Returns `None` if anything in it was reported.
    fn draft(&mut self, path: &str, body: &Value) -> Option<DraftResource> {
        let Some(obj) = body.as_object() else {
            self.issue(path, "resource must be an object");
            return None;
        };
        let before = self.issues.len();
        let mut draft = DraftResource::default();

        for key in obj.keys() {
            if !RESOURCE_KEYS.contains(&key.as_str()) {
                self.issue(format!("{path}/{key}"), "unknown resource key");
            }
        }

        if let Some(kind) = obj.get("kind") {
            match kind.as_str().and_then(ResourceKind::from_name) {
                Some(k) => draft.kind = Some(k),
                None => self.issue(
                    format!("{path}/kind"),
                    format!("unknown resource kind {kind} (expected 'list' or 'table')"),
                ),
            }
        }
        draft.selector = self.optional_selector(&format!("{path}/selector"), obj.get("selector"));
        draft.item_selector =
            self.optional_selector(&format!("{path}/item_selector"), obj.get("item_selector"));

        if let Some(parent) = obj.get("extends") {
            match parent.as_str().filter(|p| !p.trim().is_empty()) {
                Some(p) => draft.extends = Some(p.to_string()),
                None => self.issue(
                    format!("{path}/extends"),
                    "must name another resource",
                ),
            }
        }
        if let Some(fields) = obj.get("fields") {
            draft.fields = Some(self.fields(&format!("{path}/fields"), fields));
        }
        if let Some(columns) = obj.get("columns") {
            draft.columns = Some(self.columns(&format!("{path}/columns"), columns));
        }

        (self.issues.len() == before).then_some(draft)
    }

    fn optional_selector(&mut self, path: &str, value: Option<&Value>) -> Option<String> {
        let value = value?;
        match value.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            _ => {
                self.issue(path, "selector must be a non-empty string");
                None
            }
        }
    }

    fn fields(&mut self, path: &str, value: &Value) -> IndexMap<String, FieldRule> {
        let mut fields = IndexMap::new();
        let Some(obj) = value.as_object() else {
            self.issue(path, "must be an object keyed by field name");
            return fields;
        };
        if obj.is_empty() {
            self.issue(path, "must declare at least one field");
        }
        for (name, spec) in obj {
            let field_path = format!("{path}/{name}");
            if name.trim().is_empty() {
                self.issue(field_path, "field name must not be empty");
                continue;
            }
            if let Some(rule) = self.field(&field_path, spec) {
                fields.insert(name.clone(), rule);
            }
        }
        fields
    }

    fn field(&mut self, path: &str, spec: &Value) -> Option<FieldRule> {
        match spec {
            Value::String(_) => self
                .optional_selector(path, Some(spec))
                .map(FieldRule::new),
            Value::Object(obj) => {
                for key in obj.keys() {
                    if key != "selector" && key != "transforms" {
                        self.issue(format!("{path}/{key}"), "unknown field key");
                    }
                }
                let selector = match obj.get("selector") {
                    Some(s) => self.optional_selector(&format!("{path}/selector"), Some(s)),
                    None => {
                        self.issue(format!("{path}/selector"), "missing required key");
                        None
                    }
                };
                let transforms = match obj.get("transforms") {
                    Some(chain) => self.chain(&format!("{path}/transforms"), chain),
                    None => Vec::new(),
                };
                selector.map(|selector| FieldRule {
                    selector,
                    transforms,
                })
            }
            _ => {
                self.issue(path, "field must be a selector string or an object");
                None
            }
        }
    }

    fn chain(&mut self, path: &str, value: &Value) -> Vec<TransformStep> {
        let Some(steps) = value.as_array() else {
            self.issue(path, "must be an array of transform steps");
            return Vec::new();
        };
        steps
            .iter()
            .enumerate()
            .filter_map(|(i, step)| self.step(&format!("{path}/{i}"), step))
            .collect()
    }

    fn step(&mut self, path: &str, value: &Value) -> Option<TransformStep> {
        let step = match value {
            Value::String(op) => TransformStep::new(op.clone()),
            Value::Object(obj) => {
                for key in obj.keys() {
                    if key != "operation" && key != "config" {
                        self.issue(format!("{path}/{key}"), "unknown transform step key");
                    }
                }
                let Some(op) = obj.get("operation").and_then(Value::as_str) else {
                    self.issue(
                        format!("{path}/operation"),
                        "missing or non-string operation name",
                    );
                    return None;
                };
                let config = match obj.get("config") {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(config)) => config.clone(),
                    Some(_) => {
                        self.issue(format!("{path}/config"), "must be an object");
                        return None;
                    }
                };
                TransformStep::with_config(op, config)
            }
            _ => {
                self.issue(path, "transform step must be a name or an object");
                return None;
            }
        };

        let registry = self.registry;
        let Some(operation) = registry.get(&step.operation) else {
            self.issue(
                format!("{path}/operation"),
                format!("unknown transform operation '{}'", step.operation),
            );
            return None;
        };
        if let Err(message) = operation.validate_config(&step.config) {
            self.issue(format!("{path}/config"), message);
            return None;
        }
        Some(step)
    }

    fn columns(&mut self, path: &str, value: &Value) -> Vec<String> {
        let Some(items) = value.as_array() else {
            self.issue(path, "must be an array of column names");
            return Vec::new();
        };
        if items.is_empty() {
            self.issue(path, "must declare at least one column");
        }
        let mut columns: Vec<String> = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_str().map(str::trim) {
                Some(name) if !name.is_empty() => {
                    if columns.iter().any(|c| c == name) {
                        self.issue(format!("{path}/{i}"), format!("duplicate column '{name}'"));
                    } else {
                        columns.push(name.to_string());
                    }
                }
                _ => self.issue(format!("{path}/{i}"), "column name must be a non-empty string"),
            }
        }
        columns
    }

    // --- INHERITANCE ---

    fn resolve(
        &mut self,
        name: &str,
        drafts: &IndexMap<String, DraftResource>,
        resolved: &mut HashMap<String, Option<ResourceRule>>,
        stack: &mut Vec<String>,
    ) -> Option<ResourceRule> {
        if let Some(done) = resolved.get(name) {
            return done.clone();
        }
        let draft = drafts.get(name)?;
        let path = format!("/resources/{name}");

        let rule = match &draft.extends {
            None => self.finish(name, &path, draft, None),
            Some(parent) if parent == name || stack.iter().any(|s| s == parent) => {
                self.issue(
                    format!("{path}/extends"),
                    format!("inheritance cycle through '{parent}'"),
                );
                None
            }
            Some(parent) if !drafts.contains_key(parent) => {
                if !self.broken.contains(parent) {
                    self.issue(
                        format!("{path}/extends"),
                        format!("extends undeclared resource '{parent}'"),
                    );
                }
                None
            }
            Some(parent) => {
                stack.push(name.to_string());
                let base = self.resolve(parent, drafts, resolved, stack);
                stack.pop();
                // A broken parent has already been reported.
                base.and_then(|base| self.finish(name, &path, draft, Some(&base)))
            }
        };

        if rule.is_none() {
            self.broken.insert(name.to_string());
        }
        resolved.insert(name.to_string(), rule.clone());
        rule
    }

    /// Merges a draft over its (already resolved) parent and checks the result.
    fn finish(
        &mut self,
        name: &str,
        path: &str,
        draft: &DraftResource,
        parent: Option<&ResourceRule>,
    ) -> Option<ResourceRule> {
        let kind = match (draft.kind, parent) {
            (Some(kind), Some(base)) if kind != base.kind() => {
                self.issue(
                    format!("{path}/kind"),
                    format!(
                        "kind '{kind}' does not match '{}' of parent '{}'",
                        base.kind(),
                        base.name
                    ),
                );
                return None;
            }
            (Some(kind), _) => kind,
            (None, Some(base)) => base.kind(),
            (None, None) => ResourceKind::List,
        };

        let Some(selector) = draft
            .selector
            .clone()
            .or_else(|| parent.map(|p| p.selector.clone()))
        else {
            self.issue(format!("{path}/selector"), "missing required key");
            return None;
        };

        let shape = match kind {
            ResourceKind::List => {
                if draft.columns.is_some() {
                    self.issue(
                        format!("{path}/columns"),
                        "'columns' only applies to table resources",
                    );
                    return None;
                }
                let (mut item_selector, mut fields) = match parent.map(|p| &p.shape) {
                    Some(ResourceShape::List {
                        item_selector,
                        fields,
                    }) => (item_selector.clone(), fields.clone()),
                    _ => (None, IndexMap::new()),
                };
                if draft.item_selector.is_some() {
                    item_selector.clone_from(&draft.item_selector);
                }
                if let Some(own) = &draft.fields {
                    for (field, rule) in own {
                        fields.insert(field.clone(), rule.clone());
                    }
                }
                if fields.is_empty() {
                    self.issue(
                        format!("{path}/fields"),
                        "list resource must declare at least one field",
                    );
                    return None;
                }
                ResourceShape::List {
                    item_selector,
                    fields,
                }
            }
            ResourceKind::Table => {
                if draft.fields.is_some() || draft.item_selector.is_some() {
                    self.issue(
                        path,
                        "'fields' and 'item_selector' only apply to list resources",
                    );
                    return None;
                }
                let inherited = match parent.map(|p| &p.shape) {
                    Some(ResourceShape::Table { columns }) => columns.clone(),
                    _ => Vec::new(),
                };
                let columns = draft.columns.clone().unwrap_or(inherited);
                if columns.is_empty() {
                    self.issue(
                        format!("{path}/columns"),
                        "table resource must declare at least one column",
                    );
                    return None;
                }
                ResourceShape::Table { columns }
            }
        };

        Some(ResourceRule {
            name: name.to_string(),
            selector,
            extends: draft.extends.clone(),
            shape,
        })
    }

    // --- REFERENCES ---

    fn reference(&mut self, path: &str, key: &str, resources: &IndexMap<String, ResourceRule>) {
        let Some((resource, field)) = split_key(key) else {
            self.issue(path, format!("key '{key}' must have the form 'resource.field'"));
            return;
        };
        match resources.get(resource) {
            None if self.broken.contains(resource) => {}
            None => self.issue(path, format!("references undeclared resource '{resource}'")),
            Some(rule) if !rule.has_field(field) => self.issue(
                path,
                format!("resource '{resource}' has no field or column '{field}'"),
            ),
            Some(_) => {}
        }
    }

    fn mapping(
        &mut self,
        value: &Value,
        resources: &IndexMap<String, ResourceRule>,
    ) -> IndexMap<String, String> {
        let mut mapping = IndexMap::new();
        let Some(obj) = value.as_object() else {
            self.issue("/mapping", "must be an object");
            return mapping;
        };
        let mut targets: HashMap<String, String> = HashMap::new();

        for (key, target) in obj {
            let path = format!("/mapping/{key}");
            self.reference(&path, key, resources);

            let Some(target) = target.as_str() else {
                self.issue(path, "mapping target must be a string");
                continue;
            };
            let well_formed = split_key(target).is_some_and(|(_, column)| !column.contains('.'));
            if !well_formed {
                self.issue(
                    path,
                    format!("target '{target}' must have the form 'table.column'"),
                );
                continue;
            }
            if let Some(previous) = targets.insert(target.to_string(), key.clone()) {
                self.issue(
                    path,
                    format!("target '{target}' is already mapped from '{previous}'"),
                );
                continue;
            }
            mapping.insert(key.clone(), target.to_string());
        }
        mapping
    }

    fn quality_gates(
        &mut self,
        value: &Value,
        resources: &IndexMap<String, ResourceRule>,
    ) -> IndexMap<String, QualityGate> {
        let mut gates = IndexMap::new();
        let Some(obj) = value.as_object() else {
            self.issue("/quality_gates", "must be an object");
            return gates;
        };

        for (key, spec) in obj {
            let path = format!("/quality_gates/{key}");
            self.reference(&path, key, resources);

            let threshold = match spec {
                Value::Number(n) => n.as_f64(),
                Value::Object(o) => {
                    for extra in o.keys().filter(|k| k.as_str() != "min_non_null") {
                        self.issue(format!("{path}/{extra}"), "unknown quality gate key");
                    }
                    o.get("min_non_null").and_then(Value::as_f64)
                }
                _ => None,
            };
            match threshold {
                Some(t) if (0.0..=1.0).contains(&t) => {
                    gates.insert(key.clone(), QualityGate { min_non_null: t });
                }
                Some(t) => self.issue(path, format!("threshold {t} is outside [0, 1]")),
                None => self.issue(
                    path,
                    "gate must be a number or an object with 'min_non_null'",
                ),
            }
        }
        gates
    }
}
