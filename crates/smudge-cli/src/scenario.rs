//! Scenario files: a list of classes and a sequence of field operations that
//! are replayed against the tracking engine.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use smudge_core::{
    clean, dirty_fields, is_dirty, is_smudged, smudged_fields, un_smudge, Array, Class, Object,
    Value,
};
use tracing::debug;

/// Errors raised while loading, validating or replaying a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    /// The scenario file is not valid JSON for the expected shape.
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),

    /// A class was declared twice.
    #[error("class `{0}` is declared more than once")]
    DuplicateClass(String),

    /// A step or class refers to an undeclared class.
    #[error("unknown class `{0}`")]
    UnknownClass(String),

    /// A step refers to a binding no earlier `new` step created.
    #[error("step {step}: unknown binding `{name}`")]
    UnknownBinding { step: usize, name: String },

    /// An array operation targeted a field that does not hold an array.
    #[error("step {step}: `{target}.{field}` is not an array")]
    NotAnArray {
        step: usize,
        target: String,
        field: String,
    },

    /// A `set_index` step wrote too far past the end of an array.
    #[error("step {step}: index {index} is out of range for `{target}.{field}`")]
    IndexOutOfRange {
        step: usize,
        target: String,
        field: String,
        index: usize,
    },
}

/// A class declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub name: String,
    /// Capture every field the first instance initializes (default: true).
    #[serde(default = "default_smudgable")]
    pub smudgable: bool,
    /// Name of a previously declared base class.
    #[serde(default)]
    pub extends: Option<String>,
    /// Fields intercepted up front, in addition to captured ones.
    #[serde(default)]
    pub fields: Vec<String>,
}

fn default_smudgable() -> bool {
    true
}

/// One replayed operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Instantiate a class and bind the instance to a name.
    New {
        bind: String,
        class: String,
        #[serde(default)]
        fields: serde_json::Map<String, serde_json::Value>,
    },
    /// Write a field.
    Set {
        target: String,
        field: String,
        value: serde_json::Value,
    },
    /// Append to the array held in a field, without reassigning it.
    Push {
        target: String,
        field: String,
        value: serde_json::Value,
    },
    /// Overwrite one element of the array held in a field.
    SetIndex {
        target: String,
        field: String,
        index: usize,
        value: serde_json::Value,
    },
    /// Deep-clean one field or the whole object.
    Clean {
        target: String,
        #[serde(default)]
        field: Option<String>,
    },
    /// Drop smudge baselines for one field or the whole object.
    Unsmudge {
        target: String,
        #[serde(default)]
        field: Option<String>,
    },
    /// Record the dirty state of a binding.
    Report { target: String },
}

/// A complete scenario file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub classes: Vec<ClassSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse a scenario from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a scenario file.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check class and binding references without running anything.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut classes: Vec<&str> = Vec::new();
        for spec in &self.classes {
            if classes.contains(&spec.name.as_str()) {
                return Err(ScenarioError::DuplicateClass(spec.name.clone()));
            }
            if let Some(base) = &spec.extends {
                if !classes.contains(&base.as_str()) {
                    return Err(ScenarioError::UnknownClass(base.clone()));
                }
            }
            classes.push(&spec.name);
        }

        let mut bindings: Vec<&str> = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            let step_no = index + 1;
            match step {
                Step::New {
                    bind,
                    class,
                    fields,
                } => {
                    if !classes.contains(&class.as_str()) {
                        return Err(ScenarioError::UnknownClass(class.clone()));
                    }
                    for value in fields.values() {
                        check_refs(value, &bindings, step_no)?;
                    }
                    bindings.push(bind);
                }
                Step::Set { target, value, .. }
                | Step::Push { target, value, .. }
                | Step::SetIndex { target, value, .. } => {
                    known(target, &bindings, step_no)?;
                    check_refs(value, &bindings, step_no)?;
                }
                Step::Clean { target, .. }
                | Step::Unsmudge { target, .. }
                | Step::Report { target } => known(target, &bindings, step_no)?,
            }
        }
        Ok(())
    }
}

fn known(name: &str, bindings: &[&str], step: usize) -> Result<(), ScenarioError> {
    if bindings.contains(&name) {
        Ok(())
    } else {
        Err(ScenarioError::UnknownBinding {
            step,
            name: name.to_string(),
        })
    }
}

fn check_refs(value: &serde_json::Value, bindings: &[&str], step: usize) -> Result<(), ScenarioError> {
    match value {
        serde_json::Value::Object(map) => match reference(map) {
            Some(name) if bindings.contains(&name) => Ok(()),
            Some(name) => Err(ScenarioError::UnknownBinding {
                step,
                name: name.to_string(),
            }),
            None => map.values().try_for_each(|v| check_refs(v, bindings, step)),
        },
        serde_json::Value::Array(items) => items.iter().try_for_each(|v| check_refs(v, bindings, step)),
        _ => Ok(()),
    }
}

/// `{"$ref": "name"}` refers to a bound object.
fn reference(map: &serde_json::Map<String, serde_json::Value>) -> Option<&str> {
    if map.len() != 1 {
        return None;
    }
    map.get("$ref").and_then(serde_json::Value::as_str)
}

/// Dirty state of one binding at a `report` step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub step: usize,
    pub target: String,
    pub dirty: bool,
    pub smudged: bool,
    pub dirty_fields: Vec<String>,
    pub smudged_fields: Vec<String>,
}

/// Replays scenarios, keeping classes and bound objects alive between steps.
#[derive(Default)]
pub struct Runner {
    classes: HashMap<String, Class>,
    bindings: HashMap<String, Object>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a bound object.
    pub fn binding(&self, name: &str) -> Option<&Object> {
        self.bindings.get(name)
    }

    /// Declare classes and replay every step, collecting reports.
    pub fn run(&mut self, scenario: &Scenario) -> Result<Vec<Report>, ScenarioError> {
        scenario.validate()?;
        for spec in &scenario.classes {
            self.declare(spec)?;
        }
        let mut reports = Vec::new();
        for (index, step) in scenario.steps.iter().enumerate() {
            if let Some(report) = self.apply(index + 1, step)? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    fn declare(&mut self, spec: &ClassSpec) -> Result<(), ScenarioError> {
        let class = match (&spec.extends, spec.smudgable) {
            (Some(base), smudgable) => {
                let base = self
                    .classes
                    .get(base)
                    .ok_or_else(|| ScenarioError::UnknownClass(base.clone()))?;
                if smudgable {
                    Class::extends(spec.name.as_str(), base)
                } else {
                    Class::subclass(spec.name.as_str(), base)
                }
            }
            (None, true) => Class::smudgable(spec.name.as_str()),
            (None, false) => Class::new(spec.name.as_str()),
        };
        for field in &spec.fields {
            class.track(field);
        }
        self.classes.insert(spec.name.clone(), class);
        Ok(())
    }

    fn apply(&mut self, step_no: usize, step: &Step) -> Result<Option<Report>, ScenarioError> {
        debug!(step = step_no, ?step, "applying scenario step");
        match step {
            Step::New {
                bind,
                class,
                fields,
            } => {
                let class = self
                    .classes
                    .get(class)
                    .ok_or_else(|| ScenarioError::UnknownClass(class.clone()))?;
                let mut values = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    values.push((name.as_str(), self.resolve(value, step_no)?));
                }
                let object = class.instantiate(|o| {
                    for (name, value) in values {
                        o.set(name, value);
                    }
                });
                self.bindings.insert(bind.clone(), object);
            }
            Step::Set {
                target,
                field,
                value,
            } => {
                let value = self.resolve(value, step_no)?;
                self.lookup(target, step_no)?.set(field, value);
            }
            Step::Push {
                target,
                field,
                value,
            } => {
                let value = self.resolve(value, step_no)?;
                self.array_field(target, field, step_no)?.push(value);
            }
            Step::SetIndex {
                target,
                field,
                index,
                value,
            } => {
                let value = self.resolve(value, step_no)?;
                self.array_field(target, field, step_no)?
                    .set(*index, value)
                    .map_err(|_| ScenarioError::IndexOutOfRange {
                        step: step_no,
                        target: target.clone(),
                        field: field.clone(),
                        index: *index,
                    })?;
            }
            Step::Clean { target, field } => {
                clean(self.lookup(target, step_no)?, field.as_deref());
            }
            Step::Unsmudge { target, field } => {
                un_smudge(self.lookup(target, step_no)?, field.as_deref());
            }
            Step::Report { target } => {
                let object = self.lookup(target, step_no)?;
                return Ok(Some(Report {
                    step: step_no,
                    target: target.clone(),
                    dirty: is_dirty(object, None),
                    smudged: is_smudged(object, None),
                    dirty_fields: dirty_fields(object),
                    smudged_fields: smudged_fields(object),
                }));
            }
        }
        Ok(None)
    }

    fn lookup(&self, name: &str, step: usize) -> Result<&Object, ScenarioError> {
        self.bindings
            .get(name)
            .ok_or_else(|| ScenarioError::UnknownBinding {
                step,
                name: name.to_string(),
            })
    }

    fn array_field(&self, target: &str, field: &str, step: usize) -> Result<Array, ScenarioError> {
        Array::try_from(self.lookup(target, step)?.get(field)).map_err(|_| ScenarioError::NotAnArray {
            step,
            target: target.to_string(),
            field: field.to_string(),
        })
    }

    /// Convert JSON into a value, substituting `{"$ref": ...}` with bindings.
    fn resolve(&self, value: &serde_json::Value, step: usize) -> Result<Value, ScenarioError> {
        match value {
            serde_json::Value::Object(map) => {
                if let Some(name) = reference(map) {
                    return Ok(Value::from(self.lookup(name, step)?));
                }
                let object = Object::new();
                for (key, item) in map {
                    object.set(key, self.resolve(item, step)?);
                }
                Ok(Value::Object(object))
            }
            serde_json::Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.resolve(item, step)?);
                }
                Ok(Value::Array(Array::from_vec(values)))
            }
            scalar => Ok(Value::from(scalar.clone())),
        }
    }
}
