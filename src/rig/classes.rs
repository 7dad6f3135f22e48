//! # Rig Class Registry
//!
//! Registered rig classes and the parameter fields each one exposes to
//! evaluator nodes. Classes inherit the fields of their ancestors.

use crate::error::{ExpansionError, Result};
use crate::expansion::fields::FieldDescriptor;
use crate::graph::{ClassHierarchy, PinDirection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigClass {
    pub name: String,
    pub parent: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl RigClass {
    pub fn new(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: parent.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RigClassRegistry {
    base_class: String,
    classes: BTreeMap<String, RigClass>,
    hierarchy: ClassHierarchy,
}

impl RigClassRegistry {
    pub fn new(base_class: impl Into<String>) -> Self {
        Self {
            base_class: base_class.into(),
            classes: BTreeMap::new(),
            hierarchy: ClassHierarchy::new(),
        }
    }

    pub fn base_class(&self) -> &str {
        &self.base_class
    }

    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    /// Register a rig class. Its parent must be the base class or an already
    /// registered class, and its fields (including inherited ones) must be
    /// valid and uniquely named per direction.
    pub fn register(&mut self, class: RigClass) -> Result<()> {
        let invalid = |reason: String| ExpansionError::InvalidRigClass {
            class: class.name.clone(),
            reason,
        };

        if class.name.is_empty() {
            return Err(invalid("class name is empty".to_string()));
        }
        if class.name == self.base_class || self.classes.contains_key(&class.name) {
            return Err(invalid("class is already registered".to_string()));
        }
        if class.parent != self.base_class && !self.classes.contains_key(&class.parent) {
            return Err(invalid(format!("unknown parent class '{}'", class.parent)));
        }

        let mut seen: HashSet<(PinDirection, &str)> = HashSet::new();
        let inherited = self.fields_of(&class.parent);
        for field in inherited.into_iter().chain(class.fields.iter()) {
            field.validate()?;
            if !seen.insert((field.direction, field.name.as_str())) {
                return Err(invalid(format!("field '{}' is declared twice", field.name)));
            }
        }

        tracing::debug!(
            "[PBX] Registered rig class {} ({} fields)",
            class.name,
            class.fields.len()
        );
        self.hierarchy.register(class.name.clone(), class.parent.clone());
        self.classes.insert(class.name.clone(), class);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RigClass> {
        self.classes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &RigClass> {
        self.classes.values()
    }

    /// Every field of `class`, ancestors first.
    pub fn fields_of(&self, class: &str) -> Vec<&FieldDescriptor> {
        let mut chain = Vec::new();
        let mut current = self.classes.get(class);
        while let Some(rig) = current {
            chain.push(rig);
            current = self.classes.get(&rig.parent);
        }
        chain
            .into_iter()
            .rev()
            .flat_map(|rig| rig.fields.iter())
            .collect()
    }

    /// Fields of `class` going in `direction`, minus those named in `disabled`.
    pub fn enabled_fields(
        &self,
        class: &str,
        direction: PinDirection,
        disabled: &BTreeSet<String>,
    ) -> Vec<&FieldDescriptor> {
        self.fields_of(class)
            .into_iter()
            .filter(|f| f.direction == direction && !disabled.contains(&f.name))
            .collect()
    }

    pub fn find_field(
        &self,
        class: &str,
        name: &str,
        direction: PinDirection,
    ) -> Option<&FieldDescriptor> {
        self.fields_of(class)
            .into_iter()
            .find(|f| f.direction == direction && f.name == name)
    }
}
