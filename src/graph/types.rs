//! # Pin Types
//!
//! Type descriptors carried by every pin, and the class hierarchy used to
//! decide whether one object pin may feed another.
//!
//! ## Compatibility Rules
//!
//! - Wildcards connect to anything.
//! - Container shapes must match exactly (`array<int>` never feeds `int`).
//! - Object and class pins accept subclasses; an input without a class
//!   accepts any object.
//! - Struct and delegate pins must name the same struct/signature, unless the
//!   input leaves it open.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinCategory {
    Exec,
    Boolean,
    Int,
    Float,
    String,
    Name,
    Struct,
    Object,
    Class,
    Delegate,
    Wildcard,
}

impl PinCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinCategory::Exec => "exec",
            PinCategory::Boolean => "bool",
            PinCategory::Int => "int",
            PinCategory::Float => "float",
            PinCategory::String => "string",
            PinCategory::Name => "name",
            PinCategory::Struct => "struct",
            PinCategory::Object => "object",
            PinCategory::Class => "class",
            PinCategory::Delegate => "delegate",
            PinCategory::Wildcard => "wildcard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    #[default]
    None,
    Array,
    Set,
    Map,
}

/// Full type of a pin: category, optional referenced struct/class/signature,
/// and container shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinType {
    pub category: PinCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_object: Option<String>,
    #[serde(default)]
    pub container: ContainerType,
}

impl PinType {
    fn plain(category: PinCategory) -> Self {
        Self {
            category,
            sub_object: None,
            container: ContainerType::None,
        }
    }

    fn with_sub_object(category: PinCategory, sub_object: impl Into<String>) -> Self {
        Self {
            category,
            sub_object: Some(sub_object.into()),
            container: ContainerType::None,
        }
    }

    pub fn exec() -> Self {
        Self::plain(PinCategory::Exec)
    }

    pub fn boolean() -> Self {
        Self::plain(PinCategory::Boolean)
    }

    pub fn int() -> Self {
        Self::plain(PinCategory::Int)
    }

    pub fn float() -> Self {
        Self::plain(PinCategory::Float)
    }

    pub fn string() -> Self {
        Self::plain(PinCategory::String)
    }

    pub fn name() -> Self {
        Self::plain(PinCategory::Name)
    }

    pub fn wildcard() -> Self {
        Self::plain(PinCategory::Wildcard)
    }

    /// Object reference of the given class (or any subclass).
    pub fn object(class: impl Into<String>) -> Self {
        Self::with_sub_object(PinCategory::Object, class)
    }

    /// Object reference of any class.
    pub fn any_object() -> Self {
        Self::plain(PinCategory::Object)
    }

    /// Class reference constrained to `base` and its subclasses.
    pub fn class_of(base: impl Into<String>) -> Self {
        Self::with_sub_object(PinCategory::Class, base)
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self::with_sub_object(PinCategory::Struct, name)
    }

    pub fn delegate(signature: impl Into<String>) -> Self {
        Self::with_sub_object(PinCategory::Delegate, signature)
    }

    /// Same element type wrapped in an array.
    pub fn array(mut self) -> Self {
        self.container = ContainerType::Array;
        self
    }

    pub fn is_exec(&self) -> bool {
        self.category == PinCategory::Exec
    }

    pub fn is_container(&self) -> bool {
        self.container != ContainerType::None
    }

    /// Whether an output pin of this type may be linked into an input pin of
    /// type `input`.
    pub fn can_feed(&self, input: &PinType, hierarchy: &ClassHierarchy) -> bool {
        if self.category == PinCategory::Wildcard || input.category == PinCategory::Wildcard {
            return true;
        }
        if self.container != input.container || self.category != input.category {
            return false;
        }

        match self.category {
            PinCategory::Object | PinCategory::Class => match (&self.sub_object, &input.sub_object) {
                (_, None) => true,
                (None, Some(_)) => false,
                (Some(class), Some(base)) => hierarchy.is_child_of(class, base),
            },
            PinCategory::Struct | PinCategory::Delegate => match (&self.sub_object, &input.sub_object) {
                (_, None) => true,
                (output, input) => output == input,
            },
            _ => true,
        }
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = match &self.sub_object {
            Some(sub) => format!("{}<{}>", self.category.as_str(), sub),
            None => self.category.as_str().to_string(),
        };
        match self.container {
            ContainerType::None => write!(f, "{}", inner),
            ContainerType::Array => write!(f, "array<{}>", inner),
            ContainerType::Set => write!(f, "set<{}>", inner),
            ContainerType::Map => write!(f, "map<{}>", inner),
        }
    }
}

/// Child → parent class map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassHierarchy {
    parents: HashMap<String, String>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `class` as deriving from `parent`. Root classes need no entry.
    pub fn register(&mut self, class: impl Into<String>, parent: impl Into<String>) {
        self.parents.insert(class.into(), parent.into());
    }

    pub fn parent_of(&self, class: &str) -> Option<&str> {
        self.parents.get(class).map(String::as_str)
    }

    /// `true` when `class` is `ancestor` or derives from it.
    pub fn is_child_of(&self, class: &str, ancestor: &str) -> bool {
        let mut current = class;
        // A malformed map could loop; a chain can never be longer than the map.
        for _ in 0..=self.parents.len() {
            if current == ancestor {
                return true;
            }
            match self.parents.get(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// Copy every edge of `other` into `self`. Existing entries win.
    pub fn merge(&mut self, other: &ClassHierarchy) {
        for (class, parent) in &other.parents {
            self.parents
                .entry(class.clone())
                .or_insert_with(|| parent.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}
