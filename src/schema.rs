//! # Graph Schema
//!
//! Well-known pin names shared by every primitive node, and the default
//! literal a freshly created input pin receives for its type.

use crate::graph::{ContainerType, Pin, PinCategory, PinDirection, PinType};

#[derive(Debug, Clone, Copy, Default)]
pub struct Schema;

impl Schema {
    /// Execution input of impure nodes.
    pub const PN_EXECUTE: &'static str = "execute";
    /// Execution output of impure nodes and events.
    pub const PN_THEN: &'static str = "then";
    /// Object the node operates on.
    pub const PN_SELF: &'static str = "self";
    pub const PN_RETURN_VALUE: &'static str = "ReturnValue";
    pub const PN_CAST_SOURCE: &'static str = "Object";
    pub const PN_CAST_SUCCESS: &'static str = "Success";
    pub const PN_CAST_FAILED: &'static str = "CastFailed";
    pub const PN_DELEGATE_OUTPUT: &'static str = "OutputDelegate";
    pub const PN_DELEGATE: &'static str = "Delegate";
    pub const PN_ITEM: &'static str = "Item";

    pub fn new() -> Self {
        Schema
    }

    /// Name of a dynamic cast's result pin.
    pub fn cast_result_pin_name(&self, target_type: &str) -> String {
        format!("As{}", target_type)
    }

    /// Literal an unconnected input of `pin_type` evaluates to.
    pub fn default_value_for(&self, pin_type: &PinType) -> Option<String> {
        if pin_type.container != ContainerType::None {
            return None;
        }
        match pin_type.category {
            PinCategory::Boolean => Some("false".to_string()),
            PinCategory::Int => Some("0".to_string()),
            PinCategory::Float => Some("0.0".to_string()),
            PinCategory::String | PinCategory::Name => Some(String::new()),
            _ => None,
        }
    }

    /// Give an input pin the default literal for its type. Outputs and pins
    /// that already carry a default are left alone.
    pub fn set_pin_autogenerated_default_value(&self, pin: &mut Pin) {
        if pin.direction != PinDirection::Input || pin.default_value.is_some() {
            return;
        }
        pin.default_value = self.default_value_for(&pin.pin_type);
    }
}
