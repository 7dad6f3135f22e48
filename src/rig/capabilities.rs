//! # Rig Runtime Capabilities
//!
//! The rig runtime exposes three functions and one delegate signature to the
//! expansion pass. Instead of looking them up by name every time a node is
//! expanded, the host registers a [`RigCapabilityTable`] once; it is checked
//! up front and turned into typed [`RigCapabilities`] handles.
//!
//! ## Required Operations
//!
//! | Name | Parameters | Returns |
//! |---|---|---|
//! | `GetOrAllocateSubRig` | `AllocationIndex: int`, `RigClass: class<Base>` | `object<Base>` |
//! | `EvaluateRig` | `Target: object<Base>` | `object<Base>` |
//! | `EvaluateRigWithInputs` | `Target: object<Base>`, `PreEvaluate: delegate<Sig>` | `object<Base>` |
//!
//! `Sig` is `PreEvaluateGatherInputs__DelegateSignature`.

use crate::error::{ExpansionError, Result};
use crate::graph::{PinCategory, PinType};
use serde::{Deserialize, Serialize};

pub const ALLOCATE_SUB_RIG: &str = "GetOrAllocateSubRig";
pub const EVALUATE_RIG: &str = "EvaluateRig";
pub const EVALUATE_RIG_WITH_INPUTS: &str = "EvaluateRigWithInputs";
pub const PRE_EVALUATE_SIGNATURE: &str = "PreEvaluateGatherInputs__DelegateSignature";

pub const PARAM_ALLOCATION_INDEX: &str = "AllocationIndex";
pub const PARAM_RIG_CLASS: &str = "RigClass";
pub const PARAM_TARGET: &str = "Target";
pub const PARAM_PRE_EVALUATE: &str = "PreEvaluate";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParam {
    pub name: String,
    pub pin_type: PinType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    #[serde(default)]
    pub params: Vec<FunctionParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<PinType>,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>, pin_type: PinType) -> Self {
        self.params.push(FunctionParam {
            name: name.into(),
            pin_type,
        });
        self
    }

    pub fn returns(mut self, pin_type: PinType) -> Self {
        self.return_type = Some(pin_type);
        self
    }

    pub fn param_named(&self, name: &str) -> Option<&FunctionParam> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Raw, unchecked description of what a rig runtime offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigCapabilityTable {
    /// Root class every evaluable rig derives from.
    pub base_class: String,
    #[serde(default)]
    pub functions: Vec<FunctionSignature>,
    #[serde(default)]
    pub delegates: Vec<String>,
}

impl RigCapabilityTable {
    /// The table shipped by the stock rig runtime.
    pub fn standard(base_class: &str) -> Self {
        Self {
            base_class: base_class.to_string(),
            functions: vec![
                FunctionSignature::new(ALLOCATE_SUB_RIG)
                    .param(PARAM_ALLOCATION_INDEX, PinType::int())
                    .param(PARAM_RIG_CLASS, PinType::class_of(base_class))
                    .returns(PinType::object(base_class)),
                FunctionSignature::new(EVALUATE_RIG)
                    .param(PARAM_TARGET, PinType::object(base_class))
                    .returns(PinType::object(base_class)),
                FunctionSignature::new(EVALUATE_RIG_WITH_INPUTS)
                    .param(PARAM_TARGET, PinType::object(base_class))
                    .param(PARAM_PRE_EVALUATE, PinType::delegate(PRE_EVALUATE_SIGNATURE))
                    .returns(PinType::object(base_class)),
            ],
            delegates: vec![PRE_EVALUATE_SIGNATURE.to_string()],
        }
    }

    fn function(&self, name: &str) -> Result<&FunctionSignature> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| ExpansionError::MissingFunction(name.to_string()))
    }
}

/// Validated handles to the rig runtime operations.
#[derive(Debug, Clone, PartialEq)]
pub struct RigCapabilities {
    base_class: String,
    allocate: FunctionSignature,
    evaluate: FunctionSignature,
    evaluate_with_inputs: FunctionSignature,
    pre_evaluate_signature: String,
}

impl RigCapabilities {
    /// Check `table` and extract the operations the expander needs.
    pub fn from_table(table: &RigCapabilityTable) -> Result<Self> {
        let base = table.base_class.as_str();

        if !table.delegates.iter().any(|d| d == PRE_EVALUATE_SIGNATURE) {
            return Err(ExpansionError::MissingFunction(PRE_EVALUATE_SIGNATURE.to_string()));
        }

        let allocate = table.function(ALLOCATE_SUB_RIG)?;
        expect_param(allocate, PARAM_ALLOCATION_INDEX, |t| t.category == PinCategory::Int)?;
        expect_param(allocate, PARAM_RIG_CLASS, |t| t.category == PinCategory::Class)?;
        expect_rig_return(allocate, base)?;

        let evaluate = table.function(EVALUATE_RIG)?;
        expect_param(evaluate, PARAM_TARGET, |t| is_rig_object(t, base))?;
        expect_rig_return(evaluate, base)?;

        let evaluate_with_inputs = table.function(EVALUATE_RIG_WITH_INPUTS)?;
        expect_param(evaluate_with_inputs, PARAM_TARGET, |t| is_rig_object(t, base))?;
        expect_param(evaluate_with_inputs, PARAM_PRE_EVALUATE, |t| {
            t.category == PinCategory::Delegate
                && t.sub_object.as_deref() == Some(PRE_EVALUATE_SIGNATURE)
        })?;
        expect_rig_return(evaluate_with_inputs, base)?;

        Ok(Self {
            base_class: table.base_class.clone(),
            allocate: allocate.clone(),
            evaluate: evaluate.clone(),
            evaluate_with_inputs: evaluate_with_inputs.clone(),
            pre_evaluate_signature: PRE_EVALUATE_SIGNATURE.to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let table: RigCapabilityTable = serde_json::from_str(json)?;
        Self::from_table(&table)
    }

    /// Capabilities of the stock rig runtime rooted at `base_class`.
    pub fn standard(base_class: &str) -> Self {
        let table = RigCapabilityTable::standard(base_class);
        Self {
            base_class: table.base_class,
            allocate: table.functions[0].clone(),
            evaluate: table.functions[1].clone(),
            evaluate_with_inputs: table.functions[2].clone(),
            pre_evaluate_signature: PRE_EVALUATE_SIGNATURE.to_string(),
        }
    }

    pub fn base_class(&self) -> &str {
        &self.base_class
    }

    pub fn allocate(&self) -> &FunctionSignature {
        &self.allocate
    }

    pub fn evaluate(&self) -> &FunctionSignature {
        &self.evaluate
    }

    pub fn evaluate_with_inputs(&self) -> &FunctionSignature {
        &self.evaluate_with_inputs
    }

    pub fn pre_evaluate_signature(&self) -> &str {
        &self.pre_evaluate_signature
    }
}

fn is_rig_object(pin_type: &PinType, base: &str) -> bool {
    pin_type.category == PinCategory::Object && pin_type.sub_object.as_deref() == Some(base)
}

fn expect_param(
    function: &FunctionSignature,
    name: &str,
    check: impl Fn(&PinType) -> bool,
) -> Result<()> {
    let param = function
        .param_named(name)
        .ok_or_else(|| ExpansionError::InvalidSignature {
            function: function.name.clone(),
            reason: format!("missing parameter '{}'", name),
        })?;
    if !check(&param.pin_type) {
        return Err(ExpansionError::InvalidSignature {
            function: function.name.clone(),
            reason: format!("parameter '{}' has unexpected type {}", name, param.pin_type),
        });
    }
    Ok(())
}

fn expect_rig_return(function: &FunctionSignature, base: &str) -> Result<()> {
    match &function.return_type {
        Some(ret) if is_rig_object(ret, base) => Ok(()),
        Some(ret) => Err(ExpansionError::InvalidSignature {
            function: function.name.clone(),
            reason: format!("returns {} instead of object<{}>", ret, base),
        }),
        None => Err(ExpansionError::InvalidSignature {
            function: function.name.clone(),
            reason: "has no return value".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_validates() {
        let table = RigCapabilityTable::standard("Rig");
        let checked = RigCapabilities::from_table(&table).unwrap();
        assert_eq!(checked, RigCapabilities::standard("Rig"));
        assert_eq!(checked.evaluate().name, EVALUATE_RIG);
        assert_eq!(checked.pre_evaluate_signature(), PRE_EVALUATE_SIGNATURE);
    }

    #[test]
    fn test_missing_function_is_reported() {
        let mut table = RigCapabilityTable::standard("Rig");
        table.functions.retain(|f| f.name != EVALUATE_RIG_WITH_INPUTS);

        let err = RigCapabilities::from_table(&table).unwrap_err();
        assert!(matches!(err, ExpansionError::MissingFunction(ref name) if name == EVALUATE_RIG_WITH_INPUTS));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_missing_delegate_is_reported() {
        let mut table = RigCapabilityTable::standard("Rig");
        table.delegates.clear();
        assert!(matches!(
            RigCapabilities::from_table(&table),
            Err(ExpansionError::MissingFunction(_))
        ));
    }

    #[test]
    fn test_wrong_parameter_type_is_reported() {
        let mut table = RigCapabilityTable::standard("Rig");
        table.functions[0] = FunctionSignature::new(ALLOCATE_SUB_RIG)
            .param(PARAM_ALLOCATION_INDEX, PinType::string())
            .param(PARAM_RIG_CLASS, PinType::class_of("Rig"))
            .returns(PinType::object("Rig"));

        let err = RigCapabilities::from_table(&table).unwrap_err();
        assert!(matches!(err, ExpansionError::InvalidSignature { .. }));
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::to_string(&RigCapabilityTable::standard("Rig")).unwrap();
        let caps = RigCapabilities::from_json(&json).unwrap();
        assert_eq!(caps.base_class(), "Rig");

        assert!(matches!(
            RigCapabilities::from_json("{ not json"),
            Err(ExpansionError::Json(_))
        ));
    }
}
