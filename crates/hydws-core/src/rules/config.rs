use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuleError;
use crate::fields::{FieldShape, HydraulicField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// Candidate sum above the threshold.
    Above,
    /// Candidate sum below the threshold.
    Below,
    /// Candidate exceeds the running result by more than the threshold.
    #[serde(alias = "above-current", alias = "aboveCurrent")]
    AboveCurrent,
    /// Running result exceeds the candidate by more than the threshold.
    #[serde(alias = "below-current", alias = "belowCurrent")]
    BelowCurrent,
}

impl ConditionKind {
    pub fn triggers(&self, candidate: f64, running: f64, threshold: f64) -> bool {
        match self {
            ConditionKind::Above => candidate > threshold,
            ConditionKind::Below => candidate < threshold,
            ConditionKind::AboveCurrent => candidate - running > threshold,
            ConditionKind::BelowCurrent => running - candidate > threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    #[serde(rename = "rule", alias = "rule_kind", alias = "kind")]
    pub kind: ConditionKind,
    #[serde(rename = "value", alias = "threshold")]
    pub threshold: f64,
    #[serde(
        rename = "columnNames",
        alias = "source_columns",
        alias = "column_names"
    )]
    pub source_columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOperation {
    Add,
    #[serde(alias = "subtract")]
    Sub,
    #[serde(alias = "multiply")]
    Mul,
    #[serde(alias = "divide")]
    Div,
    Truediv,
    Pow,
    Radd,
    Rsub,
    Rmul,
    Rdiv,
    Rtruediv,
    Rpow,
}

/// A scalar arithmetic operation applied element-wise. Written either as
/// `["mul", 1000]` or as `{"operation": "mul", "operand": 1000}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "UnitConversionRepr")]
pub struct UnitConversion {
    pub operation: UnitOperation,
    pub operand: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UnitConversionRepr {
    Pair(UnitOperation, f64),
    Object {
        operation: UnitOperation,
        #[serde(alias = "value")]
        operand: f64,
    },
}

impl From<UnitConversionRepr> for UnitConversion {
    fn from(repr: UnitConversionRepr) -> Self {
        match repr {
            UnitConversionRepr::Pair(operation, operand)
            | UnitConversionRepr::Object { operation, operand } => {
                UnitConversion { operation, operand }
            }
        }
    }
}

impl UnitConversion {
    pub fn new(operation: UnitOperation, operand: f64) -> Self {
        Self { operation, operand }
    }

    pub fn apply(&self, value: f64) -> f64 {
        let operand = self.operand;
        match self.operation {
            UnitOperation::Add | UnitOperation::Radd => value + operand,
            UnitOperation::Sub => value - operand,
            UnitOperation::Rsub => operand - value,
            UnitOperation::Mul | UnitOperation::Rmul => value * operand,
            UnitOperation::Div | UnitOperation::Truediv => value / operand,
            UnitOperation::Rdiv | UnitOperation::Rtruediv => operand / value,
            UnitOperation::Pow => value.powf(operand),
            UnitOperation::Rpow => operand.powf(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorPosition {
    Surface,
    Downhole,
}

/// Where the derived column of a rule is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// A section given by UUID or name.
    Section(String),
    /// A plan reference; the plan itself is registered with the engine.
    Plan(String),
}

impl Assignment {
    pub fn reference(&self) -> &str {
        match self {
            Assignment::Section(reference) | Assignment::Plan(reference) => reference,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
enum AssignKind {
    #[serde(alias = "sectionID", alias = "section_id", alias = "sectionId")]
    #[serde(rename = "section")]
    Section,
    #[serde(rename = "plan")]
    Plan,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleRecord {
    #[serde(rename = "fieldName", alias = "output_field", alias = "field_name")]
    field_name: String,
    #[serde(
        rename = "columnNames",
        alias = "source_columns",
        alias = "column_names"
    )]
    column_names: Vec<String>,
    #[serde(default)]
    conditions: Vec<Condition>,
    #[serde(rename = "assignTo", alias = "assign_to")]
    assign_to: AssignKind,
    #[serde(alias = "target")]
    section: String,
    #[serde(default, rename = "unitConversion", alias = "unit_conversion")]
    unit_conversion: Option<UnitConversion>,
    #[serde(default, rename = "sensorPosition", alias = "sensor_position")]
    sensor_position: Option<SensorPosition>,
}

/// One declarative transformation from raw columns into a canonical field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub output_field: HydraulicField,
    pub source_columns: Vec<String>,
    pub conditions: Vec<Condition>,
    pub assign_to: Assignment,
    pub unit_conversion: Option<UnitConversion>,
    pub sensor_position: Option<SensorPosition>,
}

impl FieldRule {
    pub fn new(
        output_field: HydraulicField,
        source_columns: impl IntoIterator<Item = impl Into<String>>,
        assign_to: Assignment,
    ) -> Self {
        Self {
            output_field,
            source_columns: source_columns.into_iter().map(Into::into).collect(),
            conditions: Vec::new(),
            assign_to,
            unit_conversion: None,
            sensor_position: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_unit_conversion(mut self, conversion: UnitConversion) -> Self {
        self.unit_conversion = Some(conversion);
        self
    }

    pub fn with_sensor_position(mut self, position: SensorPosition) -> Self {
        self.sensor_position = Some(position);
        self
    }

    /// Hydrostatic correction applies to pressure fields measured at the surface.
    pub fn corrects_to_downhole(&self) -> bool {
        self.output_field.is_pressure() && self.sensor_position == Some(SensorPosition::Surface)
    }

    /// Rules derive numeric columns, so only real-valued fields can be written.
    pub(crate) fn check_output_field(&self, context: &str) -> Result<(), RuleError> {
        if self.output_field.shape() != FieldShape::Real {
            return Err(RuleError::config(
                context,
                format!("'{}' is not a real-valued field", self.output_field),
            ));
        }
        Ok(())
    }

    fn from_record(record: RuleRecord, context: &str) -> Result<Self, RuleError> {
        let output_field = HydraulicField::from_name(&record.field_name).ok_or_else(|| {
            RuleError::config(
                context,
                format!("'{}' is not a canonical hydraulic field", record.field_name),
            )
        })?;
        if record.section.trim().is_empty() {
            return Err(RuleError::config(context, "assignment target is empty"));
        }
        let assign_to = match record.assign_to {
            AssignKind::Section => Assignment::Section(record.section),
            AssignKind::Plan => Assignment::Plan(record.section),
        };
        let rule = FieldRule {
            output_field,
            source_columns: record.column_names,
            conditions: record.conditions,
            assign_to,
            unit_conversion: record.unit_conversion,
            sensor_position: record.sensor_position,
        };
        rule.check_output_field(context)?;
        Ok(rule)
    }
}

/// Ordered rule configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<FieldRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    pub fn from_json_str(text: &str) -> Result<Self, RuleError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|err| RuleError::config("rule configuration", err.to_string()))?;
        Self::from_json_value(value)
    }

    /// Parses a JSON list of rule records; errors name the index of the offending rule.
    pub fn from_json_value(value: Value) -> Result<Self, RuleError> {
        let Value::Array(entries) = value else {
            return Err(RuleError::config(
                "rule configuration",
                "expected a list of rules",
            ));
        };

        let mut rules = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.into_iter().enumerate() {
            let context = format!("rule {idx}");
            let record: RuleRecord = serde_json::from_value(entry)
                .map_err(|err| RuleError::config(&context, err.to_string()))?;
            rules.push(FieldRule::from_record(record, &context)?);
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Distinct plan references, in first-use order.
    pub fn plan_references(&self) -> Vec<&str> {
        let mut references: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if let Assignment::Plan(reference) = &rule.assign_to {
                if !references.contains(&reference.as_str()) {
                    references.push(reference);
                }
            }
        }
        references
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camel_case_records_parse() {
        let rules = RuleSet::from_json_value(json!([
            {
                "fieldName": "toppressure",
                "columnNames": ["p_surface"],
                "assignTo": "sectionID",
                "section": "int-1",
                "unitConversion": ["mul", 1000],
                "sensorPosition": "surface"
            },
            {
                "fieldName": "topflow",
                "columnNames": ["q1", "q2"],
                "assignTo": "plan",
                "section": "plans/injection.csv",
                "conditions": [
                    {"rule": "above", "value": 0.5, "columnNames": ["q1"]},
                    {"rule": "above-current", "value": 0.1, "columnNames": ["q2"]}
                ]
            }
        ]))
        .unwrap();

        assert_eq!(rules.len(), 2);
        let pressure = &rules.rules()[0];
        assert!(pressure.corrects_to_downhole());
        assert_eq!(
            pressure.unit_conversion,
            Some(UnitConversion::new(UnitOperation::Mul, 1000.0))
        );
        let flow = &rules.rules()[1];
        assert_eq!(flow.assign_to, Assignment::Plan("plans/injection.csv".into()));
        assert_eq!(flow.conditions[1].kind, ConditionKind::AboveCurrent);
        assert_eq!(rules.plan_references(), vec!["plans/injection.csv"]);
    }

    #[test]
    fn snake_case_aliases_parse() {
        let rules = RuleSet::from_json_value(json!([{
            "output_field": "bottomflow",
            "source_columns": ["q"],
            "assign_to": "section",
            "target": "int-2",
            "unit_conversion": {"operation": "rsub", "operand": 10},
            "conditions": [{"rule_kind": "below_current", "threshold": 1, "source_columns": ["q"]}]
        }]))
        .unwrap();
        let rule = &rules.rules()[0];
        assert_eq!(rule.output_field, HydraulicField::BottomFlow);
        assert_eq!(rule.unit_conversion.map(|c| c.apply(4.0)), Some(6.0));
        assert_eq!(rule.conditions[0].kind, ConditionKind::BelowCurrent);
    }

    #[test]
    fn errors_name_the_offending_rule() {
        let err = RuleSet::from_json_value(json!([
            {"fieldName": "topflow", "columnNames": ["a"], "assignTo": "sectionID", "section": "s"},
            {"fieldName": "topflow", "columnNames": ["a"], "assignTo": "sectionID", "section": "s",
             "conditions": [{"rule": "sideways", "value": 1, "columnNames": ["a"]}]}
        ]))
        .unwrap_err();
        match err {
            RuleError::ConfigFormat { context, .. } => assert_eq!(context, "rule 1"),
            other => panic!("unexpected {other:?}"),
        }

        let err = RuleSet::from_json_value(json!([
            {"fieldName": "flow", "columnNames": ["a"], "assignTo": "sectionID", "section": "s"}
        ]))
        .unwrap_err();
        assert!(err.to_string().starts_with("rule 0: invalid configuration"));
    }

    #[test]
    fn text_fields_cannot_be_rule_outputs() {
        let err = RuleSet::from_json_value(json!([
            {"fieldName": "topflow", "columnNames": ["a"], "assignTo": "sectionID", "section": "s"},
            {"fieldName": "fluidcomposition", "columnNames": ["c"], "assignTo": "sectionID", "section": "s"}
        ]))
        .unwrap_err();
        match err {
            RuleError::ConfigFormat { context, message } => {
                assert_eq!(context, "rule 1");
                assert!(message.contains("fluidcomposition"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unit_operations_follow_operand_order() {
        let cases = [
            (UnitOperation::Add, 7.0),
            (UnitOperation::Sub, 3.0),
            (UnitOperation::Rsub, -3.0),
            (UnitOperation::Mul, 10.0),
            (UnitOperation::Div, 2.5),
            (UnitOperation::Rdiv, 0.4),
            (UnitOperation::Pow, 25.0),
            (UnitOperation::Rpow, 32.0),
        ];
        for (operation, expected) in cases {
            assert_eq!(UnitConversion::new(operation, 2.0).apply(5.0), expected);
        }
    }
}
