use serde::{Deserialize, Serialize, Serializer};

use crate::error::StoreError;
use crate::fields::HydraulicField;

/// A measured quantity with optional uncertainty attributes. A missing attribute means
/// "unknown", never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealValue {
    #[serde(serialize_with = "number::write")]
    pub value: f64,
    #[serde(
        default,
        serialize_with = "number::write_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub uncertainty: Option<f64>,
    #[serde(
        default,
        rename = "loweruncertainty",
        serialize_with = "number::write_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub lower_uncertainty: Option<f64>,
    #[serde(
        default,
        rename = "upperuncertainty",
        serialize_with = "number::write_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub upper_uncertainty: Option<f64>,
    #[serde(
        default,
        rename = "confidencelevel",
        serialize_with = "number::write_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence_level: Option<f64>,
}

/// Integral values are written as JSON integers, so `500` reads back as `500`.
mod number {
    use super::Serializer;

    // Largest magnitude below which every integral f64 is exact as an i64.
    const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

    pub fn write<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.fract() == 0.0 && value.abs() < EXACT_INTEGER_LIMIT {
            serializer.serialize_i64(*value as i64)
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn write_opt<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => write(value, serializer),
            None => serializer.serialize_none(),
        }
    }
}

impl RealValue {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            uncertainty: None,
            lower_uncertainty: None,
            upper_uncertainty: None,
            confidence_level: None,
        }
    }

    pub fn with_uncertainty(mut self, uncertainty: f64) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }
}

impl From<f64> for RealValue {
    fn from(value: f64) -> Self {
        RealValue::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Real(RealValue),
    Text(String),
}

/// The canonical fields present at one timestamp. Unmeasured fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydraulicSample {
    pub bottomtemperature: Option<RealValue>,
    pub bottomflow: Option<RealValue>,
    pub bottompressure: Option<RealValue>,
    pub toptemperature: Option<RealValue>,
    pub topflow: Option<RealValue>,
    pub toppressure: Option<RealValue>,
    pub fluiddensity: Option<RealValue>,
    pub fluidviscosity: Option<RealValue>,
    pub fluidph: Option<RealValue>,
    pub fluidcomposition: Option<String>,
}

impl HydraulicSample {
    fn real_slot(&self, field: HydraulicField) -> Option<&Option<RealValue>> {
        match field {
            HydraulicField::BottomTemperature => Some(&self.bottomtemperature),
            HydraulicField::BottomFlow => Some(&self.bottomflow),
            HydraulicField::BottomPressure => Some(&self.bottompressure),
            HydraulicField::TopTemperature => Some(&self.toptemperature),
            HydraulicField::TopFlow => Some(&self.topflow),
            HydraulicField::TopPressure => Some(&self.toppressure),
            HydraulicField::FluidDensity => Some(&self.fluiddensity),
            HydraulicField::FluidViscosity => Some(&self.fluidviscosity),
            HydraulicField::FluidPh => Some(&self.fluidph),
            HydraulicField::FluidComposition => None,
        }
    }

    fn real_slot_mut(&mut self, field: HydraulicField) -> Option<&mut Option<RealValue>> {
        match field {
            HydraulicField::BottomTemperature => Some(&mut self.bottomtemperature),
            HydraulicField::BottomFlow => Some(&mut self.bottomflow),
            HydraulicField::BottomPressure => Some(&mut self.bottompressure),
            HydraulicField::TopTemperature => Some(&mut self.toptemperature),
            HydraulicField::TopFlow => Some(&mut self.topflow),
            HydraulicField::TopPressure => Some(&mut self.toppressure),
            HydraulicField::FluidDensity => Some(&mut self.fluiddensity),
            HydraulicField::FluidViscosity => Some(&mut self.fluidviscosity),
            HydraulicField::FluidPh => Some(&mut self.fluidph),
            HydraulicField::FluidComposition => None,
        }
    }

    pub fn real(&self, field: HydraulicField) -> Option<&RealValue> {
        self.real_slot(field).and_then(Option::as_ref)
    }

    pub fn get(&self, field: HydraulicField) -> Option<FieldValue> {
        match field {
            HydraulicField::FluidComposition => {
                self.fluidcomposition.clone().map(FieldValue::Text)
            }
            other => self.real(other).copied().map(FieldValue::Real),
        }
    }

    pub fn has(&self, field: HydraulicField) -> bool {
        match field {
            HydraulicField::FluidComposition => self.fluidcomposition.is_some(),
            other => self.real(other).is_some(),
        }
    }

    /// Stores a real value; text fields are left untouched.
    pub fn set_real(&mut self, field: HydraulicField, value: RealValue) {
        if let Some(slot) = self.real_slot_mut(field) {
            *slot = Some(value);
        }
    }

    pub fn set(&mut self, field: HydraulicField, value: FieldValue) -> Result<(), StoreError> {
        match (field, value) {
            (HydraulicField::FluidComposition, FieldValue::Text(text)) => {
                self.fluidcomposition = Some(text);
                Ok(())
            }
            (HydraulicField::FluidComposition, FieldValue::Real(_)) => Err(
                StoreError::Validation(format!("{field} holds text, not a real value")),
            ),
            (other, FieldValue::Real(real)) => {
                self.set_real(other, real);
                Ok(())
            }
            (other, FieldValue::Text(_)) => Err(StoreError::Validation(format!(
                "{other} holds a real value, not text"
            ))),
        }
    }

    pub fn take(&mut self, field: HydraulicField) -> Option<FieldValue> {
        match field {
            HydraulicField::FluidComposition => self.fluidcomposition.take().map(FieldValue::Text),
            other => self
                .real_slot_mut(other)
                .and_then(Option::take)
                .map(FieldValue::Real),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = HydraulicField> + '_ {
        HydraulicField::ALL
            .into_iter()
            .filter(move |field| self.has(*field))
    }

    pub fn is_empty(&self) -> bool {
        self.fields().next().is_none()
    }

    /// Moves every field present in `other` into `self`.
    pub(crate) fn absorb(&mut self, mut other: HydraulicSample) {
        for field in HydraulicField::ALL {
            let incoming = other.real_slot_mut(field).and_then(Option::take);
            if let (Some(value), Some(slot)) = (incoming, self.real_slot_mut(field)) {
                *slot = Some(value);
            }
        }
        if let Some(text) = other.fluidcomposition.take() {
            self.fluidcomposition = Some(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_values_are_written_as_integers() {
        let value = RealValue::new(500.0).with_uncertainty(0.5);
        assert_eq!(
            serde_json::to_value(value).unwrap(),
            json!({"value": 500, "uncertainty": 0.5})
        );
        assert_eq!(
            serde_json::to_value(RealValue::new(-2.25)).unwrap(),
            json!({"value": -2.25})
        );
        let back: RealValue = serde_json::from_value(json!({"value": 500})).unwrap();
        assert_eq!(back, RealValue::new(500.0));
    }

    #[test]
    fn set_rejects_mismatched_shapes() {
        let mut sample = HydraulicSample::default();
        assert!(sample
            .set(HydraulicField::TopFlow, FieldValue::Text("brine".into()))
            .is_err());
        assert!(sample
            .set(
                HydraulicField::FluidComposition,
                FieldValue::Real(RealValue::new(1.0))
            )
            .is_err());
        assert!(sample.is_empty());
    }

    #[test]
    fn absorb_keeps_existing_fields() {
        let mut left = HydraulicSample {
            topflow: Some(RealValue::new(2.0)),
            ..Default::default()
        };
        let right = HydraulicSample {
            toppressure: Some(RealValue::new(3.5).with_uncertainty(0.1)),
            fluidcomposition: Some("NaCl".into()),
            ..Default::default()
        };
        left.absorb(right);

        let fields: Vec<_> = left.fields().collect();
        assert_eq!(
            fields,
            vec![
                HydraulicField::TopFlow,
                HydraulicField::TopPressure,
                HydraulicField::FluidComposition
            ]
        );
        assert_eq!(
            left.real(HydraulicField::TopPressure).and_then(|v| v.uncertainty),
            Some(0.1)
        );
    }
}
