use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;

use crate::error::StoreError;

/// Canonical physical quantities a hydraulic sample may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HydraulicField {
    BottomTemperature,
    BottomFlow,
    BottomPressure,
    TopTemperature,
    TopFlow,
    TopPressure,
    FluidDensity,
    FluidViscosity,
    FluidPh,
    FluidComposition,
}

/// Shape of the value stored under a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// A `RealValue`: number plus optional uncertainty attributes.
    Real,
    /// Free text.
    Text,
}

static FIELD_LOOKUP: Lazy<HashMap<&'static str, HydraulicField>> = Lazy::new(|| {
    HydraulicField::ALL
        .iter()
        .map(|field| (field.canonical_name(), *field))
        .collect()
});

impl HydraulicField {
    pub const ALL: [HydraulicField; 10] = [
        HydraulicField::BottomTemperature,
        HydraulicField::BottomFlow,
        HydraulicField::BottomPressure,
        HydraulicField::TopTemperature,
        HydraulicField::TopFlow,
        HydraulicField::TopPressure,
        HydraulicField::FluidDensity,
        HydraulicField::FluidViscosity,
        HydraulicField::FluidPh,
        HydraulicField::FluidComposition,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            HydraulicField::BottomTemperature => "bottomtemperature",
            HydraulicField::BottomFlow => "bottomflow",
            HydraulicField::BottomPressure => "bottompressure",
            HydraulicField::TopTemperature => "toptemperature",
            HydraulicField::TopFlow => "topflow",
            HydraulicField::TopPressure => "toppressure",
            HydraulicField::FluidDensity => "fluiddensity",
            HydraulicField::FluidViscosity => "fluidviscosity",
            HydraulicField::FluidPh => "fluidph",
            HydraulicField::FluidComposition => "fluidcomposition",
        }
    }

    pub fn shape(&self) -> FieldShape {
        match self {
            HydraulicField::FluidComposition => FieldShape::Text,
            _ => FieldShape::Real,
        }
    }

    pub fn is_pressure(&self) -> bool {
        matches!(
            self,
            HydraulicField::BottomPressure | HydraulicField::TopPressure
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        FIELD_LOOKUP.get(name).copied()
    }
}

impl fmt::Display for HydraulicField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl FromStr for HydraulicField {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        HydraulicField::from_name(value).ok_or_else(|| unknown_fields(vec![value.to_string()]))
    }
}

pub fn canonical_names() -> Vec<&'static str> {
    HydraulicField::ALL
        .iter()
        .map(|field| field.canonical_name())
        .collect()
}

/// Maps column names onto canonical fields, reporting every offending name at once.
pub fn resolve_columns<'a, I>(names: I) -> Result<Vec<HydraulicField>, StoreError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut fields = Vec::new();
    let mut unknown = Vec::new();

    for name in names {
        match HydraulicField::from_name(name) {
            Some(field) => fields.push(field),
            None => unknown.push(name.to_string()),
        }
    }

    if unknown.is_empty() {
        Ok(fields)
    } else {
        Err(unknown_fields(unknown))
    }
}

fn unknown_fields(names: Vec<String>) -> StoreError {
    StoreError::UnknownField {
        names,
        expected: canonical_names(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_both_ways() {
        for field in HydraulicField::ALL {
            assert_eq!(HydraulicField::from_name(field.canonical_name()), Some(field));
        }
        assert_eq!(HydraulicField::from_name("TopPressure"), None);
    }

    #[test]
    fn resolve_columns_lists_every_unknown_name() {
        let err = resolve_columns(["topflow", "flow_a", "pressure"]).unwrap_err();
        match err {
            StoreError::UnknownField { names, expected } => {
                assert_eq!(names, vec!["flow_a".to_string(), "pressure".to_string()]);
                assert_eq!(expected.len(), HydraulicField::ALL.len());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn only_pressures_are_pressure_fields() {
        let pressures: Vec<_> = HydraulicField::ALL
            .into_iter()
            .filter(HydraulicField::is_pressure)
            .collect();
        assert_eq!(
            pressures,
            vec![HydraulicField::BottomPressure, HydraulicField::TopPressure]
        );
        assert_eq!(HydraulicField::FluidComposition.shape(), FieldShape::Text);
    }
}
