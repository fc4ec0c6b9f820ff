//! Declarative ingestion of raw sensor tables into canonical sections.
//!
//! A [`RuleSet`] is an ordered list of [`FieldRule`]s. Each rule sums (or conditionally
//! overlays) raw columns into one canonical field, optionally converts units and applies a
//! hydrostatic correction, then routes the result to a fixed section or through a time
//! windowed [`Plan`]. [`RuleEngine::run`] evaluates the rules once each, in order.

pub mod config;
pub mod correction;
pub mod engine;
pub mod plan;
pub mod table;

mod conditions;

pub use config::{
    Assignment, Condition, ConditionKind, FieldRule, RuleSet, SensorPosition, UnitConversion,
    UnitOperation,
};
pub use correction::{hydrostatic_pressure, surface_to_downhole, GRAVITY_M_S2, WATER_DENSITY_KG_M3};
pub use engine::RuleEngine;
pub use plan::{Plan, PlanInterval};
pub use table::RawTable;
