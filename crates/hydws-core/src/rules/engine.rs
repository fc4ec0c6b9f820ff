use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::error::{RuleError, StoreError};
use crate::series::HydraulicSeries;
use crate::store::{HydraulicStore, SectionKey};

use super::conditions::apply_conditions;
use super::config::{Assignment, FieldRule, RuleSet};
use super::correction::surface_to_downhole;
use super::plan::Plan;
use super::table::RawTable;

/// Column computed by one rule before routing.
#[derive(Debug, Clone, PartialEq)]
struct DerivedColumn {
    points: Vec<(NaiveDateTime, f64)>,
}

impl DerivedColumn {
    fn is_zero(&self) -> bool {
        self.points.iter().all(|(_, value)| *value == 0.0)
    }
}

#[derive(Debug, Default)]
struct RunSummary {
    applied: usize,
    skipped: usize,
    merges: usize,
}

/// Applies an ordered rule set to raw tables, writing into sections of a metadata catalogue.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: RuleSet,
    catalogue: HydraulicStore,
    plans: HashMap<String, Plan>,
}

impl RuleEngine {
    pub fn new(rules: RuleSet, catalogue: HydraulicStore) -> Self {
        Self {
            rules,
            catalogue,
            plans: HashMap::new(),
        }
    }

    pub fn with_plan(mut self, reference: impl Into<String>, plan: Plan) -> Self {
        self.add_plan(reference, plan);
        self
    }

    pub fn add_plan(&mut self, reference: impl Into<String>, plan: Plan) {
        self.plans.insert(reference.into(), plan);
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn catalogue(&self) -> &HydraulicStore {
        &self.catalogue
    }

    /// Checks every output field, assignment target and plan before any data is touched.
    pub fn validate(&self) -> Result<(), RuleError> {
        for (idx, rule) in self.rules.rules().iter().enumerate() {
            rule.check_output_field(&format!("rule {idx}"))?;
            match &rule.assign_to {
                Assignment::Section(reference) => {
                    self.catalogue.resolve_section(reference)?;
                }
                Assignment::Plan(reference) => {
                    let plan = self.plan(reference).map_err(|_| {
                        RuleError::config(
                            format!("rule {idx}"),
                            format!("plan '{reference}' was not provided"),
                        )
                    })?;
                    plan.validate(reference)?;
                    for interval in plan.intervals() {
                        self.catalogue.resolve_section(&interval.target_section)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs every rule once, in order, and returns the sections that received data.
    pub fn run(&self, table: &RawTable) -> Result<HydraulicStore, RuleError> {
        self.validate()?;

        let mut output = HydraulicStore::new();
        let mut summary = RunSummary::default();

        for (idx, rule) in self.rules.rules().iter().enumerate() {
            let Some(column) = self.derive(idx, rule, table) else {
                summary.skipped += 1;
                continue;
            };

            let routed = self.route(rule, &column)?;
            if routed.is_empty() {
                debug!(rule = idx, field = %rule.output_field, "no plan interval matched, skipped");
                summary.skipped += 1;
                continue;
            }

            for (key, points) in routed {
                let series = self.finish(rule, key, points)?;
                self.write(&mut output, key, series)?;
                summary.merges += 1;
            }
            summary.applied += 1;
        }

        info!(
            rules = self.rules.len(),
            applied = summary.applied,
            skipped = summary.skipped,
            merges = summary.merges,
            boreholes = output.len(),
            "rule run finished"
        );
        Ok(output)
    }

    /// Base column of a rule: plain sum, or the condition overlay. `None` when the rule has
    /// nothing to contribute.
    fn derive(&self, idx: usize, rule: &FieldRule, table: &RawTable) -> Option<DerivedColumn> {
        let mut selected: Vec<&str> = Vec::new();
        for name in &rule.source_columns {
            if table.has_column(name) && !selected.contains(&name.as_str()) {
                selected.push(name);
            }
        }
        if selected.is_empty() || table.is_empty() {
            debug!(rule = idx, field = %rule.output_field, "no source columns present, skipped");
            return None;
        }

        let values = if rule.conditions.is_empty() {
            table.sum_columns(selected.iter().copied())
        } else {
            apply_conditions(table, &selected, &rule.conditions)
        };

        let column = DerivedColumn {
            points: table.timestamps().iter().copied().zip(values).collect(),
        };
        if column.is_zero() {
            debug!(rule = idx, field = %rule.output_field, "result is identically zero, skipped");
            return None;
        }
        Some(column)
    }

    /// Splits a column into per-section slices, one per non-empty plan window, in plan order.
    /// Each slice is merged on its own, so a plan that returns to a section it already filled
    /// is a merge conflict.
    fn route(
        &self,
        rule: &FieldRule,
        column: &DerivedColumn,
    ) -> Result<Vec<(SectionKey, Vec<(NaiveDateTime, f64)>)>, RuleError> {
        match &rule.assign_to {
            Assignment::Section(reference) => {
                let key = self.catalogue.resolve_section(reference)?;
                Ok(vec![(key, column.points.clone())])
            }
            Assignment::Plan(reference) => {
                let plan = self.plan(reference)?;
                let mut routed: Vec<(SectionKey, Vec<(NaiveDateTime, f64)>)> = Vec::new();
                for interval in plan.intervals() {
                    let slice: Vec<(NaiveDateTime, f64)> = column
                        .points
                        .iter()
                        .filter(|(timestamp, _)| interval.contains(*timestamp))
                        .copied()
                        .collect();
                    if slice.is_empty() {
                        debug!(
                            plan = %reference,
                            section = %interval.target_section,
                            "plan interval holds no samples"
                        );
                        continue;
                    }

                    let key = self.catalogue.resolve_section(&interval.target_section)?;
                    routed.push((key, slice));
                }
                Ok(routed)
            }
        }
    }

    /// Unit conversion, then hydrostatic correction against the destination section.
    fn finish(
        &self,
        rule: &FieldRule,
        key: SectionKey,
        mut points: Vec<(NaiveDateTime, f64)>,
    ) -> Result<HydraulicSeries, RuleError> {
        if let Some(conversion) = &rule.unit_conversion {
            for (_, value) in points.iter_mut() {
                *value = conversion.apply(*value);
            }
        }

        if rule.corrects_to_downhole() {
            let reference_altitude = self.catalogue.borehole(key.borehole)?.reference_altitude();
            let bottom_altitude = self.catalogue.section(key.section)?.bottom_altitude();
            for (_, value) in points.iter_mut() {
                *value = surface_to_downhole(*value, reference_altitude, bottom_altitude);
            }
        }

        Ok(HydraulicSeries::from_column(rule.output_field, points))
    }

    fn write(
        &self,
        output: &mut HydraulicStore,
        key: SectionKey,
        series: HydraulicSeries,
    ) -> Result<(), StoreError> {
        if !output.contains_borehole(key.borehole) {
            let borehole = self.catalogue.borehole(key.borehole)?.without_sections();
            output.insert_borehole(borehole)?;
        }
        if !output.contains_section(key.section) {
            let section = self.catalogue.section(key.section)?.metadata();
            output.insert_section(key.borehole, section)?;
        }
        output.section_mut(key.section)?.merge_series(series)
    }

    fn plan(&self, reference: &str) -> Result<&Plan, StoreError> {
        self.plans
            .get(reference)
            .ok_or_else(|| StoreError::not_found("plan", reference))
    }
}
