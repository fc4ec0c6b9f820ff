use std::collections::HashMap;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::RealValue;
use crate::section::{Section, SectionGeometry};

/// Wellhead position of a borehole.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub longitude: RealValue,
    pub latitude: RealValue,
    pub altitude: RealValue,
}

impl Location {
    pub fn origin() -> Self {
        Self {
            longitude: RealValue::new(0.0),
            latitude: RealValue::new(0.0),
            altitude: RealValue::new(0.0),
        }
    }
}

/// A borehole owning its sections. Sections are kept in insertion order and indexed by id
/// and by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Borehole {
    id: Uuid,
    pub location: Location,
    pub bedrockaltitude: Option<RealValue>,
    pub measureddepth: Option<RealValue>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location_name: Option<String>,
    pub institution: Option<String>,
    sections: HashMap<Uuid, Section>,
    order: Vec<Uuid>,
    names: HashMap<String, Uuid>,
}

impl Borehole {
    pub fn new(id: Uuid, location: Location) -> Self {
        Self {
            id,
            location,
            bedrockaltitude: None,
            measureddepth: None,
            name: None,
            description: None,
            location_name: None,
            institution: None,
            sections: HashMap::new(),
            order: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Borehole at the origin with `sections` closed sections reaching one metre deep. Used to
    /// carry hydraulic data that comes without metadata.
    pub fn placeholder(sections: usize) -> Self {
        let mut borehole = Borehole::new(Uuid::new_v4(), Location::origin());
        for _ in 0..sections {
            let section = Section::new(Uuid::new_v4(), SectionGeometry::vertical(0.0, -1.0));
            borehole.order.push(section.id());
            borehole.sections.insert(section.id(), section);
        }
        borehole
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn reference_altitude(&self) -> f64 {
        self.location.altitude.value
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Adds a section. Ids and names must be unique within the borehole.
    pub fn insert_section(&mut self, section: Section) -> Result<(), StoreError> {
        if self.sections.contains_key(&section.id()) {
            return Err(StoreError::Validation(format!(
                "section {} already exists in borehole {}",
                section.id(),
                self.id
            )));
        }
        if let Some(name) = section.name() {
            if self.names.contains_key(name) {
                return Err(StoreError::Validation(format!(
                    "section name '{name}' is already used in borehole {}",
                    self.id
                )));
            }
        }

        self.order.push(section.id());
        self.sections.insert(section.id(), section);
        self.rebuild_names();
        Ok(())
    }

    pub fn remove_section(&mut self, id: Uuid) -> Result<Section, StoreError> {
        let section = self
            .sections
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("section", id))?;
        self.order.retain(|candidate| *candidate != id);
        self.rebuild_names();
        Ok(section)
    }

    pub fn contains_section(&self, id: Uuid) -> bool {
        self.sections.contains_key(&id)
    }

    pub fn section(&self, id: Uuid) -> Result<&Section, StoreError> {
        self.sections
            .get(&id)
            .ok_or_else(|| StoreError::not_found("section", id))
    }

    pub fn section_mut(&mut self, id: Uuid) -> Result<&mut Section, StoreError> {
        self.sections
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("section", id))
    }

    pub fn section_by_name(&self, name: &str) -> Result<&Section, StoreError> {
        let id = self.section_id(name)?;
        self.section(id)
    }

    pub fn section_by_name_mut(&mut self, name: &str) -> Result<&mut Section, StoreError> {
        let id = self.section_id(name)?;
        self.section_mut(id)
    }

    pub fn section_id(&self, name: &str) -> Result<Uuid, StoreError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::not_found("section name", name))
    }

    /// Sections in insertion order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.order.iter().filter_map(|id| self.sections.get(id))
    }

    /// Copy of the borehole with every section restricted to `start <= timestamp <= end`.
    pub fn query(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Borehole {
        let mut result = self.without_sections();
        for section in self.sections() {
            result.order.push(section.id());
            result
                .sections
                .insert(section.id(), section.query(start, end));
        }
        result.names = self.names.clone();
        result
    }

    /// Copy of the borehole metadata without any sections.
    pub fn without_sections(&self) -> Borehole {
        Borehole {
            id: self.id,
            location: self.location.clone(),
            bedrockaltitude: self.bedrockaltitude,
            measureddepth: self.measureddepth,
            name: self.name.clone(),
            description: self.description.clone(),
            location_name: self.location_name.clone(),
            institution: self.institution.clone(),
            sections: HashMap::new(),
            order: Vec::new(),
            names: HashMap::new(),
        }
    }

    fn rebuild_names(&mut self) {
        self.names = self
            .order
            .iter()
            .filter_map(|id| self.sections.get(id))
            .filter_map(|section| section.name().map(|name| (name.to_string(), section.id())))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Section {
        Section::new(Uuid::new_v4(), SectionGeometry::vertical(0.0, -10.0)).with_name(name)
    }

    #[test]
    fn name_index_follows_inserts_and_removals() {
        let mut borehole = Borehole::new(Uuid::new_v4(), Location::origin());
        let first = named("int-1");
        let first_id = first.id();
        borehole.insert_section(first).unwrap();
        borehole.insert_section(named("int-2")).unwrap();

        assert_eq!(borehole.section_by_name("int-1").unwrap().id(), first_id);

        borehole.remove_section(first_id).unwrap();
        assert!(matches!(
            borehole.section_by_name("int-1"),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(borehole.len(), 1);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut borehole = Borehole::new(Uuid::new_v4(), Location::origin());
        borehole.insert_section(named("int-1")).unwrap();
        assert!(matches!(
            borehole.insert_section(named("int-1")),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn placeholder_sections_are_closed_and_one_metre_deep() {
        let borehole = Borehole::placeholder(3);
        assert_eq!(borehole.len(), 3);
        for section in borehole.sections() {
            assert_eq!(section.bottom_altitude(), -1.0);
            assert!(section.geometry.topclosed && section.geometry.bottomclosed);
        }
    }
}
