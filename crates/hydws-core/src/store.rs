use std::collections::HashMap;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::borehole::Borehole;
use crate::error::StoreError;
use crate::section::Section;

/// Address of a section inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionKey {
    pub borehole: Uuid,
    pub section: Uuid,
}

/// Catalogue of boreholes with store-wide section indexes by id and by name.
#[derive(Debug, Clone, Default)]
pub struct HydraulicStore {
    boreholes: HashMap<Uuid, Borehole>,
    order: Vec<Uuid>,
    section_owners: HashMap<Uuid, Uuid>,
    section_names: HashMap<String, SectionKey>,
}

impl HydraulicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Adds a borehole with all of its sections. Section ids and names must be unique across
    /// the store.
    pub fn insert_borehole(&mut self, borehole: Borehole) -> Result<(), StoreError> {
        if self.boreholes.contains_key(&borehole.id()) {
            return Err(StoreError::Validation(format!(
                "borehole {} already exists",
                borehole.id()
            )));
        }
        for section in borehole.sections() {
            self.check_section_free(section)?;
        }
        self.order.push(borehole.id());
        self.boreholes.insert(borehole.id(), borehole);
        self.rebuild_indexes();
        Ok(())
    }

    pub fn remove_borehole(&mut self, id: Uuid) -> Result<Borehole, StoreError> {
        let borehole = self
            .boreholes
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("borehole", id))?;
        self.order.retain(|candidate| *candidate != id);
        self.rebuild_indexes();
        Ok(borehole)
    }

    pub fn insert_section(&mut self, borehole: Uuid, section: Section) -> Result<(), StoreError> {
        self.check_section_free(&section)?;
        self.boreholes
            .get_mut(&borehole)
            .ok_or_else(|| StoreError::not_found("borehole", borehole))?
            .insert_section(section)?;
        self.rebuild_indexes();
        Ok(())
    }

    pub fn remove_section(&mut self, id: Uuid) -> Result<Section, StoreError> {
        let owner = self.borehole_of(id)?;
        let section = self
            .boreholes
            .get_mut(&owner)
            .ok_or_else(|| StoreError::not_found("borehole", owner))?
            .remove_section(id)?;
        self.rebuild_indexes();
        Ok(section)
    }

    pub fn contains_borehole(&self, id: Uuid) -> bool {
        self.boreholes.contains_key(&id)
    }

    pub fn contains_section(&self, id: Uuid) -> bool {
        self.section_owners.contains_key(&id)
    }

    pub fn borehole(&self, id: Uuid) -> Result<&Borehole, StoreError> {
        self.boreholes
            .get(&id)
            .ok_or_else(|| StoreError::not_found("borehole", id))
    }

    /// Boreholes in insertion order.
    pub fn boreholes(&self) -> impl Iterator<Item = &Borehole> {
        self.order.iter().filter_map(|id| self.boreholes.get(id))
    }

    pub fn borehole_of(&self, section: Uuid) -> Result<Uuid, StoreError> {
        self.section_owners
            .get(&section)
            .copied()
            .ok_or_else(|| StoreError::not_found("section", section))
    }

    pub fn section(&self, id: Uuid) -> Result<&Section, StoreError> {
        let owner = self.borehole_of(id)?;
        self.borehole(owner)?.section(id)
    }

    pub fn section_mut(&mut self, id: Uuid) -> Result<&mut Section, StoreError> {
        let owner = self.borehole_of(id)?;
        self.boreholes
            .get_mut(&owner)
            .ok_or_else(|| StoreError::not_found("borehole", owner))?
            .section_mut(id)
    }

    pub fn section_by_name(&self, name: &str) -> Result<&Section, StoreError> {
        let key = self.section_key(name)?;
        self.borehole(key.borehole)?.section(key.section)
    }

    pub fn section_key(&self, name: &str) -> Result<SectionKey, StoreError> {
        self.section_names
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::not_found("section name", name))
    }

    /// Resolves a section reference given either as a UUID or as a section name.
    pub fn resolve_section(&self, reference: &str) -> Result<SectionKey, StoreError> {
        if let Ok(id) = Uuid::parse_str(reference) {
            if let Some(owner) = self.section_owners.get(&id) {
                return Ok(SectionKey {
                    borehole: *owner,
                    section: id,
                });
            }
        }
        self.section_key(reference)
    }

    /// Copy of the store with every series restricted to `start <= timestamp <= end`.
    pub fn query(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> HydraulicStore {
        HydraulicStore {
            boreholes: self
                .boreholes
                .iter()
                .map(|(id, borehole)| (*id, borehole.query(start, end)))
                .collect(),
            order: self.order.clone(),
            section_owners: self.section_owners.clone(),
            section_names: self.section_names.clone(),
        }
    }

    fn check_section_free(&self, section: &Section) -> Result<(), StoreError> {
        if self.section_owners.contains_key(&section.id()) {
            return Err(StoreError::Validation(format!(
                "section {} already exists in the store",
                section.id()
            )));
        }
        if let Some(name) = section.name() {
            if self.section_names.contains_key(name) {
                return Err(StoreError::Validation(format!(
                    "section name '{name}' is already used in the store"
                )));
            }
        }
        Ok(())
    }

    fn rebuild_indexes(&mut self) {
        self.section_owners.clear();
        self.section_names.clear();
        for borehole_id in &self.order {
            let Some(borehole) = self.boreholes.get(borehole_id) else {
                continue;
            };
            for section in borehole.sections() {
                self.section_owners.insert(section.id(), *borehole_id);
                if let Some(name) = section.name() {
                    self.section_names.insert(
                        name.to_string(),
                        SectionKey {
                            borehole: *borehole_id,
                            section: section.id(),
                        },
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::borehole::Location;
    use crate::section::SectionGeometry;

    fn borehole_with(names: &[&str]) -> Borehole {
        let mut borehole = Borehole::new(Uuid::new_v4(), Location::origin());
        for name in names {
            let section =
                Section::new(Uuid::new_v4(), SectionGeometry::vertical(0.0, -5.0)).with_name(*name);
            borehole.insert_section(section).unwrap();
        }
        borehole
    }

    #[test]
    fn sections_resolve_by_id_and_name() {
        let mut store = HydraulicStore::new();
        let borehole = borehole_with(&["a", "b"]);
        let borehole_id = borehole.id();
        let b_id = borehole.section_by_name("b").unwrap().id();
        store.insert_borehole(borehole).unwrap();

        assert_eq!(store.borehole_of(b_id).unwrap(), borehole_id);
        assert_eq!(store.resolve_section("b").unwrap().section, b_id);
        assert_eq!(
            store.resolve_section(&b_id.to_string()).unwrap().section,
            b_id
        );
        assert!(matches!(
            store.resolve_section("missing"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn section_names_are_unique_across_boreholes() {
        let mut store = HydraulicStore::new();
        store.insert_borehole(borehole_with(&["a"])).unwrap();
        assert!(matches!(
            store.insert_borehole(borehole_with(&["a"])),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn removing_a_borehole_drops_its_sections() {
        let mut store = HydraulicStore::new();
        let borehole = borehole_with(&["a"]);
        let id = borehole.id();
        store.insert_borehole(borehole).unwrap();
        store.remove_borehole(id).unwrap();

        assert!(store.section_by_name("a").is_err());
        assert!(store.is_empty());
    }
}
