use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::bearing_index::{BearingIndex, GroupKey};
use crate::error::EngineError;
use crate::filter::{Candidate, ObservationFilter, Predicate};
use crate::geometry::{build_fix, build_ray, BearingRay, GeoPoint};
use crate::intersection::{centroid, intersect};
use crate::observation::{Column, Observation, ObservationId, RawRow, DEFAULT_DATETIME_FORMAT};

/// Default display length of bearing rays (kilometers)
pub const DEFAULT_RAY_LENGTH_KM: f64 = 1.0;

/// A single cell edit
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Individual(String),
    Timestamp(String),
    Latitude(String),
    Longitude(String),
    Azimuth(String),
    Selected(bool),
}

impl FieldEdit {
    pub fn for_column(column: Column, text: &str) -> Self {
        let text = text.to_string();
        match column {
            Column::Individual => FieldEdit::Individual(text),
            Column::Timestamp => FieldEdit::Timestamp(text),
            Column::Latitude => FieldEdit::Latitude(text),
            Column::Longitude => FieldEdit::Longitude(text),
            Column::Azimuth => FieldEdit::Azimuth(text),
        }
    }
}

/// Visible set after a filter pass, and how it moved since the previous pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityDelta {
    pub visible: BTreeSet<ObservationId>,
    pub added: BTreeSet<ObservationId>,
    pub removed: BTreeSet<ObservationId>,
}

impl VisibilityDelta {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Which derived values an event touched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    /// Rays and fixes recomputed
    pub geometry: BTreeSet<ObservationId>,
    /// Group membership changed
    pub pairing: BTreeSet<ObservationId>,
    /// Intersections recomputed
    pub intersections: BTreeSet<ObservationId>,
    pub visibility: VisibilityDelta,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows: usize,
    pub invalid_rows: usize,
    pub groups: usize,
    pub paired: usize,
    pub intersections: usize,
}

/// Row state used to colour the observation table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Invalid,
    Paired,
    Valid,
}

/// Owns the observation table and everything derived from it: rays, fixes,
/// the bearing index, intersections and visibility.
///
/// Derived collections are indexed like the table (`id - 1`), so every
/// observation always has exactly one slot in each of them.
pub struct Engine {
    observations: Vec<Observation>,
    fixes: Vec<Option<GeoPoint>>,
    rays: Vec<Option<BearingRay>>,
    intersections: Vec<Option<GeoPoint>>,
    visible: Vec<bool>,
    index: BearingIndex,
    filter: Option<Predicate>,
    ray_length_km: f64,
    datetime_format: String,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            observations: Vec::new(),
            fixes: Vec::new(),
            rays: Vec::new(),
            intersections: Vec::new(),
            visible: Vec::new(),
            index: BearingIndex::new(),
            filter: None,
            ray_length_km: DEFAULT_RAY_LENGTH_KM,
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
        }
    }
}

impl Engine {
    pub fn new(ray_length_km: f64, datetime_format: &str) -> Result<Self, EngineError> {
        validate_ray_length(ray_length_km)?;
        validate_datetime_format(datetime_format)?;
        Ok(Self {
            ray_length_km,
            datetime_format: datetime_format.to_string(),
            ..Self::default()
        })
    }

    /// Replace the whole table. Ids are assigned in row order, starting at 1.
    pub fn load<I>(&mut self, rows: I) -> LoadSummary
    where
        I: IntoIterator<Item = RawRow>,
    {
        self.clear();

        for (index, row) in rows.into_iter().enumerate() {
            let id = ObservationId::from_index(index);
            let observation = Observation::parse(id, &row, &self.datetime_format);
            for column in observation.invalid_columns() {
                warn!(observation = %id, column = column.header(), "Error reading column");
            }
            self.observations.push(observation);
        }

        let n = self.observations.len();
        self.fixes = self.observations.iter().map(build_fix).collect();
        self.rays = self
            .observations
            .iter()
            .map(|obs| build_ray(obs, self.ray_length_km))
            .collect();
        self.index.load(
            self.observations
                .iter()
                .map(|obs| (obs.id, GroupKey::for_observation(obs))),
        );
        self.intersections = vec![None; n];
        self.recompute_all_intersections();
        self.visible = vec![true; n];

        let summary = LoadSummary {
            rows: n,
            invalid_rows: self.observations.iter().filter(|o| !o.is_valid()).count(),
            groups: self.index.group_count(),
            paired: self.index.pairs().len(),
            intersections: self.intersections.iter().flatten().count(),
        };
        debug!(?summary, "Observations loaded");
        summary
    }

    /// Drop the table and all derived state
    pub fn clear(&mut self) {
        self.observations.clear();
        self.fixes.clear();
        self.rays.clear();
        self.intersections.clear();
        self.visible.clear();
        self.index.clear();
        self.filter = None;
    }

    /// Apply one cell edit and bring derived state back in line with it.
    pub fn edit(&mut self, id: ObservationId, edit: FieldEdit) -> Result<Changes, EngineError> {
        let slot = self.slot(id)?;
        let mut changes = Changes::default();
        let datetime_format = self.datetime_format.clone();
        let observation = &mut self.observations[slot];

        match edit {
            FieldEdit::Latitude(text) => {
                let before = observation.latitude.clone();
                observation.set_latitude(&text);
                if observation.latitude != before {
                    self.geometry_changed(slot, &mut changes);
                }
            }
            FieldEdit::Longitude(text) => {
                let before = observation.longitude.clone();
                observation.set_longitude(&text);
                if observation.longitude != before {
                    self.geometry_changed(slot, &mut changes);
                }
            }
            FieldEdit::Azimuth(text) => {
                let before = observation.azimuth.clone();
                observation.set_azimuth(&text);
                if observation.azimuth != before {
                    self.geometry_changed(slot, &mut changes);
                }
            }
            FieldEdit::Individual(text) => {
                observation.individual = text;
                self.rekey(slot, &mut changes);
            }
            FieldEdit::Timestamp(text) => {
                observation.set_timestamp(&text, &datetime_format);
                self.rekey(slot, &mut changes);
            }
            FieldEdit::Selected(selected) => {
                observation.selected = selected;
            }
        }

        changes.visibility = self.refilter();
        debug!(
            observation = %id,
            geometry = changes.geometry.len(),
            pairing = changes.pairing.len(),
            intersections = changes.intersections.len(),
            "Observation edited"
        );
        Ok(changes)
    }

    /// Change the display length of every ray. Fixes and pairings are
    /// untouched; every ray and intersection is reported as changed.
    pub fn set_ray_length(&mut self, ray_length_km: f64) -> Result<Changes, EngineError> {
        validate_ray_length(ray_length_km)?;
        self.ray_length_km = ray_length_km;

        let mut changes = Changes::default();
        for (slot, observation) in self.observations.iter().enumerate() {
            self.rays[slot] = build_ray(observation, ray_length_km);
            changes.geometry.insert(observation.id);
        }
        self.recompute_all_intersections();
        changes.intersections = changes.geometry.clone();
        changes.visibility = self.refilter();

        debug!(ray_length_km, rays = changes.geometry.len(), "Ray length changed");
        Ok(changes)
    }

    /// Re-read every timestamp with another format, re-pairing rows whose
    /// parsed value changed.
    pub fn set_datetime_format(&mut self, datetime_format: &str) -> Result<Changes, EngineError> {
        validate_datetime_format(datetime_format)?;
        self.datetime_format = datetime_format.to_string();

        let mut changes = Changes::default();
        for slot in 0..self.observations.len() {
            let before = self.observations[slot].timestamp.clone();
            self.observations[slot].reparse_timestamp(datetime_format);
            if self.observations[slot].timestamp != before {
                self.rekey(slot, &mut changes);
            }
        }

        changes.visibility = self.refilter();
        debug!(
            datetime_format,
            pairing = changes.pairing.len(),
            "Timestamp format changed"
        );
        Ok(changes)
    }

    /// Install a visibility predicate and report what it showed or hid.
    pub fn set_filter<F>(&mut self, predicate: F) -> VisibilityDelta
    where
        F: Fn(&Candidate<'_>) -> bool + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self.refilter()
    }

    pub fn apply_filter(&mut self, filter: ObservationFilter) -> VisibilityDelta {
        if filter.is_empty() {
            return self.clear_filter();
        }
        self.filter = Some(filter.into_predicate());
        self.refilter()
    }

    pub fn clear_filter(&mut self) -> VisibilityDelta {
        self.filter = None;
        self.refilter()
    }

    /// Re-evaluate the current predicate against the table
    pub fn refilter(&mut self) -> VisibilityDelta {
        let visible: Vec<bool> = match &self.filter {
            Some(predicate) => self
                .observations
                .iter()
                .map(|observation| {
                    predicate(&Candidate {
                        observation,
                        paired: self.index.is_paired(observation.id),
                    })
                })
                .collect(),
            None => vec![true; self.observations.len()],
        };

        let mut delta = VisibilityDelta::default();
        for (slot, (&now, &before)) in visible.iter().zip(&self.visible).enumerate() {
            let id = ObservationId::from_index(slot);
            if now {
                delta.visible.insert(id);
            }
            if now && !before {
                delta.added.insert(id);
            } else if !now && before {
                delta.removed.insert(id);
            }
        }
        self.visible = visible;

        if !delta.is_unchanged() {
            debug!(
                visible = delta.visible.len(),
                added = delta.added.len(),
                removed = delta.removed.len(),
                "Visibility changed"
            );
        }
        delta
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn ray_length_km(&self) -> f64 {
        self.ray_length_km
    }

    pub fn datetime_format(&self) -> &str {
        &self.datetime_format
    }

    pub fn index(&self) -> &BearingIndex {
        &self.index
    }

    pub fn observation(&self, id: ObservationId) -> Option<&Observation> {
        self.observations.get(self.slot(id).ok()?)
    }

    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    pub fn fix(&self, id: ObservationId) -> Option<GeoPoint> {
        *self.fixes.get(self.slot(id).ok()?)?
    }

    pub fn ray(&self, id: ObservationId) -> Option<BearingRay> {
        *self.rays.get(self.slot(id).ok()?)?
    }

    pub fn intersection(&self, id: ObservationId) -> Option<GeoPoint> {
        *self.intersections.get(self.slot(id).ok()?)?
    }

    pub fn fixes(&self) -> impl Iterator<Item = (ObservationId, Option<GeoPoint>)> + '_ {
        with_ids(&self.fixes)
    }

    pub fn rays(&self) -> impl Iterator<Item = (ObservationId, Option<BearingRay>)> + '_ {
        with_ids(&self.rays)
    }

    pub fn intersections(&self) -> impl Iterator<Item = (ObservationId, Option<GeoPoint>)> + '_ {
        with_ids(&self.intersections)
    }

    pub fn is_paired(&self, id: ObservationId) -> bool {
        self.index.is_paired(id)
    }

    pub fn pairing_partner(&self, id: ObservationId) -> Option<ObservationId> {
        self.index.partner(id)
    }

    pub fn is_visible(&self, id: ObservationId) -> bool {
        self.slot(id).is_ok_and(|slot| self.visible[slot])
    }

    pub fn visible_ids(&self) -> impl Iterator<Item = ObservationId> + '_ {
        self.visible
            .iter()
            .enumerate()
            .filter(|(_, visible)| **visible)
            .map(|(slot, _)| ObservationId::from_index(slot))
    }

    /// Location estimate for the whole group of `id`: the mean of every
    /// pairwise crossing among its members.
    pub fn group_estimate(&self, id: ObservationId) -> Option<GeoPoint> {
        if !self.index.is_paired(id) {
            return None;
        }
        let members: Vec<ObservationId> = self.index.members(id).collect();
        let mut crossings = Vec::new();
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                let ray_a = self.ray(*a);
                let ray_b = self.ray(*b);
                if let Some(point) = intersect(ray_a.as_ref(), ray_b.as_ref()) {
                    crossings.push(point);
                }
            }
        }
        centroid(&crossings)
    }

    pub fn row_status(&self, id: ObservationId) -> Option<RowStatus> {
        let observation = self.observation(id)?;
        Some(if !observation.is_valid() {
            RowStatus::Invalid
        } else if self.index.is_paired(id) {
            RowStatus::Paired
        } else {
            RowStatus::Valid
        })
    }

    /// Distinct tracked individuals, sorted
    pub fn individuals(&self) -> Vec<String> {
        self.observations
            .iter()
            .map(|obs| obs.individual.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Earliest and latest valid timestamps
    pub fn timestamp_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut timestamps = self.observations.iter().filter_map(|o| o.timestamp.value());
        let first = timestamps.next()?;
        Some(timestamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts))))
    }

    pub fn selected_rows(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(|obs| obs.selected)
    }

    fn slot(&self, id: ObservationId) -> Result<usize, EngineError> {
        let slot = id.index();
        if id.0 == 0 || slot >= self.observations.len() {
            return Err(EngineError::UnknownObservation(id));
        }
        Ok(slot)
    }

    fn geometry_changed(&mut self, slot: usize, changes: &mut Changes) {
        let observation = &self.observations[slot];
        self.fixes[slot] = build_fix(observation);
        self.rays[slot] = build_ray(observation, self.ray_length_km);
        changes.geometry.insert(observation.id);

        // Anyone in the group may use this ray as its partner's
        let members: BTreeSet<ObservationId> = self.index.members(observation.id).collect();
        self.recompute_intersections(&members, changes);
    }

    fn rekey(&mut self, slot: usize, changes: &mut Changes) {
        let observation = &self.observations[slot];
        let affected = self
            .index
            .update(observation.id, GroupKey::for_observation(observation));
        if affected.is_empty() {
            return;
        }
        self.recompute_intersections(&affected, changes);
        changes.pairing.extend(affected);
    }

    fn recompute_intersections(&mut self, ids: &BTreeSet<ObservationId>, changes: &mut Changes) {
        for &id in ids {
            self.intersections[id.index()] = self.compute_intersection(id);
            changes.intersections.insert(id);
        }
    }

    fn recompute_all_intersections(&mut self) {
        for slot in 0..self.observations.len() {
            self.intersections[slot] = self.compute_intersection(ObservationId::from_index(slot));
        }
    }

    fn compute_intersection(&self, id: ObservationId) -> Option<GeoPoint> {
        let partner = self.index.partner(id)?;
        intersect(
            self.rays[id.index()].as_ref(),
            self.rays[partner.index()].as_ref(),
        )
    }
}

fn with_ids<T: Copy>(
    values: &[Option<T>],
) -> impl Iterator<Item = (ObservationId, Option<T>)> + '_ {
    values
        .iter()
        .enumerate()
        .map(|(slot, value)| (ObservationId::from_index(slot), *value))
}

fn validate_ray_length(ray_length_km: f64) -> Result<(), EngineError> {
    if ray_length_km.is_finite() && ray_length_km > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidRayLength(ray_length_km))
    }
}

fn validate_datetime_format(datetime_format: &str) -> Result<(), EngineError> {
    let broken = datetime_format.trim().is_empty()
        || StrftimeItems::new(datetime_format).any(|item| matches!(item, Item::Error));
    if broken {
        return Err(EngineError::InvalidDatetimeFormat(datetime_format.to_string()));
    }
    Ok(())
}
