use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::observation::{FieldValue, Observation, ObservationId};

/// Timestamp part of a group key. Unparsed timestamps still get a group so
/// that every observation belongs to exactly one, but they never pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimestampKey {
    Valid(NaiveDateTime),
    Unparsed(String),
}

impl TimestampKey {
    pub fn is_valid(&self) -> bool {
        matches!(self, TimestampKey::Valid(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub individual: String,
    pub timestamp: TimestampKey,
}

impl GroupKey {
    pub fn new(individual: &str, timestamp: TimestampKey) -> Self {
        Self {
            individual: individual.to_string(),
            timestamp,
        }
    }

    pub fn for_observation(observation: &Observation) -> Self {
        let timestamp = match &observation.timestamp {
            FieldValue::Valid(ts) => TimestampKey::Valid(*ts),
            FieldValue::Invalid { .. } => {
                TimestampKey::Unparsed(observation.timestamp_text.trim().to_string())
            }
        };
        Self::new(&observation.individual, timestamp)
    }
}

/// Groups of observations sharing an individual and a timestamp.
///
/// Groups live in a keyed arena; `keys` is the reverse index from an
/// observation to its current group, so re-keying one observation touches
/// exactly two groups. Emptied groups are dropped.
#[derive(Debug, Default, Clone)]
pub struct BearingIndex {
    groups: BTreeMap<GroupKey, BTreeSet<ObservationId>>,
    keys: HashMap<ObservationId, GroupKey>,
}

impl BearingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.keys.clear();
    }

    /// Rebuild the whole index from scratch
    pub fn load<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (ObservationId, GroupKey)>,
    {
        self.clear();
        for (id, key) in entries {
            self.insert(id, key);
        }
    }

    /// Move `id` to the group of `key`.
    ///
    /// Returns every observation whose group changed: the members of the
    /// previous group and of the new one. Empty when `id` already had `key`.
    pub fn update(&mut self, id: ObservationId, key: GroupKey) -> BTreeSet<ObservationId> {
        let mut affected = BTreeSet::new();

        if self.keys.get(&id) == Some(&key) {
            return affected;
        }

        if let Some(previous) = self.keys.remove(&id) {
            affected.extend(self.detach(id, &previous));
            affected.insert(id);
        }

        self.insert(id, key.clone());
        if let Some(members) = self.groups.get(&key) {
            affected.extend(members.iter().copied());
        }

        affected
    }

    /// Drop `id` from the index, returning the remaining members of its group
    pub fn remove(&mut self, id: ObservationId) -> BTreeSet<ObservationId> {
        match self.keys.remove(&id) {
            Some(previous) => self.detach(id, &previous),
            None => BTreeSet::new(),
        }
    }

    pub fn is_paired(&self, id: ObservationId) -> bool {
        match self.keys.get(&id) {
            Some(key) if key.timestamp.is_valid() => {
                self.groups.get(key).map_or(0, BTreeSet::len) >= 2
            }
            _ => false,
        }
    }

    /// Designated partner used for intersections: the smallest other member
    /// of the group. Symmetric for groups of two.
    pub fn partner(&self, id: ObservationId) -> Option<ObservationId> {
        if !self.is_paired(id) {
            return None;
        }
        self.members(id).find(|&other| other != id)
    }

    /// Every other observation paired with `id`
    pub fn partners(&self, id: ObservationId) -> Vec<ObservationId> {
        if !self.is_paired(id) {
            return Vec::new();
        }
        self.members(id).filter(|&other| other != id).collect()
    }

    /// Members of the group `id` currently belongs to, `id` included
    pub fn members(&self, id: ObservationId) -> impl Iterator<Item = ObservationId> + '_ {
        self.keys
            .get(&id)
            .and_then(|key| self.groups.get(key))
            .into_iter()
            .flat_map(|members| members.iter().copied())
    }

    pub fn group_of(&self, id: ObservationId) -> Option<&GroupKey> {
        self.keys.get(&id)
    }

    pub fn pairs(&self) -> BTreeMap<ObservationId, ObservationId> {
        let mut pairs = BTreeMap::new();
        for (key, members) in &self.groups {
            if !key.timestamp.is_valid() || members.len() < 2 {
                continue;
            }
            // Members are ordered: the first one partners everybody else,
            // and is itself partnered with the second.
            let mut iter = members.iter().copied();
            if let (Some(first), Some(second)) = (iter.next(), iter.next()) {
                pairs.insert(first, second);
                pairs.insert(second, first);
                for other in iter {
                    pairs.insert(other, first);
                }
            }
        }
        pairs
    }

    pub fn groups(&self) -> impl Iterator<Item = (&GroupKey, &BTreeSet<ObservationId>)> {
        self.groups.iter()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of indexed observations
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn insert(&mut self, id: ObservationId, key: GroupKey) {
        if let Some(previous) = self.keys.insert(id, key.clone()) {
            self.detach(id, &previous);
        }
        self.groups.entry(key).or_default().insert(id);
    }

    fn detach(&mut self, id: ObservationId, key: &GroupKey) -> BTreeSet<ObservationId> {
        let mut remaining = BTreeSet::new();
        if let Some(members) = self.groups.get_mut(key) {
            members.remove(&id);
            if members.is_empty() {
                self.groups.remove(key);
            } else {
                remaining.extend(members.iter().copied());
            }
        }
        remaining
    }
}
