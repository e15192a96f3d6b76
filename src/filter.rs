use chrono::NaiveDateTime;

use crate::observation::{FieldValue, Observation};

/// What a visibility predicate gets to look at for one observation
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub observation: &'a Observation,
    pub paired: bool,
}

/// Visibility predicate supplied by the presentation layer
pub type Predicate = Box<dyn Fn(&Candidate<'_>) -> bool>;

/// The criteria of the survey filter panel. Every criterion that is set must
/// hold for an observation to stay visible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationFilter {
    pub individual: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub require_position: bool,
    pub require_azimuth: bool,
    pub require_timestamp: bool,
    pub paired_only: bool,
    pub selected_only: bool,
}

impl ObservationFilter {
    pub fn matches(&self, candidate: &Candidate<'_>) -> bool {
        let obs = candidate.observation;

        if let Some(individual) = &self.individual {
            if &obs.individual != individual {
                return false;
            }
        }

        // Rows without a usable timestamp are not excluded by the date range
        if let FieldValue::Valid(ts) = &obs.timestamp {
            if self.start.is_some_and(|start| *ts < start) {
                return false;
            }
            if self.end.is_some_and(|end| *ts > end) {
                return false;
            }
        }

        (!self.require_position || obs.has_valid_position())
            && (!self.require_azimuth || obs.azimuth.is_valid())
            && (!self.require_timestamp || obs.timestamp.is_valid())
            && (!self.paired_only || candidate.paired)
            && (!self.selected_only || obs.selected)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn into_predicate(self) -> Predicate {
        Box::new(move |candidate: &Candidate<'_>| self.matches(candidate))
    }
}
