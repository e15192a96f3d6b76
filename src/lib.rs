//! Bearing observations for radio-tracking surveys.
//!
//! Observations (individual, timestamp, observer position, azimuth) are turned
//! into bearing rays and fixes; observations of the same individual sharing a
//! timestamp are paired and their rays intersected to estimate where the
//! individual was. [`engine::Engine`] keeps all of this consistent as rows are
//! loaded, edited and filtered.

pub mod bearing_index;
pub mod config;
pub mod csv_io;
pub mod engine;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod intersection;
pub mod observation;
pub mod projection;
pub mod view_extent;

pub use engine::{Changes, Engine, FieldEdit, LoadSummary, RowStatus};
pub use error::{EngineError, RadiotrackError};
pub use geometry::{BearingRay, GeoPoint};
pub use observation::{Observation, ObservationId, RawRow};
