use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use thiserror::Error;

/// Default timestamp layout of survey files
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp layouts offered by the viewer
pub const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%H:%M:%S %d/%m/%Y",
    "%H:%M:%S %m/%d/%Y",
];

/// Identifier assigned by the engine at load time, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationId(pub u32);

impl ObservationId {
    pub fn index(self) -> usize {
        (self.0 as usize).saturating_sub(1)
    }

    pub fn from_index(index: usize) -> Self {
        ObservationId(index as u32 + 1)
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a cell could not be parsed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("empty value")]
    Empty,

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("'{0}' is not a finite number")]
    NotFinite(String),

    #[error("'{text}' does not match timestamp format '{format}'")]
    BadTimestamp { text: String, format: String },
}

/// A parsed cell: either a typed value or the raw text that failed to parse
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<T> {
    Valid(T),
    Invalid { raw: String, error: FieldError },
}

impl<T: Copy> FieldValue<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            FieldValue::Valid(v) => Some(*v),
            FieldValue::Invalid { .. } => None,
        }
    }
}

impl<T> FieldValue<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, FieldValue::Valid(_))
    }

    pub fn error(&self) -> Option<&FieldError> {
        match self {
            FieldValue::Valid(_) => None,
            FieldValue::Invalid { error, .. } => Some(error),
        }
    }

    fn from_result(raw: &str, result: Result<T, FieldError>) -> Self {
        match result {
            Ok(v) => FieldValue::Valid(v),
            Err(error) => FieldValue::Invalid {
                raw: raw.to_string(),
                error,
            },
        }
    }
}

/// Columns of the observation table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Individual,
    Timestamp,
    Latitude,
    Longitude,
    Azimuth,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Individual,
        Column::Timestamp,
        Column::Latitude,
        Column::Longitude,
        Column::Azimuth,
    ];

    /// Header name used in survey CSV files
    pub fn header(&self) -> &'static str {
        match self {
            Column::Individual => "id",
            Column::Timestamp => "datetime",
            Column::Latitude => "lat",
            Column::Longitude => "lon",
            Column::Azimuth => "azi",
        }
    }

    pub fn is_geometry(&self) -> bool {
        matches!(self, Column::Latitude | Column::Longitude | Column::Azimuth)
    }

    pub fn is_pairing_key(&self) -> bool {
        matches!(self, Column::Individual | Column::Timestamp)
    }
}

pub fn parse_coordinate(text: &str) -> Result<f64, FieldError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Empty);
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| FieldError::NotANumber(trimmed.to_string()))?;
    if !value.is_finite() {
        return Err(FieldError::NotFinite(trimmed.to_string()));
    }
    Ok(value)
}

pub fn parse_timestamp(text: &str, format: &str) -> Result<NaiveDateTime, FieldError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Empty);
    }
    // Date-only layouts carry no time fields; such timestamps mean midnight
    NaiveDateTime::parse_from_str(trimmed, format)
        .or_else(|_| {
            NaiveDate::parse_from_str(trimmed, format).map(|date| date.and_time(NaiveTime::MIN))
        })
        .map_err(|_| FieldError::BadTimestamp {
            text: trimmed.to_string(),
            format: format.to_string(),
        })
}

/// One row as handed over by the editing collaborator
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    pub individual: String,
    pub timestamp: Option<String>,
    pub latitude: String,
    pub longitude: String,
    pub azimuth: String,
}

impl RawRow {
    pub fn new(
        individual: &str,
        timestamp: Option<&str>,
        latitude: &str,
        longitude: &str,
        azimuth: &str,
    ) -> Self {
        Self {
            individual: individual.to_string(),
            timestamp: timestamp.map(str::to_string),
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
            azimuth: azimuth.to_string(),
        }
    }
}

/// One bearing record of the survey
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: ObservationId,
    pub individual: String,
    pub timestamp: FieldValue<NaiveDateTime>,
    /// Raw timestamp text, kept so the column can be re-parsed with another format
    pub timestamp_text: String,
    pub latitude: FieldValue<f64>,
    pub longitude: FieldValue<f64>,
    pub azimuth: FieldValue<f64>,
    pub selected: bool,
}

impl Observation {
    pub fn parse(id: ObservationId, row: &RawRow, datetime_format: &str) -> Self {
        let timestamp_text = row.timestamp.clone().unwrap_or_default();
        Self {
            id,
            individual: row.individual.clone(),
            timestamp: FieldValue::from_result(
                &timestamp_text,
                parse_timestamp(&timestamp_text, datetime_format),
            ),
            timestamp_text,
            latitude: FieldValue::from_result(&row.latitude, parse_coordinate(&row.latitude)),
            longitude: FieldValue::from_result(&row.longitude, parse_coordinate(&row.longitude)),
            azimuth: FieldValue::from_result(&row.azimuth, parse_coordinate(&row.azimuth)),
            selected: true,
        }
    }

    pub fn set_latitude(&mut self, text: &str) {
        self.latitude = FieldValue::from_result(text, parse_coordinate(text));
    }

    pub fn set_longitude(&mut self, text: &str) {
        self.longitude = FieldValue::from_result(text, parse_coordinate(text));
    }

    pub fn set_azimuth(&mut self, text: &str) {
        self.azimuth = FieldValue::from_result(text, parse_coordinate(text));
    }

    pub fn set_timestamp(&mut self, text: &str, datetime_format: &str) {
        self.timestamp_text = text.to_string();
        self.reparse_timestamp(datetime_format);
    }

    pub fn reparse_timestamp(&mut self, datetime_format: &str) {
        self.timestamp = FieldValue::from_result(
            &self.timestamp_text,
            parse_timestamp(&self.timestamp_text, datetime_format),
        );
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude.value()?, self.longitude.value()?))
    }

    pub fn has_valid_position(&self) -> bool {
        self.latitude.is_valid() && self.longitude.is_valid()
    }

    pub fn is_valid(&self) -> bool {
        self.has_valid_position() && self.azimuth.is_valid() && self.timestamp.is_valid()
    }

    /// Columns that currently fail to parse
    pub fn invalid_columns(&self) -> Vec<Column> {
        let mut columns = Vec::new();
        if !self.timestamp.is_valid() {
            columns.push(Column::Timestamp);
        }
        if !self.latitude.is_valid() {
            columns.push(Column::Latitude);
        }
        if !self.longitude.is_valid() {
            columns.push(Column::Longitude);
        }
        if !self.azimuth.is_valid() {
            columns.push(Column::Azimuth);
        }
        columns
    }

    /// Text shown for a cell, formatted like the survey file
    pub fn cell_text(&self, column: Column, datetime_format: &str) -> String {
        fn number(value: &FieldValue<f64>) -> String {
            match value {
                FieldValue::Valid(v) => v.to_string(),
                FieldValue::Invalid { raw, .. } => raw.clone(),
            }
        }

        match column {
            Column::Individual => self.individual.clone(),
            Column::Timestamp => match &self.timestamp {
                FieldValue::Valid(ts) => ts.format(datetime_format).to_string(),
                FieldValue::Invalid { .. } => self.timestamp_text.clone(),
            },
            Column::Latitude => number(&self.latitude),
            Column::Longitude => number(&self.longitude),
            Column::Azimuth => number(&self.azimuth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate(" 46.5 "), Ok(46.5));
        assert_eq!(parse_coordinate("-3"), Ok(-3.0));
        assert_eq!(parse_coordinate(""), Err(FieldError::Empty));
        assert_eq!(
            parse_coordinate("abc"),
            Err(FieldError::NotANumber("abc".to_string()))
        );
        assert_eq!(
            parse_coordinate("inf"),
            Err(FieldError::NotFinite("inf".to_string()))
        );
        assert!(parse_coordinate("NaN").is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 4, 3)
            .unwrap()
            .and_hms_opt(10, 5, 0)
            .unwrap();
        assert_eq!(
            parse_timestamp("2020-04-03 10:05:00", DEFAULT_DATETIME_FORMAT),
            Ok(expected)
        );
        assert_eq!(
            parse_timestamp("03/04/2020 10:05:00", DATETIME_FORMATS[1]),
            Ok(expected)
        );
        assert_eq!(
            parse_timestamp("10:05:00 04/03/2020", DATETIME_FORMATS[4]),
            Ok(expected)
        );
        assert!(matches!(
            parse_timestamp("03/04/2020 10:05:00", DEFAULT_DATETIME_FORMAT),
            Err(FieldError::BadTimestamp { .. })
        ));
    }

    #[test]
    fn test_date_only_format_means_midnight() {
        let midnight = NaiveDate::from_ymd_opt(2020, 4, 3)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2020-04-03", "%Y-%m-%d"), Ok(midnight));
        assert_eq!(parse_timestamp("03/04/2020", "%d/%m/%Y"), Ok(midnight));
        assert!(matches!(
            parse_timestamp("2020-04-03 10:05:00", "%Y-%m-%d"),
            Err(FieldError::BadTimestamp { .. })
        ));
    }

    #[test]
    fn test_individual_is_kept_verbatim() {
        let row = RawRow::new("fox ", Some("2020-04-03 10:05:00"), "46.1", "5.2", "90");
        let obs = Observation::parse(ObservationId(1), &row, DEFAULT_DATETIME_FORMAT);
        assert_eq!(obs.individual, "fox ");
        assert_eq!(obs.cell_text(Column::Individual, DEFAULT_DATETIME_FORMAT), "fox ");
    }

    #[test]
    fn test_observation_parse_keeps_raw_text() {
        let row = RawRow::new("fox", Some("yesterday"), "46.1", "north", "90");
        let obs = Observation::parse(ObservationId(1), &row, DEFAULT_DATETIME_FORMAT);

        assert_eq!(obs.latitude.value(), Some(46.1));
        assert!(!obs.longitude.is_valid());
        assert!(!obs.timestamp.is_valid());
        assert!(obs.selected);
        assert_eq!(obs.position(), None);
        assert_eq!(
            obs.invalid_columns(),
            vec![Column::Timestamp, Column::Longitude]
        );
        assert_eq!(obs.cell_text(Column::Longitude, DEFAULT_DATETIME_FORMAT), "north");
        assert_eq!(obs.cell_text(Column::Timestamp, DEFAULT_DATETIME_FORMAT), "yesterday");
    }

    #[test]
    fn test_missing_timestamp_is_invalid() {
        let row = RawRow::new("fox", None, "46.1", "5.2", "90");
        let obs = Observation::parse(ObservationId(1), &row, DEFAULT_DATETIME_FORMAT);
        assert_eq!(obs.timestamp.error(), Some(&FieldError::Empty));
        assert!(obs.has_valid_position());
        assert!(!obs.is_valid());
    }

    #[test]
    fn test_reparse_timestamp_with_other_format() {
        let row = RawRow::new("fox", Some("03/04/2020 10:05:00"), "46.1", "5.2", "90");
        let mut obs = Observation::parse(ObservationId(1), &row, DEFAULT_DATETIME_FORMAT);
        assert!(!obs.timestamp.is_valid());

        obs.reparse_timestamp(DATETIME_FORMATS[1]);
        assert!(obs.timestamp.is_valid());
    }

    #[test]
    fn test_id_index_round_trip() {
        assert_eq!(ObservationId::from_index(0), ObservationId(1));
        assert_eq!(ObservationId(7).index(), 6);
    }
}
