use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::RadiotrackError;
use crate::observation::{Column, Observation, RawRow};

/// Expected header of survey files, in order
pub fn table_headers() -> [&'static str; 5] {
    Column::ALL.map(|column| column.header())
}

/// Check the header row, collecting one message per mismatching column
pub fn validate_headers(headers: &StringRecord) -> Result<(), RadiotrackError> {
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(RadiotrackError::EmptyFile);
    }

    let mut errors = Vec::new();
    for (index, expected) in table_headers().iter().enumerate() {
        match headers.get(index).map(str::trim) {
            Some(found) if found == *expected => {}
            Some(found) => errors.push(format!("Field {} should be {}", found, expected)),
            None => {
                errors.push("Missing header field(s)".to_string());
                break;
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(RadiotrackError::InvalidHeader(errors))
    }
}

/// Read survey rows. Short rows are padded with empty cells, which then
/// parse as invalid fields rather than failing the whole file.
pub fn read_rows<R: Read>(input: R) -> Result<Vec<RawRow>, RadiotrackError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    validate_headers(reader.headers()?)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |index: usize| record.get(index).unwrap_or("").to_string();
        let timestamp = cell(1);
        rows.push(RawRow {
            individual: cell(0),
            timestamp: (!timestamp.trim().is_empty()).then_some(timestamp),
            latitude: cell(2),
            longitude: cell(3),
            azimuth: cell(4),
        });
    }
    Ok(rows)
}

pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Vec<RawRow>, RadiotrackError> {
    let rows = read_rows(File::open(path.as_ref())?)?;
    info!(path = %path.as_ref().display(), rows = rows.len(), "Survey file loaded");
    Ok(rows)
}

/// Write rows back in the survey format, timestamps in `datetime_format`
pub fn write_rows<'a, W, I>(
    output: W,
    rows: I,
    datetime_format: &str,
) -> Result<usize, RadiotrackError>
where
    W: Write,
    I: IntoIterator<Item = &'a Observation>,
{
    let mut writer = WriterBuilder::new().from_writer(output);
    writer.write_record(table_headers())?;

    let mut count = 0;
    for observation in rows {
        writer.write_record(
            Column::ALL
                .iter()
                .map(|column| observation.cell_text(*column, datetime_format)),
        )?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

/// Save the selected rows of `engine` to `path`. If writing fails after
/// the file was created, the partial file is removed; a file that could not
/// be opened is left alone.
pub fn save_selected<P: AsRef<Path>>(engine: &Engine, path: P) -> Result<usize, RadiotrackError> {
    let path = path.as_ref();
    let file = File::create(path)?;

    match write_rows(file, engine.selected_rows(), engine.datetime_format()) {
        Ok(count) => {
            debug!(path = %path.display(), rows = count, "Selected rows saved");
            Ok(count)
        }
        Err(e) => {
            if let Err(remove_err) = std::fs::remove_file(path) {
                warn!(
                    path = %path.display(),
                    error = %remove_err,
                    "Partial export could not be removed"
                );
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FieldEdit;
    use crate::observation::ObservationId;
    use std::io::Cursor;

    const SURVEY: &str = "\
id,datetime,lat,lon,azi
fox,2020-04-03 10:00:00,46.0,5.0,45
fox,2020-04-03 10:00:00,46.0,5.02,315
owl,,46.2,5.2
";

    #[test]
    fn test_read_rows() {
        let rows = read_rows(Cursor::new(SURVEY)).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            RawRow::new("fox", Some("2020-04-03 10:00:00"), "46.0", "5.0", "45")
        );
        assert_eq!(rows[2].timestamp, None);
        assert_eq!(rows[2].azimuth, "");
    }

    #[test]
    fn test_header_errors_are_listed() {
        let err = read_rows(Cursor::new("id,date,lat,lng,azi\n")).unwrap_err();
        match err {
            RadiotrackError::InvalidHeader(errors) => {
                assert_eq!(
                    errors,
                    vec![
                        "Field date should be datetime".to_string(),
                        "Field lng should be lon".to_string()
                    ]
                );
            }
            other => panic!("unexpected error: {}", other),
        }

        let err = read_rows(Cursor::new("id,datetime\n")).unwrap_err();
        assert!(err.to_string().contains("Missing header field(s)"));
    }

    #[test]
    fn test_empty_file() {
        let err = read_rows(Cursor::new("")).unwrap_err();
        assert!(matches!(err, RadiotrackError::EmptyFile));
    }

    #[test]
    fn test_save_selected_round_trip() {
        let mut engine = Engine::default();
        engine.load(read_rows(Cursor::new(SURVEY)).unwrap());
        engine
            .edit(ObservationId(2), FieldEdit::Selected(false))
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        assert_eq!(save_selected(&engine, &path).unwrap(), 2);

        let rows = load_file(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].individual, "fox");
        assert_eq!(rows[0].latitude, "46");
        assert_eq!(rows[1].individual, "owl");
        assert_eq!(rows[1].timestamp, None);
    }

    #[test]
    fn test_failed_create_keeps_existing_file() {
        let mut engine = Engine::default();
        engine.load(read_rows(Cursor::new(SURVEY)).unwrap());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey_selected.csv");
        std::fs::write(&path, "previous export").unwrap();
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        std::fs::set_permissions(&path, permissions).unwrap();

        // Privileged users can still open read-only files
        if std::fs::OpenOptions::new().write(true).open(&path).is_ok() {
            return;
        }

        assert!(matches!(
            save_selected(&engine, &path),
            Err(RadiotrackError::Io(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous export");
    }

    #[test]
    fn test_failed_create_on_directory_leaves_it() {
        let engine = Engine::default();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("exports");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep.csv"), "id").unwrap();

        assert!(save_selected(&engine, &target).is_err());
        assert!(target.join("keep.csv").exists());
    }

    #[test]
    fn test_write_errors_propagate() {
        struct FullDisk;

        impl Write for FullDisk {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut engine = Engine::default();
        engine.load(read_rows(Cursor::new(SURVEY)).unwrap());
        assert!(write_rows(FullDisk, engine.selected_rows(), engine.datetime_format()).is_err());
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let engine = Engine::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        assert!(matches!(
            save_selected(&engine, &path),
            Err(RadiotrackError::Io(_))
        ));
        assert!(!path.exists());
    }
}
