use approx::assert_abs_diff_eq;
use std::io::Write;

use radiotrack::csv_io;
use radiotrack::filter::ObservationFilter;
use radiotrack::projection::project;
use radiotrack::view_extent::{visible_extent, Extent, ViewExtentController, Viewport};
use radiotrack::{Engine, EngineError, FieldEdit, ObservationId, RowStatus};

const SURVEY: &str = "\
id,datetime,lat,lon,azi
fox,2020-04-03 10:00:00,46.0,5.0,45
fox,2020-04-03 10:00:00,46.0,5.02,315
fox,2020-04-03 11:00:00,46.1,5.1,180
owl,2020-04-03 10:00:00,46.2,5.2,abc
";

fn survey_engine() -> Engine {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SURVEY.as_bytes()).unwrap();

    let mut engine = Engine::new(5.0, "%Y-%m-%d %H:%M:%S").unwrap();
    let summary = engine.load(csv_io::load_file(file.path()).unwrap());
    assert_eq!(summary.rows, 4);
    assert_eq!(summary.invalid_rows, 1);
    engine
}

struct Screen {
    extent: Extent,
}

impl Viewport for Screen {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn zoom_to(&mut self, target: Extent) {
        self.extent = target;
    }
}

#[test]
fn test_projection_reference_points() {
    let (lat, lon) = project(46.59103, 5.46573, 81.0, 2.0);
    assert_abs_diff_eq!(lat, 46.5938408, epsilon = 5e-8);
    assert_abs_diff_eq!(lon, 5.49158256, epsilon = 5e-8);

    let (lat, lon) = project(-53.15056, -1.84444, 20.0, 50.0);
    assert_abs_diff_eq!(lat, -52.7277448, epsilon = 5e-8);
    assert_abs_diff_eq!(lon, -1.59049155, epsilon = 5e-8);
}

#[test]
fn test_crossing_bearings_from_file() {
    let engine = survey_engine();
    let first = ObservationId(1);
    let second = ObservationId(2);

    assert_eq!(engine.pairing_partner(first), Some(second));
    assert_eq!(engine.pairing_partner(second), Some(first));
    assert_eq!(engine.row_status(first), Some(RowStatus::Paired));
    assert_eq!(engine.row_status(ObservationId(3)), Some(RowStatus::Valid));
    assert_eq!(engine.row_status(ObservationId(4)), Some(RowStatus::Invalid));

    let hit = engine.intersection(first).unwrap();
    assert_eq!(engine.intersection(second), Some(hit));
    assert_abs_diff_eq!(hit.lon, 5.01, epsilon = 1e-4);
    assert_abs_diff_eq!(hit.lat, 46.00695, epsilon = 1e-4);

    // The owl row has a fix but no ray
    assert!(engine.fix(ObservationId(4)).is_some());
    assert!(engine.ray(ObservationId(4)).is_none());
}

#[test]
fn test_edit_moves_observation_between_groups() {
    let mut engine = survey_engine();

    let changes = engine
        .edit(ObservationId(3), FieldEdit::Timestamp("2020-04-03 10:00:00".into()))
        .unwrap();
    assert!(changes.pairing.contains(&ObservationId(1)));
    assert!(changes.pairing.contains(&ObservationId(3)));
    assert!(engine.is_paired(ObservationId(3)));
    assert_eq!(engine.pairing_partner(ObservationId(3)), Some(ObservationId(1)));
    assert!(engine.group_estimate(ObservationId(1)).is_some());

    engine
        .edit(ObservationId(2), FieldEdit::Individual("owl".into()))
        .unwrap();
    engine
        .edit(ObservationId(3), FieldEdit::Individual("owl".into()))
        .unwrap();
    assert!(!engine.is_paired(ObservationId(1)));
    assert_eq!(engine.intersection(ObservationId(1)), None);
    assert_eq!(engine.pairing_partner(ObservationId(2)), Some(ObservationId(3)));

    assert_eq!(
        engine.edit(ObservationId(9), FieldEdit::Selected(false)),
        Err(EngineError::UnknownObservation(ObservationId(9)))
    );
}

#[test]
fn test_filter_and_autofollow() {
    let mut engine = survey_engine();
    let mut controller = ViewExtentController::new(1e-9);
    let mut screen = Screen {
        extent: Extent::new(-180.0, -90.0, 180.0, 90.0),
    };

    let full = visible_extent(&engine).unwrap();
    assert!(controller.auto_follow(&mut screen, full));

    engine.apply_filter(ObservationFilter {
        paired_only: true,
        ..Default::default()
    });
    let paired: Vec<_> = engine.visible_ids().collect();
    assert_eq!(paired, vec![ObservationId(1), ObservationId(2)]);

    let narrowed = visible_extent(&engine).unwrap();
    assert!(full.contains(&narrowed, 0.0));
    assert!(controller.auto_follow(&mut screen, narrowed));
    assert_eq!(screen.extent(), narrowed);

    // The user zooms out: further updates leave the view alone
    screen.extent = screen.extent.scaled(2.0);
    engine.clear_filter();
    assert!(!controller.auto_follow(&mut screen, visible_extent(&engine).unwrap()));

    controller.force_follow(&mut screen, full);
    assert_eq!(screen.extent(), full);
}

#[test]
fn test_export_selected_rows() {
    let mut engine = survey_engine();
    engine
        .edit(ObservationId(4), FieldEdit::Selected(false))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("selected.csv");
    assert_eq!(csv_io::save_selected(&engine, &path).unwrap(), 3);

    let mut reloaded = Engine::default();
    let summary = reloaded.load(csv_io::load_file(&path).unwrap());
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.invalid_rows, 0);
    assert_eq!(reloaded.pairing_partner(ObservationId(1)), Some(ObservationId(2)));
}
