use crossterm::event::KeyCode;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use radiotrack::config::Config;
use radiotrack::csv_io;
use radiotrack::filter::ObservationFilter;
use radiotrack::observation::{Column, ObservationId, DATETIME_FORMATS};
use radiotrack::view_extent::{visible_extent, Extent, ViewExtentController, Viewport};
use radiotrack::{Engine, FieldEdit};

/// Smallest span the map shows, in degrees
const MIN_MAP_SPAN: f64 = 1e-4;
/// Share of the view moved by one pan step
const PAN_STEP: f64 = 0.2;
const ZOOM_STEP: f64 = 0.8;
const RAY_LENGTH_STEP_KM: f64 = 0.5;

/// Map widget state. Keeps whatever extent it was last given, widened to
/// `MIN_MAP_SPAN` so a single fix still gets a drawable area.
pub struct MapView {
    extent: Extent,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            extent: Extent::new(-180.0, -90.0, 180.0, 90.0),
        }
    }
}

impl MapView {
    pub fn pan(&mut self, d_lon: f64, d_lat: f64) {
        self.extent = self.extent.translated(
            d_lon * self.extent.width() * PAN_STEP,
            d_lat * self.extent.height() * PAN_STEP,
        );
    }

    pub fn zoom(&mut self, factor: f64) {
        self.zoom_to(self.extent.scaled(factor));
    }
}

impl Viewport for MapView {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn zoom_to(&mut self, target: Extent) {
        let center = target.center();
        let half_w = target.width().max(MIN_MAP_SPAN) / 2.0;
        let half_h = target.height().max(MIN_MAP_SPAN) / 2.0;
        self.extent = Extent::new(
            center.lon - half_w,
            center.lat - half_h,
            center.lon + half_w,
            center.lat + half_h,
        );
    }
}

/// In-progress cell edit
pub struct CellEditor {
    pub id: ObservationId,
    pub column: Column,
    pub input_buffer: String,
}

pub struct AppState {
    pub engine: Engine,
    pub config: Config,
    pub source: PathBuf,
    pub selected_row: usize,
    pub selected_column: Column,
    pub editor: Option<CellEditor>,
    pub map: MapView,
    pub follow: ViewExtentController,
    pub filter: ObservationFilter,
    pub show_intersections: bool,
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(engine: Engine, config: Config, source: PathBuf) -> Self {
        let follow = config.view_controller();
        let show_intersections = config.display.show_intersections;
        Self {
            engine,
            config,
            source,
            selected_row: 0,
            selected_column: Column::Individual,
            editor: None,
            map: MapView::default(),
            follow,
            filter: ObservationFilter::default(),
            show_intersections,
            status_message: None,
        }
    }

    /// Rows shown in the table, in table order
    pub fn visible_rows(&self) -> Vec<ObservationId> {
        self.engine.visible_ids().collect()
    }

    pub fn selected_id(&self) -> Option<ObservationId> {
        self.visible_rows().get(self.selected_row).copied()
    }

    pub fn is_following(&self) -> bool {
        self.follow.should_autofollow(&self.map.extent())
    }

    fn map_target(&self) -> Option<Extent> {
        visible_extent(&self.engine).map(|extent| extent.padded(0.1, 0.005))
    }

    /// Zoom to the visible data unless the map was moved by hand
    pub fn follow_map(&mut self) {
        if let Some(target) = self.map_target() {
            if self.follow.auto_follow(&mut self.map, target) {
                debug!(?target, "Map zoomed to visible observations");
            }
        }
    }

    fn refollow_map(&mut self) {
        match self.map_target() {
            Some(target) => {
                self.follow.force_follow(&mut self.map, target);
                self.status_message = Some("Map follows the visible observations".to_string());
            }
            None => self.status_message = Some("Nothing visible to zoom to".to_string()),
        }
    }

    fn clamp_selection(&mut self) {
        let count = self.engine.visible_ids().count();
        if count == 0 {
            self.selected_row = 0;
        } else if self.selected_row >= count {
            self.selected_row = count - 1;
        }
    }

    fn apply_filter(&mut self) {
        let delta = self.engine.apply_filter(self.filter.clone());
        debug!(
            added = delta.added.len(),
            removed = delta.removed.len(),
            "Filter applied"
        );
        self.clamp_selection();
        self.follow_map();
    }

    fn cycle_individual(&mut self) {
        let individuals = self.engine.individuals();
        self.filter.individual = match &self.filter.individual {
            None => individuals.first().cloned(),
            Some(current) => individuals
                .iter()
                .position(|i| i == current)
                .and_then(|pos| individuals.get(pos + 1))
                .cloned(),
        };
        self.apply_filter();
    }

    fn cycle_datetime_format(&mut self) {
        let current = self.engine.datetime_format();
        let next = DATETIME_FORMATS
            .iter()
            .position(|f| *f == current)
            .map(|pos| DATETIME_FORMATS[(pos + 1) % DATETIME_FORMATS.len()])
            .unwrap_or(DATETIME_FORMATS[0]);

        match self.engine.set_datetime_format(next) {
            Ok(changes) => {
                info!(format = next, rekeyed = changes.pairing.len(), "Datetime format changed");
                self.status_message = Some(format!("Datetime format: {}", next));
                self.clamp_selection();
                self.follow_map();
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    fn change_ray_length(&mut self, delta_km: f64) {
        let length = self.engine.ray_length_km() + delta_km;
        match self.engine.set_ray_length(length) {
            Ok(changes) => {
                debug!(rays = changes.geometry.len(), "Rays rebuilt");
                self.status_message = Some(format!("Ray length: {} km", length));
                self.follow_map();
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    fn toggle_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let selected = self
            .engine
            .observation(id)
            .is_some_and(|obs| obs.selected);
        if let Err(e) = self.engine.edit(id, FieldEdit::Selected(!selected)) {
            warn!(%id, error = %e, "Selection toggle failed");
        }
        self.clamp_selection();
    }

    fn start_editing(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let Some(obs) = self.engine.observation(id) else {
            return;
        };
        let input_buffer = obs.cell_text(self.selected_column, self.engine.datetime_format());
        self.editor = Some(CellEditor {
            id,
            column: self.selected_column,
            input_buffer,
        });
    }

    fn commit_edit(&mut self, editor: CellEditor) {
        let edit = FieldEdit::for_column(editor.column, &editor.input_buffer);
        match self.engine.edit(editor.id, edit) {
            Ok(changes) => {
                debug!(
                    id = %editor.id,
                    column = editor.column.header(),
                    intersections = changes.intersections.len(),
                    "Cell edited"
                );
                self.status_message = self
                    .engine
                    .observation(editor.id)
                    .filter(|obs| !obs.is_valid())
                    .map(|obs| {
                        let columns: Vec<&str> =
                            obs.invalid_columns().iter().map(|c| c.header()).collect();
                        format!("Row {} has invalid {}", editor.id, columns.join(", "))
                    });
                self.clamp_selection();
                self.follow_map();
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    fn export_selected(&mut self) {
        let stem = self
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "survey".to_string());
        let path = self.source.with_file_name(format!("{}_selected.csv", stem));

        self.status_message = Some(match csv_io::save_selected(&self.engine, &path) {
            Ok(count) => format!("Saved {} rows to {}", count, path.display()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Export failed");
                format!("Export failed: {}", e)
            }
        });
    }

    fn move_column(&mut self, step: isize) {
        let pos = Column::ALL
            .iter()
            .position(|c| *c == self.selected_column)
            .unwrap_or(0) as isize;
        let next = (pos + step).clamp(0, Column::ALL.len() as isize - 1) as usize;
        self.selected_column = Column::ALL[next];
    }

    pub fn handle_editor_key(&mut self, code: KeyCode) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => self.editor = None,
            KeyCode::Enter => {
                if let Some(editor) = self.editor.take() {
                    self.commit_edit(editor);
                }
            }
            KeyCode::Backspace => {
                editor.input_buffer.pop();
            }
            KeyCode::Char(c) => editor.input_buffer.push(c),
            _ => {}
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        let row_count = self.engine.visible_ids().count();
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_row = self.selected_row.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_row + 1 < row_count {
                    self.selected_row += 1;
                }
            }
            KeyCode::Home => self.selected_row = 0,
            KeyCode::End => self.selected_row = row_count.saturating_sub(1),
            KeyCode::Left | KeyCode::Char('h') => self.move_column(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_column(1),
            KeyCode::Enter => self.start_editing(),
            KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Char('+') => self.change_ray_length(RAY_LENGTH_STEP_KM),
            KeyCode::Char('-') => self.change_ray_length(-RAY_LENGTH_STEP_KM),
            KeyCode::Char('p') => {
                self.filter.paired_only = !self.filter.paired_only;
                self.apply_filter();
            }
            KeyCode::Char('v') => {
                self.filter.require_position = !self.filter.require_position;
                self.filter.require_azimuth = self.filter.require_position;
                self.apply_filter();
            }
            KeyCode::Char('i') => self.cycle_individual(),
            KeyCode::Char('r') => {
                self.filter = ObservationFilter::default();
                self.apply_filter();
            }
            KeyCode::Char('t') => self.cycle_datetime_format(),
            KeyCode::Char('n') => self.show_intersections = !self.show_intersections,
            KeyCode::Char('e') => self.export_selected(),
            KeyCode::Char('w') => self.map.pan(0.0, 1.0),
            KeyCode::Char('s') => self.map.pan(0.0, -1.0),
            KeyCode::Char('a') => self.map.pan(-1.0, 0.0),
            KeyCode::Char('d') => self.map.pan(1.0, 0.0),
            KeyCode::Char('z') => self.map.zoom(ZOOM_STEP),
            KeyCode::Char('x') => self.map.zoom(1.0 / ZOOM_STEP),
            KeyCode::Char('f') => self.refollow_map(),
            _ => {}
        }
    }
}
