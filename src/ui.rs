use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use radiotrack::observation::Column;
use radiotrack::view_extent::Viewport;
use radiotrack::RowStatus;

use crate::app::AppState;

/// Colours handed out to individuals on the map, in sorted name order
const INDIVIDUAL_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::LightBlue,
    Color::LightGreen,
    Color::LightRed,
];

pub fn draw_ui(f: &mut Frame, app_state: &AppState) {
    // Main horizontal split
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55), // Observation table
            Constraint::Percentage(45), // Map
        ])
        .split(f.area());

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(5), // Header
            Constraint::Min(10),   // Table
            Constraint::Length(3), // Status / editor
            Constraint::Length(3), // Footer
        ])
        .split(main_chunks[0]);

    draw_header(f, left_chunks[0], app_state);
    draw_observation_table(f, left_chunks[1], app_state);
    draw_status(f, left_chunks[2], app_state);
    draw_footer(f, left_chunks[3]);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Min(10),   // Map
            Constraint::Length(7), // Selected row details
        ])
        .split(main_chunks[1]);

    draw_map(f, right_chunks[0], app_state);
    draw_details(f, right_chunks[1], app_state);
}

fn draw_header(f: &mut Frame, area: Rect, app_state: &AppState) {
    let engine = &app_state.engine;
    let paired = engine.index().pairs().len();
    let crossings = engine.intersections().filter(|(_, p)| p.is_some()).count();
    let range = engine
        .timestamp_range()
        .map(|(first, last)| {
            format!(
                "{} → {}",
                first.format(engine.datetime_format()),
                last.format(engine.datetime_format())
            )
        })
        .unwrap_or_else(|| "no valid timestamps".to_string());

    let header_text = vec![
        Line::from(vec![
            Span::styled("File: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{} ", app_state.source.display())),
            Span::styled("Rows: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!(
                "{} ({} shown)",
                engine.len(),
                engine.visible_ids().count()
            )),
        ]),
        Line::from(vec![
            Span::styled("Paired: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{}  ", paired)),
            Span::styled("Intersections: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{}  ", crossings)),
            Span::styled("Rays: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{} km", engine.ray_length_km())),
        ]),
        Line::from(vec![
            Span::styled("Time: ", Style::default().fg(Color::Cyan)),
            Span::raw(range),
        ]),
    ];

    let header = Paragraph::new(header_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Radiotrack")
            .style(Style::default().fg(Color::White)),
    );

    f.render_widget(header, area);
}

fn draw_observation_table(f: &mut Frame, area: Rect, app_state: &AppState) {
    let engine = &app_state.engine;
    let format = engine.datetime_format();

    let header_cells = ["#", "", "Id", "Datetime", "Lat", "Lon", "Azi", "Pair"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let visible = app_state.visible_rows();

    // Keep the selected row on screen
    let body_height = area.height.saturating_sub(4) as usize;
    let offset = app_state
        .selected_row
        .saturating_sub(body_height.saturating_sub(1));

    let rows = visible
        .iter()
        .enumerate()
        .skip(offset)
        .filter_map(|(row_idx, id)| {
            let obs = engine.observation(*id)?;
            let is_current = row_idx == app_state.selected_row;

            let mut style = match engine.row_status(*id) {
                Some(RowStatus::Invalid) => Style::default().fg(Color::Red),
                Some(RowStatus::Paired) => Style::default().fg(Color::Green),
                _ => Style::default().fg(Color::White),
            };
            if is_current {
                style = style.add_modifier(Modifier::REVERSED);
            }

            let mut cells = vec![
                Cell::from(id.to_string()),
                Cell::from(if obs.selected { "✓" } else { " " }),
            ];
            for column in Column::ALL {
                let text = match &app_state.editor {
                    Some(editor) if editor.id == *id && editor.column == column => {
                        format!("{}|", editor.input_buffer)
                    }
                    _ => obs.cell_text(column, format),
                };
                let mut cell = Cell::from(truncate_string(&text, 20));
                if is_current && column == app_state.selected_column {
                    cell = cell.style(
                        Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                    );
                } else if obs.invalid_columns().contains(&column) {
                    cell = cell.style(Style::default().add_modifier(Modifier::ITALIC));
                }
                cells.push(cell);
            }
            cells.push(Cell::from(
                engine
                    .pairing_partner(*id)
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
            ));

            Some(Row::new(cells).height(1).style(style))
        });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Length(10),
            Constraint::Length(20),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(6),
            Constraint::Length(5),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(filter_title(app_state))
            .style(Style::default().fg(Color::White)),
    );

    f.render_widget(table, area);
}

fn filter_title(app_state: &AppState) -> String {
    let filter = &app_state.filter;
    let mut parts = Vec::new();
    if let Some(individual) = &filter.individual {
        parts.push(individual.clone());
    }
    if filter.paired_only {
        parts.push("paired".to_string());
    }
    if filter.require_position {
        parts.push("valid".to_string());
    }

    if parts.is_empty() {
        "Observations".to_string()
    } else {
        format!("Observations [{}]", parts.join(", "))
    }
}

fn draw_map(f: &mut Frame, area: Rect, app_state: &AppState) {
    use ratatui::symbols;
    use ratatui::widgets::canvas::{Canvas, Line as CanvasLine, Points};

    let engine = &app_state.engine;
    let extent = app_state.map.extent();
    let individuals = engine.individuals();
    let color_of = |name: &str| {
        individuals
            .iter()
            .position(|i| i == name)
            .map(|pos| INDIVIDUAL_COLORS[pos % INDIVIDUAL_COLORS.len()])
            .unwrap_or(Color::White)
    };
    let selected = app_state.selected_id();

    let title = if app_state.is_following() {
        "Map (following)"
    } else {
        "Map (f: follow)"
    };

    let canvas = Canvas::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .style(Style::default().fg(Color::White)),
        )
        .x_bounds([extent.min_lon, extent.max_lon])
        .y_bounds([extent.min_lat, extent.max_lat])
        .marker(symbols::Marker::Braille)
        .paint(|ctx| {
            // Bearing rays
            for id in engine.visible_ids() {
                let (Some(ray), Some(obs)) = (engine.ray(id), engine.observation(id)) else {
                    continue;
                };
                let color = if Some(id) == selected {
                    Color::White
                } else {
                    color_of(&obs.individual)
                };
                ctx.draw(&CanvasLine {
                    x1: ray.origin.lon,
                    y1: ray.origin.lat,
                    x2: ray.end.lon,
                    y2: ray.end.lat,
                    color,
                });
            }

            // Observer fixes
            let fixes: Vec<(f64, f64)> = engine
                .visible_ids()
                .filter_map(|id| engine.fix(id))
                .map(|p| (p.lon, p.lat))
                .collect();
            ctx.draw(&Points {
                coords: &fixes,
                color: Color::Gray,
            });

            if app_state.show_intersections {
                for id in engine.visible_ids() {
                    if let Some(point) = engine.intersection(id) {
                        ctx.print(
                            point.lon,
                            point.lat,
                            Span::styled("×", Style::default().fg(Color::Red)),
                        );
                    }
                }
            }
        });

    f.render_widget(canvas, area);
}

fn draw_details(f: &mut Frame, area: Rect, app_state: &AppState) {
    let engine = &app_state.engine;

    let Some(id) = app_state.selected_id() else {
        let empty = Paragraph::new("No observation selected").block(
            Block::default()
                .borders(Borders::ALL)
                .title("Observation")
                .style(Style::default().fg(Color::White)),
        );
        f.render_widget(empty, area);
        return;
    };

    let mut lines = Vec::new();

    if let Some(obs) = engine.observation(id) {
        for column in obs.invalid_columns() {
            let reason = match column {
                Column::Timestamp => obs.timestamp.error().map(|e| e.to_string()),
                Column::Latitude => obs.latitude.error().map(|e| e.to_string()),
                Column::Longitude => obs.longitude.error().map(|e| e.to_string()),
                Column::Azimuth => obs.azimuth.error().map(|e| e.to_string()),
                Column::Individual => None,
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{:9}", column.header()), Style::default().fg(Color::Red)),
                Span::raw(reason.unwrap_or_default()),
            ]));
        }
    }

    let partners: Vec<String> = engine
        .index()
        .partners(id)
        .iter()
        .map(|p| p.to_string())
        .collect();
    lines.push(Line::from(vec![
        Span::styled("Group:   ", Style::default().fg(Color::Cyan)),
        Span::raw(if partners.is_empty() {
            "unpaired".to_string()
        } else {
            partners.join(", ")
        }),
    ]));

    if let Some(point) = engine.intersection(id) {
        lines.push(Line::from(vec![
            Span::styled("Crossing: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{:.6}°N, {:.6}°E", point.lat, point.lon)),
        ]));
    }
    if let Some(point) = engine.group_estimate(id) {
        lines.push(Line::from(vec![
            Span::styled("Estimate: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{:.6}°N, {:.6}°E", point.lat, point.lon)),
        ]));
    }

    let details = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Observation {}", id))
            .style(Style::default().fg(Color::White)),
    );

    f.render_widget(details, area);
}

fn draw_status(f: &mut Frame, area: Rect, app_state: &AppState) {
    let (text, color) = match &app_state.editor {
        Some(editor) => (
            format!(
                "Editing {} of row {}: {}|  (Enter: apply, ESC: cancel)",
                editor.column.header(),
                editor.id,
                editor.input_buffer
            ),
            Color::Cyan,
        ),
        None => (
            app_state.status_message.clone().unwrap_or_default(),
            Color::Yellow,
        ),
    };

    let status = Paragraph::new(text)
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(status, area);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let footer = Paragraph::new(
        "↑↓←→: Move | Enter: Edit | Space: Select | p/i/v/r: Filter | +/-: Rays | t: Dates | \
         wasd/z/x/f: Map | e: Export | q: Quit",
    )
    .style(Style::default().fg(Color::Gray))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(footer, area);
}

/// Helper function to truncate strings for display
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("fox", 5), "fox");
        assert_eq!(truncate_string("2020-04-03 10:00:00", 10), "2020-04...");
        assert_eq!(truncate_string("éléphant", 6), "élé...");
    }
}
