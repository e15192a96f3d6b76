mod app;
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use radiotrack::config::{Config, LoggingConfig};
use radiotrack::csv_io;
use radiotrack::filter::ObservationFilter;
use radiotrack::observation::Column;
use radiotrack::{Engine, RowStatus};

use app::AppState;

/// Bearing observations and biangulation for radio-tracking surveys
#[derive(Parser)]
#[command(name = "radiotrack", version)]
struct Cli {
    /// Configuration file (defaults to ./radiotrack.toml, then the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Survey CSV file with columns id,datetime,lat,lon,azi
    file: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print observations, pairings and intersections
    Report {
        /// Only list observations that are part of a pairing
        #[arg(long)]
        paired_only: bool,

        /// Only list observations of this individual
        #[arg(long)]
        individual: Option<String>,
    },
    /// Interactive terminal viewer (default)
    View,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::discover(cli.config.as_deref())?;
    let interactive = !matches!(cli.command, Some(Command::Report { .. }));
    init_logging(&config.logging, interactive)?;

    let mut engine = config.build_engine()?;
    let rows = csv_io::load_file(&cli.file)?;
    let summary = engine.load(rows);
    info!(?summary, file = %cli.file.display(), "Survey ready");

    match cli.command {
        Some(Command::Report {
            paired_only,
            individual,
        }) => {
            let filter = ObservationFilter {
                individual,
                paired_only,
                ..Default::default()
            };
            engine.apply_filter(filter);
            print_report(&engine);
            Ok(())
        }
        Some(Command::View) | None => run_viewer(AppState::new(engine, config, cli.file)),
    }
}

/// `RUST_LOG` wins over the configured level. The viewer owns the terminal,
/// so without a log file its output is discarded.
fn init_logging(config: &LoggingConfig, interactive: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (&config.file, interactive) {
        (Some(path), _) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        (None, true) => builder.with_writer(std::io::sink).init(),
        (None, false) => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn print_report(engine: &Engine) {
    let format = engine.datetime_format();
    println!(
        "{:>4}  {:<12} {:<20} {:>11} {:>11} {:>7}  {:<8} {:>7}  {}",
        "#", "Individual", "Datetime", "Lat", "Lon", "Azi", "Status", "Partner", "Intersection"
    );

    for id in engine.visible_ids() {
        let Some(obs) = engine.observation(id) else {
            continue;
        };
        let status = match engine.row_status(id) {
            Some(RowStatus::Paired) => "paired",
            Some(RowStatus::Invalid) => "invalid",
            _ => "",
        };
        let partner = engine
            .pairing_partner(id)
            .map(|p| p.to_string())
            .unwrap_or_default();
        let intersection = engine
            .intersection(id)
            .map(|p| format!("{:.6}, {:.6}", p.lat, p.lon))
            .unwrap_or_default();

        println!(
            "{:>4}  {:<12} {:<20} {:>11} {:>11} {:>7}  {:<8} {:>7}  {}",
            id,
            obs.cell_text(Column::Individual, format),
            obs.cell_text(Column::Timestamp, format),
            obs.cell_text(Column::Latitude, format),
            obs.cell_text(Column::Longitude, format),
            obs.cell_text(Column::Azimuth, format),
            status,
            partner,
            intersection
        );
    }

    let pairs = engine.index().pairs();
    let crossings = engine.intersections().filter(|(_, p)| p.is_some()).count();
    println!();
    println!(
        "{} observations, {} visible, {} paired, {} intersections (rays {} km)",
        engine.len(),
        engine.visible_ids().count(),
        pairs.len(),
        crossings,
        engine.ray_length_km()
    );
}

fn run_viewer(mut app_state: AppState) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run TUI
    let res = run_app(&mut terminal, &mut app_state);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app_state: &mut AppState,
) -> Result<()> {
    app_state.follow_map();

    loop {
        terminal.draw(|f| {
            ui::draw_ui(f, app_state);
        })?;

        // Handle input
        if event::poll(std::time::Duration::from_millis(
            app_state.config.display.refresh_rate,
        ))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if app_state.editor.is_some() {
                    app_state.handle_editor_key(key.code);
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        return Ok(());
                    }
                    code => app_state.handle_key(code),
                }
            }
        }
    }
}
