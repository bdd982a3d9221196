use anyhow::{Context, Result};
use clap::Parser;
use rand::{Rng, SeedableRng, rngs::StdRng};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    io::{self, Stdout},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::info;
use vacuum_world_core::{
    Colour, Coord, DirtColour, Environment, Orientation, SimulationConfig, StopSignal, TickReport,
    mind,
    snapshot::Snapshot,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Snapshot (JSON) to load the world from
    #[arg(short, long, value_name = "MAP_FILE")]
    map: Option<PathBuf>,

    /// Simulation configuration (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Grid side length for a randomly populated world
    #[arg(long)]
    size: Option<usize>,

    /// Cleaning agents of each colour in a randomly populated world
    #[arg(long, default_value_t = 1)]
    agents: usize,

    /// Dirt items in a randomly populated world
    #[arg(long, default_value_t = 6)]
    dirt: usize,

    /// Seed for world population and random minds
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Stop after this many ticks
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Run without the terminal UI, logging to stderr
    #[arg(long)]
    headless: bool,

    /// Write a snapshot of the final world here
    #[arg(long, value_name = "SNAPSHOT_FILE")]
    save: Option<PathBuf>,

    /// Milliseconds between ticks in the terminal UI
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

struct App {
    /// The core simulation environment.
    environment: Environment,
    /// Pauses the simulation between ticks.
    pause: StopSignal,
    /// Flag to control the main loop.
    should_quit: bool,
    last_report: Option<TickReport>,
    error: Option<String>,
    max_ticks: Option<u64>,
}

impl App {
    fn new(environment: Environment, max_ticks: Option<u64>) -> Self {
        App {
            environment,
            pause: StopSignal::new(),
            should_quit: false,
            last_report: None,
            error: None,
            max_ticks,
        }
    }

    fn finished(&self) -> bool {
        self.error.is_some()
            || self
                .max_ticks
                .is_some_and(|max| self.environment.tick() >= max)
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) {
        if self.finished() || self.pause.is_stop_requested() {
            return;
        }
        match self.environment.process_tick() {
            Ok(report) => self.last_report = Some(report),
            Err(err) => self.error = Some(err.to_string()),
        }
    }

    fn toggle_pause(&mut self) {
        if self.pause.is_stop_requested() {
            self.pause.reset();
        } else {
            self.pause.request_stop();
        }
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref(), args.size)?;
    let environment = match &args.map {
        Some(path) => load_environment(path, config, args.seed)?,
        None => random_environment(config, args.agents, args.dirt, args.seed)?,
    };

    let environment = if args.headless {
        run_headless(environment, args.ticks)?
    } else {
        let mut terminal = setup_terminal()?;
        let mut app = App::new(environment, args.ticks);
        let outcome = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));
        restore_terminal(&mut terminal)?;
        outcome?;
        app.environment
    };

    if let Some(path) = &args.save {
        let json = environment.snapshot().to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("writing snapshot to {}", path.display()))?;
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>, size: Option<usize>) -> Result<SimulationConfig> {
    let mut config = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            SimulationConfig::from_json_str(&json)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };
    if let Some(size) = size {
        config = config.with_grid_size(size);
        config.validate()?;
    }
    Ok(config)
}

fn load_environment(path: &Path, config: SimulationConfig, seed: u64) -> Result<Environment> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let snapshot = Snapshot::from_json(&json)?;
    let environment = Environment::from_snapshot(&snapshot, config, |actor| {
        let seed = seed.wrapping_add(actor.id as u64);
        actor
            .mind
            .as_deref()
            .and_then(|name| mind::bundled(name, seed))
            .unwrap_or_else(|| mind::default_for(actor.colour, seed))
    })?;
    Ok(environment)
}

/// Builds a world with `agents` cleaners of each colour, one user and `dirt`
/// dirt items, all on random free cells.
fn random_environment(
    config: SimulationConfig,
    agents: usize,
    dirt: usize,
    seed: u64,
) -> Result<Environment> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut environment = Environment::new(config)?;
    let side = environment.ambient().size() as i32;

    let free_cell = |rng: &mut StdRng, taken: &dyn Fn(Coord) -> bool| {
        (0..1000)
            .map(|_| Coord::new(rng.random_range(0..side), rng.random_range(0..side)))
            .find(|coord| !taken(*coord))
    };

    let mut colours = Vec::new();
    for colour in [Colour::Green, Colour::Orange, Colour::White] {
        colours.extend(std::iter::repeat_n(colour, agents));
    }
    colours.push(Colour::User);

    for colour in colours {
        let ambient = environment.ambient();
        let Some(coord) = free_cell(&mut rng, &|c| ambient.is_actor_at(c)) else {
            break;
        };
        let orientation = Orientation::ALL[rng.random_range(0..4)];
        let mind = mind::default_for(colour, rng.random());
        environment.add_actor(coord, colour, orientation, mind)?;
    }

    for _ in 0..dirt {
        let ambient = environment.ambient();
        let Some(coord) = free_cell(&mut rng, &|c| ambient.is_dirt_at(c)) else {
            break;
        };
        let colour = DirtColour::ALL[rng.random_range(0..2)];
        environment.add_dirt(coord, colour)?;
    }
    Ok(environment)
}

fn run_headless(mut environment: Environment, ticks: Option<u64>) -> Result<Environment> {
    init_tracing();
    let stop = StopSignal::new();
    let processed = environment.run(Some(ticks.unwrap_or(100)), &stop)?;
    for id in environment.actor_ids() {
        if let (Some(actor), Some(effort)) = (environment.actor(id), environment.effort(id)) {
            info!(actor = id, colour = %actor.colour(), effort, "final effort");
        }
    }
    info!(
        processed,
        dirt_remaining = environment.ambient().dirts().count(),
        "headless run complete"
    );
    Ok(environment)
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
///
/// Key presses are only acted on between ticks, never during one.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char(' ') | KeyCode::Char('p') => app.toggle_pause(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(65),
            Constraint::Percentage(25),
            Constraint::Percentage(10),
        ])
        .split(frame.area());

    render_map(frame, main_layout[0], &app.environment);
    render_actors(frame, main_layout[1], app);

    let state = if let Some(err) = &app.error {
        format!("halted: {err}")
    } else if app.finished() {
        "finished".to_string()
    } else if app.pause.is_stop_requested() {
        "paused".to_string()
    } else {
        "running".to_string()
    };
    let status = Paragraph::new(format!(
        "Tick {} | dirt left {} | {} | space: pause/resume, q: quit",
        app.environment.tick(),
        app.environment.ambient().dirts().count(),
        state
    ))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, main_layout[2]);
}

fn colour_style(colour: Colour) -> Style {
    match colour {
        Colour::Green => Style::default().fg(Color::Green),
        Colour::Orange => Style::default().fg(Color::Rgb(255, 165, 0)),
        Colour::White => Style::default().fg(Color::White),
        Colour::User => Style::default().fg(Color::Magenta),
    }
}

fn dirt_style(colour: DirtColour) -> Style {
    match colour {
        DirtColour::Green => Style::default().fg(Color::Green),
        DirtColour::Orange => Style::default().fg(Color::Rgb(255, 165, 0)),
    }
}

/// Renders one line per actor: where it is and what it has spent.
fn render_actors(frame: &mut Frame, area: Rect, app: &App) {
    let environment = &app.environment;
    let items: Vec<ListItem> = environment
        .actor_ids()
        .into_iter()
        .filter_map(|id| {
            let actor = environment.actor(id)?;
            let coord = environment.actor_coord(id)?;
            let last = app
                .last_report
                .as_ref()
                .and_then(|report| report.for_actor(id))
                .map(|report| {
                    report
                        .outcomes
                        .iter()
                        .map(|(kind, outcome)| format!("{kind}: {outcome}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            Some(ListItem::from(Line::from(vec![
                Span::styled(format!("Actor {id:>3} "), colour_style(actor.colour())),
                Span::raw(format!(
                    "{:<6} at {} facing {:<5} effort {:>5}  {}",
                    actor.colour().as_str(),
                    coord,
                    actor.orientation().as_str(),
                    environment.effort(id).unwrap_or_default(),
                    last
                )),
            ])))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Actors"));
    frame.render_widget(list, area);
}

/// Renders the grid onto the frame.
fn render_map(frame: &mut Frame, area: Rect, environment: &Environment) {
    let ambient = environment.ambient();
    let side = ambient.size() as i32;
    let mut lines: Vec<Line> = Vec::with_capacity(ambient.size());

    for y in 0..side {
        let mut spans: Vec<Span> = Vec::with_capacity(ambient.size() * 2);
        for x in 0..side {
            let location = ambient.location_at(Coord::new(x, y));
            let span = match (location.actor(), location.dirt()) {
                (Some(actor), dirt) => {
                    let arrow = match actor.orientation() {
                        Orientation::North => "^",
                        Orientation::South => "v",
                        Orientation::East => ">",
                        Orientation::West => "<",
                    };
                    let style = colour_style(actor.colour()).bold();
                    if dirt.is_some() {
                        Span::styled(arrow, style.underlined())
                    } else {
                        Span::styled(arrow, style)
                    }
                }
                (None, Some(dirt)) => Span::styled("*", dirt_style(dirt.colour())),
                (None, None) => Span::styled(".", Style::default().fg(Color::DarkGray)),
            };
            spans.push(span);
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Vacuum World").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}
