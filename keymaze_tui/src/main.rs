use anyhow::{Context, Result, bail};
use clap::Parser;
use keymaze_core::{
    Action, Direction as Heading, KeyColor, KeyTally, SolverSession,
    environment::{ActionResult, Environment},
    flood::{Advice, FloodFill},
    loader::{parse_maze, render_floor},
    map::CellCoord,
    maze::{CellCode, MazeSnapshot},
    search::SearchLimits,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    fs::{self, File},
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Map file to load: a text map, or a JSON snapshot if it ends in `.json`
    #[arg(short, long, value_name = "MAP_FILE")]
    map: Option<PathBuf>,

    /// Milliseconds between simulation ticks
    #[arg(short, long, default_value_t = 250)]
    tick_ms: u64,

    /// Room expansions allowed per plan
    #[arg(long, default_value_t = SearchLimits::default().max_expansions)]
    max_expansions: usize,

    /// Nested key pickups allowed per plan
    #[arg(long, default_value_t = SearchLimits::default().max_depth)]
    max_depth: usize,

    /// Run without the terminal UI and report the outcome
    #[arg(long)]
    headless: bool,

    /// Give up after this many ticks in headless mode
    #[arg(long, default_value_t = 10_000)]
    max_ticks: usize,

    /// Write logs to this file. Without it the TUI does not log.
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn limits(&self) -> SearchLimits {
        SearchLimits {
            max_expansions: self.max_expansions,
            max_depth: self.max_depth,
        }
    }
}

struct App {
    /// The world as loaded, used to reset.
    initial: MazeSnapshot,
    /// The simulated world.
    environment: Environment,
    session: SolverSession,
    last_result: Option<ActionResult>,
    advice: Option<Advice>,
    paused: bool,
    /// Flag to control the main loop.
    should_quit: bool,
    /// Set once the maze is won.
    game_over: bool,
}

impl App {
    fn new(snapshot: MazeSnapshot, limits: SearchLimits) -> Self {
        let advice = FloodFill::advise(&snapshot).ok();
        App {
            environment: Environment::new(snapshot.clone()),
            initial: snapshot,
            session: SolverSession::with_limits(limits),
            last_result: None,
            advice,
            paused: false,
            should_quit: false,
            game_over: false,
        }
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) -> Result<()> {
        if self.game_over || self.paused {
            return Ok(());
        }
        let action = self.session.solve(self.environment.snapshot())?;
        let result = self.environment.apply(action);
        self.record(action, result);
        Ok(())
    }

    /// Moves the agent by hand; the solver replans on the next tick.
    fn manual_move(&mut self, heading: Heading) {
        if self.game_over {
            return;
        }
        let action = Action::from(heading);
        let result = self.environment.apply(action);
        self.session.on_user_override();
        self.record(action, result);
    }

    fn record(&mut self, action: Action, result: ActionResult) {
        match &result {
            ActionResult::Won => {
                info!(turns = self.environment.turns(), "Agent reached the final exit");
                self.game_over = true;
            }
            ActionResult::Failure(reason) => warn!(?action, "Action failed: {reason}"),
            _ => {}
        }
        self.advice = if self.game_over {
            None
        } else {
            FloodFill::advise(self.environment.snapshot()).ok()
        };
        self.last_result = Some(result);
    }

    fn reset(&mut self) {
        info!("Resetting the maze");
        self.environment = Environment::new(self.initial.clone());
        self.session.invalidate_cache();
        self.advice = FloodFill::advise(&self.initial).ok();
        self.last_result = None;
        self.game_over = false;
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    init_logging(&args)?;

    // If no map file is provided, use the default map
    let map_file = args
        .map
        .clone()
        .unwrap_or_else(|| PathBuf::from("maps/map01.txt"));
    let snapshot = load_snapshot(&map_file)?;
    info!(
        map = %map_file.display(),
        floors = snapshot.floors.len(),
        "Maze loaded"
    );

    let mut app = App::new(snapshot, args.limits());
    if args.headless {
        return run_headless(&mut app, args.max_ticks);
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    // Run the main loop, then restore the terminal even if it failed
    let outcome = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));
    restore_terminal(&mut terminal)?;
    outcome
}

/// Installs the tracing subscriber. `RUST_LOG` overrides the default filter.
fn init_logging(args: &Args) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keymaze=debug,info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);

    if let Some(path) = &args.log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        let subscriber = builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else if args.headless {
        let subscriber = builder
            .with_ansi(true)
            .with_writer(io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Reads a maze from a text map or a JSON snapshot and checks it can be solved.
fn load_snapshot(path: &Path) -> Result<MazeSnapshot> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read map file {}", path.display()))?;
    let snapshot: MazeSnapshot = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid snapshot in {}", path.display()))?
    } else {
        parse_maze(&text).with_context(|| format!("Invalid map in {}", path.display()))?
    };
    snapshot
        .validate()
        .with_context(|| format!("Map {} cannot be solved", path.display()))?;
    Ok(snapshot)
}

/// Runs the simulation without a terminal until the maze is won.
fn run_headless(app: &mut App, max_ticks: usize) -> Result<()> {
    let started = Instant::now();
    while !app.game_over && app.environment.turns() < max_ticks {
        app.tick()?;
    }
    if !app.game_over {
        bail!("Maze not solved after {max_ticks} ticks");
    }
    info!(
        turns = app.environment.turns(),
        plans = app.session.recomputations(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Run finished"
    );
    println!("{}", headless_report(app));
    Ok(())
}

/// Summary line followed by the floor the run ended on.
fn headless_report(app: &App) -> String {
    let snapshot = app.environment.snapshot();
    let mut report = format!(
        "Solved in {} turns ({} plans computed)\n",
        app.environment.turns(),
        app.session.recomputations()
    );
    if let Some(floor) = snapshot.floors.get(snapshot.current_floor) {
        report.push_str(&render_floor(floor));
    }
    report
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
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                        KeyCode::Char(' ') => app.toggle_pause(),
                        KeyCode::Char('r') => app.reset(),
                        KeyCode::Up => app.manual_move(Heading::Up),
                        KeyCode::Down => app.manual_move(Heading::Down),
                        KeyCode::Left => app.manual_move(Heading::Left),
                        KeyCode::Right => app.manual_move(Heading::Right),
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick()?;
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
            Constraint::Min(5),    // Map
            Constraint::Length(7), // Status
            Constraint::Length(2), // Help
        ])
        .split(frame.area());

    render_map(frame, main_layout[0], app.environment.snapshot());
    render_status(frame, main_layout[1], app);

    let help = if app.paused {
        "PAUSED. space resume | arrows move | r reset | q/Esc quit"
    } else {
        "space pause | arrows move | r reset | q/Esc quit"
    };
    let help_text = Paragraph::new(help)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn key_style(color: KeyColor) -> Style {
    match color {
        KeyColor::A => Style::default().fg(Color::Yellow),
        KeyColor::B => Style::default().fg(Color::Cyan),
    }
}

fn arrow(heading: Heading) -> char {
    match heading {
        Heading::Up => '↑',
        Heading::Down => '↓',
        Heading::Left => '←',
        Heading::Right => '→',
    }
}

fn describe_advice(advice: &Advice) -> String {
    match advice {
        Advice::AtExit => "standing on the exit".to_string(),
        Advice::Proceed(heading) => format!("exit is open, head {}", arrow(*heading)),
        Advice::FetchKeys(keys) => {
            let keys: Vec<String> = keys
                .iter()
                .map(|key| format!("{:?} at ({}, {})", key.color, key.position.x, key.position.y))
                .collect();
            format!("fetch key {}", keys.join(", "))
        }
        Advice::Unreachable => "exit unreachable from here".to_string(),
    }
}

fn keys_heading(carried: KeyTally) -> String {
    format!("Keys carried ({}): ", carried.total())
}

/// Renders the agent's keys and the solver's state.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let snapshot = app.environment.snapshot();
    let agent = &snapshot.agent;

    let mut keys_line = vec![Span::raw(keys_heading(agent.carried_keys()))];
    for (color, count) in agent.carried_keys().iter() {
        for _ in 0..count {
            keys_line.push(Span::styled("k", key_style(color)));
        }
    }

    let remaining = app.session.remaining_steps();
    let upcoming: String = remaining.iter().take(12).copied().map(arrow).collect();

    let lines = vec![
        Line::from(format!(
            "Floor {}/{}  Pos: ({}, {})  Turns: {}",
            snapshot.current_floor + 1,
            snapshot.floors.len(),
            agent.position.x,
            agent.position.y,
            app.environment.turns()
        )),
        Line::from(keys_line),
        Line::from(format!(
            "Plan: {} steps left {}  ({} computed)",
            remaining.len(),
            upcoming,
            app.session.recomputations()
        )),
        Line::from(format!(
            "Hint: {}",
            app.advice.as_ref().map_or_else(|| "-".to_string(), describe_advice)
        )),
        Line::from(format!(
            "Last: {}",
            app.last_result
                .as_ref()
                .map_or_else(|| "-".to_string(), |result| format!("{result:?}"))
        )),
    ];

    let status = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, area);
}

/// Renders the current floor's cell grid with the agent on top.
fn render_map(frame: &mut Frame, area: Rect, snapshot: &MazeSnapshot) {
    let title = if snapshot.is_won {
        "Keymaze (solved)"
    } else {
        "Keymaze"
    };
    let Ok(floor) = snapshot.floor() else {
        let empty = Paragraph::new("No floor to show")
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    };
    let agent_cell = CellCoord::of_room(snapshot.agent.position);

    let lines: Vec<Line> = floor
        .grid
        .rows()
        .enumerate()
        .map(|(y, row)| {
            let spans: Vec<Span> = row
                .iter()
                .enumerate()
                .map(|(x, code)| {
                    let cell = CellCoord::new(x, y);
                    if Some(cell) == agent_cell {
                        return Span::styled("@", Style::default().fg(Color::Red).bold());
                    }
                    cell_span(cell, *code)
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}

fn cell_span(cell: CellCoord, code: CellCode) -> Span<'static> {
    match code {
        CellCode::Clear => Span::raw(" "),
        CellCode::Wall => Span::styled("#", Style::default().fg(Color::DarkGray)),
        CellCode::Start => Span::styled("s", Style::default().fg(Color::DarkGray)),
        CellCode::End => Span::styled("E", Style::default().fg(Color::Green).bold()),
        CellCode::DoorA | CellCode::DoorB => {
            let symbol = if cell.x % 2 == 0 { "|" } else { "-" };
            let style = code.door_color().map_or_else(Style::default, key_style);
            Span::styled(symbol, style)
        }
        CellCode::KeyA | CellCode::KeyB => {
            let style = code.key_color().map_or_else(Style::default, key_style);
            Span::styled("k", style)
        }
    }
}
