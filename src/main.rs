use chartplay::playback::{
    Clock, ControlHandle, ControlListener, ControlState, KeyDevice, LogDevice, LogSink, RawInput,
    RunPhase, Scheduler, SystemClock,
};
use chartplay::{ChartFormat, NoteEvent, PlaybackConfig};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

/// Replay rhythm-game charts as timed key presses
#[derive(Parser)]
#[command(name = "chartplay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Show per-note detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a chart and print its canonical notes
    Inspect {
        #[command(flatten)]
        chart: ChartArgs,

        /// Print every note as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Print the default configuration as YAML
    ShowConfig,
    /// Play a chart against the logging key device; control keys are read from stdin
    ///
    /// Each stdin line is one control edge: `+k` key down, `-k` key up, `k` a full tap.
    Play {
        #[command(flatten)]
        chart: ChartArgs,

        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "strict")]
        mode: ModeArg,

        /// Start key (strict mode)
        #[arg(long, default_value = "y")]
        start_key: String,

        /// Abort key (strict and countdown modes)
        #[arg(long, default_value = "t")]
        abort_key: String,

        /// Start/pause/resume key (toggle mode)
        #[arg(long, default_value = "t")]
        toggle_key: String,

        /// Stop key (toggle mode)
        #[arg(long, default_value = "p")]
        stop_key: String,

        /// Seconds before playback starts (countdown mode)
        #[arg(long, default_value_t = 3.0)]
        countdown: f64,

        /// Log every key press at info level
        #[arg(long)]
        print_presses: bool,
    },
}

#[derive(Args)]
struct ChartArgs {
    /// Chart file (JSON)
    chart: PathBuf,

    #[arg(short, long, value_enum, default_value = "sectioned")]
    format: FormatArg,

    /// Difficulty to read (flat format)
    #[arg(long, default_value = "normal")]
    difficulty: String,

    /// Strum line to read (strum-line format)
    #[arg(long, default_value_t = 1)]
    strum_line: usize,
}

impl ChartArgs {
    fn format(&self) -> ChartFormat {
        match self.format {
            FormatArg::Flat => ChartFormat::FlatDifficulty {
                difficulty: self.difficulty.clone(),
            },
            FormatArg::Sectioned => ChartFormat::Sectioned,
            FormatArg::StrumLine => ChartFormat::StrumLine {
                index: self.strum_line,
            },
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Flat,
    Sectioned,
    StrumLine,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Strict,
    Toggle,
    Countdown,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Inspect { chart, json } => {
            let format = chart.format();
            let events = chartplay::parse_file(&chart.chart, &format)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
                return Ok(());
            }

            if let FormatArg::StrumLine = chart.format {
                let raw = std::fs::read_to_string(&chart.chart)?;
                for line in chartplay::strum_line_summaries(&raw)? {
                    println!(
                        "  [{}] position={} notes={} lanes={:?}",
                        line.index,
                        line.position.as_deref().unwrap_or("?"),
                        line.note_count,
                        line.lanes
                    );
                }
            }
            print_summary(&format, &events);
        }
        Commands::ShowConfig => {
            print!("{}", PlaybackConfig::default().to_yaml()?);
        }
        Commands::Play {
            chart,
            config,
            mode,
            start_key,
            abort_key,
            toggle_key,
            stop_key,
            countdown,
            print_presses,
        } => {
            let config = match config {
                Some(path) => PlaybackConfig::load(path)?,
                None => PlaybackConfig::default(),
            };
            let format = chart.format();
            let events = chartplay::prepare(&chart.chart, &format, &config)?;
            if events.is_empty() {
                anyhow::bail!("No playable notes found in {}", chart.chart.display());
            }
            print_summary(&format, &events);

            let device: Arc<dyn KeyDevice> = Arc::new(LogDevice);
            let clock = SystemClock::new();
            let control = ControlHandle::new();

            let listener = match mode {
                ModeArg::Strict => {
                    println!(
                        "Release '{}', then press it to start. '{}' stops.",
                        start_key, abort_key
                    );
                    ControlListener::strict(&start_key, &abort_key, control.clone())
                }
                ModeArg::Toggle => {
                    println!(
                        "Press '{}' to start/pause/resume, '{}' to stop.",
                        toggle_key, stop_key
                    );
                    ControlListener::toggle(
                        &toggle_key,
                        &stop_key,
                        device.clone(),
                        config.all_keys(),
                        control.clone(),
                    )
                }
                ModeArg::Countdown => {
                    let listener = ControlListener::countdown(&abort_key, control.clone());
                    listener.arm_countdown(clock.now(), countdown);
                    println!("Starting in {:.1}s. '{}' stops.", countdown, abort_key);
                    listener
                }
            };

            // Not joined: it may stay blocked on stdin after playback ends.
            thread::spawn(move || listen_stdin(listener, clock));

            let mut scheduler = Scheduler::new(events, config, device, clock, control);
            let mut sink = LogSink { print_presses };
            match scheduler.run(&mut sink) {
                RunPhase::Finished => println!("Song finished."),
                _ => println!("Playback stopped."),
            }
        }
    }

    Ok(())
}

fn print_summary(format: &ChartFormat, events: &[NoteEvent]) {
    println!("Loaded {} notes ({} chart).", events.len(), format);
    if !events.is_empty() {
        println!("First {} notes:", events.len().min(10));
        for event in events.iter().take(10) {
            println!("  {}", event);
        }
    }
}

fn listen_stdin(listener: ControlListener, clock: SystemClock) {
    listen(&listener, io::stdin().lock(), &clock);
}

/// Feed control lines to `listener` until it stops or `input` ends.
///
/// Input that ends before the start gesture cancels the run, since nothing can start it.
fn listen(listener: &ControlListener, input: impl BufRead, clock: &impl Clock) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        for edge in control_inputs(&line) {
            if listener.handle_input(&edge, clock.now()) == ControlState::Stopped {
                return;
            }
        }
    }

    if matches!(
        listener.handle().state(),
        ControlState::Idle | ControlState::ArmPending
    ) {
        log::warn!("control input closed before start, stopping");
        listener.handle().cancel();
    }
}

/// `+k` down, `-k` up, anything else a tap of that key.
fn control_inputs(line: &str) -> Vec<RawInput> {
    let line = line.trim();
    if line.len() > 1 {
        if let Some(key) = line.strip_prefix('+') {
            return vec![RawInput::down(key)];
        }
        if let Some(key) = line.strip_prefix('-') {
            return vec![RawInput::up(key)];
        }
    }
    if line.is_empty() {
        return Vec::new();
    }
    vec![RawInput::down(line), RawInput::up(line)]
}
