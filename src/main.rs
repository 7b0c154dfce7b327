//! Application entry point for Point Reader.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse command-line flags and load [`AppConfig`].
//! 3. Create the [`tokio`] runtime.
//! 4. Build the Gemini client and the audio output (silent fallback when
//!    there is no device).
//! 5. Spawn the session controller and a snapshot printer.
//! 6. Read commands from stdin until `quit` or end of input.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};

use point_reader::{
    audio::{AudioOutput, CpalOutput, SilentOutput},
    config::AppConfig,
    service::{GeminiClient, TranslationMode},
    session::{Collaborators, SessionController, SessionSnapshot, TapTarget, UserInput},
};

// ---------------------------------------------------------------------------
// Command-line flags
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "point-reader",
    about = "Tap text in a picture and hear it read aloud, optionally translated",
    version
)]
struct Args {
    /// Settings file (defaults to <config dir>/point-reader/settings.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Translation mode: original, translate_en, translate_zh, translate_es
    #[arg(long, short = 'm')]
    mode: Option<TranslationMode>,

    /// Image to open on startup
    image: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Interactive commands
// ---------------------------------------------------------------------------

const HELP: &str = "\
commands:
  open <path>                 load an image and detect its text
  tap <x> <y> <width> <height> tap pixel (x, y) on an image rendered at width x height
  say <index>                 read region <index> (see `regions`)
  mode <mode>                 original | translate_en | translate_zh | translate_es
  regions                     list detected regions
  status                      show the session state
  clear                       close the image
  quit                        exit";

#[derive(Debug, PartialEq)]
enum Command {
    Open(PathBuf),
    Tap {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Say(usize),
    Mode(TranslationMode),
    Regions,
    Status,
    Clear,
    Help,
    Quit,
}

/// Everything after the command word, with only the outer whitespace
/// removed, so paths keep their inner spacing.
fn rest_of_line<'a>(line: &'a str, name: &str) -> &'a str {
    line.trim_start()
        .strip_prefix(name)
        .unwrap_or_default()
        .trim()
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Err("empty command".into());
    };
    let args: Vec<&str> = words.collect();

    let number = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| format!("'{s}' is not a number"))
    };

    match (name, args.as_slice()) {
        ("open", [_, ..]) => Ok(Command::Open(PathBuf::from(rest_of_line(line, name)))),
        ("tap", [x, y, w, h]) => Ok(Command::Tap {
            x: number(*x)?,
            y: number(*y)?,
            width: number(*w)?,
            height: number(*h)?,
        }),
        ("say", [index]) => index
            .parse()
            .map(Command::Say)
            .map_err(|_| format!("'{index}' is not a region index")),
        ("mode", [mode]) => mode.parse().map(Command::Mode),
        ("regions", []) => Ok(Command::Regions),
        ("status", []) => Ok(Command::Status),
        ("clear", []) => Ok(Command::Clear),
        ("help" | "?", []) => Ok(Command::Help),
        ("quit" | "exit", []) => Ok(Command::Quit),
        _ => Err(format!("unrecognised command '{}'; type `help`", line.trim())),
    }
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn describe(snapshot: &SessionSnapshot) -> String {
    let mut line = format!(
        "[{}] mode={} regions={}",
        snapshot.status,
        snapshot.translation_mode,
        snapshot.regions.len()
    );
    if let Some(active) = &snapshot.active_region {
        line.push_str(&format!(" reading={:?}", active.text));
    }
    if let Some(message) = snapshot.error_message() {
        line.push_str(&format!(" error=\"{message}\""));
    }
    line
}

fn print_regions(snapshot: &SessionSnapshot) {
    if snapshot.regions.is_empty() {
        println!("no regions");
        return;
    }
    for (i, (region, overlay)) in snapshot
        .regions
        .iter()
        .zip(&snapshot.overlays)
        .enumerate()
    {
        println!(
            "{i:>3}  {:?}  box={:?}  at {:.1}%,{:.1}% size {:.1}%x{:.1}%{}",
            region.text,
            region.bounds.to_array(),
            overlay.left,
            overlay.top,
            overlay.width,
            overlay.height,
            if overlay.active { "  *" } else { "" }
        );
    }
}

/// Print a line whenever the visible state changes.
async fn print_snapshots(mut snapshots: watch::Receiver<SessionSnapshot>) {
    let mut last = String::new();
    while snapshots.changed().await.is_ok() {
        let line = describe(&snapshots.borrow_and_update());
        if line != last {
            println!("{line}");
            last = line;
        }
    }
}

async fn open_image(path: &Path, inputs: &mpsc::Sender<UserInput>) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    inputs
        .send(UserInput::ImageSelected(bytes))
        .await
        .context("session controller has stopped")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Flags + configuration
    let args = Args::parse();
    let loaded = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let mode = args.mode.unwrap_or(config.session.default_mode);
    log::info!("Point Reader starting up (mode: {})", mode.label());

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async move {
        // 4. Collaborators + audio output
        let client = Arc::new(GeminiClient::from_config(&config.service));

        let output: Box<dyn AudioOutput> = match CpalOutput::new() {
            Ok(output) => Box::new(output),
            Err(e) => {
                log::warn!("Audio output unavailable ({e}); playback will be silent");
                Box::new(SilentOutput::new())
            }
        };

        // 5. Session controller + snapshot printer
        let controller = SessionController::new(
            Collaborators::from_shared(client),
            output,
            config.playback.pcm_format(),
            mode,
            config.service.timeout(),
        );
        let snapshots = controller.subscribe();
        let (input_tx, input_rx) = mpsc::channel::<UserInput>(16);

        let controller_task = tokio::spawn(controller.run(input_rx));
        tokio::spawn(print_snapshots(snapshots.clone()));

        if let Some(path) = &args.image {
            if let Err(e) = open_image(path, &input_tx).await {
                eprintln!("{e:#}");
            }
        }

        // 6. Command loop
        println!("{HELP}");
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(message) => {
                    eprintln!("{message}");
                    continue;
                }
            };

            let input = match command {
                Command::Open(path) => {
                    if let Err(e) = open_image(&path, &input_tx).await {
                        eprintln!("{e:#}");
                    }
                    continue;
                }
                Command::Tap {
                    x,
                    y,
                    width,
                    height,
                } => UserInput::Tap {
                    target: TapTarget::Point {
                        x,
                        y,
                        rendered_width: width,
                        rendered_height: height,
                    },
                    mode: None,
                },
                Command::Say(index) => {
                    let region = snapshots.borrow().regions.get(index).cloned();
                    match region {
                        Some(region) => UserInput::Tap {
                            target: TapTarget::Region(region),
                            mode: None,
                        },
                        None => {
                            eprintln!("no region {index}");
                            continue;
                        }
                    }
                }
                Command::Mode(mode) => UserInput::SetMode(mode),
                Command::Clear => UserInput::Clear,
                Command::Regions => {
                    print_regions(&snapshots.borrow());
                    continue;
                }
                Command::Status => {
                    println!("{}", describe(&snapshots.borrow()));
                    continue;
                }
                Command::Help => {
                    println!("{HELP}");
                    continue;
                }
                Command::Quit => break,
            };

            if input_tx.send(input).await.is_err() {
                break;
            }
        }

        drop(input_tx);
        controller_task.await.context("session controller panicked")?;
        log::info!("Point Reader shutting down");
        Ok::<(), anyhow::Error>(())
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
