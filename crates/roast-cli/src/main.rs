mod render;

use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use roast_contracts::chat::{parse_intent, SESSION_HELP_COMMANDS};
use roast_contracts::events::EventWriter;
use roast_contracts::schema::critique_schema;
use roast_contracts::{RoastError, RoastSession, RoastState};
use roast_engine::{image_payload_from_path, RoastEngine};
use uuid::Uuid;

use crate::render::{render_terminal, write_html};

#[derive(Debug, Parser)]
#[command(
    name = "roast-rs",
    version,
    about = "Brutally honest design critique of a website screenshot"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Roast one screenshot and exit.
    Roast(RoastArgs),
    /// Interactive session driven by slash commands.
    Session(SessionArgs),
    /// Print the response schema sent to the gateway.
    Schema(SchemaArgs),
}

#[derive(Debug, Parser)]
struct RoastArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    json: bool,
    #[arg(long)]
    html: Option<PathBuf>,
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaDialect {
    Gemini,
    JsonSchema,
}

#[derive(Debug, Parser)]
struct SchemaArgs {
    #[arg(long, value_enum, default_value = "gemini")]
    dialect: SchemaDialect,
}

const LOADING_MESSAGES: &[&str] = &[
    "Analyzing your terrible font choices...",
    "Trying not to vomit...",
    "Checking if this layout is legal...",
    "Consulting with actual designers...",
    "Laughing at your color palette...",
    "Searching for a single redeeming quality...",
    "Why did you align it like that?",
    "Calculating emotional damage...",
];
const LOADING_INTERVAL: Duration = Duration::from_millis(2500);

/// Exit code for a roast that finished in the Error state.
const EXIT_ROAST_FAILED: i32 = 2;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("roast-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Roast(args) => run_roast(args),
        Command::Session(args) => {
            run_session(args)?;
            Ok(0)
        }
        Command::Schema(args) => {
            let schema = critique_schema();
            let rendered = match args.dialect {
                SchemaDialect::Gemini => schema.to_gemini_schema(),
                SchemaDialect::JsonSchema => schema.to_json_schema(),
            };
            println!("{}", serde_json::to_string_pretty(&rendered)?);
            Ok(0)
        }
    }
}

fn event_writer(path: Option<&Path>) -> EventWriter {
    let run_id = format!("roast-{}", Uuid::new_v4());
    match path {
        Some(path) => EventWriter::new(path, run_id),
        None => EventWriter::disabled(run_id),
    }
}

fn build_engine(events: &EventWriter, model: Option<String>, quiet: bool) -> Result<RoastEngine> {
    let explicit = model.is_some();
    let engine = RoastEngine::new(events.clone(), model)?;
    if explicit && !quiet {
        if let Some(reason) = engine.fallback_reason() {
            eprintln!("{reason} Using {}.", engine.model());
        }
    }
    Ok(engine)
}

fn run_roast(args: RoastArgs) -> Result<i32> {
    let events = event_writer(args.events.as_deref());
    let engine = build_engine(&events, args.model, args.quiet)?;
    let mut session = RoastSession::with_events(events);

    let image = image_payload_from_path(&args.image)?;
    if let Err(err) = session.select_image(image) {
        eprintln!("{}", err.user_message());
        return Ok(EXIT_ROAST_FAILED);
    }
    if let Some(url) = args.url.as_deref() {
        session.set_url(url);
    }

    roast_with_ticker(&mut session, &engine, || loading_ticker(args.quiet))?;

    match session.state() {
        RoastState::Roasted(critique) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(critique)?);
            } else {
                print!("{}", render_terminal(critique));
            }
            if let Some(out) = args.html.as_deref() {
                write_html(critique, args.url.as_deref(), out)?;
                if !args.quiet {
                    eprintln!("HTML report written to {}", out.display());
                }
            }
            Ok(0)
        }
        RoastState::Error(message) => {
            eprintln!("{message}");
            Ok(EXIT_ROAST_FAILED)
        }
        other => anyhow::bail!("roast ended in unexpected state {}", other.name()),
    }
}

/// `begin`, run, `finish`, with a ticker alive only while the gateway call runs.
///
/// A refused `begin` never starts the ticker.
fn roast_with_ticker<T>(
    session: &mut RoastSession,
    engine: &RoastEngine,
    start_ticker: impl FnOnce() -> T,
) -> Result<(), RoastError> {
    let request = session.begin()?;
    let ticker = start_ticker();
    let outcome = engine.roast(&request);
    drop(ticker);
    session.finish(outcome)
}

fn loading_ticker(quiet: bool) -> Option<LoadingTicker> {
    (!quiet).then(LoadingTicker::start)
}

/// Prints a rotating loading line to stderr until dropped.
struct LoadingTicker {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LoadingTicker {
    fn start() -> Self {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let mut idx = 0usize;
            loop {
                eprintln!("{}", LOADING_MESSAGES[idx % LOADING_MESSAGES.len()]);
                idx += 1;
                match rx.recv_timeout(LOADING_INTERVAL) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            }
        });
        Self {
            stop: Some(tx),
            handle: Some(handle),
        }
    }
}

impl Drop for LoadingTicker {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_session(args: SessionArgs) -> Result<()> {
    let events = event_writer(args.events.as_deref());
    let engine = build_engine(&events, args.model, args.quiet)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    session_loop(stdin.lock(), &mut stdout, engine, &events, args.quiet)
}

fn session_loop<R: BufRead, W: Write>(
    mut input: R,
    out: &mut W,
    mut engine: RoastEngine,
    events: &EventWriter,
    quiet: bool,
) -> Result<()> {
    let mut session = RoastSession::with_events(events.clone());
    let mut line = String::new();

    writeln!(
        out,
        "Roast session started ({}). Type /help for commands.",
        engine.model()
    )?;

    loop {
        write!(out, "> ")?;
        out.flush()?;

        line.clear();
        let read = match input.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match intent.action.as_str() {
            "noop" => continue,
            "help" => {
                writeln!(out, "Commands: {}", SESSION_HELP_COMMANDS.join(" "))?;
                writeln!(out, "Any other text sets the URL context.")?;
            }
            "quit" => break,
            "select_image" => {
                let Some(path) = intent.arg("path") else {
                    writeln!(out, "/image requires a path")?;
                    continue;
                };
                let payload = match image_payload_from_path(Path::new(path)) {
                    Ok(payload) => payload,
                    Err(err) => {
                        writeln!(out, "{}", err.user_message())?;
                        continue;
                    }
                };
                let label = format!("{} ({})", payload.name, payload.mime_type);
                match session.select_image(payload) {
                    Ok(()) => writeln!(out, "Screenshot selected: {label}")?,
                    Err(err) => writeln!(out, "{}", err.user_message())?,
                }
            }
            "set_url" => {
                let url = intent.arg("url").unwrap_or_default().to_string();
                session.set_url(url.clone());
                if url.is_empty() {
                    writeln!(out, "URL cleared")?;
                } else {
                    writeln!(out, "URL set to {url}")?;
                }
            }
            "set_model" => {
                let Some(model) = intent.arg("model") else {
                    writeln!(out, "Model: {} ({})", engine.model(), engine.provider())?;
                    continue;
                };
                match build_engine(events, Some(model.to_string()), quiet) {
                    Ok(next) => {
                        engine = next;
                        writeln!(out, "Model set to {} ({})", engine.model(), engine.provider())?;
                    }
                    Err(err) => writeln!(out, "Model change failed: {err:#}")?,
                }
            }
            "roast" => {
                if let Err(err) = roast_with_ticker(&mut session, &engine, || loading_ticker(quiet))
                {
                    writeln!(out, "{}", err.user_message())?;
                    continue;
                }
                match session.state() {
                    RoastState::Roasted(critique) => write!(out, "{}", render_terminal(critique))?,
                    RoastState::Error(message) => writeln!(out, "{message}")?,
                    _ => {}
                }
            }
            "reset" => {
                session.reset();
                writeln!(out, "Reset. Select a new screenshot with /image.")?;
            }
            "status" => print_status(out, &session, &engine)?,
            "print_json" => match session.critique() {
                Some(critique) => writeln!(out, "{}", serde_json::to_string_pretty(critique)?)?,
                None => writeln!(out, "Nothing roasted yet.")?,
            },
            "export_html" => {
                let Some(path) = intent.arg("path") else {
                    writeln!(out, "/html requires a path")?;
                    continue;
                };
                let Some(critique) = session.critique() else {
                    writeln!(out, "Nothing roasted yet.")?;
                    continue;
                };
                let url = Some(session.url()).filter(|value| !value.trim().is_empty());
                match write_html(critique, url, Path::new(path)).context("html export failed") {
                    Ok(()) => writeln!(out, "HTML report written to {path}")?,
                    Err(err) => writeln!(out, "{err:#}")?,
                }
            }
            _ => writeln!(out, "Unknown command: {}", intent.raw.trim())?,
        }
    }

    Ok(())
}

fn print_status<W: Write>(out: &mut W, session: &RoastSession, engine: &RoastEngine) -> Result<()> {
    writeln!(out, "State: {}", session.state().name())?;
    match session.selected_image() {
        Some(image) => writeln!(out, "Screenshot: {} ({})", image.name, image.mime_type)?,
        None => writeln!(out, "Screenshot: none")?,
    }
    let url = session.url().trim();
    writeln!(out, "URL: {}", if url.is_empty() { "none" } else { url })?;
    writeln!(out, "Model: {} ({})", engine.model(), engine.provider())?;
    if let Some(message) = session.error_message() {
        writeln!(out, "Last error: {message}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;

    use clap::Parser;
    use roast_contracts::events::{read_events, EventWriter};
    use roast_contracts::{RoastErrorKind, RoastSession, RoastState};
    use roast_engine::{image_payload_from_path, RoastEngine};

    use super::{roast_with_ticker, session_loop, Cli, Command, SchemaDialect, LOADING_MESSAGES};

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn dryrun_engine(events: &EventWriter) -> anyhow::Result<RoastEngine> {
        Ok(RoastEngine::new(
            events.clone(),
            Some("dryrun-critique-1".to_string()),
        )?)
    }

    fn write_shot(dir: &Path) -> anyhow::Result<std::path::PathBuf> {
        let shot = dir.join("shot.png");
        fs::write(&shot, PNG_HEADER)?;
        Ok(shot)
    }

    fn run_script(script: &str, events: &EventWriter) -> anyhow::Result<String> {
        let mut out = Vec::new();
        session_loop(
            Cursor::new(script.to_string()),
            &mut out,
            dryrun_engine(events)?,
            events,
            true,
        )?;
        Ok(String::from_utf8(out)?)
    }
    #[test]
    fn roast_flags_parse() {
        let cli = Cli::parse_from([
            "roast-rs",
            "roast",
            "--image",
            "shot.png",
            "--url",
            "https://example.com",
            "--json",
            "--quiet",
        ]);
        match cli.command {
            Command::Roast(args) => {
                assert_eq!(args.image.to_str(), Some("shot.png"));
                assert_eq!(args.url.as_deref(), Some("https://example.com"));
                assert!(args.json && args.quiet);
                assert!(args.html.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn schema_dialect_parses_kebab_case() {
        let cli = Cli::parse_from(["roast-rs", "schema", "--dialect", "json-schema"]);
        assert!(matches!(
            cli.command,
            Command::Schema(args) if matches!(args.dialect, SchemaDialect::JsonSchema)
        ));
    }

    #[test]
    fn loading_messages_start_with_font_jab() {
        assert_eq!(LOADING_MESSAGES.len(), 8);
        assert_eq!(LOADING_MESSAGES[0], "Analyzing your terrible font choices...");
    }

    #[test]
    fn dryrun_roast_through_session_logs_state_changes() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let shot = write_shot(temp.path())?;
        let events_path = temp.path().join("events.jsonl");
        let events = EventWriter::new(&events_path, "roast-test");

        let engine = dryrun_engine(&events)?;
        let mut session = RoastSession::with_events(events);
        session.select_image(image_payload_from_path(&shot)?)?;
        let started = Cell::new(0);
        roast_with_ticker(&mut session, &engine, || started.set(started.get() + 1))?;
        assert!(matches!(session.state(), RoastState::Roasted(_)));
        assert_eq!(started.get(), 1);

        let events = read_events(&events_path)?;
        let transitions: Vec<String> = events
            .iter()
            .filter(|event| event["type"] == "session_state")
            .filter_map(|event| event["to"].as_str().map(str::to_string))
            .collect();
        assert_eq!(transitions, vec!["analyzing", "roasted"]);
        Ok(())
    }

    #[test]
    fn refused_roast_never_starts_ticker() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events = EventWriter::disabled("roast-test");
        let engine = dryrun_engine(&events)?;
        let started = Cell::new(0);

        let mut session = RoastSession::new();
        let err = roast_with_ticker(&mut session, &engine, || started.set(started.get() + 1))
            .unwrap_err();
        assert_eq!(err.kind(), RoastErrorKind::Precondition);
        assert_eq!(started.get(), 0);

        session.select_image(image_payload_from_path(&write_shot(temp.path())?)?)?;
        roast_with_ticker(&mut session, &engine, || started.set(started.get() + 1))?;
        let err = roast_with_ticker(&mut session, &engine, || started.set(started.get() + 1))
            .unwrap_err();
        assert_eq!(err.kind(), RoastErrorKind::Precondition);
        assert_eq!(started.get(), 1);
        Ok(())
    }

    #[test]
    fn failed_html_export_keeps_session_alive() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let shot = write_shot(temp.path())?;
        // A regular file where the report's parent directory should be.
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"file")?;
        let script = format!(
            "/image {}\n/roast\n/html {}\n/status\n/quit\n",
            shot.display(),
            blocker.join("r.html").display()
        );

        let output = run_script(&script, &EventWriter::disabled("roast-test"))?;
        assert!(output.contains("html export failed"), "{output}");
        assert!(output.contains("State: roasted"), "{output}");
        Ok(())
    }

    #[test]
    fn session_script_sets_url_and_exports_html() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let shot = write_shot(temp.path())?;
        let report = temp.path().join("report.html");
        let script = format!(
            "https://example.com\n/roast\n/image {}\n/roast\n/html {}\n/bogus\n",
            shot.display(),
            report.display()
        );

        let output = run_script(&script, &EventWriter::disabled("roast-test"))?;
        assert!(output.contains("URL set to https://example.com"));
        assert!(output.contains("Select a screenshot first."));
        assert!(output.contains("ROAST SCORE:"));
        assert!(output.contains("Unknown command: /bogus"));
        assert!(fs::read_to_string(&report)?.contains("https://example.com"));
        Ok(())
    }
}
