pub mod config;
pub mod errors;
pub mod keymap;
pub mod logging;
pub mod recorder;
pub mod runtime;
pub mod tui;
pub mod types;

use clap::{error::ErrorKind, Parser};
use config::{load_config, AppConfig, CliOverrides};
use errors::TallyError;
use keymap::{map_key, InputCommand};
use logging::{JsonlLogger, LogEvent};
use recorder::{Recorder, Statistics};
use runtime::{ProductionRuntime, Terminal};
use serde_json::{json, Value};
use std::sync::Arc;
use types::EventKind;

#[derive(Debug, Clone, Parser)]
#[command(name = "tally")]
#[command(about = "Keyboard-driven yes/no session recorder")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
    #[arg(long)]
    pub log: Option<std::path::PathBuf>,
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

pub fn run() -> Result<i32, TallyError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    runtime: &ProductionRuntime,
) -> Result<i32, TallyError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(TallyError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        log_path: cli.log.clone(),
        quiet: cli.quiet,
    };
    let cfg = load_config(&overrides, runtime.file_system.as_ref())?;
    let logger = cfg
        .logging
        .path
        .as_ref()
        .map(|path| JsonlLogger::new(path, cfg.logging.max_payload_bytes));
    let recorder = Recorder::new(Arc::clone(&runtime.clock));
    let terminal = runtime.terminal.as_ref();

    terminal.enter_capture()?;
    let session = run_session(&cfg, &recorder, terminal, logger.as_ref());
    let restored = terminal.leave_capture();
    session?;
    restored?;
    Ok(0)
}

/// One interactive session: keys in, recorder operations out, summary
/// on demand and at the end. The recorder's worker threads are joined
/// by `end_session` before the final summary is taken, so the closing
/// figures never race an unfinished mutation.
fn run_session(
    cfg: &AppConfig,
    recorder: &Recorder,
    terminal: &dyn Terminal,
    logger: Option<&JsonlLogger>,
) -> Result<(), TallyError> {
    recorder.start_session();
    log_event(logger, "session_start", json!({}))?;

    loop {
        let Some(key) = terminal.read_key()? else {
            // End of piped input counts as quit.
            break;
        };
        let Some(command) = map_key(key) else {
            continue;
        };
        match command {
            InputCommand::Record(kind) => {
                let dispatched = match kind {
                    EventKind::Yes => recorder.record_yes(),
                    EventKind::No => recorder.record_no(),
                };
                match dispatched {
                    Ok(()) => {
                        feedback(cfg, terminal, &format!("recorded {}", kind.as_str()))?;
                        log_event(logger, "event_recorded", json!({ "kind": kind.as_str() }))?;
                    }
                    Err(rejection) => {
                        terminal
                            .write_line(&format!("{} not recorded: {rejection}", kind.as_str()))?;
                        log_event(
                            logger,
                            "rejected",
                            json!({ "op": kind.as_str(), "reason": rejection.to_string() }),
                        )?;
                    }
                }
            }
            InputCommand::Undo => match recorder.undo() {
                Ok(()) => {
                    feedback(cfg, terminal, "undo requested")?;
                    log_event(logger, "undo_requested", json!({}))?;
                }
                Err(rejection) => {
                    terminal.write_line(&format!("undo not accepted: {rejection}"))?;
                    log_event(
                        logger,
                        "rejected",
                        json!({ "op": "undo", "reason": rejection.to_string() }),
                    )?;
                }
            },
            InputCommand::Summary => {
                show_summary(cfg, &recorder.snapshot(), terminal)?;
            }
            InputCommand::Help => {
                for line in tui::help_text().lines() {
                    terminal.write_line(line)?;
                }
            }
            InputCommand::Quit => break,
        }
    }

    recorder.end_session();
    let stats = recorder.snapshot();
    show_summary(cfg, &stats, terminal)?;
    log_event(
        logger,
        "session_end",
        json!({
            "yes": stats.yes_count,
            "no": stats.no_count,
            "ratio": tui::format_ratio(stats.ratio),
            "elapsed_secs": stats.elapsed_secs,
        }),
    )?;
    Ok(())
}

fn show_summary(
    cfg: &AppConfig,
    stats: &Statistics,
    terminal: &dyn Terminal,
) -> Result<(), TallyError> {
    if terminal.stdin_is_tty() {
        let frame = tui::render_summary(stats, cfg.display.width, cfg.display.height);
        terminal.draw(&frame)
    } else {
        terminal.write_line(&tui::summary_line(stats))
    }
}

fn feedback(cfg: &AppConfig, terminal: &dyn Terminal, line: &str) -> Result<(), TallyError> {
    if cfg.session.feedback {
        terminal.write_line(line)?;
    }
    Ok(())
}

fn log_event(
    logger: Option<&JsonlLogger>,
    event_type: &str,
    payload: Value,
) -> Result<(), TallyError> {
    let Some(logger) = logger else {
        return Ok(());
    };
    logger.append(&LogEvent {
        level: "info",
        event_type,
        payload,
    })
}
