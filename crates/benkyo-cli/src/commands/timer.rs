//! Interactive timer session.
//!
//! `timer run` drives the controller from a terminal: ticks arrive from the
//! clock driver, commands are read line-by-line from stdin, and save notices
//! are printed as they land. With `--json` every event and notice is emitted
//! as one JSON line so another process can drive the session over a pipe.

use std::io::Write as _;
use std::sync::Arc;

use chrono::Local;
use clap::Subcommand;
use tokio::io::{AsyncBufReadExt, BufReader};

use benkyo_core::{
    Config, CoreError, Database, Event, IdentityProvider, Notice, RunState, TimerController,
    TimerMode, UserHandle,
};

use crate::common::format_clock;

const COMMAND_HINT: &str =
    "commands: start stop mode <m> preset [min] category <name|-> reset status help quit";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run an interactive timer session
    Run {
        /// Initial mode: stopwatch, countdown or pomodoro
        #[arg(long, value_parser = parse_mode, default_value = "stopwatch")]
        mode: TimerMode,
        /// Category to tag saved sessions with
        #[arg(long)]
        category: Option<String>,
        /// Emit events as JSON lines instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

fn parse_mode(s: &str) -> Result<TimerMode, String> {
    s.parse().map_err(|e: CoreError| e.to_string())
}

/// Re-reads the profile from disk on every lookup, so setting or clearing
/// it in another terminal takes effect before the next session is saved.
struct LiveProfile;

impl IdentityProvider for LiveProfile {
    fn current_identity(&self) -> Option<UserHandle> {
        Config::load_or_default().current_identity()
    }
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Run {
            mode,
            category,
            json,
        } => {
            // Dropping the runtime on the way out waits for in-flight
            // session writes, so a quick quit cannot lose a save.
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_session(mode, category, json))
        }
    }
}

async fn run_session(
    mode: TimerMode,
    category: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store = Arc::new(Database::open()?);
    let (mut controller, mut ticks, mut notices) =
        TimerController::new(config.timer_settings(), store, Arc::new(LiveProfile));

    controller.set_category(category);
    if mode != TimerMode::Stopwatch {
        let _ = controller.select_mode(mode);
    }

    let mut printer = Printer::new(json);
    printer.event(&controller.snapshot());
    printer.line(COMMAND_HINT);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(tick) = ticks.recv() => {
                match controller.on_tick(tick) {
                    Some(event) => printer.event(&event),
                    None => {
                        if controller.is_running() {
                            printer.tick(controller.mode(), controller.display_secs());
                        }
                    }
                }
            }
            Some(notice) = notices.recv() => {
                printer.notice(&notice);
            }
            line = lines.next_line() => {
                match line? {
                    Some(input) => {
                        if handle_command(&input, &mut controller, &config, &mut printer)
                            == Flow::Quit
                        {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Quit,
}

fn handle_command(
    input: &str,
    controller: &mut TimerController,
    config: &Config,
    printer: &mut Printer,
) -> Flow {
    let mut parts = input.split_whitespace();
    let Some(command) = parts.next() else {
        return Flow::Continue;
    };
    let arg = parts.next();

    match command {
        "start" => {
            if controller.is_running() {
                printer.line("already running");
            } else {
                match controller.toggle() {
                    Ok(event) => printer.event(&event),
                    Err(CoreError::NoIdentity) => {
                        printer.line("no profile set; run `benkyo-cli profile set <name>` first");
                    }
                    Err(e) => printer.line(&format!("error: {e}")),
                }
            }
        }
        "stop" => {
            if !controller.is_running() {
                printer.line("not running");
            } else {
                match controller.toggle() {
                    Ok(event) => printer.event(&event),
                    Err(e) => printer.line(&format!("error: {e}")),
                }
            }
        }
        "mode" => match arg.map(str::parse::<TimerMode>) {
            Some(Ok(mode)) => {
                let event = controller.select_mode(mode);
                printer.event(&event);
            }
            Some(Err(e)) => printer.line(&e.to_string()),
            None => printer.line("usage: mode <stopwatch|countdown|pomodoro>"),
        },
        "preset" => match arg {
            Some(minutes) => match minutes.parse::<u64>() {
                Ok(minutes) => match controller.set_countdown_initial(minutes.saturating_mul(60)) {
                    Ok(event) => printer.event(&event),
                    Err(e) => printer.line(&e.to_string()),
                },
                Err(_) => printer.line("usage: preset <minutes>"),
            },
            None => {
                let presets: Vec<String> = config
                    .timer
                    .countdown_presets_min
                    .iter()
                    .map(|m| m.to_string())
                    .collect();
                printer.line(&format!("presets (minutes): {}", presets.join(" ")));
            }
        },
        "category" => match arg {
            Some("-") => {
                controller.set_category(None);
                printer.line("category cleared");
            }
            Some(name) => {
                controller.set_category(Some(name.to_string()));
                printer.line(&format!("category: {name}"));
            }
            None => match controller.category() {
                Some(name) => printer.line(&format!("category: {name}")),
                None => printer.line("no category"),
            },
        },
        "reset" => {
            let event = controller.reset();
            printer.event(&event);
        }
        "status" => printer.event(&controller.snapshot()),
        "help" => printer.line(COMMAND_HINT),
        "quit" | "exit" | "q" => return Flow::Quit,
        other => printer.line(&format!("unknown command: {other}")),
    }

    Flow::Continue
}

/// Writes the session's output. Human mode overwrites one status line per
/// tick with `\r`; JSON mode keeps stdout to one JSON document per line and
/// moves feedback text to stderr.
struct Printer {
    json: bool,
    /// A `\r` status line is on screen and needs a newline before the next
    /// full line.
    dirty: bool,
}

impl Printer {
    fn new(json: bool) -> Self {
        Self { json, dirty: false }
    }

    fn tick(&mut self, mode: TimerMode, display_secs: u64) {
        if self.json {
            return;
        }
        print!("\r{mode} {}  ", format_clock(display_secs));
        let _ = std::io::stdout().flush();
        self.dirty = true;
    }

    fn event(&mut self, event: &Event) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("error: {e}"),
            }
        } else {
            let text = describe_event(event);
            self.line(&text);
        }
    }

    fn notice(&mut self, notice: &Notice) {
        if self.json {
            match serde_json::to_string(notice) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("error: {e}"),
            }
        } else {
            let text = describe_notice(notice);
            self.line(&text);
        }
    }

    fn line(&mut self, text: &str) {
        if self.json {
            eprintln!("{text}");
            return;
        }
        if self.dirty {
            println!();
            self.dirty = false;
        }
        println!("{text}");
    }
}

fn describe_event(event: &Event) -> String {
    match event {
        Event::TimerStarted {
            mode, display_secs, ..
        } => format!("started {mode} at {}", format_clock(*display_secs)),
        Event::TimerStopped {
            mode, display_secs, ..
        } => format!("stopped {mode} at {}", format_clock(*display_secs)),
        Event::ModeSelected {
            mode, display_secs, ..
        } => format!("mode: {mode} ({})", format_clock(*display_secs)),
        Event::TimerReset {
            mode, display_secs, ..
        } => format!("reset {mode} to {}", format_clock(*display_secs)),
        Event::CountdownConfigured {
            initial_secs,
            applied,
            ..
        } => {
            if *applied {
                format!("countdown set to {}", format_clock(*initial_secs))
            } else {
                format!(
                    "countdown will be {} after this run",
                    format_clock(*initial_secs)
                )
            }
        }
        Event::IntervalCompleted {
            mode,
            duration_secs,
            run_state,
            ..
        } => {
            let tail = match run_state {
                RunState::Running => ", break running",
                RunState::Idle => "",
            };
            format!(
                "interval done: {} ({mode}){tail}",
                format_clock(*duration_secs)
            )
        }
        Event::PhaseRolled {
            from,
            to,
            display_secs,
            ..
        } => format!("phase: {from} -> {to} ({})", format_clock(*display_secs)),
        Event::StateSnapshot {
            mode,
            run_state,
            phase,
            display_secs,
            countdown_initial_secs,
            ..
        } => {
            let state = match run_state {
                RunState::Idle => "idle",
                RunState::Running => "running",
            };
            let clock = format_clock(*display_secs);
            match mode {
                TimerMode::Countdown => format!(
                    "{mode} {state} {clock} (initial {})",
                    format_clock(*countdown_initial_secs)
                ),
                TimerMode::Pomodoro => format!("{mode} {state} {clock} [{phase}]"),
                TimerMode::Stopwatch => format!("{mode} {state} {clock}"),
            }
        }
    }
}

fn describe_notice(notice: &Notice) -> String {
    match notice {
        Notice::SessionSaved {
            duration_secs,
            category,
            at,
        } => {
            let when = at.with_timezone(&Local).format("%H:%M");
            match category {
                Some(name) => format!(
                    "session saved at {when}: {} ({name})",
                    format_clock(*duration_secs)
                ),
                None => format!("session saved at {when}: {}", format_clock(*duration_secs)),
            }
        }
        Notice::SessionSaveFailed {
            duration_secs,
            reason,
            ..
        } => format!(
            "failed to save {} session: {reason}",
            format_clock(*duration_secs)
        ),
        Notice::IdentityMissing { duration_secs, .. } => format!(
            "session discarded ({}): no profile set",
            format_clock(*duration_secs)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benkyo_core::PomodoroPhase;
    use chrono::Utc;

    #[test]
    fn parses_mode_names() {
        assert_eq!(parse_mode("pomodoro").unwrap(), TimerMode::Pomodoro);
        assert!(parse_mode("siesta").is_err());
    }

    #[test]
    fn describes_interval_completion() {
        let auto_stopped = Event::IntervalCompleted {
            mode: TimerMode::Countdown,
            duration_secs: 2700,
            display_secs: 2700,
            run_state: RunState::Idle,
            at: Utc::now(),
        };
        assert_eq!(describe_event(&auto_stopped), "interval done: 45:00 (countdown)");

        let rolling = Event::IntervalCompleted {
            mode: TimerMode::Pomodoro,
            duration_secs: 1500,
            display_secs: 300,
            run_state: RunState::Running,
            at: Utc::now(),
        };
        assert_eq!(
            describe_event(&rolling),
            "interval done: 25:00 (pomodoro), break running"
        );
    }

    #[test]
    fn describes_snapshot_per_mode() {
        let snapshot = Event::StateSnapshot {
            mode: TimerMode::Countdown,
            run_state: RunState::Idle,
            phase: PomodoroPhase::Work,
            display_secs: 2700,
            countdown_initial_secs: 2700,
            at: Utc::now(),
        };
        assert_eq!(
            describe_event(&snapshot),
            "countdown idle 45:00 (initial 45:00)"
        );

        let pomodoro = Event::StateSnapshot {
            mode: TimerMode::Pomodoro,
            run_state: RunState::Running,
            phase: PomodoroPhase::Break,
            display_secs: 299,
            countdown_initial_secs: 2700,
            at: Utc::now(),
        };
        assert_eq!(describe_event(&pomodoro), "pomodoro running 04:59 [break]");
    }

    #[test]
    fn describes_save_notices() {
        let saved = Notice::SessionSaved {
            duration_secs: 1500,
            category: Some("math".into()),
            at: Utc::now(),
        };
        assert!(describe_notice(&saved).contains("25:00 (math)"));

        let discarded = Notice::IdentityMissing {
            duration_secs: 42,
            at: Utc::now(),
        };
        assert_eq!(
            describe_notice(&discarded),
            "session discarded (00:42): no profile set"
        );
    }
}
