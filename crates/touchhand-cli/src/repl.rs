//! REPL – Read-Eval-Print Loop for the touchhand interactive shell.
//!
//! Supported slash-commands:
//!   /help                    – show this list
//!   /status                  – runtime availability, policy, session, refcount
//!   /acquire                 – take one more session handle
//!   /release                 – drop the most recently acquired handle
//!   /correct <hand> <json>   – correct one raw pose record
//!   /feed <hand> <json|off>  – set or clear a simulated controller
//!   /offsets                 – print both hands' correction constants
//!   /poll                    – poll both simulated controllers
//!   /quit | /exit            – release everything and exit

use colored::Colorize;
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use touchhand_hal::{HandTracker, SessionHandle, SessionManager, SimControllerFeed, SimRuntime};
use touchhand_perception::{RawPoseState, correct_pose, hand_offset};
use touchhand_types::{Handedness, TouchError};

/// A parsed REPL command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Status,
    Acquire,
    Release,
    Correct(Handedness, RawPoseState),
    Feed(Handedness, Option<RawPoseState>),
    Offsets,
    Poll,
    Quit,
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<Command, TouchError> {
    let line = line.trim();
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match head {
        "/help" => Ok(Command::Help),
        "/status" => Ok(Command::Status),
        "/acquire" => Ok(Command::Acquire),
        "/release" => Ok(Command::Release),
        "/offsets" => Ok(Command::Offsets),
        "/poll" => Ok(Command::Poll),
        "/quit" | "/exit" => Ok(Command::Quit),
        "/correct" => {
            let (hand, json) = split_hand(rest)?;
            Ok(Command::Correct(hand, parse_pose(json)?))
        }
        "/feed" => {
            let (hand, arg) = split_hand(rest)?;
            if arg.eq_ignore_ascii_case("off") {
                Ok(Command::Feed(hand, None))
            } else {
                Ok(Command::Feed(hand, Some(parse_pose(arg)?)))
            }
        }
        other => Err(TouchError::InvalidInput(format!("unknown command '{other}'"))),
    }
}

fn split_hand(args: &str) -> Result<(Handedness, &str), TouchError> {
    let (hand, rest) = args.split_once(char::is_whitespace).ok_or_else(|| {
        TouchError::InvalidInput("expected <left|right> followed by an argument".to_string())
    })?;
    Ok((hand.parse()?, rest.trim()))
}

fn parse_pose(json: &str) -> Result<RawPoseState, TouchError> {
    serde_json::from_str(json)
        .map_err(|e| TouchError::InvalidInput(format!("bad pose record: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Shell state
// ─────────────────────────────────────────────────────────────────────────────

/// What the loop should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Quit,
}

/// Session handles and simulated controllers owned by the interactive shell.
pub struct Shell {
    manager: Arc<SessionManager<SimRuntime>>,
    feed: SimControllerFeed,
    handles: Vec<SessionHandle<SimRuntime>>,
    pretty_json: bool,
}

impl Shell {
    pub fn new(
        manager: Arc<SessionManager<SimRuntime>>,
        feed: SimControllerFeed,
        pretty_json: bool,
    ) -> Self {
        Self {
            manager,
            feed,
            handles: Vec::new(),
            pretty_json,
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<Reply, TouchError> {
        match command {
            Command::Help => Ok(Reply::Text(help_text())),
            Command::Status => Ok(Reply::Text(self.status())),
            Command::Acquire => {
                let handle = self.manager.acquire()?;
                let text = format!(
                    "acquired {} (refcount {})",
                    handle.id(),
                    self.manager.ref_count()
                );
                self.handles.push(handle);
                Ok(Reply::Text(text))
            }
            Command::Release => {
                let handle = self.handles.pop().ok_or_else(|| {
                    TouchError::InvalidInput("no session handle held".to_string())
                })?;
                let id = handle.id();
                handle.release();
                Ok(Reply::Text(format!(
                    "released {} (refcount {})",
                    id,
                    self.manager.ref_count()
                )))
            }
            Command::Correct(hand, raw) => self.to_json(&correct_pose(hand, &raw)).map(Reply::Text),
            Command::Feed(hand, Some(raw)) => {
                self.feed.set(hand, raw);
                Ok(Reply::Text(format!("{hand} controller updated")))
            }
            Command::Feed(hand, None) => {
                self.feed.clear(hand);
                Ok(Reply::Text(format!("{hand} controller untracked")))
            }
            Command::Offsets => {
                #[derive(Serialize)]
                struct Offsets {
                    left: touchhand_perception::Transform3D,
                    right: touchhand_perception::Transform3D,
                }
                self.to_json(&Offsets {
                    left: hand_offset(Handedness::Left),
                    right: hand_offset(Handedness::Right),
                })
                .map(Reply::Text)
            }
            Command::Poll => {
                let handle = self.handles.last().ok_or_else(|| {
                    TouchError::InvalidInput("no session held; run /acquire first".to_string())
                })?;
                let hands = HandTracker::new(handle.clone()).poll();
                self.to_json(&serde_json::json!({ "left": hands.left, "right": hands.right }))
                    .map(Reply::Text)
            }
            Command::Quit => {
                self.close();
                Ok(Reply::Quit)
            }
        }
    }

    /// Drop every held handle and tear the runtime down.
    pub fn close(&mut self) {
        self.handles.clear();
        if let Err(e) = self.manager.shutdown() {
            warn!(error = %e, "VR runtime left running at exit");
        }
    }

    fn status(&self) -> String {
        format!(
            "runtime available : {}\nteardown policy   : {}\nsession active    : {}\nreference count   : {}",
            self.manager.is_available(),
            self.manager.policy(),
            self.manager.has_session(),
            self.manager.ref_count()
        )
    }

    fn to_json<T: Serialize>(&self, value: &T) -> Result<String, TouchError> {
        let out = if self.pretty_json {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        out.map_err(|e| TouchError::InvalidInput(format!("failed to encode output: {e}")))
    }
}

fn help_text() -> String {
    [
        "touchhand commands",
        "  /status                  – runtime availability and session refcount",
        "  /acquire                 – take one more session handle",
        "  /release                 – drop the most recent session handle",
        "  /correct <hand> <json>   – correct a raw pose record",
        "  /feed <hand> <json|off>  – set or clear a simulated controller",
        "  /offsets                 – show per-hand correction constants",
        "  /poll                    – poll both controllers through the session",
        "  /quit  /exit             – release everything and exit",
    ]
    .join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(mut shell: Shell, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "touchhand>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line).and_then(|cmd| shell.execute(cmd)) {
            Ok(Reply::Text(text)) => println!("{text}"),
            Ok(Reply::Quit) => {
                println!("{}", "Goodbye.".green());
                return;
            }
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
    }

    shell.close();
}
