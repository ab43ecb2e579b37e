//! Line-based control surface
//!
//! Reads commands from stdin and forwards them to the capture loop over
//! its command channel.

use crate::capture::CaptureTarget;
use crate::scheduler::ControlCommand;
use crate::status::StatusBoard;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Shown when the host reports no monitors
pub const NO_TARGETS: &str = "no monitors found";

const HELP: &str = "commands: start [N] | stop | toggle | select N | targets | status | quit";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Start(Option<usize>),
    Stop,
    Toggle,
    Select(usize),
    Targets,
    Status,
    Help,
    Quit,
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?.to_ascii_lowercase();
        let index = words.next().map(|w| w.parse::<usize>());

        let input = match (verb.as_str(), index) {
            ("start", None) => Input::Start(None),
            ("start", Some(Ok(n))) => Input::Start(Some(n)),
            ("stop", None) => Input::Stop,
            ("toggle", None) => Input::Toggle,
            ("select", Some(Ok(n))) => Input::Select(n),
            ("targets" | "list", None) => Input::Targets,
            ("status", None) => Input::Status,
            ("help" | "?", None) => Input::Help,
            ("quit" | "exit" | "q", None) => Input::Quit,
            _ => Input::Unknown(line.trim().to_string()),
        };
        Some(input)
    }
}

/// Render the target list, one monitor per line
pub fn format_targets(targets: &[CaptureTarget]) -> Vec<String> {
    if targets.is_empty() {
        return vec![NO_TARGETS.to_string()];
    }
    targets.iter().map(|t| t.to_string()).collect()
}

pub struct ControlSurface {
    selected: usize,
    targets: Vec<CaptureTarget>,
    status: Arc<StatusBoard>,
    commands: UnboundedSender<ControlCommand>,
}

impl ControlSurface {
    pub fn new(
        selected: usize,
        targets: Vec<CaptureTarget>,
        status: Arc<StatusBoard>,
        commands: UnboundedSender<ControlCommand>,
    ) -> Self {
        Self {
            selected,
            targets,
            status,
            commands,
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Handle one line; returns text to show and whether to keep reading.
    pub fn handle_line(&mut self, line: &str) -> (Vec<String>, bool) {
        let Some(input) = Input::parse(line) else {
            return (Vec::new(), true);
        };

        match input {
            Input::Start(index) => {
                if let Some(index) = index {
                    self.selected = index;
                }
                self.send(ControlCommand::Start(self.selected))
            }
            Input::Stop => self.send(ControlCommand::Stop),
            Input::Toggle => self.send(ControlCommand::Toggle(self.selected)),
            Input::Select(index) => {
                if self.targets.iter().any(|t| t.index == index) {
                    self.selected = index;
                    (vec![format!("selected monitor {}", index)], true)
                } else {
                    (vec![format!("no monitor {}", index)], true)
                }
            }
            Input::Targets => (format_targets(&self.targets), true),
            Input::Status => (vec![self.status.current()], true),
            Input::Help => (vec![HELP.to_string()], true),
            Input::Quit => {
                let (out, _) = self.send(ControlCommand::Shutdown);
                (out, false)
            }
            Input::Unknown(text) => (vec![format!("unknown command: {} ({})", text, HELP)], true),
        }
    }

    fn send(&self, command: ControlCommand) -> (Vec<String>, bool) {
        match self.commands.send(command) {
            Ok(()) => (Vec::new(), true),
            Err(_) => {
                warn!("Capture loop is gone; dropping {:?}", command);
                (Vec::new(), false)
            }
        }
    }

    /// Read stdin on a dedicated thread until `quit`, end of input, or the
    /// capture loop exits
    pub fn spawn_stdin(mut self) -> std::io::Result<std::thread::JoinHandle<()>> {
        std::thread::Builder::new()
            .name("snapwatch-stdin".to_string())
            .spawn(move || {
                for line in std::io::stdin().lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("Failed to read stdin: {}", e);
                            return;
                        }
                    };

                    let (output, keep_going) = self.handle_line(&line);
                    for text in output {
                        println!("{}", text);
                    }
                    if !keep_going {
                        return;
                    }
                }
                debug!("stdin closed, control surface finished");
            })
    }
}
