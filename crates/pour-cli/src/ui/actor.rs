//! UI Actor - Single-threaded event processing
//!
//! Commands and the core pipeline report from wherever they run; every line
//! reaches the terminal through one thread so progress updates and status
//! lines never interleave.

use std::io::{self, IsTerminal, Write};
use std::sync::mpsc;
use std::thread;

use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use pour_schema::{PackageName, Version};

use super::theme::{Theme, format_size};

/// Events that can be sent to the UI actor
#[derive(Debug)]
pub enum UiEvent {
    /// Print a section header
    Section(String),
    /// Download progress
    Downloading {
        name: PackageName,
        version: Version,
        current: u64,
        total: Option<u64>,
    },
    /// Archive matched its declared digest
    Verified {
        name: PackageName,
        version: Version,
        sha256: String,
    },
    /// Package entered a new phase ("extracting", "installing", ...)
    Phase {
        name: PackageName,
        version: Version,
        phase: String,
    },
    /// Mark package as successfully done
    Done {
        name: PackageName,
        version: Version,
        detail: String,
        size: Option<u64>,
    },
    /// Mark package as failed
    Failed {
        name: PackageName,
        version: Version,
        reason: String,
    },
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
    /// Print summary with timing
    Summary {
        count: usize,
        action: String,
        elapsed_secs: f64,
    },
    /// Reply once every earlier event has been rendered
    Sync(mpsc::Sender<()>),
    Shutdown,
}

/// Handle to the UI actor thread
#[derive(Debug)]
pub struct UiActor {
    sender: mpsc::Sender<UiEvent>,
    _handle: thread::JoinHandle<()>,
}

impl UiActor {
    /// Spawn a new UI actor thread
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel();
        let interactive = io::stdout().is_terminal();

        let handle = thread::spawn(move || {
            let mut renderer = Renderer::new(io::stdout(), io::stderr(), interactive);
            while let Ok(event) = receiver.recv() {
                if !renderer.handle(event) {
                    break;
                }
            }
        });

        Self {
            sender,
            _handle: handle,
        }
    }

    /// Get a cloneable sender for this actor
    pub fn sender(&self) -> mpsc::Sender<UiEvent> {
        self.sender.clone()
    }
}

impl Drop for UiActor {
    fn drop(&mut self) {
        let _ = self.sender.send(UiEvent::Shutdown);
    }
}

/// Turns events into terminal output.
///
/// On a terminal, download progress is redrawn in place on a single line;
/// otherwise progress events are dropped and only final states are printed.
pub(crate) struct Renderer<O: Write, E: Write> {
    out: O,
    err: E,
    interactive: bool,
    theme: Theme,
    /// A progress line is on screen without its trailing newline.
    live: bool,
}

impl<O: Write, E: Write> Renderer<O, E> {
    pub(crate) fn new(out: O, err: E, interactive: bool) -> Self {
        Self {
            out,
            err,
            interactive,
            theme: Theme::default(),
            live: false,
        }
    }

    /// Render one event. Returns false when the actor should stop.
    pub(crate) fn handle(&mut self, event: UiEvent) -> bool {
        let result = match event {
            UiEvent::Shutdown => return false,
            UiEvent::Sync(tx) => {
                let _ = self.out.flush();
                let _ = tx.send(());
                return true;
            }
            event => self.render(event),
        };
        // A closed stdout (e.g. `pour list | head`) is not worth crashing over.
        let _ = result.and_then(|()| self.out.flush());
        true
    }

    fn render(&mut self, event: UiEvent) -> io::Result<()> {
        match event {
            UiEvent::Downloading {
                name,
                version,
                current,
                total,
            } => {
                if !self.interactive {
                    return Ok(());
                }
                let progress = match total {
                    Some(total) if total > 0 => {
                        format!("{} / {}", format_size(current), format_size(total))
                    }
                    _ => format_size(current),
                };
                let line = self.row(self.theme.icons.active, &name, &version);
                self.out.queue(MoveToColumn(0))?;
                write!(self.out, "{line} {}", progress.with(self.theme.secondary))?;
                self.out.queue(Clear(ClearType::UntilNewLine))?;
                self.live = true;
                Ok(())
            }
            UiEvent::Verified {
                name,
                version,
                sha256,
            } => {
                let short = sha256.get(..12).unwrap_or(&sha256).to_string();
                let line = self.row(self.theme.icons.active, &name, &version);
                self.line(&format!(
                    "{line} {}",
                    format!("sha256 {short}… ok").with(self.theme.secondary)
                ))
            }
            UiEvent::Phase {
                name,
                version,
                phase,
            } => {
                if !self.interactive {
                    return Ok(());
                }
                let line = self.row(self.theme.icons.active, &name, &version);
                self.out.queue(MoveToColumn(0))?;
                write!(self.out, "{line} {}", phase.with(self.theme.secondary))?;
                self.out.queue(Clear(ClearType::UntilNewLine))?;
                self.live = true;
                Ok(())
            }
            UiEvent::Done {
                name,
                version,
                detail,
                size,
            } => {
                let icon = self.theme.icons.success.green().to_string();
                let line = self.row(&icon, &name, &version);
                let size = size.map(|s| format!(" ({})", format_size(s))).unwrap_or_default();
                self.line(&format!("{line} {detail}{size}"))
            }
            UiEvent::Failed {
                name,
                version,
                reason,
            } => {
                let icon = self.theme.icons.error.red().to_string();
                let line = self.row(&icon, &name, &version);
                self.line(&format!("{line} {}", reason.red()))
            }
            UiEvent::Section(title) => {
                self.line("")?;
                self.line(&title.bold().to_string())
            }
            UiEvent::Info(msg) => self.line(&format!("  {} {msg}", self.theme.icons.info)),
            UiEvent::Success(msg) => {
                self.line(&format!("  {} {msg}", self.theme.icons.success.green()))
            }
            UiEvent::Warning(msg) => {
                self.end_live()?;
                writeln!(self.err, "  {} {}", self.theme.icons.warning.yellow(), msg.yellow())
            }
            UiEvent::Error(msg) => {
                self.end_live()?;
                writeln!(self.err, "  {} {}", self.theme.icons.error.red(), msg.red())
            }
            UiEvent::Summary {
                count,
                action,
                elapsed_secs,
            } => {
                let msg = format!(
                    "{} package{} {} in {:.1}s",
                    count,
                    if count == 1 { "" } else { "s" },
                    action,
                    elapsed_secs
                );
                self.line(&format!("  {} {msg}", self.theme.icons.success.green()))
            }
            UiEvent::Sync(_) | UiEvent::Shutdown => Ok(()),
        }
    }

    fn row(&self, icon: &str, name: &PackageName, version: &Version) -> String {
        format!(
            "  {icon} {:<width$} {}",
            name.as_str(),
            version.as_str().with(self.theme.secondary),
            width = self.theme.name_width
        )
    }

    fn end_live(&mut self) -> io::Result<()> {
        if self.live {
            self.out.queue(MoveToColumn(0))?;
            self.out.queue(Clear(ClearType::UntilNewLine))?;
            self.out.flush()?;
            self.live = false;
        }
        Ok(())
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        self.end_live()?;
        writeln!(self.out, "{text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(events: Vec<UiEvent>, interactive: bool) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        {
            let mut renderer = Renderer::new(&mut out, &mut err, interactive);
            for event in events {
                renderer.handle(event);
            }
        }
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn pkg() -> (PackageName, Version) {
        (PackageName::new("git-absorb"), Version::from("0.2.0"))
    }

    #[test]
    fn test_progress_is_dropped_when_not_interactive() {
        let (name, version) = pkg();
        let (out, _) = render(
            vec![
                UiEvent::Downloading {
                    name: name.clone(),
                    version: version.clone(),
                    current: 10,
                    total: Some(100),
                },
                UiEvent::Done {
                    name,
                    version,
                    detail: "installed".into(),
                    size: Some(2048),
                },
            ],
            false,
        );
        assert!(!out.contains("10 B"));
        assert!(out.contains("git-absorb"));
        assert!(out.contains("installed (2.0 KB)"));
    }

    #[test]
    fn test_errors_go_to_stderr() {
        let (out, err) = render(
            vec![
                UiEvent::Info("hello".into()),
                UiEvent::Error("boom".into()),
            ],
            false,
        );
        assert!(out.contains("hello"));
        assert!(!out.contains("boom"));
        assert!(err.contains("boom"));
    }

    #[test]
    fn test_actor_sync_and_shutdown() {
        let actor = UiActor::spawn();
        let sender = actor.sender();
        let (tx, rx) = mpsc::channel();
        sender.send(UiEvent::Sync(tx)).unwrap();
        rx.recv().unwrap();
        drop(actor);
    }
}
