//! Unified UI output interface.
//!
//! Commands talk to the terminal only through [`Output`], which forwards
//! events to the UI actor.

use std::sync::{OnceLock, mpsc};

use pour_core::Reporter;
use pour_schema::{PackageName, Version};

use super::actor::{UiActor, UiEvent};

/// Singleton instance of the UI actor channel.
static UI_ACTOR: OnceLock<mpsc::Sender<UiEvent>> = OnceLock::new();

fn get_actor_sender() -> mpsc::Sender<UiEvent> {
    UI_ACTOR
        .get_or_init(|| {
            let actor = UiActor::spawn();
            let sender = actor.sender();

            // Keep actor alive for program duration
            std::mem::forget(actor);

            sender
        })
        .clone()
}

/// A cloneable handle for sending high-level UI events to the terminal actor.
#[derive(Debug, Clone)]
pub struct Output {
    sender: mpsc::Sender<UiEvent>,
}

impl Output {
    /// Create a new output handle.
    pub fn new() -> Self {
        Self {
            sender: get_actor_sender(),
        }
    }

    fn send(&self, event: UiEvent) {
        let _ = self.sender.send(event);
    }

    fn phase(&self, name: &PackageName, version: &Version, phase: &str) {
        self.send(UiEvent::Phase {
            name: name.clone(),
            version: version.clone(),
            phase: phase.to_string(),
        });
    }

    /// Block until all pending UI events are rendered.
    pub fn wait(&self) {
        let (tx, rx) = mpsc::channel();
        self.send(UiEvent::Sync(tx));
        let _ = rx.recv();
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for Output {
    fn section(&self, title: &str) {
        self.send(UiEvent::Section(title.to_string()));
    }

    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>) {
        self.send(UiEvent::Downloading {
            name: name.clone(),
            version: version.clone(),
            current,
            total,
        });
    }

    fn verified(&self, name: &PackageName, version: &Version, sha256: &str) {
        self.send(UiEvent::Verified {
            name: name.clone(),
            version: version.clone(),
            sha256: sha256.to_string(),
        });
    }

    fn extracting(&self, name: &PackageName, version: &Version) {
        self.phase(name, version, "extracting");
    }

    fn installing(&self, name: &PackageName, version: &Version, current: usize, total: usize) {
        self.phase(name, version, &format!("installing {current}/{total}"));
    }

    fn removing(&self, name: &PackageName, version: &Version) {
        self.phase(name, version, "removing");
    }

    fn done(&self, name: &PackageName, version: &Version, detail: &str, size: Option<u64>) {
        self.send(UiEvent::Done {
            name: name.clone(),
            version: version.clone(),
            detail: detail.to_string(),
            size,
        });
    }

    fn failed(&self, name: &PackageName, version: &Version, reason: &str) {
        self.send(UiEvent::Failed {
            name: name.clone(),
            version: version.clone(),
            reason: reason.to_string(),
        });
    }

    fn info(&self, msg: &str) {
        self.send(UiEvent::Info(msg.to_string()));
    }

    fn success(&self, msg: &str) {
        self.send(UiEvent::Success(msg.to_string()));
    }

    fn warning(&self, msg: &str) {
        self.send(UiEvent::Warning(msg.to_string()));
    }

    fn error(&self, msg: &str) {
        self.send(UiEvent::Error(msg.to_string()));
    }

    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        self.send(UiEvent::Summary {
            count,
            action: action.to_string(),
            elapsed_secs,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_clone_and_wait() {
        let output = Output::new();
        let output2 = output.clone();

        output.info("from original");
        output2.info("from clone");
        output.wait();
    }
}
