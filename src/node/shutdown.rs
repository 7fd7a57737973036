use std::path::PathBuf;

use tokio::process::Command;

// ---

/// Hardware shutdown hook. Fire-and-forget: the caller never learns whether
/// it worked.
pub trait ShutdownAction: Send {
    fn trigger(&self);
}

/// Runs an external script with no arguments.
#[derive(Debug, Clone)]
pub struct ScriptShutdown {
    script: PathBuf,
}

impl ScriptShutdown {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl ShutdownAction for ScriptShutdown {
    fn trigger(&self) {
        // ---
        tracing::error!("Invoking shutdown script {}", self.script.display());

        match Command::new(&self.script).spawn() {
            Ok(mut child) => {
                let script = self.script.clone();
                tokio::spawn(async move {
                    if let Ok(status) = child.wait().await {
                        tracing::info!("Shutdown script {} exited with {}", script.display(), status);
                    }
                });
            }
            Err(e) => tracing::error!(
                "Shutdown script {} could not be started: {}",
                self.script.display(),
                e
            ),
        }
    }
}
