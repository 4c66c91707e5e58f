use crate::connection::auth::LOGIN_HINT;
use crate::core::PurgeError;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::{Level, event};

/// Something worth telling the operator while a purge runs
#[derive(Debug)]
pub enum PurgeEvent<'a> {
    Starting { project: &'a str },
    Connected { project: &'a str },
    CollectionStarted { collection: &'a str },
    BatchCommitted {
        collection: &'a str,
        size: usize,
        final_batch: bool,
    },
    CollectionFinished { collection: &'a str, deleted: usize },
    Completed { total: usize },
    Failed { error: &'a PurgeError },
    Concluded { success: bool },
}

/// Receives progress events from the runner and the top-level handler
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &PurgeEvent<'_>);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentListener;

impl ProgressListener for SilentListener {
    fn on_event(&self, _event: &PurgeEvent<'_>) {}
}

/// Renders events as human-readable lines
pub struct ConsoleReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn render(event: &PurgeEvent<'_>) -> Vec<String> {
        match event {
            PurgeEvent::Starting { project } => vec![
                format!("🧹 Clearing Firestore database for project {}...", project),
                "⚠️  This will delete ALL data from the database!".to_string(),
                "🔄 Auto-proceeding to clear database...".to_string(),
            ],
            PurgeEvent::Connected { project } => vec![
                format!("✅ Initialized Firebase with project credentials for {}", project),
                "✅ Connected to Firestore".to_string(),
            ],
            PurgeEvent::CollectionStarted { collection } => {
                vec![format!("\n🗑️  Processing collection: {}", collection)]
            }
            PurgeEvent::BatchCommitted {
                size, final_batch, ..
            } => {
                let which = if *final_batch { "final batch" } else { "batch" };
                vec![format!("   Deleted {} of {} documents", which, size)]
            }
            PurgeEvent::CollectionFinished {
                collection,
                deleted,
            } => vec![format!("✅ Deleted {} documents from {}", deleted, collection)],
            PurgeEvent::Completed { total } => vec![
                "\n🎉 Successfully cleared Firestore database!".to_string(),
                format!("📊 Total documents deleted: {}", total),
            ],
            PurgeEvent::Failed { error } if error.is_authentication() => {
                let message = error.to_string();
                let mut lines = vec![format!("❌ Failed to initialize Firebase: {}", message)];
                if !message.contains(LOGIN_HINT) {
                    lines.push(LOGIN_HINT.to_string());
                }
                lines
            }
            PurgeEvent::Failed { error } => vec![format!("❌ Error clearing Firestore: {}", error)],
            PurgeEvent::Concluded { success: true } => {
                vec!["✅ Database cleared successfully!".to_string()]
            }
            PurgeEvent::Concluded { success: false } => {
                vec!["❌ Failed to clear database".to_string()]
            }
        }
    }
}

impl<W: Write + Send> ProgressListener for ConsoleReporter<W> {
    fn on_event(&self, event: &PurgeEvent<'_>) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let written = Self::render(event)
            .into_iter()
            .try_for_each(|line| writeln!(out, "{}", line))
            .and_then(|()| out.flush());
        if let Err(err) = written {
            event!(Level::WARN, error = %err, "progress output failed");
        }
    }
}
