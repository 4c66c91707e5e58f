use crate::connection::StoreConfig;
use crate::core::Result;
use crate::executor::{ProgressListener, PurgeEvent, PurgeRunner};
use crate::result::PurgeSummary;
use crate::store::{DocumentStore, FirestoreClient};
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, event};

/// Final status of a run, as reported to the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success { total: usize },
    Failure,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Process exit status: 0 on success, 1 on any failure
    pub fn code(&self) -> u8 {
        match self {
            Outcome::Success { .. } => 0,
            Outcome::Failure => 1,
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.code())
    }
}

/// Authenticate against Firestore with default credentials and clear every
/// top-level collection of the configured database.
///
/// # Examples
///
/// ```no_run
/// use firestore_clear::{ConsoleReporter, ProgressListener, StoreConfig};
/// use firestore_clear::facade::{clear_database, conclude};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let reporter: Arc<dyn ProgressListener> = Arc::new(ConsoleReporter::stdout());
/// let config = StoreConfig::from_env().project_id("my-project");
///
/// let result = clear_database(config, Arc::clone(&reporter)).await;
/// let outcome = conclude(result, reporter.as_ref());
/// println!("exit code {}", outcome.code());
/// # }
/// ```
pub async fn clear_database(
    config: StoreConfig,
    listener: Arc<dyn ProgressListener>,
) -> Result<PurgeSummary> {
    let project = config.project_id.clone();
    listener.on_event(&PurgeEvent::Starting { project: &project });

    clear_with(&project, || FirestoreClient::connect(config), listener).await
}

/// Clear the store produced by `connect`.
///
/// `connect` is the authentication step: when it fails the runner is never
/// built, so nothing is listed or deleted.
pub async fn clear_with<C, F, S>(
    project: &str,
    connect: C,
    listener: Arc<dyn ProgressListener>,
) -> Result<PurgeSummary>
where
    C: FnOnce() -> F,
    F: Future<Output = Result<S>>,
    S: DocumentStore,
{
    event!(Level::DEBUG, project = %project, "authenticating");
    let store = connect().await?;
    listener.on_event(&PurgeEvent::Connected { project });

    PurgeRunner::new(store, listener).run().await
}

/// Top-level handler: report the result of a run and turn it into an
/// [`Outcome`]. Every error kind ends the same way: logged, printed, failure.
pub fn conclude(result: Result<PurgeSummary>, listener: &dyn ProgressListener) -> Outcome {
    let outcome = match result {
        Ok(summary) => Outcome::Success {
            total: summary.total_deleted(),
        },
        Err(err) => {
            event!(Level::ERROR, kind = err.kind(), error = %err, "clearing firestore failed");
            listener.on_event(&PurgeEvent::Failed { error: &err });
            Outcome::Failure
        }
    };

    listener.on_event(&PurgeEvent::Concluded {
        success: outcome.is_success(),
    });
    outcome
}
