pub mod progress;
pub mod purge;

pub use progress::{ConsoleReporter, ProgressListener, PurgeEvent, SilentListener};
pub use purge::{PurgeRunner, PurgeState};
