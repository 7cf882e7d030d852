pub mod chrome;
pub mod classifier;
pub mod driver;
pub mod error;
pub mod evidence;
pub mod input;
pub mod normalize;
pub mod report;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod verifier;

#[cfg(test)]
mod scripted;

pub use chrome::ChromeLauncher;
pub use classifier::{Classifier, ClassifierSettings, PollPolicy};
pub use driver::{ContextLauncher, LaunchMode, NavigationContext, NavigationHandle};
pub use error::{DriverError, EngineError};
pub use input::parse_store_csv;
pub use normalize::{normalize_domain, normalize_host};
pub use report::{read_report, write_report, ReportKind};
pub use scheduler::BatchScheduler;
pub use session::{SessionSnapshot, SessionStore};
pub use storage::{OriginStorage, StorageItem};
pub use verifier::{EngineSettings, RunEvent, RunOutcome, Verifier};
