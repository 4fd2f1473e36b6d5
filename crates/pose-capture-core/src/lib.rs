pub mod config;
pub mod dataset;
pub mod detector;
pub mod engine;
pub mod error;
pub mod frame;
pub mod indexer;
pub mod landmarks;
pub mod overlay;
pub mod progress;
pub mod session;
pub mod writer;

pub use config::AppConfig;
pub use engine::{CaptureEngine, InputSource, SessionEnd, SessionSummary};
pub use error::Error;
pub use progress::{CaptureReporter, SilentReporter};
pub use session::{Action, CaptureController, SessionState};
