pub mod pool;
pub mod progress;

pub use pool::run_bounded;
pub use progress::{
    ChannelProgress, LogProgress, NoopProgress, ProgressEvent, ProgressReporter, RunProgress,
};
