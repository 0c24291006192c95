pub mod logger;

pub use logger::{ReplySource, RunLog, RunLogger};
