pub mod frame;
pub mod record;
pub mod source;
pub mod task;

pub use record::Record;
pub use source::{FrameSource, ReplaySource, SourceEvent};
pub use task::CaptureTask;
