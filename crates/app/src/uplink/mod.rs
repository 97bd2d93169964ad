pub mod mqtt;
pub mod task;

pub use mqtt::MqttUplink;
pub use task::{frame_batches, BatchPublisher, UplinkTask, BATCH_CAPACITY};
