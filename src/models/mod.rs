pub mod location;
pub mod message;
pub mod speed;

pub use location::LocationRecord;
pub use message::TelemetryMessage;
pub use speed::SpeedSample;
