// Domain layer - Pure types and rules, no I/O
pub mod channel_buffer;
pub mod classification;
pub mod snapshot;
pub mod telemetry;
pub mod thresholds;
