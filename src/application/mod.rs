// Application layer - Use cases over the in-memory store
pub mod broadcaster;
pub mod telemetry_service;
pub mod telemetry_source;
pub mod telemetry_store;
