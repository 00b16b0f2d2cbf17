// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod http_response;
pub mod mqtt_ingestion;
pub mod ndjson_stream;
pub mod sensor_payload;
