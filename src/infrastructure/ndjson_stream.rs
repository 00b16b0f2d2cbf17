// Newline-delimited JSON streaming of snapshots
use crate::application::broadcaster::Subscription;
use crate::domain::snapshot::Snapshot;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use std::sync::Arc;

/// Create a chunked NDJSON response, one snapshot per line.
pub fn ndjson_stream<S>(stream: S) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = Arc<Snapshot>> + Send + 'static,
{
    let byte_stream = stream.map(|snapshot| encode_line(&snapshot));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serialize a single snapshot to one line
fn encode_line(snapshot: &Snapshot) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(snapshot).map_err(std::io::Error::other)?;
    let mut line = BytesMut::with_capacity(json.len() + 1);
    line.put_slice(&json);
    line.put_u8(b'\n');
    Ok(line.freeze())
}

/// Streams every snapshot delivered to the subscription until the client
/// goes away; dropping the stream drops the subscription.
pub fn stream_from_subscription(subscription: Subscription) -> impl IntoResponse {
    let observer = subscription.id();
    let snapshots = subscription.into_stream();
    let stream = async_stream::stream! {
        futures::pin_mut!(snapshots);
        while let Some(snapshot) = snapshots.next().await {
            yield snapshot;
        }
        tracing::debug!(observer, "Snapshot stream finished");
    };

    match ndjson_stream(stream) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
