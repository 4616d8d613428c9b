//! Inbound body extraction.
//!
//! A hosting runtime hands the relay either a payload it already buffered
//! (and possibly parsed), a raw byte stream, or both. A non-empty payload is
//! authoritative. An empty one means "not read yet" and the stream is drained.

use std::fmt;
use std::pin::Pin;

use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, Method};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt, TryStreamExt};
use thiserror::Error;

/// Boxed error produced by a raw body stream.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to produce the outbound body.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error(transparent)]
    Stream(BoxError),
}

/// A body the hosting runtime has already buffered.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// Nothing was pre-read.
    #[default]
    Absent,
    Text(String),
    Bytes(Bytes),
    /// A value the runtime parsed (e.g. a JSON request body).
    Structured(serde_json::Value),
}

impl Payload {
    /// Whether the payload carries nothing worth forwarding.
    ///
    /// `null`, `{}`, `[]`, `""` and a zero-length byte sequence all count as
    /// empty, so the raw stream is consulted instead. Other scalars (`0`,
    /// `false`) are real payloads.
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Absent => true,
            Payload::Text(text) => text.is_empty(),
            Payload::Bytes(bytes) => bytes.is_empty(),
            Payload::Structured(serde_json::Value::Null) => true,
            Payload::Structured(serde_json::Value::String(text)) => text.is_empty(),
            Payload::Structured(serde_json::Value::Object(map)) => map.is_empty(),
            Payload::Structured(serde_json::Value::Array(items)) => items.is_empty(),
            Payload::Structured(_) => false,
        }
    }

    /// Bytes to send upstream. Text is UTF-8, bytes are verbatim and
    /// structured values are compact JSON.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Payload::Absent => Bytes::new(),
            Payload::Text(text) => Bytes::from(text),
            Payload::Bytes(bytes) => bytes,
            Payload::Structured(value) => Bytes::from(value.to_string()),
        }
    }
}

/// The unread inbound byte stream.
pub struct RawBody(Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>);

impl RawBody {
    pub fn new<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Self(Box::pin(stream.map_err(Into::<BoxError>::into)))
    }

    /// Read every chunk, in order, into one contiguous buffer of at most
    /// `limit` bytes. Reading stops at the first chunk that overruns it.
    pub async fn drain(mut self, limit: usize) -> Result<Bytes, ReadError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.0.next().await {
            let chunk = chunk.map_err(ReadError::Stream)?;
            if buf.len() + chunk.len() > limit {
                return Err(ReadError::TooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for RawBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawBody")
    }
}

/// Whether `method` ever carries a body upstream.
pub fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

/// `Content-Length` the caller declared, if it is a valid number.
pub fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Produce the outbound body for `method`, no larger than `limit` bytes.
///
/// `GET` and `HEAD` never send one. Otherwise a non-empty payload wins, then
/// the drained stream, then an empty body.
pub async fn extract(
    method: &Method,
    payload: Payload,
    stream: Option<RawBody>,
    limit: usize,
) -> Result<Option<Bytes>, ReadError> {
    if !carries_body(method) {
        return Ok(None);
    }

    if !payload.is_empty() {
        let bytes = payload.into_bytes();
        if bytes.len() > limit {
            return Err(ReadError::TooLarge { limit });
        }
        return Ok(Some(bytes));
    }

    match stream {
        Some(raw) => raw.drain(limit).await.map(Some),
        None => Ok(Some(Bytes::new())),
    }
}
