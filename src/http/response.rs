//! Rendering relayed responses through Axum.

use axum::body::Body;
use axum::response::{IntoResponse, Response};

use crate::relay::RelayedResponse;

impl IntoResponse for RelayedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_status_headers_and_bytes_carried_over() {
        let mut relayed = RelayedResponse::empty(StatusCode::IM_A_TEAPOT);
        relayed.headers.insert("content-type", "application/octet-stream".parse().unwrap());
        relayed.body = Bytes::from_static(&[0xFF, 0x00, 0x7A]);

        let response = relayed.into_response();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers()["content-type"], "application/octet-stream");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), &[0xFFu8, 0x00, 0x7A][..]);
    }
}
