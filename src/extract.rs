use axum::{
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::ApiError;

/// Json
///
/// Drop-in replacement for `axum::Json` on request bodies. Axum's default
/// rejection answers 422 with a plain-text body; this API treats every
/// undeserializable payload (malformed JSON, unknown field, wrong type) as a
/// 400 validation failure in the usual `{"error": ...}` shape, so the
/// extractor remaps the rejection into `ApiError`.
#[derive(Debug)]
pub struct Json<T>(pub T);

impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Json(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}

// Response side delegates straight to axum, so handlers can keep a single
// Json type for both directions.
impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}
