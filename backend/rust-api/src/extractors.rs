use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};

use crate::handlers::ApiError;

/// JSON body extractor whose rejection is the usual `{message, status}`
/// error body instead of axum's plain-text one.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = describe(&rejection);
                tracing::warn!("{}", message);
                Err(ApiError::bad_request(message))
            }
        }
    }
}

fn describe(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Expected request with `Content-Type: application/json`".to_string()
        }
        other => format!("Failed to parse JSON request body: {}", other.body_text()),
    }
}
