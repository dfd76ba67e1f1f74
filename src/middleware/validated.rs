use crate::error::AppError;
use crate::utils::validation::Validate;
use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

/// `Json<T>` that also runs `T::validate`.
///
/// Bad JSON and bad values both come back as a 400 `Validation` error in our usual
/// `{"error": ...}` shape, instead of Axum's plain-text rejection.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                AppError::validation(format!("Failed to parse from JSON: {}", rejection.body_text()))
            })?;

        value
            .validate()
            .map_err(|msg| AppError::validation(format!("Invalid input: {msg}")))?;

        Ok(Self(value))
    }
}
