//! Custom Axum extractors

use axum::extract::{FromRequest, Request};
use axum::Json;
use depot_repo::{Item, ValidationError};

use super::error::ApiError;

/// Extract an item from a JSON body and validate it.
///
/// Malformed JSON and a missing or blank `name` are both rejected with 400.
pub struct ValidItem(pub Item);

impl<S> FromRequest<S> for ValidItem
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(item) = Json::<Item>::from_request(req, state)
            .await
            .map_err(|rejection| {
                ApiError::Validation(ValidationError::InvalidFormat {
                    field: "body",
                    reason: rejection.body_text(),
                })
            })?;

        item.validate()?;
        Ok(Self(item))
    }
}
