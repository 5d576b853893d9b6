use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json, RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{names, rejections::AppError, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account id
    pub exp: usize,
    pub aud: String,
}

/// Verifies bearer tokens issued by the identity service.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[names::JWT_AUDIENCE]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("rejected bearer token: {e}");
                None
            }
        }
    }
}

/// The authenticated account making the request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub account_id: String,
}

/// Guard extractor that requires a valid `Authorization: Bearer` token.
pub struct AuthGuard(pub Caller);

impl FromRequestParts<AppState> for AuthGuard {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::AuthRequired)?;

        let claims = state
            .jwt
            .verify(bearer.token())
            .filter(|claims| !claims.sub.is_empty())
            .ok_or(AppError::AuthRequired)?;

        Ok(AuthGuard(Caller {
            account_id: claims.sub,
        }))
    }
}

/// JSON body whose rejections use the API error envelope.
pub struct JsonBody<T>(pub T);

impl<S: Send + Sync, T: DeserializeOwned> FromRequest<S> for JsonBody<T> {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::warn!("invalid JSON body: {e}");
            AppError::InvalidRequest("Request body must be valid JSON")
        })?;
        Ok(JsonBody(value))
    }
}
