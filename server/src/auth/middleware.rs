//! Authentication extractor.
//!
//! Web app clients send their signed init data as
//! `Authorization: tma <init-data>`. The extractor verifies it against the
//! bot token and yields the user's session.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tally_engine::{signature, UserSession};

use crate::error::AppError;
use crate::AppState;

const SCHEME: &str = "tma ";

/// User authenticated by verified init data.
#[derive(Debug, Clone)]
pub struct VerifiedUser(pub UserSession);

impl FromRequestParts<AppState> for VerifiedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match auth_header {
            Some(header) if header.starts_with(SCHEME) => {
                let init_data = header.trim_start_matches(SCHEME).trim();
                let session =
                    signature::verify_and_extract_user(init_data, state.config.bot_token.as_bytes())?;
                Ok(VerifiedUser(session))
            }
            Some(_) => Err(AppError::Unauthorized(
                "Invalid authorization header format",
            )),
            None => Err(AppError::Unauthorized("Missing authorization header")),
        }
    }
}
