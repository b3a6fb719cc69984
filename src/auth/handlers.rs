//! Authentication handlers

use axum::{
    extract::{ConnectInfo, Extension},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

use super::gateway::SignIn;
use super::models::{normalize_email, GooglePayload, RequestOtpPayload, VerifyOtpPayload};
use super::otp::{OtpRequest, OtpVerification};
use super::session::CurrentSession;
use super::validators::AuthValidator;
use crate::common::helpers::extract_ip_address;
use crate::common::{safe_email_log, ApiError, ApiJson, AppState, Validator};

fn with_cookies(cookies: Vec<HeaderValue>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        headers.append(SET_COOKIE, cookie);
    }
    headers
}

fn signed_in_response(sign_in: SignIn) -> impl IntoResponse {
    (
        with_cookies(sign_in.cookies),
        Json(json!({ "ok": true, "user": sign_in.user })),
    )
}

/// POST /api/auth/request-otp
///
/// ```json
/// { "purpose": "signup", "name": "Ann", "dob": "1990-01-31", "email": "ann@example.com" }
/// ```
pub async fn request_otp(
    Extension(state): Extension<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<RequestOtpPayload>,
) -> Result<impl IntoResponse, ApiError> {
    AuthValidator.validate(&payload).into_result()?;

    let email = normalize_email(&payload.email);
    let ip = extract_ip_address(&headers, connect_info.as_ref());
    debug!(email = %safe_email_log(&email), purpose = %payload.purpose, "OTP requested");

    state
        .gateway
        .request_otp(OtpRequest {
            purpose: payload.purpose,
            email: email.clone(),
            ip,
        })
        .await?;

    Ok(Json(json!({
        "ok": true,
        "message": "OTP sent to email",
        "meta": {
            "purpose": payload.purpose,
            "email": email,
            "name": payload.name,
            "dob": payload.dob,
        }
    })))
}

/// POST /api/auth/verify-otp
pub async fn verify_otp(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<VerifyOtpPayload>,
) -> Result<impl IntoResponse, ApiError> {
    AuthValidator.validate(&payload).into_result()?;

    let verification = OtpVerification {
        purpose: payload.purpose,
        email: normalize_email(&payload.email),
        otp: payload.otp.trim().to_string(),
        name: payload.name.map(|n| n.trim().to_string()),
        dob: payload.dob,
    };

    let sign_in = state
        .gateway
        .verify_otp(verification, payload.remember.unwrap_or(false))
        .await?;
    Ok(signed_in_response(sign_in))
}

/// POST /api/auth/google
///
/// ```json
/// { "idToken": "<google id token>", "remember": true }
/// ```
pub async fn google_auth(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<GooglePayload>,
) -> Result<impl IntoResponse, ApiError> {
    AuthValidator.validate(&payload).into_result()?;

    let sign_in = state
        .gateway
        .google(payload.id_token.trim(), payload.remember.unwrap_or(false))
        .await?;
    Ok(signed_in_response(sign_in))
}

/// POST /api/auth/logout
pub async fn logout_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let cookies = state.gateway.logout()?;
    info!("User logged out");
    Ok((with_cookies(cookies), Json(json!({ "ok": true }))))
}

/// GET /api/auth/me
pub async fn me_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.gateway.me(&session).await?;
    Ok(Json(json!({ "user": user })))
}
