//! Check-in token HTTP handlers.
//!
//! This module implements the token endpoints:
//! - POST /api/issue-token - Issue an attendance token for QR encoding
//! - POST /api/validate-token - Consume a scanned attendance token
//! - GET /api/tokens/{token} - Lifecycle state of an attendance token
//! - POST /api/registration/issue-token - Issue a registration token
//! - POST /api/registration/validate-token - Consume a registration token

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

use crate::{
    error::AppError,
    models::token::{
        IssueTokenRequest, IssueTokenResponse, TokenClass, TokenStatusResponse,
        ValidateTokenRequest, ValidateTokenResponse,
    },
    services::token_service::{CheckedInStudent, IssuedToken, TokenService},
    state::AppState,
};

/// Issue an attendance token.
///
/// # Request Body
///
/// ```json
/// {
///   "studentUid": "u1",
///   "studentName": "Alice"
/// }
/// ```
///
/// # Response (200)
///
/// ```json
/// {
///   "success": true,
///   "token": "K7MPQ2XR9TWA",
///   "expiresAt": "2025-12-21T16:00:30Z"
/// }
/// ```
pub async fn issue_attendance_token(
    State(state): State<AppState>,
    payload: Result<Json<IssueTokenRequest>, JsonRejection>,
) -> Result<Json<IssueTokenResponse>, AppError> {
    issue(&state.attendance, payload).await
}

/// Validate and consume an attendance token.
///
/// # Request Body
///
/// ```json
/// {
///   "token": "K7MPQ2XR9TWA",
///   "studentUid": "u1"
/// }
/// ```
///
/// # Response
///
/// - **200**: `{"success": true, "studentUid": "u1", "studentName": "Alice"}`
/// - **400**: token expired or malformed input
/// - **403**: token belongs to another student
/// - **404**: no such token
/// - **409**: token already used
///
/// A successful check-in is forwarded to the attendance webhook when one is configured.
pub async fn validate_attendance_token(
    State(state): State<AppState>,
    payload: Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> Result<Json<ValidateTokenResponse>, AppError> {
    let student = validate(&state.attendance, payload).await?;

    if let Some(notifier) = &state.notifier {
        notifier.notify(&student);
    }

    Ok(Json(student.into()))
}

/// Lifecycle state of an attendance token, polled by the QR screen.
///
/// # Response (200)
///
/// ```json
/// {
///   "token": "K7MPQ2XR9TWA",
///   "state": "consumed",
///   "expiresAt": "2025-12-21T16:00:30Z",
///   "usedAt": "2025-12-21T16:00:12Z"
/// }
/// ```
pub async fn attendance_token_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<TokenStatusResponse>, AppError> {
    let status = state.attendance.status(&token).await?;
    Ok(Json(status))
}

/// Issue a registration token.
pub async fn issue_registration_token(
    State(state): State<AppState>,
    payload: Result<Json<IssueTokenRequest>, JsonRejection>,
) -> Result<Json<IssueTokenResponse>, AppError> {
    issue(&state.registration, payload).await
}

/// Validate and consume a registration token.
pub async fn validate_registration_token(
    State(state): State<AppState>,
    payload: Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> Result<Json<ValidateTokenResponse>, AppError> {
    let student = validate(&state.registration, payload).await?;
    Ok(Json(student.into()))
}

async fn issue<C: TokenClass>(
    service: &TokenService<C>,
    payload: Result<Json<IssueTokenRequest>, JsonRejection>,
) -> Result<Json<IssueTokenResponse>, AppError> {
    let Json(request) = payload?;
    let issued = service
        .issue(&request.student_uid, &request.student_name)
        .await?;

    Ok(Json(issued.into()))
}

async fn validate<C: TokenClass>(
    service: &TokenService<C>,
    payload: Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> Result<CheckedInStudent, AppError> {
    let Json(request) = payload?;
    service.validate(&request.token, &request.student_uid).await
}

impl From<IssuedToken> for IssueTokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            success: true,
            token: issued.token,
            expires_at: issued.expires_at,
        }
    }
}

impl From<CheckedInStudent> for ValidateTokenResponse {
    fn from(student: CheckedInStudent) -> Self {
        Self {
            success: true,
            student_uid: student.student_uid,
            student_name: student.student_name,
        }
    }
}
