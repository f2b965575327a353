// routes/auth.rs
// POST /api/auth/signup, POST /api/auth/login -> sets the session cookie.
// POST /api/auth/logout -> removes the session and clears the cookie.

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::AppResult;
use crate::routes::employees::EmployeeDto;
use crate::session::{SESSION_COOKIE_NAME, SessionUser};
use crate::state::{
    AppState, NewEmployee, SESSION_TTL_SECONDS, create_session, delete_session, sign_up,
    verify_credentials,
};

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub job_position: String,
    #[serde(default)]
    pub gender: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> AppResult<Response> {
    let user = sign_up(
        &state,
        NewEmployee {
            email: body.email,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
            middle_name: body.middle_name,
            job_position: body.job_position,
            gender: body.gender,
        },
    )
    .await?;

    let token = create_session(&state, &user.email).await?;
    let mut response =
        Json(json!({ "ok": true, "user": EmployeeDto::from(&user) })).into_response();
    set_session_cookie(&mut response, &token);
    Ok(response)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Response> {
    let user = verify_credentials(&state, &body.email, &body.password).await?;
    let token = create_session(&state, &user.email).await?;

    let mut response =
        Json(json!({ "ok": true, "user": EmployeeDto::from(&user) })).into_response();
    set_session_cookie(&mut response, &token);
    Ok(response)
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> AppResult<Response> {
    delete_session(&state, session.token()).await?;
    let mut response = Json(json!({ "ok": true })).into_response();
    clear_session_cookie(&mut response);
    Ok(response)
}

pub async fn me(session: SessionUser) -> Json<EmployeeDto> {
    Json(EmployeeDto::from(session.user()))
}

fn set_session_cookie(response: &mut Response, token: &str) {
    let cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_TTL_SECONDS}"
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

fn clear_session_cookie(response: &mut Response) {
    let cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}
