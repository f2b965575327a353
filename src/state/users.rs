use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use data_encoding::BASE32_NOPAD;
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use rand::RngCore;
use std::time::{Duration, SystemTime};

use crate::error::{AppError, AppResult};
use crate::models::{Session, User, UserRole};

use super::{AppState, SESSION_TTL_SECONDS};

const MIN_PASSWORD_LEN: usize = 6;

/// Sign-up payload; the role is derived from the job position.
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,
    pub job_position: String,
    pub gender: String,
}

pub async fn sign_up(state: &AppState, input: NewEmployee) -> AppResult<User> {
    let email = input.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("a valid email is required"));
    }
    if input.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
        return Err(AppError::validation("first and last name are required"));
    }
    if state.users.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(AppError::validation("email is already registered"));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(input.password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?
        .to_string();

    let mut user = User {
        id: None,
        email,
        password_hash,
        first_name: input.first_name.trim().to_string(),
        last_name: input.last_name.trim().to_string(),
        middle_name: input.middle_name.trim().to_string(),
        job_position: input.job_position.trim().to_string(),
        gender: input.gender.trim().to_string(),
        role: UserRole::from_position(&input.job_position),
        stats: Default::default(),
        created_at: DateTime::now(),
    };

    let res = state.users.insert_one(&user).await?;
    user.id = res.inserted_id.as_object_id();
    tracing::info!(email = %user.email, role = user.role.as_str(), "employee signed up");
    Ok(user)
}

pub async fn verify_credentials(state: &AppState, email: &str, password: &str) -> AppResult<User> {
    let email = email.trim().to_lowercase();
    let user = state
        .users
        .find_one(doc! { "email": &email })
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let parsed =
        PasswordHash::new(&user.password_hash).map_err(|e| anyhow!("stored hash invalid: {e}"))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::Unauthenticated)?;
    Ok(user)
}

pub async fn create_session(state: &AppState, email: &str) -> AppResult<String> {
    let _ = state
        .sessions
        .delete_many(doc! { "user_email": email })
        .await;

    let mut token_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut token_bytes);
    let token = BASE32_NOPAD.encode(&token_bytes);

    let expires_at =
        DateTime::from_system_time(SystemTime::now() + Duration::from_secs(SESSION_TTL_SECONDS));

    state
        .sessions
        .insert_one(Session {
            id: None,
            token: token.clone(),
            user_email: email.to_string(),
            expires_at,
        })
        .await?;

    Ok(token)
}

pub async fn find_user_by_session(state: &AppState, token: &str) -> AppResult<Option<User>> {
    if let Some(session) = state.sessions.find_one(doc! { "token": token }).await? {
        if session.expires_at.to_system_time() <= SystemTime::now() {
            // Remove expired session, ignore result
            let _ = state.sessions.delete_one(doc! { "token": token }).await;
            return Ok(None);
        }
        Ok(state
            .users
            .find_one(doc! { "email": &session.user_email })
            .await?)
    } else {
        Ok(None)
    }
}

pub async fn delete_session(state: &AppState, token: &str) -> AppResult<()> {
    let _ = state.sessions.delete_one(doc! { "token": token }).await?;
    Ok(())
}

pub async fn get_user_by_id(state: &AppState, id: &ObjectId) -> AppResult<Option<User>> {
    state
        .users
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

/// Resolves the display name stamped into attribution fields from the
/// actor's stored profile.
pub async fn actor_display_name(state: &AppState, id: &ObjectId) -> AppResult<String> {
    Ok(get_user_by_id(state, id)
        .await?
        .map(|u| u.display_name())
        .unwrap_or_else(|| "unknown".to_string()))
}

pub async fn list_employees(state: &AppState) -> AppResult<Vec<User>> {
    let mut cursor = state.users.find(doc! {}).sort(doc! { "last_name": 1 }).await?;
    let mut users = Vec::new();
    while let Some(user) = cursor.try_next().await? {
        users.push(user);
    }
    Ok(users)
}
