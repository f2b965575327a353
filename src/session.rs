// session.rs
// Session middleware to protect routes and extractor to access the
// authenticated user.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};
use futures::future::BoxFuture;
use mongodb::bson::oid::ObjectId;

use crate::error::AppError;
use crate::models::User;
use crate::state::{AppState, find_user_by_session};

pub const SESSION_COOKIE_NAME: &str = "session";

#[derive(Clone)]
pub struct SessionData {
    pub user: User,
    pub user_id: ObjectId,
    pub token: String,
}

pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let tokens = extract_cookies(request.headers(), SESSION_COOKIE_NAME);
    if tokens.is_empty() {
        return Err(AppError::Unauthenticated);
    }

    // Try all cookies with the session name until one is valid
    for token in tokens {
        if let Some(user) = find_user_by_session(&state, &token).await? {
            let user_id = user.id.ok_or(AppError::Unauthenticated)?;
            request.extensions_mut().insert(SessionData {
                user,
                user_id,
                token,
            });
            return Ok(next.run(request).await);
        }
    }

    Err(AppError::Unauthenticated)
}

pub struct SessionUser(pub SessionData);

impl SessionUser {
    pub fn user(&self) -> &User {
        &self.0.user
    }

    pub fn user_id(&self) -> &ObjectId {
        &self.0.user_id
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }

    pub fn is_admin(&self) -> bool {
        self.0.user.role.is_admin()
    }
}

#[allow(refining_impl_trait)]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> BoxFuture<'static, Result<Self, Self::Rejection>> {
        let data = parts
            .extensions
            .get::<SessionData>()
            .cloned()
            .ok_or(AppError::Unauthenticated);

        Box::pin(async move { data.map(SessionUser) })
    }
}

fn extract_cookies(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(COOKIE)
        .into_iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let mut split = pair.trim().splitn(2, '=');
            let key = split.next()?.trim();
            let value = split.next()?.trim();
            if key == name {
                Some(value.to_owned())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn picks_session_cookies_out_of_header_soup() {
        let mut headers = HeaderMap::new();
        headers.append(
            COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123; lang=ru"),
        );
        headers.append(COOKIE, HeaderValue::from_static("session=def456"));
        let tokens = extract_cookies(&headers, SESSION_COOKIE_NAME);
        assert_eq!(tokens, vec!["abc123".to_string(), "def456".to_string()]);
    }

    #[test]
    fn ignores_other_cookie_names() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("sessionx=abc; a=b"));
        assert!(extract_cookies(&headers, SESSION_COOKIE_NAME).is_empty());
    }
}
