use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::User,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Deterministic placeholder avatar, seeded by the username.
fn avatar_url(username: &str) -> String {
    format!("https://api.dicebear.com/7.x/avataaars/svg?seed={username}")
}

fn internal(state: &AppState, err: anyhow::Error) -> ApiError {
    ApiError::internal(err, state.config.expose_errors())
}

#[derive(Debug)]
struct Registration {
    username: String,
    email: String,
    password: String,
}

fn validate_register(payload: RegisterRequest) -> Result<Registration, ApiError> {
    let username = payload
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::Validation("Username is required".into()))?;
    let email = payload
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("Email is required".into()))?;
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("Password is required".into()))?;

    if username.len() < 3 {
        return Err(ApiError::Validation(
            "Username must be at least 3 characters long".into(),
        ));
    }
    if password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters long".into(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    Ok(Registration {
        username,
        email,
        password,
    })
}

fn validate_login(payload: LoginRequest) -> Result<(String, String), ApiError> {
    let email = payload
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("Email is required".into()))?;
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("Password is required".into()))?;
    Ok((email, password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let reg = validate_register(payload)?;

    // Email collision is checked, and reported, before username.
    if User::find_by_email(&state.db, &reg.email)
        .await
        .map_err(|e| internal(&state, e))?
        .is_some()
    {
        warn!(email = %reg.email, "email already registered");
        return Err(ApiError::Conflict("Email already exists".into()));
    }
    if User::find_by_username(&state.db, &reg.username)
        .await
        .map_err(|e| internal(&state, e))?
        .is_some()
    {
        warn!(username = %reg.username, "username already registered");
        return Err(ApiError::Conflict("Username already exists".into()));
    }

    let hash = hash_password(&reg.password).map_err(|e| internal(&state, e))?;
    let profile_image = avatar_url(&reg.username);

    let user = User::create(&state.db, &reg.username, &reg.email, &hash, &profile_image)
        .await
        .map_err(|e| internal(&state, e))?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id).map_err(|e| internal(&state, e))?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let (email, password) = validate_login(payload)?;

    // Unknown email and wrong password are indistinguishable to the caller.
    let user = User::find_by_email(&state.db, &email)
        .await
        .map_err(|e| internal(&state, e))?
        .ok_or_else(|| {
            warn!(email = %email, "login unknown email");
            ApiError::InvalidCredentials
        })?;

    let ok = verify_password(&password, &user.password_hash).map_err(|e| internal(&state, e))?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id).map_err(|e| internal(&state, e))?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_payload(
        username: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> RegisterRequest {
        RegisterRequest {
            username: username.map(Into::into),
            email: email.map(Into::into),
            password: password.map(Into::into),
        }
    }

    fn message_of(err: ApiError) -> String {
        err.to_string()
    }

    #[test]
    fn register_requires_every_field_by_name() {
        let err = validate_register(register_payload(None, Some("a@b.co"), Some("secret1")))
            .unwrap_err();
        assert_eq!(message_of(err), "Username is required");

        let err =
            validate_register(register_payload(Some("ann"), None, Some("secret1"))).unwrap_err();
        assert_eq!(message_of(err), "Email is required");

        let err =
            validate_register(register_payload(Some("ann"), Some("a@b.co"), None)).unwrap_err();
        assert_eq!(message_of(err), "Password is required");
    }

    #[test]
    fn register_enforces_minimum_lengths() {
        let err = validate_register(register_payload(Some("ab"), Some("a@b.co"), Some("secret1")))
            .unwrap_err();
        assert_eq!(message_of(err), "Username must be at least 3 characters long");

        let err = validate_register(register_payload(Some("ann"), Some("a@b.co"), Some("12345")))
            .unwrap_err();
        assert_eq!(message_of(err), "Password must be at least 6 characters long");
    }

    #[test]
    fn register_normalizes_and_checks_the_email() {
        let err = validate_register(register_payload(Some("ann"), Some("not-an-email"), Some("secret1")))
            .unwrap_err();
        assert_eq!(message_of(err), "Invalid email");

        let reg = validate_register(register_payload(
            Some("ann"),
            Some("  Ann@Example.COM "),
            Some("secret1"),
        ))
        .unwrap();
        assert_eq!(reg.email, "ann@example.com");
    }

    #[test]
    fn login_requires_both_fields() {
        let err = validate_login(LoginRequest {
            email: None,
            password: Some("secret1".into()),
        })
        .unwrap_err();
        assert_eq!(message_of(err), "Email is required");

        let err = validate_login(LoginRequest {
            email: Some("a@b.co".into()),
            password: None,
        })
        .unwrap_err();
        assert_eq!(message_of(err), "Password is required");
    }

    #[test]
    fn avatar_is_seeded_by_username() {
        assert_eq!(
            avatar_url("booklover"),
            "https://api.dicebear.com/7.x/avataaars/svg?seed=booklover"
        );
    }

    #[test]
    fn email_pattern_accepts_plain_addresses_only() {
        assert!(is_valid_email("ann@example.com"));
        assert!(!is_valid_email("ann@example"));
        assert!(!is_valid_email("ann example.com"));
        assert!(!is_valid_email(""));
    }
}
