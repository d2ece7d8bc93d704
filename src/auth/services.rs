use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo_types::User,
    },
    error::{is_unique_violation, ApiError},
    mail::verification_email,
    state::AppState,
};

const REGISTER_FAILED: &str = "Ocurrió un error al registrar el usuario.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Stops at the first missing or invalid field.
pub fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request_with(REGISTER_FAILED, "El campo nombre es obligatorio"));
    }
    if req.email.is_empty() {
        return Err(ApiError::bad_request_with(REGISTER_FAILED, "El campo correo es obligatorio"));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::bad_request_with(REGISTER_FAILED, "El correo ingresado no es válido."));
    }
    if req.password.is_empty() {
        return Err(ApiError::bad_request_with(REGISTER_FAILED, "El campo password es obligatorio"));
    }
    Ok(())
}

pub fn validate_login(req: &LoginRequest) -> Result<(), ApiError> {
    const LOGIN_FAILED: &str = "No se pudo iniciar sesión.";
    if req.email.is_empty() {
        return Err(ApiError::bad_request_with(LOGIN_FAILED, "El campo correo es obligatorio"));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::bad_request_with(LOGIN_FAILED, "El correo ingresado no es válido."));
    }
    if req.password.is_empty() {
        return Err(ApiError::bad_request_with(LOGIN_FAILED, "El campo password es obligatorio"));
    }
    Ok(())
}

/// Unknown account and wrong password end in the same error.
pub fn check_credentials(user: Option<User>, password: &str) -> Result<User, ApiError> {
    let Some(user) = user else {
        return Err(ApiError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }
    Ok(user)
}

pub fn verification_link(base_url: &str, token: &str) -> String {
    format!("{}/api/v1/seguridad/verificacion/{}", base_url, token)
}

/// Creates a pending user and mails the verification link. A failed send is
/// only logged.
pub async fn register(
    state: &AppState,
    base_url: &str,
    mut req: RegisterRequest,
) -> Result<User, ApiError> {
    req.name = req.name.trim().to_string();
    req.email = normalize_email(&req.email);
    validate_registration(&req)?;

    let duplicate = || {
        warn!(email = %req.email, "email already registered");
        ApiError::bad_request_with(
            REGISTER_FAILED,
            format!("El correo {} ya está registrado.", req.email),
        )
    };

    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(duplicate());
    }

    let hash = hash_password(&req.password)?;
    let token = Uuid::new_v4().to_string();

    let user = match User::create_pending(&state.db, &req.name, &req.email, &hash, &token).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => return Err(duplicate()),
        Err(e) => return Err(e.into()),
    };

    let (subject, html) = verification_email(&user.name, &verification_link(base_url, &token));
    if let Err(e) = state.mailer.send_html(&user.email, &subject, &html).await {
        warn!(error = %format!("{e:#}"), user_id = %user.id, "verification email not sent");
    }

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn verify(state: &AppState, token: &str) -> Result<User, ApiError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::bad_request_with(
            "Token de verificación inválido.",
            "El token no puede estar vacío.",
        ));
    }

    let user = User::consume_verification_token(
        &state.db,
        token,
        state.config.verification_ttl_hours,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound {
        message: "Token de verificación inválido o expirado.".into(),
        detail: Some("No se encontró un usuario pendiente con ese token.".into()),
    })?;

    info!(user_id = %user.id, "user verified");
    Ok(user)
}

pub async fn login(state: &AppState, mut req: LoginRequest) -> Result<LoginResponse, ApiError> {
    req.email = normalize_email(&req.email);
    validate_login(&req)?;

    let found = User::find_active_by_email(&state.db, &req.email).await?;
    if found.is_none() {
        warn!(email = %req.email, "login unknown or inactive account");
    }
    let user = check_credentials(found, &req.password)?;

    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(user.id, &user.name, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(LoginResponse {
        estado: "ok",
        id: user.id,
        name: user.name,
        token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{password::hash_password, repo_types::UserStatus};
    use time::OffsetDateTime;

    fn active_user(password: &str) -> User {
        User {
            id: Uuid::new_v4(),
            status: UserStatus::Active,
            name: "Ana".into(),
            email: "ana@x.com".into(),
            password_hash: hash_password(password).unwrap(),
            verification_token: None,
            registered_at: OffsetDateTime::now_utc(),
        }
    }

    fn detail(err: ApiError) -> String {
        match err {
            ApiError::BadRequest { detail, .. } => detail.unwrap_or_default(),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ana@x.com"));
        assert!(!is_valid_email("ana@x"));
        assert!(!is_valid_email("ana x@y.com"));
        assert!(!is_valid_email(""));
        assert_eq!(normalize_email("  Ana@X.com "), "ana@x.com");
    }

    #[test]
    fn registration_reports_first_missing_field() {
        let req = RegisterRequest {
            name: "".into(),
            email: "".into(),
            password: "".into(),
        };
        assert!(detail(validate_registration(&req).unwrap_err()).contains("nombre"));

        let req = RegisterRequest {
            name: "Ana".into(),
            email: "not-an-email".into(),
            password: "".into(),
        };
        assert!(detail(validate_registration(&req).unwrap_err()).contains("no es válido"));

        let req = RegisterRequest {
            name: "Ana".into(),
            email: "ana@x.com".into(),
            password: "".into(),
        };
        assert!(detail(validate_registration(&req).unwrap_err()).contains("password"));
    }

    #[test]
    fn short_passwords_are_accepted() {
        let req = RegisterRequest {
            name: "Ana".into(),
            email: "ana@x.com".into(),
            password: "secret".into(),
        };
        assert!(validate_registration(&req).is_ok());
    }

    #[test]
    fn wrong_password_and_unknown_user_look_the_same() {
        let wrong = check_credentials(Some(active_user("secret")), "not-secret").unwrap_err();
        let unknown = check_credentials(None, "secret").unwrap_err();
        assert!(matches!(wrong, ApiError::InvalidCredentials));
        assert!(matches!(unknown, ApiError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn correct_password_passes() {
        let user = check_credentials(Some(active_user("secret")), "secret").unwrap();
        assert_eq!(user.name, "Ana");
    }

    #[test]
    fn verification_link_points_at_verification_route() {
        assert_eq!(
            verification_link("https://recetas.example", "abc-123"),
            "https://recetas.example/api/v1/seguridad/verificacion/abc-123"
        );
    }
}
