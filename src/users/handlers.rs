//! User request handlers.

use http::StatusCode;
use serde::Deserialize;
use tracing::info;

use crate::app::{Count, state};
use crate::auth::{Identity, IssuedToken, Role, password};
use crate::error::ApiError;
use crate::request::Request;
use crate::response::{Json, Response};

use super::store::{NewUser, Profile};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest("name must not be empty".to_owned()));
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(ApiError::BadRequest(format!("`{email}` is not an email address"))),
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::BadRequest(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// `POST /users/register`
pub async fn register(req: Request) -> Result<Response, ApiError> {
    let body: RegisterRequest = req.json()?;
    body.validate()?;

    let app = state(&req)?;
    let email = body.email.trim().to_lowercase();
    let role = if app.admin_emails.contains(&email) { Role::Admin } else { Role::Customer };
    let password_hash = password::hash_blocking(body.password).await?;

    let user = app.users
        .insert(NewUser { name: body.name.trim().to_owned(), email, password_hash, role })
        .await?;
    info!(user_id = user.id, ?role, "user registered");

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/profile")
        .json(&Profile::from(&user)))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /users/login`: exchanges email and password for a bearer token.
pub async fn login(req: Request) -> Result<Json<IssuedToken>, ApiError> {
    let body: LoginRequest = req.json()?;
    let app = state(&req)?;
    let rejected = || ApiError::Unauthenticated("invalid email or password".to_owned());

    let user = app.users.find_by_email(body.email.trim()).await?.ok_or_else(rejected)?;
    if !password::verify_blocking(body.password, user.password_hash.clone()).await? {
        return Err(rejected());
    }

    let identity = Identity::new(user.id, user.email.clone(), user.role.permissions().iter().copied());
    let issued = app.tokens.issue(&identity)?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(issued))
}

/// `GET /users/profile`
pub async fn profile(req: Request) -> Result<Json<Profile>, ApiError> {
    let identity = req.extension::<Identity>()
        .ok_or_else(|| ApiError::Unauthenticated("authentication required".to_owned()))?;
    let user = state(&req)?.users.find_by_id(identity.user_id).await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} no longer exists", identity.user_id)))?;
    Ok(Json(Profile::from(&user)))
}

/// `GET /users/number`: how many customer accounts exist.
pub async fn count_customers(req: Request) -> Result<Json<Count>, ApiError> {
    let count = state(&req)?.users.count_by_role(Role::Customer).await?;
    Ok(Json(Count { count }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn register_request(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest { name: name.into(), email: email.into(), password: password.into() }
    }

    #[rstest]
    #[case("", "a@b.c", "long-enough")]
    #[case("Ada", "not-an-email", "long-enough")]
    #[case("Ada", "@b.c", "long-enough")]
    #[case("Ada", "a@", "long-enough")]
    #[case("Ada", "a@b.c", "short")]
    fn invalid_registrations(#[case] name: &str, #[case] email: &str, #[case] password: &str) {
        let err = register_request(name, email, password).validate().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn valid_registration() {
        assert!(register_request("Ada", " ada@example.com ", "correct horse").validate().is_ok());
    }
}
