//! HTTP Basic-auth verification and the middleware that turns credentials
//! into a [`CurrentUser`].

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use gatehouse_api::CurrentUser;
use gatehouse_core::account::AccountId;
use rand_core::OsRng;

use crate::{ServerConfig, UserConfig, error::Error};

/// Hash `password` into the argon2 PHC string stored as `password_hash`.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Verify Basic credentials against the configured users.
///
/// Returns the account the matching user acts as.
pub fn verify_auth(headers: &HeaderMap, users: &[UserConfig]) -> Result<AccountId, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let user = users
    .iter()
    .find(|u| u.username == username)
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&user.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(AccountId(user.account_id))
}

/// Middleware: reject unauthenticated requests, otherwise attach the acting
/// account as a [`CurrentUser`] extension.
pub async fn require_auth(
  State(config): State<Arc<ServerConfig>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  match verify_auth(req.headers(), &config.users) {
    Ok(account) => {
      req.extensions_mut().insert(CurrentUser(account));
      Ok(next.run(req).await)
    }
    Err(e) => {
      tracing::warn!(uri = %req.uri(), "rejected request without valid credentials");
      Err(e)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::{Request, header};

  fn make_users(password: &str) -> Vec<UserConfig> {
    let hash = hash_password(password).unwrap();
    vec![UserConfig {
      username:      "admin".to_string(),
      account_id:    1000,
      password_hash: hash,
    }]
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  fn headers(value: Option<&str>) -> HeaderMap {
    let mut builder = Request::builder();
    if let Some(value) = value {
      builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(()).unwrap().headers().clone()
  }

  #[test]
  fn correct_credentials_yield_account() {
    let users = make_users("secret");
    let h = headers(Some(&basic("admin", "secret")));
    assert_eq!(verify_auth(&h, &users).unwrap(), AccountId(1000));
  }

  #[test]
  fn hashes_are_salted() {
    let a = hash_password("secret").unwrap();
    let b = hash_password("secret").unwrap();
    assert_ne!(a, b);
    assert!(a.starts_with("$argon2"));
  }

  #[test]
  fn wrong_password() {
    let users = make_users("secret");
    let h = headers(Some(&basic("admin", "wrong")));
    assert!(matches!(verify_auth(&h, &users), Err(Error::Unauthorized)));
  }

  #[test]
  fn unknown_user() {
    let users = make_users("secret");
    let h = headers(Some(&basic("mallory", "secret")));
    assert!(matches!(verify_auth(&h, &users), Err(Error::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let users = make_users("secret");
    assert!(matches!(verify_auth(&headers(None), &users), Err(Error::Unauthorized)));
  }

  #[test]
  fn invalid_base64() {
    let users = make_users("secret");
    let h = headers(Some("Basic !!!not-base64!!!"));
    assert!(matches!(verify_auth(&h, &users), Err(Error::Unauthorized)));
  }
}
