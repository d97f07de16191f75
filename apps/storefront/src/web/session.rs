// src/web/session.rs

//! Cookie sessions and the extractor that turns one into a [`User`].
//!
//! The session only carries the user id. [`AuthenticatedUser`] loads the user
//! behind it on every request, so a deleted account stops working at once.
//! While development auth is on, a request without a session acts as the
//! seeded development admin.

use actix_session::config::CookieContentSecurity;
use actix_session::storage::CookieSessionStore;
use actix_session::{Session, SessionMiddleware};
use actix_web::cookie::{Key, SameSite};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::User;
use crate::state::AppState;
use crate::storage::seed;

pub const SESSION_COOKIE: &str = "session";
pub(crate) const USER_ID_KEY: &str = "user_id";

/// Newtype wrapper that exposes the session operations handlers need.
#[derive(Clone)]
pub struct SessionContext(Session);

impl SessionContext {
  pub fn new(session: Session) -> Self {
    Self(session)
  }

  /// Stores the user id under a fresh session key.
  pub fn persist_user(&self, user_id: &str) -> Result<()> {
    self.0.renew();
    self
      .0
      .insert(USER_ID_KEY, user_id)
      .map_err(|error| AppError::Internal(format!("failed to persist session: {error}")))
  }

  pub fn user_id(&self) -> Result<Option<String>> {
    self
      .0
      .get::<String>(USER_ID_KEY)
      .map_err(|error| AppError::Internal(format!("failed to read session: {error}")))
  }

  pub fn require_user_id(&self) -> Result<String> {
    self
      .user_id()?
      .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
  }

  pub fn purge(&self) {
    self.0.purge();
  }
}

impl FromRequest for SessionContext {
  type Error = actix_web::Error;
  type Future = LocalBoxFuture<'static, std::result::Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
    let fut = Session::from_request(req, payload);
    Box::pin(async move { fut.await.map(SessionContext::new) })
  }
}

/// The user making the request. Rejects with 401 when nobody is signed in and
/// development auth is off.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
  pub fn id(&self) -> &str {
    &self.0.id
  }

  pub fn into_inner(self) -> User {
    self.0
  }
}

impl std::ops::Deref for AuthenticatedUser {
  type Target = User;

  fn deref(&self) -> &User {
    &self.0
  }
}

impl FromRequest for AuthenticatedUser {
  type Error = actix_web::Error;
  type Future = LocalBoxFuture<'static, std::result::Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
    let session = SessionContext::from_request(req, payload);
    let state = req.app_data::<web::Data<AppState>>().cloned();
    Box::pin(async move {
      let session = session.await?;
      let state = state.ok_or_else(|| AppError::Internal("application state is not configured".to_string()))?;
      let user = resolve_user(&state, &session).await?;
      Ok(AuthenticatedUser(user))
    })
  }
}

async fn resolve_user(state: &AppState, session: &SessionContext) -> Result<User> {
  if let Some(user_id) = session.user_id()? {
    if let Some(user) = state.storage.find_user(&user_id).await? {
      return Ok(user);
    }
    warn!(%user_id, "Session refers to an unknown user; dropping it.");
    session.purge();
  }

  if state.config.dev_auth {
    debug!("No session; acting as the development admin.");
    return match state.storage.find_user(seed::DEV_USER_ID).await? {
      Some(user) => Ok(user),
      None => seed::ensure_dev_user(state.storage.as_ref()).await,
    };
  }

  Err(AppError::Unauthorized("Authentication required".to_string()))
}

/// The signing key for session cookies. Without `SESSION_SECRET` a random key
/// is used and sessions do not survive a restart.
pub fn session_key(config: &AppConfig) -> Result<Key> {
  match &config.session_secret {
    Some(secret) => Key::try_from(secret.as_bytes())
      .map_err(|error| AppError::Config(format!("SESSION_SECRET is not a usable key: {error}"))),
    None => {
      warn!("SESSION_SECRET not set; using a random session key.");
      Ok(Key::generate())
    }
  }
}

pub fn session_middleware(key: Key, cookie_secure: bool) -> SessionMiddleware<CookieSessionStore> {
  SessionMiddleware::builder(CookieSessionStore::default(), key)
    .cookie_name(SESSION_COOKIE.to_owned())
    .cookie_path("/".to_owned())
    .cookie_secure(cookie_secure)
    .cookie_http_only(true)
    .cookie_same_site(SameSite::Lax)
    .cookie_content_security(CookieContentSecurity::Private)
    .build()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::{MemoryStorage, NewUser, Storage};
  use actix_web::http::StatusCode;
  use actix_web::{test, App, HttpResponse};
  use std::sync::Arc;

  fn state(dev_auth: bool) -> AppState {
    let flag = if dev_auth { "true" } else { "false" };
    let config = AppConfig::from_lookup(|name| (name == "DEV_AUTH").then(|| flag.to_string())).unwrap();
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    AppState::new(config, storage)
  }

  async fn whoami(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().body(user.id().to_string())
  }

  async fn sign_in_as(session: SessionContext, path: web::Path<String>) -> std::result::Result<HttpResponse, AppError> {
    session.persist_user(&path.into_inner())?;
    Ok(HttpResponse::Ok().finish())
  }

  #[actix_web::test]
  async fn session_user_is_loaded_from_storage() {
    let state = state(false);
    state
      .storage
      .create_user(NewUser {
        id: "u-1".into(),
        email: "a@example.com".into(),
        first_name: None,
        last_name: None,
        password_hash: None,
        is_admin: false,
      })
      .await
      .unwrap();

    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(state))
        .wrap(session_middleware(Key::generate(), false))
        .route("/login/{id}", web::post().to(sign_in_as))
        .route("/me", web::get().to(whoami)),
    )
    .await;

    let res = test::call_service(&app, test::TestRequest::post().uri("/login/u-1").to_request()).await;
    let cookie = res
      .response()
      .cookies()
      .find(|cookie| cookie.name() == SESSION_COOKIE)
      .expect("session cookie set")
      .into_owned();

    let res = test::call_service(&app, test::TestRequest::get().uri("/me").cookie(cookie).to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(test::read_body(res).await, "u-1");
  }

  #[actix_web::test]
  async fn anonymous_requests_need_dev_auth() {
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(state(false)))
        .wrap(session_middleware(Key::generate(), false))
        .route("/me", web::get().to(whoami)),
    )
    .await;
    let res = test::call_service(&app, test::TestRequest::get().uri("/me").to_request()).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(state(true)))
        .wrap(session_middleware(Key::generate(), false))
        .route("/me", web::get().to(whoami)),
    )
    .await;
    let res = test::call_service(&app, test::TestRequest::get().uri("/me").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(test::read_body(res).await, seed::DEV_USER_ID);
  }

  #[::core::prelude::v1::test]
  fn short_secrets_are_not_keys() {
    let mut config = AppConfig::from_lookup(|_| None).unwrap();
    config.session_secret = Some("too-short".to_string());
    assert!(matches!(session_key(&config), Err(AppError::Config(_))));
  }
}
