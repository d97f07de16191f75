// src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{clean, expect_completed, run_flow};
use crate::errors::AppError;
use crate::pipelines::contexts::{SigninCtxData, SignupCtxData};
use crate::pipelines::common_steps::missing;
use crate::state::AppState;
use crate::web::session::{AuthenticatedUser, SessionContext};

// --- Request DTOs ---
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequestPayload {
  pub email: String,
  pub password: String,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
}

#[derive(Deserialize)]
pub struct SigninRequestPayload {
  pub email: String,
  pub password: String,
}

// --- Handler Implementations ---

#[instrument(name = "handler::signup", skip_all, fields(req_email = %req_payload.email))]
pub async fn signup_handler(
  app_state: web::Data<AppState>,
  session: SessionContext,
  req_payload: web::Json<SignupRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let mut signup_ctx = SignupCtxData::new(app_state.get_ref().clone(), payload.email, payload.password);
  signup_ctx.first_name = clean(payload.first_name);
  signup_ctx.last_name = clean(payload.last_name);

  let (outcome, data) = run_flow(&app_state, signup_ctx).await?;
  expect_completed(outcome)?;

  let user = data.user.ok_or_else(|| missing("created user"))?;
  session.persist_user(&user.id)?;
  info!(user_id = %user.id, welcome_email_sent = data.welcome_email_sent, "Signup successful.");
  Ok(HttpResponse::Created().json(user))
}

#[instrument(name = "handler::signin", skip_all, fields(req_email = %req_payload.email))]
pub async fn signin_handler(
  app_state: web::Data<AppState>,
  session: SessionContext,
  req_payload: web::Json<SigninRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let signin_ctx = SigninCtxData {
    app: app_state.get_ref().clone(),
    email: payload.email,
    password: payload.password,
    user: None,
  };

  let (outcome, data) = run_flow(&app_state, signin_ctx).await?;
  expect_completed(outcome)?;

  let user = data.user.ok_or_else(|| missing("user"))?;
  session.persist_user(&user.id)?;
  Ok(HttpResponse::Ok().json(user))
}

#[instrument(name = "handler::logout", skip_all)]
pub async fn logout_handler(session: SessionContext) -> HttpResponse {
  session.purge();
  HttpResponse::NoContent().finish()
}

#[instrument(name = "handler::current_user", skip_all, fields(user_id = %auth_user.id()))]
pub async fn current_user_handler(auth_user: AuthenticatedUser) -> HttpResponse {
  HttpResponse::Ok().json(auth_user.into_inner())
}
