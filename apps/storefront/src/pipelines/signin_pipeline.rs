// src/pipelines/signin_pipeline.rs

use crate::errors::AppError;
use crate::pipelines::common_steps::missing;
use crate::pipelines::contexts::SigninCtxData;
use crate::services::auth_service;
use shopnish_flow::{Flow, FlowContext, FlowRegistry, StepControl, StepDef};
use tracing::{info, warn};

const BAD_CREDENTIALS: &str = "Invalid email or password.";

pub fn register_signin_pipeline(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<SigninCtxData, AppError>::new(
    "signin",
    [
      StepDef::required("validate_signin_input"),
      StepDef::required("load_user"),
      StepDef::required("verify_password"),
    ],
  );

  flow.on("validate_signin_input", |ctx: FlowContext<SigninCtxData>| async move {
    let (email, password_empty) = ctx.update(|data| {
      data.email = auth_service::normalize_email(&data.email);
      (data.email.clone(), data.password.is_empty())
    });
    if email.is_empty() || password_empty {
      return Err(AppError::Validation("Email and password are required.".to_string()));
    }
    Ok(StepControl::Continue)
  });

  flow.on("load_user", |ctx: FlowContext<SigninCtxData>| async move {
    let (email, storage) = ctx.snapshot(|data| (data.email.clone(), data.app.storage.clone()));
    let Some(user) = storage.find_user_by_email(&email).await? else {
      warn!(%email, "Sign-in for unknown email.");
      return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    };
    ctx.update(|data| data.user = Some(user));
    Ok(StepControl::Continue)
  });

  flow.on("verify_password", |ctx: FlowContext<SigninCtxData>| async move {
    let (user, password) = ctx.snapshot(|data| (data.user.clone(), data.password.clone()));
    let user = user.ok_or_else(|| missing("user"))?;
    // Seeded accounts without a password can never sign in with one.
    let Some(stored_hash) = user.password_hash.as_deref() else {
      return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    };
    if !auth_service::verify_password(stored_hash, &password)? {
      warn!(user_id = %user.id, "Sign-in with a wrong password.");
      return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }
    info!(user_id = %user.id, "User signed in.");
    Ok(StepControl::Continue)
  });

  registry.register(flow);
  info!("Sign-in flow registered.");
}
