// src/pipelines/signup_pipeline.rs

use crate::errors::AppError;
use crate::pipelines::common_steps::{missing, notify};
use crate::pipelines::contexts::SignupCtxData;
use crate::services::auth_service;
use crate::storage::NewUser;
use shopnish_flow::{Flow, FlowContext, FlowRegistry, StepControl, StepDef};
use tracing::{event, info, warn, Level};

/// Registers the user sign-up flow.
pub fn register_signup_pipeline(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<SignupCtxData, AppError>::new(
    "signup",
    [
      StepDef::required("validate_signup_input"),
      StepDef::required("check_existing_user"),
      StepDef::required("create_user"),
      StepDef::optional("send_welcome_email"),
    ],
  );

  flow.on("validate_signup_input", |ctx: FlowContext<SignupCtxData>| async move {
    let (email, password) = ctx.update(|data| {
      data.email = auth_service::normalize_email(&data.email);
      (data.email.clone(), data.password.clone())
    });
    event!(Level::DEBUG, %email, "Validating signup input.");
    auth_service::validate_credentials(&email, &password)?;
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("check_existing_user", |ctx: FlowContext<SignupCtxData>| async move {
    let (email, storage) = ctx.snapshot(|data| (data.email.clone(), data.app.storage.clone()));
    if storage.find_user_by_email(&email).await?.is_some() {
      warn!(%email, "Attempt to sign up with an existing email.");
      return Err(AppError::Conflict("An account with this email already exists.".to_string()));
    }
    Ok(StepControl::Continue)
  });

  flow.on("create_user", |ctx: FlowContext<SignupCtxData>| async move {
    let (new_user, password, storage) = ctx.snapshot(|data| {
      (
        NewUser {
          id: auth_service::new_user_id(),
          email: data.email.clone(),
          first_name: data.first_name.clone(),
          last_name: data.last_name.clone(),
          password_hash: None,
          is_admin: false,
        },
        data.password.clone(),
        data.app.storage.clone(),
      )
    });

    let password_hash = auth_service::hash_password(&password)?;
    let user = storage
      .create_user(NewUser {
        password_hash: Some(password_hash),
        ..new_user
      })
      .await?;
    info!(user_id = %user.id, "User created.");
    ctx.update(|data| data.user = Some(user));
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("send_welcome_email", |ctx: FlowContext<SignupCtxData>| async move {
    let (user, config) = ctx.snapshot(|data| (data.user.clone(), data.app.config.clone()));
    let user = user.ok_or_else(|| missing("created user"))?;
    let sent = notify(
      &config,
      &user.email,
      "Welcome to Shopnish",
      &format!("Hi {}, thanks for signing up to Shopnish!", user.display_name()),
    )
    .await;
    ctx.update(|data| data.welcome_email_sent = sent);
    Ok::<_, AppError>(StepControl::Continue)
  });

  registry.register(flow);
  info!("Sign-up flow registered.");
}
