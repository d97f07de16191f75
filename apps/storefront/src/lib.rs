// src/lib.rs

//! Shopnish storefront: a multi-vendor marketplace API with food ordering,
//! service bookings and delivery hand-off, built on actix-web and the
//! `shopnish-flow` step engine.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod storage;
pub mod web;

use actix_web::body::MessageBody;
use actix_web::cookie::Key;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{web as actix_data, App};
use tracing_actix_web::TracingLogger;

use crate::state::AppState;

/// The whole application: state, request tracing, cookie sessions and every
/// route. `main` and the HTTP tests build the app through this.
pub fn build_app(
  state: AppState,
  key: Key,
  cookie_secure: bool,
) -> App<
  impl ServiceFactory<
    ServiceRequest,
    Config = (),
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
    InitError = (),
  >,
> {
  App::new()
    .app_data(actix_data::Data::new(state))
    .wrap(web::session_middleware(key, cookie_secure))
    .wrap(TracingLogger::default())
    .configure(web::configure_app_routes)
}
