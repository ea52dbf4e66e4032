// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    config::Config,
    services::{certificate::CertificateRenderer, dispatch::Dispatcher},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub certificates: Arc<dyn CertificateRenderer>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Dispatcher> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.dispatcher)
    }
}

impl FromRef<AppState> for Arc<dyn CertificateRenderer> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.certificates)
    }
}
