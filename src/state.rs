// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    store::{DynRepository, Repository},
};

#[derive(Clone)]
pub struct AppState {
    pub repo: DynRepository,
    pub config: Config,
}

impl AppState {
    pub fn new(repo: impl Repository + 'static, config: Config) -> Self {
        Self {
            repo: Arc::new(repo),
            config,
        }
    }
}

impl FromRef<AppState> for DynRepository {
    fn from_ref(state: &AppState) -> Self {
        state.repo.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
