//! Shared application state handed to every handler.

use std::sync::Arc;

use chrono::Duration;

use crate::clock::Clock;
use crate::middleware::auth::ApiKeys;
use crate::models::token::{Attendance, Registration};
use crate::services::token_generator::{RandomTokenGenerator, TokenGenerator};
use crate::services::token_service::TokenService;
use crate::services::webhook_service::CheckInNotifier;
use crate::store::TokenStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TokenStore>,
    pub clock: Arc<dyn Clock>,
    pub attendance: TokenService<Attendance>,
    pub registration: TokenService<Registration>,
    pub api_keys: Arc<ApiKeys>,
    pub notifier: Option<CheckInNotifier>,
}

/// Builder for [`AppState`], so tests can swap the store and clock.
pub struct AppStateBuilder {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    attendance_ttl: Duration,
    registration_ttl: Duration,
    api_keys: ApiKeys,
    notifier: Option<CheckInNotifier>,
}

impl AppStateBuilder {
    pub fn new(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            attendance_ttl: Duration::seconds(30),
            registration_ttl: Duration::seconds(600),
            api_keys: ApiKeys::default(),
            notifier: None,
        }
    }

    pub fn attendance_ttl(mut self, ttl: Duration) -> Self {
        self.attendance_ttl = ttl;
        self
    }

    pub fn registration_ttl(mut self, ttl: Duration) -> Self {
        self.registration_ttl = ttl;
        self
    }

    pub fn api_keys(mut self, api_keys: ApiKeys) -> Self {
        self.api_keys = api_keys;
        self
    }

    pub fn notifier(mut self, notifier: Option<CheckInNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn build(self) -> AppState {
        let generator: Arc<dyn TokenGenerator> = Arc::new(RandomTokenGenerator);
        let attendance = TokenService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            Arc::clone(&generator),
            self.attendance_ttl,
        );
        let registration = TokenService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            generator,
            self.registration_ttl,
        );

        AppState {
            store: self.store,
            clock: self.clock,
            attendance,
            registration,
            api_keys: Arc::new(self.api_keys),
            notifier: self.notifier,
        }
    }
}
