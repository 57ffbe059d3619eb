//! Application state shared across handlers

use crate::ledger::ReservationLedger;
use crate::middleware::AccessTokenVerifier;
use crate::repositories::{AuditRepository, SettingsRepository, UserRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: ReservationLedger,
    pub users: UserRepository,
    pub settings: SettingsRepository,
    pub audit: AuditRepository,
    pub verifier: AccessTokenVerifier,
}
