//! Database repositories for the booking service

pub mod audit;
pub mod reservation;
pub mod settings;
pub mod trade;
pub mod user;

pub use audit::AuditRepository;
pub use reservation::ReservationRepository;
pub use settings::SettingsRepository;
pub use trade::TradeRepository;
pub use user::UserRepository;
