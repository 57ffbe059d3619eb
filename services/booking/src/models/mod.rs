//! Booking service models

pub mod audit;
pub mod reservation;
pub mod settings;
pub mod trade;
pub mod user;

// Re-export for convenience
pub use audit::{AuditAction, AuditLogEntry};
pub use reservation::{NewReservation, Reservation, ReservationKind, ReservationStatus};
pub use settings::{CalendarConfig, PrimeTimeWindow};
pub use trade::{NewTrade, TradeRequest, TradeStatus};
pub use user::{User, UserRole};
