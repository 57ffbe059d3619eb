//! Database repositories for the authentication service

pub mod blacklist;
pub mod user;

pub use blacklist::BlacklistRepository;
pub use user::UserRepository;
