pub mod rest;
pub mod session;

pub use rest::RestGateway;
pub use session::{AnonymousSession, SessionStore};
