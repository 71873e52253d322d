pub mod auth;

pub use auth::{client_auth_middleware, session_auth_middleware};
