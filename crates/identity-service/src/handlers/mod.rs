pub mod admin_handler;
pub mod auth_handler;
pub mod health;
pub mod jwks_handler;
pub mod system_handler;
