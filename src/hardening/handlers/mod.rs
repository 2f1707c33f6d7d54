pub mod authentication;
pub mod backend;
pub mod health;
