pub mod auth;
pub mod health;
pub mod loyalty;
pub mod notification;
