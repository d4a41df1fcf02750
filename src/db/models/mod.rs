pub mod ledger;
pub mod loyalty;
pub mod notification;
pub mod user;
