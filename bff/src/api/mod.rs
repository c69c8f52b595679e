pub mod data;
pub mod event;
pub mod health;
pub mod passthrough;
pub mod user;
pub mod utils;
