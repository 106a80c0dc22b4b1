pub mod health;
pub mod sessions;
