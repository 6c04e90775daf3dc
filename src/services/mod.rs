pub mod auth_service;
pub mod directory_service;
pub mod projection;
pub mod user_service;
