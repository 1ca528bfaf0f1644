pub mod analyzer_service;
pub mod app_state;
