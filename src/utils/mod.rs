pub mod logger;
pub mod platform;
pub mod terminal_control;
