/// Shared modules for the position monitor
pub mod input;
pub mod state;
pub mod theme;
