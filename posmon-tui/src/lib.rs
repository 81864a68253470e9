/// Posmon TUI - Shared Library
///
/// Presentation side of the position monitor:
/// - State reducer owning the position & balance tables
/// - Key bindings & scroll handling
/// - Terminal palette & card layout helpers
pub mod shared;

pub use shared::input::{Action, Scroll, action_for};
pub use shared::state::{BalanceTrend, MAX_DEBUG_MESSAGES, MonitorState, MonitorStatus};
pub use shared::theme::Theme;
