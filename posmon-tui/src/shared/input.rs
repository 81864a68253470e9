use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Rows moved by PgUp/PgDn.
pub const PAGE_ROWS: usize = 5;

/// User intent decoded from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleDebug,
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollHome,
    ScrollEnd,
}

/// Map a key press to an [`Action`], if bound.
pub fn action_for(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('d') => Some(Action::ToggleDebug),
        KeyCode::Up | KeyCode::Char('k') => Some(Action::ScrollUp(1)),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::ScrollDown(1)),
        KeyCode::PageUp => Some(Action::ScrollUp(PAGE_ROWS)),
        KeyCode::PageDown => Some(Action::ScrollDown(PAGE_ROWS)),
        KeyCode::Home => Some(Action::ScrollHome),
        KeyCode::End => Some(Action::ScrollEnd),
        _ => None,
    }
}

/// Row offset into the position cards, clamped to `[0, max]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scroll {
    offset: usize,
    max: usize,
}

impl Scroll {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Update the largest reachable offset, pulling the current offset back within it.
    pub fn set_max(&mut self, max: usize) {
        self.max = max;
        self.offset = self.offset.min(max);
    }

    /// Apply a scroll [`Action`]. Other actions are ignored.
    pub fn apply(&mut self, action: Action) {
        self.offset = match action {
            Action::ScrollUp(rows) => self.offset.saturating_sub(rows),
            Action::ScrollDown(rows) => self.offset.saturating_add(rows).min(self.max),
            Action::ScrollHome => 0,
            Action::ScrollEnd => self.max,
            Action::Quit | Action::ToggleDebug => self.offset,
        };
    }
}
