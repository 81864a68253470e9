use crate::shared::state::BalanceTrend;
use ratatui::style::{Color, Modifier, Style};

/// Width of a single position card, borders included.
pub const CARD_WIDTH: u16 = 24;

/// Horizontal space reserved per card, gap included.
pub const CARD_SLOT: u16 = 26;

pub const MAX_CARDS_PER_ROW: u16 = 8;

/// Height of a single position card, borders included.
pub const CARD_HEIGHT: u16 = 9;

/// Number of cards laid out per row for a terminal `width`, between 1 and
/// [`MAX_CARDS_PER_ROW`].
pub fn cards_per_row(width: u16) -> u16 {
    (width / CARD_SLOT).clamp(1, MAX_CARDS_PER_ROW)
}

/// Decimal places used to render a price: five below `0.001`, otherwise two.
pub fn format_price(price: f64) -> String {
    if price < 0.001 {
        format!("{price:.5}")
    } else {
        format!("{price:.2}")
    }
}

/// Render a signed value with an explicit `+` for non-negative values.
pub fn format_signed(value: f64, precision: usize) -> String {
    if value >= 0.0 {
        format!("+{value:.precision$}")
    } else {
        format!("{value:.precision$}")
    }
}

/// Terminal palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub title: Style,
    pub card_border: Style,
    pub instrument: Style,
    pub label: Style,
    pub value: Style,
    pub muted: Style,
    pub profit: Style,
    pub loss: Style,
    pub neutral: Style,
    pub warning: Style,
    pub debug_border: Style,
    pub error: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title: Style::default()
                .fg(Color::Indexed(86))
                .add_modifier(Modifier::BOLD),
            card_border: Style::default().fg(Color::Indexed(62)),
            instrument: Style::default()
                .fg(Color::Indexed(39))
                .add_modifier(Modifier::BOLD),
            label: Style::default().fg(Color::Indexed(245)),
            value: Style::default().fg(Color::Indexed(255)),
            muted: Style::default().fg(Color::Indexed(241)),
            profit: Style::default()
                .fg(Color::Indexed(46))
                .add_modifier(Modifier::BOLD),
            loss: Style::default()
                .fg(Color::Indexed(196))
                .add_modifier(Modifier::BOLD),
            neutral: Style::default().fg(Color::Indexed(243)),
            warning: Style::default().fg(Color::Indexed(214)),
            debug_border: Style::default().fg(Color::Indexed(238)),
            error: Style::default()
                .fg(Color::Indexed(196))
                .add_modifier(Modifier::BOLD),
        }
    }
}

impl Theme {
    /// Style for a PnL figure: profit when positive, loss when negative.
    pub fn pnl_style(&self, pnl: f64) -> Style {
        if pnl > 0.0 {
            self.profit
        } else if pnl < 0.0 {
            self.loss
        } else {
            self.neutral
        }
    }

    pub fn trend_style(&self, trend: BalanceTrend) -> Style {
        match trend {
            BalanceTrend::Up => self.profit,
            BalanceTrend::Down => self.loss,
            BalanceTrend::Flat | BalanceTrend::Initial => self.value,
        }
    }

    pub fn side_style(&self, is_long: bool) -> Style {
        if is_long { self.profit } else { self.loss }
    }
}
