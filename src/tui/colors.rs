//! Color constants for the terminal user interface.

use ratatui::style::Color;

/// Header, status bar and the focused form field
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Expired cards, delete confirmation and alerts
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
/// Subtask cards
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
/// Text drawn on a GOLD background
pub const INK: Color = Color::Rgb(20, 20, 20);
