//! UI layer for the desktop shell: app shell, theme, and overlay content.

pub mod app;
pub mod overlays;
pub mod theme;
