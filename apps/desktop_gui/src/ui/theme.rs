//! Theme presets and the persisted desktop settings blob.

use eframe::egui;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemePreset {
    SlateDark,
    Paper,
}

impl ThemePreset {
    pub fn label(self) -> &'static str {
        match self {
            Self::SlateDark => "Slate dark",
            Self::Paper => "Paper light",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemeSettings {
    pub preset: ThemePreset,
    pub accent: egui::Color32,
}

impl ThemeSettings {
    pub fn slate_default() -> Self {
        Self {
            preset: ThemePreset::SlateDark,
            accent: egui::Color32::from_rgb(88, 129, 255),
        }
    }
}

pub fn visuals_for_theme(theme: ThemeSettings) -> egui::Visuals {
    let mut visuals = match theme.preset {
        ThemePreset::SlateDark => egui::Visuals::dark(),
        ThemePreset::Paper => egui::Visuals::light(),
    };
    visuals.selection.bg_fill = theme.accent.gamma_multiply(0.55);
    visuals.hyperlink_color = theme.accent;
    if theme.preset == ThemePreset::SlateDark {
        visuals.panel_fill = egui::Color32::from_rgb(28, 30, 38);
        visuals.window_fill = egui::Color32::from_rgb(34, 36, 44);
    }
    visuals
}

/// Settings surviving restarts via eframe storage. Overlay state is
/// deliberately not part of this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedDesktopSettings {
    theme_preset: ThemePreset,
    accent_rgb: [u8; 3],
}

impl PersistedDesktopSettings {
    pub fn from_runtime(theme: ThemeSettings) -> Self {
        Self {
            theme_preset: theme.preset,
            accent_rgb: [theme.accent.r(), theme.accent.g(), theme.accent.b()],
        }
    }

    pub fn into_runtime(self) -> ThemeSettings {
        let [r, g, b] = self.accent_rgb;
        ThemeSettings {
            preset: self.theme_preset,
            accent: egui::Color32::from_rgb(r, g, b),
        }
    }
}

impl Default for PersistedDesktopSettings {
    fn default() -> Self {
        Self::from_runtime(ThemeSettings::slate_default())
    }
}
