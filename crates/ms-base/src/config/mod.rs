//! YAML configuration loader for prompts and colour themes.
use std::collections::HashMap;
use std::sync::{LazyLock, OnceLock};

use serde::Deserialize;

pub mod constants;

// ============================================================================
// Prompts Configuration
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PromptsConfig {
    /// Instruction sent alongside the uploaded document
    pub analysis: String,
    /// Handwriting instruction; `{answer}` is replaced with the answer text
    pub handwriting: String,
}

impl PromptsConfig {
    pub fn handwriting_for(&self, answer: &str) -> String {
        self.handwriting.replace("{answer}", answer)
    }
}

// ============================================================================
// Theme Configuration
// ============================================================================

/// RGB color as [r, g, b] array
pub type RgbColor = [u8; 3];

#[derive(Debug, Deserialize, Clone)]
pub struct ThemeColors {
    pub accent: RgbColor,
    pub accent_dim: RgbColor,
    pub success: RgbColor,
    pub warning: RgbColor,
    pub error: RgbColor,
    pub text: RgbColor,
    pub text_secondary: RgbColor,
    pub text_muted: RgbColor,
    pub bg_base: RgbColor,
    pub bg_surface: RgbColor,
    pub border: RgbColor,
    pub math: RgbColor,
    pub code: RgbColor,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Theme {
    pub name: String,
    pub description: String,
    pub colors: ThemeColors,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThemesConfig {
    pub themes: HashMap<String, Theme>,
}

/// Default theme ID
pub const DEFAULT_THEME: &str = "slate";

/// Available theme IDs in display order
pub const THEME_ORDER: &[&str] = &["slate", "paper", "chalkboard"];

// ============================================================================
// Loading Functions
// ============================================================================

fn parse_yaml<T: for<'de> Deserialize<'de>>(name: &str, content: &str) -> T {
    serde_yaml::from_str(content).unwrap_or_else(|e| panic!("Failed to parse {}: {}", name, e))
}

// ============================================================================
// Global Configuration (embedded at compile time)
// ============================================================================

pub static PROMPTS: LazyLock<PromptsConfig> =
    LazyLock::new(|| parse_yaml("prompts.yaml", include_str!("../../../../yamls/prompts.yaml")));
pub static THEMES: LazyLock<ThemesConfig> =
    LazyLock::new(|| parse_yaml("themes.yaml", include_str!("../../../../yamls/themes.yaml")));

/// Get a theme by ID, falling back to default if not found
pub fn get_theme(theme_id: &str) -> &'static Theme {
    THEMES.themes.get(theme_id).or_else(|| THEMES.themes.get(DEFAULT_THEME)).expect("Default theme must exist")
}

static ACTIVE_THEME: OnceLock<&'static Theme> = OnceLock::new();

/// Select the theme for this process. Only the first call has an effect.
pub fn set_active_theme(theme_id: &str) {
    if ACTIVE_THEME.set(get_theme(theme_id)).is_err() {
        tracing::debug!(theme_id, "active theme already set, ignoring");
    }
}

pub fn active_theme() -> &'static Theme {
    ACTIVE_THEME.get_or_init(|| get_theme(DEFAULT_THEME))
}

// =============================================================================
// THEME COLORS
// =============================================================================

pub mod theme {
    use crate::config::active_theme;
    use ratatui::style::Color;

    fn rgb(c: [u8; 3]) -> Color {
        Color::Rgb(c[0], c[1], c[2])
    }

    pub fn accent() -> Color {
        rgb(active_theme().colors.accent)
    }
    pub fn accent_dim() -> Color {
        rgb(active_theme().colors.accent_dim)
    }
    pub fn success() -> Color {
        rgb(active_theme().colors.success)
    }
    pub fn warning() -> Color {
        rgb(active_theme().colors.warning)
    }
    pub fn error() -> Color {
        rgb(active_theme().colors.error)
    }
    pub fn text() -> Color {
        rgb(active_theme().colors.text)
    }
    pub fn text_secondary() -> Color {
        rgb(active_theme().colors.text_secondary)
    }
    pub fn text_muted() -> Color {
        rgb(active_theme().colors.text_muted)
    }
    pub fn bg_base() -> Color {
        rgb(active_theme().colors.bg_base)
    }
    pub fn bg_surface() -> Color {
        rgb(active_theme().colors.bg_surface)
    }
    pub fn border() -> Color {
        rgb(active_theme().colors.border)
    }
    pub fn math() -> Color {
        rgb(active_theme().colors.math)
    }
    pub fn code() -> Color {
        rgb(active_theme().colors.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_yamls_parse() {
        assert!(PROMPTS.analysis.contains("step-by-step"));
        assert!(PROMPTS.handwriting.contains("{answer}"));
        for id in THEME_ORDER {
            assert!(THEMES.themes.contains_key(*id), "missing theme {}", id);
        }
    }

    #[test]
    fn handwriting_prompt_embeds_answer() {
        let prompt = PROMPTS.handwriting_for("x = 4");
        assert!(prompt.ends_with("x = 4"));
        assert!(!prompt.contains("{answer}"));
    }

    #[test]
    fn unknown_theme_falls_back_to_default() {
        assert_eq!(get_theme("does-not-exist").name, get_theme(DEFAULT_THEME).name);
    }
}
