use serde::{Deserialize, Serialize};

/// Which of the four bundled stylesheets a rewritten article should load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Standard,
    Night,
    Amoled,
    AmoledInvert,
}

impl Theme {
    pub fn stylesheet(self) -> &'static str {
        match self {
            Theme::Standard => "style.css",
            Theme::Night => "night.css",
            Theme::Amoled => "amoled.css",
            Theme::AmoledInvert => "amoled_invert.css",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub night_mode: bool,
    pub amoled_mode: bool,
    pub invert_colors: bool,
    pub offline_mode: bool,
    /// Root of the offline store. Defaults to `<app data dir>/offline`.
    pub offline_path: Option<String>,
    pub mouse_support: bool,
}

impl Settings {
    /// AMOLED wins over night mode; invert only differentiates AMOLED.
    pub fn theme(&self) -> Theme {
        if self.amoled_mode {
            if self.invert_colors {
                Theme::AmoledInvert
            } else {
                Theme::Amoled
            }
        } else if self.night_mode {
            Theme::Night
        } else {
            Theme::Standard
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            night_mode: false,
            amoled_mode: false,
            invert_colors: false,
            offline_mode: false,
            offline_path: None,
            mouse_support: false,
        }
    }
}
