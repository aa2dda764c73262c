use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::commands::unix_now;
use crate::error::Result;

const SETTINGS_ID: &str = "global";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingTheme {
    #[default]
    Dark,
    Light,
    Sepia,
    Custom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingDirection {
    #[default]
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageLayoutMode {
    #[default]
    Single,
    Double,
    Continuous,
}

/// Reader appearance and layout. Missing fields read as their defaults, so
/// documents written by older builds still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub theme: ReadingTheme,
    pub custom_theme_background: String,
    pub custom_theme_text: String,
    pub font_size: u32,
    pub font_family: String,
    pub custom_font_family: String,
    pub line_height: f64,
    pub margins: u32,
    pub reading_direction: ReadingDirection,
    pub comic_mode: PageLayoutMode,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            theme: ReadingTheme::Dark,
            custom_theme_background: "#121212".to_string(),
            custom_theme_text: "#f5f5f5".to_string(),
            font_size: 18,
            font_family: "serif".to_string(),
            custom_font_family: r#""Literata", "Times New Roman", serif"#.to_string(),
            line_height: 1.6,
            margins: 40,
            reading_direction: ReadingDirection::Ltr,
            comic_mode: PageLayoutMode::Single,
        }
    }
}

pub async fn load_settings(pool: &SqlitePool) -> Result<ReaderSettings> {
    let stored: Option<String> = sqlx::query_scalar("SELECT data FROM settings WHERE id = ?")
        .bind(SETTINGS_ID)
        .fetch_optional(pool)
        .await?;

    let Some(data) = stored else {
        return Ok(ReaderSettings::default());
    };
    match serde_json::from_str(&data) {
        Ok(settings) => Ok(settings),
        Err(e) => {
            tracing::warn!(error = %e, "unreadable reader settings, using defaults");
            Ok(ReaderSettings::default())
        }
    }
}

pub async fn save_settings(pool: &SqlitePool, settings: &ReaderSettings) -> Result<ReaderSettings> {
    sqlx::query(
        "INSERT INTO settings (id, data, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
    )
    .bind(SETTINGS_ID)
    .bind(Json(settings))
    .bind(unix_now())
    .execute(pool)
    .await?;
    Ok(settings.clone())
}

pub async fn reset_settings(pool: &SqlitePool) -> Result<ReaderSettings> {
    save_settings(pool, &ReaderSettings::default()).await
}
