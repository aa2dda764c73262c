use std::env;
use std::path::PathBuf;

const DEFAULT_DB_FILE: &str = "lumina.db";
const DEFAULT_LOG_FILTER: &str = "lumina_lib=info";
const DEFAULT_COMIC_CACHE_MB: u64 = 128;

#[derive(Debug, Clone)]
pub struct Config {
    /// Where the database lives. `None` lets the desktop shell pick its app data dir.
    pub data_dir: Option<PathBuf>,
    pub db_file: String,
    pub log_filter: String,
    pub comic_cache_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            db_file: DEFAULT_DB_FILE.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            comic_cache_mb: DEFAULT_COMIC_CACHE_MB,
        }
    }
}

impl Config {
    /// Reads `LUMINA_*` variables, after loading a `.env` file if one exists.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            data_dir: lookup("LUMINA_DATA_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            db_file: lookup("LUMINA_DB_FILE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.db_file),
            log_filter: lookup("LUMINA_LOG").unwrap_or(defaults.log_filter),
            comic_cache_mb: lookup("LUMINA_COMIC_CACHE_MB")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.comic_cache_mb),
        }
    }

    /// Resolves the data directory, falling back to `./lumina-data`.
    pub fn data_dir_or(&self, fallback: Option<PathBuf>) -> PathBuf {
        self.data_dir
            .clone()
            .or(fallback)
            .unwrap_or_else(|| PathBuf::from("lumina-data"))
    }

    pub fn database_path(&self, data_dir: &std::path::Path) -> PathBuf {
        data_dir.join(&self.db_file)
    }

    /// sqlx wants the `sqlite://` prefix with forward slashes.
    pub fn database_url(&self, data_dir: &std::path::Path) -> String {
        let db_path = self.database_path(data_dir);
        let db_path_str = db_path.to_string_lossy().replace('\\', "/");
        format!("sqlite://{}?mode=rwc", db_path_str)
    }

    pub fn comic_cache_bytes(&self) -> u64 {
        self.comic_cache_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_env_is_empty() {
        let config = Config::from_lookup(|_| None);
        assert!(config.data_dir.is_none());
        assert_eq!(config.db_file, "lumina.db");
        assert_eq!(config.comic_cache_mb, 128);
    }

    #[test]
    fn test_overrides_from_env() {
        let vars: HashMap<&str, &str> = [
            ("LUMINA_DATA_DIR", "/tmp/lumina"),
            ("LUMINA_DB_FILE", "books.db"),
            ("LUMINA_COMIC_CACHE_MB", "32"),
            ("LUMINA_LOG", "debug"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/lumina")));
        assert_eq!(config.db_file, "books.db");
        assert_eq!(config.comic_cache_bytes(), 32 * 1024 * 1024);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_bad_cache_size_falls_back() {
        let config = Config::from_lookup(|k| {
            (k == "LUMINA_COMIC_CACHE_MB").then(|| "lots".to_string())
        });
        assert_eq!(config.comic_cache_mb, 128);
    }

    #[test]
    fn test_huge_cache_size_saturates() {
        let max = u64::MAX.to_string();
        let config = Config::from_lookup(|k| (k == "LUMINA_COMIC_CACHE_MB").then(|| max.clone()));
        assert_eq!(config.comic_cache_mb, u64::MAX);
        assert_eq!(config.comic_cache_bytes(), u64::MAX);
    }

    #[test]
    fn test_database_url_uses_forward_slashes() {
        let config = Config::default();
        let url = config.database_url(std::path::Path::new("C:\\Users\\me\\Lumina"));
        assert_eq!(url, "sqlite://C:/Users/me/Lumina/lumina.db?mode=rwc");
    }
}
