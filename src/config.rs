use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// [server] section configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the review server, e.g. "https://reviews.example.com"
    #[serde(default)]
    pub url: Option<String>,
    /// Sent as `Authorization: token <api_token>`
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts for a failed fragment fetch
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Lines of context requested around changes; server default when unset
    #[serde(default)]
    pub context_lines: Option<u32>,
    #[serde(default)]
    pub show_deleted: bool,
    /// Rows kept above a selected anchor
    #[serde(default = "default_anchor_offset")]
    pub anchor_offset: usize,
    #[serde(default)]
    pub hide_whitespace_only: bool,
    #[serde(default = "default_true")]
    pub show_extra_whitespace: bool,
    #[serde(default = "default_true")]
    pub line_numbers: bool,
    #[serde(default = "default_tab_width")]
    pub tab_width: u8,
    #[serde(default = "default_index_width")]
    pub index_width: u16,
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_fetch_retries() -> u32 {
    2
}

fn default_anchor_offset() -> usize {
    3
}

fn default_tab_width() -> u8 {
    4
}

fn default_index_width() -> u16 {
    32
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_token: None,
            timeout_secs: default_timeout_secs(),
            fetch_retries: default_fetch_retries(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            context_lines: None,
            show_deleted: false,
            anchor_offset: default_anchor_offset(),
            hide_whitespace_only: false,
            show_extra_whitespace: true,
            line_numbers: true,
            tab_width: default_tab_width(),
            index_width: default_index_width(),
        }
    }
}

/// Global config file (~/.config/rbd/config.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rbd").join("config.toml"))
}

/// Load config by merging global defaults with per-directory overrides.
/// Priority: `./.rbd-config.toml` > global `~/.config/rbd/config.toml` > built-in defaults.
/// Merging is deep: individual fields within sections (e.g. `[display]`) override independently.
pub fn load_config(dir: &Path) -> ViewerConfig {
    load_config_from(global_config_path().as_deref(), &dir.join(".rbd-config.toml"))
}

/// Read one config file on its own, without merging. A missing file
/// gives the defaults; a file that exists but cannot be read or parsed is
/// an error, so callers never write defaults over it.
pub fn read_config_file(path: &Path) -> Result<ViewerConfig> {
    if !path.exists() {
        return Ok(ViewerConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
}

fn load_config_from(global_path: Option<&Path>, local_path: &Path) -> ViewerConfig {
    let global_table = global_path.and_then(read_table);
    let local_table = read_table(local_path);

    let merged = match (global_table, local_table) {
        (Some(mut global), Some(local)) => {
            deep_merge(&mut global, local);
            toml::Value::Table(global)
        }
        (Some(global), None) => toml::Value::Table(global),
        (None, Some(local)) => toml::Value::Table(local),
        (None, None) => return ViewerConfig::default(),
    };

    merged.try_into().unwrap_or_else(|e| {
        log::warn!("Ignoring invalid config: {}", e);
        ViewerConfig::default()
    })
}

fn read_table(path: &Path) -> Option<toml::map::Map<String, toml::Value>> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|c| c.parse::<toml::Value>().ok())
        .and_then(|v| match v {
            toml::Value::Table(t) => Some(t),
            _ => None,
        })
}

/// Recursively merge `overlay` into `base`. Overlay values win; nested tables are merged recursively.
fn deep_merge(
    base: &mut toml::map::Map<String, toml::Value>,
    overlay: toml::map::Map<String, toml::Value>,
) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Write `config` to `path`. The file is replaced in one rename so a
/// reader never sees a half-written config.
pub fn save_config(config: &ViewerConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config)?;
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_give_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(None, &dir.path().join("none.toml"));
        assert_eq!(config.display.anchor_offset, 3);
        assert_eq!(config.server.fetch_retries, 2);
        assert!(config.display.show_extra_whitespace);
        assert!(config.server.url.is_none());
    }

    #[test]
    fn local_fields_override_global_fields_individually() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        let local = dir.path().join("local.toml");
        std::fs::write(
            &global,
            "[server]\nurl = \"https://reviews.example.com\"\n[display]\nanchor_offset = 5\ntab_width = 8\n",
        )
        .unwrap();
        std::fs::write(&local, "[display]\ntab_width = 2\n").unwrap();

        let config = load_config_from(Some(&global), &local);
        assert_eq!(config.server.url.as_deref(), Some("https://reviews.example.com"));
        assert_eq!(config.display.anchor_offset, 5);
        assert_eq!(config.display.tab_width, 2);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("local.toml");
        std::fs::write(&local, "[display]\nanchor_offset = \"lots\"\n").unwrap();
        let config = load_config_from(None, &local);
        assert_eq!(config.display.anchor_offset, 3);
    }

    #[test]
    fn unparsable_file_is_an_error_not_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(read_config_file(&path).unwrap().display.anchor_offset, 3);

        std::fs::write(&path, "[display\nanchor_offset = 5\n").unwrap();
        assert!(read_config_file(&path).is_err());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rbd").join("config.toml");
        let mut config = ViewerConfig::default();
        config.display.show_extra_whitespace = false;
        config.server.fetch_retries = 0;
        save_config(&config, &path).unwrap();

        let loaded = load_config_from(Some(&path), &dir.path().join("absent.toml"));
        assert!(!loaded.display.show_extra_whitespace);
        assert_eq!(loaded.server.fetch_retries, 0);
    }
}
