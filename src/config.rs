use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::anchor::DuplicatePolicy;

const LOCAL_CONFIG: &str = ".review-anchor.toml";
const APP_DIR: &str = "review-anchor";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default)]
    pub anchor: AnchorConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// [anchor] section configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// When a line number shows up in several hunks, prefer the hunk the
    /// comment was written against over the first one in the view
    #[serde(default = "default_true")]
    pub prefer_same_hunk: bool,
}

/// [layout] section configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Rendered lines above the thread block (PR title, branch info, ...)
    #[serde(default)]
    pub header_lines: usize,
    /// Blank separator between the thread block and the diff
    #[serde(default = "default_true")]
    pub blank_after_threads: bool,
}

/// [watch] section configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

impl AnchorConfig {
    pub fn policy(&self) -> DuplicatePolicy {
        if self.prefer_same_hunk {
            DuplicatePolicy::PreferSameHunk
        } else {
            DuplicatePolicy::FirstMatch
        }
    }
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            prefer_same_hunk: true,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            header_lines: 0,
            blank_after_threads: true,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Load config by merging global defaults with per-directory overrides.
/// Priority: `<dir>/.review-anchor.toml` > `~/.config/review-anchor/config.toml` > built-in defaults.
/// Merging is deep: individual fields within sections (e.g. `[layout]`) override independently.
pub fn load_config(dir: &Path) -> ReviewConfig {
    let global_path = dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"));
    let global_table = global_path.as_deref().and_then(read_table);
    let local_table = read_table(&dir.join(LOCAL_CONFIG));
    merge_tables(global_table, local_table)
}

fn read_table(path: &Path) -> Option<toml::Table> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<toml::Table>(&content) {
        Ok(t) => Some(t),
        Err(e) => {
            log::warn!("Ignoring invalid config {}: {}", path.display(), e);
            None
        }
    }
}

fn merge_tables(global: Option<toml::Table>, local: Option<toml::Table>) -> ReviewConfig {
    let merged = match (global, local) {
        (Some(mut global), Some(local)) => {
            deep_merge(&mut global, local);
            toml::Value::Table(global)
        }
        (Some(global), None) => toml::Value::Table(global),
        (None, Some(local)) => toml::Value::Table(local),
        (None, None) => return ReviewConfig::default(),
    };

    merged.try_into().unwrap_or_else(|e| {
        log::warn!("Config has the wrong shape, using defaults: {}", e);
        ReviewConfig::default()
    })
}

/// Recursively merge `overlay` into `base`. Overlay values win; nested tables are merged recursively.
fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
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

/// Save config to the global config dir (~/.config/review-anchor/config.toml).
pub fn save_config(config: &ReviewConfig) -> Result<()> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join(APP_DIR);
    save_config_to(config, &dir.join("config.toml"))
}

fn save_config_to(config: &ReviewConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
