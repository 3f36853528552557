use anyhow::Context;
use branchmap_core::{runtime_sock_path, LayoutConfig, MapConfig, ViewportConfig, DEFAULT_MODEL};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Map geometry knobs exposed in `[layout]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSection {
    pub sibling_gap: i32,
    pub column_gap: i32,
    pub node_width: i32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub pan_inset: f32,
    pub animation_ms: u64,
}

impl Default for LayoutSection {
    fn default() -> Self {
        let layout = LayoutConfig::default();
        let viewport = ViewportConfig::default();
        Self {
            sibling_gap: layout.sibling_gap,
            column_gap: layout.column_gap,
            node_width: layout.node_width,
            min_scale: viewport.min_scale,
            max_scale: viewport.max_scale,
            pan_inset: viewport.pan_inset,
            animation_ms: viewport.animation_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Selected generation model; persisted whenever the selector changes.
    pub model: String,
    pub models: Vec<String>,
    pub socket: String,
    pub layout: LayoutSection,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            models: vec![
                DEFAULT_MODEL.to_string(),
                "gemini-1.5-flash".to_string(),
                "gemini-1.5-pro".to_string(),
            ],
            socket: runtime_sock_path(),
            layout: LayoutSection::default(),
        }
    }
}

impl ViewerConfig {
    pub fn map_config(&self) -> MapConfig {
        let l = &self.layout;
        let min_scale = l.min_scale.max(0.05);
        MapConfig {
            layout: LayoutConfig {
                sibling_gap: l.sibling_gap.max(1),
                column_gap: l.column_gap.max(1),
                node_width: l.node_width.max(120),
                ..LayoutConfig::default()
            },
            viewport: ViewportConfig {
                min_scale,
                max_scale: l.max_scale.max(min_scale),
                pan_inset: l.pan_inset,
                animation_ms: l.animation_ms,
                ..ViewportConfig::default()
            },
            model: self.model.clone(),
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "branchmap")?;
    Some(proj.config_dir().join("viewer.toml"))
}

pub fn load_or_default() -> ViewerConfig {
    let Some(path) = config_file_path() else {
        return ViewerConfig::default();
    };
    load_or_default_from_path(&path)
}

fn load_or_default_from_path(path: &Path) -> ViewerConfig {
    let Ok(contents) = fs::read_to_string(path) else {
        return ViewerConfig::default();
    };
    toml::from_str(&contents).unwrap_or_else(|_| ViewerConfig::default())
}

pub fn save(cfg: &ViewerConfig) -> anyhow::Result<()> {
    let Some(path) = config_file_path() else {
        return Err(anyhow::anyhow!("no config directory available"));
    };
    save_to_path(cfg, &path)
}

fn save_to_path(cfg: &ViewerConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let data = toml::to_string_pretty(cfg).context("failed to serialize viewer config")?;
    fs::write(path, data)
        .with_context(|| format!("failed to write viewer config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn viewer_config_roundtrip_save_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("viewer.toml");
        let cfg = ViewerConfig {
            model: "gemini-1.5-pro".to_string(),
            ..ViewerConfig::default()
        };

        save_to_path(&cfg, &path).expect("save config");
        let loaded = load_or_default_from_path(&path);

        assert_eq!(cfg, loaded);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("viewer.toml");
        fs::write(&path, "model = \"gemini-1.5-flash\"\n[layout]\ncolumn_gap = 60\n").expect("write");

        let cfg = load_or_default_from_path(&path);

        assert_eq!(cfg.model, "gemini-1.5-flash");
        assert_eq!(cfg.layout.column_gap, 60);
        assert_eq!(cfg.layout.sibling_gap, 20);
        assert_eq!(cfg.map_config().layout.column_gap, 60);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("viewer.toml");
        fs::write(&path, "model = [").expect("write");
        assert_eq!(load_or_default_from_path(&path), ViewerConfig::default());
    }

    #[test]
    fn map_config_clamps_degenerate_values() {
        let mut cfg = ViewerConfig::default();
        cfg.layout.min_scale = 2.0;
        cfg.layout.max_scale = 0.5;
        cfg.layout.sibling_gap = 0;
        let map = cfg.map_config();
        assert_eq!(map.viewport.max_scale, 2.0);
        assert_eq!(map.layout.sibling_gap, 1);
        assert_eq!(map.model, DEFAULT_MODEL);
    }
}
