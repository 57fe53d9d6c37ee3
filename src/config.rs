use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "ViewportConfig::default_frustum_size")]
    pub frustum_size: f32,
    #[serde(default = "ViewportConfig::default_near")]
    pub near: f32,
    #[serde(default = "ViewportConfig::default_far")]
    pub far: f32,
    #[serde(default = "ViewportConfig::default_ortho_zoom")]
    pub ortho_zoom: f32,
    #[serde(default = "ViewportConfig::default_width")]
    pub width: u32,
    #[serde(default = "ViewportConfig::default_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PickerConfig {
    #[serde(default = "PickerConfig::default_threshold")]
    pub line_threshold: f32,
    #[serde(default = "PickerConfig::default_threshold")]
    pub points_threshold: f32,
    #[serde(default = "PickerConfig::default_variable_line_threshold")]
    pub variable_line_threshold: f32,
    #[serde(default = "PickerConfig::default_variable_points_threshold")]
    pub variable_points_threshold: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutlineConfig {
    #[serde(default = "OutlineConfig::default_selection_color")]
    pub selection_color: u32,
    #[serde(default = "OutlineConfig::default_hover_color")]
    pub hover_color: u32,
    #[serde(default = "OutlineConfig::default_edge_strength")]
    pub edge_strength: f32,
    #[serde(default = "OutlineConfig::default_edge_thickness")]
    pub edge_thickness: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeymapConfig {
    #[serde(default = "KeymapConfig::default_quasimode")]
    pub quasimode: String,
    #[serde(default = "KeymapConfig::default_add_variable")]
    pub add_variable: String,
    #[serde(default = "KeymapConfig::default_toggle_mode")]
    pub toggle_mode: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IoConfig {
    #[serde(default = "IoConfig::default_native_extension")]
    pub native_extension: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ModelerConfig {
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub picker: PickerConfig,
    #[serde(default)]
    pub outline: OutlineConfig,
    #[serde(default)]
    pub keymap: KeymapConfig,
    #[serde(default)]
    pub io: IoConfig,
}

#[derive(Debug, Clone, Default)]
pub struct ModelerConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ViewportConfig {
    const fn default_frustum_size() -> f32 {
        20.0
    }

    const fn default_near() -> f32 {
        0.01
    }

    const fn default_far() -> f32 {
        10_000.0
    }

    const fn default_ortho_zoom() -> f32 {
        3.0
    }

    const fn default_width() -> u32 {
        1280
    }

    const fn default_height() -> u32 {
        720
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            frustum_size: Self::default_frustum_size(),
            near: Self::default_near(),
            far: Self::default_far(),
            ortho_zoom: Self::default_ortho_zoom(),
            width: Self::default_width(),
            height: Self::default_height(),
        }
    }
}

impl PickerConfig {
    const fn default_threshold() -> f32 {
        0.1
    }

    const fn default_variable_line_threshold() -> f32 {
        0.3
    }

    const fn default_variable_points_threshold() -> f32 {
        0.05
    }
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            line_threshold: Self::default_threshold(),
            points_threshold: Self::default_threshold(),
            variable_line_threshold: Self::default_variable_line_threshold(),
            variable_points_threshold: Self::default_variable_points_threshold(),
        }
    }
}

impl OutlineConfig {
    const fn default_selection_color() -> u32 {
        0xffff00
    }

    const fn default_hover_color() -> u32 {
        0xffffff
    }

    const fn default_edge_strength() -> f32 {
        3.0
    }

    const fn default_edge_thickness() -> f32 {
        1.0
    }
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            selection_color: Self::default_selection_color(),
            hover_color: Self::default_hover_color(),
            edge_strength: Self::default_edge_strength(),
            edge_thickness: Self::default_edge_thickness(),
        }
    }
}

impl KeymapConfig {
    fn default_quasimode() -> String {
        "ctrl".to_string()
    }

    fn default_add_variable() -> String {
        "a".to_string()
    }

    fn default_toggle_mode() -> String {
        "t".to_string()
    }
}

impl Default for KeymapConfig {
    fn default() -> Self {
        Self {
            quasimode: Self::default_quasimode(),
            add_variable: Self::default_add_variable(),
            toggle_mode: Self::default_toggle_mode(),
        }
    }
}

impl IoConfig {
    fn default_native_extension() -> String {
        "kmodel".to_string()
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self { native_extension: Self::default_native_extension() }
    }
}

impl ModelerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "config load failed; falling back to defaults");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ModelerConfigOverrides) {
        if let Some(width) = overrides.width {
            self.viewport.width = width;
        }
        if let Some(height) = overrides.height {
            self.viewport.height = height;
        }
    }
}

impl ModelerConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.width.is_some() {
            fields.push("width");
        }
        if self.height.is_some() {
            fields.push("height");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "picker": {{ "line_threshold": 0.25 }}, "keymap": {{ "quasimode": "shift" }} }}"#)
            .expect("write config");
        let cfg = ModelerConfig::load(file.path()).expect("load config");
        assert_eq!(cfg.picker.line_threshold, 0.25);
        assert_eq!(cfg.picker.points_threshold, 0.1);
        assert_eq!(cfg.keymap.quasimode, "shift");
        assert_eq!(cfg.keymap.add_variable, "a");
        assert_eq!(cfg.viewport.ortho_zoom, 3.0);
        assert_eq!(cfg.io.native_extension, "kmodel");
    }

    #[test]
    fn overrides_report_applied_fields() {
        let mut cfg = ModelerConfig::default();
        let overrides = ModelerConfigOverrides { width: Some(640), height: None };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.viewport.width, 640);
        assert_eq!(cfg.viewport.height, 720);
        assert_eq!(overrides.applied_fields(), vec!["width"]);
    }

    #[test]
    fn unreadable_config_uses_defaults() {
        let cfg = ModelerConfig::load_or_default("/nonexistent/modeler.json");
        assert_eq!(cfg.viewport.width, 1280);
    }
}
