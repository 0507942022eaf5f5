use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::pipeline::OutputFormat;
use crate::pipeline::engine::Engine;

/// `winocr.yaml` の設定内容。未指定の項目はデフォルト値を使う。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// oneocr.dll / oneocr.onemodel / onnxruntime.dll を含むディレクトリ
    pub library_dir: Option<PathBuf>,
    pub delayed_model_load: bool,
    pub max_line_count: Option<usize>,
    /// (width, height)
    pub resize_resolution: Option<(u32, u32)>,
    pub format: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            library_dir: None,
            delayed_model_load: true,
            max_line_count: None,
            resize_resolution: None,
            format: OutputFormat::Text,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::OcrError::config(format!("Failed to parse settings YAML: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// エンジンのオプションハンドルに設定値を反映する。
    ///
    /// `None` の項目はネイティブ側のデフォルトのまま変更しない。
    pub fn apply(&self, engine: &Engine) -> crate::error::Result<()> {
        engine.set_delayed_model_load(self.delayed_model_load)?;
        if let Some(count) = self.max_line_count {
            engine.set_max_line_count(count)?;
        }
        if let Some((width, height)) = self.resize_resolution {
            engine.set_resize_target(width, height)?;
        }
        Ok(())
    }
}
