pub mod settings;

use settings::Settings;
use std::path::Path;

/// 既定の設定ファイル名（カレントディレクトリから探す）
pub const DEFAULT_SETTINGS_FILE: &str = "winocr.yaml";

/// 設定ファイルを読み込む。
///
/// `path` が指定されていればそのファイルを読み込む（存在しなければエラー）。
/// 指定がなければカレントディレクトリの `winocr.yaml` を探し、
/// 存在しなければデフォルト設定を返す。
pub fn load_settings(path: Option<&Path>) -> crate::error::Result<Settings> {
    if let Some(path) = path {
        return Settings::from_file(path);
    }

    let default_path = Path::new(DEFAULT_SETTINGS_FILE);
    if default_path.exists() {
        Settings::from_file(default_path)
    } else {
        Ok(Settings::default())
    }
}
