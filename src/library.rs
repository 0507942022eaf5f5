// Process-wide bootstrap of the native library.
//
// The library is validated, loaded and its exports resolved at most once per
// process. It is never unloaded, so the resolved function table is usable as
// `&'static OcrApi` everywhere else in the crate.

use std::path::{Path, PathBuf};

use libloading::Library;
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{OcrError, Result};
use crate::ffi::oneocr_sys::OcrApi;

/// Native engine library.
pub const LIBRARY_FILE: &str = "oneocr.dll";
/// Model data consumed by `CreateOcrPipeline`.
pub const MODEL_FILE: &str = "oneocr.onemodel";
/// Inference runtime the engine library links against.
pub const RUNTIME_FILE: &str = "onnxruntime.dll";

/// Files that must be present in the library directory, in check order.
pub const REQUIRED_FILES: [&str; 3] = [LIBRARY_FILE, MODEL_FILE, RUNTIME_FILE];

/// Environment variable consulted by [`resolve_library_dir`].
pub const LIBRARY_DIR_ENV: &str = "WINOCR_LIBRARY_DIR";

/// A resolved function table and whatever keeps its exports mapped.
struct Loaded<L> {
    dir: PathBuf,
    api: OcrApi,
    _library: L,
}

type NativeLibrary = Loaded<Library>;

static NATIVE: OnceCell<NativeLibrary> = OnceCell::new();

/// Checks that every file in [`REQUIRED_FILES`] exists in `dir`.
///
/// # Errors
/// `MissingDependency` naming the first missing file.
pub fn validate_library_dir(dir: &Path) -> Result<()> {
    for file in REQUIRED_FILES {
        if !dir.join(file).is_file() {
            return Err(OcrError::MissingDependency {
                file: file.to_string(),
            });
        }
    }
    Ok(())
}

/// Validates `dir` and loads the native library from it.
///
/// The load happens at most once per process. Concurrent first calls block
/// until the single load has finished and all observe its outcome. Once a
/// load has succeeded, later calls still validate their own `dir` but do not
/// load again, and [`library_dir`] keeps reporting the first directory.
///
/// A failed load leaves nothing loaded; the caller may try another directory.
pub fn configure_library(dir: impl AsRef<Path>) -> Result<()> {
    configure_in(&NATIVE, dir.as_ref(), load).map(|_| ())
}

/// Validates `dir`, then runs `load` unless `cell` is already filled.
fn configure_in<'c, L>(
    cell: &'c OnceCell<Loaded<L>>,
    dir: &Path,
    load: impl FnOnce(&Path) -> Result<Loaded<L>>,
) -> Result<&'c Loaded<L>> {
    validate_library_dir(dir)?;

    let loaded = cell.get_or_try_init(|| load(dir))?;
    if loaded.dir != dir {
        debug!(
            "native library already loaded from {}; ignoring {}",
            loaded.dir.display(),
            dir.display()
        );
    }
    Ok(loaded)
}

fn loaded_dir<L>(cell: &OnceCell<Loaded<L>>) -> Option<PathBuf> {
    cell.get().map(|n| n.dir.clone())
}

fn load(dir: &Path) -> Result<NativeLibrary> {
    let path = dir.join(LIBRARY_FILE);
    let load_failed = |reason: String| OcrError::LoadFailed {
        path: path.clone(),
        reason,
    };

    let library = unsafe { open(&path) }.map_err(|e| load_failed(e.to_string()))?;
    let api = unsafe { OcrApi::resolve(&library) }
        .map_err(|e| load_failed(format!("missing export: {e}")))?;

    info!("loaded native OCR library from {}", dir.display());
    Ok(Loaded {
        dir: dir.to_path_buf(),
        api,
        _library: library,
    })
}

/// Loads the library so that its dependent DLLs resolve from its own
/// directory first.
#[cfg(windows)]
unsafe fn open(path: &Path) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::windows::{LOAD_WITH_ALTERED_SEARCH_PATH, Library as WinLibrary};
    let lib = unsafe { WinLibrary::load_with_flags(path, LOAD_WITH_ALTERED_SEARCH_PATH) }?;
    Ok(lib.into())
}

#[cfg(not(windows))]
unsafe fn open(path: &Path) -> std::result::Result<Library, libloading::Error> {
    unsafe { Library::new(path) }
}

/// Directory the native library was loaded from, if it has been loaded.
pub fn library_dir() -> Option<PathBuf> {
    loaded_dir(&NATIVE)
}

pub fn is_loaded() -> bool {
    NATIVE.get().is_some()
}

/// Path to the model file inside the active library directory.
pub fn model_path() -> Option<PathBuf> {
    NATIVE.get().map(|n| n.dir.join(MODEL_FILE))
}

/// Function table of the loaded library.
pub(crate) fn api() -> Result<&'static OcrApi> {
    NATIVE.get().map(|n| &n.api).ok_or(OcrError::NotConfigured)
}

/// Picks the library directory to use.
///
/// Search order:
/// 1. `explicit`, when given
/// 2. the `WINOCR_LIBRARY_DIR` environment variable
/// 3. the current directory
pub fn resolve_library_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Some(dir) = std::env::var_os(LIBRARY_DIR_ENV) {
        return PathBuf::from(dir);
    }
    PathBuf::from(".")
}
