// Engine: owns the option handles and drives one recognition per call.
//
// Per request: create pipeline -> run -> extract -> release result ->
// release pipeline. The whole sequence runs under the engine's lock, so one
// engine never has two pipelines alive at once.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use image::{DynamicImage, RgbaImage};
use tracing::{debug, info};

use super::OutputFormat;
use super::extract::extract_result;
use crate::error::{OcrError, Result};
use crate::ffi::handle::{InitOptions, Pipeline, ProcessOptions};
use crate::ffi::oneocr_sys::OcrApi;
use crate::library;
use crate::marshal::ImageDescriptor;
use crate::model::OcrResult;

/// Access key the engine requires to open its model file.
pub const MODEL_KEY: &str = r#"kj)TGtrK>f]b[Piow.gU+nC@s""""""4"#;

/// Option handles owned by one engine. Field order is release order.
struct EngineOptions {
    process: ProcessOptions<'static>,
    init: InitOptions<'static>,
}

/// A recognition engine with its own native option handles.
///
/// Calls on one engine are serialized. For parallel recognition create one
/// engine per worker thread; engines share no mutable native state.
pub struct Engine {
    api: &'static OcrApi,
    model_path: PathBuf,
    options: Mutex<Option<EngineOptions>>,
}

impl Engine {
    /// Create an engine backed by the library loaded with
    /// [`crate::configure_library`].
    ///
    /// # Errors
    /// `NotConfigured` if no library has been loaded yet, `NativeCallFailed`
    /// if the option handles cannot be created.
    pub fn new() -> Result<Self> {
        let api = library::api()?;
        let model_path = library::model_path().ok_or(OcrError::NotConfigured)?;
        Self::with_api(api, model_path)
    }

    pub(crate) fn with_api(api: &'static OcrApi, model_path: PathBuf) -> Result<Self> {
        let init = InitOptions::create(api)?;
        // `init` is released by its guard if this fails.
        let process = ProcessOptions::create(api)?;
        debug!("OCR engine created (model: {})", model_path.display());
        Ok(Engine {
            api,
            model_path,
            options: Mutex::new(Some(EngineOptions { process, init })),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn lock(&self) -> MutexGuard<'_, Option<EngineOptions>> {
        // The guarded value is only handles; a panic elsewhere cannot leave
        // it half-updated.
        self.options.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_options<R>(&self, f: impl FnOnce(&mut EngineOptions) -> Result<R>) -> Result<R> {
        let mut guard = self.lock();
        let options = guard.as_mut().ok_or(OcrError::EngineClosed)?;
        f(options)
    }

    /// Defer loading the model until the first pipeline needs it.
    pub fn set_delayed_model_load(&self, enable: bool) -> Result<()> {
        self.with_options(|o| o.init.set_use_model_delay_load(enable))
    }

    pub fn max_line_count(&self) -> Result<usize> {
        self.with_options(|o| o.process.max_recognition_line_count())
    }

    /// Upper bound on lines the engine recognizes per image.
    pub fn set_max_line_count(&self, count: usize) -> Result<()> {
        self.with_options(|o| o.process.set_max_recognition_line_count(count))
    }

    pub fn resize_target(&self) -> Result<(u32, u32)> {
        self.with_options(|o| o.process.resize_resolution())
    }

    /// Resolution images are resized to before recognition.
    pub fn set_resize_target(&self, width: u32, height: u32) -> Result<()> {
        self.with_options(|o| o.process.set_resize_resolution(width, height))
    }

    /// Recognize `image` and return the owned result tree.
    ///
    /// A failed call releases every handle it created and leaves the engine
    /// usable for the next call.
    pub fn recognize_result(&self, image: &RgbaImage) -> Result<OcrResult> {
        let descriptor = ImageDescriptor::from_rgba_image(image)?;
        let started = Instant::now();

        let result = self.with_options(|options| {
            let pipeline =
                Pipeline::create(self.api, &options.init, &self.model_path, MODEL_KEY)?;
            debug!("pipeline created");

            let native = pipeline.run(&descriptor, &options.process)?;
            debug!("recognition finished");

            let tree = extract_result(&native)?;
            native.release();
            pipeline.release();
            Ok(tree)
        })?;

        info!(
            "recognized {}x{} image: {} lines, {} words in {:.1?}",
            image.width(),
            image.height(),
            result.lines.len(),
            result.word_count(),
            started.elapsed()
        );
        Ok(result)
    }

    /// Recognize `image` and render it in `format`.
    pub fn recognize(&self, image: &RgbaImage, format: OutputFormat) -> Result<String> {
        let result = self.recognize_result(image)?;
        match format {
            OutputFormat::Text => Ok(result.text()),
            OutputFormat::Structured => result.to_json(),
        }
    }

    /// Like [`Engine::recognize`], for any decoded image type.
    pub fn recognize_image(&self, image: &DynamicImage, format: OutputFormat) -> Result<String> {
        match image {
            DynamicImage::ImageRgba8(rgba) => self.recognize(rgba, format),
            other => self.recognize(&other.to_rgba8(), format),
        }
    }

    /// Release the option handles. Later calls return `EngineClosed`.
    /// Calling `close` again is a no-op.
    pub fn close(&self) {
        if self.lock().take().is_some() {
            debug!("OCR engine closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("model_path", &self.model_path)
            .field("closed", &self.is_closed())
            .finish()
    }
}
