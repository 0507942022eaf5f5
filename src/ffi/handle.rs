// Typed, owning wrappers over the engine's opaque handles (RAII Drop).

use std::ffi::CString;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::ptr;

use libc::{c_char, c_float};
use tracing::{debug, warn};

use super::ansi::ansi_to_string;
use super::oneocr_sys::{OcrApi, RawHandle, Status};
use crate::error::{OcrError, Result};
use crate::marshal::ImageDescriptor;
use crate::model::BoundingBox;

/// Marker trait naming a handle category.
pub trait HandleKind {
    const NAME: &'static str;
}

/// Handle categories the caller owns and must release.
pub trait Releasable: HandleKind {
    const RELEASE: &'static str;
    fn release_fn(api: &OcrApi) -> unsafe extern "C" fn(RawHandle) -> Status;
}

macro_rules! handle_kinds {
    ($($kind:ident => $name:literal),* $(,)?) => {
        $(
            #[derive(Debug)]
            pub enum $kind {}

            impl HandleKind for $kind {
                const NAME: &'static str = $name;
            }
        )*
    };
}

handle_kinds! {
    InitOptionsKind => "init options",
    ProcessOptionsKind => "process options",
    PipelineKind => "pipeline",
    ResultKind => "result",
    LineKind => "line",
    WordKind => "word",
}

macro_rules! releasable {
    ($($kind:ident => $field:ident, $call:literal),* $(,)?) => {
        $(
            impl Releasable for $kind {
                const RELEASE: &'static str = $call;
                fn release_fn(api: &OcrApi) -> unsafe extern "C" fn(RawHandle) -> Status {
                    api.$field
                }
            }
        )*
    };
}

releasable! {
    InitOptionsKind => release_init_options, "ReleaseOcrInitOptions",
    ProcessOptionsKind => release_process_options, "ReleaseOcrProcessOptions",
    PipelineKind => release_pipeline, "ReleaseOcrPipeline",
    ResultKind => release_result, "ReleaseOcrResult",
}

/// Non-owning native handle of kind `K`.
///
/// The kind parameter keeps a result handle from being passed where a
/// pipeline handle is expected.
pub struct Handle<K> {
    raw: RawHandle,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    fn new(raw: RawHandle) -> Self {
        Handle {
            raw,
            _kind: PhantomData,
        }
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K: HandleKind> fmt::Debug for Handle<K> {
    // Raw values are native addresses; keep them out of logs and messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle<{}>", K::NAME)
    }
}

/// Owning native handle, released exactly once when dropped.
///
/// Not `Clone`: the only way to release is to drop the single owner.
pub struct Owned<'api, K: Releasable> {
    api: &'api OcrApi,
    handle: Handle<K>,
}

pub type InitOptions<'api> = Owned<'api, InitOptionsKind>;
pub type ProcessOptions<'api> = Owned<'api, ProcessOptionsKind>;
pub type Pipeline<'api> = Owned<'api, PipelineKind>;
pub type RecognitionResult<'api> = Owned<'api, ResultKind>;

impl<'api, K: Releasable> Owned<'api, K> {
    /// Calls a `Create*`-style entry point and takes ownership of its output.
    fn create_with(
        api: &'api OcrApi,
        call: &'static str,
        create: impl FnOnce(*mut RawHandle) -> Status,
    ) -> Result<Self> {
        let mut raw: RawHandle = 0;
        OcrError::check(call, create(&mut raw))?;
        debug!("created {} handle", K::NAME);
        Ok(Owned {
            api,
            handle: Handle::new(raw),
        })
    }

    /// Release now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl<K: Releasable> Drop for Owned<'_, K> {
    fn drop(&mut self) {
        let status = unsafe { K::release_fn(self.api)(self.handle.raw) };
        if status != 0 {
            warn!("{} returned status {}", K::RELEASE, status);
        } else {
            debug!("released {} handle", K::NAME);
        }
    }
}

impl<K: Releasable> fmt::Debug for Owned<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned").field("handle", &self.handle).finish()
    }
}

fn count_from_native(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn index_to_native(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

/// Reads a native box pointer and copies the box out. A null box reads as
/// all-zero corners.
fn read_box(
    call: &'static str,
    getter: impl FnOnce(*mut *const BoundingBox) -> Status,
) -> Result<BoundingBox> {
    let mut ptr: *const BoundingBox = ptr::null();
    OcrError::check(call, getter(&mut ptr))?;
    if ptr.is_null() {
        debug!("{call} returned a null box");
        return Ok(BoundingBox::default());
    }
    Ok(unsafe { ptr.read_unaligned() })
}

fn read_text(
    call: &'static str,
    getter: impl FnOnce(*mut *const c_char) -> Status,
) -> Result<String> {
    let mut ptr: *const c_char = ptr::null();
    OcrError::check(call, getter(&mut ptr))?;
    Ok(unsafe { ansi_to_string(ptr) })
}

impl<'api> InitOptions<'api> {
    pub fn create(api: &'api OcrApi) -> Result<Self> {
        Self::create_with(api, "CreateOcrInitOptions", |out| unsafe {
            (api.create_init_options)(out)
        })
    }

    pub fn set_use_model_delay_load(&mut self, enable: bool) -> Result<()> {
        let status = unsafe {
            (self.api.init_options_set_use_model_delay_load)(self.handle.raw, i64::from(enable))
        };
        OcrError::check("OcrInitOptionsSetUseModelDelayLoad", status)
    }
}

impl<'api> ProcessOptions<'api> {
    pub fn create(api: &'api OcrApi) -> Result<Self> {
        Self::create_with(api, "CreateOcrProcessOptions", |out| unsafe {
            (api.create_process_options)(out)
        })
    }

    pub fn max_recognition_line_count(&self) -> Result<usize> {
        let mut count = 0i64;
        let status = unsafe {
            (self.api.process_options_get_max_recognition_line_count)(self.handle.raw, &mut count)
        };
        OcrError::check("OcrProcessOptionsGetMaxRecognitionLineCount", status)?;
        Ok(count_from_native(count))
    }

    pub fn set_max_recognition_line_count(&mut self, count: usize) -> Result<()> {
        let status = unsafe {
            (self.api.process_options_set_max_recognition_line_count)(
                self.handle.raw,
                index_to_native(count),
            )
        };
        OcrError::check("OcrProcessOptionsSetMaxRecognitionLineCount", status)
    }

    pub fn resize_resolution(&self) -> Result<(u32, u32)> {
        let (mut width, mut height) = (0i64, 0i64);
        let status = unsafe {
            (self.api.process_options_get_resize_resolution)(
                self.handle.raw,
                &mut width,
                &mut height,
            )
        };
        OcrError::check("OcrProcessOptionsGetResizeResolution", status)?;
        let clamp = |v: i64| u32::try_from(v.max(0)).unwrap_or(u32::MAX);
        Ok((clamp(width), clamp(height)))
    }

    pub fn set_resize_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        let status = unsafe {
            (self.api.process_options_set_resize_resolution)(
                self.handle.raw,
                i64::from(width),
                i64::from(height),
            )
        };
        OcrError::check("OcrProcessOptionsSetResizeResolution", status)
    }
}

impl<'api> Pipeline<'api> {
    /// Build a pipeline for the model at `model_path`, unlocked with `model_key`.
    pub fn create(
        api: &'api OcrApi,
        init_options: &InitOptions<'_>,
        model_path: &Path,
        model_key: &str,
    ) -> Result<Self> {
        let path = CString::new(model_path.to_string_lossy().as_bytes()).map_err(|_| {
            OcrError::config(format!(
                "model path contains a NUL byte: {}",
                model_path.display()
            ))
        })?;
        let key = CString::new(model_key)
            .map_err(|_| OcrError::config("model key contains a NUL byte"))?;
        let init = init_options.handle.raw;
        Self::create_with(api, "CreateOcrPipeline", |out| unsafe {
            (api.create_pipeline)(path.as_ptr(), key.as_ptr(), init, out)
        })
    }

    /// Run recognition on `image`. A non-zero status becomes
    /// [`OcrError::RecognitionFailed`].
    ///
    /// `image` borrows the pixel buffer, which therefore stays alive and
    /// unmoved until this call has returned.
    pub fn run(
        &self,
        image: &ImageDescriptor<'_>,
        process_options: &ProcessOptions<'_>,
    ) -> Result<RecognitionResult<'api>> {
        let api = self.api;
        let mut raw: RawHandle = 0;
        let status = unsafe {
            (api.run_pipeline)(self.handle.raw, image, process_options.handle.raw, &mut raw)
        };
        if status != 0 {
            return Err(OcrError::RecognitionFailed { code: status });
        }
        debug!("created {} handle", ResultKind::NAME);
        Ok(Owned {
            api,
            handle: Handle::new(raw),
        })
    }
}

impl RecognitionResult<'_> {
    pub fn image_angle(&self) -> Result<f32> {
        let mut angle: c_float = 0.0;
        let status = unsafe { (self.api.get_image_angle)(self.handle.raw, &mut angle) };
        OcrError::check("GetImageAngle", status)?;
        Ok(angle)
    }

    pub fn line_count(&self) -> Result<usize> {
        let mut count = 0i64;
        let status = unsafe { (self.api.get_line_count)(self.handle.raw, &mut count) };
        OcrError::check("GetOcrLineCount", status)?;
        Ok(count_from_native(count))
    }

    /// Line `index`, borrowed from this result. Line handles are owned by the
    /// result and become invalid when it is released.
    pub fn line(&self, index: usize) -> Result<Line<'_>> {
        let mut raw: RawHandle = 0;
        let status =
            unsafe { (self.api.get_line)(self.handle.raw, index_to_native(index), &mut raw) };
        OcrError::check("GetOcrLine", status)?;
        Ok(Line {
            api: self.api,
            handle: Handle::new(raw),
            _owner: PhantomData,
        })
    }
}

/// A line handle borrowed from its [`RecognitionResult`].
pub struct Line<'r> {
    api: &'r OcrApi,
    handle: Handle<LineKind>,
    _owner: PhantomData<&'r ()>,
}

impl<'r> Line<'r> {
    pub fn bounding_box(&self) -> Result<BoundingBox> {
        read_box("GetOcrLineBoundingBox", |out| unsafe {
            (self.api.get_line_bounding_box)(self.handle.raw, out)
        })
    }

    pub fn content(&self) -> Result<String> {
        read_text("GetOcrLineContent", |out| unsafe {
            (self.api.get_line_content)(self.handle.raw, out)
        })
    }

    pub fn word_count(&self) -> Result<usize> {
        let mut count = 0i64;
        let status = unsafe { (self.api.get_line_word_count)(self.handle.raw, &mut count) };
        OcrError::check("GetOcrLineWordCount", status)?;
        Ok(count_from_native(count))
    }

    pub fn word(&self, index: usize) -> Result<Word<'r>> {
        let mut raw: RawHandle = 0;
        let status =
            unsafe { (self.api.get_word)(self.handle.raw, index_to_native(index), &mut raw) };
        OcrError::check("GetOcrWord", status)?;
        Ok(Word {
            api: self.api,
            handle: Handle::new(raw),
            _owner: PhantomData,
        })
    }
}

/// A word handle borrowed from the result that owns its line.
pub struct Word<'r> {
    api: &'r OcrApi,
    handle: Handle<WordKind>,
    _owner: PhantomData<&'r ()>,
}

impl Word<'_> {
    pub fn bounding_box(&self) -> Result<BoundingBox> {
        read_box("GetOcrWordBoundingBox", |out| unsafe {
            (self.api.get_word_bounding_box)(self.handle.raw, out)
        })
    }

    pub fn content(&self) -> Result<String> {
        read_text("GetOcrWordContent", |out| unsafe {
            (self.api.get_word_content)(self.handle.raw, out)
        })
    }

    pub fn confidence(&self) -> Result<f32> {
        let mut confidence: c_float = 0.0;
        let status = unsafe { (self.api.get_word_confidence)(self.handle.raw, &mut confidence) };
        OcrError::check("GetOcrWordConfidence", status)?;
        Ok(confidence)
    }
}
