// Hand-written bindings for the oneocr C entry points.
//
// The library is loaded at runtime, so every export is resolved once into a
// table of function pointers. Out-values are written through caller-supplied
// pointers; functions that can fail return a non-zero status word.

use libc::{c_char, c_float};
use libloading::Library;

use crate::marshal::ImageDescriptor;
use crate::model::BoundingBox;

/// Opaque native object reference. Never dereferenced on the Rust side.
pub type RawHandle = usize;

/// Native status word; zero means success.
pub type Status = i64;

type CreateFn = unsafe extern "C" fn(out: *mut RawHandle) -> Status;
type ReleaseFn = unsafe extern "C" fn(handle: RawHandle) -> Status;
type GetI64Fn = unsafe extern "C" fn(handle: RawHandle, out: *mut i64) -> Status;
type GetF32Fn = unsafe extern "C" fn(handle: RawHandle, out: *mut c_float) -> Status;
type GetChildFn =
    unsafe extern "C" fn(parent: RawHandle, index: i64, out: *mut RawHandle) -> Status;
type GetBoxFn = unsafe extern "C" fn(handle: RawHandle, out: *mut *const BoundingBox) -> Status;
type GetTextFn = unsafe extern "C" fn(handle: RawHandle, out: *mut *const c_char) -> Status;

/// Function table for every export the crate uses.
///
/// Entries stay valid for as long as the [`Library`] they were resolved from
/// is loaded; the bootstrap keeps that library alive for the whole process.
#[derive(Clone, Copy)]
pub struct OcrApi {
    pub create_init_options: CreateFn,
    pub init_options_set_use_model_delay_load:
        unsafe extern "C" fn(init_options: RawHandle, enable: i64) -> Status,
    pub release_init_options: ReleaseFn,

    pub create_process_options: CreateFn,
    pub process_options_get_max_recognition_line_count: GetI64Fn,
    pub process_options_set_max_recognition_line_count:
        unsafe extern "C" fn(process_options: RawHandle, count: i64) -> Status,
    pub process_options_get_resize_resolution: unsafe extern "C" fn(
        process_options: RawHandle,
        width: *mut i64,
        height: *mut i64,
    ) -> Status,
    pub process_options_set_resize_resolution:
        unsafe extern "C" fn(process_options: RawHandle, width: i64, height: i64) -> Status,
    pub release_process_options: ReleaseFn,

    pub create_pipeline: unsafe extern "C" fn(
        model_path: *const c_char,
        model_key: *const c_char,
        init_options: RawHandle,
        out: *mut RawHandle,
    ) -> Status,
    pub run_pipeline: unsafe extern "C" fn(
        pipeline: RawHandle,
        image: *const ImageDescriptor<'_>,
        process_options: RawHandle,
        out: *mut RawHandle,
    ) -> Status,
    pub release_pipeline: ReleaseFn,

    pub get_image_angle: GetF32Fn,
    pub get_line_count: GetI64Fn,
    pub get_line: GetChildFn,
    pub release_result: ReleaseFn,

    pub get_line_bounding_box: GetBoxFn,
    pub get_line_content: GetTextFn,
    pub get_line_word_count: GetI64Fn,
    pub get_word: GetChildFn,

    pub get_word_bounding_box: GetBoxFn,
    pub get_word_content: GetTextFn,
    pub get_word_confidence: GetF32Fn,
}

/// Resolves one export as a plain function pointer.
///
/// # Safety
/// `T` must be the exact signature of `name` in the loaded library.
unsafe fn symbol<T: Copy>(lib: &Library, name: &str) -> Result<T, libloading::Error> {
    // libloading accepts names with or without the trailing NUL.
    let sym = unsafe { lib.get::<T>(name.as_bytes()) }?;
    Ok(*sym)
}

impl OcrApi {
    /// Resolves every export from `lib`.
    ///
    /// # Safety
    /// `lib` must be the oneocr library and must outlive every use of the
    /// returned table.
    pub unsafe fn resolve(lib: &Library) -> Result<Self, libloading::Error> {
        unsafe {
            Ok(OcrApi {
                create_init_options: symbol(lib, "CreateOcrInitOptions")?,
                init_options_set_use_model_delay_load: symbol(
                    lib,
                    "OcrInitOptionsSetUseModelDelayLoad",
                )?,
                release_init_options: symbol(lib, "ReleaseOcrInitOptions")?,

                create_process_options: symbol(lib, "CreateOcrProcessOptions")?,
                process_options_get_max_recognition_line_count: symbol(
                    lib,
                    "OcrProcessOptionsGetMaxRecognitionLineCount",
                )?,
                process_options_set_max_recognition_line_count: symbol(
                    lib,
                    "OcrProcessOptionsSetMaxRecognitionLineCount",
                )?,
                process_options_get_resize_resolution: symbol(
                    lib,
                    "OcrProcessOptionsGetResizeResolution",
                )?,
                process_options_set_resize_resolution: symbol(
                    lib,
                    "OcrProcessOptionsSetResizeResolution",
                )?,
                release_process_options: symbol(lib, "ReleaseOcrProcessOptions")?,

                create_pipeline: symbol(lib, "CreateOcrPipeline")?,
                run_pipeline: symbol(lib, "RunOcrPipeline")?,
                release_pipeline: symbol(lib, "ReleaseOcrPipeline")?,

                get_image_angle: symbol(lib, "GetImageAngle")?,
                get_line_count: symbol(lib, "GetOcrLineCount")?,
                get_line: symbol(lib, "GetOcrLine")?,
                release_result: symbol(lib, "ReleaseOcrResult")?,

                get_line_bounding_box: symbol(lib, "GetOcrLineBoundingBox")?,
                get_line_content: symbol(lib, "GetOcrLineContent")?,
                get_line_word_count: symbol(lib, "GetOcrLineWordCount")?,
                get_word: symbol(lib, "GetOcrWord")?,

                get_word_bounding_box: symbol(lib, "GetOcrWordBoundingBox")?,
                get_word_content: symbol(lib, "GetOcrWordContent")?,
                get_word_confidence: symbol(lib, "GetOcrWordConfidence")?,
            })
        }
    }
}
