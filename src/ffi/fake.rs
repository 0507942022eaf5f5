// In-process stand-in for the oneocr library, used by unit tests.
//
// Every entry point is a Rust `extern "C"` function with the native signature.
// State lives in a thread-local registry so tests running in parallel do not
// see each other's handles. Unknown or already-released handles never panic
// (a panic cannot unwind out of `extern "C"`); they are counted instead.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CString;

use libc::{c_char, c_float};

use super::oneocr_sys::{OcrApi, RawHandle, Status};
use crate::marshal::{ImageDescriptor, PIXEL_FORMAT_RGBA};
use crate::model::{BoundingBox, Point};

/// Status returned for calls made with a handle the fake does not know.
pub const BAD_HANDLE: Status = -1;
/// Status returned by `RunOcrPipeline` for a malformed descriptor.
pub const BAD_IMAGE: Status = -2;

/// Scripted recognition output for the next runs on this thread.
#[derive(Debug, Clone, Default)]
pub struct Page {
    angle: f32,
    lines: Vec<(String, Vec<(String, f32)>)>,
}

impl Page {
    pub fn new(angle: f32) -> Self {
        Page {
            angle,
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, text: &str, words: &[(&str, f32)]) -> Self {
        self.lines.push((
            text.to_string(),
            words.iter().map(|(w, c)| (w.to_string(), *c)).collect(),
        ));
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub created: usize,
    pub released: usize,
    pub double_releases: usize,
    pub runs: usize,
}

/// Descriptor fields observed by the last `RunOcrPipeline`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeenImage {
    pub format: i32,
    pub width: i32,
    pub height: i32,
    pub stride: i64,
    pub first_pixel: [u8; 4],
}

struct FakeWord {
    text: CString,
    bbox: Box<BoundingBox>,
    confidence: f32,
}

struct FakeLine {
    text: CString,
    bbox: Box<BoundingBox>,
    words: Vec<FakeWord>,
}

struct FakeResult {
    angle: f32,
    lines: Vec<FakeLine>,
}

enum Object {
    InitOptions { delay_load: bool },
    ProcessOptions { max_lines: i64, resize: (i64, i64) },
    Pipeline,
    Result(FakeResult),
    Line { result: RawHandle, index: usize },
    Word { result: RawHandle, line: usize, index: usize },
}

#[derive(Default)]
struct State {
    next: RawHandle,
    objects: HashMap<RawHandle, Object>,
    released: Vec<RawHandle>,
    page: Page,
    failures: HashMap<&'static str, Status>,
    stats: Stats,
    last_image: Option<SeenImage>,
}

thread_local! {
    static STATE: RefCell<State> = RefCell::new(State::default());
}

fn with<R>(f: impl FnOnce(&mut State) -> R) -> R {
    STATE.with(|s| f(&mut s.borrow_mut()))
}

pub fn reset() {
    with(|s| *s = State::default());
}

pub fn script(page: Page) {
    with(|s| s.page = page);
}

/// Make the next call to `call` on this thread return `code`.
pub fn fail_next(call: &'static str, code: Status) {
    with(|s| {
        s.failures.insert(call, code);
    });
}

pub fn stats() -> Stats {
    with(|s| s.stats)
}

pub fn double_releases() -> usize {
    with(|s| s.stats.double_releases)
}

/// Caller-owned handles (options, pipelines, results) not yet released.
pub fn live_handles() -> usize {
    with(|s| {
        s.objects
            .values()
            .filter(|o| !matches!(o, Object::Line { .. } | Object::Word { .. }))
            .count()
    })
}

pub fn last_image() -> Option<SeenImage> {
    with(|s| s.last_image)
}

pub fn delay_load_flags() -> Vec<bool> {
    with(|s| {
        s.objects
            .values()
            .filter_map(|o| match o {
                Object::InitOptions { delay_load } => Some(*delay_load),
                _ => None,
            })
            .collect()
    })
}

fn rect(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
    BoundingBox {
        top_left: Point { x, y },
        top_right: Point { x: x + w, y },
        bottom_right: Point { x: x + w, y: y + h },
        bottom_left: Point { x, y: y + h },
    }
}

/// Box the fake reports for line `line`.
pub fn line_box(line: usize) -> BoundingBox {
    rect(10.0, 20.0 * line as f32, 200.0, 16.0)
}

/// Box the fake reports for word `word` of line `line`.
pub fn word_box(line: usize, word: usize) -> BoundingBox {
    rect(10.0 + 50.0 * word as f32, 20.0 * line as f32, 45.0, 16.0)
}

fn take_failure(call: &'static str) -> Option<Status> {
    with(|s| s.failures.remove(call))
}

fn insert(object: Object) -> RawHandle {
    with(|s| {
        s.next += 1;
        let handle = s.next;
        s.objects.insert(handle, object);
        if !matches!(s.objects[&handle], Object::Line { .. } | Object::Word { .. }) {
            s.stats.created += 1;
        }
        handle
    })
}

fn release(handle: RawHandle) -> Status {
    with(|s| match s.objects.remove(&handle) {
        Some(Object::Result(_)) => {
            s.objects.retain(|_, o| match o {
                Object::Line { result, .. } | Object::Word { result, .. } => *result != handle,
                _ => true,
            });
            s.released.push(handle);
            s.stats.released += 1;
            0
        }
        Some(_) => {
            s.released.push(handle);
            s.stats.released += 1;
            0
        }
        None => {
            if s.released.contains(&handle) {
                s.stats.double_releases += 1;
            }
            BAD_HANDLE
        }
    })
}

fn build_result(page: &Page, max_lines: i64) -> FakeResult {
    let limit = if max_lines > 0 {
        max_lines as usize
    } else {
        usize::MAX
    };
    let lines = page
        .lines
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, (text, words))| FakeLine {
            text: CString::new(text.as_str()).unwrap_or_default(),
            bbox: Box::new(line_box(i)),
            words: words
                .iter()
                .enumerate()
                .map(|(j, (w, c))| FakeWord {
                    text: CString::new(w.as_str()).unwrap_or_default(),
                    bbox: Box::new(word_box(i, j)),
                    confidence: *c,
                })
                .collect(),
        })
        .collect();
    FakeResult {
        angle: page.angle,
        lines,
    }
}

unsafe extern "C" fn create_init_options(out: *mut RawHandle) -> Status {
    if let Some(code) = take_failure("CreateOcrInitOptions") {
        return code;
    }
    unsafe { *out = insert(Object::InitOptions { delay_load: false }) };
    0
}

unsafe extern "C" fn init_options_set_use_model_delay_load(
    handle: RawHandle,
    enable: i64,
) -> Status {
    if let Some(code) = take_failure("OcrInitOptionsSetUseModelDelayLoad") {
        return code;
    }
    with(|s| match s.objects.get_mut(&handle) {
        Some(Object::InitOptions { delay_load }) => {
            *delay_load = enable != 0;
            0
        }
        _ => BAD_HANDLE,
    })
}

unsafe extern "C" fn create_process_options(out: *mut RawHandle) -> Status {
    if let Some(code) = take_failure("CreateOcrProcessOptions") {
        return code;
    }
    unsafe {
        *out = insert(Object::ProcessOptions {
            max_lines: 100,
            resize: (1152, 768),
        })
    };
    0
}

unsafe extern "C" fn get_max_line_count(handle: RawHandle, out: *mut i64) -> Status {
    with(|s| match s.objects.get(&handle) {
        Some(Object::ProcessOptions { max_lines, .. }) => {
            unsafe { *out = *max_lines };
            0
        }
        _ => BAD_HANDLE,
    })
}

unsafe extern "C" fn set_max_line_count(handle: RawHandle, count: i64) -> Status {
    if let Some(code) = take_failure("OcrProcessOptionsSetMaxRecognitionLineCount") {
        return code;
    }
    with(|s| match s.objects.get_mut(&handle) {
        Some(Object::ProcessOptions { max_lines, .. }) => {
            *max_lines = count;
            0
        }
        _ => BAD_HANDLE,
    })
}

unsafe extern "C" fn get_resize_resolution(
    handle: RawHandle,
    width: *mut i64,
    height: *mut i64,
) -> Status {
    with(|s| match s.objects.get(&handle) {
        Some(Object::ProcessOptions { resize, .. }) => {
            unsafe {
                *width = resize.0;
                *height = resize.1;
            }
            0
        }
        _ => BAD_HANDLE,
    })
}

unsafe extern "C" fn set_resize_resolution(handle: RawHandle, width: i64, height: i64) -> Status {
    with(|s| match s.objects.get_mut(&handle) {
        Some(Object::ProcessOptions { resize, .. }) => {
            *resize = (width, height);
            0
        }
        _ => BAD_HANDLE,
    })
}

unsafe extern "C" fn create_pipeline(
    model_path: *const c_char,
    model_key: *const c_char,
    init_options: RawHandle,
    out: *mut RawHandle,
) -> Status {
    if let Some(code) = take_failure("CreateOcrPipeline") {
        return code;
    }
    if model_path.is_null() || model_key.is_null() {
        return BAD_HANDLE;
    }
    let known = with(|s| matches!(s.objects.get(&init_options), Some(Object::InitOptions { .. })));
    if !known {
        return BAD_HANDLE;
    }
    unsafe { *out = insert(Object::Pipeline) };
    0
}

unsafe extern "C" fn run_pipeline(
    pipeline: RawHandle,
    image: *const ImageDescriptor<'_>,
    process_options: RawHandle,
    out: *mut RawHandle,
) -> Status {
    with(|s| s.stats.runs += 1);
    if let Some(code) = take_failure("RunOcrPipeline") {
        return code;
    }
    let max_lines = with(|s| {
        if !matches!(s.objects.get(&pipeline), Some(Object::Pipeline)) {
            return None;
        }
        match s.objects.get(&process_options) {
            Some(Object::ProcessOptions { max_lines, .. }) => Some(*max_lines),
            _ => None,
        }
    });
    let Some(max_lines) = max_lines else {
        return BAD_HANDLE;
    };

    let image = unsafe { &*image };
    if image.format() != PIXEL_FORMAT_RGBA
        || image.width() <= 0
        || image.height() <= 0
        || image.stride() != i64::from(image.width()) * 4
        || image.data().is_null()
    {
        return BAD_IMAGE;
    }
    let mut first_pixel = [0u8; 4];
    unsafe { std::ptr::copy_nonoverlapping(image.data(), first_pixel.as_mut_ptr(), 4) };
    let seen = SeenImage {
        format: image.format(),
        width: image.width(),
        height: image.height(),
        stride: image.stride(),
        first_pixel,
    };

    let result = with(|s| {
        s.last_image = Some(seen);
        build_result(&s.page, max_lines)
    });
    unsafe { *out = insert(Object::Result(result)) };
    0
}

unsafe extern "C" fn get_image_angle(result: RawHandle, out: *mut c_float) -> Status {
    with(|s| match s.objects.get(&result) {
        Some(Object::Result(r)) => {
            unsafe { *out = r.angle };
            0
        }
        _ => BAD_HANDLE,
    })
}

unsafe extern "C" fn get_line_count(result: RawHandle, out: *mut i64) -> Status {
    if let Some(code) = take_failure("GetOcrLineCount") {
        return code;
    }
    with(|s| match s.objects.get(&result) {
        Some(Object::Result(r)) => {
            unsafe { *out = r.lines.len() as i64 };
            0
        }
        _ => BAD_HANDLE,
    })
}

unsafe extern "C" fn get_line(result: RawHandle, index: i64, out: *mut RawHandle) -> Status {
    let valid = with(|s| match s.objects.get(&result) {
        Some(Object::Result(r)) => index >= 0 && (index as usize) < r.lines.len(),
        _ => false,
    });
    if !valid {
        return BAD_HANDLE;
    }
    unsafe {
        *out = insert(Object::Line {
            result,
            index: index as usize,
        })
    };
    0
}

/// Runs `f` on the line behind `handle`, if it is still alive.
fn with_line<R>(handle: RawHandle, f: impl FnOnce(&FakeLine) -> R) -> Option<R> {
    with(|s| {
        let (result, index) = match s.objects.get(&handle) {
            Some(Object::Line { result, index }) => (*result, *index),
            _ => return None,
        };
        match s.objects.get(&result) {
            Some(Object::Result(r)) => r.lines.get(index).map(f),
            _ => None,
        }
    })
}

fn with_word<R>(handle: RawHandle, f: impl FnOnce(&FakeWord) -> R) -> Option<R> {
    with(|s| {
        let (result, line, index) = match s.objects.get(&handle) {
            Some(Object::Word {
                result,
                line,
                index,
            }) => (*result, *line, *index),
            _ => return None,
        };
        match s.objects.get(&result) {
            Some(Object::Result(r)) => r.lines.get(line).and_then(|l| l.words.get(index)).map(f),
            _ => None,
        }
    })
}

unsafe extern "C" fn get_line_bounding_box(
    line: RawHandle,
    out: *mut *const BoundingBox,
) -> Status {
    match with_line(line, |l| &*l.bbox as *const BoundingBox) {
        Some(ptr) => {
            unsafe { *out = ptr };
            0
        }
        None => BAD_HANDLE,
    }
}

unsafe extern "C" fn get_line_content(line: RawHandle, out: *mut *const c_char) -> Status {
    match with_line(line, |l| l.text.as_ptr()) {
        Some(ptr) => {
            unsafe { *out = ptr };
            0
        }
        None => BAD_HANDLE,
    }
}

unsafe extern "C" fn get_line_word_count(line: RawHandle, out: *mut i64) -> Status {
    match with_line(line, |l| l.words.len() as i64) {
        Some(n) => {
            unsafe { *out = n };
            0
        }
        None => BAD_HANDLE,
    }
}

unsafe extern "C" fn get_word(line: RawHandle, index: i64, out: *mut RawHandle) -> Status {
    let parent = with(|s| match s.objects.get(&line) {
        Some(Object::Line { result, index }) => Some((*result, *index)),
        _ => None,
    });
    let Some((result, line_index)) = parent else {
        return BAD_HANDLE;
    };
    let words = with_line(line, |l| l.words.len()).unwrap_or(0);
    if index < 0 || index as usize >= words {
        return BAD_HANDLE;
    }
    unsafe {
        *out = insert(Object::Word {
            result,
            line: line_index,
            index: index as usize,
        })
    };
    0
}

unsafe extern "C" fn get_word_bounding_box(
    word: RawHandle,
    out: *mut *const BoundingBox,
) -> Status {
    match with_word(word, |w| &*w.bbox as *const BoundingBox) {
        Some(ptr) => {
            unsafe { *out = ptr };
            0
        }
        None => BAD_HANDLE,
    }
}

unsafe extern "C" fn get_word_content(word: RawHandle, out: *mut *const c_char) -> Status {
    match with_word(word, |w| w.text.as_ptr()) {
        Some(ptr) => {
            unsafe { *out = ptr };
            0
        }
        None => BAD_HANDLE,
    }
}

unsafe extern "C" fn get_word_confidence(word: RawHandle, out: *mut c_float) -> Status {
    match with_word(word, |w| w.confidence) {
        Some(c) => {
            unsafe { *out = c };
            0
        }
        None => BAD_HANDLE,
    }
}

unsafe extern "C" fn release_handle(handle: RawHandle) -> Status {
    release(handle)
}

pub static API: OcrApi = OcrApi {
    create_init_options,
    init_options_set_use_model_delay_load,
    release_init_options: release_handle,

    create_process_options,
    process_options_get_max_recognition_line_count: get_max_line_count,
    process_options_set_max_recognition_line_count: set_max_line_count,
    process_options_get_resize_resolution: get_resize_resolution,
    process_options_set_resize_resolution: set_resize_resolution,
    release_process_options: release_handle,

    create_pipeline,
    run_pipeline,
    release_pipeline: release_handle,

    get_image_angle,
    get_line_count,
    get_line,
    release_result: release_handle,

    get_line_bounding_box,
    get_line_content,
    get_line_word_count,
    get_word,

    get_word_bounding_box,
    get_word_content,
    get_word_confidence,
};
