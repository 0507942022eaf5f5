//! Safe Rust boundary around the pre-compiled oneocr text recognition engine.
//!
//! The native library is loaded once per process with [`configure_library`].
//! Each [`Engine`] owns its own native option handles and turns an RGBA image
//! into an owned [`OcrResult`] tree, or one of its two projections
//! ([`OutputFormat::Text`], [`OutputFormat::Structured`]).
//!
//! ```no_run
//! use winocr::{Engine, OutputFormat};
//!
//! winocr::configure_library("C:/tools/winocr")?;
//! let engine = Engine::new()?;
//! engine.set_delayed_model_load(true)?;
//! let image = image::open("scan.png")?.to_rgba8();
//! println!("{}", engine.recognize(&image, OutputFormat::Text)?);
//! # Ok::<(), winocr::OcrError>(())
//! ```

pub mod config;
pub mod error;
pub mod ffi;
pub mod library;
pub mod marshal;
pub mod model;
pub mod pipeline;

pub use error::{OcrError, Result};
pub use library::{configure_library, library_dir};
pub use model::{BoundingBox, OcrLine, OcrResult, OcrWord, Point};
pub use pipeline::OutputFormat;
pub use pipeline::engine::Engine;
