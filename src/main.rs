use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use winocr::config::{self, settings::Settings};
use winocr::library::resolve_library_dir;
use winocr::{Engine, OutputFormat};

struct Args {
    format: Option<OutputFormat>,
    settings: Option<PathBuf>,
    library_dir: Option<PathBuf>,
    images: Vec<PathBuf>,
}

fn print_usage() {
    eprintln!(
        "Usage: winocr [--format text|structured] [--settings FILE] [--library-dir DIR] <image>..."
    );
    eprintln!("  Recognize text in image files with the native oneocr engine.");
    eprintln!(
        "  The library directory defaults to $WINOCR_LIBRARY_DIR, then the current directory."
    );
}

fn parse_args(raw: Vec<String>) -> Result<Args, String> {
    let mut args = Args {
        format: None,
        settings: None,
        library_dir: None,
        images: Vec::new(),
    };

    let mut iter = raw.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--format" | "-f" => {
                let value = iter.next().ok_or("--format requires a value")?;
                args.format = Some(value.parse::<OutputFormat>().map_err(|e| format!("{e}"))?);
            }
            "--settings" | "-s" => {
                let value = iter.next().ok_or("--settings requires a path")?;
                args.settings = Some(PathBuf::from(value));
            }
            "--library-dir" | "-l" => {
                let value = iter.next().ok_or("--library-dir requires a path")?;
                args.library_dir = Some(PathBuf::from(value));
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option: {flag}")),
            _ => args.images.push(PathBuf::from(arg)),
        }
    }

    if args.images.is_empty() {
        return Err("no input images".to_string());
    }
    Ok(args)
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("winocr=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn new_engine(settings: &Settings) -> winocr::Result<Engine> {
    let engine = Engine::new()?;
    settings.apply(&engine)?;
    Ok(engine)
}

/// Recognizes one file with the worker's engine, creating it on first use.
fn recognize_file(
    engine: &mut Option<Engine>,
    settings: &Settings,
    path: &Path,
    format: OutputFormat,
) -> winocr::Result<String> {
    let engine = match engine {
        Some(engine) => engine,
        None => engine.insert(new_engine(settings)?),
    };
    let image = image::open(path)?;
    engine.recognize_image(&image, format)
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();

    if raw.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }
    if raw.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("winocr {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let args = match parse_args(raw) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("ERROR: {e}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    init_logging();

    let settings = match config::load_settings(args.settings.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ERROR: Failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    let library_dir =
        resolve_library_dir(args.library_dir.as_deref().or(settings.library_dir.as_deref()));
    if let Err(e) = winocr::configure_library(&library_dir) {
        eprintln!("ERROR: {} ({})", e, library_dir.display());
        return ExitCode::FAILURE;
    }

    if let Err(e) = new_engine(&settings) {
        eprintln!("ERROR: Failed to create OCR engine: {e}");
        return ExitCode::FAILURE;
    }

    let format = args.format.unwrap_or(settings.format);

    // One engine per rayon worker: a single engine serializes its calls.
    let results: Vec<winocr::Result<String>> = args
        .images
        .par_iter()
        .map_init(
            || None,
            |engine, path| recognize_file(engine, &settings, path, format),
        )
        .collect();

    let mut has_error = false;
    let show_headers = args.images.len() > 1;
    for (path, result) in args.images.iter().zip(results) {
        match result {
            Ok(output) => {
                if show_headers {
                    println!("== {} ==", path.display());
                }
                println!("{output}");
            }
            Err(e) => {
                eprintln!("ERROR: {}: {e}", path.display());
                has_error = true;
            }
        }
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
