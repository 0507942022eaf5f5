pub mod ansi;
pub mod handle;
pub mod oneocr_sys;

#[cfg(test)]
pub(crate) mod fake;
