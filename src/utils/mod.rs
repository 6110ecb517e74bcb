//! Shared image utilities

pub mod preprocessing;
#[cfg(test)]
pub(crate) mod test_utils;

pub use preprocessing::ImagePreprocessor;
