//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

/// Conversion of keypoint archives into chunked NPY archives.
pub mod convert;

/// Listing of the arrays in a converted archive.
pub mod inspect;
