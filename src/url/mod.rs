//! URL handling module for cbz-stream
//!
//! This module provides the path-shape checks applied to series and chapter URLs,
//! path joining for the remote API endpoints, and the file naming rules that map
//! remote URLs onto sandbox file names.

mod naming;
mod shape;

// Re-export main functions
pub use naming::{chapter_archive_name, file_name, ImageName};
pub use shape::{join_segment, parse_series_url, validate_path_shape};
