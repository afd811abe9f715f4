//! Core Module - QLR generation, notebook preparation, reprojection

pub mod geo;
pub mod notebook;
pub mod params;
pub mod qlr;
pub mod template;

pub use notebook::NotebookRunner;
pub use qlr::{create_qlr, generate_qlr, layer_name_from_url, write_qlr_file, TemplateRegistry};
