//! Report generation and persistence.

pub mod generator;
pub mod geojson;
pub mod store;

pub use generator::{generate_json_report, generate_markdown_report};
pub use geojson::map_layer;
pub use store::DataStore;
