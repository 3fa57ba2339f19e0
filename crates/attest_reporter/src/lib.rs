pub mod json;
pub mod summary;
pub mod text;

pub use json::JsonResultWriter;
pub use summary::RunSummary;
pub use text::render_summary;
