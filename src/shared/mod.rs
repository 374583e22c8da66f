pub mod ids;
pub mod json_path;
pub mod logging;
pub mod text;
