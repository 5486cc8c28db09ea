pub mod app;
pub mod line_import;
pub mod logging;
pub mod settings;
