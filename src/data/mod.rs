//! Hourly tables, the column vocabulary and the raw file loaders

pub mod loader;
pub mod schema;
pub mod table;

pub use loader::{load_directory, load_traffic_file, load_weather_file, SourceTables};
pub use table::{ColumnSummary, HourlyTable};
