pub mod load;
pub mod types;

pub use load::{get_data_dir, load_default, load_file};
pub use types::{AppConfig, ExecutorConfig, LoggingConfig, ReporterConfig};
