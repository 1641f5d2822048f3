pub mod config;

pub use self::config::{load_config, parse_config, read_config, validate_config};
