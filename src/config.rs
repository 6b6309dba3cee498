use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Veritor";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,veritor=debug"
}

/// Get the application data directory (~/Veritor/ on all platforms).
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Path of the registry database file.
pub fn database_path() -> PathBuf {
    app_data_dir().join("veritor.db")
}
