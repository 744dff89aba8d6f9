//! Configuration loaded from `.securevault.toml`.

pub mod settings;

pub use settings::Settings;
