//! Configuration loaded from `seedvault.toml`.

pub mod settings;

pub use settings::Settings;
