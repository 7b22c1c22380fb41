//! Data store modules for the local SQLite database

pub mod clubs;
pub mod db;
pub mod orders;
pub mod reference;
pub mod scores;
pub mod settings;

pub use clubs::ClubStore;
pub use db::Db;
pub use orders::OrderStore;
pub use reference::ReferenceStore;
pub use scores::ScoreStore;
pub use settings::{Settings, SettingsStore, YearType};

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid value for setting {key}: {value}")]
    InvalidSetting { key: String, value: String },
}
