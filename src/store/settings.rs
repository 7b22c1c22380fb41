//! Key/value application settings

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::warn;

use super::{Db, StoreError};
use crate::util::time::{format_date, parse_date};
use crate::util::timezone::parse_timezone;

pub const TIMEZONE: &str = "timezone";
pub const YEAR_TYPE: &str = "year_type";
pub const ACTIVE_ASSOCIATES: &str = "active_associates";
pub const HIDDEN_ASSOCIATES: &str = "hidden_associates";
pub const FISCAL_YEAR_START: &str = "fiscal_year_start";
pub const FISCAL_YEAR_END: &str = "fiscal_year_end";
pub const DARK_MODE: &str = "dark_mode";
pub const SHOW_TIP_BADGES: &str = "show_tip_badges";
pub const LAST_ORDER_UPDATE: &str = "last_order_update";
pub const LAST_CLUB_UPDATE: &str = "last_club_update";

pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// Date-range convention for year-to-date aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearType {
    #[default]
    Calendar,
    Fiscal,
}

impl YearType {
    pub fn as_str(&self) -> &'static str {
        match self {
            YearType::Calendar => "calendar",
            YearType::Fiscal => "fiscal",
        }
    }
}

impl fmt::Display for YearType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YearType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "calendar" => Ok(YearType::Calendar),
            "fiscal" => Ok(YearType::Fiscal),
            other => Err(StoreError::InvalidSetting {
                key: YEAR_TYPE.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Typed snapshot of the settings table
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub timezone: String,
    pub year_type: YearType,
    pub active_associates: Vec<String>,
    pub hidden_associates: Vec<String>,
    /// `MM-DD`, or a full date once a fiscal setup has run
    pub fiscal_year_start: String,
    pub fiscal_year_end: String,
    pub dark_mode: bool,
    pub show_tip_badges: bool,
    pub last_order_update: Option<NaiveDate>,
    pub last_club_update: Option<NaiveDate>,
}

impl Settings {
    /// Configured timezone, UTC when the stored name is unknown
    pub fn tz(&self) -> Tz {
        parse_timezone(&self.timezone).unwrap_or_else(|| {
            warn!(timezone = %self.timezone, "Unknown timezone in settings, using UTC");
            Tz::UTC
        })
    }

    /// Setup has completed once both sync watermarks exist
    pub fn is_initialized(&self) -> bool {
        self.last_order_update.is_some() && self.last_club_update.is_some()
    }
}

/// Settings store operations
#[derive(Clone)]
pub struct SettingsStore {
    db: Db,
}

impl SettingsStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set_many(&[(key, value.to_string())]).await
    }

    /// Write several keys atomically
    pub async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let mut tx = self.db.pool().begin().await?;
        for (key, value) in entries {
            sqlx::query(
                "INSERT INTO settings (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key.to_string())
            .bind(value.clone())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn load(&self) -> Result<Settings, StoreError> {
        let rows = sqlx::query("SELECT key, value FROM settings")
            .fetch_all(self.db.pool())
            .await?;
        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            map.insert(key, value);
        }

        let text = |key: &str, default: &str| -> String {
            map.get(key).cloned().unwrap_or_else(|| default.to_string())
        };
        let flag = |key: &str| map.get(key).map(|v| v == "true").unwrap_or(true);
        let date = |key: &str| map.get(key).and_then(|v| parse_date(v));

        Ok(Settings {
            timezone: text(TIMEZONE, DEFAULT_TIMEZONE),
            year_type: text(YEAR_TYPE, "calendar").parse()?,
            active_associates: parse_list(ACTIVE_ASSOCIATES, map.get(ACTIVE_ASSOCIATES))?,
            hidden_associates: parse_list(HIDDEN_ASSOCIATES, map.get(HIDDEN_ASSOCIATES))?,
            fiscal_year_start: text(FISCAL_YEAR_START, "07-01"),
            fiscal_year_end: text(FISCAL_YEAR_END, "06-30"),
            dark_mode: flag(DARK_MODE),
            show_tip_badges: flag(SHOW_TIP_BADGES),
            last_order_update: date(LAST_ORDER_UPDATE),
            last_club_update: date(LAST_CLUB_UPDATE),
        })
    }

    pub async fn active_associates(&self) -> Result<Vec<String>, StoreError> {
        let raw = self.get(ACTIVE_ASSOCIATES).await?;
        parse_list(ACTIVE_ASSOCIATES, raw.as_ref())
    }

    pub async fn hidden_associates(&self) -> Result<Vec<String>, StoreError> {
        let raw = self.get(HIDDEN_ASSOCIATES).await?;
        parse_list(HIDDEN_ASSOCIATES, raw.as_ref())
    }

    pub async fn set_associates(
        &self,
        active: &[String],
        hidden: &[String],
    ) -> Result<(), StoreError> {
        self.set_many(&[
            (ACTIVE_ASSOCIATES, encode_list(active)),
            (HIDDEN_ASSOCIATES, encode_list(hidden)),
        ])
        .await
    }

    pub async fn set_active_associates(&self, active: &[String]) -> Result<(), StoreError> {
        self.set(ACTIVE_ASSOCIATES, &encode_list(active)).await
    }

    /// Record both sync watermarks
    pub async fn set_last_update(&self, date: NaiveDate) -> Result<(), StoreError> {
        let value = format_date(date);
        self.set_many(&[(LAST_ORDER_UPDATE, value.clone()), (LAST_CLUB_UPDATE, value)])
            .await
    }
}

fn parse_list(key: &str, raw: Option<&String>) -> Result<Vec<String>, StoreError> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|_| StoreError::InvalidSetting {
            key: key.to_string(),
            value: raw.clone(),
        }),
    }
}

fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}
