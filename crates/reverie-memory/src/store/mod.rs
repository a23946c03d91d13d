//! JSON-file backed memory store.
//!
//! The whole document is rewritten on every update (temp file, then rename).

mod memory;

#[cfg(test)]
mod tests;

pub use memory::{BotMemory, Period, PeriodicSummary, StoredMessage};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reverie_core::error::ReverieError;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Bot memory shared between a plugin's handlers.
pub struct Store {
    path: PathBuf,
    memory: Mutex<BotMemory>,
}

impl Store {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ReverieError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ReverieError::Memory(format!("failed to create data dir: {e}")))?;
        }

        let memory = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ReverieError::Memory(format!("corrupt memory file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No memory at {}, starting fresh", path.display());
                BotMemory::default()
            }
            Err(e) => return Err(e.into()),
        };

        info!("Memory store opened at {}", path.display());
        Ok(Self {
            path,
            memory: Mutex::new(memory),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read from the memory.
    pub async fn read<R>(&self, f: impl FnOnce(&BotMemory) -> R) -> R {
        f(&*self.memory.lock().await)
    }

    /// Mutate the memory and persist the result.
    ///
    /// The in-memory change is kept even if writing fails.
    pub async fn update<R>(&self, f: impl FnOnce(&mut BotMemory) -> R) -> Result<R, ReverieError> {
        let mut memory = self.memory.lock().await;
        let result = f(&mut *memory);
        save(&self.path, &*memory).await?;
        Ok(result)
    }
}

async fn save(path: &Path, memory: &BotMemory) -> Result<(), ReverieError> {
    let json = serde_json::to_string_pretty(memory)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        warn!("Failed to replace {}: {e}", path.display());
        return Err(e.into());
    }
    Ok(())
}

/// Parse `%Y-%m-%d %H:%M` or `%Y-%m-%d` (midnight) as UTC.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, ReverieError> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Ok(dt.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| {
            ReverieError::Memory(format!(
                "invalid date '{s}', expected YYYY-MM-DD or YYYY-MM-DD HH:MM"
            ))
        })
}
