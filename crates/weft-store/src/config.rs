use std::path::Path;

use serde::{Deserialize, Serialize};

/// Connection settings for [`crate::SqliteStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
  /// SQLite connection URL, e.g. `sqlite:///var/lib/weft/weft.db`
  #[serde(default = "default_database_url")]
  pub database_url: String,

  #[serde(default = "default_max_connections")]
  pub max_connections: u32,

  /// How long a connection waits on a locked database.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,

  #[serde(default = "default_create_if_missing")]
  pub create_if_missing: bool,
}

fn default_database_url() -> String {
  "sqlite://weft.db".to_string()
}

fn default_max_connections() -> u32 {
  5
}

fn default_busy_timeout_ms() -> u64 {
  5_000
}

fn default_create_if_missing() -> bool {
  true
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      database_url: default_database_url(),
      max_connections: default_max_connections(),
      busy_timeout_ms: default_busy_timeout_ms(),
      create_if_missing: default_create_if_missing(),
    }
  }
}

impl StoreConfig {
  /// Config for a database file at `path`.
  pub fn for_path(path: impl AsRef<Path>) -> Self {
    Self {
      database_url: format!("sqlite://{}", path.as_ref().display()),
      ..Self::default()
    }
  }
}
