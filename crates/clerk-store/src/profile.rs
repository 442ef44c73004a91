use std::path::{Path, PathBuf};
use std::{env, fs};

use clerk_core::Lexicon;

use crate::error::Result;
use crate::store::Store;

/// Default base directory for all clerk storage.
pub fn default_base_dir() -> PathBuf {
    if let Ok(dir) = env::var("CLERK_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs_home().join(".clerk")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Sanitize a profile name for use as a filename.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn resolve_profile_id(profile_name: Option<&str>) -> String {
    profile_name
        .map(sanitize_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "default".to_string())
}

/// Manages per-profile storage plus the shared keyword lexicon.
///
/// Layout:
/// ```text
/// ~/.clerk/
/// ├── lexicon.toml        (optional, overrides the built-in tables)
/// └── profiles/
///     ├── default.db
///     └── <name>.db
/// ```
#[derive(Debug)]
pub struct ProfileStore {
    store: Store,
    profile_id: String,
    db_path: Option<PathBuf>,
    base_dir: Option<PathBuf>,
}

impl ProfileStore {
    /// Open a profile store, creating directories as needed.
    /// `profile_name`: explicit profile (defaults to "default").
    /// `base_dir`: override the base directory (for testing).
    pub fn open(profile_name: Option<&str>, base_dir: Option<&Path>) -> Result<Self> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        let profiles_dir = base.join("profiles");

        fs::create_dir_all(&profiles_dir)?;

        let profile_id = resolve_profile_id(profile_name);
        let db_path = profiles_dir.join(format!("{profile_id}.db"));
        let store = Store::open(&db_path)?;

        Ok(Self {
            store,
            profile_id,
            db_path: Some(db_path),
            base_dir: Some(base),
        })
    }

    /// Open with an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            store: Store::open_in_memory()?,
            profile_id: "test".to_string(),
            db_path: None,
            base_dir: None,
        })
    }

    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Give up the profile wrapper, keeping the open connection.
    pub fn into_store(self) -> Store {
        self.store
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Database file size in bytes, zero for in-memory stores.
    pub fn db_size(&self) -> u64 {
        self.db_path
            .as_deref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// API key for the remote scorer, from `api_key` in `<base>/config.toml`.
    /// The CLERK_API_KEY environment variable takes precedence at the CLI.
    pub fn load_api_key(&self) -> Option<String> {
        #[derive(serde::Deserialize)]
        struct Config {
            api_key: Option<String>,
        }

        let base = self.base_dir.as_deref()?;
        let path = base.join("config.toml");
        let content = fs::read_to_string(&path).ok()?;
        match toml::from_str::<Config>(&content) {
            Ok(config) => config.api_key.filter(|k| !k.is_empty()),
            Err(e) => {
                tracing::warn!("ignoring malformed {}: {e}", path.display());
                None
            }
        }
    }

    /// Load the keyword lexicon. A `lexicon.toml` in the base directory
    /// overrides the built-in tables (tables it omits keep their defaults);
    /// a missing file means defaults, a malformed one is logged and skipped.
    pub fn load_lexicon(&self) -> Lexicon {
        let Some(base) = self.base_dir.as_deref() else {
            return Lexicon::default();
        };
        let path = base.join("lexicon.toml");
        let Ok(content) = fs::read_to_string(&path) else {
            return Lexicon::default();
        };
        match toml::from_str(&content) {
            Ok(lexicon) => lexicon,
            Err(e) => {
                tracing::warn!("ignoring malformed {}: {e}", path.display());
                Lexicon::default()
            }
        }
    }
}
