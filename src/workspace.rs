//! Workspace management for orpheus operations

use crate::error::{OrpheusError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the workspace directory
pub const WORKSPACE_DIR: &str = ".orpheus";

/// Environment variable consulted when no principal is configured
pub const USER_ENV: &str = "ORPHEUS_USER";

/// Contents of `.orpheus/config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub version: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<String>,
    /// Database file, relative to the workspace directory
    pub database: String,
    /// Provenance document, relative to the workspace directory
    pub meta_info: String,
    pub default_delimiter: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            version: crate::FORMAT_VERSION.to_string(),
            created: Utc::now(),
            user: None,
            database: "orpheus.duckdb".to_string(),
            meta_info: "meta_info.json".to_string(),
            default_delimiter: crate::DEFAULT_DELIMITER.to_string(),
        }
    }
}

/// Manages the .orpheus workspace directory
#[derive(Debug, Clone)]
pub struct OrpheusWorkspace {
    /// Project root directory (where .orpheus/ lives)
    pub root: PathBuf,
    /// .orpheus/ directory path
    pub orpheus_dir: PathBuf,
}

impl OrpheusWorkspace {
    /// Find existing workspace or create a new one
    pub fn find_or_create(start_dir: Option<&Path>) -> Result<Self> {
        let current_dir = std::env::current_dir()?;
        let start = start_dir.unwrap_or(&current_dir);

        if let Some(workspace) = Self::find_existing(start)? {
            return Ok(workspace);
        }

        Self::create_new(start.to_path_buf())
    }

    /// Find existing .orpheus workspace by walking up directory tree
    fn find_existing(start_dir: &Path) -> Result<Option<Self>> {
        let mut current = start_dir;

        loop {
            let orpheus_dir = current.join(WORKSPACE_DIR);
            if orpheus_dir.is_dir() {
                return Ok(Some(Self::from_root(current.to_path_buf())));
            }

            // A git repository root without a workspace stops the walk
            if current.join(".git").exists() {
                break;
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Ok(None)
    }

    /// Create a new workspace in the specified root directory
    pub fn create_new(root: PathBuf) -> Result<Self> {
        let workspace = Self::from_root(root);

        fs::create_dir_all(&workspace.orpheus_dir)?;
        if !workspace.config_path().exists() {
            workspace.save_config(&WorkspaceConfig::default())?;
        }
        workspace.ensure_gitignore()?;

        log::info!("Created orpheus workspace at: {}", workspace.root.display());
        Ok(workspace)
    }

    pub fn from_root(root: PathBuf) -> Self {
        let orpheus_dir = root.join(WORKSPACE_DIR);
        Self { root, orpheus_dir }
    }

    pub fn config_path(&self) -> PathBuf {
        self.orpheus_dir.join("config.json")
    }

    /// Backing database file
    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(self.orpheus_dir.join(self.load_config()?.database))
    }

    /// Provenance document
    pub fn meta_info_path(&self) -> Result<PathBuf> {
        Ok(self.orpheus_dir.join(self.load_config()?.meta_info))
    }

    /// Read the config file, falling back to defaults when it is absent
    pub fn load_config(&self) -> Result<WorkspaceConfig> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(WorkspaceConfig::default());
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            OrpheusError::config(format!("{} is not a valid config file: {}", path.display(), e))
        })
    }

    pub fn save_config(&self, config: &WorkspaceConfig) -> Result<()> {
        fs::create_dir_all(&self.orpheus_dir)?;
        fs::write(self.config_path(), serde_json::to_string_pretty(config)?)?;
        Ok(())
    }

    /// Store the principal that subsequent commands act as
    pub fn set_user(&self, user: &str) -> Result<()> {
        let user = user.trim();
        if user.is_empty() {
            return Err(OrpheusError::bad_parameters("User name is empty"));
        }
        let mut config = self.load_config()?;
        config.user = Some(user.to_string());
        self.save_config(&config)?;
        log::info!("Workspace user set to {}", user);
        Ok(())
    }

    /// Resolve the acting principal: explicit override, then config, then environment
    pub fn resolve_user(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(user) = explicit.map(str::trim).filter(|u| !u.is_empty()) {
            return Ok(user.to_string());
        }
        if let Some(user) = self.load_config()?.user.filter(|u| !u.trim().is_empty()) {
            return Ok(user);
        }
        match std::env::var(USER_ENV) {
            Ok(user) if !user.trim().is_empty() => Ok(user.trim().to_string()),
            _ => Err(OrpheusError::config(format!(
                "No user configured; run `orpheus config --user NAME` or set {}",
                USER_ENV
            ))),
        }
    }

    /// Resolve a user supplied path against the workspace root
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Ensure .gitignore keeps the database out of version control
    pub fn ensure_gitignore(&self) -> Result<()> {
        let gitignore_path = self.root.join(".gitignore");
        let orpheus_ignore = "# Ignore the orpheus version store\n.orpheus/*.duckdb\n.orpheus/*.duckdb.wal\n";

        if gitignore_path.exists() {
            let content = fs::read_to_string(&gitignore_path)?;
            if !content.contains(".orpheus/*.duckdb") {
                let new_content = if content.ends_with('\n') {
                    format!("{}\n{}", content, orpheus_ignore)
                } else {
                    format!("{}\n\n{}", content, orpheus_ignore)
                };
                fs::write(gitignore_path, new_content)?;
                log::info!("Updated .gitignore with orpheus entries");
            }
        } else {
            fs::write(gitignore_path, orpheus_ignore)?;
            log::info!("Created .gitignore with orpheus entries");
        }

        Ok(())
    }
}
