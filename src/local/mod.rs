//! Local store - the slot inventory and purchase ledger in one SQLite file.
//!
//! Stored in a `.slotvault/` directory within the working tree:
//! - `inventory.sqlite` - platforms, accounts, slots, customers, purchases

mod config;
mod db;
pub mod models;
pub mod queries;

pub use config::VaultConfig;
pub use db::SlotDb;

use std::path::{Path, PathBuf};

/// The name of the store directory.
pub const STORE_DIR_NAME: &str = ".slotvault";

/// The database file inside the store directory.
pub const DB_FILE_NAME: &str = "inventory.sqlite";

/// Find the `.slotvault/` directory by walking up from the given path.
pub fn find_store_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let store_dir = current.join(STORE_DIR_NAME);
        if store_dir.is_dir() {
            return Some(store_dir);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Get the store directory for the current working directory.
pub fn get_store_dir() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| find_store_root(&cwd))
}
