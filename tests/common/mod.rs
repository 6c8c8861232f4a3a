#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_loader::database::{Database, SqliteDatabase};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read temp file")
    }

    pub fn database_path(&self) -> PathBuf {
        self.temp_dir.path().join("load.sqlite")
    }
}

/// Every row of `table` in `ORDER BY` of its first-to-last columns, NULL as "".
pub fn table_rows(db: &dyn Database, table: &str) -> Vec<Vec<String>> {
    let columns = db.column_names(table).expect("table columns");
    let order = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let mut rows = Vec::new();
    db.for_each_row(&format!("SELECT * FROM \"{table}\" ORDER BY {order}"), &mut |row| {
        rows.push(row.into_iter().map(Option::unwrap_or_default).collect());
        Ok(())
    })
    .expect("select rows");
    rows
}

pub fn open_memory_db() -> SqliteDatabase {
    SqliteDatabase::open_in_memory().expect("open in-memory sqlite")
}
