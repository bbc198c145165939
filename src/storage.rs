/*!
    Loads and saves the task list as a JSON file.
!*/
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::error::Result;
use crate::store::TaskStore;

/// Loads the store from `path`. A missing file is an empty list.
pub fn load(path: &Path) -> Result<TaskStore> {
    let mut store = TaskStore::new();
    match fs::read(path) {
        Ok(bytes) => {
            store.deserialize_json(&bytes)?;
            info!(path = %path.display(), count = store.len(), "loaded tasks");
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no task file yet, starting empty");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(store)
}

/// Writes the store to `path`, replacing the previous file only once the
/// new contents are fully on disk.
pub fn save(path: &Path, store: &TaskStore) -> Result<()> {
    let bytes = store.serialize_json()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    info!(path = %path.display(), count = store.len(), "saved tasks");
    Ok(())
}

/// Reads a CSV document from `path` into the store.
pub fn import_csv(path: &Path, store: &mut TaskStore) -> Result<usize> {
    let text = fs::read_to_string(path)?;
    let count = store.import_csv(&text)?;
    info!(path = %path.display(), count, "imported tasks from CSV");
    Ok(count)
}

pub fn export_csv(path: &Path, store: &TaskStore) -> Result<()> {
    fs::write(path, store.export_csv())?;
    info!(path = %path.display(), count = store.len(), "exported tasks to CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::error::Error;
    use crate::task::Priority;

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let store = load(&dir.path().join("tasks.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tasks.json");
        let mut store = TaskStore::new();
        store.add("Buy milk", "Errand", Priority::Medium, "2024-01-01").unwrap();
        store.add("Call bank", "Finance", Priority::High, "").unwrap();

        save(&path, &store).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.tasks(), store.tasks());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let mut store = TaskStore::new();
        store.add("first", "", Priority::Low, "").unwrap();
        save(&path, &store).unwrap();
        store.remove(0).unwrap();
        save(&path, &store).unwrap();
        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, "{ not a list").unwrap();
        assert!(matches!(load(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_csv_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        let mut store = TaskStore::new();
        store.add("Buy milk", "Errand", Priority::Medium, "").unwrap();
        export_csv(&path, &store).unwrap();

        let mut imported = TaskStore::new();
        assert_eq!(import_csv(&path, &mut imported).unwrap(), 1);
        assert_eq!(imported.tasks(), store.tasks());
    }
}
