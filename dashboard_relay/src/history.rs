use chrono::{DateTime, Local};
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("failed to read detection history: {0}")]
    Io(#[from] io::Error),
}

/// A saved accident frame on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub filename: String,
    pub path: String,
    pub lane: String,
    pub timestamp: String,
    pub display_time: String,
}

/// Lane number from a name like `accident_lane3_20260205_142315_123.jpg`.
pub fn parse_lane(filename: &str) -> String {
    filename
        .trim_end_matches(".jpg")
        .split('_')
        .find_map(|part| part.strip_prefix("lane"))
        .unwrap_or("?")
        .to_string()
}

fn entry(path: PathBuf, modified: SystemTime) -> HistoryEntry {
    let modified: DateTime<Local> = modified.into();
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    HistoryEntry {
        lane: parse_lane(&filename),
        filename,
        path: path.to_string_lossy().into_owned(),
        timestamp: modified.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        display_time: modified.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// Newest-first listing of the `.jpg` files in `dir`, at most `limit`.
/// A directory that does not exist yet has no history.
pub async fn list_history(dir: &Path, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(dir_entry) = read_dir.next_entry().await? {
        let path = dir_entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("jpg") {
            continue;
        }
        let metadata = dir_entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        files.push((metadata.modified()?, path));
    }

    files.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(files
        .into_iter()
        .take(limit)
        .map(|(modified, path)| entry(path, modified))
        .collect())
}

/// Resolves a requested image to a file inside `dir`. Only the final path
/// component of `filename` is used.
pub async fn resolve_image(dir: &Path, filename: &str) -> Option<PathBuf> {
    let name = Path::new(filename).file_name()?;
    let path = dir.join(name);

    match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => Some(path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs::File, time::Duration};

    fn touch(dir: &Path, name: &str, age: Duration) {
        let file = File::create(dir.join(name)).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_parse_lane() {
        assert_eq!(parse_lane("accident_lane3_20260205_142315_123.jpg"), "3");
        assert_eq!(parse_lane("lane12.jpg"), "12");
        assert_eq!(parse_lane("accident_20260205.jpg"), "?");
    }

    #[tokio::test]
    async fn test_list_history_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "accident_lane1_a.jpg", Duration::from_secs(300));
        touch(dir.path(), "accident_lane2_b.jpg", Duration::from_secs(10));
        touch(dir.path(), "accident_c.jpg", Duration::from_secs(100));
        touch(dir.path(), "notes.txt", Duration::from_secs(1));

        let history = list_history(dir.path(), 100).await.unwrap();

        let names: Vec<_> = history.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["accident_lane2_b.jpg", "accident_c.jpg", "accident_lane1_a.jpg"]
        );
        assert_eq!(history[0].lane, "2");
        assert_eq!(history[1].lane, "?");
        assert!(history[0].path.ends_with("accident_lane2_b.jpg"));
        assert_eq!(history[0].display_time.len(), "2026-02-05 14:23:15".len());
    }

    #[tokio::test]
    async fn test_list_history_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            touch(
                dir.path(),
                &format!("accident_lane{}_x.jpg", i),
                Duration::from_secs(i * 10),
            );
        }

        let history = list_history(dir.path(), 2).await.unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].lane, "0");
        assert_eq!(history[1].lane, "1");
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = list_history(&dir.path().join("missing"), 10).await.unwrap();

        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_image_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "accident_lane1_a.jpg", Duration::ZERO);

        assert_eq!(
            resolve_image(dir.path(), "../../accident_lane1_a.jpg").await,
            Some(dir.path().join("accident_lane1_a.jpg"))
        );
        assert_eq!(resolve_image(dir.path(), "missing.jpg").await, None);
        assert_eq!(resolve_image(dir.path(), "..").await, None);
    }
}
