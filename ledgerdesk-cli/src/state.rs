use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// `$LEDGERDESK_HOME`, else `~/.ledgerdesk`.
pub fn ledgerdesk_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LEDGERDESK_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".ledgerdesk"))
}

pub fn ensure_ledgerdesk_home() -> Result<PathBuf> {
    let dir = ledgerdesk_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn sent_keys_path() -> Result<PathBuf> {
    Ok(ensure_ledgerdesk_home()?
        .join("reminders")
        .join("sent_keys.txt"))
}

/// Reminder dedupe keys delivered by earlier runs, one per line.
pub fn read_sent_keys(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let f = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(BufReader::new(f)
        .lines()
        .map_while(|l| l.ok())
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

pub fn append_sent_keys<'a>(path: &Path, keys: impl IntoIterator<Item = &'a str>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    for k in keys {
        writeln!(f, "{k}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_keys_round_trip_through_append_log() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("reminders/sent_keys.txt");
        assert!(read_sent_keys(&p).unwrap().is_empty());

        append_sent_keys(&p, ["task-a:undated", "task-b:1763686800:0"]).unwrap();
        append_sent_keys(&p, ["task-a:undated"]).unwrap();

        let keys = read_sent_keys(&p).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("task-b:1763686800:0"));
    }
}
