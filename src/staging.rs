use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

pub struct Transaction {
    dir: TempDir,
    staging_root: PathBuf,
}

impl Transaction {
    pub fn begin(output_root: &Path) -> Result<Self> {
        let parent = match output_root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).with_context(|| format!("create {}", parent.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(".vpack-txn-")
            .tempdir_in(&parent)
            .with_context(|| format!("create staging dir in {}", parent.display()))?;
        let staging_root = dir.path().join("staging");
        fs::create_dir_all(&staging_root).context("create staging dir")?;
        Ok(Self { dir, staging_root })
    }

    pub fn stage_bytes(&self, rel_path: &str, bytes: &[u8]) -> Result<()> {
        write_staged_bytes(&self.staging_root, rel_path, bytes)
    }

    pub fn stage_json<T: serde::Serialize>(&self, rel_path: &str, value: &T) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(value).context("serialize staged JSON")?;
        bytes.push(b'\n');
        write_staged_bytes(&self.staging_root, rel_path, &bytes)
    }

    pub fn publish(self, output_root: &Path) -> Result<Vec<PathBuf>> {
        let published = publish_staging(&self.staging_root, output_root)?;
        tracing::debug!(
            txn = %self.dir.path().display(),
            files = published.len(),
            "staging published"
        );
        Ok(published)
    }
}

/// Reject paths that would land outside the staging root.
fn checked_rel_path(rel_path: &str) -> Result<&Path> {
    let path = Path::new(rel_path);
    let escapes = path
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if rel_path.is_empty() || escapes {
        return Err(anyhow!("output path {rel_path:?} must stay inside the output root"));
    }
    Ok(path)
}

pub fn write_staged_bytes(staging_root: &Path, rel_path: &str, bytes: &[u8]) -> Result<()> {
    let staging_path = staging_root.join(checked_rel_path(rel_path)?);
    if let Some(parent) = staging_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&staging_path, bytes).with_context(|| format!("write {}", staging_path.display()))?;
    Ok(())
}

pub fn publish_staging(staging_root: &Path, output_root: &Path) -> Result<Vec<PathBuf>> {
    if !staging_root.exists() {
        return Ok(Vec::new());
    }
    let files = collect_files_recursive(staging_root)?;
    let txn_root = staging_root
        .parent()
        .ok_or_else(|| anyhow!("staging root has no parent"))?;
    let backup_root = txn_root.join("backup");
    fs::create_dir_all(&backup_root)
        .with_context(|| format!("create {}", backup_root.display()))?;
    let mut published = Vec::new();
    let mut backups: Vec<(PathBuf, PathBuf)> = Vec::new();
    let mut created: Vec<PathBuf> = Vec::new();
    for file in files {
        let rel = file
            .strip_prefix(staging_root)
            .context("strip staging prefix")?;
        let dest = output_root.join(rel);
        if dest.exists() {
            let backup = backup_root.join(rel);
            if let Some(parent) = backup.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::rename(&dest, &backup)
                .or_else(|_| fs::copy(&dest, &backup).map(|_| ()))
                .with_context(|| format!("backup {}", dest.display()))?;
            backups.push((dest.clone(), backup));
        } else {
            created.push(dest.clone());
        }

        if let Err(err) = publish_file(&file, &dest) {
            tracing::warn!(dest = %dest.display(), "publish failed; rolling back");
            rollback_publish(&published, &backups, &created);
            return Err(err);
        }
        published.push(dest);
    }
    Ok(published)
}

pub fn collect_files_recursive(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            files.extend(collect_files_recursive(&path)?);
        } else if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn publish_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("staged");
    let tmp_path = dest
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    fs::copy(source, &tmp_path).with_context(|| format!("publish {}", dest.display()))?;
    fs::rename(&tmp_path, dest).with_context(|| format!("publish {}", dest.display()))?;
    Ok(())
}

fn rollback_publish(published: &[PathBuf], backups: &[(PathBuf, PathBuf)], created: &[PathBuf]) {
    for path in published.iter().chain(created) {
        if path.exists() {
            let _ = fs::remove_file(path);
        }
    }
    for (dest, backup) in backups {
        if let Some(parent) = dest.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = fs::rename(backup, dest).or_else(|_| fs::copy(backup, dest).map(|_| ()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_replaces_existing_files_and_keeps_others() {
        let root = tempfile::tempdir().expect("tempdir");
        let out = root.path().join("dist");
        fs::create_dir_all(out.join("agents")).expect("mkdir");
        fs::write(out.join("agents/old.json"), "old").expect("write");
        fs::write(out.join("agents/a.json"), "stale").expect("write");

        let txn = Transaction::begin(&out).expect("begin");
        txn.stage_bytes("agents/a.json", b"fresh").expect("stage");
        txn.stage_json("build-report.json", &serde_json::json!({ "ok": true }))
            .expect("stage json");
        let published = txn.publish(&out).expect("publish");

        assert_eq!(published.len(), 2);
        assert_eq!(fs::read_to_string(out.join("agents/a.json")).expect("read"), "fresh");
        assert_eq!(fs::read_to_string(out.join("agents/old.json")).expect("read"), "old");
        assert!(fs::read_to_string(out.join("build-report.json"))
            .expect("read")
            .ends_with("}\n"));
        let leftovers: Vec<_> = fs::read_dir(root.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".vpack-txn-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn staged_paths_cannot_escape() {
        let root = tempfile::tempdir().expect("tempdir");
        let txn = Transaction::begin(&root.path().join("dist")).expect("begin");
        assert!(txn.stage_bytes("../evil.txt", b"x").is_err());
        assert!(txn.stage_bytes("/abs.txt", b"x").is_err());
        assert!(txn.stage_bytes("", b"x").is_err());
        assert!(txn.stage_bytes("./ok/fine.txt", b"x").is_ok());
    }

    #[test]
    fn collected_files_are_sorted() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(root.path().join("b")).expect("mkdir");
        fs::write(root.path().join("b/z.txt"), "").expect("write");
        fs::write(root.path().join("a.txt"), "").expect("write");
        fs::write(root.path().join("c.txt"), "").expect("write");
        let files = collect_files_recursive(root.path()).expect("collect");
        let names: Vec<_> = files
            .iter()
            .map(|path| path.strip_prefix(root.path()).expect("prefix").to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![PathBuf::from("a.txt"), PathBuf::from("b/z.txt"), PathBuf::from("c.txt")]
        );
    }
}
