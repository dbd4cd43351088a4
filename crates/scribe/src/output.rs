use crate::error::{IoContext, Result, ScribeError};
use crate::theme::ThemeEngine;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::warn;

/// Stages every managed file next to `output_dir`, then moves each one into
/// place. Returns the number of files written.
///
/// Conflicting entries in the destination are detected before anything is
/// moved. If a move still fails, every file already moved is put back and
/// the directories created for it are removed.
pub(crate) fn write_output(
    theme: &ThemeEngine,
    pages: &[(PathBuf, String)],
    output_dir: &Path,
) -> Result<usize> {
    let parent = output_dir
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent).io_context("creating", parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".scribe-staging-")
        .tempdir_in(parent)
        .io_context("creating staging directory in", parent)?;

    let mut managed = theme.copy_static(staging.path())?;
    for (relative, contents) in pages {
        let dest = staging.path().join(relative);
        if let Some(dir) = dest.parent() {
            fs::create_dir_all(dir).io_context("creating", dir)?;
        }
        fs::write(&dest, contents).io_context("writing", &dest)?;
        managed.push(relative.clone());
    }
    managed.sort();
    managed.dedup();

    check_targets(output_dir, &managed)?;

    let mut commit = Commit::new(output_dir, parent)?;
    let installed = managed
        .iter()
        .try_for_each(|relative| commit.install(staging.path(), relative));
    if let Err(error) = installed {
        commit.roll_back();
        return Err(error);
    }

    Ok(managed.len())
}

/// Fails if any managed path would need a directory where a file exists, or
/// a file where a directory exists.
fn check_targets(output_dir: &Path, managed: &[PathBuf]) -> Result<()> {
    expect_directory(output_dir)?;

    for relative in managed {
        let mut dir = output_dir.to_path_buf();
        for component in relative.parent().into_iter().flat_map(Path::components) {
            dir.push(component);
            expect_directory(&dir)?;
        }

        let target = output_dir.join(relative);
        if fs::metadata(&target).is_ok_and(|metadata| metadata.is_dir()) {
            return Err(ScribeError::OutputConflict {
                path: target,
                message: "a directory is in the way".to_string(),
            });
        }
    }

    Ok(())
}

fn expect_directory(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(metadata) if !metadata.is_dir() => Err(ScribeError::OutputConflict {
            path: path.to_path_buf(),
            message: "a file is in the way of a directory".to_string(),
        }),
        _ => Ok(()),
    }
}

/// Record of every change made to the destination, so it can be undone.
struct Commit<'a> {
    output_dir: &'a Path,
    backup: TempDir,
    created: Vec<PathBuf>,
    installed: Vec<PathBuf>,
    replaced: Vec<PathBuf>,
}

impl<'a> Commit<'a> {
    fn new(output_dir: &'a Path, parent: &Path) -> Result<Self> {
        let backup = tempfile::Builder::new()
            .prefix(".scribe-backup-")
            .tempdir_in(parent)
            .io_context("creating backup directory in", parent)?;

        Ok(Self {
            output_dir,
            backup,
            created: Vec::new(),
            installed: Vec::new(),
            replaced: Vec::new(),
        })
    }

    fn create_dir(&mut self, dir: &Path) -> Result<()> {
        if dir.as_os_str().is_empty() || dir.is_dir() {
            return Ok(());
        }
        if let Some(parent) = dir.parent() {
            self.create_dir(parent)?;
        }

        fs::create_dir(dir).io_context("creating", dir)?;
        self.created.push(dir.to_path_buf());
        Ok(())
    }

    fn install(&mut self, staging: &Path, relative: &Path) -> Result<()> {
        let from = staging.join(relative);
        let to = self.output_dir.join(relative);
        if let Some(dir) = to.parent() {
            self.create_dir(dir)?;
        }

        if fs::symlink_metadata(&to).is_ok() {
            let kept = self.backup.path().join(relative);
            if let Some(dir) = kept.parent() {
                fs::create_dir_all(dir).io_context("creating", dir)?;
            }
            fs::rename(&to, &kept).io_context("backing up", &to)?;
            self.replaced.push(relative.to_path_buf());
        }

        fs::rename(&from, &to).io_context("moving into place", &to)?;
        self.installed.push(relative.to_path_buf());
        Ok(())
    }

    /// Undoes every move made so far, newest first.
    fn roll_back(self) {
        for relative in self.installed.iter().rev() {
            let path = self.output_dir.join(relative);
            report_undo(fs::remove_file(&path), &path);
        }
        for relative in self.replaced.iter().rev() {
            let path = self.output_dir.join(relative);
            report_undo(fs::rename(self.backup.path().join(relative), &path), &path);
        }
        for dir in self.created.iter().rev() {
            report_undo(fs::remove_dir(dir), dir);
        }
    }
}

fn report_undo(result: std::io::Result<()>, path: &Path) {
    if let Err(error) = result {
        warn!(path = %path.display(), %error, "could not restore destination");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_in_place_of_directory() {
        let output = TempDir::new().unwrap();
        let dest = output.path().join("public");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("zulu"), "plain file").unwrap();

        let managed = vec![
            PathBuf::from("index.html"),
            PathBuf::from("zulu").join("index.html"),
        ];
        match check_targets(&dest, &managed) {
            Err(ScribeError::OutputConflict { path, .. }) => assert_eq!(path, dest.join("zulu")),
            other => panic!("expected output conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_directory_in_place_of_file() {
        let output = TempDir::new().unwrap();
        let dest = output.path().join("public");
        fs::create_dir_all(dest.join("rss.xml")).unwrap();

        assert!(matches!(
            check_targets(&dest, &[PathBuf::from("rss.xml")]),
            Err(ScribeError::OutputConflict { .. })
        ));
    }

    #[test]
    fn test_destination_itself_is_a_file() {
        let output = TempDir::new().unwrap();
        let dest = output.path().join("public");
        fs::write(&dest, "not a directory").unwrap();

        assert!(matches!(
            check_targets(&dest, &[PathBuf::from("index.html")]),
            Err(ScribeError::OutputConflict { .. })
        ));
    }

    #[test]
    fn test_roll_back_restores_destination() {
        let output = TempDir::new().unwrap();
        let dest = output.path().join("public");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("index.html"), "OLD INDEX").unwrap();

        let staging = TempDir::new_in(output.path()).unwrap();
        fs::create_dir_all(staging.path().join("alpha")).unwrap();
        fs::write(staging.path().join("index.html"), "NEW INDEX").unwrap();
        fs::write(staging.path().join("alpha").join("index.html"), "alpha").unwrap();

        let mut commit = Commit::new(&dest, output.path()).unwrap();
        commit.install(staging.path(), Path::new("index.html")).unwrap();
        commit
            .install(staging.path(), &PathBuf::from("alpha").join("index.html"))
            .unwrap();
        assert_eq!(fs::read_to_string(dest.join("index.html")).unwrap(), "NEW INDEX");

        commit.roll_back();

        assert_eq!(fs::read_to_string(dest.join("index.html")).unwrap(), "OLD INDEX");
        assert!(!dest.join("alpha").exists());
    }

    #[test]
    fn test_failed_move_is_undone() {
        let output = TempDir::new().unwrap();
        let dest = output.path().join("public");
        let staging = TempDir::new_in(output.path()).unwrap();
        fs::write(staging.path().join("index.html"), "NEW INDEX").unwrap();

        let mut commit = Commit::new(&dest, output.path()).unwrap();
        commit.install(staging.path(), Path::new("index.html")).unwrap();
        assert!(commit.install(staging.path(), Path::new("missing.html")).is_err());
        commit.roll_back();

        assert!(!dest.exists());
    }
}
