//! Git context discovery.
//!
//! The tracker only needs two facts about a directory: the working tree root
//! and the current branch. Any failure (git missing, not a repository, a
//! subprocess that hangs past its deadline) degrades to "no information".

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::types::GitContext;

pub trait GitContextResolver: Send + Sync {
    fn resolve(&self, cwd: &Path) -> GitContext;
}

/// Resolves context by running the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn run(&self, cwd: &Path, args: &[&str]) -> Option<String> {
        let mut child = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .ok()?;

        // Drained concurrently so a large output cannot stall git on a full pipe.
        let mut stdout = child.stdout.take()?;
        let reader = thread::spawn(move || {
            let mut output = String::new();
            stdout.read_to_string(&mut output).map(|_| output)
        });

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) if start.elapsed() > self.timeout => {
                    debug!(cwd = %cwd.display(), ?args, "git timed out");
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                Ok(None) => thread::sleep(Duration::from_millis(10)),
                Err(_) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
            }
        };

        let output = reader.join().ok()?.ok()?;
        match status {
            Some(status) if status.success() => Some(output.trim().to_string()),
            _ => None,
        }
    }
}

impl GitContextResolver for GitCli {
    fn resolve(&self, cwd: &Path) -> GitContext {
        let Some(root) = self
            .run(cwd, &["rev-parse", "--show-toplevel"])
            .filter(|root| !root.is_empty())
        else {
            return GitContext::outside_repo();
        };

        // `--show-current` prints nothing on a detached HEAD.
        let branch = self
            .run(cwd, &["branch", "--show-current"])
            .filter(|branch| !branch.is_empty());

        GitContext {
            repo: Some(PathBuf::from(root)),
            branch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .expect("run git");
        assert!(status.success(), "git {:?} failed", args);
    }

    #[test]
    fn plain_directory_is_outside_any_repo() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let context = GitCli::default().resolve(temp_dir.path());
        assert_eq!(context, GitContext::outside_repo());
    }

    #[test]
    fn missing_directory_is_outside_any_repo() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let context = GitCli::default().resolve(&temp_dir.path().join("gone"));
        assert_eq!(context, GitContext::outside_repo());
    }

    #[test]
    fn resolves_root_and_branch_from_a_subdirectory() {
        if !git_available() {
            return;
        }
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let root = temp_dir.path().canonicalize().expect("canonical root");
        git(&root, &["init", "-q", "-b", "trunk"]);
        let nested = root.join("src").join("deep");
        std::fs::create_dir_all(&nested).expect("create nested");

        let context = GitCli::default().resolve(&nested);
        let resolved = context.repo.expect("repo root").canonicalize().expect("canonical");
        assert_eq!(resolved, root);
        assert_eq!(context.branch.as_deref(), Some("trunk"));
    }

    #[test]
    fn output_larger_than_a_pipe_buffer_is_read_in_full() {
        if !git_available() {
            return;
        }
        let temp_dir = tempfile::tempdir().expect("temp dir");
        git(temp_dir.path(), &["init", "-q"]);
        for index in 0..2500 {
            let name = format!("untracked-file-number-{index:05}.txt");
            std::fs::write(temp_dir.path().join(name), "").expect("write file");
        }

        let output = GitCli::new(Duration::from_secs(20))
            .run(temp_dir.path(), &["ls-files", "--others"])
            .expect("git output");
        assert!(output.len() > 64 * 1024);
        assert_eq!(output.lines().count(), 2500);
    }
}
