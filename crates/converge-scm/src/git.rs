//! `GitScm`: a `ScmPort` implementation that drives the system `git` binary
//! as a subprocess. Ported from the reference's `scm.py`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, bail};
use converge_types::Simulation;

use crate::port::{LogEntry, ScmPort};

pub struct GitScm {
    cwd: PathBuf,
}

impl GitScm {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        GitScm { cwd: cwd.into() }
    }

    fn git(&self, args: &[&str]) -> Result<Output> {
        self.git_in(&self.cwd, args)
    }

    fn git_in(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .with_context(|| format!("failed to run git {}", args.join(" ")))
    }

    fn repo_root(&self) -> Result<PathBuf> {
        let out = self.git(&["rev-parse", "--show-toplevel"])?;
        if !out.status.success() {
            bail!("git rev-parse --show-toplevel failed: {}", String::from_utf8_lossy(&out.stderr));
        }
        Ok(PathBuf::from(String::from_utf8_lossy(&out.stdout).trim()))
    }
}

fn parse_conflicts(stderr: &str, stdout: &str) -> Vec<String> {
    let mut conflicts: Vec<String> = Vec::new();
    for line in stderr.lines() {
        if !line.contains("CONFLICT") {
            continue;
        }
        if let Some(pos) = line.find(" in ") {
            let after = &line[pos + 4..];
            if let Some(token) = after.split_whitespace().next() {
                conflicts.push(token.trim_end_matches('.').to_string());
            }
        }
    }

    if conflicts.is_empty() {
        let mut set = BTreeSet::new();
        for line in stdout.lines() {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() == 2 {
                set.insert(parts[1].to_string());
            }
        }
        conflicts = set.into_iter().collect();
    }

    conflicts
}

impl ScmPort for GitScm {
    fn simulate_merge(&self, source: &str, target: &str) -> Result<Simulation> {
        let root = self.repo_root()?;
        let merge_tree = self.git_in(&root, &["merge-tree", "--write-tree", target, source])?;

        let diff = self.git_in(&root, &["diff-tree", "--no-commit-id", "--name-only", "-r", target, source])?;
        let files: Vec<String> = String::from_utf8_lossy(&diff.stdout)
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect();

        let mergeable = merge_tree.status.success();
        let conflicts = if mergeable {
            Vec::new()
        } else {
            parse_conflicts(&String::from_utf8_lossy(&merge_tree.stderr), &String::from_utf8_lossy(&merge_tree.stdout))
        };

        Ok(Simulation {
            mergeable,
            conflicts,
            files_changed: files,
            source: source.to_string(),
            target: target.to_string(),
            timestamp: converge_types::now(),
        })
    }

    fn execute_merge_safe(&self, source: &str, target: &str) -> Result<String> {
        let root = self.repo_root()?;
        let worktree_dir = tempfile_dir("converge-merge-")?;

        let result = (|| -> Result<String> {
            let add = self.git_in(&root, &["worktree", "add", "--detach", worktree_dir.to_str().unwrap(), target])?;
            if !add.status.success() {
                bail!("git worktree add failed: {}", String::from_utf8_lossy(&add.stderr));
            }

            let message = format!("converge: merge {source} into {target}");
            let merge = self.git_in(&worktree_dir, &["merge", "--no-ff", source, "-m", &message])?;
            if !merge.status.success() {
                bail!("git merge failed: {}", String::from_utf8_lossy(&merge.stderr));
            }

            let head = self.git_in(&worktree_dir, &["rev-parse", "HEAD"])?;
            if !head.status.success() {
                bail!("git rev-parse HEAD failed: {}", String::from_utf8_lossy(&head.stderr));
            }
            let sha = String::from_utf8_lossy(&head.stdout).trim().to_string();

            let refname = format!("refs/heads/{target}");
            let update = self.git_in(&root, &["update-ref", &refname, &sha])?;
            if !update.status.success() {
                bail!("git update-ref failed: {}", String::from_utf8_lossy(&update.stderr));
            }

            Ok(sha)
        })();

        let remove = self.git_in(&root, &["worktree", "remove", "--force", worktree_dir.to_str().unwrap()]);
        if remove.map(|o| !o.status.success()).unwrap_or(true) {
            let _ = std::fs::remove_dir_all(&worktree_dir);
            let _ = self.git_in(&root, &["worktree", "prune"]);
        }

        result
    }

    fn log_entries(&self, max_commits: usize) -> Result<Vec<LogEntry>> {
        const SEP: &str = "---CONVERGE_ENTRY---";
        let fmt = format!("{SEP}%n%H%n%an%n%aI%n%s");
        let count_arg = format!("--max-count={max_commits}");
        let format_arg = format!("--format={fmt}");
        let out = self.git(&["log", &count_arg, &format_arg, "--name-only"])?;
        if !out.status.success() {
            return Ok(Vec::new());
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        let mut entries = Vec::new();
        for block in stdout.split(SEP) {
            let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
            if lines.len() < 4 {
                continue;
            }
            let files: Vec<String> =
                lines[4..].iter().filter(|f| !f.starts_with("Merge")).map(|s| s.to_string()).collect();
            entries.push(LogEntry {
                sha: lines[0].to_string(),
                author: lines[1].to_string(),
                date: lines[2].to_string(),
                subject: lines[3].to_string(),
                files,
            });
        }
        Ok(entries)
    }
}

fn tempfile_dir(prefix: &str) -> Result<PathBuf> {
    let dir = tempfile::Builder::new().prefix(prefix).tempdir().context("failed to create temp worktree dir")?;
    Ok(dir.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_conflicts_reads_conflict_lines() {
        let stderr = "CONFLICT (content): Merge conflict in src/a.py\nCONFLICT (add/add): Merge conflict in src/b.py\n";
        let conflicts = parse_conflicts(stderr, "");
        assert_eq!(conflicts, vec!["src/a.py", "src/b.py"]);
    }

    #[test]
    fn parse_conflicts_falls_back_to_tree_entries() {
        let stdout = "100644 abc123 1\tsrc/a.py\n100644 def456 2\tsrc/a.py\n";
        let conflicts = parse_conflicts("", stdout);
        assert_eq!(conflicts, vec!["src/a.py"]);
    }

    #[test]
    fn parse_conflicts_empty_when_no_markers() {
        assert!(parse_conflicts("", "").is_empty());
    }
}
