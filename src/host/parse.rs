//! Parsers for git plumbing output
//!
//! Formats are requested with NUL / RS separators wherever free text can
//! appear, so messages containing newlines survive intact.

use std::collections::BTreeMap;

use crate::git::types::{
    BranchDescriptor, CommitInfo, GitStatusSnapshot, RemoteInfo, StashEntry, StatusKind, TagInfo,
};

/// `git log` pretty format: full sha, subject, body, author, email, ISO date
pub const LOG_FORMAT: &str = "%H%x00%s%x00%b%x00%an%x00%ae%x00%aI%x1e";

/// `git for-each-ref refs/heads` format: name, sha, `*` when checked out
pub const BRANCH_FORMAT: &str = "%(refname:short)%00%(objectname)%00%(HEAD)";

/// `git for-each-ref refs/tags` format: name, object, peeled commit
pub const TAG_FORMAT: &str = "%(refname:short)%00%(objectname)%00%(*objectname)";

/// Classify one porcelain XY code.
///
/// Untracked wins outright, then staged additions, then deletions on either
/// side; everything else that changed is a modification.
pub fn classify_porcelain(x: char, y: char) -> Option<StatusKind> {
    match (x, y) {
        ('?', '?') => Some(StatusKind::Untracked),
        ('!', '!') => None,
        ('A', _) | ('R', _) | ('C', _) => Some(StatusKind::Added),
        ('D', _) | (_, 'D') => Some(StatusKind::Deleted),
        (' ', ' ') => None,
        _ => Some(StatusKind::Modified),
    }
}

/// Parse `git status --porcelain=v1 -z` into the four status buckets.
///
/// Format: `XY PATH\0` or `XY NEW\0ORIG\0` for renames/copies. The original
/// side of a staged rename shows up as deleted.
pub fn parse_porcelain_status(output: &str) -> GitStatusSnapshot {
    let mut snapshot = GitStatusSnapshot::default();
    let parts: Vec<&str> = output.split('\0').collect();

    let mut i = 0;
    while i < parts.len() {
        let part = parts[i];
        i += 1;
        if part.len() < 4 {
            continue;
        }

        let mut chars = part.chars();
        let x = chars.next().unwrap_or(' ');
        let y = chars.next().unwrap_or(' ');
        let path = &part[3..];

        let renamed = matches!(x, 'R' | 'C') || matches!(y, 'R' | 'C');
        let orig = if renamed && i < parts.len() && !parts[i].is_empty() {
            let orig = parts[i];
            i += 1;
            Some(orig)
        } else {
            None
        };

        if let Some(kind) = classify_porcelain(x, y) {
            snapshot.insert(kind, path);
        }
        if let (Some(orig), 'R') = (orig, x) {
            if snapshot.kind_of(orig).is_none() {
                snapshot.insert(StatusKind::Deleted, orig);
            }
        }
    }

    snapshot
}

/// Parse records produced with [`LOG_FORMAT`].
pub fn parse_log(output: &str) -> Vec<CommitInfo> {
    output
        .split('\x1e')
        .filter_map(|record| {
            let record = record.trim_start_matches('\n');
            if record.trim().is_empty() {
                return None;
            }
            let fields: Vec<&str> = record.split('\x00').collect();
            if fields.len() < 6 {
                return None;
            }
            let subject = fields[1].trim();
            let body = fields[2].trim();
            let message = if body.is_empty() {
                subject.to_string()
            } else {
                format!("{}\n\n{}", subject, body)
            };
            Some(CommitInfo {
                id: fields[0].trim().to_string(),
                message,
                author: fields[3].to_string(),
                email: fields[4].to_string(),
                timestamp: fields[5].trim().to_string(),
            })
        })
        .collect()
}

/// Parse lines produced with [`BRANCH_FORMAT`].
pub fn parse_branches(output: &str) -> Vec<BranchDescriptor> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\0');
            let name = fields.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let commit = fields.next().unwrap_or("").trim();
            let head = fields.next().unwrap_or("").trim();
            Some(BranchDescriptor {
                name: name.to_string(),
                current: head == "*",
                commit: commit.to_string(),
            })
        })
        .collect()
}

/// Parse lines produced with [`TAG_FORMAT`]; annotated tags use the peeled commit.
pub fn parse_tags(output: &str) -> Vec<TagInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\0');
            let name = fields.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let object = fields.next().unwrap_or("").trim();
            let peeled = fields.next().unwrap_or("").trim();
            Some(TagInfo {
                name: name.to_string(),
                commit: if peeled.is_empty() { object } else { peeled }.to_string(),
            })
        })
        .collect()
}

/// Parse `git remote -v`, keeping the fetch URL of each remote.
pub fn parse_remotes(output: &str) -> Vec<RemoteInfo> {
    let mut remotes: BTreeMap<String, String> = BTreeMap::new();
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(url)) = (fields.next(), fields.next()) else {
            continue;
        };
        let kind = fields.next().unwrap_or("(fetch)");
        if kind == "(fetch)" || !remotes.contains_key(name) {
            remotes.insert(name.to_string(), url.to_string());
        }
    }
    remotes
        .into_iter()
        .map(|(name, url)| RemoteInfo { name, url })
        .collect()
}

/// Parse `git stash list --format=%gs`; line order is the stash index.
pub fn parse_stash_list(output: &str) -> Vec<StashEntry> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(index, message)| StashEntry {
            index,
            message: message.trim().to_string(),
        })
        .collect()
}

/// Paths out of `git clean` output ("Would remove x" / "Removing x").
pub fn parse_clean_output(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            line.strip_prefix("Would remove ")
                .or_else(|| line.strip_prefix("Removing "))
                .map(|p| p.trim().to_string())
        })
        .filter(|p| !p.is_empty())
        .collect()
}
