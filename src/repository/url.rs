//! Advisory git URL validation
//!
//! Used to give early feedback in the clone dialog. This is not a security
//! boundary; the backend decides what it can actually clone.

use url::Url;

/// Hosts accepted in the https form
const KNOWN_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];

/// Accepts `https://{github,gitlab,bitbucket}/owner/repo[.git]` and the
/// `git@host:owner/repo.git` SSH shorthand.
pub fn is_valid_git_url(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() {
        return false;
    }

    if let Some(rest) = raw.strip_prefix("git@") {
        return is_valid_ssh_shorthand(rest);
    }

    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return false,
    };
    if url.scheme() != "https" || url.query().is_some() || url.fragment().is_some() {
        return false;
    }

    let host = match url.host_str() {
        Some(h) => h.trim_start_matches("www."),
        None => return false,
    };
    if !KNOWN_HOSTS.contains(&host) {
        return false;
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    has_owner_and_repo(&segments)
}

fn is_valid_ssh_shorthand(rest: &str) -> bool {
    let Some((host, path)) = rest.split_once(':') else {
        return false;
    };
    if !is_hostname(host) {
        return false;
    }
    let Some(path) = path.strip_suffix(".git") else {
        return false;
    };
    let segments: Vec<&str> = path.split('/').collect();
    has_owner_and_repo(&segments)
}

/// owner/repo, plus nested groups (gitlab)
fn has_owner_and_repo(segments: &[&str]) -> bool {
    segments.len() >= 2 && segments.iter().all(|s| is_path_segment(s))
}

fn is_path_segment(s: &str) -> bool {
    let s = s.strip_suffix(".git").unwrap_or(s);
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn is_hostname(host: &str) -> bool {
    host.contains('.')
        && !host.starts_with('.')
        && !host.ends_with('.')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_known_shapes() {
        assert!(is_valid_git_url("https://github.com/org/repo.git"));
        assert!(is_valid_git_url("https://github.com/org/repo"));
        assert!(is_valid_git_url("https://gitlab.com/group/sub/repo.git"));
        assert!(is_valid_git_url("https://bitbucket.org/team/repo"));
        assert!(is_valid_git_url("git@gitlab.com:org/repo.git"));
        assert!(is_valid_git_url("git@github.com:my-org/my_repo.git"));
        assert!(is_valid_git_url("  https://github.com/org/repo.git  "));
    }

    #[test]
    fn test_rejects_other_shapes() {
        assert!(!is_valid_git_url("not-a-url"));
        assert!(!is_valid_git_url("ftp://example.com/repo"));
        assert!(!is_valid_git_url(""));
        assert!(!is_valid_git_url("http://github.com/org/repo.git"));
        assert!(!is_valid_git_url("https://example.com/org/repo.git"));
        assert!(!is_valid_git_url("https://github.com/org"));
        assert!(!is_valid_git_url("git@gitlab.com:org/repo"));
        assert!(!is_valid_git_url("git@localhost:org/repo.git"));
        assert!(!is_valid_git_url("https://github.com/org/repo?tab=code"));
    }
}
