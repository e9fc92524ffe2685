//! Native command handlers
//!
//! One function per bridge command. Each decodes its params, runs git in the
//! resolved working directory and returns the JSON payload for the response.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

use super::cli::{ensure_not_option, failure_text, GitCli, HostError, HostResult, Invocation};
use super::parse::{self, BRANCH_FORMAT, LOG_FORMAT, TAG_FORMAT};
use crate::bridge::GitCommand;
use crate::git::types::*;

/// Params every command may carry
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CommonParams {
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
}

#[derive(Deserialize)]
struct CloneParams {
    url: String,
    #[serde(flatten)]
    opts: CloneOptions,
}

#[derive(Deserialize)]
struct PathsParams {
    #[serde(default)]
    paths: Vec<String>,
}

#[derive(Deserialize)]
struct CommitParams {
    message: String,
    #[serde(default)]
    amend: bool,
}

#[derive(Deserialize)]
struct NameParams {
    name: String,
}

#[derive(Deserialize)]
struct BranchParams {
    name: String,
    #[serde(flatten)]
    opts: BranchOptions,
}

#[derive(Deserialize)]
struct RefParams {
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Deserialize)]
struct DeleteBranchParams {
    name: String,
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
struct RemoteParams {
    name: String,
    url: String,
    #[serde(default)]
    push: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameRemoteParams {
    old_name: String,
    new_name: String,
}

#[derive(Deserialize)]
struct ResetParams {
    #[serde(default)]
    paths: Option<Vec<String>>,
    #[serde(flatten)]
    opts: ResetOptions,
}

#[derive(Deserialize)]
struct CommitRefParams {
    commit: String,
    #[serde(flatten)]
    opts: PickOptions,
}

#[derive(Deserialize)]
struct MergeParams {
    branch: String,
    #[serde(flatten)]
    opts: MergeOptions,
}

#[derive(Deserialize)]
struct RebaseParams {
    #[serde(default)]
    upstream: String,
    #[serde(flatten)]
    opts: RebaseOptions,
}

#[derive(Deserialize)]
struct CherryPickParams {
    commits: Vec<String>,
    #[serde(flatten)]
    opts: PickOptions,
}

#[derive(Deserialize)]
struct TagParams {
    name: String,
    #[serde(flatten)]
    opts: TagOptions,
}

#[derive(Deserialize)]
struct StashIndexParams {
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArchiveParams {
    output_path: String,
    #[serde(flatten)]
    opts: ArchiveOptions,
}

fn decode<T: DeserializeOwned>(params: &Value) -> HostResult<T> {
    let value = if params.is_null() { json!({}) } else { params.clone() };
    Ok(serde_json::from_value(value)?)
}

/// Run one repository command. Working-directory commands are handled by
/// the host itself and never reach this function.
pub(super) fn run(
    cli: &GitCli,
    command: GitCommand,
    dir: &Path,
    params: &Value,
) -> HostResult<Value> {
    let common: CommonParams = decode(params)?;
    let git = cli.at(dir, common.author.as_ref());

    match command {
        GitCommand::GitIsRepository => Ok(json!(is_repository(&git))),
        GitCommand::GitInit => init(&git).map(|_| Value::Null),
        GitCommand::GitClone => clone(&git, decode(params)?).map(|_| Value::Null),
        GitCommand::GitAdd => add(&git, decode(params)?).map(|_| Value::Null),
        GitCommand::GitRemove => remove(&git, decode(params)?).map(|_| Value::Null),
        GitCommand::GitCommit => commit(&git, decode(params)?).map(Value::String),
        GitCommand::GitStatus => Ok(json!(status(&git)?)),
        GitCommand::GitFetch => fetch(&git, &decode(params)?).map(|_| Value::Null),
        GitCommand::GitPull => pull(&git, &decode(params)?).map(|_| Value::Null),
        GitCommand::GitPush => push(&git, &decode(params)?).map(|_| Value::Null),
        GitCommand::GitLog => Ok(json!(log(&git, &decode(params)?)?)),
        GitCommand::GitListBranches => Ok(json!(list_branches(&git)?)),
        GitCommand::GitCreateBranch => create_branch(&git, decode(params)?).map(|_| Value::Null),
        GitCommand::GitCheckout => {
            let p: RefParams = decode(params)?;
            ensure_not_option("ref", &p.reference)?;
            git.run(&["checkout", &p.reference]).map(|_| Value::Null)
        }
        GitCommand::GitDeleteBranch => {
            let p: DeleteBranchParams = decode(params)?;
            ensure_not_option("name", &p.name)?;
            let flag = if p.force { "-D" } else { "-d" };
            git.run(&["branch", flag, &p.name]).map(|_| Value::Null)
        }
        GitCommand::GitListRemotes => Ok(json!(list_remotes(&git)?)),
        GitCommand::GitAddRemote => {
            let p: RemoteParams = decode(params)?;
            ensure_not_option("name", &p.name)?;
            ensure_not_option("url", &p.url)?;
            git.run(&["remote", "add", &p.name, &p.url]).map(|_| Value::Null)
        }
        GitCommand::GitRemoveRemote => {
            let p: NameParams = decode(params)?;
            ensure_not_option("name", &p.name)?;
            git.run(&["remote", "remove", &p.name]).map(|_| Value::Null)
        }
        GitCommand::GitRenameRemote => {
            let p: RenameRemoteParams = decode(params)?;
            ensure_not_option("oldName", &p.old_name)?;
            ensure_not_option("newName", &p.new_name)?;
            git.run(&["remote", "rename", &p.old_name, &p.new_name])
                .map(|_| Value::Null)
        }
        GitCommand::GitSetRemoteUrl => {
            let p: RemoteParams = decode(params)?;
            ensure_not_option("name", &p.name)?;
            ensure_not_option("url", &p.url)?;
            let mut args = vec!["remote", "set-url"];
            if p.push {
                args.push("--push");
            }
            args.extend([p.name.as_str(), p.url.as_str()]);
            git.run(&args).map(|_| Value::Null)
        }
        GitCommand::GitReset => reset(&git, decode(params)?).map(|_| Value::Null),
        GitCommand::GitShow => {
            let p: CommitRefParams = decode(params)?;
            Ok(json!(show(&git, &p.commit)?))
        }
        GitCommand::GitDiff => diff(&git, &decode(params)?).map(Value::String),
        GitCommand::GitMerge => Ok(json!(merge(&git, decode(params)?)?)),
        GitCommand::GitRebase => Ok(json!(rebase(&git, decode(params)?)?)),
        GitCommand::GitCherryPick => Ok(json!(cherry_pick(&git, decode(params)?)?)),
        GitCommand::GitRevert => Ok(json!(revert(&git, decode(params)?)?)),
        GitCommand::GitCreateTag => create_tag(&git, decode(params)?).map(|_| Value::Null),
        GitCommand::GitListTags => {
            let out = git.run(&["for-each-ref", "refs/tags", &format!("--format={}", TAG_FORMAT)])?;
            Ok(json!(parse::parse_tags(&out)))
        }
        GitCommand::GitDeleteTag => {
            let p: NameParams = decode(params)?;
            ensure_not_option("name", &p.name)?;
            git.run(&["tag", "-d", &p.name]).map(|_| Value::Null)
        }
        GitCommand::GitStashSave => stash_save(&git, &decode(params)?).map(|_| Value::Null),
        GitCommand::GitStashApply => stash_ref_op(&git, "apply", decode(params)?),
        GitCommand::GitStashPop => stash_ref_op(&git, "pop", decode(params)?),
        GitCommand::GitStashDrop => stash_ref_op(&git, "drop", decode(params)?),
        GitCommand::GitStashList => {
            let out = git.run(&["stash", "list", "--format=%gs"])?;
            Ok(json!(parse::parse_stash_list(&out)))
        }
        GitCommand::GitClean => Ok(json!(clean(&git, &decode(params)?)?)),
        GitCommand::GitArchive => archive(&git, decode(params)?).map(|_| Value::Null),
        GitCommand::GitRepositoryInfo => Ok(json!(repository_info(&git)?)),
        GitCommand::GitGetWorkingDirectory | GitCommand::GitSetWorkingDirectory => {
            Err(HostError::InvalidParams(format!(
                "'{}' is handled by the host",
                command
            )))
        }
    }
}

// ============================================================================
// Repository lifecycle
// ============================================================================

fn is_repository(git: &Invocation<'_>) -> bool {
    if !git.dir().is_dir() {
        return false;
    }
    git.try_run(&["rev-parse", "--is-inside-work-tree"])
        .map(|s| s == "true")
        .unwrap_or(false)
}

fn require_repository(git: &Invocation<'_>) -> HostResult<()> {
    if is_repository(git) {
        Ok(())
    } else {
        Err(HostError::NotARepository(git.dir().display().to_string()))
    }
}

fn init(git: &Invocation<'_>) -> HostResult<()> {
    fs::create_dir_all(git.dir())?;
    git.run(&["init", "--initial-branch=main"])?;
    info!("Initialized repository in {}", git.dir().display());
    Ok(())
}

fn clone(git: &Invocation<'_>, p: CloneParams) -> HostResult<()> {
    ensure_not_option("url", &p.url)?;
    fs::create_dir_all(git.dir())?;
    let url = authenticated_url(&p.url, p.opts.credentials.as_ref());
    let depth = p.opts.depth.map(|d| d.to_string());

    let mut args = vec!["clone"];
    if let Some(branch) = p.opts.branch.as_deref() {
        ensure_not_option("branch", branch)?;
        args.extend(["--branch", branch]);
    }
    if let Some(depth) = depth.as_deref() {
        args.extend(["--depth", depth]);
    }
    args.extend([url.as_str(), "."]);
    git.run(&args)?;
    info!("Cloned {} into {}", p.url, git.dir().display());
    Ok(())
}

/// Embed credentials into an https URL; other URLs are returned unchanged.
fn authenticated_url(raw: &str, credentials: Option<&Credentials>) -> String {
    let Some(creds) = credentials else {
        return raw.to_string();
    };
    match Url::parse(raw) {
        Ok(mut url) if url.scheme() == "https" || url.scheme() == "http" => {
            if url.set_username(&creds.username).is_err()
                || url.set_password(Some(&creds.password)).is_err()
            {
                return raw.to_string();
            }
            url.to_string()
        }
        _ => raw.to_string(),
    }
}

// ============================================================================
// Index and commits
// ============================================================================

fn add(git: &Invocation<'_>, p: PathsParams) -> HostResult<()> {
    if p.paths.is_empty() {
        return Err(HostError::InvalidParams("no paths given".to_string()));
    }
    let mut args = vec!["add", "--"];
    args.extend(p.paths.iter().map(String::as_str));
    git.run(&args).map(|_| ())
}

/// Removes paths from the index only; the working tree copy stays.
fn remove(git: &Invocation<'_>, p: PathsParams) -> HostResult<()> {
    if p.paths.is_empty() {
        return Err(HostError::InvalidParams("no paths given".to_string()));
    }
    let mut args = vec!["rm", "--cached", "-r", "--"];
    args.extend(p.paths.iter().map(String::as_str));
    git.run(&args).map(|_| ())
}

fn commit(git: &Invocation<'_>, p: CommitParams) -> HostResult<String> {
    if p.message.trim().is_empty() {
        return Err(HostError::InvalidParams("commit message is empty".to_string()));
    }
    let mut args = vec!["commit", "-m", p.message.as_str()];
    if p.amend {
        args.push("--amend");
    }
    git.run(&args)?;
    git.run_trimmed(&["rev-parse", "HEAD"])
}

fn status(git: &Invocation<'_>) -> HostResult<GitStatusSnapshot> {
    require_repository(git)?;
    let out = git.run(&["status", "--porcelain=v1", "-z"])?;
    Ok(parse::parse_porcelain_status(&out))
}

fn log(git: &Invocation<'_>, opts: &LogOptions) -> HostResult<Vec<CommitInfo>> {
    require_repository(git)?;
    let format = format!("--pretty=format:{}", LOG_FORMAT);
    let depth = opts.depth.map(|d| format!("-{}", d));

    let mut args = vec!["log", format.as_str()];
    if let Some(depth) = depth.as_deref() {
        args.push(depth);
    }
    if let Some(reference) = opts.reference.as_deref() {
        ensure_not_option("ref", reference)?;
        args.push(reference);
    }

    let output = git.output(&args)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // 还没有提交
        if stderr.contains("does not have any commits") {
            return Ok(Vec::new());
        }
        return Err(HostError::CommandFailed(stderr.trim().to_string()));
    }
    Ok(parse::parse_log(&String::from_utf8_lossy(&output.stdout)))
}

// ============================================================================
// Branches and remotes
// ============================================================================

fn list_branches(git: &Invocation<'_>) -> HostResult<Vec<BranchDescriptor>> {
    require_repository(git)?;
    let out = git.run(&["for-each-ref", "refs/heads", &format!("--format={}", BRANCH_FORMAT)])?;
    Ok(parse::parse_branches(&out))
}

fn create_branch(git: &Invocation<'_>, p: BranchParams) -> HostResult<()> {
    ensure_not_option("name", &p.name)?;
    let mut args = if p.opts.checkout {
        vec!["checkout", "-b", p.name.as_str()]
    } else {
        vec!["branch", p.name.as_str()]
    };
    if let Some(start) = p.opts.start_point.as_deref() {
        ensure_not_option("startPoint", start)?;
        args.push(start);
    }
    git.run(&args).map(|_| ())
}

fn list_remotes(git: &Invocation<'_>) -> HostResult<Vec<RemoteInfo>> {
    require_repository(git)?;
    let out = git.run(&["remote", "-v"])?;
    Ok(parse::parse_remotes(&out))
}

/// Remote name, or its URL with credentials embedded when any were given.
fn remote_target(git: &Invocation<'_>, opts: &RemoteOptions) -> HostResult<(String, bool)> {
    let remote = opts.remote_or_default();
    ensure_not_option("remote", remote)?;
    match opts.credentials.as_ref() {
        Some(creds) => {
            let url = git.run_trimmed(&["remote", "get-url", remote])?;
            Ok((authenticated_url(&url, Some(creds)), true))
        }
        None => Ok((remote.to_string(), false)),
    }
}

fn fetch(git: &Invocation<'_>, opts: &RemoteOptions) -> HostResult<()> {
    require_repository(git)?;
    let (target, by_url) = remote_target(git, opts)?;
    if let Some(branch) = opts.branch.as_deref() {
        ensure_not_option("branch", branch)?;
    }

    // 按 URL 拉取时显式写回远程跟踪分支
    let refspec = if by_url {
        let branch = opts.branch.as_deref().unwrap_or("*");
        Some(format!(
            "+refs/heads/{}:refs/remotes/{}/{}",
            branch,
            opts.remote_or_default(),
            branch
        ))
    } else {
        opts.branch.clone()
    };

    let mut args = vec!["fetch", target.as_str()];
    args.extend(refspec.as_deref());
    git.run(&args).map(|_| ())
}

fn pull(git: &Invocation<'_>, opts: &RemoteOptions) -> HostResult<()> {
    require_repository(git)?;
    let (target, _) = remote_target(git, opts)?;
    let mut args = vec!["pull", "--no-rebase", "--no-edit", target.as_str()];
    if let Some(branch) = opts.branch.as_deref() {
        ensure_not_option("branch", branch)?;
        args.push(branch);
    }
    git.run(&args).map(|_| ())
}

fn push(git: &Invocation<'_>, opts: &RemoteOptions) -> HostResult<()> {
    require_repository(git)?;
    let (target, _) = remote_target(git, opts)?;
    let branch = opts.branch.as_deref().unwrap_or("HEAD");
    ensure_not_option("branch", branch)?;
    git.run(&["push", target.as_str(), branch]).map(|_| ())
}

// ============================================================================
// History rewriting
// ============================================================================

fn reset(git: &Invocation<'_>, p: ResetParams) -> HostResult<()> {
    let commit = p.opts.commit.as_deref();
    if let Some(commit) = commit {
        ensure_not_option("commit", commit)?;
    }

    match p.paths.filter(|paths| !paths.is_empty()) {
        // 指定路径时只重置索引，模式无意义
        Some(paths) => {
            let mut args = vec!["reset"];
            args.extend(commit);
            args.push("--");
            args.extend(paths.iter().map(String::as_str));
            git.run(&args).map(|_| ())
        }
        None => {
            let mut args = vec!["reset", p.opts.mode.as_flag()];
            args.extend(commit);
            git.run(&args).map(|_| ())
        }
    }
}

fn show(git: &Invocation<'_>, commit: &str) -> HostResult<ShowResult> {
    ensure_not_option("commit", commit)?;
    let format = format!("--format={}", LOG_FORMAT);
    let header = git.run(&["show", "-s", format.as_str(), commit])?;
    let info = parse::parse_log(&header)
        .into_iter()
        .next()
        .ok_or_else(|| HostError::CommandFailed(format!("Invalid git show output for {}", commit)))?;

    let diff = git.run(&["show", "--format=", "--name-status", commit])?;
    let patch = git.run(&["show", "--format=", "--patch", commit])?;
    Ok(ShowResult {
        commit: info,
        diff: diff.trim().to_string(),
        patch,
    })
}

fn diff(git: &Invocation<'_>, opts: &DiffOptions) -> HostResult<String> {
    let unified = opts.unified.map(|n| format!("--unified={}", n));
    let mut args = vec!["diff"];
    if opts.cached {
        args.push("--cached");
    }
    if opts.name_only {
        args.push("--name-only");
    }
    if let Some(unified) = unified.as_deref() {
        args.push(unified);
    }
    for rev in [opts.from.as_deref(), opts.to.as_deref()].into_iter().flatten() {
        ensure_not_option("revision", rev)?;
        args.push(rev);
    }
    git.run(&args)
}

/// Files with unresolved conflicts
fn conflict_files(git: &Invocation<'_>) -> Vec<String> {
    git.run(&["diff", "--name-only", "--diff-filter=U"])
        .map(|out| {
            out.lines()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Run a history-integrating command; conflicts are a result, not an error.
fn integrate(git: &Invocation<'_>, args: &[&str]) -> HostResult<MergeResult> {
    let output = git.output(args)?;
    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        return Ok(MergeResult {
            success: true,
            conflicts: Vec::new(),
            message: Some(stdout).filter(|s| !s.is_empty()),
        });
    }

    let text = failure_text(&output);

    let conflicts = conflict_files(git);
    if conflicts.is_empty() {
        return Err(HostError::CommandFailed(text));
    }
    debug!("{} stopped with {} conflict(s)", args[0], conflicts.len());
    Ok(MergeResult {
        success: false,
        conflicts,
        message: Some(text),
    })
}

fn merge(git: &Invocation<'_>, p: MergeParams) -> HostResult<MergeResult> {
    ensure_not_option("branch", &p.branch)?;
    let mut args = vec!["merge", "--no-edit"];
    if p.opts.no_ff {
        args.push("--no-ff");
    }
    if let Some(message) = p.opts.message.as_deref() {
        args.extend(["-m", message]);
    }
    args.push(p.branch.as_str());
    integrate(git, &args)
}

fn rebase(git: &Invocation<'_>, p: RebaseParams) -> HostResult<MergeResult> {
    if p.opts.abort {
        git.run(&["rebase", "--abort"])?;
        return Ok(MergeResult {
            success: true,
            conflicts: Vec::new(),
            message: Some("Rebase aborted".to_string()),
        });
    }
    if p.opts.continue_rebase {
        return integrate(git, &["-c", "core.editor=true", "rebase", "--continue"]);
    }

    ensure_not_option("upstream", &p.upstream)?;
    let mut args = vec!["rebase"];
    if let Some(onto) = p.opts.onto.as_deref() {
        ensure_not_option("onto", onto)?;
        args.extend(["--onto", onto]);
    }
    args.push(p.upstream.as_str());
    integrate(git, &args)
}

fn cherry_pick(git: &Invocation<'_>, p: CherryPickParams) -> HostResult<MergeResult> {
    if p.commits.is_empty() {
        return Err(HostError::InvalidParams("no commits given".to_string()));
    }
    let mut args = vec!["cherry-pick"];
    if p.opts.no_commit {
        args.push("--no-commit");
    }
    for commit in &p.commits {
        ensure_not_option("commit", commit)?;
        args.push(commit.as_str());
    }
    integrate(git, &args)
}

fn revert(git: &Invocation<'_>, p: CommitRefParams) -> HostResult<MergeResult> {
    ensure_not_option("commit", &p.commit)?;
    let mut args = vec!["revert", "--no-edit"];
    if p.opts.no_commit {
        args.push("--no-commit");
    }
    args.push(p.commit.as_str());
    integrate(git, &args)
}

// ============================================================================
// Tags, stash, clean, archive
// ============================================================================

fn create_tag(git: &Invocation<'_>, p: TagParams) -> HostResult<()> {
    ensure_not_option("name", &p.name)?;
    let mut args = vec!["tag"];
    if p.opts.force {
        args.push("-f");
    }
    if let Some(message) = p.opts.message.as_deref() {
        args.extend(["-a", "-m", message]);
    }
    args.push(p.name.as_str());
    if let Some(commit) = p.opts.commit.as_deref() {
        ensure_not_option("commit", commit)?;
        args.push(commit);
    }
    git.run(&args).map(|_| ())
}

fn stash_save(git: &Invocation<'_>, opts: &StashOptions) -> HostResult<()> {
    let mut args = vec!["stash", "push"];
    if opts.include_untracked {
        args.push("--include-untracked");
    }
    if let Some(message) = opts.message.as_deref() {
        args.extend(["-m", message]);
    }
    git.run(&args).map(|_| ())
}

fn stash_ref_op(git: &Invocation<'_>, op: &str, p: StashIndexParams) -> HostResult<Value> {
    let stash_ref = p.index.map(|i| format!("stash@{{{}}}", i));
    let mut args = vec!["stash", op];
    if let Some(stash_ref) = stash_ref.as_deref() {
        args.push(stash_ref);
    }
    git.run(&args).map(|_| Value::Null)
}

fn clean(git: &Invocation<'_>, opts: &CleanOptions) -> HostResult<Vec<String>> {
    if !opts.dry_run && !opts.force {
        return Err(HostError::InvalidParams(
            "clean requires either dryRun or force".to_string(),
        ));
    }
    let mut args = vec!["clean", if opts.dry_run { "-n" } else { "-f" }];
    if opts.directories {
        args.push("-d");
    }
    if opts.ignored {
        args.push("-x");
    }
    let out = git.run(&args)?;
    Ok(parse::parse_clean_output(&out))
}

fn archive(git: &Invocation<'_>, p: ArchiveParams) -> HostResult<()> {
    ensure_not_option("outputPath", &p.output_path)?;
    let reference = p.opts.reference.as_deref().unwrap_or("HEAD");
    ensure_not_option("ref", reference)?;

    let format = format!("--format={}", p.opts.format.as_str());
    let output = format!("--output={}", p.output_path);
    let prefix = p.opts.prefix.as_deref().map(|prefix| format!("--prefix={}", prefix));

    let mut args = vec!["archive", format.as_str(), output.as_str()];
    if let Some(prefix) = prefix.as_deref() {
        args.push(prefix);
    }
    args.push(reference);
    git.run(&args).map(|_| ())
}

fn repository_info(git: &Invocation<'_>) -> HostResult<RepositoryInfo> {
    require_repository(git)?;
    let root = git.run_trimmed(&["rev-parse", "--show-toplevel"])?;
    let current_branch = git.try_run(&["symbolic-ref", "--short", "-q", "HEAD"]);
    let head = git.try_run(&["rev-parse", "--verify", "-q", "HEAD"]);
    let remotes = list_remotes(git)?;
    let is_clean = git
        .run(&["status", "--porcelain=v1", "-z"])
        .map(|out| out.trim_matches('\0').is_empty())?;

    Ok(RepositoryInfo {
        root,
        current_branch,
        head,
        remotes,
        is_clean,
    })
}
