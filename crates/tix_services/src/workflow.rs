//! Naming and bookkeeping rules of the issue-driven branch workflow

use anyhow::{Result, bail};
use chrono::Datelike;
use tix_domain::{Repository, RequestResult, Settings};

/// Longest slug kept from an issue title in branch names.
pub const BRANCH_SLUG_LEN: usize = 50;

/// Lower-case `s`, turning separators and camel-case humps into single dashes,
/// then cut it to `max_len` characters.
///
/// Acronyms stay whole: `setupIRSAPermissions` becomes
/// `setup-irsa-permissions`.
pub fn truncate_and_dash_case(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut last_was_dash = false;

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !last_was_dash && !result.is_empty() {
                result.push('-');
                last_was_dash = true;
            }
            continue;
        }

        if c.is_uppercase() && i > 0 && !last_was_dash {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).filter(|n| n.is_alphabetic());
            let needs_dash = prev.is_alphabetic()
                && (!prev.is_uppercase() || next.is_some_and(|n| n.is_lowercase()));
            if needs_dash {
                result.push('-');
            }
        }

        result.extend(c.to_lowercase());
        last_was_dash = false;
    }

    if result.ends_with('-') {
        result.pop();
    }
    result.chars().take(max_len).collect()
}

/// Quarter milestone for `date`, e.g. `2025.Q2`.
pub fn generate_milestone(date: &impl Datelike) -> String {
    format!("{}.Q{}", date.year(), (date.month0() / 3) + 1)
}

/// Issue reference parsed from a branch name: `123-title` refers to issue 123
/// of the same repository, `project-123-title` to issue 123 of `project`.
pub fn extract_issue_info(branch: &str) -> Result<(Option<String>, u64)> {
    let parts: Vec<&str> = branch.split('-').collect();
    if parts.len() < 2 {
        bail!("invalid branch name format: {branch}");
    }

    if let Ok(number) = parts[0].parse() {
        return Ok((None, number));
    }

    match parts[1].parse() {
        Ok(number) if parts.len() >= 3 => Ok((Some(parts[0].to_string()), number)),
        _ => bail!("invalid branch name format: {branch}"),
    }
}

/// Branch for an issue: `N-slug`, prefixed with the issue's project when the
/// issue lives in another repository.
pub fn branch_name(issue_number: u64, title: &str, project: Option<&str>) -> String {
    let slug = truncate_and_dash_case(title, BRANCH_SLUG_LEN);
    match project {
        Some(project) => format!("{project}-{issue_number}-{slug}"),
        None => format!("{issue_number}-{slug}"),
    }
}

pub fn request_title(issue_number: u64, issue_title: &str) -> String {
    format!("#{issue_number} - {issue_title}")
}

/// Comma separated labels, trimmed, blanks dropped.
pub fn split_labels(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Open request already raised from `branch`, if any.
pub fn find_request_for_branch<'a>(
    requests: &'a [RequestResult],
    branch: &str,
) -> Option<&'a RequestResult> {
    requests.iter().find(|r| !r.title.is_empty() && r.title.contains(branch))
}

/// Put the issue-closing line of `existing` back in front of `description`.
pub fn preserve_issue_reference(existing: &str, description: &str, prefixes: &[&str]) -> String {
    let reference = existing
        .lines()
        .find(|line| prefixes.iter().any(|p| line.starts_with(p)));

    match reference {
        Some(line) if !description.contains(line) => format!("{line}\n\n{description}"),
        _ => description.to_string(),
    }
}

fn first_set(candidates: [Option<&str>; 3]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(String::from)
}

/// Label and status edits for `ready`/`unready`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessChange {
    pub add_label: Option<String>,
    pub remove_label: Option<String>,
    pub status: Option<String>,
}

impl ReadinessChange {
    pub fn is_noop(&self) -> bool {
        self.add_label.is_none() && self.remove_label.is_none() && self.status.is_none()
    }

    /// Mark an issue ready. Overrides beat repository settings, which beat
    /// global ones.
    pub fn ready(
        settings: &Settings,
        repo: &Repository,
        label: Option<&str>,
        status: Option<&str>,
    ) -> Self {
        Self {
            add_label: first_set([label, repo.ready_label.as_deref(), settings.ready_label.as_deref()]),
            remove_label: None,
            status: first_set([status, repo.ready_status.as_deref(), settings.ready_status.as_deref()]),
        }
    }

    /// Take an issue back out of ready. The unready label is only added when a
    /// ready label is being removed.
    pub fn unready(
        settings: &Settings,
        repo: &Repository,
        ready_label: Option<&str>,
        unready_label: Option<&str>,
        status: Option<&str>,
    ) -> Self {
        let remove_label =
            first_set([ready_label, repo.ready_label.as_deref(), settings.ready_label.as_deref()]);
        let add_label = remove_label.as_ref().and_then(|_| {
            first_set([
                unready_label,
                repo.unready_label.as_deref(),
                settings.unready_label.as_deref(),
            ])
        });
        Self {
            add_label,
            remove_label,
            status: first_set([
                status,
                repo.unready_status.as_deref(),
                settings.unready_status.as_deref(),
            ]),
        }
    }
}
