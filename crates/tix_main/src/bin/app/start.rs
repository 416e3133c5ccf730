use anyhow::{Context, Result, bail};
use console::style;
use inquire::Text;
use tix_domain::Settings;
use tix_main::{Git, create_provider};
use tix_services::workflow::branch_name;
use tracing::info;

use super::session::{choose_repo, create_work_branch, current_code_repo, ensure_clean};

fn parse_issue_number(s: &str) -> Result<u64> {
    s.trim().parse().with_context(|| format!("invalid issue number: {s}"))
}

/// Split `[project] [issue-number]`.
fn parse_args(args: &[String]) -> Result<(Option<&str>, Option<u64>)> {
    match args {
        [] => Ok((None, None)),
        [number] => Ok((None, Some(parse_issue_number(number)?))),
        [project, number] => Ok((Some(project.as_str()), Some(parse_issue_number(number)?))),
        _ => bail!("too many arguments. Usage: tix start [project] [issue-number]"),
    }
}

pub async fn run(settings: &Settings, args: &[String]) -> Result<()> {
    let (project, number) = parse_args(args)?;
    let code_repo = current_code_repo(settings)?;

    let issue_repo = match (project, args.is_empty()) {
        (Some(name), _) => match settings.repo(name) {
            Some(repo) => repo,
            None => bail!("repository '{name}' not found in config"),
        },
        (None, true) => {
            let candidates: Vec<_> = settings.repositories.iter().collect();
            choose_repo("Select a repository for the issue", &candidates, Some(code_repo))?
        }
        (None, false) => code_repo,
    };

    let number = match number {
        Some(number) => number,
        None => {
            let input = Text::new("Issue number:").prompt().context("issue number input cancelled")?;
            parse_issue_number(&input)?
        }
    };

    if issue_repo.provider_kind()? != code_repo.provider_kind()? {
        bail!("issue repo and code repo must use the same provider (both GitHub or both GitLab)");
    }

    let provider = create_provider(issue_repo)?;
    let issue = provider
        .get_issue(number)
        .await
        .with_context(|| format!("failed to get issue #{number} from {}", issue_repo.name))?;

    let cross_repo = issue_repo.name != code_repo.name;
    let prefix = cross_repo.then_some(issue_repo.name.as_str());
    let branch = branch_name(number, &issue.title, prefix);
    info!(branch = %branch, cross_repo, "Starting work on issue");

    let git = Git::new(code_repo.directory_path());
    ensure_clean(&git).await?;
    create_work_branch(code_repo, &git, &branch).await?;

    println!("Issue: {}", style(&issue.url).cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_args(&args(&[])).unwrap(), (None, None));
        assert_eq!(parse_args(&args(&["42"])).unwrap(), (None, Some(42)));
        assert_eq!(parse_args(&args(&["tracker", "7"])).unwrap(), (Some("tracker"), Some(7)));
    }

    #[test]
    fn test_parse_args_rejects_bad_numbers() {
        let actual = parse_args(&args(&["tracker", "seven"])).unwrap_err().to_string();

        assert_eq!(actual, "invalid issue number: seven");
    }
}
