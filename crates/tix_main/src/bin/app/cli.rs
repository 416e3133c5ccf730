use clap::{ArgAction, Parser, Subcommand};
use tix_main::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(author, version, about = "Issue-driven git workflow for GitHub and GitLab", long_about = None)]
pub struct Args {
    /// Increase verbosity: -v for INFO, -vv for DEBUG (default: WARN)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an issue and a branch (or worktree) for it
    Create {
        /// Title of the issue; prompted for when omitted
        #[arg(short, long)]
        title: Option<String>,

        /// Do not assign the issue to yourself
        #[arg(long)]
        no_assign: bool,
    },
    /// Create a branch from an existing issue, possibly in another repository
    ///
    ///   tix start               prompt for the project and issue number
    ///   tix start 123           issue #123 of the current repository
    ///   tix start tracker 123   issue #123 of the `tracker` repository
    Start {
        /// [project] issue-number
        #[arg(num_args = 0..=2, value_name = "ARGS")]
        args: Vec<String>,
    },
    /// Push the branch and open a merge/pull request for its issue
    #[command(visible_alias = "pr")]
    Mr {
        /// Create the request as a draft
        #[arg(short, long)]
        draft: bool,

        /// Git remote to push to
        #[arg(short, long, default_value = "origin")]
        remote: String,
    },
    /// Generate and update the request and issue descriptions from the diff
    Setdesc {
        /// Always select relevant diff excerpts with embeddings
        #[arg(long, conflicts_with = "no_rag")]
        rag: bool,

        /// Always send the whole diff
        #[arg(long)]
        no_rag: bool,

        /// Update without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Mark the branch's issue ready for review
    Ready {
        /// Override the ready label to add
        #[arg(short, long)]
        label: Option<String>,

        /// Override the ready status (GitLab only)
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Take the branch's issue out of review
    Unready {
        /// Override the ready label to remove
        #[arg(short, long)]
        label: Option<String>,

        /// Override the unready label to add
        #[arg(short, long)]
        unready_label: Option<String>,

        /// Override the unready status (GitLab only)
        #[arg(short, long)]
        status: Option<String>,
    },
}

/// Tri-state retrieval override from the `--rag` / `--no-rag` pair.
pub fn force_retrieval(rag: bool, no_rag: bool) -> Option<bool> {
    match (rag, no_rag) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
