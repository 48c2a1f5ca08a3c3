//! bb2gh CLI - Bitbucket to GitHub migration tools.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// bb2gh - Migrate Bitbucket Mercurial repositories to GitHub
#[derive(Parser, Debug)]
#[command(name = "bb2gh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate issues and pull requests of one repository to GitHub
    Migrate {
        /// Path to the migration configuration file
        #[arg(short, long, default_value = "migration.yml")]
        config: PathBuf,

        /// Full Bitbucket repository name (e.g. acme/widget)
        #[arg(short, long)]
        repository: String,

        /// GitHub access token
        #[arg(short = 't', long)]
        github_token: String,

        /// Bitbucket username
        #[arg(long, requires = "bitbucket_password")]
        bitbucket_username: Option<String>,

        /// Bitbucket app password
        #[arg(long, requires = "bitbucket_username")]
        bitbucket_password: Option<String>,

        /// Skip the migration of attachments
        #[arg(long)]
        skip_attachments: bool,
    },

    /// Check the configuration against the live repositories
    Check {
        /// Path to the migration configuration file
        #[arg(short, long, default_value = "migration.yml")]
        config: PathBuf,

        /// Full Bitbucket repository name (e.g. acme/widget)
        #[arg(short, long)]
        repository: String,

        /// GitHub access token
        #[arg(short = 't', long)]
        github_token: String,

        /// Bitbucket username
        #[arg(long, requires = "bitbucket_password")]
        bitbucket_username: Option<String>,

        /// Bitbucket app password
        #[arg(long, requires = "bitbucket_username")]
        bitbucket_password: Option<String>,
    },

    /// Recreate open pull requests as real GitHub pull requests
    Pulls {
        /// Path to the migration configuration file
        #[arg(short, long, default_value = "migration.yml")]
        config: PathBuf,

        /// Full Bitbucket repository name (e.g. acme/widget)
        #[arg(short, long)]
        repository: String,

        /// GitHub access token
        #[arg(short = 't', long)]
        github_token: String,

        /// Bitbucket username
        #[arg(long, requires = "bitbucket_password")]
        bitbucket_username: Option<String>,

        /// Bitbucket app password
        #[arg(long, requires = "bitbucket_username")]
        bitbucket_password: Option<String>,
    },

    /// Rewrite references in already-migrated GitHub issues
    Relink {
        /// Path to the migration configuration file
        #[arg(short, long, default_value = "migration.yml")]
        config: PathBuf,

        /// Full Bitbucket repository name (e.g. acme/widget)
        #[arg(short, long)]
        repository: String,

        /// GitHub access token
        #[arg(short = 't', long)]
        github_token: String,

        /// Print diffs instead of editing issues
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Convert one repository's Mercurial history to git and push it
    Convert {
        /// Path to the migration configuration file
        #[arg(short, long, default_value = "migration.yml")]
        config: PathBuf,

        /// Full Bitbucket repository name (e.g. acme/widget)
        #[arg(short, long)]
        repository: String,

        /// Directory receiving clones and the commit map
        #[arg(long, default_value = "migration_data")]
        work_dir: PathBuf,

        /// Path to the hg-fast-export.sh script
        #[arg(long)]
        hg_fast_export: PathBuf,

        /// Bitbucket username
        #[arg(long, requires = "bitbucket_password")]
        bitbucket_username: Option<String>,

        /// Bitbucket app password
        #[arg(long, requires = "bitbucket_username")]
        bitbucket_password: Option<String>,

        /// Print branch-fixing Mercurial commands instead of running them
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Convert locally without pushing to GitHub
        #[arg(long)]
        skip_push: bool,
    },

    /// Give every extra head of a multi-headed branch its own branch
    FixRepo {
        /// Path to the existing Mercurial repository
        #[arg(short, long)]
        repo: PathBuf,

        /// Print write commands instead of running them
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Pull fork commits of open pull requests into a Mercurial clone
    ImportForks {
        /// Path to the existing Mercurial repository
        #[arg(long)]
        repo: PathBuf,

        /// Full Bitbucket repository name (e.g. acme/widget)
        #[arg(short, long)]
        repository: String,

        /// Bitbucket username
        #[arg(long, requires = "bitbucket_password")]
        bitbucket_username: Option<String>,

        /// Bitbucket app password
        #[arg(long, requires = "bitbucket_username")]
        bitbucket_password: Option<String>,

        /// Print write commands instead of running them
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Extract the hg to git commit map from a converted repository
    ExtractMap {
        /// Path to the converted git repository
        #[arg(long)]
        repo: PathBuf,

        /// Path of the map file to write
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "bb2gh_cli={log_level},bb2gh_types={log_level},bb2gh_map={log_level},\
                     bb2gh_migrate={log_level},bb2gh_hg={log_level}"
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Migrate {
            config,
            repository,
            github_token,
            bitbucket_username,
            bitbucket_password,
            skip_attachments,
        } => {
            commands::migrate(
                &config,
                &repository,
                &github_token,
                bitbucket_username.as_deref(),
                bitbucket_password.as_deref(),
                skip_attachments,
            )
            .await
        }
        Commands::Check {
            config,
            repository,
            github_token,
            bitbucket_username,
            bitbucket_password,
        } => {
            commands::check(
                &config,
                &repository,
                &github_token,
                bitbucket_username.as_deref(),
                bitbucket_password.as_deref(),
            )
            .await
        }
        Commands::Pulls {
            config,
            repository,
            github_token,
            bitbucket_username,
            bitbucket_password,
        } => {
            commands::pulls(
                &config,
                &repository,
                &github_token,
                bitbucket_username.as_deref(),
                bitbucket_password.as_deref(),
            )
            .await
        }
        Commands::Relink {
            config,
            repository,
            github_token,
            dry_run,
        } => commands::relink(&config, &repository, &github_token, dry_run).await,
        Commands::Convert {
            config,
            repository,
            work_dir,
            hg_fast_export,
            bitbucket_username,
            bitbucket_password,
            dry_run,
            skip_push,
        } => {
            let options = bb2gh_hg::ConvertOptions {
                work_dir,
                fast_export_script: hg_fast_export,
                dry_run,
                push: !skip_push,
            };
            commands::convert(
                &config,
                &repository,
                options,
                bitbucket_username.as_deref(),
                bitbucket_password.as_deref(),
            )
            .await
        }
        Commands::FixRepo { repo, dry_run } => commands::fix_repo(&repo, dry_run),
        Commands::ImportForks {
            repo,
            repository,
            bitbucket_username,
            bitbucket_password,
            dry_run,
        } => {
            commands::import_forks(
                &repo,
                &repository,
                bitbucket_username.as_deref(),
                bitbucket_password.as_deref(),
                dry_run,
            )
            .await
        }
        Commands::ExtractMap { repo, output } => commands::extract_map(&repo, &output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
