//! CLI command implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use bb2gh_hg::{
    convert_repository, create_fork_branches, create_master_branch, import_fork_commits,
    open_fork_commits, store_commit_map, unique_branch_per_head, ConvertOptions, GitRepo, HgRepo,
};
use bb2gh_migrate::{
    check_migration, load_commit_index, BitbucketExport, ConsoleProgressReporter,
    DiscussionMigrator, GithubImport, MigrationOptions, MigrationProgress, ReferenceRewriter,
    Relinker,
};
use bb2gh_types::MigrationConfig;

/// Load the configuration and resolve the GitHub target of `repository`.
fn load_config(path: &Path, repository: &str) -> Result<(Arc<MigrationConfig>, String)> {
    let config = MigrationConfig::load(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    let target = config.require_mapping(repository)?.target.clone();
    Ok((Arc::new(config), target))
}

fn bitbucket_export(
    repository: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<BitbucketExport> {
    let bexport = BitbucketExport::new(repository)?;
    Ok(match (username, password) {
        (Some(user), Some(pass)) => bexport.with_credentials(user, pass),
        _ => bexport,
    })
}

/// Migrate issues and pull requests of one repository.
pub async fn migrate(
    config: &Path,
    repository: &str,
    github_token: &str,
    bitbucket_username: Option<&str>,
    bitbucket_password: Option<&str>,
    skip_attachments: bool,
) -> Result<()> {
    let (config, target) = load_config(config, repository)?;
    tracing::info!(repository = %repository, target = %target, "Starting discussion migration");
    let index = Arc::new(load_commit_index(&config).context("loading commit maps")?);
    let bexport = bitbucket_export(repository, bitbucket_username, bitbucket_password)?;
    let gimport = GithubImport::new(github_token, &target)?;

    let reporter = ConsoleProgressReporter::new();
    let progress = Arc::new(MigrationProgress::with_callback(reporter.callback()));
    let migrator = DiscussionMigrator::new(
        bexport,
        gimport,
        config,
        index,
        MigrationOptions { skip_attachments },
    )?
    .with_progress(progress);

    let report = migrator
        .migrate()
        .await
        .with_context(|| format!("migrating discussions of '{repository}'"))?;
    reporter.finish("Migration complete");

    println!(
        "Migrated '{repository}' to '{target}': {} issues created, {} updated, \
         {} strays closed, {} attachment gists",
        report.issues_created, report.issues_updated, report.issues_closed, report.attachment_gists
    );
    Ok(())
}

/// Check the configuration against the live repositories.
pub async fn check(
    config: &Path,
    repository: &str,
    github_token: &str,
    bitbucket_username: Option<&str>,
    bitbucket_password: Option<&str>,
) -> Result<()> {
    let (config, target) = load_config(config, repository)?;
    let bexport = bitbucket_export(repository, bitbucket_username, bitbucket_password)?;
    let gimport = GithubImport::new(github_token, &target)?;

    let report = check_migration(&bexport, &gimport, &config)
        .await
        .with_context(|| format!("checking '{repository}'"))?;

    println!(
        "Checked '{repository}': {} issues and {} pull requests on Bitbucket, \
         {} issues on GitHub",
        report.bitbucket_issues, report.bitbucket_pulls, report.github_issues
    );
    if !report.unmapped_users.is_empty() {
        let users: Vec<&str> = report.unmapped_users.iter().map(String::as_str).collect();
        println!("Unmapped users: {}", users.join(", "));
    }
    if report.is_clean() {
        println!("Configuration is consistent");
    } else if !report.errors.is_empty() {
        bail!(
            "{} errors and {} warnings found",
            report.errors.len(),
            report.warnings.len()
        );
    }
    Ok(())
}

/// Recreate open pull requests as real GitHub pull requests.
pub async fn pulls(
    config: &Path,
    repository: &str,
    github_token: &str,
    bitbucket_username: Option<&str>,
    bitbucket_password: Option<&str>,
) -> Result<()> {
    let (config, target) = load_config(config, repository)?;
    let index = Arc::new(load_commit_index(&config).context("loading commit maps")?);
    let bexport = bitbucket_export(repository, bitbucket_username, bitbucket_password)?;
    let gimport = GithubImport::new(github_token, &target)?;

    let migrator = DiscussionMigrator::new(
        bexport,
        gimport,
        config,
        index,
        MigrationOptions::default(),
    )?;
    let report = migrator
        .recreate_open_pulls()
        .await
        .with_context(|| format!("recreating pull requests of '{repository}'"))?;

    println!(
        "Recreated open pull requests on '{target}': {} created, {} updated",
        report.pulls_created, report.pulls_updated
    );
    Ok(())
}

/// Rewrite references in already-migrated GitHub issues.
pub async fn relink(
    config: &Path,
    repository: &str,
    github_token: &str,
    dry_run: bool,
) -> Result<()> {
    let (config, target) = load_config(config, repository)?;
    let index = Arc::new(load_commit_index(&config).context("loading commit maps")?);
    let rewriter = ReferenceRewriter::new(&config, index, repository)?;
    let gimport = GithubImport::new(github_token, &target)?;

    let report = Relinker::new(gimport, rewriter, dry_run)
        .relink()
        .await
        .with_context(|| format!("relinking '{target}'"))?;

    println!(
        "Scanned {} issues on '{target}': {} bodies and {} comments rewritten",
        report.issues_scanned, report.issues_changed, report.comments_changed
    );
    Ok(())
}

/// Convert one repository's Mercurial history to git and push it.
pub async fn convert(
    config: &Path,
    repository: &str,
    options: ConvertOptions,
    bitbucket_username: Option<&str>,
    bitbucket_password: Option<&str>,
) -> Result<()> {
    let config = MigrationConfig::load(config)
        .with_context(|| format!("loading configuration from {}", config.display()))?;
    let mapping = config.require_mapping(repository)?.clone();
    tracing::info!(repository = %repository, target = %mapping.target, "Starting repository conversion");

    let bexport = bitbucket_export(repository, bitbucket_username, bitbucket_password)?;
    let pulls = bexport
        .get_pulls()
        .await
        .with_context(|| format!("fetching pull requests of '{repository}'"))?;

    let outcome = convert_repository(&mapping, &pulls, &options)
        .with_context(|| format!("converting '{repository}'"))?;

    println!(
        "Converted '{repository}': {} fork commits imported, commit map at {}",
        outcome.forks_imported,
        outcome.commit_map.display()
    );
    Ok(())
}

/// Give every extra head of a multi-headed branch its own branch.
pub fn fix_repo(repo: &Path, dry_run: bool) -> Result<()> {
    let hg = HgRepo::new(repo).with_dry_run(dry_run);
    unique_branch_per_head(&hg)
        .with_context(|| format!("fixing branch heads in {}", repo.display()))?;
    Ok(())
}

/// Pull fork commits of open pull requests into a Mercurial clone and
/// prepare its branches for conversion.
pub async fn import_forks(
    repo: &Path,
    repository: &str,
    bitbucket_username: Option<&str>,
    bitbucket_password: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let bexport = bitbucket_export(repository, bitbucket_username, bitbucket_password)?;
    let pulls = bexport
        .get_pulls()
        .await
        .with_context(|| format!("fetching pull requests of '{repository}'"))?;

    let hg = HgRepo::new(repo).with_dry_run(dry_run);
    let commits = open_fork_commits(&pulls);
    let imported = import_fork_commits(&hg, &commits)?;
    create_fork_branches(&hg, &commits, repository)?;
    unique_branch_per_head(&hg)?;
    create_master_branch(&hg)?;

    println!(
        "Imported {imported} fork commits into {}",
        repo.display()
    );
    Ok(())
}

/// Extract the hg to git commit map from a converted repository.
pub fn extract_map(repo: &Path, output: &Path) -> Result<()> {
    let git = GitRepo::open(repo);
    store_commit_map(&git, output)
        .with_context(|| format!("extracting the commit map of {}", repo.display()))?;
    println!("Wrote commit map to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
repositories:
  - source: acme/widget
    target: acme-org/widget
    issue_count: 3
"#;

    #[test]
    fn test_load_config_resolves_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migration.yml");
        std::fs::write(&path, SAMPLE).unwrap();

        let (config, target) = load_config(&path, "acme/widget").unwrap();
        assert_eq!(target, "acme-org/widget");
        assert_eq!(config.repositories.len(), 1);
    }

    #[test]
    fn test_load_config_rejects_unknown_repository() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migration.yml");
        std::fs::write(&path, SAMPLE).unwrap();

        assert!(load_config(&path, "acme/unknown").is_err());
    }

    #[test]
    fn test_bitbucket_export_without_credentials() {
        assert!(bitbucket_export("acme/widget", None, None).is_ok());
    }
}
