//! Mapping of Bitbucket identities and classifications onto GitHub.
//!
//! Everything here is driven by the migration configuration: users map to
//! GitHub accounts, issue metadata maps to labels, and branch names map
//! into the converted repository. Unknown values are reported and dropped
//! rather than invented.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::warn;

use bb2gh_types::record::{Actor, IssueRecord, PullRequestRecord};
use bb2gh_types::MigrationConfig;

/// Label marking issues that used to be pull requests.
pub const PULL_REQUEST_LABEL: &str = "pull request";

/// Maps users, issue metadata and branch names onto their GitHub forms.
pub struct IdentityMapper {
    config: Arc<MigrationConfig>,
    own_repo: String,
}

impl IdentityMapper {
    pub fn new(config: Arc<MigrationConfig>, own_repo: impl Into<String>) -> Self {
        Self {
            config,
            own_repo: own_repo.into(),
        }
    }

    /// GitHub username of an actor. `None` for actors mapped to no account
    /// on purpose as well as for unknown nicknames; only the latter is
    /// worth a warning.
    pub fn github_user(&self, actor: Option<&Actor>) -> Option<String> {
        let actor = actor?;
        match self.config.users.get(&actor.nickname) {
            Some(mapped) => mapped.clone(),
            None => {
                warn!(
                    "No GitHub user configured for Bitbucket user '{}'",
                    actor.nickname
                );
                None
            }
        }
    }

    /// Whether an issue state counts as open.
    pub fn is_open(&self, state: &str) -> bool {
        self.config.open_states.contains(state)
    }

    pub fn kind_label(&self, kind: &str) -> Option<String> {
        self.label_from(&self.config.kinds, kind, "kind")
    }

    pub fn priority_label(&self, priority: &str) -> Option<String> {
        self.label_from(&self.config.priorities, priority, "priority")
    }

    pub fn component_label(&self, component: &str) -> Option<String> {
        self.label_from(&self.config.components, component, "component")
    }

    pub fn state_label(&self, state: &str) -> Option<String> {
        self.label_from(&self.config.states, state, "state")
    }

    fn label_from(
        &self,
        table: &BTreeMap<String, Option<String>>,
        value: &str,
        what: &str,
    ) -> Option<String> {
        match table.get(value) {
            Some(label) => label.clone(),
            None => {
                warn!("Ignoring unknown issue {what} '{value}'");
                None
            }
        }
    }

    /// All labels of a migrated issue, sorted and deduplicated.
    pub fn issue_labels(&self, issue: &IssueRecord) -> Vec<String> {
        let mut labels = BTreeSet::new();
        labels.extend(self.kind_label(&issue.kind));
        labels.extend(self.priority_label(&issue.priority));
        labels.extend(self.state_label(&issue.state));
        if let Some(component) = &issue.component {
            labels.extend(self.component_label(&component.name));
        }
        labels.into_iter().collect()
    }

    /// Labels of a pull request migrated as an issue.
    pub fn pull_labels(&self, pull: &PullRequestRecord) -> Vec<String> {
        let mut labels = BTreeSet::new();
        labels.insert(PULL_REQUEST_LABEL.to_string());
        labels.extend(self.state_label(&pull.state));
        labels.into_iter().collect()
    }

    /// GitHub issue number a pull request is migrated at: pull requests
    /// follow the issues in one shared number sequence.
    pub fn pull_request_number(&self, pull_id: u64) -> Option<u64> {
        let count = self.config.issue_count(&self.own_repo)?;
        Some(pull_id + count)
    }

    /// Name of a branch in the converted Git repository. Branches pulled in
    /// from a fork are namespaced by the fork's full name; the `default`
    /// branch of the repository itself may be renamed by configuration.
    pub fn branch_name(&self, branch: &str, source_repository: &str) -> String {
        if source_repository == self.own_repo {
            if branch == "default" {
                if let Some(renamed) = &self.config.default_branch_rename {
                    return renamed.clone();
                }
            }
            branch.to_string()
        } else {
            format!("{source_repository}/{branch}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bb2gh_types::record::{ComponentRef, RawContent};
    use bb2gh_types::RepositoryMapping;

    fn test_config() -> Arc<MigrationConfig> {
        Arc::new(MigrationConfig {
            repositories: vec![RepositoryMapping {
                source: "acme/widget".to_string(),
                target: "acme-org/widget".to_string(),
                issue_count: 100,
                commit_map: None,
            }],
            users: [
                ("alice".to_string(), Some("alice-gh".to_string())),
                ("gone".to_string(), None),
            ]
            .into(),
            kinds: [
                ("bug".to_string(), Some("bug".to_string())),
                ("proposal".to_string(), None),
            ]
            .into(),
            priorities: [("blocker".to_string(), Some("priority: blocker".to_string()))].into(),
            components: [("parser".to_string(), Some("parser".to_string()))].into(),
            states: [
                ("wontfix".to_string(), Some("status: wontfix".to_string())),
                ("on hold".to_string(), Some("status: on hold".to_string())),
                ("resolved".to_string(), None),
                ("MERGED".to_string(), None),
            ]
            .into(),
            open_states: ["new".to_string(), "open".to_string(), "on hold".to_string()].into(),
            default_branch_rename: Some("master".to_string()),
        })
    }

    fn mapper() -> IdentityMapper {
        IdentityMapper::new(test_config(), "acme/widget")
    }

    fn issue(kind: &str, priority: &str, state: &str, component: Option<&str>) -> IssueRecord {
        IssueRecord {
            id: 1,
            title: "t".to_string(),
            content: RawContent::default(),
            reporter: None,
            assignee: None,
            state: state.to_string(),
            kind: kind.to_string(),
            priority: priority.to_string(),
            component: component.map(|name| ComponentRef {
                name: name.to_string(),
            }),
            created_on: "2020-01-01T00:00:00+00:00".to_string(),
            updated_on: "2020-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_github_user() {
        let m = mapper();
        assert_eq!(
            m.github_user(Some(&Actor::new("alice"))),
            Some("alice-gh".to_string())
        );
        // Deliberately unmapped and unknown both yield None.
        assert_eq!(m.github_user(Some(&Actor::new("gone"))), None);
        assert_eq!(m.github_user(Some(&Actor::new("stranger"))), None);
        assert_eq!(m.github_user(None), None);
    }

    #[test]
    fn test_issue_labels_sorted_and_deduplicated() {
        let m = mapper();
        let labels = m.issue_labels(&issue("bug", "blocker", "wontfix", Some("parser")));
        assert_eq!(labels, ["bug", "parser", "priority: blocker", "status: wontfix"]);
    }

    #[test]
    fn test_issue_labels_drop_null_and_unknown() {
        let m = mapper();
        // "proposal" maps to null, "urgent" and "weird" are unknown.
        let labels = m.issue_labels(&issue("proposal", "urgent", "weird", None));
        assert!(labels.is_empty());
    }

    #[test]
    fn test_pull_labels() {
        let m = mapper();
        let pull: PullRequestRecord = serde_json::from_value(serde_json::json!({
            "id": 3,
            "title": "t",
            "state": "MERGED",
            "created_on": "2020-01-01T00:00:00+00:00",
            "updated_on": "2020-01-01T00:00:00+00:00",
        }))
        .unwrap();
        assert_eq!(m.pull_labels(&pull), [PULL_REQUEST_LABEL]);
    }

    #[test]
    fn test_is_open() {
        let m = mapper();
        assert!(m.is_open("new"));
        assert!(!m.is_open("wontfix"));
    }

    #[test]
    fn test_state_can_be_open_and_labelled_at_once() {
        let m = mapper();
        assert!(m.is_open("on hold"));
        let labels = m.issue_labels(&issue("bug", "blocker", "on hold", None));
        assert!(labels.contains(&"status: on hold".to_string()));
    }

    #[test]
    fn test_pull_request_number() {
        assert_eq!(mapper().pull_request_number(3), Some(103));
    }

    #[test]
    fn test_branch_name() {
        let m = mapper();
        assert_eq!(m.branch_name("feature", "acme/widget"), "feature");
        assert_eq!(m.branch_name("default", "acme/widget"), "master");
        assert_eq!(
            m.branch_name("feature", "carol/widget-fork"),
            "carol/widget-fork/feature"
        );
        assert_eq!(
            m.branch_name("default", "carol/widget-fork"),
            "carol/widget-fork/default"
        );
    }
}
