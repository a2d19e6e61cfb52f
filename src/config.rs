//! Run configuration
//!
//! The trigger layer (a CI job reacting to a new issue) passes everything
//! through the environment; file locations come from the command line.

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use crate::errors::{PixelbotError, Result};
use crate::ledger::QuotaPolicy;
use crate::model::OrchestratorConfig;

/// Everything one pipeline run needs beyond the request itself.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub grid_path: PathBuf,
    pub usage_path: PathBuf,
    pub quota: QuotaPolicy,
    pub orchestrator: OrchestratorConfig,
}

impl AppConfig {
    pub fn new(grid_path: PathBuf, usage_path: PathBuf) -> Self {
        Self {
            grid_path,
            usage_path,
            quota: quota_from_env(),
            orchestrator: OrchestratorConfig::from_env(),
        }
    }
}

/// The inbound issue, read from the trigger environment.
#[derive(Debug, Clone)]
pub struct TriggerInput {
    pub title: String,
    pub body: Option<String>,
    pub requester: String,
    /// Issue number and repository, when the progress channel can be used.
    pub issue_number: Option<u64>,
    pub repository: Option<String>,
    pub github_token: Option<String>,
    pub gemini_api_key: String,
}

impl TriggerInput {
    /// Read the trigger environment. `ISSUE_TITLE` and `GEMINI_API_KEY`
    /// are required; everything else degrades gracefully.
    pub fn from_env() -> Result<Self> {
        let title = env::var("ISSUE_TITLE")
            .map_err(|_| PixelbotError::ConfigurationError("ISSUE_TITLE not set".to_string()))?;

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| PixelbotError::ConfigurationError("GEMINI_API_KEY not set".to_string()))?;

        let body = env::var("ISSUE_BODY").ok().filter(|b| !b.trim().is_empty());
        let requester = env::var("ISSUE_USER").unwrap_or_else(|_| "anonymous".to_string());

        let issue_number = match env::var("ISSUE_NUMBER") {
            Ok(raw) => Some(raw.parse().map_err(|_| {
                PixelbotError::ConfigurationError(format!("Invalid ISSUE_NUMBER: {raw}"))
            })?),
            Err(_) => None,
        };

        Ok(Self {
            title,
            body,
            requester,
            issue_number,
            repository: env::var("GITHUB_REPOSITORY").ok(),
            github_token: env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            gemini_api_key,
        })
    }

    /// The progress channel is available only when the token, repository,
    /// and issue number are all present.
    pub fn progress_target(&self) -> Option<(&str, u64, &str)> {
        match (&self.repository, self.issue_number, &self.github_token) {
            (Some(repo), Some(issue), Some(token)) => Some((repo, issue, token)),
            _ => None,
        }
    }
}

fn quota_from_env() -> QuotaPolicy {
    let mut quota = QuotaPolicy::default();
    if let Some(cap) = parse_env_u32("PIXELBOT_DAILY_CAP") {
        quota.daily_cap = cap;
    }
    if let Some(cap) = parse_env_u32("PIXELBOT_USER_CAP") {
        quota.per_user_cap = cap;
    }
    if let Ok(raw) = env::var("PIXELBOT_EXEMPT_USERS") {
        quota.exempt = raw
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect::<HashSet<_>>();
    }
    quota
}

fn parse_env_u32(name: &str) -> Option<u32> {
    env::var(name).ok().and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_target_requires_all_three_values() {
        let mut input = TriggerInput {
            title: "draw".to_string(),
            body: None,
            requester: "alice".to_string(),
            issue_number: Some(12),
            repository: Some("owner/canvas".to_string()),
            github_token: Some("token".to_string()),
            gemini_api_key: "key".to_string(),
        };
        assert_eq!(input.progress_target(), Some(("owner/canvas", 12, "token")));

        input.github_token = None;
        assert_eq!(input.progress_target(), None);
    }
}
