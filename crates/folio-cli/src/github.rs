// ─── GitHub repositories ────────────────────────────────────────────
//
// Lists repositories for the portfolio's repository section. With a token
// the token owner's repositories are listed (private ones included);
// otherwise the configured user's public ones.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use folio_core::GithubConfig;

const USER_AGENT: &str = concat!("folio/", env!("CARGO_PKG_VERSION"));

/// One repository as served by `/api/github`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub stars: u64,
    pub forks: u64,
    pub language: Option<String>,
    pub updated_at: String,
}

/// The subset of GitHub's repository object we read.
#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    description: Option<String>,
    html_url: String,
    stargazers_count: u64,
    forks_count: u64,
    language: Option<String>,
    updated_at: String,
}

impl From<ApiRepository> for Repository {
    fn from(repo: ApiRepository) -> Self {
        Self {
            name: repo.name,
            description: repo.description,
            url: repo.html_url,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            language: repo.language,
            updated_at: repo.updated_at,
        }
    }
}

pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
    user: Option<String>,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build GitHub HTTP client")?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
            user: config.user.clone().filter(|u| !u.trim().is_empty()),
        })
    }

    fn endpoint(&self) -> Result<String> {
        match (&self.token, &self.user) {
            (Some(_), _) => Ok(format!("{}/user/repos", self.api_url)),
            (None, Some(user)) => Ok(format!("{}/users/{}/repos", self.api_url, user)),
            (None, None) => bail!("no GitHub token or user configured"),
        }
    }

    pub async fn repositories(&self) -> Result<Vec<Repository>> {
        let url = self.endpoint()?;
        let mut request = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("token {}", token));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("GitHub API returned {}", status.as_u16());
        }
        let repos: Vec<ApiRepository> = response
            .json()
            .await
            .context("unexpected GitHub response")?;
        tracing::info!("fetched {} GitHub repositories", repos.len());
        Ok(repos.into_iter().map(Repository::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(token: Option<&str>, user: Option<&str>) -> GithubClient {
        GithubClient::new(&GithubConfig {
            api_url: "https://api.example.com/".into(),
            token: token.map(String::from),
            user: user.map(String::from),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_prefers_token() {
        assert_eq!(
            client(Some("t"), Some("ada")).endpoint().unwrap(),
            "https://api.example.com/user/repos"
        );
        assert_eq!(
            client(None, Some("ada")).endpoint().unwrap(),
            "https://api.example.com/users/ada/repos"
        );
        assert!(client(Some("  "), None).endpoint().is_err());
    }

    #[test]
    fn test_repository_mapping() {
        let raw: ApiRepository = serde_json::from_value(serde_json::json!({
            "name": "folio",
            "description": null,
            "html_url": "https://github.com/ada/folio",
            "stargazers_count": 12,
            "forks_count": 4,
            "language": "Rust",
            "updated_at": "2024-05-01T10:00:00Z",
            "private": false
        }))
        .unwrap();
        let repo = Repository::from(raw);
        assert_eq!(repo.url, "https://github.com/ada/folio");
        assert_eq!(repo.stars, 12);
        assert_eq!(repo.description, None);
    }
}
