use async_trait::async_trait;
use campaigns_core::{ChangesetMetadata, DiffStat, Error, RepoId, Result};
use serde::{Deserialize, Serialize};

use crate::git::{CommitAuthor, GitClient};
use crate::source::{ChangesetFields, ChangesetSource};

/// Talks to a code-host proxy over HTTP rather than the three hosts'
/// REST/GraphQL APIs directly, the same indirection gitserver gives the
/// rest of Sourcegraph for git plumbing: one small JSON RPC surface instead
/// of three bespoke API clients baked into the reconciler.
pub struct HttpChangesetSource {
    client: reqwest::Client,
    base_url: String,
    host_supports_drafts: bool,
}

impl HttpChangesetSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, host_supports_drafts: bool) -> Self {
        Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), host_supports_drafts }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &T) -> Result<R> {
        let response = self.client.post(self.url(path)).json(body).send().await.map_err(transient)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                Error::Transient(format!("code host proxy returned {status}: {text}"))
            } else {
                Error::Validation(format!("code host proxy rejected request ({status}): {text}"))
            });
        }
        response.json().await.map_err(transient)
    }
}

fn transient(err: reqwest::Error) -> Error {
    Error::Transient(format!("code host proxy request failed: {err}"))
}

#[derive(Serialize)]
struct ExternalIdRequest<'a> {
    external_id: &'a str,
}

#[derive(Deserialize)]
struct CreateResponse {
    metadata: ChangesetMetadata,
    already_exists: bool,
}

#[async_trait]
impl ChangesetSource for HttpChangesetSource {
    fn supports_drafts(&self) -> bool {
        self.host_supports_drafts
    }

    async fn load(&self, external_id: &str) -> Result<ChangesetMetadata> {
        self.send("changesets/load", &ExternalIdRequest { external_id }).await
    }

    async fn create(&self, fields: &ChangesetFields) -> Result<(ChangesetMetadata, bool)> {
        let resp: CreateResponse = self.send("changesets/create", fields).await?;
        Ok((resp.metadata, resp.already_exists))
    }

    async fn create_draft(&self, fields: &ChangesetFields) -> Result<(ChangesetMetadata, bool)> {
        let resp: CreateResponse = self.send("changesets/create-draft", fields).await?;
        Ok((resp.metadata, resp.already_exists))
    }

    async fn update(&self, external_id: &str, fields: &ChangesetFields) -> Result<ChangesetMetadata> {
        #[derive(Serialize)]
        struct Request<'a> {
            external_id: &'a str,
            #[serde(flatten)]
            fields: &'a ChangesetFields,
        }
        self.send("changesets/update", &Request { external_id, fields }).await
    }

    async fn close(&self, external_id: &str) -> Result<ChangesetMetadata> {
        self.send("changesets/close", &ExternalIdRequest { external_id }).await
    }

    async fn reopen(&self, external_id: &str) -> Result<ChangesetMetadata> {
        self.send("changesets/reopen", &ExternalIdRequest { external_id }).await
    }

    async fn undraft(&self, external_id: &str) -> Result<ChangesetMetadata> {
        self.send("changesets/undraft", &ExternalIdRequest { external_id }).await
    }
}

pub struct HttpGitClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGitClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[derive(Serialize)]
struct CreateCommitRequest<'a> {
    repo_id: RepoId,
    head_ref: &'a str,
    base_ref: &'a str,
    diff: &'a str,
    message: &'a str,
    author: &'a CommitAuthor,
}

#[derive(Deserialize)]
struct CreateCommitResponse {
    head_oid: String,
}

#[derive(Serialize)]
struct DiffStatRequest<'a> {
    repo_id: RepoId,
    base_oid: &'a str,
    head_oid: &'a str,
}

#[async_trait]
impl GitClient for HttpGitClient {
    async fn create_commit_from_patch(
        &self,
        repo_id: RepoId,
        head_ref: &str,
        base_ref: &str,
        diff: &str,
        message: &str,
        author: &CommitAuthor,
    ) -> Result<String> {
        let request = CreateCommitRequest { repo_id, head_ref, base_ref, diff, message, author };
        let response = self
            .client
            .post(self.url("commits/create-from-patch"))
            .json(&request)
            .send()
            .await
            .map_err(transient)?;
        if !response.status().is_success() {
            return Err(Error::Transient(format!("gitserver returned {}", response.status())));
        }
        let body: CreateCommitResponse = response.json().await.map_err(transient)?;
        Ok(body.head_oid)
    }

    async fn diff_stat(&self, repo_id: RepoId, base_oid: &str, head_oid: &str) -> Result<DiffStat> {
        let response = self
            .client
            .post(self.url("diff-stat"))
            .json(&DiffStatRequest { repo_id, base_oid, head_oid })
            .send()
            .await
            .map_err(transient)?;
        if !response.status().is_success() {
            return Err(Error::Transient(format!("gitserver returned {}", response.status())));
        }
        response.json().await.map_err(transient)
    }
}
