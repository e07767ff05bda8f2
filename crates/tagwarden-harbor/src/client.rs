//! Harbor REST client
//!
//! Every request carries basic auth and a fresh `X-Request-Id`. Project paths
//! address projects by numeric ID, so they also send `X-Is-Resource-Name: false`.

use crate::config::HarborConfig;
use crate::wire::{
    error_message, parse_location_id, parse_retention_id, ProjectDto, RetentionMetadataDto,
    TriggerExecutionDto,
};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use tagwarden_core::{
    GatewayError, ImmutableRule, Page, ProjectId, ProjectSummary, RegistryGateway,
    RetentionExecution, RetentionId, RetentionPolicy, RuleId,
};
use uuid::Uuid;

/// Correlation header sent with every request
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Tells Harbor the project path segment is an ID, not a name
pub const RESOURCE_NAME_HEADER: &str = "X-Is-Resource-Name";

/// Total item count Harbor reports on listings
pub const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

const USER_AGENT: &str = concat!("tagwarden/", env!("CARGO_PKG_VERSION"));

/// [`RegistryGateway`] over Harbor's v2 REST API
#[derive(Debug, Clone)]
pub struct HarborClient {
    http: reqwest::Client,
    config: HarborConfig,
}

impl HarborClient {
    /// Create client
    ///
    /// # Errors
    /// - `GatewayError::Config` if the HTTP client cannot be built
    pub fn new(config: HarborConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HarborConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request_id = Uuid::new_v4();
        tracing::debug!(%method, path, %request_id, "harbor request");
        self.http
            .request(method, format!("{}{path}", self.config.base_url()))
            .basic_auth(self.config.username(), Some(self.config.password()))
            .header(ACCEPT, "application/json")
            .header(REQUEST_ID_HEADER, request_id.to_string())
    }

    fn project_request(&self, method: Method, project_id: ProjectId, tail: &str) -> RequestBuilder {
        self.request(method, &format!("/projects/{project_id}{tail}"))
            .header(RESOURCE_NAME_HEADER, "false")
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let fallback = status.canonical_reason().unwrap_or("request failed");
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body, fallback);
        tracing::debug!(status = status.as_u16(), %message, "harbor error response");
        Err(GatewayError::status(status.as_u16(), message))
    }

    /// Like `send`, with not-found mapped to `None`
    async fn send_optional(&self, builder: RequestBuilder) -> Result<Option<Response>, GatewayError> {
        match self.send(builder).await {
            Ok(response) => Ok(Some(response)),
            Err(GatewayError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    fn location_id(response: &Response) -> Option<i64> {
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_location_id)
    }

    /// Read every page of a listing
    ///
    /// Stops on a short page, once `X-Total-Count` items are in hand, or when
    /// a page brings no key not already seen (a registry ignoring `page`).
    /// `None` if the first page is not found.
    async fn collect_pages<T, R, K>(
        &self,
        request: R,
        key: K,
    ) -> Result<Option<Vec<T>>, GatewayError>
    where
        T: DeserializeOwned + Send,
        R: Fn() -> RequestBuilder + Send + Sync,
        K: Fn(&T) -> Option<i64> + Send + Sync,
    {
        let mut items = Vec::new();
        let mut seen = BTreeSet::new();
        let mut page = Page::first(self.config.page_size);
        loop {
            let Some(response) = self.send_optional(paged(request(), page)).await? else {
                if page.number == 1 {
                    return Ok(None);
                }
                break;
            };
            let total = total_count(&response);
            let batch: Option<Vec<T>> = Self::decode(response).await?;
            let batch = batch.unwrap_or_default();
            let short = batch.len() < page.size as usize;

            let mut fresh = false;
            for item in batch {
                match key(&item) {
                    Some(id) if !seen.insert(id) => continue,
                    Some(_) => fresh = true,
                    None => {}
                }
                items.push(item);
            }

            if short || total.is_some_and(|total| items.len() >= total) {
                break;
            }
            if !fresh {
                tracing::warn!(page = page.number, "registry repeated a page, listing stopped");
                break;
            }
            page = page.next();
        }
        tracing::debug!(total = items.len(), pages = page.number, "listing read");
        Ok(Some(items))
    }
}

fn paged(builder: RequestBuilder, page: Page) -> RequestBuilder {
    builder.query(&[("page", page.number), ("page_size", page.size)])
}

fn total_count(response: &Response) -> Option<usize> {
    response
        .headers()
        .get(TOTAL_COUNT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

#[async_trait]
impl RegistryGateway for HarborClient {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, GatewayError> {
        let projects = self
            .collect_pages(
                || self.request(Method::GET, "/projects"),
                |project: &ProjectDto| Some(project.project_id),
            )
            .await?
            .ok_or_else(|| GatewayError::status(404, "project listing not found"))?;
        projects.into_iter().map(ProjectDto::into_summary).collect()
    }

    async fn list_immutable_rules(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<Vec<ImmutableRule>>, GatewayError> {
        self.collect_pages(
            || self.project_request(Method::GET, project_id, "/immutabletagrules"),
            |rule: &ImmutableRule| rule.id.map(RuleId::get),
        )
        .await
    }

    async fn create_immutable_rule(
        &self,
        project_id: ProjectId,
        rule: &ImmutableRule,
    ) -> Result<RuleId, GatewayError> {
        let builder = self
            .project_request(Method::POST, project_id, "/immutabletagrules")
            .json(rule);
        let response = self.send(builder).await?;
        if let Some(id) = Self::location_id(&response) {
            return Ok(RuleId(id));
        }

        // No usable Location header: the newest rule is the one just created
        tracing::debug!(%project_id, "rule created without Location header, re-reading rules");
        self.list_immutable_rules(project_id)
            .await?
            .unwrap_or_default()
            .iter()
            .filter_map(|r| r.id)
            .max()
            .ok_or_else(|| {
                GatewayError::InvalidResponse("created immutable rule has no ID".to_string())
            })
    }

    async fn update_immutable_rule(
        &self,
        project_id: ProjectId,
        rule_id: RuleId,
        rule: &ImmutableRule,
    ) -> Result<(), GatewayError> {
        let builder = self
            .project_request(
                Method::PUT,
                project_id,
                &format!("/immutabletagrules/{rule_id}"),
            )
            .json(rule);
        self.send(builder).await?;
        Ok(())
    }

    async fn get_retention_id(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<RetentionId>, GatewayError> {
        let builder = self.project_request(Method::GET, project_id, "/metadatas/retention_id");
        let Some(response) = self.send_optional(builder).await? else {
            return Ok(None);
        };
        let metadata: Option<RetentionMetadataDto> = Self::decode(response).await?;
        match metadata.and_then(|m| m.retention_id) {
            Some(raw) => parse_retention_id(&raw),
            None => Ok(None),
        }
    }

    async fn create_retention_policy(
        &self,
        policy: &RetentionPolicy,
    ) -> Result<RetentionId, GatewayError> {
        let builder = self.request(Method::POST, "/retentions").json(policy);
        let response = self.send(builder).await?;
        if let Some(id) = Self::location_id(&response) {
            return Ok(RetentionId(id));
        }

        let project_id = policy.project_id().ok_or_else(|| {
            GatewayError::InvalidResponse("created retention policy has no Location".to_string())
        })?;
        tracing::debug!(%project_id, "policy created without Location header, re-reading metadata");
        self.get_retention_id(project_id).await?.ok_or_else(|| {
            GatewayError::InvalidResponse(format!(
                "project {project_id} has no retention policy after creation"
            ))
        })
    }

    async fn trigger_execution(
        &self,
        policy_id: RetentionId,
        dry_run: bool,
    ) -> Result<(), GatewayError> {
        let builder = self
            .request(Method::POST, &format!("/retentions/{policy_id}/executions"))
            .json(&TriggerExecutionDto { dry_run });
        self.send(builder).await?;
        Ok(())
    }

    async fn list_executions(
        &self,
        policy_id: RetentionId,
        page: Page,
    ) -> Result<Vec<RetentionExecution>, GatewayError> {
        let builder = paged(
            self.request(Method::GET, &format!("/retentions/{policy_id}/executions")),
            page,
        );
        let response = self.send(builder).await?;
        let executions: Option<Vec<RetentionExecution>> = Self::decode(response).await?;
        Ok(executions.unwrap_or_default())
    }
}
