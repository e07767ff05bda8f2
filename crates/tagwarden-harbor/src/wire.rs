//! Harbor JSON shapes that differ from the core model

use serde::{Deserialize, Serialize};
use tagwarden_core::{GatewayError, ProjectId, ProjectSummary, RetentionId};

/// Entry of `GET /projects`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProjectDto {
    pub(crate) project_id: i64,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) metadata: Option<ProjectMetadataDto>,
}

/// Project metadata; Harbor stores every value as a string
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ProjectMetadataDto {
    #[serde(default)]
    pub(crate) retention_id: Option<String>,
}

impl ProjectDto {
    pub(crate) fn into_summary(self) -> Result<ProjectSummary, GatewayError> {
        let retention_id = match self.metadata.and_then(|m| m.retention_id) {
            Some(raw) => parse_retention_id(&raw)?,
            None => None,
        };
        Ok(ProjectSummary {
            id: ProjectId(self.project_id),
            name: self.name,
            retention_id,
        })
    }
}

/// Body of `GET /projects/{id}/metadatas/retention_id`
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RetentionMetadataDto {
    #[serde(default)]
    pub(crate) retention_id: Option<String>,
}

/// Body of `POST /retentions/{id}/executions`
#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct TriggerExecutionDto {
    pub(crate) dry_run: bool,
}

/// Harbor error envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorsDto {
    #[serde(default)]
    pub(crate) errors: Vec<ErrorEntryDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorEntryDto {
    #[serde(default)]
    pub(crate) code: String,
    #[serde(default)]
    pub(crate) message: String,
}

/// Parse a metadata retention ID; blank means none
pub(crate) fn parse_retention_id(raw: &str) -> Result<Option<RetentionId>, GatewayError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(|id| Some(RetentionId(id)))
        .map_err(|_| GatewayError::InvalidResponse(format!("retention_id {raw:?} is not a number")))
}

/// Trailing numeric segment of a `Location` header
pub(crate) fn parse_location_id(location: &str) -> Option<i64> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse().ok())
}

/// Readable message from an error response body
pub(crate) fn error_message(body: &str, fallback: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorsDto>(body) {
        let messages: Vec<String> = envelope
            .errors
            .into_iter()
            .map(|e| match (e.code.is_empty(), e.message.is_empty()) {
                (false, false) => format!("{}: {}", e.code, e.message),
                (true, false) => e.message,
                (_, true) => e.code,
            })
            .filter(|m| !m.is_empty())
            .collect();
        if !messages.is_empty() {
            return messages.join("; ");
        }
    }

    let body = body.trim();
    if body.is_empty() {
        fallback.to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_id_is_last_segment() {
        assert_eq!(parse_location_id("/api/v2.0/retentions/42"), Some(42));
        assert_eq!(
            parse_location_id("https://h/api/v2.0/projects/3/immutabletagrules/7/"),
            Some(7)
        );
        assert_eq!(parse_location_id("/api/v2.0/retentions/"), None);
        assert_eq!(parse_location_id(""), None);
    }

    #[test]
    fn project_metadata_retention_id_is_parsed() {
        let dto: ProjectDto = serde_json::from_str(
            r#"{"project_id":4,"name":"payments","metadata":{"public":"false","retention_id":"12"}}"#,
        )
        .unwrap();
        let summary = dto.into_summary().unwrap();
        assert_eq!(summary.id, ProjectId(4));
        assert_eq!(summary.retention_id, Some(RetentionId(12)));

        let dto: ProjectDto =
            serde_json::from_str(r#"{"project_id":5,"name":"billing"}"#).unwrap();
        assert_eq!(dto.into_summary().unwrap().retention_id, None);
    }

    #[test]
    fn malformed_retention_id_is_rejected() {
        assert_eq!(parse_retention_id(" "), Ok(None));
        assert!(matches!(
            parse_retention_id("abc"),
            Err(GatewayError::InvalidResponse(_))
        ));
    }

    #[test]
    fn error_envelope_is_flattened() {
        let body = r#"{"errors":[{"code":"NOT_FOUND","message":"project 9 not found"}]}"#;
        assert_eq!(error_message(body, "Not Found"), "NOT_FOUND: project 9 not found");
        assert_eq!(error_message("", "Not Found"), "Not Found");
        assert_eq!(error_message("gateway down\n", "Bad Gateway"), "gateway down");
    }
}
