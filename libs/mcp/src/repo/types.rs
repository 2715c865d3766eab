//! Parameter types and ToolCall implementations for repository tools.
//!
//! Each parameter type implements the `ToolCall` trait, binding it to its
//! execution logic. Wire names are camelCase to match the tool schemas.

use super::{to_mcp_error, RepoResource};
use crate::ToolCall;
use async_trait::async_trait;
use horreum_client::{resolve_range, PageCursor, SortDirection, WindowedPage};
use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Page size applied when the caller gives neither pageSize nor pageToken.
pub const DEFAULT_PAGE_SIZE: u64 = 100;
/// Largest accepted pageSize.
pub const MAX_PAGE_SIZE: u64 = 500;

/// Sort order accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SortDirectionParam {
    Ascending,
    Descending,
}

impl From<SortDirectionParam> for SortDirection {
    fn from(param: SortDirectionParam) -> Self {
        match param {
            SortDirectionParam::Ascending => SortDirection::Ascending,
            SortDirectionParam::Descending => SortDirection::Descending,
        }
    }
}

/// Resolve pagination inputs into a cursor.
///
/// A pageToken takes precedence; explicit pageSize/page are ignored when one
/// is present. Without a token, pageSize defaults to [`DEFAULT_PAGE_SIZE`];
/// anything beyond [`MAX_PAGE_SIZE`] is capped, not rejected.
pub(crate) fn resolve_cursor(
    page_token: Option<&str>,
    page_size: Option<u64>,
    page: Option<u64>,
) -> Result<PageCursor, McpError> {
    if let Some(token) = page_token {
        return PageCursor::decode(token).map_err(to_mcp_error);
    }
    let limit = page_size.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    if limit < 1 {
        return Err(McpError::invalid_params("pageSize must be >= 1", None));
    }
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(McpError::invalid_params("page must be >= 1", None));
    }
    Ok(PageCursor::new(page, limit))
}

/// Wrap one page of records into the standard paginated tool response:
/// `{"<items_key>": [...], "pagination": {...}}`.
fn page_result<T: Serialize>(
    items_key: &str,
    page: WindowedPage<T>,
) -> Result<CallToolResult, McpError> {
    let records = serde_json::to_value(&page.records)
        .map_err(|e| McpError::internal_error(format!("failed to encode records: {}", e), None))?;

    let mut pagination = serde_json::Map::new();
    pagination.insert("has_more".into(), json!(page.has_more));
    pagination.insert("total_count".into(), json!(page.total_count));
    if let Some(token) = page.next_page_token {
        pagination.insert("next_page_token".into(), json!(token));
    }

    let mut body = serde_json::Map::new();
    body.insert(items_key.to_string(), records);
    body.insert("pagination".into(), Value::Object(pagination));

    Ok(CallToolResult::success(vec![Content::text(
        Value::Object(body).to_string(),
    )]))
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string(value)
        .map_err(|e| McpError::internal_error(format!("failed to encode result: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

/// Interpret the `test` input as a numeric ID, or resolve it by name.
async fn resolve_test_id(
    res: &RepoResource,
    test: &str,
    cancel: &CancellationToken,
) -> Result<i64, McpError> {
    let test = test.trim();
    if test.is_empty() {
        return Err(McpError::invalid_params("test must not be empty", None));
    }
    if let Ok(id) = test.parse::<i64>() {
        return Ok(id);
    }
    let summary = res
        .client()
        .get_test_by_name(test, cancel)
        .await
        .map_err(to_mcp_error)?;
    Ok(summary.id)
}

// ============================================================
// list_tests
// ============================================================

/// Parameters for listing test definitions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListTestsParams {
    /// Continuation token from a previous response's pagination block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Records per page, 1-500 (default 100); ignored when pageToken is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    /// 1-based page index (default 1); ignored when pageToken is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    /// Restrict the listing to one folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

#[async_trait]
impl ToolCall for ListTestsParams {
    type Resource = RepoResource;

    async fn call(
        self,
        res: &RepoResource,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let cursor = resolve_cursor(self.page_token.as_deref(), self.page_size, self.page)?;
        let page = res
            .client()
            .list_tests_page(&cursor, self.folder.as_deref(), &cancel)
            .await
            .map_err(to_mcp_error)?;

        tracing::info!(total = page.total_count, returned = page.records.len(), "listed tests");
        page_result("tests", page)
    }
}

// ============================================================
// get_test
// ============================================================

/// Parameters for fetching one test definition.
///
/// Exactly one of `id` and `name` must be given.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetTestParams {
    /// Numeric test ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Exact test name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

pub(crate) enum TestSelector<'a> {
    Id(i64),
    Name(&'a str),
}

impl GetTestParams {
    pub(crate) fn selector(&self) -> Result<TestSelector<'_>, McpError> {
        match (self.id, self.name.as_deref()) {
            (Some(id), None) => Ok(TestSelector::Id(id)),
            (None, Some(name)) if !name.trim().is_empty() => Ok(TestSelector::Name(name)),
            _ => Err(McpError::invalid_params(
                "provide exactly one of 'id' or 'name'",
                None,
            )),
        }
    }
}

#[async_trait]
impl ToolCall for GetTestParams {
    type Resource = RepoResource;

    async fn call(
        self,
        res: &RepoResource,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let test = match self.selector()? {
            TestSelector::Id(id) => res.client().get_test(id, &cancel).await,
            TestSelector::Name(name) => res.client().get_test_by_name(name, &cancel).await,
        }
        .map_err(to_mcp_error)?;

        tracing::info!(test_id = test.id, name = %test.name, "fetched test");
        json_result(&test)
    }
}

// ============================================================
// list_runs
// ============================================================

/// Parameters for listing the runs of one test.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListRunsParams {
    /// Test numeric ID or exact test name
    pub test: String,
    /// Start of the time window: epoch millis, ISO timestamp, or a phrase
    /// like "yesterday" or "last 7 days"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// End of the time window, same formats as `from` (defaults to now when
    /// only `from` is given)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Continuation token from a previous response's pagination block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Records per page, 1-500 (default 100); ignored when pageToken is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    /// 1-based page index (default 1); ignored when pageToken is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    /// Upstream sort field (default "start")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    /// Sort direction (default Descending, newest first)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirectionParam>,
}

#[async_trait]
impl ToolCall for ListRunsParams {
    type Resource = RepoResource;

    async fn call(
        self,
        res: &RepoResource,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let test_id = resolve_test_id(res, &self.test, &cancel).await?;
        let cursor = resolve_cursor(self.page_token.as_deref(), self.page_size, self.page)?;
        let sort = self.sort.as_deref().unwrap_or("start");
        let direction: SortDirection = self.direction.map(Into::into).unwrap_or_default();

        let page = if self.from.is_some() || self.to.is_some() {
            let range = resolve_range(self.from.as_deref(), self.to.as_deref())
                .map_err(to_mcp_error)?;
            res.client()
                .list_runs_in_range(test_id, &range, &cursor, sort, direction, &cancel)
                .await
        } else {
            res.client()
                .list_runs_page(test_id, &cursor, sort, direction, &cancel)
                .await
        }
        .map_err(to_mcp_error)?;

        tracing::info!(
            test_id,
            total = page.total_count,
            returned = page.records.len(),
            "listed runs"
        );
        page_result("runs", page)
    }
}

// ============================================================
// get_run
// ============================================================

/// Parameters for fetching one run, payload included.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetRunParams {
    /// Numeric run ID
    pub id: i64,
}

#[async_trait]
impl ToolCall for GetRunParams {
    type Resource = RepoResource;

    async fn call(
        self,
        res: &RepoResource,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let run = res
            .client()
            .get_run(self.id, &cancel)
            .await
            .map_err(to_mcp_error)?;

        tracing::info!(run_id = run.id, test_id = run.test_id, "fetched run");
        json_result(&run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horreum_client::RunSummary;

    #[test]
    fn test_cursor_token_takes_precedence() {
        let token = PageCursor::new(5, 25).encode();
        // Explicit pageSize/page are ignored when a token is given.
        let cursor = resolve_cursor(Some(&token), Some(999), Some(999)).unwrap();
        assert_eq!(cursor, PageCursor::new(5, 25));
    }

    #[test]
    fn test_cursor_defaults() {
        let cursor = resolve_cursor(None, None, None).unwrap();
        assert_eq!(cursor, PageCursor::new(1, DEFAULT_PAGE_SIZE));

        let cursor = resolve_cursor(None, Some(50), Some(3)).unwrap();
        assert_eq!(cursor, PageCursor::new(3, 50));
    }

    #[test]
    fn test_cursor_caps_oversized_page_size() {
        assert!(resolve_cursor(None, Some(0), None).is_err());
        let cursor = resolve_cursor(None, Some(MAX_PAGE_SIZE + 1), None).unwrap();
        assert_eq!(cursor.limit, MAX_PAGE_SIZE);
        let cursor = resolve_cursor(None, Some(MAX_PAGE_SIZE), None).unwrap();
        assert_eq!(cursor.limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_cursor_rejects_zero_page() {
        let err = resolve_cursor(None, None, Some(0)).unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn test_cursor_rejects_foreign_token() {
        let err = resolve_cursor(Some("invalid-token-xyz"), None, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data.unwrap()["code"], "INVALID_REQUEST");
    }

    #[test]
    fn test_get_test_selector_requires_exactly_one() {
        let both = GetTestParams {
            id: Some(1),
            name: Some("x".into()),
        };
        assert!(both.selector().is_err());

        let neither = GetTestParams { id: None, name: None };
        assert!(neither.selector().is_err());

        let blank_name = GetTestParams {
            id: None,
            name: Some("  ".into()),
        };
        assert!(blank_name.selector().is_err());

        let by_id = GetTestParams { id: Some(7), name: None };
        assert!(matches!(by_id.selector().unwrap(), TestSelector::Id(7)));
    }

    #[test]
    fn test_page_result_shape() {
        let run: RunSummary = serde_json::from_value(serde_json::json!({
            "id": 1, "testid": 42, "start": 1000
        }))
        .unwrap();
        let page = WindowedPage {
            records: vec![run],
            total_count: 150,
            has_more: true,
            next_page_token: Some(PageCursor::new(2, 100).encode()),
        };

        let result = page_result("runs", page).unwrap();
        let text = &result.content[0].as_text().unwrap().text;
        let body: Value = serde_json::from_str(text).unwrap();

        assert_eq!(body["runs"][0]["id"], 1);
        assert_eq!(body["pagination"]["has_more"], true);
        assert_eq!(body["pagination"]["total_count"], 150);
        assert!(body["pagination"]["next_page_token"].is_string());
    }

    #[test]
    fn test_page_result_omits_token_on_last_page() {
        let page: WindowedPage<RunSummary> = WindowedPage {
            records: vec![],
            total_count: 0,
            has_more: false,
            next_page_token: None,
        };

        let result = page_result("runs", page).unwrap();
        let text = &result.content[0].as_text().unwrap().text;
        let body: Value = serde_json::from_str(text).unwrap();

        assert_eq!(body["pagination"]["has_more"], false);
        assert!(body["pagination"].get("next_page_token").is_none());
    }

    #[test]
    fn test_params_use_camel_case_on_the_wire() {
        let params: ListRunsParams = serde_json::from_value(serde_json::json!({
            "test": "boot-time",
            "from": "last week",
            "pageToken": "abc",
            "pageSize": 50
        }))
        .unwrap();
        assert_eq!(params.page_token.as_deref(), Some("abc"));
        assert_eq!(params.page_size, Some(50));
    }
}
