/// MCP Tool handlers.
///
/// 1. search        – domain-scoped vector similarity search
/// 2. ingest_domain – queue every trusted file of a domain for ingestion
/// 3. domain_status – chunk row and vector entry counts for a domain
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::mcp::server::McpContext;
use crate::query::QueryError;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct SearchParams {
    /// Search query (natural language, at least 2 characters)
    query: String,
    /// Domain slug to search within, e.g. 'stats'
    domain: String,
    /// Max results, 1-50 (default: configured search_top_k)
    top_k: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
struct DomainParam {
    /// Domain slug to operate on
    domain: String,
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    // ── Tool 1: search ──────────────────────────────────────────────

    #[tool(
        description = "Vector-search the k nearest chunks within a single domain. Results carry id, text, source file and similarity score."
    )]
    async fn search(&self, params: Parameters<SearchParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let top_k = p.top_k.unwrap_or(self.ctx.config.search_top_k);

        let hits = match self.ctx.query.search(&p.query, &p.domain, top_k).await {
            Ok(hits) => hits,
            Err(QueryError::InvalidInput(msg)) => return error_result(&msg),
            Err(e) => return Err(McpError::internal_error(format!("search failed: {e}"), None)),
        };

        json_result(serde_json::json!({ "results": hits }))
    }

    // ── Tool 2: ingest_domain ───────────────────────────────────────

    #[tool(
        description = "Enumerate the trusted files of a domain and queue each for asynchronous ingestion. Returns only the queued count; per-file outcomes are logged."
    )]
    async fn ingest_domain(
        &self,
        params: Parameters<DomainParam>,
    ) -> Result<CallToolResult, McpError> {
        let domain = params.0.domain;
        if domain.is_empty() {
            return error_result("domain is required");
        }

        let trusted = self.ctx.config.trusted_dir(&domain);
        match self.ctx.ingestor.queue_domain(&trusted, &domain) {
            Ok(queued) => json_result(serde_json::json!({ "queued": queued })),
            Err(e @ (crate::ingest::IngestError::DomainNotFound(_)
            | crate::ingest::IngestError::NoFiles(_))) => error_result(&e.to_string()),
            Err(e) => Err(McpError::internal_error(format!("ingest failed: {e}"), None)),
        }
    }

    // ── Tool 3: domain_status ───────────────────────────────────────

    #[tool(
        description = "Report how many chunk rows and vector entries exist for a domain. Counts can briefly diverge while ingestion is in flight."
    )]
    async fn domain_status(
        &self,
        params: Parameters<DomainParam>,
    ) -> Result<CallToolResult, McpError> {
        let domain = params.0.domain;
        if domain.is_empty() {
            return error_result("domain is required");
        }

        let chunk_rows = {
            let store = self.ctx.store.lock().await;
            store
                .count_for_domain(&domain)
                .map_err(|e| McpError::internal_error(format!("status failed: {e}"), None))?
        };

        let vector_entries = {
            let index = self
                .ctx
                .index
                .get()
                .await
                .map_err(|e| McpError::internal_error(format!("status failed: {e}"), None))?;
            let index = index.lock().await;
            index
                .count(Some(&domain))
                .map_err(|e| McpError::internal_error(format!("status failed: {e}"), None))?
        };

        json_result(serde_json::json!({
            "domain": domain,
            "chunk_rows": chunk_rows,
            "vector_entries": vector_entries,
        }))
    }
}
