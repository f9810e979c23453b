//! Knowledge base query capability — stub for article retrieval.
//!
//! In production this would search the tenant's knowledge base. The stub
//! returns mock articles so read-only business capabilities can be tested
//! end-to-end.

use async_trait::async_trait;
use deskhand_core::capability::Capability;
use deskhand_core::context::ExecutionContext;
use deskhand_core::error::CapabilityError;

pub struct KnowledgeBaseCapability;

#[async_trait]
impl Capability for KnowledgeBaseCapability {
    fn name(&self) -> &str {
        "knowledge_base_query"
    }

    fn description(&self) -> &str {
        "Search the knowledge base for relevant articles. Returns matches sorted by relevance."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _ctx: &ExecutionContext,
    ) -> Result<String, CapabilityError> {
        let query = input["query"]
            .as_str()
            .ok_or_else(|| CapabilityError::InvalidInput("missing 'query'".into()))?;
        let limit = input["limit"].as_u64().unwrap_or(3).min(10) as usize;

        let results = search_mock_articles(query, limit);
        serde_json::to_string_pretty(&results).map_err(|e| CapabilityError::ExecutionFailed {
            capability: "knowledge_base_query".into(),
            reason: e.to_string(),
        })
    }
}

#[derive(Clone, serde::Serialize)]
struct Article {
    article_id: String,
    title: String,
    content: String,
    relevance: f64,
}

fn search_mock_articles(query: &str, limit: usize) -> Vec<Article> {
    let q = query.to_lowercase();

    // Topic-specific mock articles for realistic loop testing.
    let topics: Vec<(&str, Vec<Article>)> = vec![
        ("invoice", vec![
            Article {
                article_id: "kb_inv_001".into(),
                title: "Posting an invoice".into(),
                content: "Invoices are posted from the sales screen. Once posted, the invoice number is immutable and the ledger entry is created automatically.".into(),
                relevance: 0.95,
            },
            Article {
                article_id: "kb_inv_002".into(),
                title: "Voiding an invoice".into(),
                content: "A posted invoice can only be voided with a reversing entry. Partial voids are not supported; issue a credit note instead.".into(),
                relevance: 0.84,
            },
        ]),
        ("inventory", vec![
            Article {
                article_id: "kb_stk_001".into(),
                title: "Stock adjustments".into(),
                content: "Stock adjustments require a reason code. Negative adjustments above the shrinkage threshold need supervisor approval.".into(),
                relevance: 0.92,
            },
        ]),
        ("payroll", vec![
            Article {
                article_id: "kb_pay_001".into(),
                title: "Payroll run schedule".into(),
                content: "Payroll runs are locked two days before the pay date. Late timesheets roll into the next cycle.".into(),
                relevance: 0.90,
            },
        ]),
    ];

    for (keyword, articles) in &topics {
        if q.contains(keyword) {
            return articles.iter().take(limit).cloned().collect();
        }
    }

    // Generic fallback with decreasing relevance.
    (0..limit)
        .map(|i| Article {
            article_id: format!("kb_gen_{:03}", i),
            title: format!("Result {} for '{}'", i + 1, query),
            content: format!("Mock article {} related to '{}'.", i + 1, query),
            relevance: 0.9 - (i as f64 * 0.1),
        })
        .collect()
}
