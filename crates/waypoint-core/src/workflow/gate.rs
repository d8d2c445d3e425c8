//! Gate collaborators: summarizers and approval channels.
//!
//! An interactive gate renders a summary of memory for a reviewer and
//! awaits a yes/no decision. Summarizers are synchronous and fallible;
//! a failure never blocks the gate. Approval channels are async and an
//! error from one aborts the run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::memory::MemoryStore;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("{0}")]
    Failed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("approval channel closed: {0}")]
    Closed(String),

    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// GateSummarizer
// ---------------------------------------------------------------------------

/// Renders memory into the text shown at a gate.
pub trait GateSummarizer: Send + Sync {
    fn summarize(&self, memory: &MemoryStore) -> Result<String, SummaryError>;
}

impl<F> GateSummarizer for F
where
    F: Fn(&MemoryStore) -> Result<String, SummaryError> + Send + Sync,
{
    fn summarize(&self, memory: &MemoryStore) -> Result<String, SummaryError> {
        self(memory)
    }
}

/// Resolves `{{ key.path }}` placeholders against memory.
///
/// Strings are inserted verbatim, other values as compact JSON. Placeholders
/// that do not resolve are left in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSummarizer {
    template: String,
}

impl TemplateSummarizer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, memory: &MemoryStore) -> String {
        let mut rendered = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            let end = start + 2 + len + 2;
            let path: Vec<&str> = rest[start + 2..end - 2].trim().split('.').collect();

            rendered.push_str(&rest[..start]);
            match memory.get_nested_value(&path) {
                Some(value) => rendered.push_str(&value_to_string(value)),
                None => rendered.push_str(&rest[start..end]),
            }
            rest = &rest[end..];
        }

        rendered.push_str(rest);
        rendered
    }
}

impl GateSummarizer for TemplateSummarizer {
    fn summarize(&self, memory: &MemoryStore) -> Result<String, SummaryError> {
        Ok(self.render(memory))
    }
}

/// Pretty-printed JSON of the listed memory keys (absent and null skipped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonSummarizer {
    keys: Vec<String>,
}

impl JsonSummarizer {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl GateSummarizer for JsonSummarizer {
    fn summarize(&self, memory: &MemoryStore) -> Result<String, SummaryError> {
        Ok(serde_json::to_string_pretty(&memory.select(&self.keys))?)
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// ApprovalChannel
// ---------------------------------------------------------------------------

/// What a reviewer sees at an interactive gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRequest {
    pub workflow_name: String,
    pub step_id: String,
    pub description: String,
    pub summary: String,
}

/// Obtains a human decision for an interactive gate.
pub trait ApprovalChannel: Send + Sync {
    /// `Ok(true)` approves, `Ok(false)` rejects.
    fn request(
        &self,
        request: &GateRequest,
    ) -> impl Future<Output = Result<bool, ApprovalError>> + Send;
}

/// Object-safe version of [`ApprovalChannel`].
pub trait ApprovalChannelDyn: Send + Sync {
    fn request_boxed<'a>(
        &'a self,
        request: &'a GateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ApprovalError>> + Send + 'a>>;
}

impl<T: ApprovalChannel> ApprovalChannelDyn for T {
    fn request_boxed<'a>(
        &'a self,
        request: &'a GateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ApprovalError>> + Send + 'a>> {
        Box::pin(self.request(request))
    }
}

/// Type-erased approval channel.
#[derive(Clone)]
pub struct BoxApprovalChannel {
    inner: Arc<dyn ApprovalChannelDyn>,
}

impl BoxApprovalChannel {
    pub fn new<T: ApprovalChannel + 'static>(channel: T) -> Self {
        Self {
            inner: Arc::new(channel),
        }
    }

    pub async fn request(&self, request: &GateRequest) -> Result<bool, ApprovalError> {
        self.inner.request_boxed(request).await
    }
}

impl std::fmt::Debug for BoxApprovalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BoxApprovalChannel")
    }
}

/// Approves every gate. The default channel for unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl ApprovalChannel for AutoApprove {
    async fn request(&self, _request: &GateRequest) -> Result<bool, ApprovalError> {
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory() -> MemoryStore {
        let mut memory = MemoryStore::new();
        memory.set(
            "classification",
            json!({ "area": "labor", "confidence": 0.87, "tags": ["urgent"] }),
        );
        memory.set("draft", Value::Null);
        memory
    }

    // --- TemplateSummarizer ---

    #[test]
    fn test_template_resolves_nested_paths() {
        let summarizer = TemplateSummarizer::new(
            "Area: {{ classification.area }} ({{classification.confidence}})",
        );
        assert_eq!(summarizer.render(&memory()), "Area: labor (0.87)");
    }

    #[test]
    fn test_template_renders_non_strings_as_json() {
        let summarizer = TemplateSummarizer::new("Tags: {{ classification.tags }}");
        assert_eq!(summarizer.render(&memory()), r#"Tags: ["urgent"]"#);
    }

    #[test]
    fn test_template_leaves_unresolved_placeholders() {
        let summarizer = TemplateSummarizer::new("{{ analysis.risk }} / {{ classification.area }}");
        assert_eq!(summarizer.render(&memory()), "{{ analysis.risk }} / labor");
    }

    #[test]
    fn test_template_unterminated_placeholder() {
        let summarizer = TemplateSummarizer::new("Area: {{ classification.area");
        assert_eq!(summarizer.render(&memory()), "Area: {{ classification.area");
    }

    // --- JsonSummarizer ---

    #[test]
    fn test_json_summarizer_selects_keys() {
        let summary = JsonSummarizer::new(["classification", "draft", "missing"])
            .summarize(&memory())
            .unwrap();
        let parsed: Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(parsed["classification"]["area"], json!("labor"));
        assert!(parsed.get("draft").is_none());
        assert!(parsed.get("missing").is_none());
    }

    // --- Closures ---

    #[test]
    fn test_closure_summarizer() {
        let summarizer = |memory: &MemoryStore| -> Result<String, SummaryError> {
            memory
                .get_str_nested(&["classification", "area"])
                .map(|area| format!("area={area}"))
                .ok_or_else(|| SummaryError::Failed("no classification".to_string()))
        };
        assert_eq!(summarizer.summarize(&memory()).unwrap(), "area=labor");
        assert!(summarizer.summarize(&MemoryStore::new()).is_err());
    }

    // --- Approval ---

    #[tokio::test]
    async fn test_auto_approve() {
        let channel = BoxApprovalChannel::new(AutoApprove);
        let request = GateRequest {
            workflow_name: "petition".to_string(),
            step_id: "review".to_string(),
            description: "Final review".to_string(),
            summary: String::new(),
        };
        assert!(channel.request(&request).await.unwrap());
    }
}
