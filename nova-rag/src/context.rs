//! Assembly of retrieved documents into a bounded prompt context.

use std::borrow::Cow;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{BudgetUnit, ContextConfig, Parameters};
use crate::document::Document;

/// Renders ranked documents into a single context string.
///
/// Documents keep their incoming order. When the rendered output exceeds
/// `max_tokens` (in the configured [`BudgetUnit`]) documents are dropped
/// from the end until it fits.
///
/// # Example
///
/// ```rust,ignore
/// use nova_rag::{ContextBuilder, ContextConfig, Parameters};
///
/// let builder = ContextBuilder::new(ContextConfig::default());
/// let prompt = builder.build_context(&docs, "Why do cats purr?", &Parameters::new());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Size of `text` in the configured budget unit.
    pub fn measure(&self, text: &str) -> usize {
        let chars = text.chars().count();
        match self.config.budget_unit {
            BudgetUnit::Characters => chars,
            BudgetUnit::EstimatedTokens => chars.div_ceil(4),
        }
    }

    /// Render `documents` and `query` through the context template.
    ///
    /// An empty document list renders as an empty string. Extra `{key}`
    /// placeholders in the template are filled from `parameters`; unknown
    /// placeholders are left as they are.
    pub fn build_context(
        &self,
        documents: &[Document],
        query: &str,
        parameters: &Parameters,
    ) -> String {
        if documents.is_empty() {
            return String::new();
        }

        let blocks: Vec<String> =
            documents.iter().enumerate().map(|(i, doc)| self.render_document(i + 1, doc)).collect();

        for kept in (1..=blocks.len()).rev() {
            let rendered = self.render(&blocks[..kept].join("\n\n"), query, parameters);
            let size = self.measure(&rendered);
            if size <= self.config.max_tokens {
                debug!(documents = documents.len(), kept, size, "built context");
                return rendered;
            }
        }

        let rendered = self.render("", query, parameters);
        warn!(
            documents = documents.len(),
            max_tokens = self.config.max_tokens,
            "no document fits the context budget"
        );
        rendered
    }

    fn render_document(&self, index: usize, document: &Document) -> String {
        if !self.config.format_documents {
            return document.content.clone();
        }
        let source = document
            .metadata
            .get(&self.config.source_key)
            .map(ToString::to_string)
            .unwrap_or_default();
        render_template(&self.config.document_template, |name| match name {
            "index" => Some(Cow::Owned(index.to_string())),
            "content" => Some(Cow::Borrowed(document.content.as_str())),
            "source" => Some(Cow::Borrowed(source.as_str())),
            _ => None,
        })
    }

    fn render(&self, context: &str, query: &str, parameters: &Parameters) -> String {
        render_template(&self.config.template, |name| match name {
            "context" => Some(Cow::Borrowed(context)),
            "question" => Some(Cow::Borrowed(query)),
            other => parameters.get(other).map(parameter_text),
        })
    }
}

fn parameter_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Substitute `{name}` placeholders in one pass, so substituted text is never
/// scanned again.
fn render_template<'a, F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<Cow<'a, str>>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let name = &after[..close];
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-');
            if valid { lookup(name).map(|text| (text, close)) } else { None }
        });
        match replacement {
            Some((text, close)) => {
                out.push_str(&text);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, content: &str, source: &str) -> Document {
        Document::new(id, content).with_metadata("source", source)
    }

    #[test]
    fn empty_documents_render_empty() {
        let builder = ContextBuilder::default();
        assert_eq!(builder.build_context(&[], "anything", &Parameters::new()), "");
    }

    #[test]
    fn default_templates_number_documents() {
        let builder = ContextBuilder::default();
        let docs = [doc("a", "Cats purr.", "cats.txt"), doc("b", "Dogs bark.", "dogs.txt")];
        let context = builder.build_context(&docs, "Who purrs?", &Parameters::new());
        assert_eq!(
            context,
            "Answer the question based on the following context:\n\n\
             Document [1]: Cats purr.\nSource: cats.txt\n\n\
             Document [2]: Dogs bark.\nSource: dogs.txt\n\n\
             Question: Who purrs?"
        );
    }

    #[test]
    fn missing_source_renders_empty() {
        let builder = ContextBuilder::default();
        let context =
            builder.build_context(&[Document::new("a", "text")], "q", &Parameters::new());
        assert!(context.contains("Document [1]: text\nSource: \n"));
    }

    #[test]
    fn unformatted_documents_are_joined_by_blank_line() {
        let config = ContextConfig {
            template: "{context}".into(),
            format_documents: false,
            ..ContextConfig::default()
        };
        let builder = ContextBuilder::new(config);
        let docs = [Document::new("a", "one"), Document::new("b", "two")];
        assert_eq!(builder.build_context(&docs, "q", &Parameters::new()), "one\n\ntwo");
    }

    #[test]
    fn documents_are_dropped_from_the_end_to_fit() {
        let config = ContextConfig {
            template: "{context}".into(),
            format_documents: false,
            max_tokens: 12,
            ..ContextConfig::default()
        };
        let builder = ContextBuilder::new(config);
        let docs =
            [Document::new("a", "aaaa"), Document::new("b", "bbbb"), Document::new("c", "cccc")];
        // "aaaa\n\nbbbb" is 10 chars; adding the third makes 16.
        assert_eq!(builder.build_context(&docs, "q", &Parameters::new()), "aaaa\n\nbbbb");
    }

    #[test]
    fn estimated_tokens_round_up() {
        let config =
            ContextConfig { budget_unit: BudgetUnit::EstimatedTokens, ..ContextConfig::default() };
        let builder = ContextBuilder::new(config);
        assert_eq!(builder.measure(""), 0);
        assert_eq!(builder.measure("abcd"), 1);
        assert_eq!(builder.measure("abcde"), 2);
    }

    #[test]
    fn oversized_first_document_leaves_template_only() {
        let config = ContextConfig {
            template: "Q: {question}\n{context}".into(),
            max_tokens: 8,
            ..ContextConfig::default()
        };
        let builder = ContextBuilder::new(config);
        let docs = [Document::new("a", "far too long for the budget")];
        assert_eq!(builder.build_context(&docs, "why", &Parameters::new()), "Q: why\n");
    }

    #[test]
    fn custom_parameters_fill_placeholders() {
        let config = ContextConfig {
            template: "[{persona}] {context} ({year}) {unknown}".into(),
            format_documents: false,
            ..ContextConfig::default()
        };
        let builder = ContextBuilder::new(config);
        let mut params = Parameters::new();
        params.insert("persona".into(), Value::from("librarian"));
        params.insert("year".into(), Value::from(2024));
        let context = builder.build_context(&[Document::new("a", "body")], "q", &params);
        assert_eq!(context, "[librarian] body (2024) {unknown}");
    }

    #[test]
    fn document_content_is_not_rescanned() {
        let config = ContextConfig {
            template: "{context} / {question}".into(),
            format_documents: false,
            ..ContextConfig::default()
        };
        let builder = ContextBuilder::new(config);
        let docs = [Document::new("a", "literal {question} in text")];
        assert_eq!(
            builder.build_context(&docs, "real", &Parameters::new()),
            "literal {question} in text / real"
        );
    }
}
