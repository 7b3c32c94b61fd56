//! # RAG Reranker Example
//!
//! Retrieves candidates by vector similarity, then reranks them with the
//! completion-backed `LlmScorer`. A stub `KeywordJudge` stands in for the
//! language model: it rates a document by how many query keywords it
//! contains, replying in free text the way a real model would.
//!
//! Run: `cargo run --example rag_reranker`

use std::sync::Arc;

use nova_rag::{
    CompletionProvider, Document, EmbeddingProvider, InMemoryVectorStore, Parameters, RagConfig,
    RagPipeline, RerankConfig, RerankerKind, RetrievalOptions,
};

// ---------------------------------------------------------------------------
// LetterEmbeddingProvider: letter frequencies, deterministic and only
// loosely semantic
// ---------------------------------------------------------------------------

struct LetterEmbeddingProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for LetterEmbeddingProvider {
    async fn embed(&self, text: &str) -> nova_rag::Result<Vec<f32>> {
        let mut counts = vec![0.0f32; 26];
        for c in text.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
            counts[(c - b'a') as usize] += 1.0;
        }
        Ok(counts)
    }

    fn dimensions(&self) -> usize {
        26
    }
}

// ---------------------------------------------------------------------------
// KeywordJudge: answers rerank prompts with a 0-100 rating
// ---------------------------------------------------------------------------

struct KeywordJudge;

#[async_trait::async_trait]
impl CompletionProvider for KeywordJudge {
    async fn generate(&self, prompt: &str, parameters: &Parameters) -> nova_rag::Result<String> {
        let temperature = parameters.get("temperature").and_then(|v| v.as_f64()).unwrap_or(1.0);
        tracing::debug!(temperature, "judging document");

        let (instructions, document) = prompt.split_once("Document: ").unwrap_or((prompt, ""));
        // The default rerank prompt quotes the query.
        let question = instructions.split('"').nth(1).unwrap_or(instructions);
        let keywords: Vec<String> = question
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .map(str::to_lowercase)
            .collect();
        let document = document.to_lowercase();
        let hits = keywords.iter().filter(|k| document.contains(k.as_str())).count();
        let score = (hits * 100 / keywords.len().max(1)).min(100);
        Ok(format!("I would rate this document {score} out of 100."))
    }

    fn name(&self) -> &str {
        "keyword-judge"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nova_telemetry::init_telemetry("rag-reranker")?;

    let rerank = RerankConfig {
        enabled: true,
        kind: RerankerKind::Llm,
        threshold: 0.3,
        ..RerankConfig::default()
    };
    let config = RagConfig::builder()
        .minimum_score(0.0)
        .rerank_config(rerank)
        .context_template("[{department} policy assistant]\n\n{context}\n\nQuestion: {question}")
        .build()?;

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(LetterEmbeddingProvider))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .completion_provider(Arc::new(KeywordJudge))
        .build()?;

    let policies = [
        ("leave", "Employees accrue vacation leave monthly and must request leave in advance."),
        ("remote", "Remote work is allowed three days per week with manager approval."),
        ("expenses", "Travel expenses are reimbursed within thirty days of submission."),
        ("security", "Laptops must use disk encryption and a screen lock at all times."),
    ];
    let added = pipeline
        .add_documents(policies.iter().map(|(id, text)| Document::new(*id, *text)))
        .await;
    println!("Added {added} policies");

    let query = "How do I request vacation leave?";
    let options = RetrievalOptions::new(4);

    println!("\nSimilarity order for \"{query}\":");
    for doc in pipeline.retrieve_with(query, &options).await? {
        println!("  {}", doc.id);
    }

    println!("\nAfter reranking (threshold 0.3):");
    for doc in pipeline.retrieve_with(query, &options.clone().with_rerank(true)).await? {
        println!("  {}", doc.id);
    }

    let mut params = Parameters::new();
    params.insert("department".into(), serde_json::Value::from("HR"));
    let context = pipeline
        .generate_context_with(query, &options.with_rerank(true), &params)
        .await?;
    println!("\n--- context ---\n{context}\n---------------");

    Ok(())
}
