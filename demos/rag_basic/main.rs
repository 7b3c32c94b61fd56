//! # RAG Basic Example
//!
//! Demonstrates the core RAG pipeline: ingest documents, retrieve the
//! closest ones for a few queries, then assemble a prompt context.
//!
//! Uses `InMemoryVectorStore` and a deterministic `TopicEmbeddingProvider`
//! so it runs with **zero API keys**.
//!
//! Run: `cargo run --example rag_basic`

use std::sync::Arc;

use nova_rag::{
    Document, EmbeddingProvider, InMemoryVectorStore, MetadataFilter, RagConfig, RagPipeline,
    RetrievalOptions,
};

// ---------------------------------------------------------------------------
// TopicEmbeddingProvider: keyword counts per topic, deterministic
// ---------------------------------------------------------------------------

struct TopicEmbeddingProvider {
    topics: Vec<Vec<&'static str>>,
}

impl TopicEmbeddingProvider {
    fn new() -> Self {
        Self {
            topics: vec![
                vec!["cat", "kitten", "feline", "purr", "whisker"],
                vec!["dog", "puppy", "canine", "bark", "leash"],
                vec!["car", "engine", "wheel", "drive", "fuel"],
            ],
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TopicEmbeddingProvider {
    async fn embed(&self, text: &str) -> nova_rag::Result<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(self
            .topics
            .iter()
            .map(|words| words.iter().map(|w| text.matches(w).count() as f32).sum())
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.topics.len()
    }

    fn name(&self) -> &str {
        "topic-keywords"
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nova_telemetry::init_telemetry("rag-basic")?;

    // -- 1. Configure the pipeline ----------------------------------------
    // chunk_size=200 keeps chunks small; minimum_score=0.5 drops chunks from
    // unrelated topics.
    let config = RagConfig::builder()
        .chunk_size(200)
        .chunk_overlap(40)
        .top_k(3)
        .minimum_score(0.5)
        .context_max_tokens(600)
        .build()?;

    // -- 2. Build the pipeline with in-memory components ------------------
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(TopicEmbeddingProvider::new()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build()?;

    // -- 3. Ingest sample documents ---------------------------------------
    let documents = vec![
        Document::new(
            "cats",
            "Cats are small carnivorous mammals. A kitten learns to purr within days. \
             Every feline uses its whiskers to judge whether it fits through a gap. \
             A cat sleeps for up to sixteen hours a day.",
        )
        .with_title("Cats")
        .with_metadata("source", "encyclopedia/cats.md")
        .with_metadata("tags", vec!["pets", "mammals"]),
        Document::new(
            "dogs",
            "Dogs were domesticated thousands of years ago. A puppy should get used to a \
             leash early. Every canine communicates with posture as well as a bark.",
        )
        .with_title("Dogs")
        .with_metadata("source", "encyclopedia/dogs.md")
        .with_metadata("tags", vec!["pets", "mammals"]),
        Document::new(
            "cars",
            "A car converts fuel into motion through its engine. Each wheel must be \
             balanced. Drive smoothly to reduce fuel consumption.",
        )
        .with_title("Cars")
        .with_metadata("source", "encyclopedia/cars.md")
        .with_metadata("tags", vec!["vehicles"]),
    ];

    println!("Ingesting {} documents...", documents.len());
    for doc in documents {
        let id = doc.id.clone();
        let chunks = pipeline.add_document(doc).await?;
        println!("  {id} → {chunks} chunk(s)");
    }
    println!("Store holds {} chunk(s)", pipeline.size().await);

    // -- 4. Query the pipeline --------------------------------------------
    let queries = ["why do kittens purr", "walking a puppy on a leash", "engine fuel use"];

    for query in &queries {
        println!("\nQuery: \"{query}\"");
        let results = pipeline.retrieve(query, 3).await?;
        if results.is_empty() {
            println!("  (no results)");
        } else {
            for (i, doc) in results.iter().enumerate() {
                let preview: String = doc.content.chars().take(70).collect();
                println!("  {}. {} | {preview}", i + 1, doc.id);
            }
        }
    }

    // -- 5. Filter by metadata --------------------------------------------
    let pets_only = RetrievalOptions::new(5)
        .with_min_score(0.0)
        .with_filter(MetadataFilter::new().require("tags", vec!["pets"]));
    let pets = pipeline.retrieve_with("engine", &pets_only).await?;
    println!("\nPets-only results for \"engine\": {}", pets.len());

    // -- 6. Assemble a prompt context -------------------------------------
    let context = pipeline.generate_context("why do kittens purr", 2).await?;
    println!("\n--- context ---\n{context}\n---------------");

    pipeline.clear_all().await?;
    println!("\nDone.");
    Ok(())
}
