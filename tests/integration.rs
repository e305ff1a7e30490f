use std::path::Path;
use std::sync::Arc;

use krag_core::bootstrap::open_store;
use krag_core::config::{Config, VectorBackend};
use krag_core::query::NO_DOCUMENTS_ANSWER;
use krag_core::{Engine, EngineError, IndexStatus};
use krag_index::in_memory_store::InMemoryVectorStore;
use krag_index::{IndexOutcome, VectorIndex, VectorStore};
use krag_llm::mock::MockProvider;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn legacy_project() -> (TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("source_code");
    write(
        &src,
        "payroll/calc.py",
        "class Payroll:\n    def net(self, gross):\n        return gross - self.tax(gross)\n\n    def tax(self, gross):\n        return gross * 0.2\n",
    );
    write(
        &src,
        "Legacy.java",
        "public class Legacy {\n    public static void main(String[] args) {\n        System.out.println(\"hi\");\n    }\n}\n",
    );
    write(&src, "settings.yaml", "database:\n  host: db.internal\n  port: 5432\n");
    write(&src, "node_modules/dep/index.js", "module.exports = {};\n");
    write(&src, ".git/config", "[core]\n");

    let mut config = Config::default();
    config.index.source_path = src;
    config.index.docs_path = dir.path().join("docs");
    config.store.backend = VectorBackend::Memory;
    (dir, config)
}

fn installed() -> MockProvider {
    MockProvider::default().with_installed(&["gemma3:1b", "gemma3:270m", "qwen2.5:3b"])
}

fn rebuilt_chunks(outcome: &IndexOutcome) -> usize {
    match outcome {
        IndexOutcome::Rebuilt(report) => report.chunks_indexed,
        IndexOutcome::AlreadyIndexed { .. } => panic!("expected a rebuild, got {outcome:?}"),
    }
}

#[tokio::test]
async fn indexing_twice_without_force_is_a_noop() {
    let (_dir, config) = legacy_project();
    let provider = MockProvider::default();
    let engine = Engine::new(config, &provider, Arc::new(InMemoryVectorStore::new()));

    let chunks = rebuilt_chunks(&engine.index_documents(false).await.unwrap());
    let embeds = provider.embed_calls();
    let second = engine.index_documents(false).await.unwrap();

    assert_eq!(
        second,
        IndexOutcome::AlreadyIndexed {
            chunks: chunks as u64
        }
    );
    assert_eq!(provider.embed_calls(), embeds);
    engine.shutdown().await;
}

#[tokio::test]
async fn forced_reindex_does_not_accumulate() {
    let (_dir, config) = legacy_project();
    let engine = Engine::new(config, &MockProvider::default(), Arc::new(InMemoryVectorStore::new()));

    let first = rebuilt_chunks(&engine.index_documents(true).await.unwrap());
    let second = rebuilt_chunks(&engine.index_documents(true).await.unwrap());
    assert_eq!(first, second);
    assert_eq!(engine.stats().await.total_chunks, second as u64);
    engine.shutdown().await;
}

#[tokio::test]
async fn excluded_directories_are_not_indexed() {
    let (_dir, config) = legacy_project();
    let engine = Engine::new(config, &MockProvider::default(), Arc::new(InMemoryVectorStore::new()));

    let IndexOutcome::Rebuilt(report) = engine.index_documents(false).await.unwrap() else {
        panic!("expected rebuild");
    };
    // calc.py, Legacy.java, settings.yaml
    assert_eq!(report.files_loaded, 3);
    engine.shutdown().await;
}

#[tokio::test]
async fn chunks_carry_language_and_category() {
    let (_dir, config) = legacy_project();
    let collection = config.store.collection.clone();
    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let provider = MockProvider::default();
    let engine = Engine::new(config, &provider, Arc::clone(&store));
    engine.index_documents(false).await.unwrap();

    let index = VectorIndex::new(store, provider, collection);
    let hits = index.similarity_search("payroll tax gross", 10).await.unwrap();
    let python = hits
        .iter()
        .find(|h| h.filename == "calc.py")
        .expect("calc.py was indexed");
    assert_eq!(python.language, "python");
    assert_eq!(python.category, "source_code");

    let yaml = hits.iter().find(|h| h.filename == "settings.yaml").unwrap();
    assert_eq!(yaml.category, "configuration");
    engine.shutdown().await;
}

#[tokio::test]
async fn empty_index_answers_without_calling_the_model() {
    let (_dir, config) = legacy_project();
    let provider = MockProvider::default();
    let engine = Engine::new(config, &provider, Arc::new(InMemoryVectorStore::new()));

    let response = engine.query("How is tax computed?").await;
    assert_eq!(response.answer, NO_DOCUMENTS_ANSWER);
    assert!(response.sources.is_empty());
    assert!(response.response_time.abs() < f64::EPSILON);
    assert_eq!(provider.generate_calls(), 0);
    engine.shutdown().await;
}

#[tokio::test]
async fn thinking_markup_is_stripped_from_answers() {
    let (_dir, config) = legacy_project();
    let provider =
        MockProvider::default().with_responses(vec!["<think>internal</think>Real answer".into()]);
    let engine = Engine::new(config, &provider, Arc::new(InMemoryVectorStore::new()));
    engine.index_documents(false).await.unwrap();

    let response = engine.query("How is tax computed?").await;
    assert_eq!(response.answer, "Real answer");
    assert!(!response.sources.is_empty());
    engine.shutdown().await;
}

#[tokio::test]
async fn failed_self_test_keeps_previous_model() {
    let (_dir, config) = legacy_project();
    let provider = installed();
    let engine = Engine::new(config, &provider, Arc::new(InMemoryVectorStore::new()));
    engine.index_documents(false).await.unwrap();

    provider.set_fail_embed(true);
    let err = engine.change_model("qwen2.5:3b").await.unwrap_err();
    assert!(matches!(err, EngineError::SelfTestFailed(_)));
    assert_eq!(engine.current_model().await, "gemma3:1b");
    engine.shutdown().await;
}

#[tokio::test]
async fn switching_to_missing_model_is_rejected() {
    let (_dir, config) = legacy_project();
    let engine = Engine::new(config, &installed(), Arc::new(InMemoryVectorStore::new()));

    let err = engine.change_model("gemma3:4b").await.unwrap_err();
    assert!(matches!(err, EngineError::ModelUnavailable { ref model } if model == "gemma3:4b"));
    assert_eq!(engine.current_model().await, "gemma3:1b");
    engine.shutdown().await;
}

#[tokio::test]
async fn ultra_small_model_gets_short_prompt_and_rewrite() {
    let (_dir, config) = legacy_project();
    let provider = installed();
    let engine = Engine::new(config, &provider, Arc::new(InMemoryVectorStore::new()));
    engine.index_documents(false).await.unwrap();
    engine.change_model("gemma3:270m").await.unwrap();

    engine.query("How does the payroll work?").await;
    let prompt = provider.last_prompt().unwrap();
    assert!(prompt.contains("CODE CONTEXT:"));
    assert!(prompt.contains("QUESTION: Explain: How does the payroll work?"));
    engine.shutdown().await;
}

#[tokio::test]
async fn sqlite_index_survives_restart() {
    let (dir, mut config) = legacy_project();
    config.store.backend = VectorBackend::Sqlite;
    config.store.path = dir.path().join("data/krag.db");

    let provider = MockProvider::default();
    let store = open_store(&config.store).await.unwrap();
    let engine = Engine::new(config.clone(), &provider, store);
    let chunks = rebuilt_chunks(&engine.index_documents(false).await.unwrap());
    engine.shutdown().await;

    let store = open_store(&config.store).await.unwrap();
    let engine = Engine::new(config, &provider, store);
    assert_eq!(
        engine.index_documents(false).await.unwrap(),
        IndexOutcome::AlreadyIndexed {
            chunks: chunks as u64
        }
    );
    let stats = engine.stats().await;
    assert_eq!(stats.status, IndexStatus::Ready);
    engine.shutdown().await;
}
