//! Integration tests for the QA documents domain
//!
//! These tests use real PostgreSQL via testcontainers to ensure:
//! - Positions come from the per-owner high-water mark
//! - The keyword filter and sort orders work in SQL
//! - Descriptors round-trip through `app_model_configs.qa_index_struct`
//! - The service keeps rows and vectors in step on top of Postgres
//!
//! They need Docker and are ignored by default: `cargo test -- --ignored`.

use std::sync::Arc;

use async_trait::async_trait;
use domain_qa_documents::*;
use domain_qa_index::{
    BackendKind, DescriptorStore, EmbeddingProvider, IndexDescriptor, IndexError, IndexResult,
    InMemoryBackendFactory,
};
use test_utils::{TestDataBuilder, TestDatabase, assertions::*};
use uuid::Uuid;

struct ConstantEmbedding;

#[async_trait]
impl EmbeddingProvider for ConstantEmbedding {
    fn model_name(&self) -> String {
        "constant".to_string()
    }

    async fn embed_documents(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }

    async fn embed_query(&self, _text: &str) -> IndexResult<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0])
    }
}

// ============================================================================
// Repository Tests
// ============================================================================

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_insert_assigns_increasing_positions() {
    let db = TestDatabase::new().await;
    let repo = PgQaDocumentRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("increasing_positions");
    let owner = db.create_test_owner(builder.owner_id()).await;

    let first = repo
        .insert(NewQaDocument::new(
            owner,
            CreateQaDocument::new(builder.question("one"), builder.answer("one")),
        ))
        .await
        .unwrap();
    let second = repo
        .insert(NewQaDocument::new(
            owner,
            CreateQaDocument::new(builder.question("two"), builder.answer("two")),
        ))
        .await
        .unwrap();

    assert_eq!((first.position, second.position), (1, 2));
    assert!(first.enabled);

    assert!(repo.delete(second.id).await.unwrap());
    let third = repo
        .insert(NewQaDocument::new(
            owner,
            CreateQaDocument::new(builder.question("three"), builder.answer("three")),
        ))
        .await
        .unwrap();

    assert_eq!(third.position, 3);
    assert_eq!(repo.max_position(owner).await.unwrap(), 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_insert_for_unknown_owner() {
    let db = TestDatabase::new().await;
    let repo = PgQaDocumentRepository::new(db.connection());
    let owner = Uuid::new_v4();

    let result = repo
        .insert(NewQaDocument::new(owner, CreateQaDocument::new("q", "a")))
        .await;

    assert!(matches!(result, Err(QaDocumentError::OwnerNotFound(id)) if id == owner));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_concurrent_inserts_get_distinct_positions() {
    let db = TestDatabase::new().await;
    let repo = Arc::new(PgQaDocumentRepository::new(db.connection()));
    let owner = db
        .create_test_owner(TestDataBuilder::from_test_name("concurrent").owner_id())
        .await;

    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.insert(NewQaDocument::new(
                    owner,
                    CreateQaDocument::new(format!("question {i}"), "answer"),
                ))
                .await
            })
        })
        .collect();

    let mut positions = Vec::new();
    for task in tasks {
        positions.push(task.await.unwrap().unwrap().position);
    }
    positions.sort();

    assert_eq!(positions, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_update_persists_state_and_touches_timestamp() {
    let db = TestDatabase::new().await;
    let repo = PgQaDocumentRepository::new(db.connection());
    let owner = db
        .create_test_owner(TestDataBuilder::from_test_name("update_state").owner_id())
        .await;

    let mut entry = repo
        .insert(NewQaDocument::new(owner, CreateQaDocument::new("What is X?", "X is Y.")))
        .await
        .unwrap();
    let created_at = entry.updated_at;

    entry.answer = "X is Z.".to_string();
    entry.enabled = false;
    entry.error = Some("Vector store unavailable: timeout".to_string());
    repo.update(entry.clone()).await.unwrap();

    let stored = assert_some(repo.find_by_id(entry.id).await.unwrap(), "entry should exist");
    assert_uuid_eq(stored.app_id, owner, "owner");
    assert_eq!(stored.answer, "X is Z.");
    assert!(!stored.enabled);
    assert_eq!(stored.error, entry.error);
    assert!(stored.updated_at >= created_at);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_list_keyword_sort_and_enabled_filter() {
    let db = TestDatabase::new().await;
    let repo = PgQaDocumentRepository::new(db.connection());
    let owner = db
        .create_test_owner(TestDataBuilder::from_test_name("list_filters").owner_id())
        .await;

    for (question, answer) in [
        ("What is X?", "X is Y."),
        ("Who is Y?", "Y is Z."),
        ("Where is Z?", "Somewhere."),
    ] {
        repo.insert(NewQaDocument::new(owner, CreateQaDocument::new(question, answer)))
            .await
            .unwrap();
    }

    let mut disabled = repo.list_enabled(owner).await.unwrap().remove(2);
    disabled.enabled = false;
    repo.update(disabled.clone()).await.unwrap();

    let about_y = repo
        .list(
            QaDocumentFilter::new(owner)
                .with_keyword("y")
                .sorted_by(QaDocumentSort::Position),
        )
        .await
        .unwrap();
    assert_eq!(
        about_y.iter().map(|d| d.position).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let only_disabled = repo
        .list(QaDocumentFilter::new(owner).with_enabled(false))
        .await
        .unwrap();
    assert_eq!(only_disabled.len(), 1);
    assert_uuid_eq(only_disabled[0].id, disabled.id, "disabled entry");

    let enabled = repo.list_enabled(owner).await.unwrap();
    assert_eq!(enabled.len(), 2);

    let page = repo
        .list(
            QaDocumentFilter::new(owner)
                .sorted_by(QaDocumentSort::Position)
                .paginate(1, 1),
        )
        .await
        .unwrap();
    assert_eq!(page[0].position, 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_keyword_wildcards_match_literally() {
    let db = TestDatabase::new().await;
    let pg = PgQaDocumentRepository::new(db.connection());
    let memory = InMemoryQaDocumentRepository::new();
    let owner = db
        .create_test_owner(TestDataBuilder::from_test_name("literal_keyword").owner_id())
        .await;

    for (question, answer) in [
        ("Is there a 50% discount?", "Only on Fridays."),
        ("Is there a 50 day trial?", "No."),
        ("What is snake_case?", "Words joined by underscores."),
        ("What is snakecase?", "Not a thing."),
    ] {
        let input = CreateQaDocument::new(question, answer);
        pg.insert(NewQaDocument::new(owner, input.clone())).await.unwrap();
        memory.insert(NewQaDocument::new(owner, input)).await.unwrap();
    }

    for keyword in ["50%", "e_c", "%"] {
        let filter = QaDocumentFilter::new(owner)
            .with_keyword(keyword)
            .sorted_by(QaDocumentSort::Position);
        let from_pg: Vec<String> = pg
            .list(filter.clone())
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.question)
            .collect();
        let from_memory: Vec<String> = memory
            .list(filter)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.question)
            .collect();

        assert_eq!(from_pg, from_memory, "keyword {:?}", keyword);
        assert_eq!(from_pg.len(), 1, "keyword {:?}", keyword);
    }
}

// ============================================================================
// Descriptor Store Tests
// ============================================================================

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_descriptor_round_trip() {
    let db = TestDatabase::new().await;
    let store = PgDescriptorStore::new(db.connection());
    let owner = TestDataBuilder::from_test_name("descriptor_round_trip").owner_id();
    store.ensure_owner(owner).await.unwrap();
    store.ensure_owner(owner).await.unwrap();

    assert_eq!(store.load(owner).await.unwrap(), None);

    let descriptor = IndexDescriptor::for_owner(BackendKind::Milvus, owner);
    store.save(owner, Some(descriptor.clone())).await.unwrap();
    assert_eq!(store.load(owner).await.unwrap(), Some(descriptor));

    store.save(owner, None).await.unwrap();
    assert_eq!(store.load(owner).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_descriptor_for_unknown_owner() {
    let db = TestDatabase::new().await;
    let store = PgDescriptorStore::new(db.connection());
    let owner = Uuid::new_v4();

    assert!(matches!(store.load(owner).await, Err(IndexError::OwnerNotFound(_))));
    assert!(matches!(
        store.save(owner, None).await,
        Err(IndexError::OwnerNotFound(_))
    ));
}

// ============================================================================
// Service Tests
// ============================================================================

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_service_on_postgres() {
    let db = TestDatabase::new().await;
    let owner = db
        .create_test_owner(TestDataBuilder::from_test_name("service_on_postgres").owner_id())
        .await;

    let factory = InMemoryBackendFactory::new(Arc::new(ConstantEmbedding))
        .with_default_kind(BackendKind::Qdrant);
    let service = QaDocumentService::new(
        PgQaDocumentRepository::new(db.connection()),
        Arc::new(factory),
        Arc::new(PgDescriptorStore::new(db.connection())),
    );

    let first = service
        .create(owner, CreateQaDocument::new("What is X?", "X is Y."))
        .await
        .unwrap();
    let second = service
        .create(owner, CreateQaDocument::new("Who is Y?", "Y is Z."))
        .await
        .unwrap();
    assert!(first.enabled && second.enabled);

    let status = service.index_status(owner).await.unwrap();
    assert_eq!(status.vectors, 2);
    assert_eq!(
        status.descriptor,
        Some(IndexDescriptor::for_owner(BackendKind::Qdrant, owner))
    );

    assert_eq!(service.delete(second.id).await.unwrap(), DeleteOutcome::Deleted);
    let status = service.rebuild_index(owner).await.unwrap();
    assert_eq!(status.vectors, 1);
}
