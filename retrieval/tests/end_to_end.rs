//! End-to-end tests: configuration, indexing, persistence across
//! restart, and corrupt-record tolerance.

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use triage_retrieval::{
    EmbeddingConfig, EmbeddingProviderKind, IssueRetriever, NewIssue, RetrievalConfig,
    SearchOptions,
};

fn hash_config(dir: &TempDir) -> RetrievalConfig {
    RetrievalConfig::new(dir.path()).with_embedding(EmbeddingConfig {
        provider: EmbeddingProviderKind::Hash,
        dimension: 64,
        ..EmbeddingConfig::default()
    })
}

#[tokio::test]
async fn index_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let retriever = IssueRetriever::new(hash_config(&dir)).await.unwrap();
        retriever
            .index(
                &NewIssue::new("login fails")
                    .with_external_key("PROJ-7")
                    .with_description("submit button does nothing"),
            )
            .await
            .unwrap();
    }

    // A fresh retriever over the same directory sees the record.
    let retriever = IssueRetriever::new(hash_config(&dir)).await.unwrap();
    let issues = retriever.list().await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].summary, "login fails");
    assert_eq!(issues[0].external_key.as_deref(), Some("PROJ-7"));

    let outcome = retriever
        .find_similar(
            &NewIssue::new("login fails"),
            SearchOptions {
                top_k: 5,
                min_score: 0.0,
                store_query: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(outcome.matches[0].external_key.as_deref(), Some("PROJ-7"));
}

#[tokio::test]
async fn corrupt_record_does_not_break_search() {
    let dir = TempDir::new().unwrap();
    let retriever = IssueRetriever::new(hash_config(&dir)).await.unwrap();

    retriever.index(&NewIssue::new("login fails")).await.unwrap();
    retriever.index(&NewIssue::new("password reset")).await.unwrap();

    // Drop a file that will not parse next to the real records.
    std::fs::write(dir.path().join("zzz-corrupt.json"), "not json at all").unwrap();

    let issues = retriever.list().await.unwrap();
    assert_eq!(issues.len(), 2);

    let outcome = retriever
        .find_similar(
            &NewIssue::new("login issue"),
            SearchOptions {
                top_k: 5,
                min_score: 0.0,
                store_query: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.stats.checked_issues, 2);
    assert_eq!(outcome.stats.total_indexed, 2);
}

#[tokio::test]
async fn bulk_index_then_search_ranks_descending() {
    let dir = TempDir::new().unwrap();
    let retriever = IssueRetriever::new(hash_config(&dir)).await.unwrap();

    let items = vec![
        NewIssue::new("login fails").with_description("user cannot login after update"),
        NewIssue::new("password reset").with_description("reset email never arrives"),
        NewIssue::new("crash on startup").with_description("app crashes immediately"),
    ];
    let stored = retriever.bulk_index(&items).await.unwrap();
    assert_eq!(stored.len(), 3);

    let outcome = retriever
        .find_similar(
            &NewIssue::new("login issue").with_description("cannot login"),
            SearchOptions {
                top_k: 2,
                min_score: 0.0,
                store_query: true,
            },
        )
        .await
        .unwrap();

    assert!(outcome.matches.len() <= 2);
    for pair in outcome.matches.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    // The stored query itself was never among the candidates.
    assert!(
        outcome
            .matches
            .iter()
            .all(|m| m.id != outcome.query_issue.id)
    );
    assert_eq!(retriever.list().await.unwrap().len(), 4);
}
