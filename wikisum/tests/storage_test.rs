mod support;

use wikisum::records::{NewSummary, SummaryOrigin, TranslationOrigin};
use wikisum::reference::normalize;
use wikisum::storage::{CacheKey, SummaryStore};

fn new_summary(url: &str, requested: i64, text: &str) -> NewSummary {
    NewSummary {
        url: url.to_string(),
        requested_word_count: requested,
        summary: text.to_string(),
        summary_origin: SummaryOrigin::PrimaryModel,
        summary_translated: None,
        translation_origin: TranslationOrigin::Disabled,
    }
}

#[tokio::test]
async fn put_assigns_increasing_ids_and_round_trips() {
    let store = SummaryStore::new(support::memory_pool().await);
    let url = "https://en.wikipedia.org/wiki/Test";

    let first = store.put(&new_summary(url, 100, "One two three.")).await.unwrap();
    let mut second = new_summary(url, 100, "Another summary here.");
    second.summary_origin = SummaryOrigin::Extractive;
    second.summary_translated = Some("Outro resumo aqui.".to_string());
    second.translation_origin = TranslationOrigin::FallbackModel;
    let second = store.put(&second).await.unwrap();

    assert!(second.id > first.id);
    assert_eq!(first.actual_word_count, 3);

    let key = CacheKey {
        reference: normalize(url).unwrap(),
        requested_word_count: 100,
    };
    let found = store.find_exact(&key).await.unwrap().expect("record");
    assert_eq!(found, second);
}

#[tokio::test]
async fn find_latest_respects_exact_word_count() {
    let store = SummaryStore::new(support::memory_pool().await);
    let reference = normalize("https://en.wikipedia.org/wiki/Test").unwrap();
    let url = reference.as_str();

    let a = store.put(&new_summary(url, 100, "a")).await.unwrap();
    let b = store.put(&new_summary(url, 50, "b")).await.unwrap();
    let c = store.put(&new_summary(url, 100, "c")).await.unwrap();
    store
        .put(&new_summary("https://en.wikipedia.org/wiki/Other", 100, "other"))
        .await
        .unwrap();

    let exact_100 = store.find_latest(&reference, Some(100)).await.unwrap().unwrap();
    assert_eq!(exact_100.id, c.id);
    assert_ne!(exact_100.id, a.id);

    let exact_50 = store.find_latest(&reference, Some(50)).await.unwrap().unwrap();
    assert_eq!(exact_50.id, b.id);

    // Without a word count the newest record for the URL wins, whatever its length
    let any = store.find_latest(&reference, None).await.unwrap().unwrap();
    assert_eq!(any.id, c.id);

    assert!(store.find_latest(&reference, Some(75)).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_keys_are_allowed() {
    let store = SummaryStore::new(support::memory_pool().await);
    let url = "https://en.wikipedia.org/wiki/Dup";

    store.put(&new_summary(url, 10, "first")).await.unwrap();
    store.put(&new_summary(url, 10, "second")).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summaries WHERE url = ?")
        .bind(url)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn ping_reports_healthy_pool() {
    let store = SummaryStore::new(support::memory_pool().await);
    store.ping().await.expect("ping");
}
