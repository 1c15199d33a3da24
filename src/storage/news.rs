//! Operations on the `news` table: dedup probe, insert, body attachment,
//! and the per-date read used by the exporter.

use chrono::{NaiveDate, NaiveTime};

use super::schema::Store;
use super::types::{InsertOutcome, NewsRecord, StoreError};
use crate::extract::FeedItem;

impl Store {
    /// Dedup probe for the `(title, publish_date)` identity key.
    pub async fn exists(&self, title: &str, publish_date: i64) -> Result<bool, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM news WHERE title = ? AND publish_date = ?")
                .bind(title)
                .bind(publish_date)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.is_some())
    }

    /// Inserts a new record without a body. A conflicting
    /// `(title, publish_date)` pair yields [`InsertOutcome::AlreadyExists`]
    /// rather than a duplicate row.
    pub async fn insert(&self, item: &FeedItem) -> Result<InsertOutcome, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO news (title, description, link, publish_date)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(title, publish_date) DO NOTHING
            RETURNING id
        "#,
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.link.as_str())
        .bind(item.published.timestamp())
        .fetch_optional(self.pool())
        .await?;

        Ok(match row {
            Some((id,)) => InsertOutcome::Inserted(id),
            None => InsertOutcome::AlreadyExists,
        })
    }

    /// Attaches the fetched article body to an existing record.
    pub async fn update_body(&self, id: i64, full_text: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE news SET full_text = ? WHERE id = ?")
            .bind(full_text)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// All records published on the given UTC calendar date, oldest first.
    pub async fn records_for_date(&self, date: NaiveDate) -> Result<Vec<NewsRecord>, StoreError> {
        let start = date.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end = start + 86_400;
        let records = sqlx::query_as::<_, NewsRecord>(
            r#"
            SELECT id, title, description, link, publish_date, full_text
            FROM news
            WHERE publish_date >= ? AND publish_date < ?
            ORDER BY publish_date
        "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use url::Url;

    async fn test_store() -> Store {
        Store::open(":memory:").await.unwrap()
    }

    fn test_item(title: &str, pubdate: &str) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            description: "A summary".to_string(),
            link: Url::parse("https://example.com/articles/1").unwrap(),
            published: DateTime::parse_from_str(pubdate, crate::extract::PUBDATE_FORMAT).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_exists() {
        let store = test_store().await;
        let item = test_item("Headline", "Mon, 06 Sep 2021 11:12:13 +0000");

        assert!(!store
            .exists(&item.title, item.published.timestamp())
            .await
            .unwrap());

        let outcome = store.insert(&item).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(id) if id > 0));

        assert!(store
            .exists(&item.title, item.published.timestamp())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_reports_already_exists() {
        let store = test_store().await;
        let item = test_item("Headline", "Mon, 06 Sep 2021 11:12:13 +0000");

        store.insert(&item).await.unwrap();
        let outcome = store.insert(&item).await.unwrap();
        assert_eq!(outcome, InsertOutcome::AlreadyExists);

        let date = item.published.date_naive();
        assert_eq!(store.records_for_date(date).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_title_different_date_is_distinct() {
        let store = test_store().await;
        let a = test_item("Headline", "Mon, 06 Sep 2021 11:12:13 +0000");
        let b = test_item("Headline", "Tue, 07 Sep 2021 11:12:13 +0000");

        assert!(matches!(
            store.insert(&a).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));
        assert!(matches!(
            store.insert(&b).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));
    }

    #[tokio::test]
    async fn test_update_body_sets_full_text() {
        let store = test_store().await;
        let item = test_item("Headline", "Mon, 06 Sep 2021 11:12:13 +0000");
        let id = match store.insert(&item).await.unwrap() {
            InsertOutcome::Inserted(id) => id,
            other => panic!("unexpected outcome {:?}", other),
        };

        let date = item.published.date_naive();
        let records = store.records_for_date(date).await.unwrap();
        assert_eq!(records[0].full_text, None);

        store.update_body(id, "the whole story").await.unwrap();
        let records = store.records_for_date(date).await.unwrap();
        assert_eq!(records[0].full_text.as_deref(), Some("the whole story"));
    }

    #[tokio::test]
    async fn test_records_for_date_bounds() {
        let store = test_store().await;
        let inside = test_item("Inside", "Mon, 06 Sep 2021 23:59:59 +0000");
        let outside = test_item("Outside", "Tue, 07 Sep 2021 00:00:01 +0000");
        store.insert(&inside).await.unwrap();
        store.insert(&outside).await.unwrap();

        let records = store
            .records_for_date(NaiveDate::from_ymd_opt(2021, 9, 6).unwrap())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Inside");
    }
}
