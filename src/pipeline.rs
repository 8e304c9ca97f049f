//! One processing run: fetch, persist, evaluate, mutate.
//!
//! Every stage is awaited in sequence; nothing here runs concurrently.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info};

use crate::db::Database;
use crate::error::Result;
use crate::models::RawEmail;
use crate::report::Reporter;
use crate::rules::{RuleEngine, resolve_actions};

/// Where messages come from.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch messages received in the last `look_back_days`, or all
    /// messages when `None`.
    async fn fetch_messages(&self, look_back_days: Option<u32>) -> Result<Vec<RawEmail>>;
}

/// Where label changes go. Only called with a non-empty change.
#[async_trait]
pub trait MutationSink: Send + Sync {
    async fn modify_labels(&self, message_id: &str, add: &[String], remove: &[String])
    -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub look_back_days: Option<u32>,
    /// Evaluate and log, but never call the sink.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub stored: usize,
    pub evaluated: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub failed: usize,
}

pub async fn run(
    source: &dyn MessageSource,
    sink: &dyn MutationSink,
    db: &Database,
    engine: &RuleEngine,
    reporter: &dyn Reporter,
    options: RunOptions,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    let emails = source.fetch_messages(options.look_back_days).await?;
    summary.fetched = emails.len();
    summary.stored = db.upsert_emails(&emails).await?;

    let now = Utc::now();
    for record in db.get_all_emails().await? {
        summary.evaluated += 1;

        let actions = engine.evaluate(&record, now, reporter);
        let delta = resolve_actions(&actions, &record.labels, reporter);
        if delta.is_empty() {
            summary.unchanged += 1;
            continue;
        }

        if options.dry_run {
            info!(
                message_id = %record.message_id,
                add = ?delta.add,
                remove = ?delta.remove,
                "Dry run, not modifying message"
            );
            summary.modified += 1;
            continue;
        }

        match sink
            .modify_labels(&record.message_id, &delta.add, &delta.remove)
            .await
        {
            Ok(()) => {
                let mut labels = record.labels.clone();
                delta.apply_to(&mut labels);
                db.set_labels(&record.message_id, &labels).await?;
                summary.modified += 1;
            }
            Err(e) => {
                error!(message_id = %record.message_id, error = %e, "Failed to modify message");
                summary.failed += 1;
            }
        }
    }

    info!(
        fetched = summary.fetched,
        evaluated = summary.evaluated,
        modified = summary.modified,
        failed = summary.failed,
        "Run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::report::MemoryReporter;
    use crate::rules::{Action, Condition, Mode, Rule};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeSource {
        emails: Vec<RawEmail>,
        requested: Mutex<Vec<Option<u32>>>,
    }

    #[async_trait]
    impl MessageSource for FakeSource {
        async fn fetch_messages(&self, look_back_days: Option<u32>) -> Result<Vec<RawEmail>> {
            self.requested.lock().unwrap().push(look_back_days);
            Ok(self.emails.clone())
        }
    }

    #[derive(Default)]
    struct FakeSink {
        calls: Mutex<Vec<(String, Vec<String>, Vec<String>)>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl MutationSink for FakeSink {
        async fn modify_labels(
            &self,
            message_id: &str,
            add: &[String],
            remove: &[String],
        ) -> Result<()> {
            if self.fail_for.as_deref() == Some(message_id) {
                return Err(Error::Gmail("boom".into()));
            }
            self.calls
                .lock()
                .unwrap()
                .push((message_id.to_string(), add.to_vec(), remove.to_vec()));
            Ok(())
        }
    }

    fn raw(id: &str, from: &str, labels: &[&str]) -> RawEmail {
        RawEmail {
            message_id: id.into(),
            thread_id: id.into(),
            from: from.into(),
            subject: "Hello".into(),
            date_received: "Wed, 15 Mar 2023 10:30:45 +0000".into(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            message: String::new(),
        }
    }

    fn source(emails: Vec<RawEmail>) -> FakeSource {
        FakeSource {
            emails,
            requested: Mutex::new(Vec::new()),
        }
    }

    fn engine() -> RuleEngine {
        RuleEngine::new(vec![Rule::new(
            Mode::All,
            vec![Condition::new("from", "contains", "newsletter")],
            vec![Action::MarkRead, Action::move_to("Newsletters")],
        )])
    }

    async fn temp_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("run.db")).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn applies_delta_and_persists_labels() {
        let (_dir, db) = temp_db().await;
        let source = source(vec![
            raw("m1", "newsletter@shop.com", &["INBOX", "UNREAD"]),
            raw("m2", "friend@home.org", &["INBOX", "UNREAD"]),
        ]);
        let sink = FakeSink::default();
        let options = RunOptions {
            look_back_days: Some(7),
            dry_run: false,
        };

        let summary = run(&source, &sink, &db, &engine(), &MemoryReporter::new(), options)
            .await
            .unwrap();

        assert_eq!(*source.requested.lock().unwrap(), vec![Some(7)]);
        assert_eq!(
            summary,
            RunSummary {
                fetched: 2,
                stored: 2,
                evaluated: 2,
                modified: 1,
                unchanged: 1,
                failed: 0,
            }
        );
        assert_eq!(
            *sink.calls.lock().unwrap(),
            vec![(
                "m1".to_string(),
                vec!["Newsletters".to_string()],
                vec!["UNREAD".to_string()]
            )]
        );
        let stored = db.get_email("m1").await.unwrap().unwrap();
        assert_eq!(stored.labels, vec!["INBOX".to_string(), "Newsletters".to_string()]);
    }

    #[tokio::test]
    async fn second_run_sends_nothing() {
        let (_dir, db) = temp_db().await;
        let sink = FakeSink::default();
        let reporter = MemoryReporter::new();

        // The remote labels reflect the first run's mutation.
        let first = source(vec![raw("m1", "newsletter@shop.com", &["INBOX", "UNREAD"])]);
        run(&first, &sink, &db, &engine(), &reporter, RunOptions::default())
            .await
            .unwrap();
        let second = source(vec![raw("m1", "newsletter@shop.com", &["INBOX", "Newsletters"])]);
        let summary = run(&second, &sink, &db, &engine(), &reporter, RunOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.modified, 0);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(sink.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_leaves_everything_alone() {
        let (_dir, db) = temp_db().await;
        let source = source(vec![raw("m1", "newsletter@shop.com", &["INBOX", "UNREAD"])]);
        let sink = FakeSink::default();
        let options = RunOptions {
            look_back_days: None,
            dry_run: true,
        };

        let summary = run(&source, &sink, &db, &engine(), &MemoryReporter::new(), options)
            .await
            .unwrap();

        assert_eq!(summary.modified, 1);
        assert!(sink.calls.lock().unwrap().is_empty());
        let stored = db.get_email("m1").await.unwrap().unwrap();
        assert_eq!(stored.labels, vec!["INBOX".to_string(), "UNREAD".to_string()]);
    }

    #[tokio::test]
    async fn sink_failure_is_counted_and_run_continues() {
        let (_dir, db) = temp_db().await;
        let source = source(vec![
            raw("m1", "newsletter@a.com", &["UNREAD"]),
            raw("m2", "newsletter@b.com", &["UNREAD"]),
        ]);
        let sink = FakeSink {
            fail_for: Some("m1".into()),
            ..FakeSink::default()
        };

        let summary = run(&source, &sink, &db, &engine(), &MemoryReporter::new(), RunOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.modified, 1);
        let untouched = db.get_email("m1").await.unwrap().unwrap();
        assert_eq!(untouched.labels, vec!["UNREAD".to_string()]);
    }

    #[tokio::test]
    async fn empty_rules_never_call_sink() {
        let (_dir, db) = temp_db().await;
        let source = source(vec![raw("m1", "newsletter@shop.com", &["INBOX", "UNREAD"])]);
        let sink = FakeSink::default();

        let summary = run(
            &source,
            &sink,
            &db,
            &RuleEngine::default(),
            &MemoryReporter::new(),
            RunOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.unchanged, 1);
        assert!(sink.calls.lock().unwrap().is_empty());
    }
}
