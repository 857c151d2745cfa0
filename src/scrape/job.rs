use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::TryStreamExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{ChannelStore, DatabaseError, RollStore, UsernameStore};
use crate::slack::{ChannelLookup, ChannelSummary, SlackError, UserLookup};

use super::reconcile::{reconcile_channels, reconcile_usernames};
use super::roll_filter::extract_roll;
use super::scraper::MessageScraper;
use super::windows::{plan_windows, ScrapeWindow, WindowKind};

/// One scheduled scrape-and-reconcile run. Strictly sequential: plan
/// windows, scrape historic then incremental, reconcile usernames, then
/// channels. Any failure outside the per-channel fetch path and the
/// lookup-miss points aborts the run; the next trigger retries safely
/// on top of idempotent storage.
pub struct ScrapeJob {
    scraper: MessageScraper,
    rolls: Arc<dyn RollStore>,
    usernames: Arc<dyn UsernameStore>,
    channels: Arc<dyn ChannelStore>,
    user_lookup: Arc<dyn UserLookup>,
    channel_lookup: Arc<dyn ChannelLookup>,
    horizon_years: i32,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub windows_planned: usize,
    pub messages_seen: u64,
    pub rolls_captured: u64,
    pub channels_scraped: usize,
    pub channels_failed: usize,
    pub usernames_candidates: usize,
    pub usernames_resolved: usize,
    pub channels_candidates: usize,
    pub channels_resolved: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "done scraping: {} rolls from {} messages across {} channels",
            self.rolls_captured, self.messages_seen, self.channels_scraped
        )?;
        if self.channels_failed > 0 {
            write!(f, ", {} channels failed", self.channels_failed)?;
        }
        if self.usernames_candidates > 0 {
            write!(
                f,
                ", {}/{} usernames reconciled",
                self.usernames_resolved, self.usernames_candidates
            )?;
        }
        if self.channels_candidates > 0 {
            write!(
                f,
                ", {}/{} channels reconciled",
                self.channels_resolved, self.channels_candidates
            )?;
        }
        Ok(())
    }
}

/// Splits channel-level failures by origin: fetch trouble skips the
/// channel, storage trouble kills the run.
#[derive(Debug, Error)]
enum ChannelScrapeError {
    #[error(transparent)]
    Fetch(#[from] SlackError),
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl ScrapeJob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scraper: MessageScraper,
        rolls: Arc<dyn RollStore>,
        usernames: Arc<dyn UsernameStore>,
        channels: Arc<dyn ChannelStore>,
        user_lookup: Arc<dyn UserLookup>,
        channel_lookup: Arc<dyn ChannelLookup>,
        horizon_years: i32,
    ) -> Self {
        Self {
            scraper,
            rolls,
            usernames,
            channels,
            user_lookup,
            channel_lookup,
            horizon_years,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        info!("scrape run starting");

        let earliest = self.rolls.earliest_roll().await?.map(|r| r.timestamp);
        let latest = self.rolls.latest_roll().await?.map(|r| r.timestamp);
        match latest {
            Some(ts) => info!(last_scrape = %ts, "resuming from latest persisted roll"),
            None => info!("no persisted rolls yet, first scrape"),
        }

        let windows = plan_windows(Utc::now(), self.horizon_years, earliest, latest);
        let mut summary = RunSummary {
            windows_planned: windows.len(),
            ..RunSummary::default()
        };

        for window in &windows {
            let kind = match window.kind {
                WindowKind::Historic => "historic",
                WindowKind::Incremental => "incremental",
            };
            info!(kind, oldest = %window.oldest, newest = %window.newest, "scraping window");
            self.scrape_window(window, &mut summary).await?;
        }

        let users = reconcile_usernames(&*self.usernames, &*self.user_lookup).await?;
        summary.usernames_candidates = users.candidates;
        summary.usernames_resolved = users.resolved;

        let channels = reconcile_channels(&*self.channels, &*self.channel_lookup).await?;
        summary.channels_candidates = channels.candidates;
        summary.channels_resolved = channels.resolved;

        info!("{summary}");
        Ok(summary)
    }

    async fn scrape_window(&self, window: &ScrapeWindow, summary: &mut RunSummary) -> Result<()> {
        let channels = self.scraper.member_channels().await?;

        for channel in channels {
            match self.scrape_channel(&channel, window).await {
                Ok((messages, rolls)) => {
                    info!(
                        channel = %channel.id,
                        name = channel.name.as_deref().unwrap_or("?"),
                        messages,
                        rolls,
                        "scraped channel"
                    );
                    summary.messages_seen += messages;
                    summary.rolls_captured += rolls;
                    summary.channels_scraped += 1;
                }
                Err(ChannelScrapeError::Fetch(e)) => {
                    // watermark did not advance for this channel; the
                    // next run re-covers the same range
                    warn!(channel = %channel.id, error = %e, "channel scrape aborted, will retry next run");
                    summary.channels_failed += 1;
                }
                Err(ChannelScrapeError::Store(e)) => return Err(e.into()),
            }
        }

        Ok(())
    }

    async fn scrape_channel(
        &self,
        channel: &ChannelSummary,
        window: &ScrapeWindow,
    ) -> Result<(u64, u64), ChannelScrapeError> {
        let mut messages = 0u64;
        let mut rolls = 0u64;

        let stream = self.scraper.channel_messages(&channel.id, window);
        futures::pin_mut!(stream);
        while let Some(message) = stream.try_next().await? {
            messages += 1;
            if let Some(roll) = extract_roll(&message) {
                self.rolls.insert_roll(&roll).await?;
                rolls += 1;
            }
        }

        Ok((messages, rolls))
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tempfile::NamedTempFile;

    use crate::config::DatabaseConfig;
    use crate::db::{Channel, DatabaseManager, Username};
    use crate::slack::{
        ChannelLister, HistoryFetcher, HistoryPage, Message, MockSlack, SlackError,
    };

    use super::*;

    async fn sqlite_manager(file: &NamedTempFile) -> DatabaseManager {
        let config = DatabaseConfig {
            url: Some(format!("sqlite://{}", file.path().to_string_lossy())),
            max_connections: None,
            min_connections: None,
        };
        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");
        manager
    }

    struct OneChannelLister;

    #[async_trait]
    impl ChannelLister for OneChannelLister {
        async fn list_channels(&self) -> Result<Vec<ChannelSummary>, SlackError> {
            Ok(vec![
                ChannelSummary {
                    id: "C1".to_string(),
                    name: Some("dice".to_string()),
                    is_member: true,
                },
                ChannelSummary {
                    id: "C2".to_string(),
                    name: Some("lurking".to_string()),
                    is_member: false,
                },
            ])
        }
    }

    /// Serves one fixed page per channel, then empties out.
    struct FixedHistory {
        pages: Mutex<HashMap<String, Vec<Message>>>,
    }

    #[async_trait]
    impl HistoryFetcher for FixedHistory {
        async fn history_page(
            &self,
            channel_id: &str,
            _latest: Option<&str>,
            _oldest: &str,
        ) -> Result<HistoryPage, SlackError> {
            let messages = self
                .pages
                .lock()
                .unwrap()
                .remove(channel_id)
                .unwrap_or_default();
            Ok(HistoryPage {
                messages,
                has_more: false,
            })
        }
    }

    struct ScriptedLookup {
        users: HashMap<String, String>,
        channels: HashMap<String, String>,
    }

    #[async_trait]
    impl UserLookup for ScriptedLookup {
        async fn user_info(&self, user_id: &str) -> Result<Option<Username>, SlackError> {
            Ok(self.users.get(user_id).map(|name| Username {
                id: user_id.to_string(),
                name: Some(name.clone()),
            }))
        }
    }

    #[async_trait]
    impl ChannelLookup for ScriptedLookup {
        async fn channel_info(&self, channel_id: &str) -> Result<Option<Channel>, SlackError> {
            Ok(self.channels.get(channel_id).map(|name| Channel {
                id: channel_id.to_string(),
                name: Some(name.clone()),
            }))
        }
    }

    fn roll_message(millis: i64, micros_suffix: &str, user: &str, value: i64) -> Message {
        Message {
            channel_id: "C1".to_string(),
            timestamp: Utc.timestamp_millis_opt(millis).unwrap(),
            ts_token: format!("{}.{}", millis / 1000, micros_suffix),
            client_msg_id: None,
            user_id: user.to_string(),
            text: String::new(),
            attachment_texts: vec![format!("<@{user}> rolled *{value}*")],
        }
    }

    #[tokio::test]
    async fn full_run_persists_deduplicates_and_reconciles() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let manager = sqlite_manager(&file).await;

        // three rolls, two of which collide on (timestamp, channel)
        // after millisecond truncation
        let history = FixedHistory {
            pages: Mutex::new(HashMap::from([(
                "C1".to_string(),
                vec![
                    roll_message(1_700_000_600_123, "123400", "U2", 17),
                    roll_message(1_700_000_000_123, "123400", "U1", 42),
                    roll_message(1_700_000_000_123, "123900", "U1", 43),
                ],
            )])),
        };

        let lookup = Arc::new(ScriptedLookup {
            users: HashMap::from([("U1".to_string(), "Alice".to_string())]),
            channels: HashMap::from([("C1".to_string(), "dice".to_string())]),
        });

        let job = ScrapeJob::new(
            MessageScraper::new(Arc::new(OneChannelLister), Arc::new(history)),
            manager.roll_store(),
            manager.username_store(),
            manager.channel_store(),
            lookup.clone(),
            lookup,
            2,
        );

        let summary = job.run().await.expect("run");

        assert_eq!(summary.windows_planned, 1);
        assert_eq!(summary.messages_seen, 3);
        assert_eq!(summary.rolls_captured, 3);
        assert_eq!(summary.channels_scraped, 1);
        assert_eq!(summary.channels_failed, 0);

        // conflicting key stored once
        assert_eq!(manager.roll_store().count_rolls().await.expect("count"), 2);

        // U1 resolved, U2 left as placeholder
        let u1 = manager
            .username_store()
            .get_username("U1")
            .await
            .expect("query")
            .expect("exists");
        assert_eq!(u1.name.as_deref(), Some("Alice"));
        let u2 = manager
            .username_store()
            .get_username("U2")
            .await
            .expect("query")
            .expect("exists");
        assert!(u2.name.is_none());
        assert_eq!(summary.usernames_candidates, 2);
        assert_eq!(summary.usernames_resolved, 1);

        // the one placeholder channel got its name
        let c1 = manager
            .channel_store()
            .get_channel("C1")
            .await
            .expect("query")
            .expect("exists");
        assert_eq!(c1.name.as_deref(), Some("dice"));
        assert_eq!(summary.channels_candidates, 1);
        assert_eq!(summary.channels_resolved, 1);
    }

    #[tokio::test]
    async fn offline_mock_run_completes_end_to_end() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let manager = sqlite_manager(&file).await;
        let mock = Arc::new(MockSlack::new());

        let job = ScrapeJob::new(
            MessageScraper::new(mock.clone(), mock.clone()),
            manager.roll_store(),
            manager.username_store(),
            manager.channel_store(),
            mock.clone(),
            mock,
            2,
        );

        let summary = job.run().await.expect("run");
        assert!(summary.rolls_captured > 0);
        assert_eq!(summary.channels_failed, 0);
        // mock roster covers every synthesized user
        assert_eq!(summary.usernames_resolved, summary.usernames_candidates);

        let count = manager.roll_store().count_rolls().await.expect("count");
        assert_eq!(count as u64, summary.rolls_captured);
    }

    #[tokio::test]
    async fn second_run_reinserts_nothing() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let manager = sqlite_manager(&file).await;
        let mock = Arc::new(MockSlack::new());

        let make_job = || {
            ScrapeJob::new(
                MessageScraper::new(mock.clone(), mock.clone()),
                manager.roll_store(),
                manager.username_store(),
                manager.channel_store(),
                mock.clone(),
                mock.clone(),
                2,
            )
        };

        let first = make_job().run().await.expect("first run");
        let count_after_first = manager.roll_store().count_rolls().await.expect("count");
        assert_eq!(count_after_first as u64, first.rolls_captured);

        let _second = make_job().run().await.expect("second run");
        let count_after_second = manager.roll_store().count_rolls().await.expect("count");

        // the incremental window re-covers at most the watermark
        // boundary; idempotent inserts keep the count stable apart from
        // genuinely newer slots
        assert!(count_after_second >= count_after_first);
        assert!(count_after_second - count_after_first <= 1);
    }
}
