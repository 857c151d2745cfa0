use std::sync::Arc;

use futures::stream::{self, Stream, TryStreamExt};

use crate::slack::{ChannelLister, ChannelSummary, HistoryFetcher, Message, SlackError};
use crate::utils::time::to_slack_ts;

use super::windows::ScrapeWindow;

/// Walks one channel's history backward in time, one page per call.
///
/// The newest bound advances to the last (oldest) message of each page;
/// the bound is exclusive, so the boundary message is never re-fetched.
/// An empty page or an upstream `has_more == false` ends the walk.
pub struct HistoryCursor {
    fetcher: Arc<dyn HistoryFetcher>,
    channel_id: String,
    oldest: String,
    latest: String,
    done: bool,
}

impl HistoryCursor {
    pub fn new(fetcher: Arc<dyn HistoryFetcher>, channel_id: &str, window: &ScrapeWindow) -> Self {
        Self {
            fetcher,
            channel_id: channel_id.to_string(),
            oldest: to_slack_ts(window.oldest),
            latest: to_slack_ts(window.newest),
            done: false,
        }
    }

    pub async fn next_page(&mut self) -> Result<Option<Vec<Message>>, SlackError> {
        if self.done {
            return Ok(None);
        }

        let page = self
            .fetcher
            .history_page(&self.channel_id, Some(&self.latest), &self.oldest)
            .await?;

        if page.messages.is_empty() {
            self.done = true;
            return Ok(None);
        }

        if let Some(last) = page.messages.last() {
            self.latest = last.ts_token.clone();
        }
        if !page.has_more {
            self.done = true;
        }

        Ok(Some(page.messages))
    }
}

/// Produces time-bounded message sequences per channel by driving a
/// [`HistoryCursor`] against the history collaborator.
pub struct MessageScraper {
    lister: Arc<dyn ChannelLister>,
    fetcher: Arc<dyn HistoryFetcher>,
}

impl MessageScraper {
    pub fn new(lister: Arc<dyn ChannelLister>, fetcher: Arc<dyn HistoryFetcher>) -> Self {
        Self { lister, fetcher }
    }

    /// Channels eligible for scraping. Non-member channels are dropped
    /// here without logging.
    pub async fn member_channels(&self) -> Result<Vec<ChannelSummary>, SlackError> {
        let channels = self.lister.list_channels().await?;
        Ok(channels.into_iter().filter(|c| c.is_member).collect())
    }

    /// Lazy stream of one channel's messages within the window. Pages
    /// are fetched on demand; the whole history is never buffered.
    pub fn channel_messages(
        &self,
        channel_id: &str,
        window: &ScrapeWindow,
    ) -> impl Stream<Item = Result<Message, SlackError>> {
        let cursor = HistoryCursor::new(self.fetcher.clone(), channel_id, window);
        stream::try_unfold(cursor, |mut cursor| async move {
            Ok::<_, SlackError>(cursor.next_page().await?.map(|page| (page, cursor)))
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
        .try_flatten()
    }
}
