//! Posting a [`RankingBoard`] into a Discord channel.

use std::sync::Arc;

use futures::future::BoxFuture;
use serenity::all::{ChannelId, CreateThread, Http, MessageId};
use tracing::{info, warn};

use crate::services::ranking::RankingBoard;

/// Channel operations needed to publish a leaderboard.
pub trait BoardPublisher: Send + Sync {
    /// Post `text` in `channel_id`, returning the new message id.
    fn post(&self, channel_id: u64, text: String) -> BoxFuture<'static, Result<u64, String>>;
    /// Open a public thread on `message_id`, returning the thread's channel id.
    fn open_thread(
        &self,
        channel_id: u64,
        message_id: u64,
        name: String,
    ) -> BoxFuture<'static, Result<u64, String>>;
}

/// [`BoardPublisher`] backed by the Discord REST API.
#[derive(Clone)]
pub struct DiscordPublisher {
    http: Arc<Http>,
}

impl DiscordPublisher {
    /// Publisher sending through `http`.
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

impl BoardPublisher for DiscordPublisher {
    fn post(&self, channel_id: u64, text: String) -> BoxFuture<'static, Result<u64, String>> {
        let http = self.http.clone();
        Box::pin(async move {
            ChannelId::new(channel_id)
                .say(&http, text)
                .await
                .map(|message| message.id.get())
                .map_err(|err| err.to_string())
        })
    }

    fn open_thread(
        &self,
        channel_id: u64,
        message_id: u64,
        name: String,
    ) -> BoxFuture<'static, Result<u64, String>> {
        let http = self.http.clone();
        Box::pin(async move {
            ChannelId::new(channel_id)
                .create_thread_from_message(&http, MessageId::new(message_id), CreateThread::new(name))
                .await
                .map(|thread| thread.id.get())
                .map_err(|err| err.to_string())
        })
    }
}

/// Post every message of `board`, opening the overflow thread when needed.
///
/// Returns the number of messages posted. When `channel_id` already is a
/// thread the overflow is posted there. When the thread cannot be created an
/// error line is posted in the channel and returned.
pub async fn publish_board(
    publisher: &dyn BoardPublisher,
    channel_id: u64,
    in_thread: bool,
    board: &RankingBoard,
) -> Result<usize, String> {
    let mut posted = 0;
    for message in &board.messages {
        publisher
            .post(channel_id, message.clone())
            .await
            .map_err(|err| format!("Failed to post ranking: {err}"))?;
        posted += 1;
    }

    let Some(thread) = board.overflow.as_ref() else {
        return Ok(posted);
    };

    let anchor = publisher
        .post(channel_id, thread.caption.clone())
        .await
        .map_err(|err| format!("Failed to post ranking: {err}"))?;
    posted += 1;

    let thread_id = if in_thread {
        channel_id
    } else {
        match publisher
            .open_thread(channel_id, anchor, thread.name.clone())
            .await
        {
            Ok(thread_id) => thread_id,
            Err(err) => {
                let message = format!("Failed to create ranking thread: {err}");
                warn!(channel_id, error = %err, "ranking thread creation failed");
                if let Err(post_err) = publisher.post(channel_id, message.clone()).await {
                    warn!(channel_id, error = %post_err, "failed to report thread error");
                }
                return Err(message);
            }
        }
    };

    for message in &thread.messages {
        publisher
            .post(thread_id, message.clone())
            .await
            .map_err(|err| format!("Failed to post ranking: {err}"))?;
        posted += 1;
    }
    info!(channel_id, thread_id, posted, "ranking published");
    Ok(posted)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        dao::models::MemberRecord,
        services::ranking::{EmojiCatalog, build_ranking},
    };

    #[derive(Default)]
    struct RecordingPublisher {
        posts: Arc<Mutex<Vec<(u64, String)>>>,
        fail_threads: bool,
    }

    impl BoardPublisher for RecordingPublisher {
        fn post(&self, channel_id: u64, text: String) -> BoxFuture<'static, Result<u64, String>> {
            let mut posts = self.posts.lock().unwrap();
            posts.push((channel_id, text));
            let id = posts.len() as u64;
            Box::pin(async move { Ok(id) })
        }

        fn open_thread(
            &self,
            _channel_id: u64,
            message_id: u64,
            _name: String,
        ) -> BoxFuture<'static, Result<u64, String>> {
            let result = if self.fail_threads {
                Err("Missing Permissions".to_string())
            } else {
                Ok(1000 + message_id)
            };
            Box::pin(async move { result })
        }
    }

    fn board(size: u32) -> RankingBoard {
        let members = (1..=size)
            .map(|i| {
                let mut record = MemberRecord::new(format!("p{i}"), i.to_string());
                record.rank_tier = Some(80);
                record.leaderboard_rank = Some(i);
                record
            })
            .collect::<Vec<_>>();
        build_ranking(&members, false, &EmojiCatalog::default())
    }

    #[tokio::test]
    async fn small_board_stays_in_channel() {
        let publisher = RecordingPublisher::default();
        let posted = publish_board(&publisher, 7, false, &board(3)).await.unwrap();

        assert_eq!(posted, 3);
        assert!(publisher.posts.lock().unwrap().iter().all(|(channel, _)| *channel == 7));
    }

    #[tokio::test]
    async fn overflow_goes_to_thread() {
        let publisher = RecordingPublisher::default();
        let posted = publish_board(&publisher, 7, false, &board(20)).await.unwrap();

        let posts = publisher.posts.lock().unwrap();
        // title, header, two chunks, caption, thread header, one chunk
        assert_eq!(posted, 7);
        let caption_id = 5;
        assert!(posts[5..].iter().all(|(channel, _)| *channel == 1000 + caption_id));
    }

    #[tokio::test]
    async fn overflow_stays_in_place_when_already_in_a_thread() {
        let publisher = RecordingPublisher {
            fail_threads: true,
            ..RecordingPublisher::default()
        };
        let posted = publish_board(&publisher, 7, true, &board(20)).await.unwrap();

        assert_eq!(posted, 7);
        assert!(publisher.posts.lock().unwrap().iter().all(|(channel, _)| *channel == 7));
    }

    #[tokio::test]
    async fn thread_failure_is_reported() {
        let publisher = RecordingPublisher {
            fail_threads: true,
            ..RecordingPublisher::default()
        };
        let err = publish_board(&publisher, 7, false, &board(20)).await.unwrap_err();

        assert_eq!(err, "Failed to create ranking thread: Missing Permissions");
        let posts = publisher.posts.lock().unwrap();
        assert_eq!(posts.last().unwrap(), &(7, err.clone()));
    }
}
