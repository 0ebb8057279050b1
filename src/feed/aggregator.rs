/// Read-time feed aggregator: merges the pull log (joined against the
/// reader's followee set) with the reader's push inbox
use crate::domain::FeedEvent;
use crate::error::CoreResult;
use crate::feed::store::FeedStore;
use crate::follow::FollowRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct FeedAggregator {
    feed: Arc<dyn FeedStore>,
    follows: Arc<FollowRepository>,
    /// Bound on the followee enumeration, shared with the dispatcher's cap
    followee_cap: i64,
}

impl FeedAggregator {
    pub fn new(feed: Arc<dyn FeedStore>, follows: Arc<FollowRepository>, followee_cap: i64) -> Self {
        Self {
            feed,
            follows,
            followee_cap,
        }
    }

    /// One time-ordered feed page for `reader`.
    ///
    /// Both logs are always queried: authors switch between push and pull
    /// regimes as their follower counts move, so either log may hold any
    /// author's events. Each branch is capped at `limit`; the merged page is
    /// sorted newest-first and truncated to `limit`.
    ///
    /// If either branch fails the call fails and the surviving branch's
    /// result is discarded. The sibling branch is not cancelled on first
    /// error; both run to completion.
    pub async fn list(
        &self,
        reader: i64,
        before: DateTime<Utc>,
        limit: i64,
    ) -> CoreResult<Vec<FeedEvent>> {
        let pull_branch = async {
            let followees = self.follows.followee_list(reader, self.followee_cap, 0).await?;
            let owner_uids: Vec<i64> = followees.iter().map(|r| r.followee).collect();
            self.feed.pull_events(&owner_uids, before, limit).await
        };
        let push_branch = self.feed.push_events(reader, before, limit);

        let (pull, push) = tokio::join!(pull_branch, push_branch);

        let mut events = pull?;
        events.extend(push?);
        events.sort_by(|a, b| b.ctime.cmp(&a.ctime));
        events.truncate(limit as usize);
        Ok(events)
    }
}
