//! In-memory store and cache fakes for exercising the repositories without
//! Postgres or Redis. The fakes keep the real contracts: transition-guarded
//! toggles, existence-guarded cache increments, zero counts for absent rows.
use crate::article::{ArticleCache, ArticleStore};
use crate::domain::{
    Article, ArticleStatus, ArticleSummary, Counters, FeedEvent, FollowData, FollowRelation,
    RelationState,
};
use crate::error::{CoreError, CoreResult};
use crate::feed::FeedStore;
use crate::follow::{FollowCache, FollowStore};
use crate::interaction::{CounterCache, CounterStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Polls `pred` until it holds, panicking after about a second. Used to
/// observe work the cache writer completes asynchronously.
pub async fn eventually(pred: impl Fn() -> bool) {
    for _ in 0..200 {
        if pred() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within the polling window");
}

pub fn draft(id: i64, author_id: i64, title: &str, content: &str) -> Article {
    let now = Utc::now();
    Article {
        id,
        title: title.to_string(),
        content: content.to_string(),
        author_id,
        status: ArticleStatus::Unpublished,
        ctime: now,
        utime: now,
    }
}

fn injected(op: &str) -> CoreError {
    CoreError::Internal(format!("injected {op} failure"))
}

#[derive(Default)]
struct FollowState {
    // (follower, followee) -> active
    relations: BTreeMap<(i64, i64), bool>,
    data: HashMap<i64, FollowData>,
}

impl FollowState {
    fn activate(&mut self, follower: i64, followee: i64) {
        let entry = self.relations.entry((follower, followee)).or_insert(false);
        if !*entry {
            *entry = true;
            self.data.entry(follower).or_insert(FollowData {
                uid: follower,
                ..FollowData::default()
            }).followees += 1;
            self.data.entry(followee).or_insert(FollowData {
                uid: followee,
                ..FollowData::default()
            }).followers += 1;
        }
    }

    fn deactivate(&mut self, follower: i64, followee: i64) {
        if let Some(active) = self.relations.get_mut(&(follower, followee)) {
            if *active {
                *active = false;
                if let Some(d) = self.data.get_mut(&follower) {
                    d.followees -= 1;
                }
                if let Some(d) = self.data.get_mut(&followee) {
                    d.followers -= 1;
                }
            }
        }
    }
}

#[derive(Default)]
pub struct MemFollowStore {
    state: Mutex<FollowState>,
    fail_reads: AtomicBool,
    follow_data_loads: AtomicUsize,
}

impl MemFollowStore {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn follow_data_loads(&self) -> usize {
        self.follow_data_loads.load(Ordering::SeqCst)
    }

    pub async fn seed_relation(&self, follower: i64, followee: i64) {
        self.state.lock().unwrap().activate(follower, followee);
    }

    /// Seeds `n` distinct followers for `followee`, with deterministic ids.
    pub async fn seed_followers(&self, followee: i64, n: i64) {
        let mut state = self.state.lock().unwrap();
        for i in 1..=n {
            state.activate(followee * 1000 + i, followee);
        }
    }

    pub async fn first_follower_of(&self, followee: i64) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .relations
            .iter()
            .find(|((_, fe), active)| *fe == followee && **active)
            .map(|((fr, _), _)| *fr)
    }

    fn check_reads(&self) -> CoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        Ok(())
    }
}

#[async_trait]
impl FollowStore for MemFollowStore {
    async fn insert_follow(&self, follower: i64, followee: i64) -> CoreResult<()> {
        self.state.lock().unwrap().activate(follower, followee);
        Ok(())
    }

    async fn deactivate_follow(&self, follower: i64, followee: i64) -> CoreResult<()> {
        self.state.lock().unwrap().deactivate(follower, followee);
        Ok(())
    }

    async fn get_followed(&self, follower: i64, followee: i64) -> CoreResult<bool> {
        self.check_reads()?;
        Ok(*self
            .state
            .lock()
            .unwrap()
            .relations
            .get(&(follower, followee))
            .unwrap_or(&false))
    }

    async fn follow_data(&self, uid: i64) -> CoreResult<FollowData> {
        // Counted before the failure check so tests can observe that a
        // failing load was attempted at all.
        self.follow_data_loads.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .data
            .get(&uid)
            .copied()
            .unwrap_or(FollowData {
                uid,
                ..FollowData::default()
            }))
    }

    async fn followee_list(
        &self,
        follower: i64,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<FollowRelation>> {
        self.check_reads()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .relations
            .iter()
            .filter(|((fr, _), active)| *fr == follower && **active)
            .map(|((fr, fe), _)| FollowRelation {
                follower: *fr,
                followee: *fe,
                state: RelationState::Active,
            })
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn follower_list(
        &self,
        followee: i64,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<FollowRelation>> {
        self.check_reads()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .relations
            .iter()
            .filter(|((_, fe), active)| *fe == followee && **active)
            .map(|((fr, fe), _)| FollowRelation {
                follower: *fr,
                followee: *fe,
                state: RelationState::Active,
            })
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[derive(Default)]
pub struct MemFollowCache {
    data: Mutex<HashMap<i64, FollowData>>,
}

impl MemFollowCache {
    pub fn get(&self, uid: i64) -> Option<FollowData> {
        self.data.lock().unwrap().get(&uid).copied()
    }
}

#[async_trait]
impl FollowCache for MemFollowCache {
    async fn follow_data(&self, uid: i64) -> CoreResult<Option<FollowData>> {
        Ok(self.get(uid))
    }

    async fn set_follow_data(&self, data: &FollowData) -> CoreResult<()> {
        self.data.lock().unwrap().insert(data.uid, *data);
        Ok(())
    }
}

#[derive(Default)]
struct CounterState {
    counters: HashMap<(String, i64), Counters>,
    likes: HashMap<(String, i64, i64), bool>,
    collects: HashMap<(String, i64, i64), bool>,
}

#[derive(Default)]
pub struct MemCounterStore {
    state: Mutex<CounterState>,
    counter_loads: AtomicUsize,
    fail_membership: AtomicBool,
}

impl MemCounterStore {
    pub fn counter_loads(&self) -> usize {
        self.counter_loads.load(Ordering::SeqCst)
    }

    pub fn fail_membership(&self, fail: bool) {
        self.fail_membership.store(fail, Ordering::SeqCst);
    }

    pub async fn seed(&self, biz: &str, biz_id: i64, read: i64, like: i64, collect: i64) {
        self.state.lock().unwrap().counters.insert(
            (biz.to_string(), biz_id),
            Counters {
                read_cnt: read,
                like_cnt: like,
                collect_cnt: collect,
            },
        );
    }

    fn toggle(
        state: &mut CounterState,
        like: bool,
        biz: &str,
        biz_id: i64,
        uid: i64,
        activate: bool,
    ) -> bool {
        let memberships = if like {
            &mut state.likes
        } else {
            &mut state.collects
        };
        let entry = memberships
            .entry((biz.to_string(), biz_id, uid))
            .or_insert(false);
        if *entry == activate {
            return false;
        }
        *entry = activate;

        let counters = state
            .counters
            .entry((biz.to_string(), biz_id))
            .or_default();
        let field = if like {
            &mut counters.like_cnt
        } else {
            &mut counters.collect_cnt
        };
        *field += if activate { 1 } else { -1 };
        true
    }
}

#[async_trait]
impl CounterStore for MemCounterStore {
    async fn incr_read(&self, biz: &str, biz_id: i64) -> CoreResult<()> {
        self.state
            .lock()
            .unwrap()
            .counters
            .entry((biz.to_string(), biz_id))
            .or_default()
            .read_cnt += 1;
        Ok(())
    }

    async fn activate_like(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(Self::toggle(&mut state, true, biz, biz_id, uid, true))
    }

    async fn deactivate_like(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(Self::toggle(&mut state, true, biz, biz_id, uid, false))
    }

    async fn activate_collect(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(Self::toggle(&mut state, false, biz, biz_id, uid, true))
    }

    async fn deactivate_collect(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(Self::toggle(&mut state, false, biz, biz_id, uid, false))
    }

    async fn counters(&self, biz: &str, biz_id: i64) -> CoreResult<Counters> {
        self.counter_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .unwrap()
            .counters
            .get(&(biz.to_string(), biz_id))
            .copied()
            .unwrap_or_default())
    }

    async fn is_liked(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        if self.fail_membership.load(Ordering::SeqCst) {
            return Err(injected("membership read"));
        }
        Ok(*self
            .state
            .lock()
            .unwrap()
            .likes
            .get(&(biz.to_string(), biz_id, uid))
            .unwrap_or(&false))
    }

    async fn is_collected(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        if self.fail_membership.load(Ordering::SeqCst) {
            return Err(injected("membership read"));
        }
        Ok(*self
            .state
            .lock()
            .unwrap()
            .collects
            .get(&(biz.to_string(), biz_id, uid))
            .unwrap_or(&false))
    }

    async fn collection_list(&self, biz: &str, uid: i64) -> CoreResult<Vec<i64>> {
        let state = self.state.lock().unwrap();
        let mut ids: Vec<i64> = state
            .collects
            .iter()
            .filter(|((b, _, u), active)| b == biz && *u == uid && **active)
            .map(|((_, biz_id, _), _)| *biz_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

/// Mirrors the scripted hash increment: deltas only land on hashes a full
/// populate has written.
#[derive(Default)]
pub struct MemCounterCache {
    data: Mutex<HashMap<(String, i64), Counters>>,
}

impl MemCounterCache {
    pub fn get(&self, biz: &str, biz_id: i64) -> Option<Counters> {
        self.data
            .lock()
            .unwrap()
            .get(&(biz.to_string(), biz_id))
            .copied()
    }

    fn incr(&self, biz: &str, biz_id: i64, apply: impl FnOnce(&mut Counters)) {
        if let Some(counters) = self.data.lock().unwrap().get_mut(&(biz.to_string(), biz_id)) {
            apply(counters);
        }
    }
}

#[async_trait]
impl CounterCache for MemCounterCache {
    async fn incr_read(&self, biz: &str, biz_id: i64) -> CoreResult<()> {
        self.incr(biz, biz_id, |c| c.read_cnt += 1);
        Ok(())
    }

    async fn incr_like(&self, biz: &str, biz_id: i64, delta: i64) -> CoreResult<()> {
        self.incr(biz, biz_id, |c| c.like_cnt += delta);
        Ok(())
    }

    async fn incr_collect(&self, biz: &str, biz_id: i64, delta: i64) -> CoreResult<()> {
        self.incr(biz, biz_id, |c| c.collect_cnt += delta);
        Ok(())
    }

    async fn counters(&self, biz: &str, biz_id: i64) -> CoreResult<Option<Counters>> {
        Ok(self.get(biz, biz_id))
    }

    async fn set_counters(&self, biz: &str, biz_id: i64, counters: &Counters) -> CoreResult<()> {
        self.data
            .lock()
            .unwrap()
            .insert((biz.to_string(), biz_id), *counters);
        Ok(())
    }
}

#[derive(Default)]
struct ArticleState {
    drafts: HashMap<i64, Article>,
    published: HashMap<i64, Article>,
}

#[derive(Default)]
pub struct MemArticleStore {
    state: Mutex<ArticleState>,
    next_id: AtomicI64,
    detail_loads: AtomicUsize,
    list_loads: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemArticleStore {
    pub fn detail_loads(&self) -> usize {
        self.detail_loads.load(Ordering::SeqCst)
    }

    pub fn list_loads(&self) -> usize {
        self.list_loads.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self, id: i64) -> Option<Article> {
        self.state.lock().unwrap().published.get(&id).cloned()
    }

    fn check_writes(&self) -> CoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        Ok(())
    }

    fn insert_draft(&self, state: &mut ArticleState, article: &Article) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stored = article.clone();
        stored.id = id;
        state.drafts.insert(id, stored);
        id
    }

    fn update_draft(state: &mut ArticleState, article: &Article) -> CoreResult<()> {
        match state.drafts.get_mut(&article.id) {
            Some(existing) if existing.author_id == article.author_id => {
                existing.title = article.title.clone();
                existing.content = article.content.clone();
                existing.status = article.status;
                existing.utime = Utc::now();
                Ok(())
            }
            _ => Err(CoreError::OwnershipMismatch {
                article_id: article.id,
                author_id: article.author_id,
            }),
        }
    }
}

#[async_trait]
impl ArticleStore for MemArticleStore {
    async fn insert(&self, article: &Article) -> CoreResult<i64> {
        self.check_writes()?;
        let mut state = self.state.lock().unwrap();
        Ok(self.insert_draft(&mut state, article))
    }

    async fn update(&self, article: &Article) -> CoreResult<()> {
        self.check_writes()?;
        let mut state = self.state.lock().unwrap();
        Self::update_draft(&mut state, article)
    }

    async fn sync(&self, article: &Article) -> CoreResult<i64> {
        self.check_writes()?;
        let mut state = self.state.lock().unwrap();
        let id = if article.id > 0 {
            Self::update_draft(&mut state, article)?;
            article.id
        } else {
            self.insert_draft(&mut state, article)
        };
        let mut published = article.clone();
        published.id = id;
        published.utime = Utc::now();
        state.published.insert(id, published);
        Ok(id)
    }

    async fn sync_status(
        &self,
        author_id: i64,
        article_id: i64,
        status: ArticleStatus,
    ) -> CoreResult<()> {
        self.check_writes()?;
        let mut state = self.state.lock().unwrap();
        match state.drafts.get_mut(&article_id) {
            Some(draft) if draft.author_id == author_id => {
                draft.status = status;
                draft.utime = Utc::now();
            }
            _ => {
                return Err(CoreError::OwnershipMismatch {
                    article_id,
                    author_id,
                })
            }
        }
        if let Some(published) = state.published.get_mut(&article_id) {
            published.status = status;
            published.utime = Utc::now();
        }
        Ok(())
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        offset: i64,
        limit: i64,
    ) -> CoreResult<Vec<Article>> {
        self.list_loads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        let mut articles: Vec<Article> = state
            .drafts
            .values()
            .filter(|a| a.author_id == author_id)
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.utime.cmp(&a.utime).then(b.id.cmp(&a.id)));
        Ok(articles
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_by_id(&self, id: i64) -> CoreResult<Article> {
        self.detail_loads.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .drafts
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("article {id}")))
    }

    async fn get_pub_by_id(&self, id: i64) -> CoreResult<Article> {
        self.state
            .lock()
            .unwrap()
            .published
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("published article {id}")))
    }
}

#[derive(Default)]
pub struct MemArticleCache {
    pages: Mutex<HashMap<i64, Vec<ArticleSummary>>>,
    details: Mutex<HashMap<i64, Article>>,
    pub_details: Mutex<HashMap<i64, Article>>,
}

// Inherent accessors shadow the trait methods of the same name so test
// closures can observe the cache synchronously.
impl MemArticleCache {
    pub fn first_page(&self, uid: i64) -> Option<Vec<ArticleSummary>> {
        self.pages.lock().unwrap().get(&uid).cloned()
    }

    pub fn detail(&self, id: i64) -> Option<Article> {
        self.details.lock().unwrap().get(&id).cloned()
    }

    pub fn pub_detail(&self, id: i64) -> Option<Article> {
        self.pub_details.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl ArticleCache for MemArticleCache {
    async fn first_page(&self, uid: i64) -> CoreResult<Option<Vec<ArticleSummary>>> {
        Ok(MemArticleCache::first_page(self, uid))
    }

    async fn set_first_page(&self, uid: i64, page: &[ArticleSummary]) -> CoreResult<()> {
        self.pages.lock().unwrap().insert(uid, page.to_vec());
        Ok(())
    }

    async fn del_first_page(&self, uid: i64) -> CoreResult<()> {
        self.pages.lock().unwrap().remove(&uid);
        Ok(())
    }

    async fn detail(&self, id: i64) -> CoreResult<Option<Article>> {
        Ok(MemArticleCache::detail(self, id))
    }

    async fn set_detail(&self, article: &Article) -> CoreResult<()> {
        self.details
            .lock()
            .unwrap()
            .insert(article.id, article.clone());
        Ok(())
    }

    async fn pub_detail(&self, id: i64) -> CoreResult<Option<Article>> {
        Ok(MemArticleCache::pub_detail(self, id))
    }

    async fn set_pub_detail(&self, article: &Article) -> CoreResult<()> {
        self.pub_details
            .lock()
            .unwrap()
            .insert(article.id, article.clone());
        Ok(())
    }
}

#[derive(Default)]
struct FeedState {
    pull: Vec<FeedEvent>,
    push: Vec<FeedEvent>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemFeedStore {
    state: Mutex<FeedState>,
    fail_pull: AtomicBool,
    fail_push: AtomicBool,
}

impl MemFeedStore {
    pub fn pull_rows(&self) -> Vec<FeedEvent> {
        self.state.lock().unwrap().pull.clone()
    }

    pub fn push_rows(&self) -> Vec<FeedEvent> {
        self.state.lock().unwrap().push.clone()
    }

    pub fn fail_pull(&self, fail: bool) {
        self.fail_pull.store(fail, Ordering::SeqCst);
    }

    pub fn fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }
}

fn page(
    rows: &[FeedEvent],
    before: DateTime<Utc>,
    limit: i64,
    keep: impl Fn(&FeedEvent) -> bool,
) -> Vec<FeedEvent> {
    let mut out: Vec<FeedEvent> = rows
        .iter()
        .filter(|e| e.ctime < before && keep(e))
        .cloned()
        .collect();
    out.sort_by(|a, b| b.ctime.cmp(&a.ctime));
    out.truncate(limit as usize);
    out
}

#[async_trait]
impl FeedStore for MemFeedStore {
    async fn create_pull_event(&self, event: &FeedEvent) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let mut stored = event.clone();
        stored.id = state.next_id;
        state.pull.push(stored);
        Ok(())
    }

    async fn create_push_events(&self, events: &[FeedEvent]) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        for event in events {
            state.next_id += 1;
            let mut stored = event.clone();
            stored.id = state.next_id;
            state.push.push(stored);
        }
        Ok(())
    }

    async fn pull_events(
        &self,
        owner_uids: &[i64],
        before: DateTime<Utc>,
        limit: i64,
    ) -> CoreResult<Vec<FeedEvent>> {
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(injected("pull read"));
        }
        let state = self.state.lock().unwrap();
        Ok(page(&state.pull, before, limit, |e| {
            owner_uids.contains(&e.owner_uid)
        }))
    }

    async fn push_events(
        &self,
        owner_uid: i64,
        before: DateTime<Utc>,
        limit: i64,
    ) -> CoreResult<Vec<FeedEvent>> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(injected("push read"));
        }
        let state = self.state.lock().unwrap();
        Ok(page(&state.push, before, limit, |e| e.owner_uid == owner_uid))
    }
}
