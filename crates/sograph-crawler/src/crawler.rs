use std::collections::HashSet;

use crate::client::{ApiClient, HttpTransport, Transport};
use crate::config::{CrawlerConfig, OnError};
use crate::error::Result;
use crate::model::{AnswerEdge, Graph, User, UserId, UserProfile};

/// State accumulated while crawling: the users already expanded and the
/// graph built so far.
#[derive(Debug, Clone, Default)]
pub struct CrawlContext {
    visited: HashSet<UserId>,
    graph: Graph,
}

impl CrawlContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visited(&self, user_id: UserId) -> bool {
        self.visited.contains(&user_id)
    }

    pub fn visited(&self) -> &HashSet<UserId> {
        &self.visited
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }
}

/// A batch of users waiting to be expanded, all found at the same depth.
struct Frame {
    users: std::vec::IntoIter<UserProfile>,
    depth: usize,
}

pub struct Crawler<T = HttpTransport> {
    client: ApiClient<T>,
    config: CrawlerConfig,
}

impl<T> Crawler<T>
where
    T: Transport,
{
    pub fn new(client: ApiClient<T>, config: CrawlerConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    /// Crawls the answer graph reachable from `seed`.
    pub async fn crawl(&self, seed: &[UserId]) -> Result<Graph> {
        let mut ctx = CrawlContext::new();
        self.crawl_into(&mut ctx, seed, 1).await?;
        log::info!(
            "Crawl done: {} users, {} answers, {} requests",
            ctx.graph.nodes.len(),
            ctx.graph.edges.len(),
            self.client.requests_sent()
        );
        Ok(ctx.into_graph())
    }

    /// Expands `seed` found at `depth` and everything reachable from it,
    /// depth first, adding users and answers to `ctx`.
    ///
    /// Users already visited in `ctx` are not expanded again.
    pub async fn crawl_into(
        &self,
        ctx: &mut CrawlContext,
        seed: &[UserId],
        depth: usize,
    ) -> Result<()> {
        let root_depth = depth;
        let mut stack = vec![];
        if let Some(frame) = self.frame(seed, depth).await? {
            stack.push(frame);
        }

        while let Some(frame) = stack.last_mut() {
            let depth = frame.depth;
            let Some(user) = frame.users.next() else {
                stack.pop();
                continue;
            };

            let threshold = self.config.threshold_at(depth, root_depth);
            if ctx.is_visited(user.user_id) || user.reputation < threshold {
                continue;
            }
            ctx.visited.insert(user.user_id);

            let user_id = user.user_id;
            let next = match self.expand(ctx, user, depth).await {
                Ok(next) => next,
                Err(e) => match self.config.on_user_error {
                    OnError::SkipAndLog => {
                        log::warn!("Skipping user {user_id} got: {e}");
                        continue;
                    }
                    OnError::Fail => return Err(e),
                },
            };

            if !next.is_empty() {
                if let Some(frame) = self.frame(&next, depth + 1).await? {
                    stack.push(frame);
                }
            }
        }

        Ok(())
    }

    async fn frame(&self, user_ids: &[UserId], depth: usize) -> Result<Option<Frame>> {
        if depth > self.config.max_depth {
            return Ok(None);
        }

        match self.client.user_info_batch(user_ids).await {
            Ok(profiles) => Ok(Some(Frame {
                users: profiles.into_iter().collect::<Vec<_>>().into_iter(),
                depth,
            })),
            Err(e) => match self.config.on_user_error {
                OnError::SkipAndLog => {
                    log::warn!("Skipping users {user_ids:?} got: {e}");
                    Ok(None)
                }
                OnError::Fail => Err(e),
            },
        }
    }

    /// Looks up the users answering `user`'s top questions, records the node
    /// and its edges, and returns the answerers to expand next.
    async fn expand(
        &self,
        ctx: &mut CrawlContext,
        user: UserProfile,
        depth: usize,
    ) -> Result<Vec<UserId>> {
        let top_tag = self.client.top_tag(user.user_id).await?;

        let mut answer_ids = vec![];
        let mut edges = vec![];
        if let Some(tag) = &top_tag {
            let questions = self
                .client
                .top_questions_for_tag(user.user_id, tag, self.config.num_questions)
                .await?;
            if !questions.is_empty() {
                answer_ids = questions
                    .iter()
                    .map(|q| q.accepted_answer_id)
                    .collect::<Vec<_>>();
                edges = self
                    .client
                    .resolve_answer_owners(&answer_ids)
                    .await?
                    .into_iter()
                    .map(|owner| AnswerEdge {
                        source: user.user_id,
                        target: owner.user_id,
                        score: owner.score,
                        answer_id: owner.answer_id,
                    })
                    .collect::<Vec<_>>();
            }
        }

        log::info!(
            "{}{depth} - User: {} (Reputation: {}, Top tag: {} Top answers: {:?})",
            " ".repeat(depth.saturating_sub(1)),
            user.display_name,
            user.reputation,
            top_tag.as_deref().unwrap_or("-"),
            answer_ids.iter().map(|a| a.0).collect::<Vec<_>>(),
        );

        let next = edges.iter().map(|e| e.target).collect();
        ctx.graph.nodes.push(User {
            user_id: user.user_id,
            display_name: user.display_name,
            reputation: user.reputation,
            top_tag,
        });
        ctx.graph.edges.extend(edges);

        Ok(next)
    }
}

/// Crawls the answer graph reachable from `seed` with a fresh HTTP client.
pub async fn crawl_site(config: &CrawlerConfig, token: &str, seed: &[UserId]) -> Result<Graph> {
    let client = ApiClient::new(&config.api, token)?;
    Crawler::new(client, config.clone()).crawl(seed).await
}
