//! The handful of Stack Exchange API methods the crawl relies on.

use std::fmt::Display;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::client::{ApiClient, Transport};
use crate::error::{CrawlError, Result};
use crate::model::{AnswerId, AnswerOwner, QuestionSummary, UserId, UserProfile, UserProfiles};

/// Maximum number of IDs accepted by a single vectorized API method.
pub const MAX_IDS_PER_REQUEST: usize = 100;

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Deserialize)]
struct QuestionItem {
    score: i64,
    accepted_answer_id: Option<AnswerId>,
}

#[derive(Debug, Deserialize)]
struct AnswerItem {
    answer_id: AnswerId,
    score: i64,
    owner: Option<OwnerItem>,
}

#[derive(Debug, Deserialize)]
struct OwnerItem {
    user_type: Option<String>,
    user_id: Option<UserId>,
}

impl OwnerItem {
    fn existing_user(&self) -> Option<UserId> {
        match self.user_type.as_deref() {
            Some("does_not_exist") => None,
            _ => self.user_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserItem {
    user_id: UserId,
    display_name: String,
    reputation: u64,
}

#[derive(Debug, Deserialize)]
struct TagItem {
    tag_name: String,
}

impl<T> ApiClient<T>
where
    T: Transport,
{
    /// Top voted questions of `user_id` in `tag` that have an accepted answer,
    /// at most `limit` of them, best first.
    ///
    /// Twice `limit` questions are fetched to make up for unanswered ones,
    /// within the API page size limit.
    pub async fn top_questions_for_tag(
        &self,
        user_id: UserId,
        tag: &str,
        limit: usize,
    ) -> Result<Vec<QuestionSummary>> {
        let path = format!(
            "users/{user_id}/tags/{}/top-questions",
            utf8_percent_encode(tag, PATH_SEGMENT)
        );
        let url = self.url(
            &path,
            &[
                ("pagesize", page_size(limit).to_string()),
                ("order", "desc".into()),
                ("sort", "votes".into()),
            ],
        )?;

        let questions = items::<QuestionItem>(&url, self.send(&url).await?)?
            .into_iter()
            .filter_map(|q| {
                q.accepted_answer_id.map(|accepted_answer_id| QuestionSummary {
                    score: q.score,
                    accepted_answer_id,
                })
            })
            .take(limit)
            .collect();

        Ok(questions)
    }

    /// Authors of the given answers, skipping answers whose author account
    /// no longer exists.
    pub async fn resolve_answer_owners(
        &self,
        answer_ids: &[AnswerId],
    ) -> Result<Vec<AnswerOwner>> {
        let mut owners = vec![];
        for chunk in answer_ids.chunks(MAX_IDS_PER_REQUEST) {
            let url = self.url(
                &format!("answers/{}", join_ids(chunk)),
                &[
                    ("pagesize", chunk.len().to_string()),
                    ("order", "desc".into()),
                    ("sort", "creation".into()),
                ],
            )?;

            let answers = items::<AnswerItem>(&url, self.send(&url).await?)?;
            owners.extend(answers.into_iter().filter_map(|a| {
                let user_id = a.owner.as_ref()?.existing_user()?;
                Some(AnswerOwner {
                    answer_id: a.answer_id,
                    user_id,
                    score: a.score,
                })
            }));
        }
        Ok(owners)
    }

    /// Profiles of the given users, unknown users being left out.
    pub async fn user_info_batch(&self, user_ids: &[UserId]) -> Result<UserProfiles> {
        let mut profiles = UserProfiles::default();
        for chunk in user_ids.chunks(MAX_IDS_PER_REQUEST) {
            let url = self.url(
                &format!("users/{}", join_ids(chunk)),
                &[
                    ("pagesize", chunk.len().to_string()),
                    ("order", "desc".into()),
                    ("sort", "reputation".into()),
                ],
            )?;

            for user in items::<UserItem>(&url, self.send(&url).await?)? {
                profiles.insert(UserProfile {
                    user_id: user.user_id,
                    display_name: decode(&user.display_name),
                    reputation: user.reputation,
                });
            }
        }
        Ok(profiles)
    }

    /// The tag `user_id` is most active in, if any.
    pub async fn top_tag(&self, user_id: UserId) -> Result<Option<String>> {
        let url = self.url(
            &format!("users/{user_id}/top-tags"),
            &[("pagesize", "1".into())],
        )?;

        let tag = items::<TagItem>(&url, self.send(&url).await?)?
            .into_iter()
            .next()
            .map(|t| decode(&t.tag_name));
        Ok(tag)
    }
}

fn items<I>(url: &Url, mut body: Value) -> Result<Vec<I>>
where
    I: DeserializeOwned,
{
    let items = body
        .get_mut("items")
        .map(Value::take)
        .ok_or_else(|| CrawlError::SchemaError {
            url: url.to_string(),
            detail: "missing expected key 'items'".into(),
        })?;

    serde_json::from_value(items).map_err(|e| CrawlError::SchemaError {
        url: url.to_string(),
        detail: e.to_string(),
    })
}

fn page_size(limit: usize) -> usize {
    limit.saturating_mul(2).min(MAX_IDS_PER_REQUEST)
}

fn join_ids<I: Display>(ids: &[I]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}
