#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use sograph_crawler::futures::future::BoxFuture;
use sograph_crawler::{ApiClient, ApiConfig, CrawlerConfig, Crawler, RawResponse, Transport};
use url::Url;

struct FakeUser {
    name: String,
    reputation: u64,
    tag: Option<String>,
    questions: Vec<FakeQuestion>,
}

struct FakeQuestion {
    score: i64,
    accepted: Option<u64>,
}

struct FakeAnswer {
    owner: Option<u64>,
    score: i64,
}

/// In-memory stand-in for the Stack Exchange API.
#[derive(Default)]
pub struct FakeSite {
    users: BTreeMap<u64, FakeUser>,
    answers: BTreeMap<u64, FakeAnswer>,
    broken: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, id: u64, name: &str, reputation: u64, tag: Option<&str>) -> Self {
        self.users.insert(
            id,
            FakeUser {
                name: name.into(),
                reputation,
                tag: tag.map(String::from),
                questions: vec![],
            },
        );
        self
    }

    /// A question of `asker`'s top tag, answered by `answerer` in `answer_id`.
    pub fn answered(mut self, asker: u64, answer_id: u64, answerer: u64, score: i64) -> Self {
        self.users
            .get_mut(&asker)
            .expect("unknown asker")
            .questions
            .push(FakeQuestion {
                score,
                accepted: Some(answer_id),
            });
        self.answers.insert(
            answer_id,
            FakeAnswer {
                owner: Some(answerer),
                score,
            },
        );
        self
    }

    /// A question of `asker`'s top tag without accepted answer.
    pub fn unanswered(mut self, asker: u64, score: i64) -> Self {
        self.users
            .get_mut(&asker)
            .expect("unknown asker")
            .questions
            .push(FakeQuestion {
                score,
                accepted: None,
            });
        self
    }

    /// Like `answered` but the answerer's account has been deleted.
    pub fn answered_by_deleted(mut self, asker: u64, answer_id: u64, score: i64) -> Self {
        self.users
            .get_mut(&asker)
            .expect("unknown asker")
            .questions
            .push(FakeQuestion {
                score,
                accepted: Some(answer_id),
            });
        self.answers
            .insert(answer_id, FakeAnswer { owner: None, score });
        self
    }

    /// Makes requests to `path` (relative to the API root) return garbage.
    pub fn broken(mut self, path: &str) -> Self {
        self.broken.insert(path.into());
        self
    }

    /// Paths requested so far, relative to the API root.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, path: &str) -> usize {
        self.calls().iter().filter(|c| *c == path).count()
    }

    fn route(&self, url: &Url) -> RawResponse {
        let path = url.path().trim_start_matches("/2.3/").to_string();
        self.calls.lock().unwrap().push(path.clone());

        if self.broken.contains(&path) {
            return RawResponse {
                status: 200,
                retry_after: None,
                body: "<html>502 Bad Gateway</html>".into(),
            };
        }

        let pagesize = url
            .query_pairs()
            .find(|(k, _)| k == "pagesize")
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(30);
        if pagesize > 100 {
            return RawResponse {
                status: 400,
                retry_after: None,
                body: json!({
                    "error_id": 400,
                    "error_message": "pagesize",
                    "error_name": "bad_parameter",
                })
                .to_string(),
            };
        }

        let segments = path
            .split('/')
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .collect::<Vec<_>>();
        let segments = segments.iter().map(String::as_str).collect::<Vec<_>>();

        let items = match segments.as_slice() {
            ["users", ids] => self.users_items(ids),
            ["users", id, "top-tags"] => self.top_tags_items(id),
            ["users", id, "tags", tag, "top-questions"] => self.questions_items(id, tag, pagesize),
            ["answers", ids] => self.answers_items(ids),
            _ => {
                return RawResponse {
                    status: 404,
                    retry_after: None,
                    body: json!({
                        "error_id": 404,
                        "error_message": "no method found with this name",
                    })
                    .to_string(),
                }
            }
        };

        RawResponse {
            status: 200,
            retry_after: None,
            body: json!({"items": items, "has_more": false, "quota_remaining": 9000}).to_string(),
        }
    }

    fn users_items(&self, ids: &str) -> Vec<Value> {
        let mut seen = HashSet::new();
        let mut found = ids
            .split(';')
            .filter_map(|id| id.parse::<u64>().ok())
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.users.get(&id).map(|u| (id, u)))
            .collect::<Vec<_>>();
        found.sort_by(|a, b| b.1.reputation.cmp(&a.1.reputation));
        found
            .into_iter()
            .map(|(id, u)| {
                json!({
                    "user_id": id,
                    "display_name": u.name,
                    "reputation": u.reputation,
                    "user_type": "registered",
                })
            })
            .collect()
    }

    fn top_tags_items(&self, id: &str) -> Vec<Value> {
        let tag = id
            .parse::<u64>()
            .ok()
            .and_then(|id| self.users.get(&id))
            .and_then(|u| u.tag.as_ref());
        match tag {
            Some(tag) => vec![json!({"tag_name": tag, "answer_count": 3, "question_count": 12})],
            None => vec![],
        }
    }

    fn questions_items(&self, id: &str, tag: &str, pagesize: usize) -> Vec<Value> {
        let user = match id.parse::<u64>().ok().and_then(|id| self.users.get(&id)) {
            Some(user) if user.tag.as_deref() == Some(tag) => user,
            _ => return vec![],
        };
        let mut questions = user.questions.iter().collect::<Vec<_>>();
        questions.sort_by(|a, b| b.score.cmp(&a.score));
        questions
            .into_iter()
            .take(pagesize)
            .map(|q| match q.accepted {
                Some(answer_id) => json!({"score": q.score, "accepted_answer_id": answer_id}),
                None => json!({"score": q.score}),
            })
            .collect()
    }

    fn answers_items(&self, ids: &str) -> Vec<Value> {
        ids.split(';')
            .filter_map(|id| id.parse::<u64>().ok())
            .filter_map(|id| self.answers.get(&id).map(|a| (id, a)))
            .map(|(id, a)| {
                let owner = match a.owner {
                    Some(user_id) => json!({"user_id": user_id, "user_type": "registered"}),
                    None => json!({"user_type": "does_not_exist", "display_name": "user123"}),
                };
                json!({"answer_id": id, "score": a.score, "owner": owner})
            })
            .collect()
    }
}

impl Transport for FakeSite {
    fn get<'a>(
        &'a self,
        url: &'a Url,
        _token: &'a str,
    ) -> BoxFuture<'a, sograph_crawler::Result<RawResponse>> {
        let resp = self.route(url);
        Box::pin(async move { Ok(resp) })
    }
}

pub fn crawler(site: FakeSite, config: CrawlerConfig) -> Crawler<FakeSite> {
    let client = ApiClient::with_transport(site, &config.api, "token").unwrap();
    Crawler::new(client, config)
}

pub fn client(site: FakeSite) -> ApiClient<FakeSite> {
    ApiClient::with_transport(site, &ApiConfig::default(), "token").unwrap()
}
