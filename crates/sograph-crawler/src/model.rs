use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerId(pub u64);

impl fmt::Display for AnswerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A graph node: a user that has been expanded during the crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub display_name: String,
    pub reputation: u64,
    pub top_tag: Option<String>,
}

/// `source` asked a top question of its top tag whose accepted answer was
/// written by `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEdge {
    pub source: UserId,
    pub target: UserId,
    pub score: i64,
    pub answer_id: AnswerId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<User>,
    pub edges: Vec<AnswerEdge>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionSummary {
    pub score: i64,
    pub accepted_answer_id: AnswerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOwner {
    pub answer_id: AnswerId,
    pub user_id: UserId,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub reputation: u64,
}

/// User profiles keyed by ID, in the order the API returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfiles(Vec<UserProfile>);

impl UserProfiles {
    /// Inserts a profile, replacing the value of an already known user while
    /// keeping its original position.
    pub fn insert(&mut self, profile: UserProfile) {
        match self.0.iter_mut().find(|p| p.user_id == profile.user_id) {
            Some(known) => *known = profile,
            None => self.0.push(profile),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UserProfile> {
        self.0.iter()
    }
}

impl IntoIterator for UserProfiles {
    type Item = UserProfile;
    type IntoIter = std::vec::IntoIter<UserProfile>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<UserProfile> for UserProfiles {
    fn from_iter<I: IntoIterator<Item = UserProfile>>(iter: I) -> Self {
        let mut profiles = Self::default();
        for profile in iter {
            profiles.insert(profile);
        }
        profiles
    }
}
