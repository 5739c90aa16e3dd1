pub mod auth;
mod client;
mod config;
mod crawler;
pub mod endpoints;
mod error;
mod limiter;
mod model;

pub use client::{ApiClient, HttpTransport, RawResponse, Transport};
pub use config::{ApiConfig, CrawlerConfig, OnError, RetryPolicy, ThresholdScope};
pub use crawler::{crawl_site, CrawlContext, Crawler};
pub use error::{CrawlError, Result};
pub use limiter::{Permit, RateLimiter};
pub use model::{
    AnswerEdge, AnswerId, AnswerOwner, Graph, QuestionSummary, User, UserId, UserProfile,
    UserProfiles,
};

pub use futures;
