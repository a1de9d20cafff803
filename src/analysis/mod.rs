//! One-shot request/response flows against the analysis backend. Every
//! flow runs through [`contract::FormSlot::submit`] so loading state,
//! auth handling and failure notices behave the same everywhere.

pub mod auth;
#[cfg(feature = "desktop")]
pub mod commands;
pub mod comments;
pub mod contact;
pub mod contract;
mod error;
pub mod media;
pub mod sentiment;

pub use auth::{AuthFlows, GoogleLoginOutcome, PasswordPolicy, SignupForm};
pub use comments::{extract_video_id, CommentView, RedditComments, RedditReport, YoutubeComments};
pub use contact::{ContactDraft, ContactForm};
pub use contract::{ApiClient, FlowNotices, FormSlot};
pub use error::AnalysisError;
pub use media::{MediaAnalysis, ProcessedVideo};
pub use sentiment::{Sentiment, SentimentAnalysis, SentimentBreakdown};
