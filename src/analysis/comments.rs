use std::sync::{Mutex, MutexGuard, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::{self, ToastKind};

use super::{
    contract::{ApiClient, FlowNotices, FormSlot, REDDIT_COMMENTS, YOUTUBE_COMMENTS},
    sentiment::SentimentBreakdown,
    AnalysisError,
};

pub const DEFAULT_MAX_COMMENTS: usize = 100;

const YOUTUBE_NOTICES: FlowNotices =
    FlowNotices::new("Error fetching comments. Please check the URL and try again.");
const REDDIT_NOTICES: FlowNotices =
    FlowNotices::new("Failed to fetch data. Please check the URL and try again.")
        .not_found("Reddit post not found. Please check the URL.");

const ANALYSIS_EXISTS: &str = "Analysis already exists";

/// One analysed comment. Fields the views don't use are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Comment {
    pub fn author(&self) -> &str {
        self.username
            .as_deref()
            .or(self.user.as_deref())
            .unwrap_or("Anonymous")
    }
}

pub fn breakdown_of(comments: &[Comment]) -> SentimentBreakdown {
    SentimentBreakdown::from_labels(comments.iter().filter_map(|c| c.sentiment.as_deref()))
}

/// Pulls the 11-character video id out of any of the usual YouTube URL
/// shapes (`watch?v=`, `youtu.be/`, `/embed/`).
pub fn extract_video_id(url: &str) -> Option<String> {
    static VIDEO_ID: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = VIDEO_ID
        .get_or_init(|| Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").ok())
        .as_ref()?;
    pattern
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
}

/// Comments currently loaded on the YouTube page.
#[derive(Debug, Clone)]
pub struct CommentSet {
    pub video_id: Option<String>,
    pub comments: Vec<Comment>,
    pub max_comments: usize,
}

impl Default for CommentSet {
    fn default() -> Self {
        Self {
            video_id: None,
            comments: Vec::new(),
            max_comments: DEFAULT_MAX_COMMENTS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub video_id: Option<String>,
    pub comments: Vec<Comment>,
    pub breakdown: SentimentBreakdown,
    pub total_fetched: usize,
    pub max_comments: usize,
}

impl CommentSet {
    /// First `max_comments` comments and the breakdown over exactly those.
    pub fn view(&self) -> CommentView {
        let shown = &self.comments[..self.comments.len().min(self.max_comments)];
        CommentView {
            video_id: self.video_id.clone(),
            comments: shown.to_vec(),
            breakdown: breakdown_of(shown),
            total_fetched: self.comments.len(),
            max_comments: self.max_comments,
        }
    }
}

#[derive(Serialize)]
struct YoutubeRequest<'a> {
    video_url: &'a str,
}

#[derive(Deserialize)]
struct YoutubeResponse {
    #[serde(default)]
    comments: Option<Vec<Comment>>,
}

pub struct YoutubeComments {
    api: ApiClient,
    slot: FormSlot,
    current: Mutex<CommentSet>,
}

impl YoutubeComments {
    pub fn new(api: ApiClient) -> Self {
        Self {
            slot: FormSlot::new("youtube", api.events_handle()),
            current: Mutex::new(CommentSet::default()),
            api,
        }
    }

    /// Fetches and keeps every comment; the returned view is limited to the
    /// current `max_comments`.
    pub async fn fetch(&self, url: &str) -> Result<CommentView, AnalysisError> {
        let video_url = url.trim();
        let (video_id, comments) = self
            .slot
            .submit(&YOUTUBE_NOTICES, async {
                let video_id = extract_video_id(video_url).ok_or_else(|| {
                    AnalysisError::validation("Please enter a valid YouTube video URL.")
                })?;
                let response: YoutubeResponse = self
                    .api
                    .post_json(&YOUTUBE_COMMENTS, &YoutubeRequest { video_url })
                    .await?;
                Ok((video_id, response.comments.unwrap_or_default()))
            })
            .await?;

        let view = {
            let mut current = self.lock();
            current.video_id = Some(video_id);
            current.comments = comments;
            current.view()
        };
        events::toast(self.api.events(), "Comments fetched successfully!", ToastKind::Success);
        Ok(view)
    }

    /// Changes the view limit without refetching.
    pub fn set_max_comments(&self, max_comments: usize) -> CommentView {
        let mut current = self.lock();
        current.max_comments = max_comments;
        current.view()
    }

    pub fn view(&self) -> CommentView {
        self.lock().view()
    }

    fn lock(&self) -> MutexGuard<'_, CommentSet> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[derive(Serialize)]
struct RedditRequest<'a> {
    post_url: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct RedditPayload {
    #[serde(default)]
    post: Value,
    #[serde(default)]
    comments: Option<Vec<Comment>>,
}

#[derive(Deserialize)]
struct RedditResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    analysis_data: Option<RedditPayload>,
    #[serde(flatten)]
    fresh: RedditPayload,
}

impl RedditResponse {
    /// A post analysed earlier comes back wrapped in `analysis_data`.
    fn into_report(self) -> RedditReport {
        let already_analyzed = self.message.as_deref() == Some(ANALYSIS_EXISTS);
        let payload = match (already_analyzed, self.analysis_data) {
            (true, Some(stored)) => stored,
            _ => self.fresh,
        };
        let comments = payload.comments.unwrap_or_default();
        RedditReport {
            breakdown: breakdown_of(&comments),
            post: payload.post,
            comments,
            already_analyzed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditReport {
    pub post: Value,
    pub comments: Vec<Comment>,
    pub breakdown: SentimentBreakdown,
    pub already_analyzed: bool,
}

pub struct RedditComments {
    api: ApiClient,
    slot: FormSlot,
}

impl RedditComments {
    pub fn new(api: ApiClient) -> Self {
        Self {
            slot: FormSlot::new("reddit", api.events_handle()),
            api,
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<RedditReport, AnalysisError> {
        let post_url = url.trim();
        let report = self
            .slot
            .submit(&REDDIT_NOTICES, async {
                if post_url.is_empty() {
                    return Err(AnalysisError::validation("Please enter a Reddit post URL."));
                }
                let response: RedditResponse = self
                    .api
                    .post_json(&REDDIT_COMMENTS, &RedditRequest { post_url })
                    .await?;
                Ok(response.into_report())
            })
            .await?;

        events::toast(self.api.events(), "Reddit post analyzed successfully!", ToastKind::Success);
        Ok(report)
    }
}
