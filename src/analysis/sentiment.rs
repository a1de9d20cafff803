use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{self, ToastKind};

use super::{
    contract::{ApiClient, FlowNotices, FormSlot, ANALYSIS_HISTORY, ANALYZE_SENTIMENT},
    AnalysisError,
};

const ANALYZE_NOTICES: FlowNotices =
    FlowNotices::new("Error analyzing sentiment. Please try again.");
const HISTORY_NOTICES: FlowNotices =
    FlowNotices::new("An error occurred while loading the history.");

/// The seven labels the backend classifies text into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Anger,
    Disgust,
    Fear,
    Joy,
    Neutral,
    Sadness,
    Surprise,
}

impl Sentiment {
    pub const ALL: [Sentiment; 7] = [
        Sentiment::Anger,
        Sentiment::Disgust,
        Sentiment::Fear,
        Sentiment::Joy,
        Sentiment::Neutral,
        Sentiment::Sadness,
        Sentiment::Surprise,
    ];

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "anger" => Some(Sentiment::Anger),
            "disgust" => Some(Sentiment::Disgust),
            "fear" => Some(Sentiment::Fear),
            "joy" => Some(Sentiment::Joy),
            "neutral" => Some(Sentiment::Neutral),
            "sadness" => Some(Sentiment::Sadness),
            "surprise" => Some(Sentiment::Surprise),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Anger => "anger",
            Sentiment::Disgust => "disgust",
            Sentiment::Fear => "fear",
            Sentiment::Joy => "joy",
            Sentiment::Neutral => "neutral",
            Sentiment::Sadness => "sadness",
            Sentiment::Surprise => "surprise",
        }
    }
}

/// Per-label counts over a set of comments. Labels outside the seven are
/// not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentBreakdown {
    pub anger: usize,
    pub disgust: usize,
    pub fear: usize,
    pub joy: usize,
    pub neutral: usize,
    pub sadness: usize,
    pub surprise: usize,
}

impl SentimentBreakdown {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut breakdown = Self::default();
        for label in labels {
            breakdown.record(label);
        }
        breakdown
    }

    pub fn record(&mut self, label: &str) {
        if let Some(sentiment) = Sentiment::from_label(label) {
            *self.slot(sentiment) += 1;
        }
    }

    pub fn count(&self, sentiment: Sentiment) -> usize {
        match sentiment {
            Sentiment::Anger => self.anger,
            Sentiment::Disgust => self.disgust,
            Sentiment::Fear => self.fear,
            Sentiment::Joy => self.joy,
            Sentiment::Neutral => self.neutral,
            Sentiment::Sadness => self.sadness,
            Sentiment::Surprise => self.surprise,
        }
    }

    pub fn total(&self) -> usize {
        Sentiment::ALL.iter().map(|s| self.count(*s)).sum()
    }

    fn slot(&mut self, sentiment: Sentiment) -> &mut usize {
        match sentiment {
            Sentiment::Anger => &mut self.anger,
            Sentiment::Disgust => &mut self.disgust,
            Sentiment::Fear => &mut self.fear,
            Sentiment::Joy => &mut self.joy,
            Sentiment::Neutral => &mut self.neutral,
            Sentiment::Sadness => &mut self.sadness,
            Sentiment::Surprise => &mut self.surprise,
        }
    }
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    sentiment: String,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<Value>,
}

/// Free-text sentiment and the user's past analyses.
pub struct SentimentAnalysis {
    api: ApiClient,
    analyze: FormSlot,
    history: FormSlot,
}

impl SentimentAnalysis {
    pub fn new(api: ApiClient) -> Self {
        Self {
            analyze: FormSlot::new("sentiment", api.events_handle()),
            history: FormSlot::new("analysis-history", api.events_handle()),
            api,
        }
    }

    /// Returns the label the backend assigned, as sent.
    pub async fn analyze(&self, text: &str) -> Result<String, AnalysisError> {
        let sentiment = self
            .analyze
            .submit(&ANALYZE_NOTICES, async {
                if text.trim().is_empty() {
                    return Err(AnalysisError::validation(
                        "Please enter some text to analyze.",
                    ));
                }
                let response: AnalyzeResponse = self
                    .api
                    .post_json(&ANALYZE_SENTIMENT, &AnalyzeRequest { text })
                    .await?;
                Ok(response.sentiment)
            })
            .await?;

        events::toast(self.api.events(), "Sentiment analyzed successfully!", ToastKind::Success);
        Ok(sentiment)
    }

    pub async fn history(&self) -> Result<Vec<Value>, AnalysisError> {
        let history = self
            .history
            .submit(&HISTORY_NOTICES, async {
                let response: HistoryResponse = self.api.get_json(&ANALYSIS_HISTORY).await?;
                Ok(response.history)
            })
            .await?;

        events::toast(
            self.api.events(),
            "Analysis history loaded successfully!",
            ToastKind::Success,
        );
        Ok(history)
    }
}
