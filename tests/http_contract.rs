mod common;

use std::sync::Arc;

use common::{session_for, Canned, CannedServer};
use sentisense_lib::{
    analysis::{
        AnalysisError, ApiClient, AuthFlows, ContactDraft, ContactForm, GoogleLoginOutcome,
        MediaAnalysis, RedditComments, Sentiment, SentimentAnalysis, YoutubeComments,
    },
    config::HttpConfig,
    events::{EventLog, REQUEST_STATUS},
};
use serde_json::json;

fn client(server: &CannedServer, dir: &tempfile::TempDir, events: Arc<EventLog>) -> ApiClient {
    let session = session_for(&server.url, dir.path(), events.clone());
    ApiClient::new(session, events, &HttpConfig::default()).unwrap()
}

fn success_toasts(events: &EventLog) -> Vec<String> {
    events
        .toasts()
        .into_iter()
        .filter(|(_, kind)| kind == "success")
        .map(|(message, _)| message)
        .collect()
}

#[tokio::test]
async fn unauthorized_bearer_request_logs_out_without_success_notice() {
    let server = CannedServer::start(vec![(
        "/sentiment/analyze-sentiment",
        Canned::json(401, json!({"detail": "Could not validate credentials"})),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::new());
    let api = client(&server, &dir, events.clone());
    api.session().login("stale-token").unwrap();

    let sentiment = SentimentAnalysis::new(api.clone());
    let result = sentiment.analyze("what a lovely day").await;

    assert!(matches!(result, Err(AnalysisError::Unauthorized)));
    assert!(!api.session().is_authenticated());
    assert!(!api.session().auto_logout_pending());
    assert_eq!(events.routes(), vec!["/login".to_string()]);
    assert!(success_toasts(&events).is_empty());
    assert_eq!(
        events.toasts().last().unwrap().0,
        "Session expired. Please log in again."
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer stale-token"));
    assert_eq!(requests[0].body, json!({"text": "what a lovely day"}));
}

#[tokio::test]
async fn bearer_request_without_token_never_hits_the_network() {
    let server = CannedServer::start(vec![]).await;
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::new());
    let api = client(&server, &dir, events.clone());

    let history = SentimentAnalysis::new(api).history().await;

    assert!(matches!(history, Err(AnalysisError::NotAuthenticated)));
    assert!(server.requests().is_empty());
    assert_eq!(events.routes(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn contact_rate_limit_keeps_the_form() {
    let server = CannedServer::start(vec![(
        "/email/contact",
        Canned::json(429, json!({"detail": "limit"})),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::new());
    let contact = ContactForm::new(client(&server, &dir, events.clone()));

    let draft = ContactDraft {
        name: "Ada".into(),
        email: "ada@example.com".into(),
        message: "Hello there".into(),
    };
    let result = contact.send(draft.clone()).await;

    assert!(matches!(result, Err(AnalysisError::RateLimited)));
    assert_eq!(
        events.toasts(),
        vec![("Too Many requests for today".to_string(), "warning".to_string())]
    );
    assert_eq!(contact.draft(), draft);

    let loading: Vec<bool> = events
        .named(REQUEST_STATUS)
        .iter()
        .map(|payload| payload["loading"].as_bool().unwrap())
        .collect();
    assert_eq!(loading, vec![true, false]);
}

#[tokio::test]
async fn contact_success_resets_the_form() {
    let server = CannedServer::start(vec![(
        "/email/contact",
        Canned::json(200, json!({"message": "sent"})),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::new());
    let contact = ContactForm::new(client(&server, &dir, events.clone()));

    contact
        .send(ContactDraft {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            message: "Hello there".into(),
        })
        .await
        .unwrap();

    assert_eq!(contact.draft(), ContactDraft::default());
    assert_eq!(
        success_toasts(&events),
        vec!["Message sent successfully! You will receive an auto-reply shortly.".to_string()]
    );
    assert_eq!(
        server.requests()[0].body,
        json!({
            "subject": "Message from Ada at Sentiment Sense Contact",
            "email": "ada@example.com",
            "body": "Hello there",
        })
    );
}

#[tokio::test]
async fn processed_video_is_saved_as_opaque_bytes() {
    let processed = [0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', 0xFF, 0x00];
    let server = CannedServer::start(vec![(
        "/emotion/detect-from-video/",
        Canned::bytes(200, "video/mp4", &processed),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::new());
    let media = MediaAnalysis::new(client(&server, &dir, events), downloads.path());

    let video = media.detect_video(b"raw video bytes").await.unwrap();

    assert_eq!(video.bytes, processed);
    assert_eq!(video.path, downloads.path().join("processed_video.mp4"));
    assert_eq!(std::fs::read(&video.path).unwrap(), processed);

    let sent = &server.requests()[0].body;
    assert_eq!(sent["base64_video"], "cmF3IHZpZGVvIGJ5dGVz");
}

#[tokio::test]
async fn image_validation_happens_before_any_request() {
    let server = CannedServer::start(vec![]).await;
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::new());
    let media = MediaAnalysis::new(client(&server, &dir, events.clone()), dir.path());

    let result = media.detect_image(b"definitely not an image").await;

    assert!(matches!(result, Err(AnalysisError::Validation(_))));
    assert!(server.requests().is_empty());
    assert_eq!(events.toasts()[0].0, "Please upload an image file");
}

#[tokio::test]
async fn youtube_breakdown_counts_each_label_once() {
    let labels = ["anger", "disgust", "fear", "joy", "neutral", "sadness", "surprise"];
    let comments: Vec<_> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| json!({"text": format!("comment {i}"), "sentiment": label}))
        .collect();
    let server = CannedServer::start(vec![(
        "/youtube/fetch-comments",
        Canned::json(200, json!({ "comments": comments })),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::new());
    let api = client(&server, &dir, events);
    api.session().login("tok").unwrap();
    let youtube = YoutubeComments::new(api);

    let view = youtube.fetch("https://youtu.be/dQw4w9WgXcQ").await.unwrap();

    assert_eq!(view.video_id.as_deref(), Some("dQw4w9WgXcQ"));
    for sentiment in Sentiment::ALL {
        assert_eq!(view.breakdown.count(sentiment), 1);
    }
    assert_eq!(
        server.requests()[0].body,
        json!({"video_url": "https://youtu.be/dQw4w9WgXcQ"})
    );

    let limited = youtube.set_max_comments(3);
    assert_eq!(limited.comments.len(), 3);
    assert_eq!(limited.breakdown.total(), 3);
    assert_eq!(limited.total_fetched, 7);
}

#[tokio::test]
async fn missing_reddit_post_has_its_own_notice() {
    let server = CannedServer::start(vec![]).await;
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::new());
    let api = client(&server, &dir, events.clone());
    api.session().login("tok").unwrap();

    let result = RedditComments::new(api)
        .fetch("https://www.reddit.com/r/rust/comments/missing")
        .await;

    assert!(matches!(result, Err(AnalysisError::NotFound)));
    assert_eq!(
        events.toasts(),
        vec![(
            "Reddit post not found. Please check the URL.".to_string(),
            "error".to_string()
        )]
    );
}

#[tokio::test]
async fn login_starts_the_session_and_keeps_the_profile() {
    let server = CannedServer::start(vec![(
        "/auth/token",
        Canned::json(
            200,
            json!({"access_token": "fresh", "user": {"username": "ada", "email": "ada@example.com"}}),
        ),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::new());
    let api = client(&server, &dir, events.clone());
    let auth = AuthFlows::new(api.clone());

    auth.login("ada", "Secret1!").await.unwrap();

    assert_eq!(api.session().token().as_deref(), Some("fresh"));
    assert!(api.session().auto_logout_pending());
    assert_eq!(api.session().user().unwrap()["username"], "ada");
    assert_eq!(events.routes(), vec!["/profile".to_string()]);
    assert_eq!(
        server.requests()[0].body,
        json!({"credential": "ada", "password": "Secret1!"})
    );
}

#[tokio::test]
async fn unknown_google_user_is_sent_to_signup() {
    let server = CannedServer::start(vec![(
        "/auth/google-login",
        Canned::json(401, json!({"detail": "User not found"})),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::new());
    let auth = AuthFlows::new(client(&server, &dir, events.clone()));

    let outcome = auth.google_login("google-access-token").await.unwrap();

    assert_eq!(outcome, GoogleLoginOutcome::SignupRequired);
    assert_eq!(events.routes(), vec!["/google-signup".to_string()]);
    assert_eq!(
        events.toasts(),
        vec![(
            "Google User does not exist. Signing up now...".to_string(),
            "warning".to_string()
        )]
    );
}

#[tokio::test]
async fn signup_surfaces_taken_username_from_check() {
    let server = CannedServer::start(vec![(
        "/auth/check-user",
        Canned::json(200, json!({"error": "Username already exists"})),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::new());
    let auth = AuthFlows::new(client(&server, &dir, events.clone()));

    let result = auth
        .register(&sentisense_lib::analysis::SignupForm {
            username: "ada".into(),
            email: "ada@example.com".into(),
            password: "Secret1!".into(),
            confirm_password: "Secret1!".into(),
        })
        .await;

    assert!(matches!(result, Err(AnalysisError::Validation(message)) if message == "Username already exists"));
    let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["/auth/check-user".to_string()]);
}
