use serde_json::Value;
use tauri::State;

use crate::{
    analysis::{
        CommentView, ContactDraft, GoogleLoginOutcome, ProcessedVideo, RedditReport, SignupForm,
    },
    session::SessionSnapshot,
    AppState,
};

#[tauri::command]
pub async fn login(
    state: State<'_, AppState>,
    credential: String,
    password: String,
) -> Result<(), String> {
    state
        .auth
        .login(&credential, &password)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn register(state: State<'_, AppState>, form: SignupForm) -> Result<(), String> {
    state.auth.register(&form).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn google_login(
    state: State<'_, AppState>,
    access_token: String,
) -> Result<GoogleLoginOutcome, String> {
    state
        .auth
        .google_login(&access_token)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn google_signup(
    state: State<'_, AppState>,
    access_token: String,
    email: Option<String>,
    username: String,
    password: String,
) -> Result<(), String> {
    state
        .auth
        .google_signup(&access_token, email.as_deref(), &username, &password)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn forgot_password(state: State<'_, AppState>, email: String) -> Result<(), String> {
    state
        .auth
        .forgot_password(&email)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn reset_password(
    state: State<'_, AppState>,
    token: String,
    new_password: String,
    confirm_password: String,
) -> Result<(), String> {
    state
        .auth
        .reset_password(&token, &new_password, &confirm_password)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn logout(state: State<'_, AppState>) -> Result<(), String> {
    // Leaving the session also ends any live detection.
    state
        .detection
        .stop_detection()
        .await
        .map_err(|e| e.to_string())?;
    state.session.logout();
    Ok(())
}

#[tauri::command]
pub fn get_session(state: State<'_, AppState>) -> SessionSnapshot {
    state.session.snapshot()
}

#[tauri::command]
pub fn get_user(state: State<'_, AppState>) -> Option<Value> {
    state.session.user()
}

#[tauri::command]
pub async fn sync_session(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    state.session.sync_from_storage().map_err(|e| e.to_string())?;
    Ok(state.session.snapshot())
}

#[tauri::command]
pub async fn detect_image(
    state: State<'_, AppState>,
    path: String,
) -> Result<Vec<String>, String> {
    let bytes = tokio::fs::read(&path).await.map_err(|e| e.to_string())?;
    state
        .media
        .detect_image(&bytes)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn detect_video(
    state: State<'_, AppState>,
    path: String,
) -> Result<ProcessedVideo, String> {
    let bytes = tokio::fs::read(&path).await.map_err(|e| e.to_string())?;
    state
        .media
        .detect_video(&bytes)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn analyze_sentiment(state: State<'_, AppState>, text: String) -> Result<String, String> {
    state
        .sentiment
        .analyze(&text)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_analysis_history(state: State<'_, AppState>) -> Result<Vec<Value>, String> {
    state.sentiment.history().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn fetch_youtube_comments(
    state: State<'_, AppState>,
    url: String,
) -> Result<CommentView, String> {
    state.youtube.fetch(&url).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn set_max_comments(state: State<'_, AppState>, max_comments: usize) -> CommentView {
    state.youtube.set_max_comments(max_comments)
}

#[tauri::command]
pub async fn fetch_reddit_comments(
    state: State<'_, AppState>,
    url: String,
) -> Result<RedditReport, String> {
    state.reddit.fetch(&url).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_contact_draft(state: State<'_, AppState>) -> ContactDraft {
    state.contact.draft()
}

#[tauri::command]
pub async fn send_contact(state: State<'_, AppState>, draft: ContactDraft) -> Result<(), String> {
    state.contact.send(draft).await.map_err(|e| e.to_string())
}
