pub mod analysis;
pub mod config;
pub mod detection;
pub mod events;
pub mod session;
pub mod timer;
mod utils;

#[cfg(feature = "desktop")]
use std::{path::PathBuf, sync::Arc};

#[cfg(feature = "desktop")]
use analysis::{
    ApiClient, AuthFlows, ContactForm, MediaAnalysis, RedditComments, SentimentAnalysis,
    YoutubeComments,
};
#[cfg(feature = "desktop")]
use config::AppConfig;
#[cfg(feature = "desktop")]
use detection::{CameraProvider, DetectionController, WsConnector};
#[cfg(feature = "desktop")]
use session::{SessionContext, TokenStore};
#[cfg(feature = "desktop")]
use tauri::Manager;

#[cfg(feature = "desktop")]
pub(crate) struct AppState {
    pub(crate) session: SessionContext,
    pub(crate) detection: DetectionController,
    pub(crate) auth: AuthFlows,
    pub(crate) media: MediaAnalysis,
    pub(crate) sentiment: SentimentAnalysis,
    pub(crate) youtube: YoutubeComments,
    pub(crate) reddit: RedditComments,
    pub(crate) contact: ContactForm,
}

#[cfg(feature = "desktop")]
fn camera_provider() -> Arc<dyn CameraProvider> {
    #[cfg(feature = "camera")]
    {
        Arc::new(detection::camera::NativeCamera::new(0))
    }

    #[cfg(not(feature = "camera"))]
    {
        log::warn!("built without the camera feature; live detection is unavailable");
        Arc::new(detection::camera::NoCamera)
    }
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let config = AppConfig::from_env();

    // Initialize logging (reads RUST_LOG env var)
    let level = if config.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    log::info!("SentiSense starting up against {}", config.host);

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(move |app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let download_dir: PathBuf = app
                    .path()
                    .download_dir()
                    .unwrap_or_else(|_| app_data_dir.clone());

                let events: Arc<dyn events::EventSink> = Arc::new(app.handle().clone());

                let store = TokenStore::new(app_data_dir.join("session.json"))?;
                // Built on the async runtime so a restored token's auto-logout
                // timer runs alongside the commands.
                let session = tauri::async_runtime::block_on({
                    let host = config.host.clone();
                    let auto_logout = config.auto_logout;
                    let events = Arc::clone(&events);
                    async move { SessionContext::new(host, store, auto_logout, events) }
                });

                let api = ApiClient::new(session.clone(), Arc::clone(&events), &config.http)?;

                let detection = DetectionController::new(
                    config.detection.clone(),
                    session.clone(),
                    camera_provider(),
                    Arc::new(WsConnector),
                    Arc::clone(&events),
                );

                app.manage(AppState {
                    auth: AuthFlows::new(api.clone()),
                    media: MediaAnalysis::new(api.clone(), download_dir),
                    sentiment: SentimentAnalysis::new(api.clone()),
                    youtube: YoutubeComments::new(api.clone()),
                    reddit: RedditComments::new(api.clone()),
                    contact: ContactForm::new(api),
                    detection,
                    session,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            analysis::commands::login,
            analysis::commands::register,
            analysis::commands::google_login,
            analysis::commands::google_signup,
            analysis::commands::forgot_password,
            analysis::commands::reset_password,
            analysis::commands::logout,
            analysis::commands::get_session,
            analysis::commands::get_user,
            analysis::commands::sync_session,
            analysis::commands::detect_image,
            analysis::commands::detect_video,
            analysis::commands::analyze_sentiment,
            analysis::commands::get_analysis_history,
            analysis::commands::fetch_youtube_comments,
            analysis::commands::set_max_comments,
            analysis::commands::fetch_reddit_comments,
            analysis::commands::get_contact_draft,
            analysis::commands::send_contact,
            detection::commands::get_detection_state,
            detection::commands::start_detection,
            detection::commands::stop_detection,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
