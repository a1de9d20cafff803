use tauri::State;

use crate::{
    detection::{DetectionController, DetectionSnapshot},
    AppState,
};

fn controller_from_state(state: &State<'_, AppState>) -> DetectionController {
    state.detection.clone()
}

#[tauri::command]
pub async fn get_detection_state(state: State<'_, AppState>) -> Result<DetectionSnapshot, String> {
    Ok(controller_from_state(&state).snapshot())
}

#[tauri::command]
pub async fn start_detection(state: State<'_, AppState>) -> Result<DetectionSnapshot, String> {
    let controller = controller_from_state(&state);
    controller
        .start_detection()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn stop_detection(state: State<'_, AppState>) -> Result<(), String> {
    let controller = controller_from_state(&state);
    controller.stop_detection().await.map_err(|e| e.to_string())
}
