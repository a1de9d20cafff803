use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use log::info;
use serde::{Deserialize, Serialize, Serializer};

use crate::events::{self, ToastKind};

use super::{
    contract::{ApiClient, FlowNotices, FormSlot, DETECT_IMAGE, DETECT_VIDEO},
    AnalysisError,
};

/// File name the processed video is saved under.
pub const PROCESSED_VIDEO_FILE: &str = "processed_video.mp4";

const IMAGE_NOTICES: FlowNotices = FlowNotices::new("Error detecting emotions. Please try again.");
const VIDEO_NOTICES: FlowNotices = FlowNotices::new("Error processing video. Please try again.");

#[derive(Serialize)]
struct ImageRequest<'a> {
    base64_image: &'a str,
}

#[derive(Serialize)]
struct VideoRequest<'a> {
    base64_video: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    emotions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedVideo {
    pub path: PathBuf,
    pub size: usize,
    /// Sent to the webview base64 encoded so it can play the result in place.
    #[serde(serialize_with = "as_base64")]
    pub bytes: Vec<u8>,
}

fn as_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

/// Still-image and video-file emotion detection.
pub struct MediaAnalysis {
    api: ApiClient,
    image: FormSlot,
    video: FormSlot,
    download_dir: PathBuf,
}

impl MediaAnalysis {
    pub fn new(api: ApiClient, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            image: FormSlot::new("image-detection", api.events_handle()),
            video: FormSlot::new("video-detection", api.events_handle()),
            download_dir: download_dir.into(),
            api,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Uploads an image and returns the emotion labels found in it.
    pub async fn detect_image(&self, image: &[u8]) -> Result<Vec<String>, AnalysisError> {
        let emotions = self
            .image
            .submit(&IMAGE_NOTICES, async {
                validate_image(image)?;
                let encoded = STANDARD.encode(image);
                let response: ImageResponse = self
                    .api
                    .post_json(&DETECT_IMAGE, &ImageRequest {
                        base64_image: &encoded,
                    })
                    .await?;
                Ok(response.emotions)
            })
            .await?;

        events::toast(self.api.events(), "Emotions detected successfully!", ToastKind::Success);
        Ok(emotions)
    }

    /// Uploads a video and saves the annotated result to the download
    /// directory. The bytes are returned as well for in-place playback.
    pub async fn detect_video(&self, video: &[u8]) -> Result<ProcessedVideo, AnalysisError> {
        let processed = self
            .video
            .submit(&VIDEO_NOTICES, async {
                if video.is_empty() {
                    return Err(AnalysisError::validation("Please select a video file."));
                }
                let encoded = STANDARD.encode(video);
                let bytes = self
                    .api
                    .post_bytes(&DETECT_VIDEO, &VideoRequest {
                        base64_video: &encoded,
                    })
                    .await?;

                tokio::fs::create_dir_all(&self.download_dir).await?;
                let path = self.download_dir.join(PROCESSED_VIDEO_FILE);
                tokio::fs::write(&path, &bytes).await?;
                info!("processed video saved to {} ({} bytes)", path.display(), bytes.len());

                Ok(ProcessedVideo {
                    path,
                    size: bytes.len(),
                    bytes,
                })
            })
            .await?;

        events::toast(
            self.api.events(),
            "Video processed successfully! Download started.",
            ToastKind::Success,
        );
        Ok(processed)
    }
}

fn validate_image(bytes: &[u8]) -> Result<(), AnalysisError> {
    if bytes.is_empty() {
        return Err(AnalysisError::validation("Please select an image first"));
    }
    image::guess_format(bytes)
        .map(|_| ())
        .map_err(|_| AnalysisError::validation("Please upload an image file"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_image_bytes() {
        assert!(matches!(
            validate_image(b"plain text, not a picture"),
            Err(AnalysisError::Validation(message)) if message == "Please upload an image file"
        ));
        assert!(matches!(validate_image(&[]), Err(AnalysisError::Validation(_))));
    }

    #[test]
    fn accepts_known_image_signatures() {
        let png_header = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert!(validate_image(&png_header).is_ok());
        let jpeg_header = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10];
        assert!(validate_image(&jpeg_header).is_ok());
    }

    #[test]
    fn processed_video_reaches_the_webview_with_its_bytes() {
        let video = ProcessedVideo {
            path: PathBuf::from("/tmp/processed_video.mp4"),
            size: 3,
            bytes: vec![0x00, 0x00, 0x18],
        };
        let json = serde_json::to_value(&video).unwrap();
        assert_eq!(json["bytes"], "AAAY");
        assert_eq!(json["size"], 3);
        assert_eq!(json["path"], "/tmp/processed_video.mp4");
    }
}
