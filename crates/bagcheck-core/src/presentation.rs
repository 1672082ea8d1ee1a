//! Presentation of inspection outcomes
//!
//! Every outcome, good or bad, ends up as one short markdown message. Error
//! details are logged for operators; users only see the generic wording.

use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use bagcheck_vision::JpegCodec;

use crate::inspection::{InspectionError, InspectionVerdict, Inspector};

pub const UPLOAD_PROMPT: &str = "Please upload an image.";
pub const IMAGE_ERROR_MESSAGE: &str = "Error: Could not process image.";
pub const PARSE_ERROR_MESSAGE: &str =
    "Error: Failed to parse AI response. The response may be malformed or truncated. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    Acceptable,
    NotAcceptable,
    NoImage,
    ImageError,
    ParseError,
    Error,
}

/// What the page shows for one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayResult {
    pub kind: DisplayKind,
    pub markdown: String,
}

impl DisplayResult {
    pub(crate) fn new(kind: DisplayKind, markdown: impl Into<String>) -> Self {
        Self {
            kind,
            markdown: markdown.into(),
        }
    }

    pub fn is_verdict(&self) -> bool {
        matches!(self.kind, DisplayKind::Acceptable | DisplayKind::NotAcceptable)
    }
}

pub fn present(outcome: &Result<InspectionVerdict, InspectionError>) -> DisplayResult {
    match outcome {
        Ok(verdict) => {
            let (kind, status) = if verdict.is_acceptable() {
                (DisplayKind::Acceptable, "✅ ACCEPTABLE")
            } else {
                (DisplayKind::NotAcceptable, "❌ NOT ACCEPTABLE")
            };
            DisplayResult::new(
                kind,
                format!("## **{}**\n\n**Reason:** {}", status, verdict.reason()),
            )
        }
        Err(InspectionError::NoImageProvided) => {
            DisplayResult::new(DisplayKind::NoImage, UPLOAD_PROMPT)
        }
        Err(InspectionError::ImageEncode(_)) => {
            DisplayResult::new(DisplayKind::ImageError, IMAGE_ERROR_MESSAGE)
        }
        Err(InspectionError::JsonParse { .. }) => {
            DisplayResult::new(DisplayKind::ParseError, PARSE_ERROR_MESSAGE)
        }
        Err(e) => DisplayResult::new(DisplayKind::Error, format!("An error occurred: {}", e)),
    }
}

/// Handle one submission end to end: encode, inspect once, present.
///
/// A missing or empty upload returns the upload prompt without touching the
/// codec or the inspector.
pub async fn analyze(
    inspector: &dyn Inspector,
    codec: JpegCodec,
    upload: Option<Vec<u8>>,
) -> DisplayResult {
    let request_id = Uuid::new_v4();
    let span = info_span!("inspection", %request_id);

    let outcome = run(inspector, codec, upload).instrument(span.clone()).await;

    let _guard = span.enter();
    match &outcome {
        Ok(verdict) => info!(acceptable = verdict.is_acceptable(), "Inspection complete"),
        Err(InspectionError::NoImageProvided) => info!("Submission had no image"),
        Err(InspectionError::JsonParse { detail, .. }) => {
            warn!("JSON Decode Error: {}", detail)
        }
        Err(e) => error!("Inspection failed: {}", e),
    }

    present(&outcome)
}

async fn run(
    inspector: &dyn Inspector,
    codec: JpegCodec,
    upload: Option<Vec<u8>>,
) -> Result<InspectionVerdict, InspectionError> {
    let bytes = match upload {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Err(InspectionError::NoImageProvided),
    };

    info!("Encoding {} byte upload", bytes.len());
    let encoded = tokio::task::spawn_blocking(move || codec.encode_upload(&bytes))
        .await
        .map_err(|e| InspectionError::Worker(e.to_string()))??;

    inspector.inspect(&encoded).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Inspector returning canned outcomes and counting calls
    struct ScriptedInspector {
        calls: AtomicUsize,
        reply: fn() -> Result<InspectionVerdict, InspectionError>,
        seen: Mutex<Option<String>>,
    }

    impl ScriptedInspector {
        fn new(reply: fn() -> Result<InspectionVerdict, InspectionError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply,
                seen: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Inspector for ScriptedInspector {
        async fn inspect(&self, image_base64: &str) -> Result<InspectionVerdict, InspectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = Some(image_base64.to_string());
            (self.reply)()
        }
    }

    fn png_upload() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([180, 180, 190])));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png
    }

    #[test]
    fn test_present_acceptable() {
        let result = present(&Ok(InspectionVerdict::new(true, "Clean and intact.")));
        assert_eq!(result.kind, DisplayKind::Acceptable);
        assert_eq!(
            result.markdown,
            "## **✅ ACCEPTABLE**\n\n**Reason:** Clean and intact."
        );
        assert!(result.is_verdict());
    }

    #[test]
    fn test_present_not_acceptable() {
        let result = present(&Ok(InspectionVerdict::new(
            false,
            "Visible food residue inside lining.",
        )));
        assert_eq!(result.kind, DisplayKind::NotAcceptable);
        assert!(result.markdown.contains("NOT ACCEPTABLE"));
        assert!(result.markdown.contains("Visible food residue inside lining."));
    }

    #[test]
    fn test_present_errors() {
        assert_eq!(
            present(&Err(InspectionError::NoImageProvided)).markdown,
            UPLOAD_PROMPT
        );
        assert_eq!(
            present(&Err(InspectionError::JsonParse {
                detail: "expected value".to_string(),
                raw: "not json".to_string(),
            })),
            DisplayResult::new(DisplayKind::ParseError, PARSE_ERROR_MESSAGE)
        );

        let result = present(&Err(InspectionError::Transport(
            "connection refused".to_string(),
        )));
        assert_eq!(result.kind, DisplayKind::Error);
        assert!(result.markdown.starts_with("An error occurred: "));
        assert!(result.markdown.contains("connection refused"));
        assert!(!result.is_verdict());
    }

    #[test]
    fn test_parse_error_hides_raw_text() {
        let result = present(&Err(InspectionError::JsonParse {
            detail: "trailing characters".to_string(),
            raw: "SECRET INTERNAL OUTPUT".to_string(),
        }));
        assert!(!result.markdown.contains("SECRET INTERNAL OUTPUT"));
    }

    #[tokio::test]
    async fn test_analyze_without_image_skips_inspector() {
        let inspector = ScriptedInspector::new(|| Ok(InspectionVerdict::new(true, "Fine.")));

        let none = analyze(&inspector, JpegCodec::default(), None).await;
        let empty = analyze(&inspector, JpegCodec::default(), Some(Vec::new())).await;

        assert_eq!(none.markdown, UPLOAD_PROMPT);
        assert_eq!(empty.kind, DisplayKind::NoImage);
        assert_eq!(inspector.calls(), 0);
    }

    #[tokio::test]
    async fn test_analyze_acceptable_upload() {
        let inspector =
            ScriptedInspector::new(|| Ok(InspectionVerdict::new(true, "Clean and intact.")));

        let result = analyze(&inspector, JpegCodec::default(), Some(png_upload())).await;

        assert_eq!(result.kind, DisplayKind::Acceptable);
        assert!(result.markdown.contains("Clean and intact."));
        assert_eq!(inspector.calls(), 1);

        let sent = inspector.seen.lock().unwrap().clone().unwrap();
        assert!(sent.starts_with("/9j/"), "payload should be base64 JPEG");
    }

    #[tokio::test]
    async fn test_analyze_undecodable_upload() {
        let inspector = ScriptedInspector::new(|| Ok(InspectionVerdict::new(true, "Fine.")));

        let result = analyze(
            &inspector,
            JpegCodec::default(),
            Some(b"GIF89a but not really".to_vec()),
        )
        .await;

        assert_eq!(result.markdown, IMAGE_ERROR_MESSAGE);
        assert_eq!(inspector.calls(), 0);
    }

    #[tokio::test]
    async fn test_analyze_malformed_reply_is_never_acceptable() {
        let inspector = ScriptedInspector::new(|| {
            Err(InspectionError::JsonParse {
                detail: "expected value at line 1 column 1".to_string(),
                raw: "The bag is fine".to_string(),
            })
        });

        let result = analyze(&inspector, JpegCodec::default(), Some(png_upload())).await;

        assert_eq!(result.kind, DisplayKind::ParseError);
        assert_eq!(result.markdown, PARSE_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_analyze_transport_failure_single_attempt() {
        let inspector = ScriptedInspector::new(|| {
            Err(InspectionError::Transport(
                "error sending request for url (https://api.openai.com/v1/chat/completions)"
                    .to_string(),
            ))
        });

        let result = analyze(&inspector, JpegCodec::default(), Some(png_upload())).await;

        assert_eq!(result.kind, DisplayKind::Error);
        assert!(result.markdown.contains("error sending request"));
        assert_eq!(inspector.calls(), 1);
    }

    #[tokio::test]
    async fn test_analyze_repeated_calls_keep_shape() {
        let inspector =
            ScriptedInspector::new(|| Ok(InspectionVerdict::new(false, "Torn insulation.")));
        let upload = png_upload();

        let first = analyze(&inspector, JpegCodec::default(), Some(upload.clone())).await;
        let second = analyze(&inspector, JpegCodec::default(), Some(upload)).await;

        assert_eq!(first.kind, second.kind);
        assert_eq!(first.kind, DisplayKind::NotAcceptable);
        assert_eq!(inspector.calls(), 2);
    }
}
