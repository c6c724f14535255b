use crate::domain::model::RecognizedText;
use crate::domain::ports::OcrEngine;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// An OCR service reached over HTTP (an EasyOCR or PaddleOCR sidecar, for example).
///
/// The raw image is POSTed as `application/octet-stream`.
pub struct HttpOcrEngine {
    endpoint: String,
    client: Client,
}

impl HttpOcrEngine {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BoxShape {
    Points(Vec<[f32; 2]>),
    /// left, top, right, bottom
    Corners([f32; 4]),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponseItem {
    Object {
        #[serde(alias = "box")]
        bbox: BoxShape,
        text: String,
        #[serde(alias = "conf")]
        confidence: f32,
    },
    /// EasyOCR `readtext` output: `[bbox, text, confidence]`.
    Triple(BoxShape, String, f32),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OcrResponse {
    Bare(Vec<ResponseItem>),
    Wrapped { results: Vec<ResponseItem> },
}

impl BoxShape {
    fn into_bbox(self) -> Option<[[f32; 2]; 4]> {
        match self {
            BoxShape::Points(points) if points.len() == 4 => {
                Some([points[0], points[1], points[2], points[3]])
            }
            BoxShape::Points(points) if !points.is_empty() => {
                let xs = points.iter().map(|p| p[0]);
                let ys = points.iter().map(|p| p[1]);
                let left = xs.clone().fold(f32::INFINITY, f32::min);
                let right = xs.fold(f32::NEG_INFINITY, f32::max);
                let top = ys.clone().fold(f32::INFINITY, f32::min);
                let bottom = ys.fold(f32::NEG_INFINITY, f32::max);
                Some([[left, top], [right, top], [right, bottom], [left, bottom]])
            }
            BoxShape::Points(_) => None,
            BoxShape::Corners([left, top, right, bottom]) => {
                Some([[left, top], [right, top], [right, bottom], [left, bottom]])
            }
        }
    }
}

/// Parse the JSON body returned by an OCR service.
pub fn parse_response(body: &str) -> Result<Vec<RecognizedText>> {
    let response: OcrResponse = serde_json::from_str(body).map_err(|e| EtlError::OcrError {
        engine: "http".to_string(),
        message: format!("unrecognized response format: {}", e),
    })?;

    let items = match response {
        OcrResponse::Bare(items) => items,
        OcrResponse::Wrapped { results } => results,
    };

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let (shape, text, confidence) = match item {
                ResponseItem::Object {
                    bbox,
                    text,
                    confidence,
                } => (bbox, text, confidence),
                ResponseItem::Triple(bbox, text, confidence) => (bbox, text, confidence),
            };
            let bbox = shape.into_bbox()?;
            Some(RecognizedText::new(bbox, text, confidence))
        })
        .collect())
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn recognize(&self, image: &[u8]) -> Result<Vec<RecognizedText>> {
        tracing::debug!("📡 Sending {} bytes to OCR service: {}", image.len(), self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("📡 OCR service response status: {}", status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::OcrError {
                engine: "http".to_string(),
                message: format!("service returned {}: {}", status, body.trim()),
            });
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_easyocr_triples() {
        let body = r#"[
            [[[10, 20], [110, 20], [110, 40], [10, 40]], "Họ và tên", 0.93],
            [[[10, 50], [200, 50], [200, 70], [10, 70]], "NGUYỄN VĂN AN", 0.88]
        ]"#;
        let items = parse_response(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "Họ và tên");
        assert_eq!(items[1].top(), 50.0);
        assert!((items[1].confidence - 0.88).abs() < 1e-6);
    }

    #[test]
    fn test_parse_objects_with_aliases() {
        let body = r#"{"results": [
            {"box": [5, 6, 50, 20], "text": "Số", "conf": 0.7},
            {"bbox": [[1, 2], [9, 2], [9, 8]], "text": "001203004567", "confidence": 0.99}
        ]}"#;
        let items = parse_response(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].bbox[2], [50.0, 20.0]);
        assert_eq!(items[1].bbox[3], [1.0, 8.0]);
    }

    #[test]
    fn test_parse_rejects_unknown_shape() {
        assert!(parse_response(r#"{"text": "x"}"#).is_err());
    }
}
