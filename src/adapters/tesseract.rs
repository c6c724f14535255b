use crate::domain::model::RecognizedText;
use crate::domain::ports::OcrEngine;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const DEFAULT_LANGUAGES: &str = "vie+eng";
/// Sparse text: card fields are scattered across the face.
pub const DEFAULT_PSM: u8 = 11;

/// Runs the `tesseract` binary, image on stdin and TSV on stdout.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: String,
    languages: String,
    psm: u8,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<String>, languages: impl Into<String>, psm: u8) -> Self {
        Self {
            binary: binary.into(),
            languages: languages.into(),
            psm,
        }
    }

    fn error(&self, message: impl Into<String>) -> EtlError {
        EtlError::OcrError {
            engine: "tesseract".to_string(),
            message: message.into(),
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract", DEFAULT_LANGUAGES, DEFAULT_PSM)
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &[u8]) -> Result<Vec<RecognizedText>> {
        let psm = self.psm.to_string();
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.languages, "--psm", &psm, "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.error(format!("failed to start '{}': {}", self.binary, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.error("stdin was not captured"))?;
        let data = image.to_vec();
        // written from a task so a full stdout pipe cannot block the write
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&data).await;
            drop(stdin);
            result
        });

        let output = child.wait_with_output().await?;
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("tesseract closed stdin early: {}", e),
            Err(e) => tracing::debug!("stdin writer task failed: {}", e),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.error(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let lines = parse_tsv(&tsv);
        tracing::debug!("tesseract returned {} lines", lines.len());
        Ok(lines)
    }
}

struct LineAccumulator {
    words: Vec<String>,
    confidence_sum: f32,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

/// Group word rows of a Tesseract TSV report into lines.
///
/// Line confidence is the mean word confidence scaled to `0..=1`.
pub fn parse_tsv(tsv: &str) -> Vec<RecognizedText> {
    let mut lines: BTreeMap<(u32, u32, u32, u32), LineAccumulator> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 12 || columns[0] != "5" {
            continue;
        }
        let text = columns[11..].join("\t");
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let number = |index: usize| columns[index].trim().parse::<f32>().ok();
        let (Some(left), Some(top), Some(width), Some(height), Some(conf)) =
            (number(6), number(7), number(8), number(9), number(10))
        else {
            continue;
        };
        if conf < 0.0 {
            continue;
        }

        let id = |index: usize| columns[index].trim().parse::<u32>().unwrap_or(0);
        let key = (id(1), id(2), id(3), id(4));

        let line = lines.entry(key).or_insert_with(|| LineAccumulator {
            words: Vec::new(),
            confidence_sum: 0.0,
            left: f32::INFINITY,
            top: f32::INFINITY,
            right: f32::NEG_INFINITY,
            bottom: f32::NEG_INFINITY,
        });
        line.words.push(text.to_string());
        line.confidence_sum += conf;
        line.left = line.left.min(left);
        line.top = line.top.min(top);
        line.right = line.right.max(left + width);
        line.bottom = line.bottom.max(top + height);
    }

    lines
        .into_values()
        .map(|line| {
            let confidence = line.confidence_sum / line.words.len() as f32 / 100.0;
            RecognizedText::from_rect(
                line.left,
                line.top,
                line.right - line.left,
                line.bottom - line.top,
                line.words.join(" "),
                confidence.clamp(0.0, 1.0),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t800\t500\t-1\t
4\t1\t1\t1\t1\t0\t40\t30\t300\t20\t-1\t
5\t1\t1\t1\t1\t1\t40\t30\t60\t20\t96.5\tHọ
5\t1\t1\t1\t1\t2\t105\t31\t40\t19\t91.5\tvà
5\t1\t1\t1\t1\t3\t150\t30\t50\t22\t90\ttên
5\t1\t2\t1\t1\t1\t40\t70\t200\t24\t80\tNGUYỄN
5\t1\t2\t1\t1\t2\t250\t70\t90\t24\t70\tVĂN
5\t1\t2\t1\t1\t3\t345\t70\t60\t24\t-1\t
5\t1\t3\t1\t1\t1\t40\t120\t60\t24\t40\t
";

    #[test]
    fn test_parse_tsv_groups_words_into_lines() {
        let lines = parse_tsv(TSV);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Họ và tên");
        assert!((lines[0].confidence - 0.926_666).abs() < 1e-3);
        assert_eq!(lines[0].left(), 40.0);
        assert_eq!(lines[0].top(), 30.0);
        assert_eq!(lines[0].bbox[2], [200.0, 52.0]);

        assert_eq!(lines[1].text, "NGUYỄN VĂN");
        assert!((lines[1].confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_parse_tsv_ignores_garbage() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv("header only\nnot\ta\trow").is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_ocr_error() {
        let engine = TesseractEngine::new("/nonexistent/tesseract-binary", "vie", 6);
        let err = engine.recognize(b"png").await.unwrap_err();
        assert!(matches!(err, EtlError::OcrError { .. }));
    }

    #[cfg(unix)]
    fn stand_in_binary(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-tesseract");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_recognize_pipes_image_and_parses_report() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.tsv"), TSV).unwrap();
        let script = concat!(
            "dir=$(dirname \"$0\")\n",
            "echo \"$@\" > \"$dir/args.txt\"\n",
            "cat > \"$dir/stdin.bin\"\n",
            "cat \"$dir/report.tsv\""
        );
        let engine = TesseractEngine::new(stand_in_binary(dir.path(), script), "vie+eng", 11);

        let lines = engine.recognize(b"fake png bytes").await.unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].text, "NGUYỄN VĂN");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("args.txt")).unwrap().trim(),
            "stdin stdout -l vie+eng --psm 11 tsv"
        );
        assert_eq!(std::fs::read(dir.path().join("stdin.bin")).unwrap(), b"fake png bytes");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_an_ocr_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = "cat > /dev/null\necho 'Failed loading language vie' >&2\nexit 1";
        let engine = TesseractEngine::new(stand_in_binary(dir.path(), script), "vie", 6);

        let err = engine.recognize(b"png").await.unwrap_err();

        match err {
            EtlError::OcrError { engine, message } => {
                assert_eq!(engine, "tesseract");
                assert!(message.contains("Failed loading language vie"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
