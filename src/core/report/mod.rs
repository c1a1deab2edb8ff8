//! Sentiment report generation.
//!
//! A report is a Markdown document built from a check-in's aggregated data.
//! The narrative section comes from Gemini when an API key is configured and
//! from a local template otherwise. Reports are stored through the
//! [`CheckinRepository`] and served from `/reports/{filename}`.

mod gemini;
mod template;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::aggregation::{DataSummary, TOP_EMOTION_LIMIT, rank_top_emotions};
use crate::core::emotion::{EmotionSource, EmotionVector};
use crate::core::storage::{CheckinRepository, StorageError};

pub use gemini::{GEMINI_DEFAULT_BASE_URL, GEMINI_DEFAULT_MODEL, GeminiClient, GeminiConfig};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("No data points to report on")]
    EmptyData,

    /// The narrative provider failed
    #[error("Report generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One point of the report timeline. Only the label and the scores are
/// required, so raw store exports and trimmed client payloads both work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDataPoint {
    pub timestamp: String,
    #[serde(default)]
    pub source: Option<EmotionSource>,
    #[serde(default)]
    pub emotions: EmotionVector,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub data_points: Vec<ReportDataPoint>,
    #[serde(default)]
    pub summary: Option<DataSummary>,
    #[serde(default)]
    pub transcript: Option<String>,
}

impl ReportRequest {
    /// The caller's summary, or one derived from the data points.
    pub fn effective_summary(&self) -> DataSummary {
        if let Some(summary) = &self.summary {
            return summary.clone();
        }
        DataSummary {
            total_points: self.data_points.len(),
            duration: 0,
            top_emotions: rank_top_emotions(
                self.data_points.iter().map(|p| &p.emotions),
                TOP_EMOTION_LIMIT,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    pub success: bool,
    pub pdf_url: String,
    pub filename: String,
}

/// Report filename: `sentiment-report-{patient}-{id}.md` with the patient id
/// reduced to `[A-Za-z0-9_-]`.
pub fn report_filename(patient_id: Option<&str>) -> String {
    let patient: String = patient_id
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect();
    let patient = if patient.is_empty() {
        "anonymous".to_string()
    } else {
        patient
    };
    let id = Uuid::new_v4().simple().to_string();
    format!("sentiment-report-{patient}-{}.md", &id[..8])
}

#[derive(Debug, Clone)]
pub struct ReportGenerator {
    gemini: Option<GeminiClient>,
    repository: CheckinRepository,
}

impl ReportGenerator {
    pub fn new(repository: CheckinRepository, gemini: Option<GeminiClient>) -> Self {
        Self { gemini, repository }
    }

    pub fn uses_gemini(&self) -> bool {
        self.gemini.is_some()
    }

    pub async fn generate(&self, request: &ReportRequest) -> Result<GeneratedReport, ReportError> {
        if request.data_points.is_empty() {
            return Err(ReportError::EmptyData);
        }

        let summary = request.effective_summary();
        let narrative = match &self.gemini {
            Some(gemini) => {
                let prompt = template::analysis_prompt(request, &summary);
                gemini.generate(&prompt).await?
            }
            None => {
                warn!("Gemini not configured, using template narrative");
                template::fallback_narrative(&summary)
            }
        };

        let document = template::render_report(request, &summary, &narrative);
        let filename = report_filename(request.patient_id.as_deref());
        self.repository
            .save_report(&filename, Bytes::from(document))
            .await?;

        info!(
            "Generated report {filename} from {} data points",
            request.data_points.len()
        );

        Ok(GeneratedReport {
            success: true,
            pdf_url: format!("/reports/{filename}"),
            filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::emotion::EmotionSample;

    fn point(label: &str, pairs: &[(&str, f64)]) -> ReportDataPoint {
        ReportDataPoint {
            timestamp: label.to_string(),
            source: Some(EmotionSource::Facial),
            emotions: pairs
                .iter()
                .map(|(n, s)| EmotionSample::new(*n, *s))
                .collect::<Vec<_>>()
                .into(),
        }
    }

    #[test]
    fn test_report_filename() {
        let name = report_filename(Some("pt/../42"));
        assert!(name.starts_with("sentiment-report-pt42-"));
        assert!(name.ends_with(".md"));
        assert_eq!(name.len(), "sentiment-report-pt42-".len() + 8 + 3);

        assert!(report_filename(None).starts_with("sentiment-report-anonymous-"));
    }

    #[test]
    fn test_effective_summary_is_derived_when_missing() {
        let request = ReportRequest {
            data_points: vec![
                point("00:00:01", &[("Joy", 0.6)]),
                point("00:00:02", &[("Joy", 0.4), ("Sadness", 0.2)]),
            ],
            ..Default::default()
        };
        let summary = request.effective_summary();
        assert_eq!(summary.total_points, 2);
        assert_eq!(summary.top_emotions[0].name, "Joy");
    }

    #[tokio::test]
    async fn test_template_report_is_stored() {
        let repository = CheckinRepository::in_memory();
        let generator = ReportGenerator::new(repository.clone(), None);
        let request = ReportRequest {
            patient_id: Some("p1".into()),
            data_points: vec![point("00:00:01", &[("Calmness", 0.7)])],
            transcript: Some("Patient: fine".into()),
            ..Default::default()
        };

        let report = generator.generate(&request).await.unwrap();
        assert!(report.success);
        assert_eq!(report.pdf_url, format!("/reports/{}", report.filename));

        let body = repository.load_report(&report.filename).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Calmness"));
        assert!(text.contains("Patient: fine"));
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected() {
        let generator = ReportGenerator::new(CheckinRepository::in_memory(), None);
        assert!(matches!(
            generator.generate(&ReportRequest::default()).await,
            Err(ReportError::EmptyData)
        ));
    }
}
