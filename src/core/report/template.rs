//! Markdown rendering and prompt construction for reports.

use std::fmt::Write as _;

use super::ReportRequest;
use crate::core::aggregation::DataSummary;
use crate::core::session::submission::rfc3339_now;

/// Timeline rows included in the document and the prompt.
const MAX_TIMELINE_ROWS: usize = 60;

pub(super) fn analysis_prompt(request: &ReportRequest, summary: &DataSummary) -> String {
    let mut prompt = String::from(
        "You are assisting a clinician reviewing a patient's telehealth check-in. \
         Using the emotion analysis below, write a concise clinical sentiment summary \
         in Markdown with the sections: Overview, Emotional Patterns, Notable Moments, \
         Suggested Follow-up. Do not invent data that is not present.\n\n",
    );

    let _ = writeln!(prompt, "Data points: {}", summary.total_points);
    let _ = writeln!(prompt, "Duration: {} seconds", summary.duration / 1000);
    prompt.push_str("Top emotions (average score, appearances):\n");
    for emotion in &summary.top_emotions {
        let _ = writeln!(
            prompt,
            "- {}: {:.3} ({})",
            emotion.name, emotion.average_score, emotion.count
        );
    }

    prompt.push_str("\nTimeline (elapsed, source, strongest emotions):\n");
    for point in request.data_points.iter().take(MAX_TIMELINE_ROWS) {
        let top: Vec<String> = point
            .emotions
            .top(3)
            .into_iter()
            .map(|s| format!("{} {:.2}", s.name, s.score))
            .collect();
        let source = point.source.map(|s| s.as_str()).unwrap_or("unknown");
        let _ = writeln!(prompt, "- {} [{}] {}", point.timestamp, source, top.join(", "));
    }

    if let Some(transcript) = request.transcript.as_deref().filter(|t| !t.trim().is_empty()) {
        prompt.push_str("\nTranscript:\n");
        prompt.push_str(transcript);
        prompt.push('\n');
    }
    prompt
}

pub(super) fn fallback_narrative(summary: &DataSummary) -> String {
    let Some(top) = summary.top_emotions.first() else {
        return "No emotional signals were captured during this check-in.".to_string();
    };

    let mut text = format!(
        "Across {} readings the most prominent emotion was **{}** \
         (average score {:.2}, observed {} times).",
        summary.total_points, top.name, top.average_score, top.count
    );
    let others: Vec<&str> = summary
        .top_emotions
        .iter()
        .skip(1)
        .map(|e| e.name.as_str())
        .collect();
    if !others.is_empty() {
        let _ = write!(text, " Other recurring signals: {}.", others.join(", "));
    }
    text.push_str(
        "\n\nThis summary was generated automatically from aggregated scores and \
         should be reviewed by a clinician.",
    );
    text
}

pub(super) fn render_report(
    request: &ReportRequest,
    summary: &DataSummary,
    narrative: &str,
) -> String {
    let mut doc = String::from("# Patient Sentiment Report\n\n");
    let _ = writeln!(
        doc,
        "- **Patient:** {}",
        request.patient_id.as_deref().unwrap_or("Anonymous")
    );
    let _ = writeln!(doc, "- **Generated:** {}", rfc3339_now());
    let _ = writeln!(doc, "- **Data points:** {}", summary.total_points);
    let _ = writeln!(doc, "- **Duration:** {}s\n", summary.duration / 1000);

    doc.push_str("## Top Emotions\n\n| Emotion | Average score | Count |\n|---|---|---|\n");
    for emotion in &summary.top_emotions {
        let _ = writeln!(
            doc,
            "| {} | {:.3} | {} |",
            emotion.name, emotion.average_score, emotion.count
        );
    }

    doc.push_str("\n## Analysis\n\n");
    doc.push_str(narrative.trim());
    doc.push_str("\n\n## Timeline\n\n| Time | Source | Dominant emotion |\n|---|---|---|\n");
    for point in request.data_points.iter().take(MAX_TIMELINE_ROWS) {
        let dominant = point
            .emotions
            .dominant()
            .map(|s| format!("{} ({:.2})", s.name, s.score))
            .unwrap_or_else(|| "-".to_string());
        let source = point.source.map(|s| s.as_str()).unwrap_or("-");
        let _ = writeln!(doc, "| {} | {} | {} |", point.timestamp, source, dominant);
    }
    if request.data_points.len() > MAX_TIMELINE_ROWS {
        let _ = writeln!(
            doc,
            "\n_{} further points omitted._",
            request.data_points.len() - MAX_TIMELINE_ROWS
        );
    }

    if let Some(transcript) = request.transcript.as_deref().filter(|t| !t.trim().is_empty()) {
        doc.push_str("\n## Transcript\n\n");
        for line in transcript.lines() {
            let _ = writeln!(doc, "> {line}");
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregation::EmotionAverage;

    fn summary() -> DataSummary {
        DataSummary {
            total_points: 4,
            duration: 12_000,
            top_emotions: vec![
                EmotionAverage {
                    name: "Joy".into(),
                    average_score: 0.6,
                    count: 3,
                },
                EmotionAverage {
                    name: "Tiredness".into(),
                    average_score: 0.3,
                    count: 1,
                },
            ],
        }
    }

    #[test]
    fn test_fallback_narrative() {
        let text = fallback_narrative(&summary());
        assert!(text.contains("**Joy**"));
        assert!(text.contains("Tiredness"));
        assert!(fallback_narrative(&DataSummary::default()).starts_with("No emotional"));
    }

    #[test]
    fn test_prompt_mentions_summary() {
        let prompt = analysis_prompt(&ReportRequest::default(), &summary());
        assert!(prompt.contains("Data points: 4"));
        assert!(prompt.contains("Duration: 12 seconds"));
        assert!(prompt.contains("- Joy: 0.600 (3)"));
    }
}
