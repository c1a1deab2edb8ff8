//! Hume streaming face model message types.
//!
//! ```text
//! Client → Server:
//!   { data: <base64 jpeg>, models: { face: {} }, stream_window_ms, reset_stream }
//!
//! Server → Client:
//!   { face: { predictions: [ { prob, box, emotions: [{name, score}] } ] } }
//!   { face: { warning: "No faces detected.", code: "W0105" } }
//!   { error: "...", code: "E0..." }
//! ```

use serde::{Deserialize, Serialize};

use crate::core::emotion::{BoundingBox, EmotionVector, FacePrediction, map_vendor_scores};

/// Hume streaming models WebSocket endpoint.
pub const HUME_STREAM_WEBSOCKET_URL: &str = "wss://api.hume.ai/v0/stream/models";

/// Handshake header carrying the API key.
pub const HUME_API_KEY_HEADER: &str = "x-hume-api-key";

pub const HUME_STREAM_DEFAULT_WINDOW_MS: u32 = 5000;

// =============================================================================
// Client → Server
// =============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct FaceModelConfig {}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamModels {
    pub face: FaceModelConfig,
}

/// One frame submitted for analysis.
#[derive(Debug, Clone, Serialize)]
pub struct FrameRequest {
    pub data: String,
    pub models: StreamModels,
    pub stream_window_ms: u32,
    /// Set on the first frame after every (re)connect.
    pub reset_stream: bool,
}

impl FrameRequest {
    pub fn new(data: String, stream_window_ms: u32, reset_stream: bool) -> Self {
        Self {
            data,
            models: StreamModels::default(),
            stream_window_ms,
            reset_stream,
        }
    }
}

// =============================================================================
// Server → Client
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StreamResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub face: Option<FaceResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaceResult {
    #[serde(default)]
    pub predictions: Vec<VendorFacePrediction>,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VendorFacePrediction {
    #[serde(default)]
    pub face_id: Option<String>,
    #[serde(default)]
    pub frame: Option<u64>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub prob: Option<f64>,
    #[serde(default, rename = "box")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub emotions: Vec<VendorEmotion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VendorEmotion {
    pub name: String,
    pub score: f64,
}

/// What one facial response means for the session.
#[derive(Debug, Clone, PartialEq)]
pub enum FacialUpdate {
    Detected {
        emotions: EmotionVector,
        confidence: f64,
        faces: Vec<FacePrediction>,
    },
    /// No face in view.
    Cleared { warning: Option<String> },
    /// The vendor reported a hard error.
    VendorError { code: String, message: String },
}

/// Parse and normalize one facial response.
///
/// The most confident face drives the reading; every face is kept as a
/// [`FacePrediction`] with whitelisted emotions.
pub fn interpret_response(text: &str) -> Result<FacialUpdate, serde_json::Error> {
    let response: StreamResponse = serde_json::from_str(text)?;

    if let Some(message) = response.error {
        return Ok(FacialUpdate::VendorError {
            code: response.code.unwrap_or_else(|| "unknown".to_string()),
            message,
        });
    }

    let face = response.face.unwrap_or_default();
    if face.predictions.is_empty() {
        return Ok(FacialUpdate::Cleared {
            warning: face.warning,
        });
    }

    let faces: Vec<FacePrediction> = face
        .predictions
        .into_iter()
        .map(|p| {
            let emotions = map_vendor_scores(p.emotions.into_iter().map(|e| (e.name, e.score)));
            FacePrediction {
                face_id: p.face_id,
                frame: p.frame,
                time: p.time,
                prob: p.prob.filter(|v| v.is_finite()),
                bounding_box: p.bounding_box,
                emotions: emotions.as_slice().to_vec(),
            }
        })
        .collect();

    let primary = faces
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| {
            let pa = a.prob.unwrap_or(1.0);
            let pb = b.prob.unwrap_or(1.0);
            // Prefer the earlier face on equal probability
            pa.partial_cmp(&pb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ib.cmp(ia))
        })
        .map(|(i, _)| i);

    match primary {
        // A face whose scores are all off the whitelist carries no reading
        Some(i) if faces[i].emotions.is_empty() => Ok(FacialUpdate::Cleared { warning: None }),
        Some(i) => Ok(FacialUpdate::Detected {
            emotions: EmotionVector::from_samples(faces[i].emotions.clone()),
            confidence: faces[i].prob.unwrap_or(1.0),
            faces,
        }),
        None => Ok(FacialUpdate::Cleared { warning: None }),
    }
}
