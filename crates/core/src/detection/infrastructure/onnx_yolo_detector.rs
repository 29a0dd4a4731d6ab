/// Multi-class YOLO detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, and post-processing for both
/// the anchor-free YOLOv8/11 head (needs NMS) and the end-to-end YOLOv10 head
/// (already suppressed).
use crate::detection::domain::detection::{Detection, DetectionSet};
use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::execution_provider::execution_providers;
use super::model_spec::ModelSpec;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Feature count of an end-to-end head row: `[x1, y1, x2, y2, score, class]`.
const END_TO_END_FEATURES: usize = 6;

/// YOLO detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    spec: ModelSpec,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load the model described by `spec` and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(spec: &ModelSpec) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(execution_providers(spec.device))?
            .commit_from_file(&spec.model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded {} (input {input_size}px, device {}, classes {:?})",
            spec.model_path.display(),
            spec.device,
            spec.class_names
        );

        Ok(Self {
            session,
            spec: spec.clone(),
            input_size,
        })
    }
}

impl ObjectDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionSet, Box<dyn std::error::Error>> {
        let (input_tensor, letterbox) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_standard_layout();
        let data = data.as_slice().ok_or("Cannot get tensor slice")?;

        let layout = OutputLayout::from_shape(&shape, self.spec.end_to_end)?;
        let mut raw = decode(data, layout, self.spec.confidence);
        let kept = match layout {
            OutputLayout::EndToEnd { .. } => raw,
            _ => nms_per_class(&mut raw, self.spec.iou_threshold),
        };

        Ok(kept
            .into_iter()
            .filter_map(|d| {
                let bbox = letterbox
                    .to_frame(&d.bbox)
                    .clamp_to(frame.width(), frame.height())?;
                Some(Detection::new(self.spec.label_for(d.class_id), d.score, bbox))
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Mapping between frame coordinates and the letterboxed model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_frame(&self, b: &BoundingBox) -> BoundingBox {
        let px = self.pad_x as f64;
        let py = self.pad_y as f64;
        BoundingBox::new(
            (b.x1 - px) / self.scale,
            (b.y1 - py) / self.scale,
            (b.x2 - px) / self.scale,
            (b.y2 - py) / self.scale,
        )
    }
}

/// Letterbox-resize a frame to `target_size` x `target_size` as an NCHW
/// float32 tensor in `[0, 1]`, padded with YOLO's 114 gray.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

// ---------------------------------------------------------------------------
// Post-processing
// ---------------------------------------------------------------------------

/// How detections are laid out in the `[1, a, b]` output tensor.
#[derive(Clone, Copy, Debug, PartialEq)]
enum OutputLayout {
    /// `[1, 4 + nc, n]`: YOLOv8/11 export default, one column per candidate.
    FeaturesFirst { num_dets: usize, num_feats: usize },
    /// `[1, n, 4 + nc]`: one row per candidate.
    DetectionsFirst { num_dets: usize, num_feats: usize },
    /// `[1, n, 6]`: YOLOv10 end-to-end rows, only for models declared as such.
    EndToEnd { num_dets: usize },
}

impl OutputLayout {
    /// Width 6 is both a YOLOv10 row and a 2-class `4 + nc` row, so the
    /// end-to-end head is only assumed when the model is declared as one.
    fn from_shape(shape: &[usize], end_to_end: bool) -> Result<Self, Box<dyn std::error::Error>> {
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }
        let (a, b) = (shape[1], shape[2]);
        if end_to_end {
            if b != END_TO_END_FEATURES {
                return Err(format!(
                    "End-to-end output must have {END_TO_END_FEATURES} features per row: {shape:?}"
                )
                .into());
            }
            return Ok(OutputLayout::EndToEnd { num_dets: a });
        }
        if a < b {
            if a < 5 {
                return Err(format!("YOLO output has too few features: {shape:?}").into());
            }
            Ok(OutputLayout::FeaturesFirst {
                num_dets: b,
                num_feats: a,
            })
        } else if b >= 5 {
            Ok(OutputLayout::DetectionsFirst {
                num_dets: a,
                num_feats: b,
            })
        } else {
            Err(format!("YOLO output has too few features: {shape:?}").into())
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct RawDetection {
    bbox: BoundingBox,
    score: f32,
    class_id: usize,
}

/// Parse candidates above `confidence` in letterbox coordinates.
fn decode(data: &[f32], layout: OutputLayout, confidence: f32) -> Vec<RawDetection> {
    let mut dets = Vec::new();
    match layout {
        OutputLayout::EndToEnd { num_dets } => {
            for row in data.chunks_exact(END_TO_END_FEATURES).take(num_dets) {
                let score = row[4];
                if score < confidence || row[5] < 0.0 {
                    continue;
                }
                dets.push(RawDetection {
                    bbox: BoundingBox::new(row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64),
                    score,
                    class_id: row[5] as usize,
                });
            }
        }
        OutputLayout::FeaturesFirst {
            num_dets,
            num_feats,
        }
        | OutputLayout::DetectionsFirst {
            num_dets,
            num_feats,
        } => {
            let transposed = matches!(layout, OutputLayout::FeaturesFirst { .. });
            let at = |det: usize, feat: usize| {
                if transposed {
                    data[feat * num_dets + det]
                } else {
                    data[det * num_feats + feat]
                }
            };
            for i in 0..num_dets {
                // Best class score; features 4.. are per-class probabilities
                let (class_id, score) = (4..num_feats)
                    .map(|f| (f - 4, at(i, f)))
                    .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
                if score < confidence {
                    continue;
                }
                dets.push(RawDetection {
                    bbox: BoundingBox::from_center(
                        at(i, 0) as f64,
                        at(i, 1) as f64,
                        at(i, 2) as f64,
                        at(i, 3) as f64,
                    ),
                    score,
                    class_id,
                });
            }
        }
    }
    dets
}

/// Greedy NMS within each class: sort by score descending, suppress
/// same-class boxes overlapping a kept one by more than `iou_thresh`.
fn nms_per_class(dets: &mut [RawDetection], iou_thresh: f32) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if suppressed[j] || dets[j].class_id != dets[i].class_id {
                continue;
            }
            if dets[i].bbox.iou(&dets[j].bbox) > iou_thresh as f64 {
                suppressed[j] = true;
            }
        }
    }
    keep
}
