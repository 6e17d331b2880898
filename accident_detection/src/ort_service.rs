use crate::{
    config::ModelConfig,
    detection::DetectionBox,
    model_service::{Detector, DetectorError},
    state::ClassLabels,
};
use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{s, Array, ArrayD, ArrayViewD, Ix3, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use std::{
    fmt::Display,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

fn intersection(box1: &DetectionBox, box2: &DetectionBox) -> f32 {
    let [ax1, ay1, ax2, ay2] = box1.bounding_box;
    let [bx1, by1, bx2, by2] = box2.bounding_box;
    (ax2.min(bx2) - ax1.max(bx1)).max(0.0) * (ay2.min(by2) - ay1.max(by1)).max(0.0)
}

fn union(box1: &DetectionBox, box2: &DetectionBox) -> f32 {
    box1.area() + box2.area() - intersection(box1, box2)
}

fn iou(box1: &DetectionBox, box2: &DetectionBox) -> f32 {
    let union = union(box1, box2);
    if union <= 0.0 {
        return 0.0;
    }
    intersection(box1, box2) / union
}

/// Greedy per-class suppression: a box only suppresses overlapping boxes of
/// its own class. Output is sorted by confidence.
fn non_max_suppression(mut boxes: Vec<DetectionBox>, iou_threshold: f32) -> Vec<DetectionBox> {
    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
    let mut result = Vec::new();

    while !boxes.is_empty() {
        let best = boxes.remove(0);
        boxes.retain(|candidate| {
            candidate.class_label != best.class_label || iou(&best, candidate) < iou_threshold
        });
        result.push(best);
    }

    result
}

/// Resizes to `input_size`² and lays the RGB channels out as NCHW in [0, 1].
fn image_to_tensor(image: &DynamicImage, input_size: u32) -> Array<f32, Ix4> {
    let size = input_size as usize;
    let img = image.resize_exact(input_size, input_size, FilterType::CatmullRom);

    let mut input = Array::zeros((1, 3, size, size));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

/// Decodes a `[1, 4 + classes, candidates]` YOLO head. `scale` maps model
/// input coordinates back onto the original image.
fn decode_output(
    output: ArrayViewD<f32>,
    labels: &ClassLabels,
    min_probability: f32,
    scale: (f32, f32),
) -> Result<Vec<DetectionBox>, DetectorError> {
    let shape = output.shape().to_vec();
    let output = output
        .into_dimensionality::<Ix3>()
        .map_err(|_| DetectorError::Inference(format!("unexpected output shape {:?}", shape)))?;
    if shape[0] != 1 || shape[1] <= 4 {
        return Err(DetectorError::Inference(format!(
            "unexpected output shape {:?}",
            shape
        )));
    }

    let output = output.reversed_axes();
    let rows = output.slice(s![.., .., 0]);
    let (scale_x, scale_y) = scale;
    let mut boxes = Vec::new();

    for row in rows.outer_iter() {
        let best = row
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .reduce(|accum, item| if item.1 > accum.1 { item } else { accum });
        let Some((class_id, prob)) = best else {
            continue;
        };

        if prob < min_probability {
            continue;
        }

        let xc = row[0usize] * scale_x;
        let yc = row[1usize] * scale_y;
        let w = row[2usize] * scale_x;
        let h = row[3usize] * scale_y;

        boxes.push(DetectionBox::new(
            labels.name(class_id),
            prob,
            [xc - w / 2., yc - h / 2., xc + w / 2., yc + h / 2.],
        ));
    }

    Ok(boxes)
}

/// Class names embedded in the model win over the configured labels file.
fn resolve_labels(model_names: Option<String>, fallback: ClassLabels) -> ClassLabels {
    match model_names {
        Some(names) => match ClassLabels::from_model_names(&names) {
            Some(labels) => {
                tracing::info!("Using {} class names from model metadata", labels.len());
                labels
            }
            None => {
                tracing::warn!("Unreadable class names in model metadata, using labels file");
                fallback
            }
        },
        None => fallback,
    }
}

fn model_class_names(session: &Session) -> Option<String> {
    match session.metadata().and_then(|metadata| metadata.custom("names")) {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!("Failed to read model metadata: {}", e);
            None
        }
    }
}

fn load_error(e: impl Display) -> DetectorError {
    DetectorError::Load(e.to_string())
}

fn inference_error(e: impl Display) -> DetectorError {
    DetectorError::Inference(e.to_string())
}

#[derive(Clone)]
pub struct OrtDetector {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    labels: Arc<ClassLabels>,
    min_probability: f32,
    iou_threshold: f32,
    input_size: u32,
}

impl OrtDetector {
    pub fn new(
        model_path: &Path,
        model_config: &ModelConfig,
        labels: ClassLabels,
    ) -> Result<Self, DetectorError> {
        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()
                    .map_err(load_error)?
                    .with_optimization_level(GraphOptimizationLevel::Level3)
                    .map_err(load_error)?
                    .commit_from_file(model_path)
                    .map_err(load_error)?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, DetectorError>>()?;

        let model_names = sessions
            .first()
            .and_then(|session| model_class_names(&session.lock()));
        let labels = resolve_labels(model_names, labels);

        tracing::info!(
            "Created {} ONNX sessions from {}",
            num_instances,
            model_path.display()
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            labels: Arc::new(labels),
            min_probability: model_config.min_probability,
            iou_threshold: model_config.iou_threshold,
            input_size: model_config.input_size,
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<ArrayD<f32>, DetectorError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index].lock();
        tracing::debug!("Handling request with session {}", index);

        let tensor_ref = TensorRef::from_array_view(input.view()).map_err(inference_error)?;
        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(inference_error)?;

        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;

        ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec()).map_err(inference_error)
    }

    fn detect_blocking(&self, image: &DynamicImage) -> Result<Vec<DetectionBox>, DetectorError> {
        let (img_width, img_height) = image.dimensions();
        if img_width == 0 || img_height == 0 {
            return Err(DetectorError::Preprocess("image has no pixels".to_string()));
        }

        let input = image_to_tensor(image, self.input_size);
        let output = self.run_inference(&input)?;

        let input_size = self.input_size as f32;
        let scale = (img_width as f32 / input_size, img_height as f32 / input_size);
        let candidates = decode_output(output.view(), &self.labels, self.min_probability, scale)?;

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

#[async_trait]
impl Detector for OrtDetector {
    async fn detect(&self, image: DynamicImage) -> Result<Vec<DetectionBox>, DetectorError> {
        let detector = self.clone();
        tokio::task::spawn_blocking(move || detector.detect_blocking(&image))
            .await
            .map_err(|e| DetectorError::Inference(format!("inference task failed: {}", e)))?
    }
}
