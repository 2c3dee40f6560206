//! Image request batch and response-slot table
//!
//! The simulator answers a batch positionally and responses carry no camera
//! label. Both the batch and the slot table are derived from the same walk
//! over the cameras (camera1, camera2, camera3; per active camera Scene, then
//! Segmentation and DepthPlanner unless scene-only), so they cannot disagree.

use contracts::{CameraSettings, CameraSlot, ImageRequest, ImageType};
use serde::Serialize;
use tracing::warn;

use crate::modality::{camera_type, is_pixels_as_float};

/// Response indices for one camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CameraSlots {
    pub scene: usize,
    pub segmentation: Option<usize>,
    pub depth: Option<usize>,
}

/// Where each camera's responses sit in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResponseLayout {
    cameras: [Option<CameraSlots>; 3],
    len: usize,
}

impl ResponseLayout {
    /// Build from per-camera `(active, scene_only)` flags, in slot order
    pub fn new(flags: [(bool, bool); 3]) -> Self {
        let mut cameras = [None; 3];
        let mut next = 0;
        for (slots, (active, scene_only)) in cameras.iter_mut().zip(flags) {
            if !active {
                continue;
            }
            let scene = next;
            next += 1;
            let (segmentation, depth) = if scene_only {
                (None, None)
            } else {
                next += 2;
                (Some(scene + 1), Some(scene + 2))
            };
            *slots = Some(CameraSlots {
                scene,
                segmentation,
                depth,
            });
        }
        Self { cameras, len: next }
    }

    pub fn from_settings(cameras: &[CameraSettings; 3]) -> Self {
        Self::new(cameras.each_ref().map(|c| (c.active, c.scene_only)))
    }

    /// Slots for a camera, `None` when it is inactive
    pub fn camera(&self, slot: CameraSlot) -> Option<CameraSlots> {
        self.cameras[slot.index()]
    }

    /// Number of responses a batch must contain
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Build the request batch, in the order the layout expects
///
/// Logs a warning for each camera with segmentation enabled.
pub fn build_requests(cameras: &[CameraSettings; 3]) -> Vec<ImageRequest> {
    let mut requests = Vec::new();
    for camera in cameras.iter().filter(|c| c.active) {
        requests.push(request(&camera.name, "Scene"));
        if !camera.scene_only {
            warn!(
                camera = %camera.slot,
                name = %camera.name,
                "segmentation enabled; remember to generate instance segmentation data if required"
            );
            requests.push(request(&camera.name, "Segmentation"));
            requests.push(request(&camera.name, "DepthPlanner"));
        }
    }
    requests
}

fn request(camera_name: &str, modality: &str) -> ImageRequest {
    ImageRequest::new(camera_name, camera_type(modality), is_pixels_as_float(modality))
}

/// Modality expected at each position of a batch
pub fn expected_types(layout: &ResponseLayout) -> Vec<ImageType> {
    let mut types = vec![ImageType::Scene; layout.len()];
    for slot in CameraSlot::ALL {
        if let Some(slots) = layout.camera(slot) {
            if let Some(i) = slots.segmentation {
                types[i] = ImageType::Segmentation;
            }
            if let Some(i) = slots.depth {
                types[i] = ImageType::DepthPlanner;
            }
        }
    }
    types
}
