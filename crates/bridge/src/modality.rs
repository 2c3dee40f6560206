//! Camera modality lookups by name
//!
//! Unknown names fall back to Scene (byte buffer) with a warning.

use contracts::{ImageResponse, ImageType};
use tracing::warn;

/// Resolve a modality name
pub fn camera_type(name: &str) -> ImageType {
    match ImageType::ALL.into_iter().find(|t| t.name() == name) {
        Some(image_type) => image_type,
        None => {
            warn!(camera_type = name, "camera type not found, using Scene");
            ImageType::Scene
        }
    }
}

/// Whether the named modality is requested as a float buffer
///
/// Unknown names are byte modalities.
pub fn is_pixels_as_float(name: &str) -> bool {
    ImageType::ALL
        .into_iter()
        .find(|t| t.name() == name)
        .is_some_and(ImageType::pixels_as_float)
}

/// Raw payload of a response for the given modality
///
/// Float modalities are returned as little-endian `f32` bytes.
pub fn image_bytes(response: &ImageResponse, image_type: ImageType) -> Vec<u8> {
    if image_type.pixels_as_float() {
        float_bytes(&response.image_data_float)
    } else {
        response.image_data_uint8.to_vec()
    }
}

/// `f32` buffer as little-endian bytes
pub fn float_bytes(values: &[f32]) -> Vec<u8> {
    if cfg!(target_endian = "little") {
        bytemuck::cast_slice(values).to_vec()
    } else {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names() {
        assert_eq!(camera_type("Segmentation"), ImageType::Segmentation);
        assert_eq!(camera_type("DepthPlanner"), ImageType::DepthPlanner);
        assert!(is_pixels_as_float("DepthVis"));
        assert!(!is_pixels_as_float("Infrared"));
    }

    #[test]
    fn test_unknown_name_defaults_to_scene() {
        assert_eq!(camera_type("Thermal"), ImageType::Scene);
        assert!(!is_pixels_as_float("Thermal"));
        assert_eq!(camera_type(""), ImageType::Scene);
    }

    #[test]
    fn test_image_bytes_by_modality() {
        let response = ImageResponse {
            image_data_uint8: serde_bytes::ByteBuf::from(vec![1u8, 2, 3]),
            image_data_float: vec![1.0, -2.5],
            ..Default::default()
        };

        assert_eq!(image_bytes(&response, ImageType::Scene), vec![1, 2, 3]);

        let depth = image_bytes(&response, ImageType::DepthPlanner);
        assert_eq!(depth.len(), 8);
        assert_eq!(&depth[4..], &(-2.5f32).to_le_bytes());
    }
}
