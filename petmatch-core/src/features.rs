use crate::config::ExtractionConfig;
use crate::metadata::ImageMetadata;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Number of colour histogram bins
pub const HISTOGRAM_BINS: usize = 256;

/// Length of the texture and shape vectors
pub const TEXTURE_DIM: usize = 4;
pub const SHAPE_DIM: usize = 4;

/// Fixed palette reported as dominant colours. Placeholder until real colour
/// clustering exists; it does not depend on the image.
pub const DOMINANT_PALETTE: [&str; 5] = ["#8B4513", "#D2691E", "#000000", "#FFFFFF", "#808080"];

/// Fixed-shape numeric summary of an image, the unit of comparison for
/// similarity scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// 256 non-negative bins summing to 1
    pub color_histogram: Array1<f64>,
    /// width/1000, height/1000, area/1e6, channels
    pub texture_features: Array1<f64>,
    /// aspect ratio, width, height, area
    pub shape_features: Array1<f64>,
    pub dominant_colors: Vec<String>,
}

impl ImageDescriptor {
    /// True when every numeric entry is finite
    pub fn is_finite(&self) -> bool {
        self.color_histogram
            .iter()
            .chain(self.texture_features.iter())
            .chain(self.shape_features.iter())
            .all(|v| v.is_finite())
    }
}

/// Turns image metadata into a descriptor. Implementations must be pure:
/// equal metadata yields an equal descriptor.
pub trait FeatureExtractor {
    fn extract(&self, metadata: &ImageMetadata) -> ImageDescriptor;
}

/// Descriptor generator driven only by width, height and channel count.
///
/// Two images with the same dimensions and channel count produce identical
/// descriptors whatever their content. Swap in a content-based
/// [`FeatureExtractor`] for real visual matching.
#[derive(Debug, Clone)]
pub struct MetadataFeatureExtractor {
    default_width: u32,
    default_height: u32,
    default_channels: u8,
}

impl MetadataFeatureExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            default_width: config.default_width,
            default_height: config.default_height,
            default_channels: config.default_channels,
        }
    }

    /// Resolve absent or zero metadata to the configured defaults
    fn resolve(&self, metadata: &ImageMetadata) -> (f64, f64, f64) {
        let width = metadata
            .width
            .filter(|&w| w > 0)
            .unwrap_or(self.default_width);
        let height = metadata
            .height
            .filter(|&h| h > 0)
            .unwrap_or(self.default_height);
        let channels = metadata
            .channels
            .filter(|&c| c > 0)
            .unwrap_or(self.default_channels);

        (width as f64, height as f64, channels as f64)
    }
}

impl Default for MetadataFeatureExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

impl FeatureExtractor for MetadataFeatureExtractor {
    fn extract(&self, metadata: &ImageMetadata) -> ImageDescriptor {
        let (width, height, channels) = self.resolve(metadata);
        let area = width * height;

        ImageDescriptor {
            color_histogram: seeded_histogram(area),
            texture_features: Array1::from_vec(vec![
                width / 1000.0,
                height / 1000.0,
                area / 1_000_000.0,
                channels,
            ]),
            // Height is never zero here, the resolver substitutes the default
            shape_features: Array1::from_vec(vec![width / height, width, height, area]),
            dominant_colors: DOMINANT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Extract a descriptor using the default extraction settings
pub fn extract_features(metadata: &ImageMetadata) -> ImageDescriptor {
    MetadataFeatureExtractor::default().extract(metadata)
}

/// Build the normalized histogram `sin(seed + i) * 0.5 + 0.5` over all bins
fn seeded_histogram(seed: f64) -> Array1<f64> {
    let raw = Array1::from_shape_fn(HISTOGRAM_BINS, |i| (seed + i as f64).sin() * 0.5 + 0.5);
    let sum = raw.sum();
    if sum > 0.0 {
        raw / sum
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_histogram_normalized() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let metadata = ImageMetadata::new(rng.gen_range(1..5000), rng.gen_range(1..5000), 3);
            let descriptor = extract_features(&metadata);

            assert_eq!(descriptor.color_histogram.len(), HISTOGRAM_BINS);
            assert_eq!(descriptor.texture_features.len(), TEXTURE_DIM);
            assert_eq!(descriptor.shape_features.len(), SHAPE_DIM);
            assert!(descriptor.color_histogram.iter().all(|&v| v >= 0.0));
            assert!((descriptor.color_histogram.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_extraction_deterministic() {
        let metadata = ImageMetadata::new(200, 150, 3);
        let first = extract_features(&metadata);
        let second = extract_features(&metadata);

        assert_eq!(first, second);
        for (a, b) in first.color_histogram.iter().zip(second.color_histogram.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_texture_and_shape_values() {
        let descriptor = extract_features(&ImageMetadata::new(200, 100, 4));

        assert_eq!(descriptor.texture_features.to_vec(), vec![0.2, 0.1, 0.02, 4.0]);
        assert_eq!(
            descriptor.shape_features.to_vec(),
            vec![2.0, 200.0, 100.0, 20_000.0]
        );
    }

    #[test]
    fn test_missing_metadata_uses_defaults() {
        let defaulted = extract_features(&ImageMetadata::default());
        let explicit = extract_features(&ImageMetadata::new(100, 100, 3));
        assert_eq!(defaulted, explicit);

        let zeroed = extract_features(&ImageMetadata::new(0, 0, 0));
        assert_eq!(zeroed, explicit);
        assert!(zeroed.is_finite());
    }

    #[test]
    fn test_configured_defaults() {
        let extractor = MetadataFeatureExtractor::new(&ExtractionConfig {
            default_width: 640,
            default_height: 480,
            default_channels: 1,
        });
        let descriptor = extractor.extract(&ImageMetadata::default());

        assert_eq!(descriptor.shape_features[1], 640.0);
        assert_eq!(descriptor.shape_features[2], 480.0);
        assert_eq!(descriptor.texture_features[3], 1.0);
    }

    #[test]
    fn test_dominant_colors_fixed() {
        let small = extract_features(&ImageMetadata::new(10, 10, 3));
        let large = extract_features(&ImageMetadata::new(4000, 3000, 4));

        assert_eq!(small.dominant_colors, large.dominant_colors);
        assert_eq!(small.dominant_colors, DOMINANT_PALETTE.to_vec());
    }

    #[test]
    fn test_content_blind() {
        // Same dimensions always collide, whatever the pixels
        let a = extract_features(&ImageMetadata::new(320, 240, 3));
        let b = extract_features(&ImageMetadata::new(320, 240, 3));
        let c = extract_features(&ImageMetadata::new(240, 320, 3));

        assert_eq!(a, b);
        assert_ne!(a.shape_features, c.shape_features);
    }
}
