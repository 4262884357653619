use crate::features::ImageDescriptor;
use ndarray::Array1;
use thiserror::Error;

/// Weight of the colour histogram overlap in the pairwise score
pub const HISTOGRAM_WEIGHT: f64 = 0.4;
pub const TEXTURE_WEIGHT: f64 = 0.3;
pub const SHAPE_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("Descriptor contains non-finite values")]
    NonFiniteDescriptor,
    #[error("Score is not finite: {0}")]
    NonFiniteScore(f64),
}

/// Sum of per-bin minima. Histograms of different lengths share nothing.
pub fn histogram_overlap(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x.min(*y)).sum()
}

/// Cosine similarity, 0 on length mismatch.
///
/// A zero-norm vector counts as maximally dissimilar to everything,
/// including another zero vector.
pub fn cosine_similarity(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    a.dot(b) / (norm_a * norm_b)
}

/// Weighted similarity of two descriptors in [0, 1], or an error when
/// either descriptor is numerically broken.
pub fn try_score_pair(a: &ImageDescriptor, b: &ImageDescriptor) -> Result<f64, ScoreError> {
    if !a.is_finite() || !b.is_finite() {
        return Err(ScoreError::NonFiniteDescriptor);
    }

    let score = HISTOGRAM_WEIGHT * histogram_overlap(&a.color_histogram, &b.color_histogram)
        + TEXTURE_WEIGHT * cosine_similarity(&a.texture_features, &b.texture_features)
        + SHAPE_WEIGHT * cosine_similarity(&a.shape_features, &b.shape_features);

    // Squared norms can overflow for huge but finite entries
    if !score.is_finite() {
        return Err(ScoreError::NonFiniteScore(score));
    }

    Ok(score.clamp(0.0, 1.0))
}

/// Fail-soft form of [`try_score_pair`]: broken descriptors score 0
pub fn score_pair(a: &ImageDescriptor, b: &ImageDescriptor) -> f64 {
    try_score_pair(a, b).unwrap_or_else(|e| {
        log::debug!("Pair scored as 0: {}", e);
        0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::extract_features;
    use crate::metadata::ImageMetadata;
    use ndarray::arr1;
    use rand::Rng;

    fn random_histogram(rng: &mut impl Rng) -> Array1<f64> {
        let raw = Array1::from_shape_fn(256, |_| rng.gen::<f64>());
        let sum = raw.sum();
        raw / sum
    }

    #[test]
    fn test_cosine_similarity() {
        let a = arr1(&[1.0, 0.0, 0.0]);
        let b = arr1(&[1.0, 0.0, 0.0]);
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-12);

        let c = arr1(&[0.0, 1.0, 0.0]);
        assert!(cosine_similarity(&a, &c).abs() < 1e-12);

        // Magnitude does not matter
        let d = arr1(&[5.0, 0.0, 0.0]);
        assert!((cosine_similarity(&a, &d) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_length_mismatch() {
        let a = arr1(&[1.0, 2.0, 3.0]);
        let b = arr1(&[1.0, 2.0]);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_zero_norm() {
        let zero = arr1(&[0.0, 0.0, 0.0, 0.0]);
        let other = arr1(&[1.0, 2.0, 3.0, 4.0]);

        assert_eq!(cosine_similarity(&zero, &other), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_histogram_overlap() {
        let a = arr1(&[0.5, 0.5, 0.0]);
        let b = arr1(&[0.25, 0.25, 0.5]);
        assert!((histogram_overlap(&a, &b) - 0.5).abs() < 1e-12);
        assert_eq!(histogram_overlap(&a, &arr1(&[1.0])), 0.0);
    }

    #[test]
    fn test_histogram_overlap_symmetric() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let a = random_histogram(&mut rng);
            let b = random_histogram(&mut rng);
            assert_eq!(histogram_overlap(&a, &b), histogram_overlap(&b, &a));
        }
    }

    #[test]
    fn test_score_pair_bounds() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let a = extract_features(&ImageMetadata::new(
                rng.gen_range(1..4000),
                rng.gen_range(1..4000),
                rng.gen_range(1..=4),
            ));
            let b = extract_features(&ImageMetadata::new(
                rng.gen_range(1..4000),
                rng.gen_range(1..4000),
                rng.gen_range(1..=4),
            ));
            let score = score_pair(&a, &b);
            assert!((0.0..=1.0).contains(&score), "score {} out of bounds", score);
        }
    }

    #[test]
    fn test_self_similarity() {
        for (w, h) in [(200, 150), (1, 1), (4000, 3000), (640, 480)] {
            let d = extract_features(&ImageMetadata::new(w, h, 3));
            assert!((score_pair(&d, &d) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_non_finite_descriptor_fails() {
        let good = extract_features(&ImageMetadata::new(200, 150, 3));
        let mut bad = good.clone();
        bad.shape_features[0] = f64::INFINITY;

        assert_eq!(
            try_score_pair(&good, &bad),
            Err(ScoreError::NonFiniteDescriptor)
        );
        assert_eq!(score_pair(&good, &bad), 0.0);
    }

    #[test]
    fn test_mismatched_histogram_contributes_zero() {
        let a = extract_features(&ImageMetadata::new(200, 150, 3));
        let mut b = a.clone();
        b.color_histogram = arr1(&[1.0]);

        // Only texture and shape remain, both identical
        let score = try_score_pair(&a, &b).unwrap();
        assert!((score - 0.6).abs() < 1e-9);
    }
}
