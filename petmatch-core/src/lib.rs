pub mod attributes;
pub mod compare;
pub mod config;
pub mod features;
pub mod metadata;
pub mod rank;
pub mod response;
pub mod store;

use attributes::{AttributeBreakdown, PetRecord};
use features::{FeatureExtractor, ImageDescriptor, MetadataFeatureExtractor};
use metadata::{DecodingMetadataProvider, MetadataProvider};
use response::SearchResponse;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Image metadata error: {0}")]
    Metadata(#[from] metadata::MetadataError),
    #[error("Scoring error: {0}")]
    Score(#[from] compare::ScoreError),
    #[error("Storage error: {0}")]
    Storage(#[from] store::StorageError),
    #[error("Invalid search parameters: {0}")]
    InvalidParams(String),
}

/// Threshold and limit for one search, resolved against configured defaults
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub threshold: f64,
    pub limit: usize,
}

impl SearchParams {
    /// Fill in defaults, reject thresholds outside [0, 1] and a zero limit,
    /// and clamp oversized limits to the configured maximum
    pub fn resolve(
        threshold: Option<f64>,
        limit: Option<usize>,
        search: &config::SearchConfig,
    ) -> Result<Self, Error> {
        let threshold = threshold.unwrap_or(search.threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidParams(format!(
                "threshold must be between 0 and 1, got {}",
                threshold
            )));
        }

        let requested = limit.unwrap_or(search.limit);
        if requested == 0 {
            return Err(Error::InvalidParams("limit must be at least 1".to_string()));
        }
        let limit = requested.min(search.max_limit);
        if limit < requested {
            log::debug!("Clamping limit {} to {}", requested, limit);
        }

        Ok(Self { threshold, limit })
    }
}

/// Entry point tying the metadata provider, feature extractor and record
/// store together. Collaborators are injected so tests can substitute them.
pub struct PetMatcher {
    config: config::Config,
    metadata: Box<dyn MetadataProvider>,
    extractor: Box<dyn FeatureExtractor>,
    store: store::PetStore,
}

impl PetMatcher {
    /// Create a matcher with the default image decoder and extractor
    pub fn new(config: config::Config) -> Result<Self, Error> {
        let extractor = MetadataFeatureExtractor::new(&config.extraction);
        Self::with_components(config, Box::new(DecodingMetadataProvider::new()), Box::new(extractor))
    }

    /// Create a matcher with explicit collaborators
    pub fn with_components(
        config: config::Config,
        metadata: Box<dyn MetadataProvider>,
        extractor: Box<dyn FeatureExtractor>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let store = store::PetStore::new(&config.storage.database_path);

        Ok(Self {
            config,
            metadata,
            extractor,
            store,
        })
    }

    pub fn config(&self) -> &config::Config {
        &self.config
    }

    /// Resolve caller-supplied threshold and limit against the config
    pub fn search_params(
        &self,
        threshold: Option<f64>,
        limit: Option<usize>,
    ) -> Result<SearchParams, Error> {
        SearchParams::resolve(threshold, limit, &self.config.search)
    }

    /// Compute the descriptor of an uploaded image
    pub fn describe_image(&self, bytes: &[u8]) -> Result<ImageDescriptor, Error> {
        let metadata = self.metadata.read_metadata(bytes)?;
        log::debug!(
            "Image metadata: width={:?} height={:?} channels={:?}",
            metadata.width,
            metadata.height,
            metadata.channels
        );
        Ok(self.extractor.extract(&metadata))
    }

    /// Compute and persist the descriptor for an existing pet
    pub fn attach_image(&self, pet_id: &str, bytes: &[u8]) -> Result<ImageDescriptor, Error> {
        // Fail before decoding if the pet does not exist
        self.store.load_pet(pet_id)?;

        let descriptor = self.describe_image(bytes)?;
        self.store.save_descriptor(pet_id, &descriptor)?;
        log::info!("Attached image descriptor to {}", pet_id);
        Ok(descriptor)
    }

    /// Register a new pet, optionally with an image
    pub fn add_pet(&self, mut record: PetRecord, image: Option<&[u8]>) -> Result<PetRecord, Error> {
        if let Some(bytes) = image {
            record.image_features = Some(self.describe_image(bytes)?);
        }
        let saved = self.store.save_pet(record)?;
        log::info!("Registered pet {}", saved.id);
        Ok(saved)
    }

    /// Rank stored pets by image similarity to an uploaded image
    pub fn search_by_image(&self, bytes: &[u8], params: SearchParams) -> Result<SearchResponse, Error> {
        let query = self.describe_image(bytes)?;
        self.search_by_descriptor(&query, params)
    }

    /// Rank stored pets by image similarity to a known descriptor
    pub fn search_by_descriptor(
        &self,
        query: &ImageDescriptor,
        params: SearchParams,
    ) -> Result<SearchResponse, Error> {
        let candidates = self.store.load_candidates(self.config.search.candidate_cap)?;
        log::info!("Scoring {} candidates", candidates.len());

        let (matches, summary) = rank::rank_candidates_with_summary(
            query,
            candidates.iter().map(|(id, descriptor)| (id.clone(), descriptor)),
            params.threshold,
            params.limit,
        );

        if matches.is_empty() {
            log::info!("No similar pets found");
        }
        Ok(SearchResponse::new(matches, summary, params.threshold, params.limit))
    }

    /// Rank other stored pets by attribute similarity to `pet_id`
    pub fn find_similar_pets(&self, pet_id: &str, params: SearchParams) -> Result<SearchResponse, Error> {
        let query = self.store.load_pet(pet_id)?;
        let records = self.store.load_records(self.config.search.candidate_cap)?;

        let (matches, summary) =
            attributes::rank_records(&query, &records, params.threshold, params.limit);
        Ok(SearchResponse::new(matches, summary, params.threshold, params.limit))
    }

    /// Per-factor attribute comparison of two stored pets.
    /// Descriptors that cannot be scored leave the image factor out.
    pub fn compare_pets(&self, a_id: &str, b_id: &str) -> Result<AttributeBreakdown, Error> {
        let mut a = self.store.load_pet(a_id)?;
        let b = self.store.load_pet(b_id)?;

        match attributes::attribute_breakdown(&a, &b) {
            Ok(breakdown) => Ok(breakdown),
            Err(e) => {
                log::warn!("Ignoring image factor for {} and {}: {}", a_id, b_id, e);
                a.image_features = None;
                Ok(attributes::attribute_breakdown(&a, &b)?)
            }
        }
    }

    /// Get the pet store for direct access
    pub fn store(&self) -> &store::PetStore {
        &self.store
    }
}
