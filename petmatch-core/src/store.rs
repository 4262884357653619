use crate::attributes::PetRecord;
use crate::features::ImageDescriptor;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Pet not found: {0}")]
    PetNotFound(String),
}

const RECORD_FILE: &str = "record.toml";
const DESCRIPTOR_FILE: &str = "descriptor.bin";
const ID_PREFIX: &str = "pet_";
const COUNTER_FILE: &str = "next_id";

/// Directory-per-pet record store. Each pet directory holds `record.toml`
/// and, once an image has been attached, `descriptor.bin`.
pub struct PetStore {
    base_path: PathBuf,
}

impl PetStore {
    /// Create a new pet store at the given path
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn pet_dir(&self, pet_id: &str) -> PathBuf {
        self.base_path.join(pet_id)
    }

    fn record_path(&self, pet_id: &str) -> PathBuf {
        self.pet_dir(pet_id).join(RECORD_FILE)
    }

    fn descriptor_path(&self, pet_id: &str) -> PathBuf {
        self.pet_dir(pet_id).join(DESCRIPTOR_FILE)
    }

    /// Numeric suffix of a `pet_<n>` id
    fn id_number(pet_id: &str) -> Option<u64> {
        pet_id.strip_prefix(ID_PREFIX)?.parse().ok()
    }

    /// Only `pet_<n>` ids ever map to a directory under the base path
    fn check_id(pet_id: &str) -> Result<(), StorageError> {
        match Self::id_number(pet_id) {
            Some(_) => Ok(()),
            None => Err(StorageError::PetNotFound(pet_id.to_string())),
        }
    }

    /// Ids of all stored pets in ascending numeric order
    fn pet_ids(&self) -> Result<Vec<String>, StorageError> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if Self::id_number(&name).is_some() && entry.path().join(RECORD_FILE).exists() {
                ids.push(name);
            }
        }

        ids.sort_by_key(|id| Self::id_number(id));
        Ok(ids)
    }

    /// High-water mark of issued ids, persisted so removed ids stay retired
    fn read_counter(&self) -> Result<u64, StorageError> {
        let path = self.base_path.join(COUNTER_FILE);
        if !path.exists() {
            return Ok(0);
        }
        let contents = fs::read_to_string(&path)?;
        contents
            .trim()
            .parse()
            .map_err(|e| StorageError::Serialization(format!("bad id counter: {}", e)))
    }

    /// Reserve the next id and advance the counter
    fn next_id(&self) -> Result<String, StorageError> {
        let on_disk = self
            .pet_ids()?
            .iter()
            .filter_map(|id| Self::id_number(id))
            .max()
            .map_or(0, |n| n + 1);
        let next = self.read_counter()?.max(on_disk);

        Self::create_private_dir(&self.base_path)?;
        Self::write_private_file(
            &self.base_path.join(COUNTER_FILE),
            (next + 1).to_string().as_bytes(),
        )?;
        Ok(format!("{}{}", ID_PREFIX, next))
    }

    fn create_private_dir(path: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(path)?;
        // Set permissions to 700 (owner only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
        }
        Ok(())
    }

    fn write_private_file(path: &Path, data: &[u8]) -> Result<(), StorageError> {
        fs::write(path, data)?;
        // Set permissions to 600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Store a new pet record, assigning it a fresh id.
    /// An attached descriptor is persisted alongside the record.
    pub fn save_pet(&self, mut record: PetRecord) -> Result<PetRecord, StorageError> {
        let pet_id = self.next_id()?;
        record.id = pet_id.clone();

        Self::create_private_dir(&self.pet_dir(&pet_id))?;
        self.write_record(&record)?;
        if let Some(descriptor) = &record.image_features {
            self.save_descriptor(&pet_id, descriptor)?;
        }

        log::debug!("Saved pet record {}", pet_id);
        Ok(record)
    }

    /// Overwrite the record file of an existing pet
    pub fn update_pet(&self, record: &PetRecord) -> Result<(), StorageError> {
        Self::check_id(&record.id)?;
        if !self.record_path(&record.id).exists() {
            return Err(StorageError::PetNotFound(record.id.clone()));
        }
        self.write_record(record)
    }

    fn write_record(&self, record: &PetRecord) -> Result<(), StorageError> {
        let contents = toml::to_string_pretty(record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Self::write_private_file(&self.record_path(&record.id), contents.as_bytes())
    }

    /// Load a pet record together with its descriptor, if any
    pub fn load_pet(&self, pet_id: &str) -> Result<PetRecord, StorageError> {
        Self::check_id(pet_id)?;
        let record_path = self.record_path(pet_id);
        if !record_path.exists() {
            return Err(StorageError::PetNotFound(pet_id.to_string()));
        }

        let contents = fs::read_to_string(&record_path)?;
        let mut record: PetRecord = toml::from_str(&contents)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        record.id = pet_id.to_string();
        record.image_features = self.load_descriptor(pet_id)?;
        Ok(record)
    }

    /// Save or replace the descriptor of an existing pet
    pub fn save_descriptor(
        &self,
        pet_id: &str,
        descriptor: &ImageDescriptor,
    ) -> Result<(), StorageError> {
        Self::check_id(pet_id)?;
        if !self.record_path(pet_id).exists() {
            return Err(StorageError::PetNotFound(pet_id.to_string()));
        }

        let data = bincode::serialize(descriptor)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Self::write_private_file(&self.descriptor_path(pet_id), &data)
    }

    /// Load the descriptor of a pet, `None` when no image was attached
    pub fn load_descriptor(&self, pet_id: &str) -> Result<Option<ImageDescriptor>, StorageError> {
        Self::check_id(pet_id)?;
        let path = self.descriptor_path(pet_id);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        let descriptor: ImageDescriptor = bincode::deserialize(&data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Some(descriptor))
    }

    /// Remove a pet and its descriptor
    pub fn remove_pet(&self, pet_id: &str) -> Result<(), StorageError> {
        Self::check_id(pet_id)?;
        let pet_dir = self.pet_dir(pet_id);
        if !self.record_path(pet_id).exists() {
            return Err(StorageError::PetNotFound(pet_id.to_string()));
        }

        fs::remove_dir_all(&pet_dir)?;
        Ok(())
    }

    /// List all pet records in id order
    pub fn list_pets(&self) -> Result<Vec<PetRecord>, StorageError> {
        self.load_records(usize::MAX)
    }

    /// Load at most `cap` records. Unreadable records are logged and skipped.
    pub fn load_records(&self, cap: usize) -> Result<Vec<PetRecord>, StorageError> {
        let mut records = Vec::new();
        for pet_id in self.pet_ids()?.into_iter().take(cap) {
            match self.load_pet(&pet_id) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping unreadable pet {}: {}", pet_id, e),
            }
        }
        Ok(records)
    }

    /// Fetch at most `cap` pets that have a descriptor, as ranking candidates.
    /// Pets without an image are skipped and do not count towards the cap.
    pub fn load_candidates(
        &self,
        cap: usize,
    ) -> Result<Vec<(String, ImageDescriptor)>, StorageError> {
        let mut candidates = Vec::new();
        for pet_id in self.pet_ids()? {
            if candidates.len() >= cap {
                break;
            }
            match self.load_descriptor(&pet_id) {
                Ok(Some(descriptor)) => candidates.push((pet_id, descriptor)),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping descriptor of {}: {}", pet_id, e),
            }
        }
        Ok(candidates)
    }
}
