use crate::CoreError;
use remora_runtime::{select_backend, BuildBackend};
use remora_schema::{ImageId, ImageSpec, ShortId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Opaque handle to a materialized image, owned by the builder's cache.
///
/// Cheap to clone; equality follows the content-derived image id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageHandle {
    image_id: ImageId,
    short_id: ShortId,
    backend: String,
    built_at: String,
}

impl ImageHandle {
    pub fn image_id(&self) -> &ImageId {
        &self.image_id
    }

    pub fn short_id(&self) -> &ShortId {
        &self.short_id
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// RFC 3339 timestamp of the first successful build for this identity.
    pub fn built_at(&self) -> &str {
        &self.built_at
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        self.image_id == other.image_id
    }
}

impl Eq for ImageHandle {}

/// Builds images from specifications, reusing prior builds by content identity.
///
/// The cache maps fingerprints to handles and is append-only: an entry, once
/// written, is never mutated or removed, so concurrent readers never observe
/// a partial write. A failed build leaves the cache untouched.
pub struct ImageBuilder {
    backend: Arc<dyn BuildBackend>,
    cache: Mutex<HashMap<ImageId, ImageHandle>>,
}

impl ImageBuilder {
    pub fn new(backend: Arc<dyn BuildBackend>) -> Self {
        Self {
            backend,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Construct a builder by backend name (`"shell"` or `"mock"`).
    pub fn with_backend_name(name: &str, store_root: &str) -> Result<Self, CoreError> {
        let backend = select_backend(name, store_root)?;
        Ok(Self::new(Arc::from(backend)))
    }

    /// Return the cached handle for an equivalent specification, or execute
    /// the build steps in order and cache the result.
    ///
    /// On a cache hit no build work is performed. On a miss, each step must
    /// complete before the next begins; the first failure aborts the build
    /// with [`CoreError::BuildStepFailed`] carrying the step index, and no
    /// cache entry is written.
    pub fn build_or_reuse(&self, spec: &ImageSpec) -> Result<ImageHandle, CoreError> {
        let identity = spec.fingerprint();

        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(handle) = cache.get(&identity.image_id) {
                debug!("image cache hit: {}", identity.short_id);
                return Ok(handle.clone());
            }
        }

        info!(
            "building image {} from base '{}' ({} steps)",
            identity.short_id,
            spec.base(),
            spec.steps().len()
        );
        for (index, step) in spec.steps().iter().enumerate() {
            debug!("build step {index}: {step}");
            self.backend
                .run_step(spec.base(), step)
                .map_err(|source| CoreError::BuildStepFailed {
                    step_index: index,
                    source,
                })?;
        }

        let handle = ImageHandle {
            image_id: identity.image_id.clone(),
            short_id: identity.short_id,
            backend: self.backend.name().to_owned(),
            built_at: chrono::Utc::now().to_rfc3339(),
        };

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        // Write-once per key: if a concurrent build won the race, keep its
        // handle so every caller sees the same one.
        Ok(cache
            .entry(identity.image_id)
            .or_insert(handle)
            .clone())
    }

    /// Whether an equivalent specification has already been built.
    pub fn is_cached(&self, spec: &ImageSpec) -> bool {
        let identity = spec.fingerprint();
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&identity.image_id)
    }

    /// Number of distinct images currently cached.
    pub fn cached_count(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
