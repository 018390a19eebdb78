use std::sync::Arc;

use tokio::sync::OnceCell;

use churnwise_classifiers::error::{ChurnError, Result};
use churnwise_classifiers::io::ArtifactPaths;
use churnwise_classifiers::serving::ServingModels;

use crate::config::AppConfig;

/// Shared by every handler. The serving models are built at most once;
/// concurrent first requests wait on the same initialization.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    config: AppConfig,
    paths: ArtifactPaths,
    serving: OnceCell<Arc<ServingModels>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let paths = config.artifact_paths();
        AppState {
            inner: Arc::new(Inner {
                config,
                paths,
                serving: OnceCell::new(),
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Restore or train the models on first use. A failed attempt leaves
    /// the state uninitialized so the next request tries again.
    pub async fn ready(&self) -> Result<Arc<ServingModels>> {
        let inner = &self.inner;
        let serving = inner
            .serving
            .get_or_try_init(|| async move {
                let data_path = inner.config.data_path.clone();
                let pipeline = inner.config.pipeline.clone();
                let paths = inner.paths.clone();
                let serving = tokio::task::spawn_blocking(move || {
                    ServingModels::load_or_train(&data_path, &pipeline, &paths)
                })
                .await
                .map_err(|e| ChurnError::Inference(format!("model initialization aborted: {}", e)))??;
                log::info!("Models ready");
                Ok::<_, ChurnError>(Arc::new(serving))
            })
            .await?;
        Ok(Arc::clone(serving))
    }

    /// The serving models if initialization already completed.
    pub fn try_ready(&self) -> Option<Arc<ServingModels>> {
        self.inner.serving.get().cloned()
    }
}
