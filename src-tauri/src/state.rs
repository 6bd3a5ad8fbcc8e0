//! Application State
//!
//! Connection settings plus the services wired from them. Services are
//! absent until a project URL and anon key are known, and rebuilt whenever
//! the settings change.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use todo_core::config::CONFIG_FILE_NAME;
use todo_core::remote::{GoTrueClient, RealtimeFeed, RestItemRepository, SupabaseHttp};
use todo_core::{ConfigError, Presenter, Reconciler, ReconcilerOptions, RemoteConfig, SessionManager, SessionStore};

const NOT_CONFIGURED: &str = "Remote service is not configured";

/// Everything that talks to the remote project
#[derive(Clone)]
pub struct Services {
    pub config: RemoteConfig,
    pub sessions: Arc<SessionManager>,
    pub reconciler: Reconciler,
}

impl Services {
    pub fn connect(config: RemoteConfig, data_dir: &Path, presenter: Arc<dyn Presenter>) -> Result<Self, ConfigError> {
        let http = SupabaseHttp::new(&config)?;
        let auth = Arc::new(GoTrueClient::new(http.clone()));
        let sessions = Arc::new(SessionManager::new(auth, SessionStore::in_dir(data_dir)));
        let repo = Arc::new(RestItemRepository::new(http.clone(), config.table.clone(), sessions.clone()));
        let feed = Arc::new(RealtimeFeed::new(http, &config, sessions.clone()));
        let reconciler = Reconciler::new(repo, feed, sessions.clone(), presenter, ReconcilerOptions::from(&config));
        Ok(Self {
            config,
            sessions,
            reconciler,
        })
    }
}

/// Application state shared across commands
pub struct AppState {
    data_dir: PathBuf,
    presenter: Arc<dyn Presenter>,
    services: RwLock<Option<Services>>,
}

impl AppState {
    pub fn new(data_dir: PathBuf, presenter: Arc<dyn Presenter>, config: Option<RemoteConfig>) -> Self {
        let services = config.and_then(|config| match Services::connect(config, &data_dir, presenter.clone()) {
            Ok(services) => Some(services),
            Err(e) => {
                log::warn!("[STATE] Stored settings are unusable: {}", e);
                None
            }
        });
        Self {
            data_dir,
            presenter,
            services: RwLock::new(services),
        }
    }

    /// Build state from `remote_config.json` in `data_dir` and the environment
    pub fn load(data_dir: PathBuf, presenter: impl Presenter + 'static) -> Self {
        let config = match RemoteConfig::load(&data_dir.join(CONFIG_FILE_NAME)) {
            Ok(config) => config,
            Err(e) => {
                log::error!("[STATE] Failed to load settings: {}", e);
                None
            }
        };
        if config.is_none() {
            log::info!("[STATE] No remote service configured yet");
        }
        Self::new(data_dir, Arc::new(presenter), config)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE_NAME)
    }

    pub async fn is_configured(&self) -> bool {
        self.services.read().await.is_some()
    }

    pub async fn config(&self) -> Option<RemoteConfig> {
        self.services.read().await.as_ref().map(|s| s.config.clone())
    }

    /// Current services; an error string ready for the UI when unconfigured
    pub async fn services(&self) -> Result<Services, String> {
        self.services
            .read()
            .await
            .clone()
            .ok_or_else(|| NOT_CONFIGURED.to_string())
    }

    /// Persist new settings and swap in services built from them
    pub async fn reconfigure(&self, config: RemoteConfig) -> Result<(), ConfigError> {
        config.save(&self.config_path())?;

        let mut services = self.services.write().await;
        if let Some(previous) = services.take() {
            previous.reconciler.detach().await;
            if previous.config.base_url()? != config.base_url()? {
                // A session of another project is of no use here
                if let Err(e) = SessionStore::in_dir(&self.data_dir).clear() {
                    log::warn!("[STATE] Failed to clear stale session: {}", e);
                }
            }
        }
        log::info!("[STATE] Remote service configured: {}", config.url);
        *services = Some(Services::connect(config, &self.data_dir, self.presenter.clone())?);
        Ok(())
    }
}
