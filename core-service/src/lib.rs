//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, secure
//! storage, clock) and the two vendor connectors into the sync engine.
//! Servers and desktop hosts enable the `desktop-shims` feature, which
//! depends on `bridge-desktop` and ships the `jobfolder-sync` binary.
//!
//! Startup order:
//!
//! 1. Build bridges and the token manager. [`Authorizer`] stops here and
//!    needs only the WorkflowMax settings.
//! 2. Resolve the operating member by email. Fatal if absent.
//! 3. Resolve the three destination folders. A failure leaves categories
//!    missing but does not stop the service.
//! 4. Build the coordinator with its first window `lookback` before now

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{
    http::HttpClient,
    storage::{SecureStore, TeamContext, TeamFolderStore},
    time::{Clock, SystemClock},
};
use core_auth::{OAuthConfig, OAuthFlowManager, TokenManager, TokenStore, DEFAULT_SCOPES};
use core_runtime::config::{ProvisioningSettings, ServiceConfig, WorkflowMaxSettings};
use core_runtime::events::{CoreEvent, EventBus, EventSeverity, RecvError};
use core_runtime::logging::redact_if_sensitive;
use core_sync::{
    resolve_destinations, resolve_team_member, DestinationMap, SyncContext, SyncCoordinator,
};
use provider_dropbox::DropboxConnector;
use provider_workflowmax::WorkflowMaxConnector;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[cfg(feature = "desktop-shims")]
use bridge_desktop::{FileSecureStore, ReqwestHttpClient};
#[cfg(feature = "desktop-shims")]
use core_runtime::config::AuthorizationConfig;
#[cfg(feature = "desktop-shims")]
use std::path::PathBuf;

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub secure_store: Arc<dyn SecureStore>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        secure_store: Arc<dyn SecureStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http_client,
            secure_store,
            clock,
        }
    }

    /// Desktop bridges: reqwest for HTTP and a credential directory on disk.
    #[cfg(feature = "desktop-shims")]
    pub fn desktop(credentials_dir: Option<PathBuf>) -> Result<Self> {
        let http_client = ReqwestHttpClient::new()
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

        let directory = credentials_dir.unwrap_or_else(FileSecureStore::default_directory);
        info!(directory = %directory.display(), "Using credential directory");

        Ok(Self::new(
            Arc::new(http_client),
            Arc::new(FileSecureStore::new(directory)),
            Arc::new(SystemClock),
        ))
    }
}

/// Primary façade exposed to the binary and other hosts.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<ServiceConfig>,
    deps: Arc<CoreDependencies>,
    event_bus: EventBus,
    tokens: Arc<TokenManager>,
    store: Arc<dyn TeamFolderStore>,
}

impl CoreService {
    /// Create a new service from the provided configuration and dependencies.
    ///
    /// Makes no network calls.
    pub fn new(config: ServiceConfig, deps: CoreDependencies) -> Self {
        let event_bus = EventBus::default();

        let tokens = token_manager(&config.workflowmax, &deps, event_bus.clone());

        let store: Arc<dyn TeamFolderStore> = Arc::new(DropboxConnector::new(
            deps.http_client.clone(),
            config.dropbox.access_token.clone(),
            config.dropbox.api_base_url.clone(),
        ));

        Self {
            config: Arc::new(config),
            deps: Arc::new(deps),
            event_bus,
            tokens: Arc::new(tokens),
            store,
        }
    }

    /// Access the bridge dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<CoreDependencies> {
        Arc::clone(&self.deps)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn token_manager(&self) -> Arc<TokenManager> {
        Arc::clone(&self.tokens)
    }

    /// Mirror every published event into the log. See [`spawn_event_log`].
    pub fn spawn_event_log(&self) -> JoinHandle<()> {
        spawn_event_log(&self.event_bus)
    }

    /// Resolve the team context and destinations, then build the coordinator.
    ///
    /// # Errors
    ///
    /// Fails if the operating member cannot be found, or the look-back
    /// window cannot be represented.
    pub async fn start_sync(&self) -> Result<SyncCoordinator> {
        match self.tokens.has_credentials().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("No tracking-system credential yet; cycles will fail until one is seeded")
            }
            Err(e) => warn!(error = %e, "Credential file unreadable; cycles will fail until fixed"),
        }

        let context = prepare_sync_context(
            self.store.as_ref(),
            &self.config.dropbox.namespace_id,
            &self.config.dropbox.member_email,
            &self.config.provisioning,
        )
        .await?;

        let lookback = chrono::Duration::from_std(self.config.polling.lookback)
            .map_err(|e| CoreError::InitializationFailed(format!("Look-back out of range: {}", e)))?;

        let jobs = Arc::new(
            WorkflowMaxConnector::new(
                self.deps.http_client.clone(),
                self.config.workflowmax.api_base_url.clone(),
                self.config.workflowmax.account_id.clone(),
            )
            .with_timezone(self.config.workflowmax.timezone),
        );

        Ok(SyncCoordinator::new(
            context,
            self.tokens.clone(),
            jobs,
            self.store.clone(),
            self.deps.clock.clone(),
            self.event_bus.clone(),
            lookback,
        ))
    }
}

/// Mirror every event published on `event_bus` into the log at its own
/// severity.
///
/// Ends when the bus is dropped.
pub fn spawn_event_log(event_bus: &EventBus) -> JoinHandle<()> {
    let mut receiver = event_bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Event log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Operator login against the tracking system.
///
/// Seeds the credential file the sync loop later refreshes from. Needs no
/// storage-service settings.
pub struct Authorizer {
    tokens: TokenManager,
}

impl Authorizer {
    pub fn new(
        settings: &WorkflowMaxSettings,
        deps: &CoreDependencies,
        event_bus: EventBus,
    ) -> Self {
        Self {
            tokens: token_manager(settings, deps, event_bus),
        }
    }

    /// Start a login and return the URL the operator visits.
    pub async fn authorization_url(&self) -> Result<String> {
        Ok(self.tokens.begin_authorization().await?)
    }

    /// Finish a login by exchanging the code sent to the redirect URI.
    pub async fn complete_authorization(&self, code: &str, state: &str) -> Result<()> {
        self.tokens.complete_authorization(code, state).await?;
        Ok(())
    }
}

fn token_manager(
    settings: &WorkflowMaxSettings,
    deps: &CoreDependencies,
    event_bus: EventBus,
) -> TokenManager {
    let oauth = OAuthFlowManager::new(
        OAuthConfig {
            client_id: settings.client_id.clone(),
            client_secret: Some(settings.client_secret.clone()),
            redirect_uri: settings.redirect_uri.clone(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            auth_url: settings.auth_url.clone(),
            token_url: settings.token_url.clone(),
        },
        deps.http_client.clone(),
        deps.clock.clone(),
    );

    TokenManager::new(
        TokenStore::new(deps.secure_store.clone()),
        oauth,
        event_bus,
        deps.clock.clone(),
    )
}

fn log_event(event: &CoreEvent) {
    let payload = serde_json::to_string(event).unwrap_or_default();
    let description = event.description();

    match event.severity() {
        EventSeverity::Error => error!(event = %payload, "{}", description),
        EventSeverity::Warning => warn!(event = %payload, "{}", description),
        EventSeverity::Info => info!(event = %payload, "{}", description),
        EventSeverity::Debug => debug!(event = %payload, "{}", description),
    }
}

/// Startup resolution of everything a cycle is scoped to.
///
/// A missing member is fatal. A failed destination lookup is logged and
/// yields an empty map, so every cycle is skipped until restart.
pub async fn prepare_sync_context(
    store: &dyn TeamFolderStore,
    namespace_id: &str,
    member_email: &str,
    provisioning: &ProvisioningSettings,
) -> Result<SyncContext> {
    let member = resolve_team_member(store, member_email).await?;
    info!(
        email = %redact_if_sensitive("email", member_email),
        status = %member.status,
        "Operating member resolved"
    );

    let team = TeamContext::new(namespace_id, member.member_id);

    let destinations = match resolve_destinations(store, &team, &provisioning.fragments).await {
        Ok(map) => map,
        Err(e) => {
            warn!(error = %e, "Destination folders could not be resolved");
            DestinationMap::new()
        }
    };

    Ok(SyncContext::new(
        team,
        destinations,
        provisioning.template_path.clone(),
    ))
}

/// Convenience bootstrapper for desktop and server hosts.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_runtime::config::ServiceConfig;
///
/// let config = ServiceConfig::from_env()?;
/// let core = core_service::bootstrap_desktop(config)?;
/// let coordinator = core.start_sync().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(config: ServiceConfig) -> Result<CoreService> {
    let deps = CoreDependencies::desktop(config.credentials_dir.clone())?;
    Ok(CoreService::new(config, deps))
}

/// Desktop bridges for the login commands.
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop_authorizer(
    config: AuthorizationConfig,
    event_bus: EventBus,
) -> Result<Authorizer> {
    let deps = CoreDependencies::desktop(config.credentials_dir)?;
    Ok(Authorizer::new(&config.workflowmax, &deps, event_bus))
}
