use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use tokio_util::sync::CancellationToken;

use crate::api::{router, ApiState};
use crate::auth::AccessPolicy;
use crate::config::ServerConfig;
use crate::service::JobService;
use crate::tls::TlsIdentity;

/// How long open connections get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The job worker process: one job service behind the HTTP API.
pub struct Server {
    pub config: ServerConfig,
    pub jobs: JobService,
    pub policy: Arc<AccessPolicy>,
}

impl Server {
    pub fn new(config: ServerConfig, policy: AccessPolicy) -> Self {
        Self {
            jobs: JobService::new(config.launcher.clone()),
            config,
            policy: Arc::new(policy),
        }
    }

    /// Serve the API until `shutdown` is cancelled.
    ///
    /// Uses HTTPS when `tls` is given, plaintext otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or fails while serving.
    pub async fn run(
        self,
        tls: Option<TlsIdentity>,
        shutdown: CancellationToken,
    ) -> std::io::Result<()> {
        let app = router(ApiState {
            jobs: self.jobs.clone(),
            policy: self.policy.clone(),
        });
        let addr = self.config.listen_addr;

        let handle = Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        match tls {
            Some(identity) => {
                tracing::info!(addr = %addr, "Serving job API over HTTPS");
                axum_server::bind_rustls(addr, identity.rustls_config())
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await?;
            }
            None => {
                tracing::warn!(addr = %addr, "Serving job API over plaintext HTTP");
                axum_server::bind(addr)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await?;
            }
        }

        let abandoned = self.jobs.registry().running_count().await;
        tracing::info!(running_jobs = abandoned, "Job API stopped");
        Ok(())
    }
}
