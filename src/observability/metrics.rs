//! Prometheus metrics.

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread;

/// Default scrape port.
const DEFAULT_PORT: u16 = 9090;

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Address to bind the metrics exporter.
    pub listen_addr: SocketAddr,
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings.
    #[must_use]
    pub fn from_settings(settings: &MetricsSettings) -> Self {
        let port = settings.port.unwrap_or(DEFAULT_PORT);
        Self {
            enabled: settings.enabled,
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        }
    }
}

/// Metrics handle for rendering on shutdown.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    prometheus: PrometheusHandle,
}

impl MetricsHandle {
    /// Renders the current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.prometheus.render()
    }
}

/// Installs the Prometheus metrics recorder and, if `expose` is set, the
/// HTTP scrape listener.
///
/// Returns `None` when metrics are disabled.
pub fn install_prometheus(config: &MetricsConfig, expose: bool) -> Result<Option<MetricsHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let builder = PrometheusBuilder::new();
    let prometheus = if expose {
        install_listener(builder.with_http_listener(config.listen_addr))?
    } else {
        builder
            .install_recorder()
            .map_err(|e| Error::operation("metrics_recorder_install", e))?
    };

    tracing::debug!(
        expose,
        listen_addr = %config.listen_addr,
        "Installed Prometheus recorder"
    );
    Ok(Some(MetricsHandle { prometheus }))
}

/// Logs a final snapshot of the recorded metrics.
pub fn flush(handle: &MetricsHandle) {
    let payload = handle.render();
    tracing::debug!(bytes = payload.len(), metrics = %payload, "Metrics snapshot");
}

fn install_listener(builder: PrometheusBuilder) -> Result<PrometheusHandle> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::operation("metrics_runtime_init", e))?;
    let (recorder, exporter) = {
        let _guard = runtime.enter();
        builder
            .build()
            .map_err(|e| Error::operation("metrics_exporter_build", e))?
    };
    let handle = recorder.handle();
    set_global_recorder(recorder)?;
    thread::Builder::new()
        .name("metrics-exporter-prometheus-http".to_string())
        .spawn(move || {
            if let Err(e) = runtime.block_on(exporter) {
                tracing::warn!(error = ?e, "Prometheus listener stopped");
            }
        })
        .map_err(|e| Error::operation("metrics_runtime_thread", e))?;
    Ok(handle)
}

fn set_global_recorder(recorder: PrometheusRecorder) -> Result<()> {
    metrics::set_global_recorder(recorder)
        .map_err(|e| Error::operation("metrics_recorder_install", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_defaults() {
        let config = MetricsConfig::from_settings(&MetricsSettings::default());
        assert!(!config.enabled);
        assert_eq!(config.listen_addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_disabled_installs_nothing() {
        let config = MetricsConfig::from_settings(&MetricsSettings {
            enabled: false,
            port: Some(9200),
        });
        assert_eq!(config.listen_addr.port(), 9200);
        assert!(install_prometheus(&config, true).unwrap().is_none());
    }
}
