//! Shared server state.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use grimoire_core::Coordinator;
use grimoire_core::ports::ImageEngine;

/// Largest image edge accepted by the txt2img endpoint.
pub const IMAGE_RES_LIMIT: u32 = 1024;

/// Static serving configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Friendly model name reported by the metadata endpoints.
    pub model_name: String,
    /// Friendly image model name, when an image backend is loaded.
    pub image_model_name: Option<String>,
    /// Whether a multimodal projector is loaded (enables interrogation).
    pub vision: bool,
    /// Bearer token protecting generation and control endpoints.
    pub password: Option<String>,
    /// Advertised per-request output budget (also the Horde ceiling).
    pub max_length: u32,
    /// Advertised context budget; capped by the allocated context.
    pub max_context_length: u32,
    /// Suppress prompt echo in logs.
    pub quiet: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_name: "unknown".into(),
            image_model_name: None,
            vision: false,
            password: None,
            max_length: 256,
            max_context_length: 2048,
            quiet: false,
        }
    }
}

/// Everything a handler needs, shared behind one `Arc`.
pub struct ServerContext {
    pub coordinator: Arc<Coordinator>,
    pub image_engine: Option<Arc<dyn ImageEngine>>,
    pub config: ServerConfig,
    /// Escalation level published by the embedded Horde worker, surfaced on
    /// the perf endpoint. Zero when no worker is running.
    pub horde_exit_level: Arc<AtomicI64>,
    started_at: Instant,
}

/// Handler state type used throughout the router.
pub type AppState = Arc<ServerContext>;

impl ServerContext {
    #[must_use]
    pub fn new(
        coordinator: Arc<Coordinator>,
        image_engine: Option<Arc<dyn ImageEngine>>,
        config: ServerConfig,
    ) -> Self {
        Self {
            coordinator,
            image_engine,
            config,
            horde_exit_level: Arc::new(AtomicI64::new(0)),
            started_at: Instant::now(),
        }
    }

    /// Seconds since the server context was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Advertised context budget: the configured value, but never more than
    /// what the engine was actually allocated.
    #[must_use]
    pub fn advertised_max_context(&self) -> u32 {
        self.config
            .max_context_length
            .min(self.coordinator.allocated_ctx())
    }

    #[must_use]
    pub fn horde_exit_level(&self) -> i64 {
        self.horde_exit_level.load(Ordering::Relaxed)
    }
}
