//! Sync layer configuration.
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! core_thread_name = "dyad-core"
//! queue_capacity = 0          # 0 = unbounded
//! batch_capacity = 256
//! retained_batches = 4
//! headless_memory_budget = 268435456
//!
//! [state_id_bits]
//! sampler = 12
//! pipeline = 16
//! ```
//!
//! Every key is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Upper bounds on the id widths that still fit a 64-bit draw sort key.
pub const MAX_PIPELINE_BITS: u32 = 20;
/// See [`MAX_PIPELINE_BITS`].
pub const MAX_SUBSTATE_BITS: u32 = 12;
/// Samplers are not part of the sort key; they are only bounded by `u32`.
pub const MAX_SAMPLER_BITS: u32 = 32;

/// Bit widths of the bounded id counters, per state category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateIdBits {
    /// Sampler states.
    pub sampler: u32,
    /// Rasterizer states.
    pub rasterizer: u32,
    /// Blend states.
    pub blend: u32,
    /// Depth-stencil states.
    pub depth_stencil: u32,
    /// Pipeline states.
    pub pipeline: u32,
}

impl Default for StateIdBits {
    fn default() -> Self {
        Self {
            sampler: 12,
            rasterizer: 10,
            blend: 10,
            depth_stencil: 10,
            pipeline: 16,
        }
    }
}

impl StateIdBits {
    /// Checks every width against the sort key layout.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidConfig`] naming the first bad width.
    pub fn validate(&self) -> RenderResult<()> {
        let checks = [
            ("sampler", self.sampler, MAX_SAMPLER_BITS),
            ("rasterizer", self.rasterizer, MAX_SUBSTATE_BITS),
            ("blend", self.blend, MAX_SUBSTATE_BITS),
            ("depth_stencil", self.depth_stencil, MAX_SUBSTATE_BITS),
            ("pipeline", self.pipeline, MAX_PIPELINE_BITS),
        ];
        for (name, bits, max) in checks {
            if bits == 0 || bits > max {
                return Err(RenderError::InvalidConfig(format!(
                    "state_id_bits.{name} = {bits}, expected 1..={max}"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for a [`SyncContext`](crate::SyncContext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Name given to the core thread.
    pub core_thread_name: String,
    /// Capacity of the command queue. Zero means unbounded.
    pub queue_capacity: usize,
    /// Initial capacity of each sync batch.
    pub batch_capacity: usize,
    /// Idle batches kept for reuse.
    pub retained_batches: usize,
    /// Memory budget of the headless backend, in bytes.
    pub headless_memory_budget: u64,
    /// Bounded id widths of the state caches.
    pub state_id_bits: StateIdBits,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            core_thread_name: "dyad-core".to_string(),
            queue_capacity: 0,
            batch_capacity: 256,
            retained_batches: 4,
            headless_memory_budget: 256 * 1024 * 1024,
            state_id_bits: StateIdBits::default(),
        }
    }
}

impl SyncConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a parse error or the first validation failure.
    pub fn from_toml_str(text: &str) -> RenderResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O, parse or validation error.
    pub fn load(path: impl AsRef<Path>) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks the configuration for values the sync layer cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidConfig`].
    pub fn validate(&self) -> RenderResult<()> {
        if self.core_thread_name.is_empty() {
            return Err(RenderError::InvalidConfig("core_thread_name is empty".into()));
        }
        if self.batch_capacity == 0 {
            return Err(RenderError::InvalidConfig("batch_capacity must be > 0".into()));
        }
        self.state_id_bits.validate()
    }

    /// Sets the bounded id widths.
    #[must_use]
    pub fn with_state_id_bits(mut self, bits: StateIdBits) -> Self {
        self.state_id_bits = bits;
        self
    }

    /// Sets the headless backend memory budget.
    #[must_use]
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.headless_memory_budget = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = SyncConfig::from_toml_str(
            r#"
            queue_capacity = 1024

            [state_id_bits]
            pipeline = 18
            "#,
        )
        .unwrap();
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.state_id_bits.pipeline, 18);
        assert_eq!(config.state_id_bits.blend, 10);
        assert_eq!(config.core_thread_name, "dyad-core");
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = SyncConfig::default().with_memory_budget(4096);
        let text = toml::to_string(&config).unwrap();
        assert_eq!(SyncConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_ids_wider_than_sort_key() {
        let err = SyncConfig::from_toml_str("[state_id_bits]\nblend = 13").unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(msg) if msg.contains("blend")));
    }

    #[test]
    fn test_rejects_zero_width() {
        let bits = StateIdBits { sampler: 0, ..StateIdBits::default() };
        assert!(bits.validate().is_err());
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(matches!(
            SyncConfig::from_toml_str("queue_capacity = \"lots\""),
            Err(RenderError::Toml(_))
        ));
    }
}
