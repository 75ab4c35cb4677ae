//! Runtime knobs for the matmul kernel and the backward executor.

use std::sync::OnceLock;

/// Environment variable overriding both row and column tile sizes.
pub const TILE_ENV: &str = "AUTODIFF_MATMUL_TILE";
/// Environment variable overriding the inner (reduction) tile size.
pub const INNER_TILE_ENV: &str = "AUTODIFF_MATMUL_INNER_TILE";

/// Cache blocking used by the matmul kernel.
///
/// Tiling only changes memory access order; every configuration yields the
/// same product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileConfig {
    pub rows: usize,
    pub cols: usize,
    pub inner: usize,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            rows: 256,
            cols: 256,
            inner: 16,
        }
    }
}

impl TileConfig {
    /// Defaults, with any valid environment overrides applied.
    ///
    /// Non-numeric or zero values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(tile) = read_tile(TILE_ENV) {
            config.rows = tile;
            config.cols = tile;
        }
        if let Some(inner) = read_tile(INNER_TILE_ENV) {
            config.inner = inner;
        }
        config
    }

    /// Process-wide configuration, read from the environment once.
    pub fn global() -> TileConfig {
        static GLOBAL: OnceLock<TileConfig> = OnceLock::new();
        *GLOBAL.get_or_init(|| {
            let config = TileConfig::from_env();
            log::debug!("matmul tiling: {config:?}");
            config
        })
    }
}

fn read_tile(var: &str) -> Option<usize> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(v) if v > 0 => Some(v),
        _ => {
            log::warn!("ignoring {var}={raw:?}: expected a positive integer");
            None
        }
    }
}

/// Options for a backward pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Drop the backward closure and operand edges of every ephemeral node
    /// once it has executed. The graph cannot be differentiated again after a
    /// reclaiming pass.
    pub reclaim: bool,
}

impl ExecutorConfig {
    pub fn reclaiming() -> Self {
        Self { reclaim: true }
    }
}
