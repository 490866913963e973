//! Monte Carlo run configuration.

use thiserror::Error;

/// Minimum number of simulation paths.
pub const MIN_PATHS: usize = 1_000;

/// Maximum number of simulation paths.
pub const MAX_PATHS: usize = 1_000_000;

/// Minimum paths per block.
pub const MIN_BLOCK_SIZE: usize = 1_000;

/// Configuration errors raised at build/validate time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Path count outside [1_000, 1_000_000].
    #[error("Invalid path count {0}: must be in range [1000, 1000000]")]
    InvalidPathCount(usize),

    /// Block size below the minimum.
    #[error("Invalid block size {0}: must be at least 1000")]
    InvalidBlockSize(usize),
}

/// Monte Carlo run configuration.
///
/// Use [`RunConfig::builder`] to construct validated instances.
///
/// # Examples
///
/// ```
/// use autocall_pricing::config::RunConfig;
///
/// let config = RunConfig::builder()
///     .n_paths(50_000)
///     .seed(12345)
///     .block_size(10_000)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.n_paths(), 50_000);
/// assert_eq!(config.seed(), Some(12345));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    n_paths: usize,
    seed: Option<u64>,
    block_size: usize,
    antithetic: bool,
}

impl RunConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Number of simulation paths.
    #[inline]
    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    /// Optional seed; `None` makes the run nondeterministic.
    #[inline]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Maximum paths per simulation block.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Antithetic-variates flag.
    ///
    /// Reserved: carried through the configuration but not applied by the
    /// path generator.
    #[inline]
    pub fn antithetic(&self) -> bool {
        self.antithetic
    }

    /// Returns a copy with the seed replaced.
    pub fn with_seed(&self, seed: u64) -> RunConfig {
        RunConfig {
            seed: Some(seed),
            ..self.clone()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path count or block size is out of
    /// range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_paths < MIN_PATHS || self.n_paths > MAX_PATHS {
            return Err(ConfigError::InvalidPathCount(self.n_paths));
        }
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(ConfigError::InvalidBlockSize(self.block_size));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n_paths: 100_000,
            seed: None,
            block_size: 50_000,
            antithetic: true,
        }
    }
}

/// Builder for [`RunConfig`].
#[derive(Clone, Debug)]
pub struct RunConfigBuilder {
    n_paths: usize,
    seed: Option<u64>,
    block_size: usize,
    antithetic: bool,
}

impl Default for RunConfigBuilder {
    fn default() -> Self {
        let defaults = RunConfig::default();
        Self {
            n_paths: defaults.n_paths,
            seed: defaults.seed,
            block_size: defaults.block_size,
            antithetic: defaults.antithetic,
        }
    }
}

impl RunConfigBuilder {
    /// Sets the number of paths (in [1_000, 1_000_000]).
    #[inline]
    pub fn n_paths(mut self, n_paths: usize) -> Self {
        self.n_paths = n_paths;
        self
    }

    /// Sets the seed for reproducibility.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the block size (>= 1_000).
    #[inline]
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets the reserved antithetic flag.
    #[inline]
    pub fn antithetic(mut self, antithetic: bool) -> Self {
        self.antithetic = antithetic;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for out-of-range parameters.
    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let config = RunConfig {
            n_paths: self.n_paths,
            seed: self.seed,
            block_size: self.block_size,
            antithetic: self.antithetic,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = RunConfig::builder().build().unwrap();
        assert_eq!(config.n_paths(), 100_000);
        assert_eq!(config.seed(), None);
        assert_eq!(config.block_size(), 50_000);
        assert!(config.antithetic());
    }

    #[test]
    fn test_builder_overrides() {
        let config = RunConfig::builder()
            .n_paths(10_000)
            .seed(7)
            .block_size(5_000)
            .antithetic(false)
            .build()
            .unwrap();

        assert_eq!(config.n_paths(), 10_000);
        assert_eq!(config.seed(), Some(7));
        assert_eq!(config.block_size(), 5_000);
        assert!(!config.antithetic());
    }

    #[test]
    fn test_path_count_bounds() {
        assert!(matches!(
            RunConfig::builder().n_paths(999).build(),
            Err(ConfigError::InvalidPathCount(999))
        ));
        assert!(matches!(
            RunConfig::builder().n_paths(MAX_PATHS + 1).build(),
            Err(ConfigError::InvalidPathCount(_))
        ));
        assert!(RunConfig::builder().n_paths(MIN_PATHS).build().is_ok());
        assert!(RunConfig::builder().n_paths(MAX_PATHS).build().is_ok());
    }

    #[test]
    fn test_block_size_bounds() {
        assert!(matches!(
            RunConfig::builder().block_size(500).build(),
            Err(ConfigError::InvalidBlockSize(500))
        ));
        assert!(RunConfig::builder().block_size(MIN_BLOCK_SIZE).build().is_ok());
    }

    #[test]
    fn test_with_seed() {
        let config = RunConfig::builder().n_paths(10_000).build().unwrap();
        let seeded = config.with_seed(99);
        assert_eq!(seeded.seed(), Some(99));
        assert_eq!(seeded.n_paths(), 10_000);
    }
}
