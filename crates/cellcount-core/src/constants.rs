//! Constants shared by the model, its configuration and tests

/// Group lookup constants
pub mod groups {
    /// Group-key component meaning "match any value in this position"
    pub const DEFAULT_WILDCARD: &str = "__ANY__";
}

/// Configuration file and environment variable names
pub mod config {
    /// Environment variable naming the TOML configuration file
    pub const CONFIG_PATH_ENV: &str = "CELLCOUNT_CONFIG_PATH";

    /// Configuration file used when the environment variable is unset
    pub const DEFAULT_CONFIG_PATH: &str = "cellcount.toml";

    /// Environment override for the wildcard sentinel
    pub const WILDCARD_ENV: &str = "CELLCOUNT_WILDCARD";

    /// Environment override for the sampling seed
    pub const RNG_SEED_ENV: &str = "CELLCOUNT_RNG_SEED";
}

/// Random fraction threshold constants
pub mod fraction {
    /// 2^64, the span of a uniformly distributed 64-bit random column
    pub const RANDOM_COLUMN_SPAN: f64 = 18_446_744_073_709_551_616.0;

    /// 2^63, the offset from unsigned to signed 64-bit range
    pub const RANDOM_COLUMN_OFFSET: f64 = 9_223_372_036_854_775_808.0;
}
