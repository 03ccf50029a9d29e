/// Core constants used throughout the formflow engine
///
/// Centralizes the limits and environment names shared by the parser,
/// the configuration layer and the binary.
/// Expression limits
pub mod limits {
    /// Deepest nesting the parser accepts
    pub const MAX_EXPRESSION_DEPTH: usize = 64;

    /// Longest expression source accepted, in bytes
    pub const MAX_EXPRESSION_LENGTH: usize = 4096;

    /// Highest configurable `max_expression_depth`; parsing and evaluation recurse
    /// once per level on the calling thread's stack
    pub const MAX_EXPRESSION_DEPTH_CEILING: usize = 256;

    /// Highest configurable `max_expression_length`
    pub const MAX_EXPRESSION_LENGTH_CEILING: usize = 65_536;

    /// Compiled expressions kept per calculator
    pub const EXPRESSION_CACHE_CAPACITY: usize = 1024;

    /// Compiled validation patterns kept per processor
    pub const PATTERN_CACHE_CAPACITY: usize = 256;
}

/// Configuration discovery
pub mod config {
    /// Environment variable naming the TOML configuration file
    pub const CONFIG_PATH_ENV: &str = "FORMFLOW_CONFIG_PATH";

    /// File read when `FORMFLOW_CONFIG_PATH` is unset
    pub const DEFAULT_CONFIG_PATH: &str = "formflow.toml";

    /// Override for `max_expression_depth`
    pub const MAX_DEPTH_ENV: &str = "FORMFLOW_MAX_EXPRESSION_DEPTH";

    /// Override for `max_expression_length`
    pub const MAX_LENGTH_ENV: &str = "FORMFLOW_MAX_EXPRESSION_LENGTH";

    /// Override for `cache_expressions`
    pub const CACHE_ENV: &str = "FORMFLOW_CACHE_EXPRESSIONS";

    /// Override for `expression_cache_capacity`
    pub const EXPRESSION_CACHE_CAPACITY_ENV: &str = "FORMFLOW_EXPRESSION_CACHE_CAPACITY";

    /// Override for `pattern_cache_capacity`
    pub const PATTERN_CACHE_CAPACITY_ENV: &str = "FORMFLOW_PATTERN_CACHE_CAPACITY";
}
