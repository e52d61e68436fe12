//! Small environment-variable helpers, grounded on the `zksync_utils`
//! functions referenced (but not vendored with source) by
//! `core/lib/config/src/lib.rs`: `get_env`, `parse_env`,
//! `parse_env_if_exists`. Config structs prefer the `envy_load!` macro in
//! `graphnode_config` for whole structs; these free functions cover the
//! handful of single-value knobs read outside of that macro (e.g. the
//! object-storage credentials, which are optional and looked up by their
//! bare AWS-style names rather than a common prefix).

use std::env;
use std::fmt;
use std::str::FromStr;

/// Reads a required environment variable, panicking with the variable name
/// if it is missing. Intended for process-startup configuration only.
pub fn get_env(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("environment variable {name} is not set"))
}

/// Parses a required environment variable into `T`, panicking on a missing
/// or unparsable value.
pub fn parse_env<T>(name: &str) -> T
where
    T: FromStr,
    T::Err: fmt::Debug,
{
    get_env(name)
        .parse()
        .unwrap_or_else(|e| panic!("failed to parse environment variable {name}: {e:?}"))
}

/// Parses an optional environment variable, returning `None` if it is unset.
pub fn parse_env_if_exists<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Debug,
{
    env::var(name)
        .ok()
        .map(|v| v.parse().unwrap_or_else(|e| panic!("failed to parse environment variable {name}: {e:?}")))
}

/// Parses a required environment variable with a custom parsing function,
/// for values that don't implement `FromStr` (e.g. comma-separated lists).
pub fn parse_env_with<T>(name: &str, parser: impl FnOnce(&str) -> T) -> T {
    parser(&get_env(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_if_exists_returns_none_when_unset() {
        let value: Option<u32> = parse_env_if_exists("GRAPHNODE_UTILS_TEST_UNSET_VAR");
        assert_eq!(value, None);
    }
}
