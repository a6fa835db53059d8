//! Path expansion (spec.md §6)
//!
//! Two substitutions are supported: a leading `%TEMP%` (optionally followed
//! by a path separator) resolves to the system temp directory, and any
//! `${name}` anywhere in the string interpolates an environment variable.
//! A "secure" mode refuses to expand (returns an error for) any path that
//! contains either token, so a caller that can't fully trust the path's
//! origin can opt out of substitution entirely rather than risk injection.

use std::env;

use crate::config::PathConfig;
use crate::tiff::errors::{TiffError, TiffResult};

/// Expands `%TEMP%` and `${name}` tokens in `path` per `config`. In secure
/// mode, a path containing either token is rejected outright rather than
/// expanded.
pub fn expand_path(path: &str, config: &PathConfig) -> TiffResult<String> {
    if config.secure_paths {
        if path.contains('%') || path.contains("${") {
            return Err(TiffError::ParameterOutOfRange(format!(
                "secure path mode rejects substitution tokens in \"{}\"",
                path
            )));
        }
        return Ok(path.to_string());
    }

    let after_temp = expand_temp_prefix(path)?;
    expand_env_braces(&after_temp)
}

fn expand_temp_prefix(path: &str) -> TiffResult<String> {
    const TOKEN: &str = "%TEMP%";
    if !path.starts_with(TOKEN) {
        return Ok(path.to_string());
    }
    let temp_dir = env::temp_dir();
    let temp_dir_str = temp_dir.to_string_lossy();
    let rest = &path[TOKEN.len()..];
    let rest = rest.strip_prefix(std::path::MAIN_SEPARATOR).or_else(|| rest.strip_prefix('/')).unwrap_or(rest);
    if rest.is_empty() {
        Ok(temp_dir_str.to_string())
    } else {
        Ok(format!("{}{}{}", temp_dir_str, std::path::MAIN_SEPARATOR, rest))
    }
}

/// Interpolates every `${name}` occurrence with the environment/system
/// property `name`. A reference to an undefined variable is an error
/// rather than silently becoming an empty string, since a silently-dropped
/// segment would produce a plausible-looking but wrong path.
fn expand_env_braces(path: &str) -> TiffResult<String> {
    let mut result = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open.find('}').ok_or_else(|| {
            TiffError::ParameterOutOfRange(format!("unterminated \"${{\" in path \"{}\"", path))
        })?;
        let name = &after_open[..end];
        let value = env::var(name)
            .map_err(|_| TiffError::ParameterOutOfRange(format!("undefined variable \"{}\" in path", name)))?;
        result.push_str(&value);
        rest = &after_open[end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_prefix_expands_to_system_temp_dir() {
        let cfg = PathConfig::default();
        let expanded = expand_path("%TEMP%/scratch.tif", &cfg).unwrap();
        assert!(expanded.starts_with(&env::temp_dir().to_string_lossy().to_string()));
        assert!(expanded.ends_with("scratch.tif"));
    }

    #[test]
    fn env_braces_interpolate() {
        env::set_var("PYRAMID_TIFF_TEST_VAR", "hello");
        let cfg = PathConfig::default();
        let expanded = expand_path("${PYRAMID_TIFF_TEST_VAR}/x.tif", &cfg).unwrap();
        assert_eq!(expanded, "hello/x.tif");
    }

    #[test]
    fn secure_mode_rejects_percent_token() {
        let cfg = PathConfig { secure_paths: true };
        assert!(expand_path("%TEMP%/x.tif", &cfg).is_err());
    }

    #[test]
    fn secure_mode_rejects_brace_token() {
        let cfg = PathConfig { secure_paths: true };
        assert!(expand_path("${HOME}/x.tif", &cfg).is_err());
    }

    #[test]
    fn secure_mode_passes_plain_path() {
        let cfg = PathConfig { secure_paths: true };
        assert_eq!(expand_path("/data/slide.tif", &cfg).unwrap(), "/data/slide.tif");
    }

    #[test]
    fn plain_path_without_tokens_is_unchanged() {
        let cfg = PathConfig::default();
        assert_eq!(expand_path("/data/slide.tif", &cfg).unwrap(), "/data/slide.tif");
    }
}
