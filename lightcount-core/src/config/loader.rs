use std::fs;
use std::path::Path;

use super::types::{Config, SinkBackend};
use crate::error::{ConfigError, ConfigResult};

/// Load, parse and validate a TOML config file. Grounded on the teacher's
/// `config::loader::load_from_path` (read-then-parse-then-validate shape).
pub fn load_from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Config> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    let config: Config = toml::from_str(&text)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> ConfigResult<()> {
    if config.hash_bits == 0 || config.hash_bits > 32 {
        return Err(ConfigError::Invalid(format!(
            "hash_bits must be in 1..=32, got {}",
            config.hash_bits
        )));
    }
    if config.bucket_size == 0 {
        return Err(ConfigError::Invalid("bucket_size must be positive".to_string()));
    }
    if config.interval_seconds == 0 {
        return Err(ConfigError::Invalid("interval_seconds must be positive".to_string()));
    }
    if config.sink.backend == SinkBackend::Sql && config.sink.sql.is_none() {
        return Err(ConfigError::Invalid(
            "sink.backend = \"sql\" requires a [sink.sql] section".to_string(),
        ));
    }
    for range in &config.ip_ranges {
        if u32::from(range.begin) > u32::from(range.end) {
            return Err(ConfigError::Invalid(format!(
                "ip range begin {} is after end {}",
                range.begin, range.end
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("tmp file");
        f.write_all(contents.as_bytes()).expect("write");
        f
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let f = write_temp("");
        let config = load_from_path(f.path()).expect("should load");
        assert_eq!(config.interface, "any");
        assert_eq!(config.interval_seconds, 300);
        assert_eq!(config.hash_bits, 18);
    }

    #[test]
    fn rejects_sql_backend_without_sql_section() {
        let f = write_temp("[sink]\nbackend = \"sql\"\n");
        let err = load_from_path(f.path()).expect_err("should fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_missing_file() {
        let err = load_from_path("/nonexistent/path/lightcount.toml").expect_err("should fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn rejects_inverted_ip_range() {
        let f = write_temp(
            "[[ip_ranges]]\nbegin = \"10.0.0.255\"\nend = \"10.0.0.0\"\n",
        );
        let err = load_from_path(f.path()).expect_err("should fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
