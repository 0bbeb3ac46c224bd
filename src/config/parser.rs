use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Relative paths inside the file (database, seed files, text output) are
/// used as written, i.e. relative to the working directory.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so a run can be matched to the exact settings it used.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&content)))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::SeedConfig;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[database]
path = "crawler.db"

[crawler]
user-agent = "TestRobot/2.0"
timeout-secs = 10
delay-ms = 500
recrawl-every-secs = 3600

[text]
output-dir = "corpus/docs"
min-chars = 100

[[sources]]
name = "ruwiki"
[sources.seed]
kind = "wiki-category"
api = "https://ru.wikipedia.org/w/api.php"
category = "Категория:Физика"
page-url-pattern = "https://ru.wikipedia.org/?curid={pageid}"
max-seed = 100

[[sources]]
name = "list"
[sources.seed]
kind = "seed-file"
path = "seeds.txt"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.database.path, PathBuf::from("crawler.db"));
        assert_eq!(config.crawler.user_agent, "TestRobot/2.0");
        assert_eq!(config.crawler.timeout(), Duration::from_secs(10));
        assert_eq!(config.crawler.delay(), Duration::from_millis(500));
        assert_eq!(config.crawler.recrawl_interval(), Duration::from_secs(3600));
        // Unset keys fall back to defaults
        assert_eq!(config.crawler.idle_poll(), Duration::from_millis(250));
        assert_eq!(config.crawler.backoff_policy().max_backoff_secs, 3600);

        assert_eq!(config.text.output_dir, Some(PathBuf::from("corpus/docs")));
        assert_eq!(config.text.min_chars, 100);

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name, "ruwiki");
        assert!(matches!(
            config.sources[0].seed,
            SeedConfig::WikiCategory {
                max_seed: Some(100),
                ..
            }
        ));
        assert_eq!(
            config.sources[1].seed,
            SeedConfig::SeedFile {
                path: PathBuf::from("seeds.txt")
            }
        );
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = create_temp_config("[database]\npath = \"robot.db\"\n");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.user_agent, "recrawl-robot/1.0");
        assert_eq!(config.crawler.timeout_secs, 30);
        assert_eq!(config.crawler.delay_ms, 200);
        assert_eq!(config.crawler.recrawl_every_secs, 86_400);
        assert_eq!(config.crawler.backoff_cap_exponent, 12);
        assert_eq!(config.text.output_dir, None);
        assert_eq!(config.text.min_chars, 800);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_missing_database_section() {
        let result = parse_config("[crawler]\ndelay-ms = 100\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_seed_kind() {
        let content = r#"
[database]
path = "robot.db"

[[sources]]
name = "x"
[sources.seed]
kind = "sitemap"
"#;
        assert!(matches!(parse_config(content), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config(
            "[database]\npath = \"robot.db\"\n\n[crawler]\nrecrawl-every-secs = 0\n",
        );
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_load_config_with_hash() {
        let file1 = create_temp_config("[database]\npath = \"a.db\"\n");
        let file2 = create_temp_config("[database]\npath = \"b.db\"\n");

        let (_, hash1) = load_config_with_hash(file1.path()).unwrap();
        let (_, hash2) = load_config_with_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
