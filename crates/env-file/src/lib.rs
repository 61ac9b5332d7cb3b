use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Values read from a dotenv file, without touching the process environment.
///
/// A missing file behaves like an empty one. Later duplicates win.
#[derive(Clone, Default)]
pub struct EnvFile {
    values: HashMap<String, String>,
}

impl EnvFile {
    /// Parse the dotenv file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(err) if err.not_found() => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read env file {}", path.display()));
            }
        };

        let mut values = HashMap::new();
        for item in iter {
            let (key, value) =
                item.with_context(|| format!("Failed to parse env file {}", path.display()))?;
            values.insert(key, value);
        }
        Ok(Self { values })
    }

    /// Load a single value by key from the env file.
    pub fn load_value(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// Look a key up in the process environment first, then in the file.
    pub fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.load_value(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_env(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "env_file_{}_{}.env",
            name,
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_value() {
        let path = temp_env("load_value", "RPC_URL=http://localhost:8545\nCHAIN_ID=8408\n");
        let env = EnvFile::load(&path).unwrap();

        assert_eq!(env.load_value("CHAIN_ID"), Some("8408".to_string()));
        assert_eq!(
            env.load_value("RPC_URL"),
            Some("http://localhost:8545".to_string())
        );

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file_is_empty() {
        let env = EnvFile::load("/nonexistent/env_file_test.env").unwrap();
        assert_eq!(env.load_value("KEY1"), None);
    }

    #[test]
    fn test_comments_quotes_and_export() {
        let path = temp_env(
            "syntax",
            "# accounts\n\nexport ACCOUNT_ADDRESS_1=\"0xabc\"\nPRIVATE_KEY_1='0x123'\nKEY1=value1\nKEY1=override\n",
        );
        let env = EnvFile::load(&path).unwrap();

        assert_eq!(env.load_value("ACCOUNT_ADDRESS_1"), Some("0xabc".to_string()));
        assert_eq!(env.load_value("PRIVATE_KEY_1"), Some("0x123".to_string()));
        assert_eq!(env.load_value("KEY1"), Some("override".to_string()));
        assert_eq!(env.load_value("# accounts"), None);

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_inline_comment_stripped() {
        let path = temp_env("inline", "PRIVATE_KEY_1=0xabc # deployer\n");
        let env = EnvFile::load(&path).unwrap();

        assert_eq!(env.load_value("PRIVATE_KEY_1"), Some("0xabc".to_string()));

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_malformed_line_is_error() {
        let path = temp_env("malformed", "GOOD=1\nNOT A PAIR\n");
        assert!(EnvFile::load(&path).is_err());
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_lookup_falls_back_to_file() {
        let path = temp_env("lookup", "ENV_FILE_TEST_ONLY_IN_FILE=from-file\n");
        let env = EnvFile::load(&path).unwrap();

        assert_eq!(
            env.lookup("ENV_FILE_TEST_ONLY_IN_FILE"),
            Some("from-file".to_string())
        );
        assert_eq!(env.lookup("ENV_FILE_TEST_MISSING_EVERYWHERE"), None);

        fs::remove_file(path).unwrap();
    }
}
