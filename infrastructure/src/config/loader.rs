//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::PathBuf;

/// Environment variable prefix; `MESH_QUORUM_GATHER__QUORUM_SIZE=5` sets
/// `gather.quorum_size`.
pub const ENV_PREFIX: &str = "MESH_QUORUM_";

const PROJECT_FILES: [&str; 2] = ["mesh-quorum.toml", ".mesh-quorum.toml"];

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `MESH_QUORUM_*` environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./mesh-quorum.toml` or `./.mesh-quorum.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/mesh-quorum/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(&path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// `$XDG_CONFIG_HOME/mesh-quorum/config.toml` (or the platform
    /// equivalent).
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mesh-quorum").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(config_path: Option<&PathBuf>) {
        println!("Configuration sources (in priority order):");
        println!("  [     ] Env:     {ENV_PREFIX}<SECTION>__<KEY>");

        if let Some(path) = config_path {
            let mark = if path.exists() { "FOUND" } else { "MISSING" };
            println!("  [{mark:<5}] Explicit: {}", path.display());
        }

        if let Some(path) = Self::project_config_path() {
            println!("  [FOUND] Project: {}", path.display());
        } else {
            println!("  [     ] Project: ./mesh-quorum.toml or ./.mesh-quorum.toml");
        }

        if let Some(path) = Self::global_config_path() {
            if path.exists() {
                println!("  [FOUND] Global:  {}", path.display());
            } else {
                println!("  [     ] Global:  {}", path.display());
            }
        }

        println!("  [     ] Default: built-in defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.gather.quorum_size, 3);
        assert_eq!(config.queue.max_entries, 500);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("mesh-quorum"));
    }

    #[test]
    fn test_priority_project_explicit_env() {
        Jail::expect_with(|jail| {
            let xdg = jail.directory().join("xdg");
            jail.set_env("XDG_CONFIG_HOME", xdg.display());
            jail.create_file(
                "mesh-quorum.toml",
                "[gather]\nquorum_size = 4\ncandidate_timeout_ms = 1000\n[queue]\nmax_entries = 9\n",
            )?;
            jail.create_file("explicit.toml", "[gather]\nquorum_size = 5\n")?;
            jail.set_env("MESH_QUORUM_QUEUE__MAX_ENTRIES", "11");

            let explicit = PathBuf::from("explicit.toml");
            let config = ConfigLoader::load(Some(&explicit)).map_err(|e| *e)?;

            // Explicit file beats project file, env beats both
            assert_eq!(config.gather.quorum_size, 5);
            assert_eq!(config.gather.candidate_timeout_ms, 1_000);
            assert_eq!(config.queue.max_entries, 11);
            // Untouched sections keep defaults
            assert_eq!(config.replay.batch_limit, 50);
            Ok(())
        });
    }

    #[test]
    fn test_dotfile_project_config() {
        Jail::expect_with(|jail| {
            let xdg = jail.directory().join("xdg");
            jail.set_env("XDG_CONFIG_HOME", xdg.display());
            jail.create_file(".mesh-quorum.toml", "[mesh]\nbarrier_timeout_ms = 100\n")?;

            let config = ConfigLoader::load(None).map_err(|e| *e)?;
            assert_eq!(config.mesh.barrier_timeout_ms, 100);
            Ok(())
        });
    }
}
