//! Runtime context for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tsync_core::timestamp::local_now;
use tsync_core::Config;
use tsync_db::DuckDbBackend;
use tsync_meta::CanonicalDb;
use tsync_pipeline::PipelineContext;

use crate::cli::GlobalArgs;

/// Source and destination connections for one command
pub struct Stores {
    pub source: DuckDbBackend,
    pub destination: DuckDbBackend,
}

/// Runtime context containing the loaded config and canonical store
pub struct RuntimeContext {
    /// Config with store overrides from the command line applied
    pub config: Config,

    /// Canonical store connection
    pub canonical: CanonicalDb,
}

impl RuntimeContext {
    /// Create a new runtime context from global arguments
    pub fn new(args: &GlobalArgs) -> Result<Self> {
        let project_path = Path::new(&args.project_dir);

        let mut config = if let Some(config_path) = &args.config {
            Config::load(Path::new(config_path)).context("Failed to load configuration file")?
        } else {
            Config::load_from_dir(project_path).context("Failed to load project configuration")?
        };

        if let Some(path) = &args.canonical {
            config.canonical.path = path.clone();
        }
        if let Some(path) = &args.source {
            config.source.path = Some(path.clone());
        }
        if let Some(path) = &args.destination {
            config.destination.path = Some(path.clone());
        }
        config.canonical.path = resolve(project_path, &config.canonical.path);
        config.source.path = config.source.path.map(|p| resolve(project_path, &p));
        config.destination.path = config.destination.path.map(|p| resolve(project_path, &p));

        let canonical = CanonicalDb::open_str(&config.canonical.path).with_context(|| {
            format!("Failed to open canonical store at {}", config.canonical.path)
        })?;
        log::debug!(
            "Loaded '{}' with canonical store {}",
            config.name,
            config.canonical.path
        );

        Ok(Self { config, canonical })
    }

    /// Current local wall-clock time in the configured zone
    pub fn now(&self) -> chrono::NaiveDateTime {
        local_now(self.config.timezone.utc_offset_minutes)
    }

    /// Connect to both the source historian and the destination.
    pub fn open_stores(&self) -> Result<Stores> {
        Ok(Stores {
            source: self.open_source()?,
            destination: self.open_destination()?,
        })
    }

    /// Connect to the destination only, for commands that never read the
    /// historian. The source slot is an empty in-memory store.
    pub fn open_destination_stores(&self) -> Result<Stores> {
        Ok(Stores {
            source: DuckDbBackend::in_memory().context("Failed to create placeholder source")?,
            destination: self.open_destination()?,
        })
    }

    /// Borrow the stores as a pipeline context
    pub fn pipeline<'a>(&'a self, stores: &'a Stores) -> PipelineContext<'a> {
        PipelineContext {
            config: &self.config,
            canonical: &self.canonical,
            source: &stores.source,
            destination: &stores.destination,
        }
    }

    fn open_source(&self) -> Result<DuckDbBackend> {
        let path = self
            .config
            .source
            .path
            .as_deref()
            .context("No source historian configured: pass --source or set TSYNC_SOURCE")?;
        DuckDbBackend::new(path)
            .with_context(|| format!("Failed to connect to source historian at {path}"))
    }

    fn open_destination(&self) -> Result<DuckDbBackend> {
        let path = self
            .config
            .destination
            .path
            .as_deref()
            .context("No destination store configured: pass --destination or set TSYNC_DESTINATION")?;
        DuckDbBackend::new(path)
            .with_context(|| format!("Failed to connect to destination store at {path}"))
    }
}

/// Resolve a store path against the project directory. `:memory:` and
/// absolute paths pass through.
fn resolve(project_dir: &Path, path: &str) -> String {
    if path == ":memory:" || Path::new(path).is_absolute() {
        return path.to_string();
    }
    let joined: PathBuf = project_dir.join(path);
    joined.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_memory_and_absolute_paths() {
        let dir = Path::new("/srv/plant");
        assert_eq!(resolve(dir, ":memory:"), ":memory:");
        assert_eq!(resolve(dir, "/data/hist.duckdb"), "/data/hist.duckdb");
        assert_eq!(
            resolve(dir, "target/canonical.duckdb"),
            "/srv/plant/target/canonical.duckdb"
        );
    }

    #[test]
    fn overrides_replace_config_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tsync.yml"),
            "name: plant\ncanonical:\n  path: state/canonical.duckdb\n",
        )
        .unwrap();
        let args = GlobalArgs {
            verbose: false,
            project_dir: dir.path().display().to_string(),
            config: None,
            canonical: Some(":memory:".to_string()),
            source: Some("hist.duckdb".to_string()),
            destination: None,
        };

        let ctx = RuntimeContext::new(&args).unwrap();

        assert_eq!(ctx.config.canonical.path, ":memory:");
        assert_eq!(
            ctx.config.source.path,
            Some(dir.path().join("hist.duckdb").display().to_string())
        );
        let err = ctx.open_stores().err().unwrap();
        assert!(err.to_string().contains("TSYNC_DESTINATION"));
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let args = GlobalArgs {
            verbose: false,
            project_dir: dir.path().display().to_string(),
            config: None,
            canonical: None,
            source: None,
            destination: None,
        };
        let err = RuntimeContext::new(&args).err().unwrap();
        assert!(format!("{err:#}").contains("tsync.yml"));
    }
}
