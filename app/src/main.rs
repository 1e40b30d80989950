use std::error::Error;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::Parser;
use pgview_core::profiles::{
    default_config_dir, ConnectionProfile, FileProfilesStore, ProfilesError,
};
use pgview_core::saved_queries::{SavedQueriesError, SavedQueryStore};
use pgview_tui::{LaunchOptions, TuiError};
use thiserror::Error;
use tracing::{info, warn};

const LOG_FILE_NAME: &str = "pgview.log";
const LOG_FILTER_ENV: &str = "PGVIEW_LOG";

#[derive(Debug, Parser)]
#[command(name = "pgview", version, about = "Browse PostgreSQL tables from the terminal")]
struct Cli {
    /// Connection profile from profiles.toml.
    #[arg(long, conflicts_with = "demo")]
    profile: Option<String>,
    /// Connect to the public read-only demo database.
    #[arg(long)]
    demo: bool,
    /// Rows fetched per page.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    row_limit: Option<u32>,
    /// Directory for CSV and JSON exports.
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum LaunchError {
    #[error("profile `{name}` not found in {}", path.display())]
    UnknownProfile { name: String, path: PathBuf },
    #[error(transparent)]
    Profiles(#[from] ProfilesError),
    #[error(transparent)]
    SavedQueries(#[from] SavedQueriesError),
}

/// `--demo` wins, then a named profile, then `DB_*` variables. An environment without a
/// host and database falls back to the demo database.
fn resolve_profile(
    cli: &Cli,
    profiles: &FileProfilesStore,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Result<ConnectionProfile, LaunchError> {
    if cli.demo {
        return Ok(ConnectionProfile::demo());
    }
    if let Some(name) = &cli.profile {
        return profiles
            .profile(name)
            .cloned()
            .ok_or_else(|| LaunchError::UnknownProfile {
                name: name.clone(),
                path: profiles.path().to_path_buf(),
            });
    }

    let profile = ConnectionProfile::from_env_with(lookup_env)?;
    if profile.is_complete() {
        Ok(profile)
    } else {
        info!("no DB_NAME configured; using the demo database");
        Ok(ConnectionProfile::demo())
    }
}

fn build_options(
    cli: &Cli,
    profiles: &FileProfilesStore,
    saved_queries: SavedQueryStore,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Result<LaunchOptions, LaunchError> {
    let profile = resolve_profile(cli, profiles, lookup_env)?;
    let mut options = LaunchOptions::new(profile, saved_queries);
    if let Some(row_limit) = cli.row_limit {
        options.row_limit = row_limit;
    }
    if let Some(export_dir) = &cli.export_dir {
        options.export_dir.clone_from(export_dir);
    }
    Ok(options)
}

fn init_logging(config_dir: &Path) -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    fs::create_dir_all(config_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config_dir.join(LOG_FILE_NAME))?;

    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

fn run_app(
    options: LaunchOptions,
    run_tui: impl FnOnce(LaunchOptions) -> Result<(), TuiError>,
) -> Result<(), Box<dyn Error>> {
    info!(
        profile = %options.profile.name,
        row_limit = options.row_limit,
        "starting pgview"
    );
    run_tui(options)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config_dir = default_config_dir()?;
    if let Err(err) = init_logging(&config_dir) {
        eprintln!("pgview: logging disabled: {err}");
    }

    let profiles = FileProfilesStore::load_default()?;
    let saved_queries = SavedQueryStore::open_default()?;
    let options = build_options(&cli, &profiles, saved_queries, |key| std::env::var(key).ok())?;
    if options.profile.read_only {
        warn!(profile = %options.profile.name, "session is read-only");
    }

    run_app(options, pgview_tui::run)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::path::PathBuf;

    use clap::Parser;
    use pgview_core::profiles::{ConnectionProfile, FileProfilesStore, DEMO_PROFILE_NAME};
    use pgview_core::saved_queries::SavedQueryStore;
    use tempfile::TempDir;

    use super::{build_options, run_app, Cli, LaunchError};

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<HashMap<_, _>>();
        move |key| values.get(key).cloned()
    }

    fn empty_store(temp_dir: &TempDir) -> FileProfilesStore {
        FileProfilesStore::load_from_path(temp_dir.path().join("profiles.toml"))
            .expect("missing profiles file should load empty")
    }

    #[test]
    fn demo_flag_selects_demo_profile() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let cli = Cli::parse_from(["pgview", "--demo", "--row-limit", "25"]);

        let options = build_options(
            &cli,
            &empty_store(&temp_dir),
            SavedQueryStore::new(temp_dir.path()),
            env_from(&[("DB_NAME", "shop")]),
        )
        .expect("options should build");
        assert_eq!(options.profile.name, DEMO_PROFILE_NAME);
        assert_eq!(options.row_limit, 25);
    }

    #[test]
    fn complete_environment_beats_demo_default() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let cli = Cli::parse_from(["pgview", "--export-dir", "/tmp/exports"]);

        let options = build_options(
            &cli,
            &empty_store(&temp_dir),
            SavedQueryStore::new(temp_dir.path()),
            env_from(&[("DB_HOST", "db.internal"), ("DB_NAME", "shop"), ("DB_USER", "app")]),
        )
        .expect("options should build");
        assert_eq!(options.profile.host, "db.internal");
        assert_eq!(options.profile.database.as_deref(), Some("shop"));
        assert_eq!(options.row_limit, 50);
        assert_eq!(options.export_dir, PathBuf::from("/tmp/exports"));

        let fallback = build_options(
            &cli,
            &empty_store(&temp_dir),
            SavedQueryStore::new(temp_dir.path()),
            env_from(&[]),
        )
        .expect("options should build");
        assert_eq!(fallback.profile.name, DEMO_PROFILE_NAME);
    }

    #[test]
    fn named_profile_comes_from_store() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("profiles.toml");
        std::fs::write(
            &path,
            "[[profiles]]\nname = \"staging\"\nhost = \"10.0.0.5\"\nport = 5432\n\
             user = \"reader\"\ndatabase = \"analytics\"\n",
        )
        .expect("failed to write profiles file");
        let store = FileProfilesStore::load_from_path(&path).expect("profiles should load");

        let cli = Cli::parse_from(["pgview", "--profile", "staging"]);
        let options = build_options(
            &cli,
            &store,
            SavedQueryStore::new(temp_dir.path()),
            env_from(&[]),
        )
        .expect("options should build");
        assert_eq!(options.profile.host, "10.0.0.5");

        let missing = Cli::parse_from(["pgview", "--profile", "prod"]);
        let err = build_options(
            &missing,
            &store,
            SavedQueryStore::new(temp_dir.path()),
            env_from(&[]),
        )
        .expect_err("unknown profile should fail");
        assert!(matches!(err, LaunchError::UnknownProfile { .. }));
    }

    #[test]
    fn zero_row_limit_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["pgview", "--row-limit", "0"]).is_err());
        assert!(Cli::try_parse_from(["pgview", "--demo", "--profile", "x"]).is_err());
    }

    #[test]
    fn run_app_propagates_tui_errors() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let options = pgview_tui::LaunchOptions::new(
            ConnectionProfile::demo(),
            SavedQueryStore::new(temp_dir.path()),
        );
        assert!(run_app(options.clone(), |_| Ok(())).is_ok());
        let result = run_app(options, |_| {
            Err(pgview_tui::TuiError::Io(io::Error::other("boom")))
        });
        assert!(result.is_err());
    }
}
