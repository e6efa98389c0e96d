pub mod models {
    pub mod graph;
    pub mod ideal;
    pub mod problem;
    pub mod shed;
}

pub mod client;
pub mod config;
pub mod source;
pub mod utils;
pub mod services {
    pub mod analysis;
    pub mod builder;
    pub mod charts;
    pub mod fake_data;
    pub mod ideals;
    pub mod messages;
    pub mod normalize;
    pub mod problems;
    pub mod refresh;
    pub mod store;
    #[cfg(test)]
    pub mod testing;
    pub mod units;
}

use crate::client::ShedClient;
use crate::config::{Config, SourceMode};
use crate::models::graph::Scope;
use crate::models::shed::Resolution;
use crate::services::fake_data::FakeSource;
use crate::services::ideals::{IdealResolver, IdealTable};
use crate::services::refresh::Refresher;
use crate::services::store::{Snapshot, SnapshotStore};
use crate::services::units::{TemperatureUnit, format_ideal, format_reading, time_since, unit_suffix};
use crate::source::TelemetrySource;
use chrono::Utc;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Default)]
struct CliArgs {
    env_file: Option<PathBuf>,
    once: bool,
}

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

pub fn run(once: bool) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (source={:?}, base_url={}, refresh_interval={}s, http_timeout={}s, workers={}, unit={}, ideals={})",
        cfg.source_mode,
        cfg.source_base_url,
        cfg.refresh_interval.as_secs(),
        cfg.http_timeout.as_secs(),
        cfg.fetch_workers,
        cfg.temperature_unit,
        cfg.ideals_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string())
    );

    // 2) Telemetry source
    let source: Box<dyn TelemetrySource> = match cfg.source_mode {
        SourceMode::Http => Box::new(ShedClient::new(&cfg.source_base_url, cfg.http_timeout)),
        SourceMode::Fake => {
            info!("Using synthetic sensor network");
            Box::new(FakeSource::live())
        }
    };

    // 3) Ideal rules
    let table = match &cfg.ideals_file {
        Some(path) => IdealTable::load(path).map_err(|e| format!("Loading ideals failed: {}", e))?,
        None => IdealTable::greenhouse(),
    };
    info!("Loaded {} ideal rule(s)", table.rules().len());
    let resolver = IdealResolver::new(Arc::new(table));

    // 4) Refresh
    let store = SnapshotStore::new();
    let refresher = Refresher::new(source.as_ref(), &resolver, &store, cfg.fetch_workers);
    if once {
        let report = refresher
            .run_cycle()
            .map_err(|e| format!("Refresh failed: {}", e))?;
        info!(
            "Refresh: built {} site(s), {} zone(s), {}/{} device(s) in {:.2?}",
            report.sites, report.zones, report.devices, report.expected_devices, report.elapsed
        );
        if let Some(snapshot) = store.current() {
            print_snapshot(&snapshot, cfg.temperature_unit);
        }
        return Ok(());
    }

    info!("Starting refresh loop: interval={}s", cfg.refresh_interval.as_secs());
    refresher.run_loop(cfg.refresh_interval)
}

fn print_snapshot(snapshot: &Snapshot, unit: TemperatureUnit) {
    let generation = &snapshot.generation;
    let now = Utc::now();
    for site in generation.site_refs() {
        let scope = Scope::Site(site);
        let okay = if generation.is_okay(scope, now) { "okay" } else { "attention" };
        println!("{} [{}]", generation.name_of(scope), okay);
        for row in generation.summary(scope, now) {
            println!(
                "  {:<12} {:>12}  ideal {:<24} {:<10} last {}",
                row.data_type.label(),
                format_reading(row.data_type, row.current, unit),
                format_ideal(generation.ideal(scope, row.data_type), unit),
                row.status.label(),
                row.last_reading
                    .map(|ts| time_since(ts, now))
                    .unwrap_or_else(|| "never".to_string())
            );
        }
        let chart = generation.chart(scope, Resolution::EveryMinute, unit);
        if let Some(latest) = chart.rows.first() {
            let cells: Vec<String> = chart
                .types
                .iter()
                .zip(&latest.values)
                .map(|(t, v)| match v {
                    Some(v) => format!("{}={:.2}{}", t.label(), v, unit_suffix(*t, unit)),
                    None => format!("{}=-", t.label()),
                })
                .collect();
            println!("  chart {} @ {}: {}", chart.resolution.label(), latest.timestamp, cells.join(" "));
        }
    }

    if snapshot.problems.is_empty() {
        println!("No problems.");
    } else {
        println!("{} problem(s):", snapshot.problems.len());
        for problem in &snapshot.problems {
            println!("  - {}", problem.message());
        }
    }
}

fn parse_cli() -> Result<CliArgs, String> {
    let mut args = std::env::args_os();
    args.next(); // skip program name

    let mut cli = CliArgs::default();
    while let Some(arg) = args.next() {
        let arg = arg.to_str().ok_or_else(|| "argument contains invalid UTF-8".to_string())?;
        let env_file = match arg {
            "--once" => {
                cli.once = true;
                continue;
            }
            "--env-file" => args
                .next()
                .map(PathBuf::from)
                .ok_or_else(|| "`--env-file` requires a path argument".to_string())?,
            s if s.starts_with("--env-file=") => match &s["--env-file=".len()..] {
                "" => return Err("`--env-file` requires a path argument".to_string()),
                path => PathBuf::from(path),
            },
            "--" => break,
            other => return Err(format!("unrecognised argument: {}", other)),
        };
        if cli.env_file.replace(env_file).is_some() {
            return Err("`--env-file` provided more than once".to_string());
        }
    }
    Ok(cli)
}

fn configure_env(explicit: Option<PathBuf>) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        load_env_file(&path)?;
        return Ok(Some(LoadedEnvFile { path, explicit: true }));
    }
    let path = Path::new(".env").to_path_buf();
    if path.is_file() {
        load_env_file(&path)?;
        Ok(Some(LoadedEnvFile { path, explicit: false }))
    } else {
        Ok(None)
    }
}

fn load_env_file(path: &Path) -> Result<(), String> {
    let body = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    for (index, line) in body.lines().enumerate() {
        let Some((key, value)) =
            parse_env_assignment(line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?
        else {
            continue;
        };
        // Process environment wins over the file.
        if std::env::var_os(&key).is_none() {
            // Updating process-level environment variables is unsafe on some targets.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

fn parse_env_assignment(line: &str) -> Result<Option<(String, String)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let assignment = trimmed.strip_prefix("export ").map(str::trim_start).unwrap_or(trimmed);
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return Err(format!("invalid environment variable name: `{}`", key));
    }

    let raw = raw.trim();
    let value = match raw.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = &raw[1..];
            let end = inner
                .find(quote)
                .ok_or_else(|| format!("unterminated {}-quoted value", quote))?;
            let rest = inner[end + 1..].trim();
            if !(rest.is_empty() || rest.starts_with('#')) {
                return Err("unexpected characters after closing quote".to_string());
            }
            inner[..end].to_string()
        }
        _ => raw.split('#').next().unwrap_or_default().trim_end().to_string(),
    };
    Ok(Some((key.to_string(), value)))
}

fn main() {
    let (cli, loaded_env) = match parse_cli().and_then(|cli| {
        let loaded = configure_env(cli.env_file.clone())?;
        Ok((cli, loaded))
    }) {
        Ok(v) => v,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "fieldwatch {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli.once) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_assignments() {
        assert_eq!(parse_env_assignment("  # comment"), Ok(None));
        assert_eq!(
            parse_env_assignment("export SOURCE_MODE=fake # synthetic"),
            Ok(Some(("SOURCE_MODE".into(), "fake".into())))
        );
        assert_eq!(
            parse_env_assignment("IDEALS_FILE='rules #1.json'"),
            Ok(Some(("IDEALS_FILE".into(), "rules #1.json".into())))
        );
        assert_eq!(parse_env_assignment("EMPTY="), Ok(Some(("EMPTY".into(), String::new()))));
        assert!(parse_env_assignment("NO_EQUALS").is_err());
        assert!(parse_env_assignment("BAD KEY=1").is_err());
        assert!(parse_env_assignment("X=\"open").is_err());
    }
}
