//! Run planning: defaults, then an optional TOML file, then flags.

use std::path::{Path, PathBuf};

use clap::Args;
use crime_risk_ingest::{ColumnMapping, ColumnOverrides, IngestOptions};
use crime_risk_knox_models::{KnoxConfig, PairStrategy};
use thiserror::Error;

/// A run plan that cannot be carried out against the loaded CSV.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Offence filter {filter:?} given but the CSV has no offence column (set --offence-col)")]
    MissingOffenceColumn { filter: String },
}

/// Arguments of the `near-repeat` subcommand.
#[derive(Debug, Args)]
pub struct NearRepeatArgs {
    /// Incident CSV export
    #[arg(long)]
    pub csv: PathBuf,
    /// Output `GeoJSON` path
    #[arg(long, default_value = "geojson/near_repeat.geojson")]
    pub out: PathBuf,
    /// Also write the run summary as JSON to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,
    /// TOML file with engine settings (flags take precedence)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// H3 resolution (0-15)
    #[arg(long = "h3-res")]
    pub resolution: Option<u8>,
    /// Pair distance threshold in meters
    #[arg(long = "distance-m")]
    pub distance_threshold_m: Option<f64>,
    /// Pair time threshold in days
    #[arg(long = "time-days")]
    pub time_threshold_days: Option<f64>,
    /// Lookback window for the significance test, in days
    #[arg(long)]
    pub lookback_days: Option<u32>,
    /// Recent window for the coverage surface, in days
    #[arg(long)]
    pub recent_days: Option<u32>,
    /// Ring radius for coverage expansion
    #[arg(long)]
    pub k: Option<u32>,
    /// Number of permutation trials
    #[arg(long)]
    pub permutations: Option<usize>,
    /// Base seed for the permutation trials (random when unset)
    #[arg(long)]
    pub seed: Option<u64>,
    /// Pair counting strategy (`naive`, `grid`, `rtree`)
    #[arg(long)]
    pub strategy: Option<PairStrategy>,
    /// Offence category substring; repeat to run once per filter
    #[arg(long = "offence-filter")]
    pub offence_filters: Vec<String>,

    /// Latitude column name
    #[arg(long)]
    pub lat_col: Option<String>,
    /// Longitude column name
    #[arg(long)]
    pub lon_col: Option<String>,
    /// Date column name
    #[arg(long)]
    pub date_col: Option<String>,
    /// Hour or time-of-day column name
    #[arg(long)]
    pub time_col: Option<String>,
    /// Offence category column name
    #[arg(long)]
    pub offence_col: Option<String>,
    /// Incident id column name
    #[arg(long)]
    pub id_col: Option<String>,
    /// Offset applied to timestamps without one, in minutes east of UTC
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub utc_offset_minutes: i32,
}

/// One engine run and where its outputs go.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRun {
    /// Engine configuration, offence filter included.
    pub config: KnoxConfig,
    /// `GeoJSON` destination.
    pub out: PathBuf,
    /// Summary destination, if requested.
    pub summary: Option<PathBuf>,
}

impl NearRepeatArgs {
    /// Loads the TOML file (if any) and applies the flags on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file cannot be read or parsed.
    pub fn base_config(&self) -> Result<KnoxConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                KnoxConfig::from_toml(&std::fs::read_to_string(path)?)?
            }
            None => KnoxConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut KnoxConfig) {
        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
        if let Some(distance) = self.distance_threshold_m {
            config.distance_threshold_m = distance;
        }
        if let Some(days) = self.time_threshold_days {
            config.time_threshold_days = days;
        }
        if let Some(days) = self.lookback_days {
            config.lookback_days = days;
        }
        if let Some(days) = self.recent_days {
            config.recent_days = days;
        }
        if let Some(k) = self.k {
            config.k = k;
        }
        if let Some(permutations) = self.permutations {
            config.permutations = permutations;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
    }

    /// One run per offence filter flag, or a single run with the base
    /// config's filter when none is given.
    ///
    /// With more than one filter, every output path gets a `_<slug>` suffix.
    #[must_use]
    pub fn plan(&self, base: &KnoxConfig) -> Vec<PlannedRun> {
        let filters: Vec<Option<String>> = if self.offence_filters.is_empty() {
            vec![base.offence_filter.clone()]
        } else {
            self.offence_filters.iter().cloned().map(Some).collect()
        };
        let suffixed = filters.len() > 1;

        filters
            .into_iter()
            .map(|filter| {
                let slug = filter.as_deref().map(slugify);
                let place = |path: &Path| match &slug {
                    Some(slug) if suffixed => with_suffix(path, slug),
                    _ => path.to_path_buf(),
                };
                PlannedRun {
                    out: place(&self.out),
                    summary: self.summary.as_deref().map(place),
                    config: KnoxConfig {
                        offence_filter: filter,
                        ..base.clone()
                    },
                }
            })
            .collect()
    }

    /// CSV interpretation options from the column flags.
    #[must_use]
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            columns: ColumnOverrides {
                latitude: self.lat_col.clone(),
                longitude: self.lon_col.clone(),
                date: self.date_col.clone(),
                time: self.time_col.clone(),
                offence: self.offence_col.clone(),
                id: self.id_col.clone(),
            },
            utc_offset_minutes: self.utc_offset_minutes,
        }
    }
}

/// Fails if any run filters by offence but the CSV has no offence column,
/// since every incident would then be filtered out.
///
/// # Errors
///
/// Returns [`PlanError::MissingOffenceColumn`] naming the first such filter.
pub fn require_offence_column(
    runs: &[PlannedRun],
    columns: &ColumnMapping,
) -> Result<(), PlanError> {
    if columns.offence.is_some() {
        return Ok(());
    }
    let filter = runs
        .iter()
        .filter_map(|run| run.config.offence_filter.as_deref())
        .find(|filter| !filter.trim().is_empty());
    match filter {
        Some(filter) => Err(PlanError::MissingOffenceColumn {
            filter: filter.to_string(),
        }),
        None => Ok(()),
    }
}

/// Lowercase ASCII alphanumerics joined by single underscores.
#[must_use]
pub fn slugify(filter: &str) -> String {
    let mut slug = String::with_capacity(filter.len());
    for c in filter.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        "filter".to_string()
    } else {
        slug
    }
}

/// `dir/name.ext` becomes `dir/name_<slug>.ext`.
#[must_use]
pub fn with_suffix(path: &Path, slug: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{slug}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{slug}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: NearRepeatArgs,
    }

    fn parse(extra: &[&str]) -> NearRepeatArgs {
        let mut argv = vec!["crime_risk", "--csv", "data/toronto.csv"];
        argv.extend_from_slice(extra);
        TestCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn defaults_without_flags() {
        let args = parse(&[]);
        let config = args.base_config().unwrap();
        assert_eq!(config, KnoxConfig::default());

        let runs = args.plan(&config);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].out, PathBuf::from("geojson/near_repeat.geojson"));
        assert_eq!(runs[0].summary, None);
        assert_eq!(runs[0].config.offence_filter, None);
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(&[
            "--h3-res",
            "8",
            "--distance-m",
            "400",
            "--time-days",
            "7.5",
            "--permutations",
            "99",
            "--seed",
            "42",
            "--strategy",
            "rtree",
        ]);
        let config = args.base_config().unwrap();
        assert_eq!(config.resolution, 8);
        assert!((config.distance_threshold_m - 400.0).abs() < f64::EPSILON);
        assert!((config.time_threshold_days - 7.5).abs() < f64::EPSILON);
        assert_eq!(config.permutations, 99);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.strategy, PairStrategy::RTree);
        assert_eq!(config.lookback_days, 90);
    }

    #[test]
    fn flags_override_toml() {
        let args = parse(&["--k", "2"]);
        let mut config = KnoxConfig::from_toml("k = 3\nrecent_days = 7").unwrap();
        args.apply(&mut config);
        assert_eq!(config.k, 2);
        assert_eq!(config.recent_days, 7);
    }

    #[test]
    fn single_filter_keeps_paths() {
        let args = parse(&["--offence-filter", "Assault", "--summary", "out/summary.json"]);
        let runs = args.plan(&args.base_config().unwrap());
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].out, PathBuf::from("geojson/near_repeat.geojson"));
        assert_eq!(runs[0].summary, Some(PathBuf::from("out/summary.json")));
        assert_eq!(runs[0].config.offence_filter.as_deref(), Some("Assault"));
    }

    #[test]
    fn several_filters_suffix_every_output() {
        let args = parse(&[
            "--offence-filter",
            "Assault",
            "--offence-filter",
            "Break and Enter",
            "--summary",
            "out/summary.json",
        ]);
        let runs = args.plan(&args.base_config().unwrap());
        assert_eq!(runs.len(), 2);
        assert_eq!(
            runs[0].out,
            PathBuf::from("geojson/near_repeat_assault.geojson")
        );
        assert_eq!(
            runs[1].out,
            PathBuf::from("geojson/near_repeat_break_and_enter.geojson")
        );
        assert_eq!(
            runs[1].summary,
            Some(PathBuf::from("out/summary_break_and_enter.json"))
        );
        assert_eq!(
            runs[1].config.offence_filter.as_deref(),
            Some("Break and Enter")
        );
    }

    #[test]
    fn toml_filter_is_used_without_flags() {
        let args = parse(&[]);
        let base = KnoxConfig {
            offence_filter: Some("Robbery".to_string()),
            ..KnoxConfig::default()
        };
        let runs = args.plan(&base);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].config.offence_filter.as_deref(), Some("Robbery"));
    }

    #[test]
    fn negative_utc_offset_parses() {
        let args = parse(&["--utc-offset-minutes", "-300", "--lat-col", "Y"]);
        let options = args.ingest_options();
        assert_eq!(options.utc_offset_minutes, -300);
        assert_eq!(options.columns.latitude.as_deref(), Some("Y"));
    }

    #[test]
    fn offence_filter_needs_offence_column() {
        let without = ColumnMapping::resolve(
            &["OCC_DATE", "LAT_WGS84", "LONG_WGS84"],
            &ColumnOverrides::default(),
        )
        .unwrap();
        let with = ColumnMapping::resolve(
            &["OCC_DATE", "LAT_WGS84", "LONG_WGS84", "MCI_CATEGORY"],
            &ColumnOverrides::default(),
        )
        .unwrap();

        let filtered = parse(&["--offence-filter", "Assault"]);
        let runs = filtered.plan(&filtered.base_config().unwrap());
        assert!(matches!(
            require_offence_column(&runs, &without),
            Err(PlanError::MissingOffenceColumn { filter }) if filter == "Assault"
        ));
        assert!(require_offence_column(&runs, &with).is_ok());

        let unfiltered = parse(&[]);
        let runs = unfiltered.plan(&unfiltered.base_config().unwrap());
        assert!(require_offence_column(&runs, &without).is_ok());
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Break and Enter"), "break_and_enter");
        assert_eq!(slugify("  Auto-Theft!! "), "auto_theft");
        assert_eq!(slugify("???"), "filter");
    }

    #[test]
    fn suffix_without_extension() {
        assert_eq!(
            with_suffix(Path::new("out/near_repeat"), "assault"),
            PathBuf::from("out/near_repeat_assault")
        );
    }
}
