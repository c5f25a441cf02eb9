//! INI configuration file.
//!
//! Every tunable of the scheduler, the search and the query driver can be set
//! from one file. Missing sections and keys keep their defaults.
//!
//! ```ini
//! [scheduler]
//! frame_budget_ms = 5
//! max_priority = 1000000
//! stale_requester_secs = 30
//!
//! [task.pathfind]
//! budget_ms = 4
//! max_calls = 32
//! priority_boost = 1
//!
//! [periodic.perception]
//! period_ms = 250
//!
//! [search]
//! max_visited = 20000
//!
//! [query]
//! iterations_per_slice = 64
//! time_check_interval = 8
//! max_stale_restarts = 1
//!
//! [logging]
//! level = info
//! file = /var/log/pathslice.log
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;
use tracing::{debug, warn};

use crate::logging::LoggingConfig;
use crate::query::{QueryConfig, PATHFIND_TASK};
use crate::scheduler::{
    AperiodicTaskConfig, Clock, SchedulerConfig, SchedulerError, TimeBudgetScheduler,
    DEFAULT_TASK_BUDGET, DEFAULT_TASK_MAX_CALLS,
};
use crate::search::SearchLimits;

/// File name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "pathslice.ini";

/// Directory below the platform config directory.
pub const CONFIG_DIR_NAME: &str = "pathslice";

const SECTION_SCHEDULER: &str = "scheduler";
const SECTION_SEARCH: &str = "search";
const SECTION_QUERY: &str = "query";
const SECTION_LOGGING: &str = "logging";
const TASK_PREFIX: &str = "task.";
const PERIODIC_PREFIX: &str = "periodic.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("missing section [{0}]")]
    MissingSection(String),
}

/// Contents of the configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct NavConfig {
    pub scheduler: SchedulerConfig,
    /// Aperiodic task tuning by task name.
    pub tasks: BTreeMap<String, AperiodicTaskConfig>,
    /// Periodic task periods by task name.
    pub periodic: BTreeMap<String, Duration>,
    pub search: SearchLimits,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

impl Default for NavConfig {
    fn default() -> Self {
        let mut tasks = BTreeMap::new();
        tasks.insert(PATHFIND_TASK.to_string(), AperiodicTaskConfig::default());
        Self {
            scheduler: SchedulerConfig::default(),
            tasks,
            periodic: BTreeMap::new(),
            search: SearchLimits::default(),
            query: QueryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NavConfig {
    /// Platform default location, e.g. `~/.config/pathslice/pathslice.ini`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Reads and parses a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text)?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parses INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    /// Writes the file, creating its directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(io_error)?;
        }
        self.to_ini().write_to_file(path).map_err(io_error)?;
        debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Tuning of a named aperiodic task.
    pub fn task(&self, name: &str) -> Result<&AperiodicTaskConfig, ConfigError> {
        self.tasks
            .get(name)
            .ok_or_else(|| ConfigError::MissingSection(format!("{}{}", TASK_PREFIX, name)))
    }

    /// Creates a scheduler with every configured task registered and tuned.
    pub fn build_scheduler(&self, clock: Arc<dyn Clock>) -> Result<TimeBudgetScheduler, SchedulerError> {
        self.scheduler.validate()?;
        let mut scheduler = TimeBudgetScheduler::new(self.scheduler, clock);
        for (name, config) in &self.tasks {
            let task = scheduler.register_aperiodic_task(name)?;
            scheduler.configure_task(task, *config)?;
        }
        for (name, period) in &self.periodic {
            let task = scheduler.register_periodic_task(name)?;
            scheduler.set_periodicity(task, *period)?;
        }
        Ok(scheduler)
    }

    // -------------------------------------------------------------------------
    // INI conversion
    // -------------------------------------------------------------------------

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (name, props) in ini.iter() {
            let Some(name) = name else {
                continue;
            };
            match name {
                SECTION_SCHEDULER => config.read_scheduler(props)?,
                SECTION_SEARCH => config.read_search(props)?,
                SECTION_QUERY => config.read_query(props)?,
                SECTION_LOGGING => config.read_logging(props),
                _ => {
                    if let Some(task) = name.strip_prefix(TASK_PREFIX) {
                        let tuning = read_task(name, props)?;
                        config.tasks.insert(non_empty(name, task)?, tuning);
                    } else if let Some(task) = name.strip_prefix(PERIODIC_PREFIX) {
                        let period = get_millis(name, props, "period_ms")?
                            .unwrap_or(crate::scheduler::DEFAULT_PERIOD);
                        config.periodic.insert(non_empty(name, task)?, period);
                    } else {
                        warn!(section = name, "Ignoring unknown config section");
                    }
                }
            }
        }

        Ok(config)
    }

    fn read_scheduler(&mut self, props: &Properties) -> Result<(), ConfigError> {
        let s = SECTION_SCHEDULER;
        if let Some(budget) = get_millis(s, props, "frame_budget_ms")? {
            self.scheduler.frame_budget = budget;
        }
        if let Some(max) = get::<f32>(s, props, "max_priority")? {
            if !max.is_finite() || max <= 0.0 {
                return Err(invalid(s, "max_priority", max, "must be positive"));
            }
            self.scheduler.max_priority = max;
        }
        if let Some(secs) = get::<f64>(s, props, "stale_requester_secs")? {
            self.scheduler.stale_requester_after = seconds(s, "stale_requester_secs", secs)?;
        }
        Ok(())
    }

    fn read_search(&mut self, props: &Properties) -> Result<(), ConfigError> {
        let s = SECTION_SEARCH;
        if let Some(cost) = get::<f32>(s, props, "max_cost")? {
            self.search.max_cost = Some(non_negative(s, "max_cost", cost)?);
        }
        if let Some(distance) = get::<f32>(s, props, "max_distance")? {
            self.search.max_distance = Some(non_negative(s, "max_distance", distance)?);
        }
        if let Some(visited) = get::<usize>(s, props, "max_visited")? {
            self.search.max_visited = Some(visited);
        }
        Ok(())
    }

    fn read_query(&mut self, props: &Properties) -> Result<(), ConfigError> {
        let s = SECTION_QUERY;
        if let Some(iterations) = get::<u32>(s, props, "iterations_per_slice")? {
            if iterations == 0 {
                return Err(invalid(s, "iterations_per_slice", iterations, "must be at least 1"));
            }
            self.query.iterations_per_slice = iterations;
        }
        if let Some(interval) = get::<u32>(s, props, "time_check_interval")? {
            if interval == 0 {
                return Err(invalid(s, "time_check_interval", interval, "must be at least 1"));
            }
            self.query.time_check_interval = interval;
        }
        if let Some(restarts) = get::<u32>(s, props, "max_stale_restarts")? {
            self.query.max_stale_restarts = restarts;
        }
        Ok(())
    }

    fn read_logging(&mut self, props: &Properties) {
        if let Some(level) = props.get("level").map(str::trim).filter(|l| !l.is_empty()) {
            self.logging.level = level.to_string();
        }
        if let Some(file) = props.get("file").map(str::trim) {
            self.logging.file = (!file.is_empty()).then(|| PathBuf::from(file));
        }
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some(SECTION_SCHEDULER))
            .set("frame_budget_ms", format_millis(self.scheduler.frame_budget))
            .set("max_priority", self.scheduler.max_priority.to_string())
            .set(
                "stale_requester_secs",
                self.scheduler.stale_requester_after.as_secs_f64().to_string(),
            );

        for (name, task) in &self.tasks {
            let section = format!("{}{}", TASK_PREFIX, name);
            let mut setter = ini.with_section(Some(section));
            if task.budget != DEFAULT_TASK_BUDGET {
                setter.set("budget_ms", format_millis(task.budget));
            }
            if task.max_calls != DEFAULT_TASK_MAX_CALLS {
                setter.set("max_calls", task.max_calls.to_string());
            }
            setter.set("priority_boost", task.priority_boost.to_string());
        }

        for (name, period) in &self.periodic {
            ini.with_section(Some(format!("{}{}", PERIODIC_PREFIX, name)))
                .set("period_ms", format_millis(*period));
        }

        {
            let mut setter = ini.with_section(Some(SECTION_SEARCH));
            if let Some(cost) = self.search.max_cost {
                setter.set("max_cost", cost.to_string());
            }
            if let Some(distance) = self.search.max_distance {
                setter.set("max_distance", distance.to_string());
            }
            if let Some(visited) = self.search.max_visited {
                setter.set("max_visited", visited.to_string());
            }
        }

        ini.with_section(Some(SECTION_QUERY))
            .set("iterations_per_slice", self.query.iterations_per_slice.to_string())
            .set("time_check_interval", self.query.time_check_interval.to_string())
            .set("max_stale_restarts", self.query.max_stale_restarts.to_string());

        let mut setter = ini.with_section(Some(SECTION_LOGGING));
        setter.set("level", self.logging.level.clone());
        if let Some(file) = &self.logging.file {
            setter.set("file", file.display().to_string());
        }

        ini
    }

    /// The configuration as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.to_ini().write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn read_task(section: &str, props: &Properties) -> Result<AperiodicTaskConfig, ConfigError> {
    let mut task = AperiodicTaskConfig::default();
    if let Some(budget) = get_millis(section, props, "budget_ms")? {
        task.budget = budget;
    }
    if let Some(max_calls) = get::<u32>(section, props, "max_calls")? {
        task.max_calls = max_calls;
    }
    if let Some(boost) = get::<f32>(section, props, "priority_boost")? {
        task.priority_boost = non_negative(section, "priority_boost", boost)?;
    }
    Ok(task)
}

fn get<T>(section: &str, props: &Properties, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = props.get(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| invalid(section, key, raw, e))
}

fn get_millis(section: &str, props: &Properties, key: &str) -> Result<Option<Duration>, ConfigError> {
    let Some(ms) = get::<f64>(section, props, key)? else {
        return Ok(None);
    };
    if !ms.is_finite() || ms < 0.0 {
        return Err(invalid(section, key, ms, "must be a non-negative number of milliseconds"));
    }
    let nanos = (ms * 1_000_000.0).round();
    if nanos >= u64::MAX as f64 {
        return Err(invalid(section, key, ms, "is too large"));
    }
    Ok(Some(Duration::from_nanos(nanos as u64)))
}

fn seconds(section: &str, key: &str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid(section, key, secs, "must be a non-negative number of seconds"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| invalid(section, key, secs, e))
}

fn non_negative(section: &str, key: &str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(invalid(section, key, value, "must be finite and non-negative"))
    }
}

fn non_empty(section: &str, name: &str) -> Result<String, ConfigError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ConfigError::Parse(format!("section [{}] has no task name", section)));
    }
    Ok(name.to_string())
}

fn invalid(section: &str, key: &str, value: impl Display, reason: impl Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: format!("{}.{}", section, key),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn format_millis(d: Duration) -> String {
    (d.as_nanos() as f64 / 1_000_000.0).to_string()
}
