use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;
use tutor_core::action::{ModelKind, Observation, TeachingAction};
use tutor_core::belief::{DEFAULT_MEMORY_SIZE, DEFAULT_PARTICLE_CAP};
use tutor_core::concept::{SpaceMode, TargetRule};
use tutor_planner::SearchConfig;
use tutor_planner::config::{DEFAULT_PREPLAN_DEPTH, DEFAULT_PREPLAN_SAMPLES};

const DEFAULT_LETTERS: usize = 6;
const DEFAULT_TRIALS: usize = 1;
const DEFAULT_MAX_ACTIONS: usize = 40;
const DEFAULT_PHASE_LEN: usize = 3;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root session configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub run_id: String,
    pub concept: ConceptConfig,
    pub model: ModelConfig,
    pub planner: PlannerConfig,
    #[serde(default)]
    pub learner: LearnerConfig,
    #[serde(default)]
    pub session: TrialsConfig,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SessionConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: SessionConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.concept.validate()?;
        self.model.validate()?;
        self.planner.validate(self.model.kind)?;
        self.learner.validate()?;
        self.session.validate()?;
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            preplan_cache: self
                .planner
                .preplan
                .cache_path
                .as_deref()
                .filter(|_| self.planner.preplan.enabled)
                .map(|template| resolve_template(&self.run_id, template)),
        }
    }

    /// Model the simulated learner follows; defaults to the planner's model.
    pub fn learner_kind(&self) -> ModelKind {
        self.learner.kind.unwrap_or(self.model.kind)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConceptKind {
    LetterAddition,
    NumberGame,
}

/// Which concept is taught and how its ground truth is chosen.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ConceptConfig {
    pub kind: ConceptKind,
    #[serde(default = "default_letters")]
    pub letters: usize,
    /// Fixed letter values; drawn from the run seed when absent.
    #[serde(default)]
    pub assignment: Option<Vec<Observation>>,
    #[serde(default)]
    pub target: Option<TargetRule>,
    #[serde(default)]
    pub space: SpaceMode,
}

impl ConceptConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.kind {
            ConceptKind::LetterAddition => {
                let letters = self
                    .assignment
                    .as_ref()
                    .map_or(self.letters, |assignment| assignment.len());
                if letters < 2 {
                    return Err(ValidationError::InvalidField {
                        field: "concept.letters".to_string(),
                        message: "letter addition needs at least two letters".to_string(),
                    });
                }
                if let Some(assignment) = self.assignment.as_ref() {
                    let mut sorted = assignment.clone();
                    sorted.sort_unstable();
                    if sorted.iter().enumerate().any(|(idx, v)| *v != idx as Observation) {
                        return Err(ValidationError::InvalidField {
                            field: "concept.assignment".to_string(),
                            message: format!("{assignment:?} is not a permutation of 0..n"),
                        });
                    }
                }
            }
            ConceptKind::NumberGame => {
                if self.target.is_none() {
                    return Err(ValidationError::InvalidField {
                        field: "concept.target".to_string(),
                        message: "number game needs a target rule".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn default_letters() -> usize {
    DEFAULT_LETTERS
}

/// The planner's learner model.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub kind: ModelKind,
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,
    #[serde(default = "default_particle_cap")]
    pub particle_cap: usize,
}

impl ModelConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.kind == ModelKind::Continuous && self.particle_cap < 2 {
            return Err(ValidationError::InvalidField {
                field: "model.particle_cap".to_string(),
                message: "continuous model needs room for at least two particles".to_string(),
            });
        }
        Ok(())
    }
}

fn default_memory_size() -> usize {
    DEFAULT_MEMORY_SIZE
}

fn default_particle_cap() -> usize {
    DEFAULT_PARTICLE_CAP
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlannerKind {
    ForwardSearch,
    InfoGain,
    Random,
}

impl PlannerKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            PlannerKind::ForwardSearch => "forward_search",
            PlannerKind::InfoGain => "info_gain",
            PlannerKind::Random => "random",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionSet {
    #[default]
    All,
    QuizExampleOnly,
}

impl ActionSet {
    pub fn actions(self) -> &'static [TeachingAction] {
        match self {
            ActionSet::All => &TeachingAction::ALL,
            ActionSet::QuizExampleOnly => &TeachingAction::QUIZ_EXAMPLE_ONLY,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlannerConfig {
    pub kind: PlannerKind,
    #[serde(default)]
    pub actions: ActionSet,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub preplan: PreplanConfig,
}

impl PlannerConfig {
    fn validate(&self, model: ModelKind) -> Result<(), ValidationError> {
        if self.kind == PlannerKind::InfoGain && model != ModelKind::Continuous {
            return Err(ValidationError::InvalidField {
                field: "planner.kind".to_string(),
                message: "info_gain planning requires the continuous model".to_string(),
            });
        }

        if self.search.horizon == 0 {
            return Err(ValidationError::InvalidField {
                field: "planner.search.horizon".to_string(),
                message: "horizon must be at least 1".to_string(),
            });
        }

        if self.search.samples.is_empty() || self.search.samples.contains(&0) {
            return Err(ValidationError::InvalidField {
                field: "planner.search.samples".to_string(),
                message: "every search level must sample at least one item".to_string(),
            });
        }

        if !(self.search.discount > 0.0 && self.search.discount <= 1.0) {
            return Err(ValidationError::InvalidField {
                field: "planner.search.discount".to_string(),
                message: "discount must lie in (0, 1]".to_string(),
            });
        }

        if self.search.leaf_scale < 0.0 {
            return Err(ValidationError::InvalidField {
                field: "planner.search.leaf_scale".to_string(),
                message: "leaf scale must not be negative".to_string(),
            });
        }

        if self.preplan.enabled {
            if self.kind != PlannerKind::ForwardSearch {
                return Err(ValidationError::InvalidField {
                    field: "planner.preplan.enabled".to_string(),
                    message: format!("{} planner cannot preplan", self.kind.as_str()),
                });
            }
            if self.preplan.depth == 0 || self.preplan.samples == 0 {
                return Err(ValidationError::InvalidField {
                    field: "planner.preplan".to_string(),
                    message: "depth and samples must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Offline decision tree computed before the first trial.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PreplanConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_preplan_depth")]
    pub depth: usize,
    #[serde(default = "default_preplan_samples")]
    pub samples: usize,
    /// Tree cache; loaded when present, written after computing otherwise.
    #[serde(default)]
    pub cache_path: Option<String>,
}

impl Default for PreplanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            depth: DEFAULT_PREPLAN_DEPTH,
            samples: DEFAULT_PREPLAN_SAMPLES,
            cache_path: None,
        }
    }
}

fn default_preplan_depth() -> usize {
    DEFAULT_PREPLAN_DEPTH
}

fn default_preplan_samples() -> usize {
    DEFAULT_PREPLAN_SAMPLES
}

/// Simulated learner answering in place of a student.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LearnerConfig {
    #[serde(default)]
    pub kind: Option<ModelKind>,
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,
    /// Overrides the concept's noise table.
    #[serde(default)]
    pub transition_noise: Option<f64>,
    #[serde(default)]
    pub production_noise: Option<f64>,
}

impl LearnerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        for (label, value) in [
            ("learner.transition_noise", self.transition_noise),
            ("learner.production_noise", self.production_noise),
        ] {
            if let Some(value) = value {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ValidationError::InvalidField {
                        field: label.to_string(),
                        message: format!("probability {value} is outside [0, 1]"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Trial loop settings (`session` block).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TrialsConfig {
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default = "default_max_actions")]
    pub max_actions: usize,
    /// Teaching actions between assessments.
    #[serde(default = "default_phase_len")]
    pub phase_len: usize,
}

impl Default for TrialsConfig {
    fn default() -> Self {
        Self {
            seed: None,
            trials: DEFAULT_TRIALS,
            max_actions: DEFAULT_MAX_ACTIONS,
            phase_len: DEFAULT_PHASE_LEN,
        }
    }
}

impl TrialsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        for (label, value) in [
            ("session.trials", self.trials),
            ("session.max_actions", self.max_actions),
            ("session.phase_len", self.phase_len),
        ] {
            if value == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn default_trials() -> usize {
    DEFAULT_TRIALS
}

fn default_max_actions() -> usize {
    DEFAULT_MAX_ACTIONS
}

fn default_phase_len() -> usize {
    DEFAULT_PHASE_LEN
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        if self.jsonl.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "outputs.jsonl".to_string(),
                message: "path must not be empty".to_string(),
            });
        }

        let resolved = resolve_template(run_id, &self.jsonl);
        if resolved.components().count() == 0 {
            return Err(ValidationError::InvalidField {
                field: "outputs.jsonl".to_string(),
                message: "resolved path is invalid".to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    PathBuf::from(template.replace("{run_id}", run_id))
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub preplan_cache: Option<PathBuf>,
}

impl ResolvedOutputs {
    /// Directory holding the JSONL log and the telemetry stream.
    pub fn output_dir(&self) -> PathBuf {
        self.jsonl
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
