use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::{RngCore, SeedableRng, rngs::StdRng};
use tracing::{Level, event};
use tutor_core::action::{ModelKind, NoiseParams};
use tutor_core::belief::{ContinuousBelief, DiscreteBelief, MemorylessBelief};
use tutor_core::concept::{Concept, LetterAddition, NumberGame};
use tutor_planner::{ForwardSearchPlanner, InfoGainPlanner, Planner, PreplanTree, RandomPlanner};

use super::{SessionError, SessionRow, TeachingSession, TrialLimits};
use crate::config::{ConceptKind, PlannerKind, ResolvedOutputs, SessionConfig};
use crate::learner::simulated_learner;

/// Primary entry point for running teaching sessions.
pub struct SessionRunner {
    config: SessionConfig,
    outputs: ResolvedOutputs,
}

/// Where the preplanned tree of a run came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreplanSource {
    Loaded(PathBuf),
    Computed { saved_to: Option<PathBuf> },
}

/// Summary details returned after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub trials: usize,
    pub passed: usize,
    pub actions: usize,
    pub fallbacks: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub preplan: Option<PreplanSource>,
}

impl SessionRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: SessionConfig, outputs: ResolvedOutputs) -> Self {
        Self { config, outputs }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run every trial, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, SessionError> {
        let mut rng = StdRng::seed_from_u64(self.config.session.seed.unwrap_or(0));
        let concept = &self.config.concept;
        match concept.kind {
            ConceptKind::LetterAddition => {
                let letters = match concept.assignment.as_ref() {
                    Some(assignment) => LetterAddition::with_assignment(assignment.clone())?,
                    None => LetterAddition::new(concept.letters, &mut rng)?,
                };
                self.run_concept(Arc::new(letters), &mut rng)
            }
            ConceptKind::NumberGame => {
                let target = concept.target.ok_or(SessionError::MissingTarget)?;
                let game = NumberGame::new(target, concept.space)?;
                self.run_concept(Arc::new(game), &mut rng)
            }
        }
    }

    fn run_concept<C: Concept + 'static>(
        &self,
        concept: Arc<C>,
        rng: &mut StdRng,
    ) -> Result<RunSummary, SessionError> {
        let planner = self.build_planner(Arc::clone(&concept));
        let limits = TrialLimits {
            max_actions: self.config.session.max_actions,
            phase_len: self.config.session.phase_len,
        };
        let mut session = TeachingSession::new(
            self.config.run_id.clone(),
            Arc::clone(&concept),
            planner,
            self.config.planner.actions.actions(),
            limits,
        );
        // Drawn even when the tree comes from the cache so trial seeds do not depend on it.
        let preplan_seed = rng.next_u64();
        let preplan = self.prepare_preplan(session.planner_mut(), preplan_seed)?;

        let jsonl = &self.outputs.jsonl;
        ensure_parent(jsonl.parent())?;
        let file = File::create(jsonl).map_err(|source| SessionError::Io {
            path: jsonl.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);

        let learner_kind = self.config.learner_kind();
        let noise = self.learner_noise(concept.as_ref(), learner_kind);
        let mut summary = RunSummary {
            trials: self.config.session.trials,
            passed: 0,
            actions: 0,
            fallbacks: 0,
            rows_written: 0,
            jsonl_path: jsonl.clone(),
            preplan,
        };

        for trial in 0..self.config.session.trials {
            let trial_seed = rng.next_u64();
            let mut trial_rng = StdRng::seed_from_u64(trial_seed);
            let mut learner = simulated_learner(
                learner_kind,
                Arc::clone(&concept),
                noise,
                self.config.learner.memory_size,
                &mut trial_rng,
            );
            let outcome = session.run_trial(trial, trial_seed, learner.as_mut(), &mut trial_rng)?;
            summary.passed += usize::from(outcome.passed);
            summary.actions += outcome.actions;
            summary.fallbacks += outcome.fallbacks;
            summary.rows_written += write_rows(&mut writer, jsonl, &outcome.rows)?;
        }

        writer.flush().map_err(|source| SessionError::Io {
            path: jsonl.clone(),
            source,
        })?;

        event!(
            target: "tutor_bench::session",
            Level::INFO,
            run_id = %self.config.run_id,
            trials = summary.trials,
            passed = summary.passed,
            rows = summary.rows_written,
            "run finished"
        );
        Ok(summary)
    }

    fn build_planner<C: Concept + 'static>(&self, concept: Arc<C>) -> Box<dyn Planner> {
        let actions = self.config.planner.actions.actions();
        let search = self.config.planner.search.clone().with_env_overrides();
        let model = &self.config.model;
        match (self.config.planner.kind, model.kind) {
            (PlannerKind::Random, _) => Box::new(RandomPlanner::new(concept, actions)),
            (PlannerKind::InfoGain, _) => {
                let belief = ContinuousBelief::new(concept.as_ref(), model.particle_cap);
                Box::new(InfoGainPlanner::new(concept, belief, actions))
            }
            (PlannerKind::ForwardSearch, ModelKind::Memoryless) => {
                let belief = MemorylessBelief::new(concept.as_ref());
                Box::new(ForwardSearchPlanner::new(concept, belief, actions, search))
            }
            (PlannerKind::ForwardSearch, ModelKind::Discrete) => {
                let belief = DiscreteBelief::new(concept.as_ref(), model.memory_size);
                Box::new(ForwardSearchPlanner::new(concept, belief, actions, search))
            }
            (PlannerKind::ForwardSearch, ModelKind::Continuous) => {
                let belief = ContinuousBelief::new(concept.as_ref(), model.particle_cap);
                Box::new(ForwardSearchPlanner::new(concept, belief, actions, search))
            }
        }
    }

    fn learner_noise<C: Concept>(&self, concept: &C, kind: ModelKind) -> NoiseParams {
        let base = concept.noise(kind);
        NoiseParams::new(
            self.config.learner.transition_noise.unwrap_or(base.transition),
            self.config.learner.production_noise.unwrap_or(base.production),
        )
    }

    /// Loads the cached tree when present, otherwise computes it and writes the cache.
    fn prepare_preplan(
        &self,
        planner: &mut dyn Planner,
        seed: u64,
    ) -> Result<Option<PreplanSource>, SessionError> {
        let preplan = &self.config.planner.preplan;
        if !preplan.enabled {
            return Ok(None);
        }

        let cache = self.outputs.preplan_cache.as_ref();
        if let Some(path) = cache.filter(|path| path.exists()) {
            let tree = PreplanTree::load(path)?;
            if tree.depth != preplan.depth || tree.samples != preplan.samples {
                event!(
                    target: "tutor_bench::session",
                    Level::WARN,
                    path = %path.display(),
                    cached_depth = tree.depth,
                    cached_samples = tree.samples,
                    "cached preplan was computed with different settings"
                );
            }
            event!(
                target: "tutor_bench::session",
                Level::INFO,
                path = %path.display(),
                nodes = tree.root.node_count(),
                "loaded preplanned tree"
            );
            planner.load_preplanning(tree);
            return Ok(Some(PreplanSource::Loaded(path.clone())));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        planner.perform_preplanning(preplan.depth, preplan.samples, &mut rng)?;
        let saved_to = match (cache, planner.preplanned()) {
            (Some(path), Some(tree)) => {
                tree.save(path)?;
                Some(path.clone())
            }
            _ => None,
        };
        Ok(Some(PreplanSource::Computed { saved_to }))
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), SessionError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| SessionError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn write_rows(
    writer: &mut BufWriter<File>,
    path: &Path,
    rows: &[SessionRow],
) -> Result<usize, SessionError> {
    for row in rows {
        serde_json::to_writer(&mut *writer, row)?;
        writer.write_all(b"\n").map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(rows.len())
}
