#![deny(warnings)]
//! Learner modelling for concept teaching: the action vocabulary, the concept contract with
//! two reference concepts, and belief models that track what a learner currently holds.

pub mod action;
pub mod belief;
pub mod concept;

pub use action::{
    ActionCosts, ActionParseError, ItemId, ItemResult, ModelKind, NoiseParams, Observation,
    TeachingAction,
};
pub use belief::{BeliefError, BeliefModel, ContinuousBelief, DiscreteBelief, MemorylessBelief};
pub use concept::{Concept, ConceptError, LetterAddition, NumberGame, StateActionValues};
