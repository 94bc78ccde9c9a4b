//! Successor generation and duplicate merging.
//!
//! Every selected frontier state is expanded in parallel: the action generator
//! produces outcome data, each outcome is registered with the state context,
//! and the freshly registered key is compared by value against the canonical
//! graph (through the hash bins) and against the other successors of the same
//! batch. Duplicates are redirected to the canonical key and handed back for
//! destruction.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    graph::{EdgeBatch, MultiMap, PlanGraph},
    identifiers::{PlanKey, StateTransitionInfoPair},
    ports::{ActionGenerator, StateDataContext},
    types::StateTransitionInfo,
};

/// A state accepted into the graph that still needs an estimate.
#[derive(Debug, Clone)]
pub struct NewState<S, D> {
    pub key: S,
    pub hash: u64,
    pub data: D,
}

/// Result of expanding one batch of frontier states.
#[derive(Debug)]
pub struct ExpansionOutput<S, D> {
    pub new_states: Vec<NewState<S, D>>,
    /// Registered keys that turned out to duplicate a canonical state.
    pub duplicates: Vec<S>,
    /// Expanded states for which the generator produced no outcome.
    pub dead_ends: Vec<S>,
    pub transitions: usize,
}

impl<S, D> Default for ExpansionOutput<S, D> {
    fn default() -> Self {
        Self {
            new_states: Vec::new(),
            duplicates: Vec::new(),
            dead_ends: Vec::new(),
            transitions: 0,
        }
    }
}

struct Candidate<S, A, D> {
    edge: StateTransitionInfoPair<S, A>,
    hash: u64,
    data: D,
}

/// Expand `states` into `graph`.
///
/// `bins` maps content hashes to the canonical states already evaluated.
pub fn expand<C, G>(
    graph: &mut PlanGraph<C::StateKey, G::ActionKey>,
    bins: &MultiMap<u64, C::StateKey>,
    states: &[C::StateKey],
    context: &C,
    generator: &G,
) -> ExpansionOutput<C::StateKey, C::StateData>
where
    C: StateDataContext,
    G: ActionGenerator<C::StateData>,
{
    if states.is_empty() {
        return ExpansionOutput::default();
    }

    let generated: Vec<(C::StateKey, Vec<Candidate<C::StateKey, G::ActionKey, C::StateData>>)> =
        states
            .par_iter()
            .map(|&state| (state, generate_candidates(state, context, generator)))
            .collect();

    let mut dead_ends = Vec::new();
    let mut candidates = Vec::new();
    for (state, produced) in generated {
        if produced.is_empty() {
            dead_ends.push(state);
        }
        candidates.extend(produced);
    }

    let mut batch_bins: HashMap<u64, Vec<usize>> = HashMap::new();
    for (index, candidate) in candidates.iter().enumerate() {
        batch_bins.entry(candidate.hash).or_default().push(index);
    }

    let canonical: Vec<C::StateKey> = {
        let graph = &*graph;
        (0..candidates.len())
            .into_par_iter()
            .map(|index| canonical_key(index, &candidates, &batch_bins, graph, bins, context))
            .collect()
    };

    let batch = EdgeBatch::with_capacity(candidates.len());
    candidates
        .par_iter()
        .zip(canonical.par_iter())
        .for_each(|(candidate, &target)| {
            let transition = candidate.edge.transition;
            batch.write_edge(
                transition.predecessor_state_key,
                transition.action_key,
                candidate.edge.info,
                target,
            );
        });
    let transitions = batch.transition_count();

    let canonical_keys: BTreeSet<C::StateKey> = canonical.iter().copied().collect();
    let mut new_states = BTreeMap::new();
    let mut duplicates = BTreeSet::new();
    for (candidate, &target) in candidates.into_iter().zip(&canonical) {
        let key = candidate.edge.transition.successor_state_key;
        if graph.contains_state(&key) {
            continue;
        }
        if target == key {
            new_states.entry(key).or_insert(NewState {
                key,
                hash: candidate.hash,
                data: candidate.data,
            });
        } else if !canonical_keys.contains(&key) {
            duplicates.insert(key);
        }
    }

    graph.expand_by(new_states.len(), states.len());
    let new_actions = graph.merge_edges(batch);

    debug!(
        expanded = states.len(),
        new_actions,
        transitions,
        new_states = new_states.len(),
        duplicates = duplicates.len(),
        dead_ends = dead_ends.len(),
        "expansion merged"
    );

    ExpansionOutput {
        new_states: new_states.into_values().collect(),
        duplicates: duplicates.into_iter().collect(),
        dead_ends,
        transitions,
    }
}

fn generate_candidates<C, G>(
    state: C::StateKey,
    context: &C,
    generator: &G,
) -> Vec<Candidate<C::StateKey, G::ActionKey, C::StateData>>
where
    C: StateDataContext,
    G: ActionGenerator<C::StateData>,
{
    let Some(data) = context.state_data(state) else {
        warn!(?state, "selected state has no data in the context");
        return Vec::new();
    };

    let mut candidates = Vec::new();
    for effects in generator.generate(&data) {
        for outcome in effects.outcomes {
            if !(outcome.probability > 0.0 && outcome.probability.is_finite()) {
                warn!(
                    ?state,
                    action = ?effects.action_key,
                    probability = outcome.probability,
                    generator = generator.name(),
                    "dropping outcome without a positive probability"
                );
                continue;
            }
            let hash = context.state_data_hash(&outcome.state_data);
            let successor = context.register_state(context.copy_state_data(&outcome.state_data));
            candidates.push(Candidate {
                edge: StateTransitionInfoPair::new(
                    state,
                    effects.action_key,
                    successor,
                    StateTransitionInfo::new(outcome.probability, outcome.utility),
                ),
                hash,
                data: outcome.state_data,
            });
        }
    }
    candidates
}

/// The key a candidate's edge should point at.
///
/// An equal state already in the graph wins; otherwise the smallest key among
/// the equal candidates of the batch, which makes the choice independent of
/// the order the workers produced them in.
fn canonical_key<C, A>(
    index: usize,
    candidates: &[Candidate<C::StateKey, A, C::StateData>],
    batch_bins: &HashMap<u64, Vec<usize>>,
    graph: &PlanGraph<C::StateKey, A>,
    bins: &MultiMap<u64, C::StateKey>,
    context: &C,
) -> C::StateKey
where
    C: StateDataContext,
    A: PlanKey,
{
    let candidate = &candidates[index];
    let key = candidate.edge.transition.successor_state_key;
    if graph.contains_state(&key) {
        return key;
    }

    for &existing in bins.get(&candidate.hash) {
        if let Some(existing_data) = context.state_data(existing) {
            if context.state_data_equals(&existing_data, &candidate.data) {
                return existing;
            }
        }
    }

    let mut canonical = key;
    for &other in batch_bins.get(&candidate.hash).map_or(&[][..], Vec::as_slice) {
        let other_key = candidates[other].edge.transition.successor_state_key;
        if other_key < canonical
            && context.state_data_equals(&candidates[other].data, &candidate.data)
        {
            canonical = other_key;
        }
    }
    canonical
}
