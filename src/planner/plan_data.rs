//! Root, depth bookkeeping and the one-iteration driver.

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, info};

use super::{
    Oracles,
    backpropagation::backpropagate,
    evaluation::{evaluate_new_states, evaluate_state},
    expansion::expand,
    selection::select,
};
use crate::{
    Error, Result,
    graph::{MultiMap, PlanGraph},
    identifiers::PlanKey,
    ports::{ActionGenerator, StateDataContext},
    scheduler::PlannerSettings,
    types::{BoundedValue, StateInfo},
};

/// Counters describing one completed iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IterationReport {
    pub iteration: usize,
    pub selected: usize,
    pub expanded: usize,
    pub new_states: usize,
    pub merged_duplicates: usize,
    pub destroyed_states: usize,
    pub updated_states: usize,
    pub plan_size: usize,
    pub root_estimate: Option<BoundedValue>,
    pub root_complete: bool,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
    }
}

impl IterationReport {
    /// Whether the iteration changed nothing.
    pub fn is_idle(&self) -> bool {
        self.selected == 0 && self.new_states == 0 && self.updated_states == 0
    }
}

/// The plan graph together with everything needed to grow and re-root it.
#[derive(Debug, Clone)]
pub struct PlanData<S, A> {
    graph: PlanGraph<S, A>,
    root: Option<S>,
    depths: HashMap<S, usize>,
    bins: MultiMap<u64, S>,
    hashes: HashMap<S, u64>,
    destroyed: HashSet<S>,
}

impl<S, A> Default for PlanData<S, A> {
    fn default() -> Self {
        Self {
            graph: PlanGraph::default(),
            root: None,
            depths: HashMap::new(),
            bins: MultiMap::default(),
            hashes: HashMap::new(),
            destroyed: HashSet::new(),
        }
    }
}

impl<S: PlanKey, A: PlanKey> PlanData<S, A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<S> {
        self.root
    }

    pub fn root_info(&self) -> Option<StateInfo> {
        self.root.and_then(|root| self.graph.state_info(&root).copied())
    }

    pub fn graph(&self) -> &PlanGraph<S, A> {
        &self.graph
    }

    pub fn bins(&self) -> &MultiMap<u64, S> {
        &self.bins
    }

    pub fn size(&self) -> usize {
        self.graph.size()
    }

    /// Deepest horizon at which `state` has been selected.
    pub fn depth(&self, state: &S) -> Option<usize> {
        self.depths.get(state).copied()
    }

    pub fn depths(&self) -> &HashMap<S, usize> {
        &self.depths
    }

    /// A plan state whose data equals `data`.
    pub fn find_equivalent<C>(&self, context: &C, data: &C::StateData) -> Option<S>
    where
        C: StateDataContext<StateKey = S>,
    {
        let hash = context.state_data_hash(data);
        self.bins.get(&hash).iter().copied().find(|&candidate| {
            context
                .state_data(candidate)
                .is_some_and(|candidate_data| context.state_data_equals(&candidate_data, data))
        })
    }

    /// Point the plan at `key`.
    ///
    /// A key already in the plan, or one whose data equals a plan state,
    /// re-roots the graph and prunes what the new root cannot reach. Anything
    /// else clears the graph and restarts from a copy of `key`'s data; the
    /// caller keeps ownership of `key` in that case. Returns the number of
    /// destroyed states.
    pub fn set_root<C, G>(&mut self, oracles: &Oracles<'_, C, G>, key: S) -> Result<usize>
    where
        C: StateDataContext<StateKey = S>,
        G: ActionGenerator<C::StateData, ActionKey = A>,
    {
        let context = oracles.context;
        if self.graph.contains_state(&key) {
            return Ok(self.reroot(context, key));
        }

        let data = context.state_data(key).ok_or_else(|| Error::UnknownState {
            state: format!("{key:?}"),
        })?;
        if let Some(equivalent) = self.find_equivalent(context, &data) {
            return Ok(self.reroot(context, equivalent));
        }

        let info = evaluate_state(&data, oracles.estimator, oracles.termination)?;
        let destroyed = self.clear(context);
        let hash = context.state_data_hash(&data);
        let root = context.register_state(context.copy_state_data(&data));
        self.insert_state(root, hash, info);
        self.depths.insert(root, 0);
        self.root = Some(root);
        info!(?root, destroyed, "plan restarted from a new root");
        Ok(destroyed)
    }

    fn reroot<C>(&mut self, context: &C, new_root: S) -> usize
    where
        C: StateDataContext<StateKey = S>,
    {
        if self.root == Some(new_root) {
            return 0;
        }
        let unreachable = self.graph.collect_unreachable(new_root);
        self.graph.remove_states(&unreachable);
        for state in &unreachable {
            self.depths.remove(state);
            if let Some(hash) = self.hashes.remove(state) {
                self.bins.remove_value(&hash, state);
            }
        }
        let destroyed = self.destroy(context, &unreachable);

        let offset = self.depths.get(&new_root).copied().unwrap_or(0);
        for depth in self.depths.values_mut() {
            *depth = depth.saturating_sub(offset);
        }
        self.depths.insert(new_root, 0);
        self.root = Some(new_root);
        info!(root = ?new_root, pruned = destroyed, size = self.size(), "plan re-rooted");
        destroyed
    }

    /// Drop every state and hand them all to the context.
    pub fn clear<C>(&mut self, context: &C) -> usize
    where
        C: StateDataContext<StateKey = S>,
    {
        let states = self.graph.clear();
        self.depths.clear();
        self.bins.clear();
        self.hashes.clear();
        self.root = None;
        self.destroy(context, &states)
    }

    fn insert_state(&mut self, key: S, hash: u64, info: StateInfo) {
        self.graph.set_state_info(key, info);
        self.bins.insert(hash, key);
        self.hashes.insert(key, hash);
        self.destroyed.remove(&key);
    }

    /// Destroy keys that are not plan states and were not destroyed before.
    fn destroy<C>(&mut self, context: &C, keys: &[S]) -> usize
    where
        C: StateDataContext<StateKey = S>,
    {
        let mut count = 0;
        for &key in keys {
            if self.graph.contains_state(&key) || !self.destroyed.insert(key) {
                continue;
            }
            context.destroy_state(key);
            count += 1;
        }
        count
    }

    /// Select, expand, evaluate and backpropagate once.
    pub fn run_iteration<C, G>(
        &mut self,
        oracles: &Oracles<'_, C, G>,
        settings: &PlannerSettings,
        iteration: usize,
    ) -> Result<IterationReport>
    where
        C: StateDataContext<StateKey = S>,
        G: ActionGenerator<C::StateData, ActionKey = A>,
    {
        let started = Instant::now();
        let Some(root) = self.root else {
            return Ok(self.report(iteration, started));
        };
        if settings
            .max_plan_size
            .is_some_and(|max| self.graph.size() >= max)
        {
            debug!(size = self.graph.size(), "plan size limit reached");
            return Ok(self.report(iteration, started));
        }

        let selection = select(
            &self.graph,
            &mut self.depths,
            root,
            settings.state_expansion_budget_per_iteration,
            settings.selection_mode,
        );
        if selection.is_empty() {
            return Ok(self.report(iteration, started));
        }

        let expansion = expand(
            &mut self.graph,
            &self.bins,
            &selection.unexpanded,
            oracles.context,
            oracles.generator,
        );
        let destroyed = self.destroy(oracles.context, &expansion.duplicates);
        let evaluated =
            match evaluate_new_states(&expansion.new_states, oracles.estimator, oracles.termination)
            {
                Ok(evaluated) => evaluated,
                Err(e) => {
                    // The successors never became plan states; nothing else will release them.
                    let orphans: Vec<S> = expansion.new_states.iter().map(|s| s.key).collect();
                    self.destroy(oracles.context, &orphans);
                    return Err(e);
                }
            };
        for (key, hash, info) in evaluated {
            self.insert_state(key, hash, info);
        }

        let updated = backpropagate(
            &mut self.graph,
            &selection.all_selected,
            settings.discount_factor,
        );

        let report = IterationReport {
            selected: selection.all_selected.len(),
            expanded: selection.unexpanded.len(),
            new_states: expansion.new_states.len(),
            merged_duplicates: expansion.duplicates.len(),
            destroyed_states: destroyed,
            updated_states: updated,
            ..self.report(iteration, started)
        };
        debug!(
            iteration,
            selected = report.selected,
            expanded = report.expanded,
            new_states = report.new_states,
            dead_ends = expansion.dead_ends.len(),
            updated,
            size = report.plan_size,
            "iteration complete"
        );
        Ok(report)
    }

    fn report(&self, iteration: usize, started: Instant) -> IterationReport {
        let root_info = self.root_info();
        IterationReport {
            iteration,
            plan_size: self.size(),
            root_estimate: root_info.map(|info| info.cumulative_reward_estimate),
            root_complete: root_info.is_some_and(|info| info.subplan_is_complete),
            elapsed: started.elapsed(),
            ..IterationReport::default()
        }
    }
}
