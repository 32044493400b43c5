//! Lazily constructed DFA cache, one per parser/lexer decision. States are
//! canonicalized by configuration-set equality — a decision never gets two
//! states backed by equal configuration sets, the same canonicalization
//! discipline the earlier tagged-DFA determinization in this crate used for
//! its kernel table, adapted here to configuration sets instead of TDFA
//! kernels.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use crate::atn::StateIndex;
use crate::atn_config::AtnConfigSet;
use crate::lexer_action::LexerActionExecutor;
use crate::semantic_context::SemanticContext;

pub type DfaStateId = usize;

#[derive(Debug)]
pub struct DfaState {
	pub configs: AtnConfigSet,
	edges: Vec<Option<DfaStateId>>,
	pub is_accept_state: bool,
	pub prediction: usize,
	pub requires_full_context: bool,
	pub predicates: Vec<(usize, SemanticContext)>,
	pub lexer_action_executor: Option<std::rc::Rc<LexerActionExecutor>>,
}

impl DfaState {
	fn new(configs: AtnConfigSet) -> Self {
		Self {
			configs,
			edges: Vec::new(),
			is_accept_state: false,
			prediction: 0,
			requires_full_context: false,
			predicates: Vec::new(),
			lexer_action_executor: None,
		}
	}

	fn edge_slot(symbol: i32) -> usize {
		(symbol + 1) as usize
	}

	pub fn edge(&self, symbol: i32) -> Option<DfaStateId> {
		self.edges.get(Self::edge_slot(symbol)).copied().flatten()
	}

	fn set_edge(&mut self, symbol: i32, target: DfaStateId) {
		let slot: usize = Self::edge_slot(symbol);
		if slot >= self.edges.len() {
			self.edges.resize(slot + 1, None);
		}
		self.edges[slot] = Some(target);
	}
}

/// Canonicalization key: configuration sets compare by value, so this is a
/// linear scan bucketed by a cheap summary (size, first state id) to avoid
/// an O(n) scan through every prior state on every insert.
#[derive(Debug, Default)]
struct StateTable {
	states: Vec<DfaState>,
	by_summary: BTreeMap<(usize, StateIndex), Vec<DfaStateId>>,
}

impl StateTable {
	fn summary(configs: &AtnConfigSet) -> (usize, StateIndex) {
		(configs.len(), configs.iter().next().map(|c| c.state).unwrap_or(usize::MAX))
	}

	/// Returns the canonical id for a configuration set, inserting a new
	/// state if none of the existing ones has an equal configuration set.
	fn canonicalize(&mut self, configs: AtnConfigSet) -> DfaStateId {
		let summary: (usize, StateIndex) = Self::summary(&configs);
		if let Some(candidates) = self.by_summary.get(&summary) {
			for &id in candidates {
				if self.states[id].configs == configs {
					return id;
				}
			}
		}
		let id: DfaStateId = self.states.len();
		self.states.push(DfaState::new(configs));
		self.by_summary.entry(summary).or_default().push(id);
		id
	}
}

/// One decision's DFA. For ordinary decisions `s0` is the single start
/// state; for a precedence decision (left-recursive rule) `precedence_start_states`
/// holds one start state per precedence level instead, and `s0` is unused.
pub struct Dfa {
	pub decision: usize,
	pub atn_start_state: StateIndex,
	pub precedence_dfa: bool,
	states: RwLock<StateTable>,
	edge_lock: Mutex<()>,
	s0: RwLock<Option<DfaStateId>>,
	precedence_start_states: RwLock<BTreeMap<i32, DfaStateId>>,
}

impl Dfa {
	pub fn new(decision: usize, atn_start_state: StateIndex, precedence_dfa: bool) -> Self {
		Self {
			decision,
			atn_start_state,
			precedence_dfa,
			states: RwLock::new(StateTable::default()),
			edge_lock: Mutex::new(()),
			s0: RwLock::new(None),
			precedence_start_states: RwLock::new(BTreeMap::new()),
		}
	}

	pub fn start_state(&self) -> Option<DfaStateId> {
		assert!(!self.precedence_dfa);
		*self.s0.read().unwrap()
	}

	pub fn set_start_state(&self, id: DfaStateId) {
		assert!(!self.precedence_dfa);
		*self.s0.write().unwrap() = Some(id);
	}

	pub fn precedence_start_state(&self, precedence: i32) -> Option<DfaStateId> {
		assert!(self.precedence_dfa);
		self.precedence_start_states.read().unwrap().get(&precedence).copied()
	}

	pub fn set_precedence_start_state(&self, precedence: i32, id: DfaStateId) {
		assert!(self.precedence_dfa);
		self.precedence_start_states.write().unwrap().insert(precedence, id);
	}

	/// Installs `configs` as a DFA state, reusing an existing state if one
	/// with an equal configuration set already exists.
	#[tracing::instrument(skip(self, configs))]
	pub fn add_state(&self, configs: AtnConfigSet) -> DfaStateId {
		let _guard = self.edge_lock.lock().unwrap();
		let mut table = self.states.write().unwrap();
		table.canonicalize(configs)
	}

	pub fn add_edge(&self, from: DfaStateId, symbol: i32, to: DfaStateId) {
		let _guard = self.edge_lock.lock().unwrap();
		let mut table = self.states.write().unwrap();
		table.states[from].set_edge(symbol, to);
	}

	pub fn edge(&self, from: DfaStateId, symbol: i32) -> Option<DfaStateId> {
		self.states.read().unwrap().states[from].edge(symbol)
	}

	pub fn with_state<R>(&self, id: DfaStateId, f: impl FnOnce(&DfaState) -> R) -> R {
		f(&self.states.read().unwrap().states[id])
	}

	pub fn set_state_accept(&self, id: DfaStateId, prediction: usize, requires_full_context: bool) {
		let _guard = self.edge_lock.lock().unwrap();
		let mut table = self.states.write().unwrap();
		let state: &mut DfaState = &mut table.states[id];
		state.is_accept_state = true;
		state.prediction = prediction;
		state.requires_full_context = requires_full_context;
	}

	pub fn set_state_lexer_action(&self, id: DfaStateId, executor: Option<std::rc::Rc<LexerActionExecutor>>) {
		let _guard = self.edge_lock.lock().unwrap();
		let mut table = self.states.write().unwrap();
		table.states[id].lexer_action_executor = executor;
	}

	pub fn num_states(&self) -> usize {
		self.states.read().unwrap().states.len()
	}

	pub fn to_diagnostic_string(&self) -> String {
		let table = self.states.read().unwrap();
		let mut out: String = format!("decision {}: {} states\n", self.decision, table.states.len());
		for (id, state) in table.states.iter().enumerate() {
			out.push_str(&format!(
				"  s{id}: accept={} prediction={} configs={}\n",
				state.is_accept_state,
				state.prediction,
				state.configs.len()
			));
		}
		out
	}
}

impl std::fmt::Debug for Dfa {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dfa")
			.field("decision", &self.decision)
			.field("precedence_dfa", &self.precedence_dfa)
			.field("num_states", &self.num_states())
			.finish()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::atn_config::AtnConfig;
	use crate::prediction_context::{MergeCache, PredictionContext};

	fn single_config_set(state: StateIndex, alt: usize) -> AtnConfigSet {
		let mut set: AtnConfigSet = AtnConfigSet::new(false);
		let mut cache: MergeCache = MergeCache::new();
		set.add(AtnConfig::new(state, alt, PredictionContext::empty()), &mut cache);
		set
	}

	#[test]
	fn equal_configsets_canonicalize_to_the_same_state() {
		let dfa: Dfa = Dfa::new(0, 0, false);
		let first: DfaStateId = dfa.add_state(single_config_set(3, 1));
		let second: DfaStateId = dfa.add_state(single_config_set(3, 1));
		assert_eq!(first, second);
		assert_eq!(dfa.num_states(), 1);
	}

	#[test]
	fn distinct_configsets_get_distinct_states() {
		let dfa: Dfa = Dfa::new(0, 0, false);
		let first: DfaStateId = dfa.add_state(single_config_set(3, 1));
		let second: DfaStateId = dfa.add_state(single_config_set(3, 2));
		assert_ne!(first, second);
		assert_eq!(dfa.num_states(), 2);
	}

	#[test]
	fn edges_are_indexed_by_symbol_plus_one() {
		let dfa: Dfa = Dfa::new(0, 0, false);
		let from: DfaStateId = dfa.add_state(single_config_set(0, 1));
		let to: DfaStateId = dfa.add_state(single_config_set(1, 1));
		dfa.add_edge(from, -1, to);
		assert_eq!(dfa.edge(from, -1), Some(to));
		assert_eq!(dfa.edge(from, 5), None);
	}

	#[test]
	fn precedence_dfa_keeps_per_precedence_start_states() {
		let dfa: Dfa = Dfa::new(0, 0, true);
		let low: DfaStateId = dfa.add_state(single_config_set(0, 1));
		let high: DfaStateId = dfa.add_state(single_config_set(0, 2));
		dfa.set_precedence_start_state(0, low);
		dfa.set_precedence_start_state(1, high);
		assert_eq!(dfa.precedence_start_state(0), Some(low));
		assert_eq!(dfa.precedence_start_state(1), Some(high));
	}
}
