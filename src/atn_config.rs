//! A configuration pairs an ATN state with an alternative, a call-stack
//! context, and a semantic context; a configuration set is the unit the
//! prediction engine's closure/reach fixed point operates over.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::atn::StateIndex;
use crate::interval_set::BitSet;
use crate::lexer_action::LexerActionExecutor;
use crate::prediction_context::{self, MergeCache, PredictionContext};
use crate::semantic_context::SemanticContext;

#[derive(Debug, Clone)]
pub struct AtnConfig {
	pub state: StateIndex,
	pub alt: usize,
	pub context: Rc<PredictionContext>,
	pub semantic_context: SemanticContext,
	pub reaches_into_outer_context: usize,
	pub precedence_filter_suppressed: bool,
	/// Lexer-only fields; unused (default) for parser configurations.
	pub lexer_action_executor: Option<Rc<LexerActionExecutor>>,
	pub passed_through_non_greedy_decision: bool,
}

impl AtnConfig {
	pub fn new(state: StateIndex, alt: usize, context: Rc<PredictionContext>) -> Self {
		Self {
			state,
			alt,
			context,
			semantic_context: SemanticContext::None,
			reaches_into_outer_context: 0,
			precedence_filter_suppressed: false,
			lexer_action_executor: None,
			passed_through_non_greedy_decision: false,
		}
	}

	pub fn with_semantic_context(mut self, ctx: SemanticContext) -> Self {
		self.semantic_context = ctx;
		self
	}

	pub fn with_state_and_context(&self, state: StateIndex, context: Rc<PredictionContext>) -> Self {
		Self { state, context, ..self.clone() }
	}

	/// The key that determines configuration identity within a set: two
	/// configs sharing this key are merged rather than kept distinct.
	/// Parser configs never set `lexer_action_executor`, so it is always
	/// `None` there and doesn't affect parser-side merging.
	fn key(&self) -> ConfigKey {
		(
			self.state,
			self.alt,
			self.semantic_context.clone(),
			self.passed_through_non_greedy_decision,
			self.lexer_action_executor.clone(),
		)
	}
}

type ConfigKey = (StateIndex, usize, SemanticContext, bool, Option<Rc<LexerActionExecutor>>);

#[derive(Debug, Clone, Default)]
pub struct AtnConfigSet {
	configs: Vec<AtnConfig>,
	lookup: Option<BTreeMap<ConfigKey, usize>>,
	pub full_ctx: bool,
	pub has_semantic_context: bool,
	pub dips_into_outer_context: bool,
	pub unique_alt: Option<usize>,
	pub conflicting_alts: Option<BitSet>,
	frozen: bool,
}

pub const INVALID_ALT: usize = 0;

/// Exposes `PredictionContext`'s parallel parent/invoking-state arrays to the
/// simulator's rule-stop closure, which pops every invoking state in a
/// merged context in parallel.
pub fn parents_and_states_public(ctx: &Rc<PredictionContext>) -> (Vec<Option<Rc<PredictionContext>>>, Vec<usize>) {
	ctx.parents_and_states()
}

impl AtnConfigSet {
	pub fn new(full_ctx: bool) -> Self {
		Self { lookup: Some(BTreeMap::new()), full_ctx, ..Default::default() }
	}

	pub fn is_empty(&self) -> bool {
		self.configs.is_empty()
	}

	pub fn len(&self) -> usize {
		self.configs.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &AtnConfig> {
		self.configs.iter()
	}

	pub fn alts(&self) -> BitSet {
		self.configs.iter().map(|c| c.alt).collect()
	}

	/// Adds a configuration, merging its prediction context into an existing
	/// entry with the same `(state, alt, semantic_context)` key. Adding the
	/// same configuration twice is therefore idempotent in size.
	pub fn add(&mut self, config: AtnConfig, merge_cache: &mut MergeCache) {
		assert!(!self.frozen, "cannot mutate a frozen configuration set");
		if config.semantic_context != SemanticContext::None {
			self.has_semantic_context = true;
		}
		if config.reaches_into_outer_context > 0 {
			self.dips_into_outer_context = true;
		}

		let key = config.key();
		if let Some(lookup) = &mut self.lookup {
			if let Some(&index) = lookup.get(&key) {
				let existing: &mut AtnConfig = &mut self.configs[index];
				let merged: Rc<PredictionContext> =
					prediction_context::merge(&existing.context, &config.context, !self.full_ctx, merge_cache);
				existing.context = merged;
				existing.precedence_filter_suppressed |= config.precedence_filter_suppressed;
				existing.reaches_into_outer_context =
					existing.reaches_into_outer_context.max(config.reaches_into_outer_context);
				return;
			}
			lookup.insert(key, self.configs.len());
		}
		self.configs.push(config);
	}

	pub fn freeze(&mut self) {
		self.frozen = true;
		self.lookup = None;
	}

	pub fn is_frozen(&self) -> bool {
		self.frozen
	}

	/// Partitions configurations by `(state, semantic_context)` and reports
	/// the set of alternatives reachable per class; used to detect SLL
	/// conflicts and compute `unique_alt`/`conflicting_alts`.
	pub fn alt_sets_by_state(&self) -> Vec<BitSet> {
		let mut by_key: BTreeMap<(StateIndex, SemanticContext), BitSet> = BTreeMap::new();
		for config in &self.configs {
			by_key.entry((config.state, config.semantic_context.clone())).or_default().set(config.alt);
		}
		by_key.into_values().collect()
	}

	pub fn compute_conflict_info(&mut self) {
		let alt_sets: Vec<BitSet> = self.alt_sets_by_state();
		let distinct_alts: BitSet = self.alts();
		if distinct_alts.cardinality() == 1 {
			self.unique_alt = distinct_alts.min();
			self.conflicting_alts = None;
			return;
		}
		self.unique_alt = None;
		// A genuine SLL conflict requires every partition's alt-set to be the
		// same ambiguous set, not merely that one partition has more than one
		// alt — two differently-keyed classes with different alt-sets (e.g.
		// {1,2} and {2,3}) are not a full conflict.
		self.conflicting_alts = match alt_sets.iter().find(|alts| alts.cardinality() > 1) {
			Some(candidate) if alt_sets.iter().all(|alts| alts == candidate) => Some(candidate.clone()),
			_ => None,
		};
	}
}

impl PartialEq for AtnConfigSet {
	fn eq(&self, other: &Self) -> bool {
		if self.configs.len() != other.configs.len() {
			return false;
		}
		self.configs.iter().zip(other.configs.iter()).all(|(a, b)| {
			a.state == b.state && a.alt == b.alt && a.semantic_context == b.semantic_context && *a.context == *b.context
		})
	}
}
impl Eq for AtnConfigSet {}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn adding_duplicate_config_merges_rather_than_duplicates() {
		let mut set: AtnConfigSet = AtnConfigSet::new(false);
		let mut cache: MergeCache = MergeCache::new();
		let config: AtnConfig = AtnConfig::new(0, 1, PredictionContext::empty());
		set.add(config.clone(), &mut cache);
		set.add(config, &mut cache);
		assert_eq!(set.len(), 1);
	}

	#[test]
	fn distinct_alts_at_same_state_are_conflicting() {
		let mut set: AtnConfigSet = AtnConfigSet::new(false);
		let mut cache: MergeCache = MergeCache::new();
		set.add(AtnConfig::new(0, 1, PredictionContext::empty()), &mut cache);
		set.add(AtnConfig::new(0, 2, PredictionContext::empty()), &mut cache);
		set.compute_conflict_info();
		assert!(set.unique_alt.is_none());
		assert!(set.conflicting_alts.is_some());
	}

	#[test]
	fn single_alt_across_all_states_is_unique() {
		let mut set: AtnConfigSet = AtnConfigSet::new(false);
		let mut cache: MergeCache = MergeCache::new();
		set.add(AtnConfig::new(0, 1, PredictionContext::empty()), &mut cache);
		set.add(AtnConfig::new(1, 1, PredictionContext::empty()), &mut cache);
		set.compute_conflict_info();
		assert_eq!(set.unique_alt, Some(1));
	}

	#[test]
	fn non_identical_multi_alt_partitions_are_not_a_full_conflict() {
		// state 0 -> {1, 2}, state 1 -> {2, 3}: each partition is itself
		// ambiguous, but the two partitions disagree, so this isn't the
		// "every class has the same ambiguous alt-set" case the spec requires
		// for a full SLL conflict.
		let mut set: AtnConfigSet = AtnConfigSet::new(false);
		let mut cache: MergeCache = MergeCache::new();
		set.add(AtnConfig::new(0, 1, PredictionContext::empty()), &mut cache);
		set.add(AtnConfig::new(0, 2, PredictionContext::empty()), &mut cache);
		set.add(AtnConfig::new(1, 2, PredictionContext::empty()), &mut cache);
		set.add(AtnConfig::new(1, 3, PredictionContext::empty()), &mut cache);
		set.compute_conflict_info();
		assert!(set.unique_alt.is_none());
		assert!(set.conflicting_alts.is_none());
	}

	#[test]
	#[should_panic(expected = "frozen")]
	fn mutating_a_frozen_set_panics() {
		let mut set: AtnConfigSet = AtnConfigSet::new(false);
		let mut cache: MergeCache = MergeCache::new();
		set.freeze();
		set.add(AtnConfig::new(0, 1, PredictionContext::empty()), &mut cache);
	}
}
