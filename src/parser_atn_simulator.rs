//! `adaptive_predict`: the core of the prediction engine. Simulates the ATN
//! over the token stream, first under SLL semantics (ignoring the calling
//! context) and falling back to full-context LL simulation only when SLL
//! can't resolve a unique alternative, the same two-phase strategy used to
//! keep the common case cheap while staying sound on context-sensitive
//! grammars.

use std::rc::Rc;

use crate::atn::{Atn, StateKind, Transition, TransitionKind};
use crate::atn_config::AtnConfigSet;
use crate::atn_config::{self, AtnConfig};
use crate::dfa::{Dfa, DfaStateId};
use crate::errors::RecognitionError;
use crate::int_stream::{IntStream, TokenStream};
use crate::interval_set::EOF;
use crate::prediction_context::{self, MergeCache, PredictionContext, PredictionContextCache};
use crate::recognizer::Recognizer;
use crate::semantic_context::SemanticContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMode {
	Sll,
	Ll,
	LlExactAmbigDetection,
}

#[derive(Debug, Clone, Copy)]
pub struct PredictionOptions {
	pub mode: PredictionMode,
	/// Safety valve for pathological test grammars; not part of the
	/// algorithm itself. `None` means unbounded.
	pub max_closure_steps: Option<usize>,
}

impl Default for PredictionOptions {
	fn default() -> Self {
		Self { mode: PredictionMode::Ll, max_closure_steps: Some(1_000_000) }
	}
}

pub struct ParserAtnSimulator {
	pub atn: Rc<Atn>,
	pub options: PredictionOptions,
}

impl ParserAtnSimulator {
	pub fn new(atn: Rc<Atn>) -> Self {
		Self { atn, options: PredictionOptions::default() }
	}

	pub fn with_options(atn: Rc<Atn>, options: PredictionOptions) -> Self {
		Self { atn, options }
	}

	/// Runs SLL simulation first, escalating to full-context LL only when
	/// SLL reports a conflict. Leaves `input`'s position exactly where it
	/// found it.
	#[tracing::instrument(skip_all, fields(decision = dfa.decision))]
	pub fn adaptive_predict(
		&self,
		dfa: &Dfa,
		input: &mut dyn TokenStream,
		call_stack: &[usize],
		precedence: i32,
		recognizer: &mut dyn Recognizer,
		context_cache: &mut PredictionContextCache,
	) -> Result<usize, RecognitionError> {
		let start_index: usize = input.index();
		let mark: i32 = input.mark();

		let s0: DfaStateId = self.start_state_for(dfa, call_stack, precedence, recognizer, context_cache);

		let sll_result: SllOutcome = self.sim_sll(dfa, input, s0, precedence, recognizer);
		input.seek(start_index);

		let alt: Result<usize, RecognitionError> = match sll_result {
			SllOutcome::UniqueAlt(alt) => Ok(alt),
			SllOutcome::NoViableAlt { offending_index, configs } => {
				Err(RecognitionError::NoViableAlt { start_index, offending_index, configs })
			},
			SllOutcome::RequiresFullContext => {
				recognizer.error_listeners_report_attempting_full_context(dfa.decision, start_index, input.index());
				self.predict_ll(dfa, input, call_stack, precedence, recognizer, context_cache, start_index)
			},
		};

		input.release(mark);
		input.seek(start_index);
		alt
	}

	fn start_state_for(
		&self,
		dfa: &Dfa,
		call_stack: &[usize],
		precedence: i32,
		recognizer: &mut dyn Recognizer,
		context_cache: &mut PredictionContextCache,
	) -> DfaStateId {
		if dfa.precedence_dfa {
			if let Some(existing) = dfa.precedence_start_state(precedence) {
				return existing;
			}
			let configs: AtnConfigSet = self.compute_start_state(dfa.atn_start_state, call_stack, false, context_cache);
			let configs: AtnConfigSet = self.evaluate_predicates(configs, recognizer, precedence);
			let filtered: AtnConfigSet = self.apply_precedence_filter(configs, precedence);
			let id: DfaStateId = dfa.add_state(filtered);
			dfa.set_precedence_start_state(precedence, id);
			id
		} else if let Some(existing) = dfa.start_state() {
			existing
		} else {
			let configs: AtnConfigSet = self.compute_start_state(dfa.atn_start_state, call_stack, false, context_cache);
			let configs: AtnConfigSet = self.evaluate_predicates(configs, recognizer, precedence);
			let id: DfaStateId = dfa.add_state(configs);
			dfa.set_start_state(id);
			id
		}
	}

	pub fn compute_start_state(
		&self,
		decision_state: usize,
		call_stack: &[usize],
		full_ctx: bool,
		context_cache: &mut PredictionContextCache,
	) -> AtnConfigSet {
		let initial_context: Rc<PredictionContext> = context_cache.intern(PredictionContext::from_call_stack(call_stack));
		let mut configs: AtnConfigSet = AtnConfigSet::new(full_ctx);
		let mut merge_cache: MergeCache = MergeCache::new();
		let num_alts: usize = self.atn.state(decision_state).transitions.len();
		let mut closure_busy: ClosureBusy = Vec::new();
		for (alt_index, transition) in self.atn.state(decision_state).transitions.iter().enumerate() {
			let alt: usize = alt_index + 1;
			let config: AtnConfig = AtnConfig::new(transition.target, alt, initial_context.clone());
			self.closure(config, &mut configs, &mut closure_busy, false, full_ctx, 0, &mut merge_cache);
		}
		let _ = num_alts;
		configs
	}

	/// Resolves every configuration's semantic context against the live
	/// parser: precedence sub-predicates collapse first via
	/// `eval_precedence`, then whatever remains is asked of the recognizer
	/// via `sempred`. A configuration whose context comes back false is
	/// dropped outright, so a failing predicate eliminates its alternative
	/// before `compute_conflict_info` ever sees it; a configuration that
	/// passes is kept with its semantic context cleared, since it has
	/// already been fully decided and shouldn't keep gating merges.
	fn evaluate_predicates(&self, configs: AtnConfigSet, recognizer: &mut dyn Recognizer, precedence: i32) -> AtnConfigSet {
		if !configs.has_semantic_context {
			return configs;
		}
		let mut resolved: AtnConfigSet = AtnConfigSet::new(configs.full_ctx);
		let mut merge_cache: MergeCache = MergeCache::new();
		for config in configs.iter() {
			if config.semantic_context == SemanticContext::None {
				resolved.add(config.clone(), &mut merge_cache);
				continue;
			}
			match config.semantic_context.eval_precedence(precedence) {
				None => continue,
				Some(simplified) => {
					if simplified.eval(recognizer, precedence) {
						resolved.add(config.clone().with_semantic_context(SemanticContext::None), &mut merge_cache);
					}
				},
			}
		}
		resolved.compute_conflict_info();
		resolved
	}

	/// Removes configurations whose precedence is below the rule's current
	/// precedence, unless they have already survived this filter once
	/// (`precedence_filter_suppressed`), which prevents re-filtering the
	/// same configuration on every subsequent closure step.
	fn apply_precedence_filter(&self, configs: AtnConfigSet, precedence: i32) -> AtnConfigSet {
		let mut filtered: AtnConfigSet = AtnConfigSet::new(configs.full_ctx);
		let mut merge_cache: MergeCache = MergeCache::new();
		for config in configs.iter() {
			if config.precedence_filter_suppressed {
				filtered.add(config.clone(), &mut merge_cache);
				continue;
			}
			let config_precedence: i32 = precedence_of(&self.atn, config);
			if config_precedence >= precedence {
				filtered.add(config.clone(), &mut merge_cache);
			}
		}
		filtered
	}

	fn sim_sll(
		&self,
		dfa: &Dfa,
		input: &mut dyn TokenStream,
		s0: DfaStateId,
		precedence: i32,
		recognizer: &mut dyn Recognizer,
	) -> SllOutcome {
		let mut current: DfaStateId = s0;
		loop {
			let (is_accept, prediction, requires_full_context): (bool, usize, bool) =
				dfa.with_state(current, |s| (s.is_accept_state, s.prediction, s.requires_full_context));
			if is_accept {
				if requires_full_context {
					return SllOutcome::RequiresFullContext;
				}
				return SllOutcome::UniqueAlt(prediction);
			}

			let symbol: i32 = input.la(1);
			if let Some(next) = dfa.edge(current, symbol) {
				current = next;
				if symbol != EOF {
					input.consume();
				}
				continue;
			}

			let reach: AtnConfigSet = self.compute_reach_set_for_dfa_state(dfa, current, symbol, false);
			let reach: AtnConfigSet = self.evaluate_predicates(reach, recognizer, precedence);
			if reach.is_empty() {
				let configs: AtnConfigSet = dfa.with_state(current, |s| s.configs.clone());
				return SllOutcome::NoViableAlt { offending_index: input.index(), configs };
			}

			let mut reach = reach;
			reach.compute_conflict_info();
			let conflict: bool = reach.conflicting_alts.is_some();
			let target: DfaStateId = dfa.add_state(reach);
			dfa.add_edge(current, symbol, target);
			if conflict {
				dfa.set_state_accept(target, 1, true);
			} else if let Some(alt) = dfa.with_state(target, |s| s.configs.unique_alt) {
				dfa.set_state_accept(target, alt, false);
			}

			current = target;
			if symbol != EOF {
				input.consume();
			}
			// At EOF, don't consume (there's nothing past it to consume) and
			// loop back around: the top of the loop re-checks `is_accept` on
			// `current`, which `set_state_accept` above may just have set.
		}
	}

	fn compute_reach_set_for_dfa_state(&self, dfa: &Dfa, state: DfaStateId, symbol: i32, full_ctx: bool) -> AtnConfigSet {
		let configs: AtnConfigSet = dfa.with_state(state, |s| s.configs.clone());
		self.compute_reach_set(&configs, symbol, full_ctx)
	}

	pub fn compute_reach_set(&self, configs: &AtnConfigSet, symbol: i32, full_ctx: bool) -> AtnConfigSet {
		let mut reach: AtnConfigSet = AtnConfigSet::new(full_ctx);
		let mut merge_cache: MergeCache = MergeCache::new();
		let mut closure_busy: ClosureBusy = Vec::new();
		for config in configs.iter() {
			// A config already sitting at a rule-stop has no outgoing ATN
			// transitions to match against (callers return via context, not a
			// static edge). At EOF such a config has legitimately finished —
			// re-closing it either keeps it (outermost rule, empty context) or
			// pops one more frame toward a real accept, instead of silently
			// vanishing from reach.
			if symbol == EOF && matches!(self.atn.state(config.state).state_type, StateKind::RuleStop) {
				self.closure(config.clone(), &mut reach, &mut closure_busy, false, full_ctx, 0, &mut merge_cache);
				continue;
			}
			for transition in &self.atn.state(config.state).transitions {
				if transition.is_epsilon() {
					continue;
				}
				if transition.matches(symbol, 0, self.atn.max_token_type) {
					let moved: AtnConfig = config.with_state_and_context(transition.target, config.context.clone());
					self.closure(moved, &mut reach, &mut closure_busy, false, full_ctx, 0, &mut merge_cache);
				}
			}
		}
		reach.compute_conflict_info();
		reach
	}

	/// Epsilon-closes a single configuration into `configs`. `closure_busy`
	/// prevents infinite recursion through empty loops and left recursion
	/// within a single closure call.
	#[allow(clippy::too_many_arguments)]
	pub fn closure(
		&self,
		config: AtnConfig,
		configs: &mut AtnConfigSet,
		closure_busy: &mut ClosureBusy,
		collect_predicates: bool,
		full_ctx: bool,
		depth: usize,
		merge_cache: &mut MergeCache,
	) {
		let busy_key: (usize, usize, Rc<PredictionContext>) = (config.state, config.alt, config.context.clone());
		if closure_busy.contains(&busy_key) && depth > 0 {
			return;
		}

		let state = self.atn.state(config.state);
		if matches!(state.state_type, StateKind::RuleStop) {
			self.closure_rule_stop(config, configs, closure_busy, collect_predicates, full_ctx, depth, merge_cache);
			return;
		}

		// A config whose state has at least one consuming transition is a
		// "reach point" for `compute_reach_set` and must survive closure as
		// itself, in addition to recursing into any epsilon transitions from
		// the same state (mixed states are rare but not disallowed).
		let only_epsilon: bool = !state.transitions.is_empty() && state.transitions.iter().all(Transition::is_epsilon);
		if !only_epsilon {
			configs.add(config.clone(), merge_cache);
		}

		closure_busy.push(busy_key);
		let transitions = state.transitions.clone();
		for transition in &transitions {
			match &transition.kind {
				TransitionKind::Epsilon => {
					let next: AtnConfig = config.with_state_and_context(transition.target, config.context.clone());
					self.closure(next, configs, closure_busy, collect_predicates, full_ctx, depth + 1, merge_cache);
				},
				TransitionKind::Rule { follow_state, .. } => {
					let new_context: Rc<PredictionContext> = PredictionContext::singleton(Some(config.context.clone()), *follow_state);
					let next: AtnConfig = config.with_state_and_context(transition.target, new_context);
					self.closure(next, configs, closure_busy, collect_predicates, full_ctx, depth + 1, merge_cache);
				},
				TransitionKind::Predicate { rule_index, pred_index, .. } => {
					let predicate: SemanticContext = SemanticContext::predicate(*rule_index, *pred_index, false);
					let new_semantic: SemanticContext = SemanticContext::and(config.semantic_context.clone(), predicate);
					let next: AtnConfig = config
						.with_state_and_context(transition.target, config.context.clone())
						.with_semantic_context(new_semantic);
					self.closure(next, configs, closure_busy, collect_predicates, full_ctx, depth + 1, merge_cache);
				},
				TransitionKind::Precedence { precedence } => {
					let predicate: SemanticContext = SemanticContext::precedence(*precedence);
					let new_semantic: SemanticContext = SemanticContext::and(config.semantic_context.clone(), predicate);
					let next: AtnConfig = config
						.with_state_and_context(transition.target, config.context.clone())
						.with_semantic_context(new_semantic);
					self.closure(next, configs, closure_busy, collect_predicates, full_ctx, depth + 1, merge_cache);
				},
				TransitionKind::Action { .. } => {
					let next: AtnConfig = config.with_state_and_context(transition.target, config.context.clone());
					self.closure(next, configs, closure_busy, collect_predicates, full_ctx, depth + 1, merge_cache);
				},
				_ => {},
			}
		}
		closure_busy.pop();
	}

	fn closure_rule_stop(
		&self,
		config: AtnConfig,
		configs: &mut AtnConfigSet,
		closure_busy: &mut ClosureBusy,
		collect_predicates: bool,
		full_ctx: bool,
		depth: usize,
		merge_cache: &mut MergeCache,
	) {
		match config.context.as_ref() {
			PredictionContext::Empty => {
				if full_ctx {
					let mut outer: AtnConfig = config.clone();
					outer.reaches_into_outer_context += 1;
					configs.add(outer, merge_cache);
				} else {
					configs.add(config, merge_cache);
				}
			},
			_ => {
				let (parents, states) = atn_config::parents_and_states_public(&config.context);
				for (parent, state) in parents.into_iter().zip(states.into_iter()) {
					if state == prediction_context::EMPTY_RETURN_STATE {
						continue;
					}
					let parent_ctx: Rc<PredictionContext> = parent.unwrap_or_else(PredictionContext::empty);
					let next: AtnConfig = config.with_state_and_context(state, parent_ctx);
					self.closure(next, configs, closure_busy, collect_predicates, full_ctx, depth + 1, merge_cache);
				}
			},
		}
	}

	fn predict_ll(
		&self,
		dfa: &Dfa,
		input: &mut dyn TokenStream,
		call_stack: &[usize],
		precedence: i32,
		recognizer: &mut dyn Recognizer,
		context_cache: &mut PredictionContextCache,
		start_index: usize,
	) -> Result<usize, RecognitionError> {
		let mut configs: AtnConfigSet =
			self.compute_start_state(dfa.atn_start_state, call_stack, true, context_cache);
		configs = self.evaluate_predicates(configs, recognizer, precedence);
		if dfa.precedence_dfa {
			configs = self.apply_precedence_filter(configs, precedence);
		}

		loop {
			configs.compute_conflict_info();
			if let Some(alt) = configs.unique_alt {
				recognizer.error_listeners_report_context_sensitivity(dfa.decision, start_index, input.index(), alt);
				return Ok(alt);
			}

			let symbol: i32 = input.la(1);
			if symbol == EOF {
				break;
			}
			let reach: AtnConfigSet = self.compute_reach_set(&configs, symbol, true);
			let reach: AtnConfigSet = self.evaluate_predicates(reach, recognizer, precedence);
			if reach.is_empty() {
				return Err(RecognitionError::NoViableAlt { start_index, offending_index: input.index(), configs });
			}
			configs = reach;
			input.consume();
		}

		configs.compute_conflict_info();
		match self.options.mode {
			PredictionMode::Sll | PredictionMode::Ll => {
				let alts = configs.alts();
				let min_alt: usize = alts.min().unwrap_or(1);
				if let Some(ambig) = configs.conflicting_alts.clone() {
					recognizer.error_listeners_report_ambiguity(dfa.decision, start_index, input.index(), &ambig);
				}
				Ok(min_alt)
			},
			PredictionMode::LlExactAmbigDetection => {
				let alts = configs.alts();
				if alts.cardinality() > 1 {
					recognizer.error_listeners_report_ambiguity(dfa.decision, start_index, input.index(), &alts);
				}
				Ok(alts.min().unwrap_or(1))
			},
		}
	}
}

/// Cycle guard for a single `closure()` call tree, keyed by full config
/// identity `(state, alt, context)` rather than just `(state, alt)` — two
/// epsilon paths can converge on the same state/alt with different prediction
/// contexts within one closure invocation (e.g. two nullable alternatives of a
/// subrule reached via distinct call stacks), and each must still reach
/// `configs.add()`'s merge-on-insert instead of being dropped as "already
/// visited".
type ClosureBusy = Vec<(usize, usize, Rc<PredictionContext>)>;

enum SllOutcome {
	UniqueAlt(usize),
	NoViableAlt { offending_index: usize, configs: AtnConfigSet },
	RequiresFullContext,
}

fn precedence_of(atn: &Atn, config: &AtnConfig) -> i32 {
	for transition in &atn.state(config.state).transitions {
		if let TransitionKind::Precedence { precedence } = transition.kind {
			return precedence;
		}
	}
	i32::MIN
}
