//! The lexer's half of the prediction engine: closure/reach over character
//! input instead of tokens, with longest-match accept-state bookkeeping and
//! mode-scoped DFAs instead of ParserATNSimulator's one DFA per decision.

use std::rc::Rc;

use crate::atn::{Atn, StateIndex, StateKind, Transition, TransitionKind};
use crate::atn_config::{self, AtnConfig, AtnConfigSet};
use crate::dfa::{Dfa, DfaStateId};
use crate::errors::RecognitionError;
use crate::int_stream::{CharStream, IntStream};
use crate::interval_set::EOF;
use crate::lexer_action::LexerActionExecutor;
use crate::prediction_context::{MergeCache, PredictionContext, EMPTY_RETURN_STATE};

/// Cycle guard for a single `closure()` call tree, keyed by full config
/// identity `(state, alt, context)` — see the identical note on the parser
/// simulator's `ClosureBusy`.
type ClosureBusy = Vec<(usize, usize, Rc<PredictionContext>)>;

/// Outcome of matching as much input as possible starting at `mode_start`:
/// the token type (the matching rule's declaration order within the mode,
/// 1-based) and how many characters were consumed.
#[derive(Debug, Clone)]
pub struct LexerMatch {
	pub token_type: i32,
	pub consumed: usize,
	pub lexer_action_executor: Option<Rc<LexerActionExecutor>>,
}

struct AcceptSnapshot {
	index: usize,
	line: usize,
	column: usize,
	token_type: i32,
	lexer_action_executor: Option<Rc<LexerActionExecutor>>,
}

pub struct LexerAtnSimulator {
	pub atn: Rc<Atn>,
	pub line: usize,
	pub column: usize,
}

impl LexerAtnSimulator {
	pub fn new(atn: Rc<Atn>) -> Self {
		Self { atn, line: 1, column: 0 }
	}

	/// Matches the longest token reachable from `mode_start` against `input`,
	/// leaving the stream positioned just past the matched lexeme (lexer
	/// `match` is not neutral the way `adaptive_predict` is — that is the
	/// point of lexing). Advances `line`/`column` to match.
	#[tracing::instrument(skip(self, input, dfa))]
	pub fn match_(&mut self, input: &mut dyn CharStream, dfa: &Dfa, mode_start: StateIndex) -> Result<LexerMatch, RecognitionError> {
		let start_index: usize = input.index();
		let s0: DfaStateId = match dfa.start_state() {
			Some(id) => id,
			None => {
				let configs: AtnConfigSet = self.compute_start_state(mode_start);
				let id: DfaStateId = dfa.add_state(configs);
				self.mark_if_accepting(dfa, id);
				dfa.set_start_state(id);
				id
			},
		};

		let mut current: DfaStateId = s0;
		let mut accept: Option<AcceptSnapshot> = self.accept_snapshot(dfa, current, input.index());
		let mut consumed: usize = 0;

		loop {
			let symbol: i32 = input.la(1);
			if symbol == EOF {
				break;
			}
			let offset: usize = consumed + 1;
			let next: Option<DfaStateId> = dfa.edge(current, symbol);
			let target: DfaStateId = match next {
				Some(id) => id,
				None => {
					let reach: AtnConfigSet = self.compute_reach_set(dfa, current, symbol, offset);
					if reach.is_empty() {
						break;
					}
					let id: DfaStateId = dfa.add_state(reach);
					dfa.add_edge(current, symbol, id);
					self.mark_if_accepting(dfa, id);
					id
				},
			};
			self.consume(input, symbol);
			consumed = offset;
			current = target;
			if let Some(snapshot) = self.accept_snapshot(dfa, current, input.index()) {
				accept = Some(snapshot);
			}
		}

		match accept {
			Some(snapshot) => {
				input.seek(snapshot.index);
				self.line = snapshot.line;
				self.column = snapshot.column;
				Ok(LexerMatch {
					token_type: snapshot.token_type,
					consumed: snapshot.index - start_index,
					lexer_action_executor: snapshot.lexer_action_executor,
				})
			},
			None => {
				input.seek(start_index);
				Err(RecognitionError::LexerNoViableAlt { start_index })
			},
		}
	}

	fn accept_snapshot(&self, dfa: &Dfa, id: DfaStateId, index: usize) -> Option<AcceptSnapshot> {
		dfa.with_state(id, |s| {
			if s.is_accept_state {
				Some(AcceptSnapshot {
					index,
					line: self.line,
					column: self.column,
					token_type: s.prediction as i32,
					lexer_action_executor: s.lexer_action_executor.clone(),
				})
			} else {
				None
			}
		})
	}

	/// A freshly-added DFA state is an accept state iff one of its configs
	/// sits at a rule-stop with an empty context (a top-level lexer rule
	/// matched, as opposed to returning from a fragment-rule call). Ties
	/// favor the lowest alt — the first-declared rule in the mode.
	fn mark_if_accepting(&self, dfa: &Dfa, id: DfaStateId) {
		let winner: Option<(usize, Option<Rc<LexerActionExecutor>>)> = dfa.with_state(id, |s| {
			s.configs
				.iter()
				.filter(|c| matches!(self.atn.state(c.state).state_type, StateKind::RuleStop) && c.context.is_empty())
				.min_by_key(|c| c.alt)
				.map(|c| (c.alt, c.lexer_action_executor.clone()))
		});
		if let Some((alt, executor)) = winner {
			dfa.set_state_accept(id, alt, false);
			dfa.set_state_lexer_action(id, executor);
		}
	}

	fn consume(&mut self, input: &mut dyn CharStream, symbol: i32) {
		if symbol == '\n' as i32 {
			self.line += 1;
			self.column = 0;
		} else {
			self.column += 1;
		}
		input.consume();
	}

	pub fn compute_start_state(&self, mode_start: StateIndex) -> AtnConfigSet {
		let mut configs: AtnConfigSet = AtnConfigSet::new(false);
		let mut merge_cache: MergeCache = MergeCache::new();
		let mut closure_busy: ClosureBusy = Vec::new();
		for (alt_index, transition) in self.atn.state(mode_start).transitions.iter().enumerate() {
			let config: AtnConfig = AtnConfig::new(transition.target, alt_index + 1, PredictionContext::empty());
			self.closure(config, &mut configs, &mut closure_busy, &mut merge_cache, 0);
		}
		configs
	}

	fn compute_reach_set(&self, dfa: &Dfa, state: DfaStateId, symbol: i32, offset: usize) -> AtnConfigSet {
		let configs: AtnConfigSet = dfa.with_state(state, |s| s.configs.clone());
		let mut reach: AtnConfigSet = AtnConfigSet::new(false);
		let mut merge_cache: MergeCache = MergeCache::new();
		let mut closure_busy: ClosureBusy = Vec::new();
		for config in configs.iter() {
			for transition in &self.atn.state(config.state).transitions {
				if transition.is_epsilon() {
					continue;
				}
				if transition.matches(symbol, 0, 0x10FFFF) {
					let moved: AtnConfig = config.with_state_and_context(transition.target, config.context.clone());
					self.closure(moved, &mut reach, &mut closure_busy, &mut merge_cache, offset);
				}
			}
		}
		reach
	}

	/// Epsilon-closure, folding `Action` transitions into the config's
	/// `lexer_action_executor` instead of the parser's eager-evaluate-or-skip
	/// treatment — lexer actions (mode switches, channel/type assignment)
	/// fire only once a token is actually accepted. `offset` is how many
	/// characters have been consumed since the token started; a `Custom`
	/// action picked up here is re-targeted to that offset so the DFA state
	/// it ends up attached to can be reused at a different match length
	/// without the action firing at the wrong position.
	#[allow(clippy::too_many_arguments)]
	fn closure(
		&self,
		config: AtnConfig,
		configs: &mut AtnConfigSet,
		closure_busy: &mut ClosureBusy,
		merge_cache: &mut MergeCache,
		offset: usize,
	) {
		let busy_key: (usize, usize, Rc<PredictionContext>) = (config.state, config.alt, config.context.clone());
		if closure_busy.contains(&busy_key) {
			return;
		}

		let state = self.atn.state(config.state);
		if matches!(state.state_type, StateKind::RuleStop) {
			if config.context.is_empty() {
				configs.add(config, merge_cache);
			} else {
				let (parents, states) = atn_config::parents_and_states_public(&config.context);
				closure_busy.push(busy_key);
				for (parent, invoking_state) in parents.into_iter().zip(states) {
					if invoking_state == EMPTY_RETURN_STATE {
						continue;
					}
					let parent_ctx = parent.unwrap_or_else(PredictionContext::empty);
					let next: AtnConfig = config.with_state_and_context(invoking_state, parent_ctx);
					self.closure(next, configs, closure_busy, merge_cache, offset);
				}
				closure_busy.pop();
			}
			return;
		}

		// See the parser simulator's closure: a config whose state has any
		// consuming transition must survive as a reach point for
		// `compute_reach_set`, in addition to recursing into epsilon ones.
		let only_epsilon: bool = !state.transitions.is_empty() && state.transitions.iter().all(Transition::is_epsilon);
		if !only_epsilon {
			configs.add(config.clone(), merge_cache);
		}

		closure_busy.push(busy_key);
		for transition in state.transitions.clone() {
			match &transition.kind {
				TransitionKind::Epsilon | TransitionKind::Predicate { .. } => {
					let next: AtnConfig = config.with_state_and_context(transition.target, config.context.clone());
					self.closure(next, configs, closure_busy, merge_cache, offset);
				},
				TransitionKind::Rule { follow_state, .. } => {
					let new_context = PredictionContext::singleton(Some(config.context.clone()), *follow_state);
					let next: AtnConfig = config.with_state_and_context(transition.target, new_context);
					self.closure(next, configs, closure_busy, merge_cache, offset);
				},
				TransitionKind::Action { action_index, .. } => {
					let mut executor: Rc<LexerActionExecutor> = config
						.lexer_action_executor
						.clone()
						.unwrap_or_default()
						.with_appended(self.atn.lexer_actions[*action_index].clone());
					if executor.is_position_dependent() {
						executor = executor.fix_offset_before_match(offset);
					}
					let mut next: AtnConfig = config.with_state_and_context(transition.target, config.context.clone());
					next.lexer_action_executor = Some(executor);
					self.closure(next, configs, closure_busy, merge_cache, offset);
				},
				_ => {},
			}
		}
		closure_busy.pop();
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::atn::AtnBuilder;
	use crate::int_stream::VecCharStream;
	use crate::interval_set::IntervalSet;
	use crate::lexer_action::LexerAction;

	/// DEFAULT_MODE: `LT: '<' -> pushMode(TAG)` (rule 0) and a plain `EQ: '='`
	/// (rule 1), wired directly as alternatives of the mode-start state.
	fn build_two_rule_mode() -> (Rc<Atn>, StateIndex) {
		let mut builder: AtnBuilder = AtnBuilder::new();
		let lt_rule: usize = builder.add_rule("LT", false);
		let eq_rule: usize = builder.add_rule("EQ", false);
		let mode_start: StateIndex = builder.add_state(StateKind::TokenStart, lt_rule);

		let lt_start = builder.atn.rule(lt_rule).start_state;
		let lt_stop = builder.atn.rule(lt_rule).stop_state;
		let push_action: usize = builder.add_lexer_action(LexerAction::PushMode(1));
		let after_match: StateIndex = builder.add_state(StateKind::Basic, lt_rule);
		builder.add_transition(lt_start, after_match, TransitionKind::Range { set: IntervalSet::of_single('<' as i32) });
		builder.add_transition(after_match, lt_stop, TransitionKind::Action { rule_index: lt_rule, action_index: push_action, is_ctx_dependent: false });

		let eq_start = builder.atn.rule(eq_rule).start_state;
		let eq_stop = builder.atn.rule(eq_rule).stop_state;
		builder.add_transition(eq_start, eq_stop, TransitionKind::Range { set: IntervalSet::of_single('=' as i32) });

		builder.add_transition(mode_start, lt_start, TransitionKind::Epsilon);
		builder.add_transition(mode_start, eq_start, TransitionKind::Epsilon);
		builder.set_max_token_type(10);
		(Rc::new(builder.build()), mode_start)
	}

	#[test]
	fn matches_the_only_viable_rule_and_advances_the_stream() {
		let (atn, mode_start) = build_two_rule_mode();
		let mut sim: LexerAtnSimulator = LexerAtnSimulator::new(atn);
		let dfa: Dfa = Dfa::new(0, mode_start, false);
		let mut input: VecCharStream = VecCharStream::new("=x");
		let result: LexerMatch = sim.match_(&mut input, &dfa, mode_start).unwrap();
		assert_eq!(result.token_type, 2); // EQ is the second alt of the mode start
		assert_eq!(result.consumed, 1);
		assert_eq!(input.index(), 1);
	}

	#[test]
	fn collects_the_action_attached_to_the_matched_rule() {
		let (atn, mode_start) = build_two_rule_mode();
		let mut sim: LexerAtnSimulator = LexerAtnSimulator::new(atn);
		let dfa: Dfa = Dfa::new(0, mode_start, false);
		let mut input: VecCharStream = VecCharStream::new("<a");
		let result: LexerMatch = sim.match_(&mut input, &dfa, mode_start).unwrap();
		assert_eq!(result.token_type, 1);
		let executor = result.lexer_action_executor.expect("push action should be attached");
		assert_eq!(executor.actions, vec![LexerAction::PushMode(1)]);
	}

	#[test]
	fn no_viable_alt_when_nothing_matches() {
		let (atn, mode_start) = build_two_rule_mode();
		let mut sim: LexerAtnSimulator = LexerAtnSimulator::new(atn);
		let dfa: Dfa = Dfa::new(0, mode_start, false);
		let mut input: VecCharStream = VecCharStream::new("!");
		let err = sim.match_(&mut input, &dfa, mode_start).unwrap_err();
		assert!(matches!(err, RecognitionError::LexerNoViableAlt { .. }));
		assert_eq!(input.index(), 0);
	}
}
