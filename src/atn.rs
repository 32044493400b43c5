//! The augmented transition network: states and transitions that make up a
//! compiled grammar. Built programmatically via [`AtnBuilder`] rather than
//! deserialized from a wire format — grammar compilation itself is out of
//! scope here, only the graph the prediction engine walks.

use std::collections::BTreeMap;

use crate::interval_set::IntervalSet;
use crate::lexer_action::LexerAction;

pub type StateIndex = usize;
pub const INVALID_STATE: StateIndex = usize::MAX;

pub const INVALID_ALT: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
	Basic,
	RuleStart,
	RuleStop,
	Block,
	PlusBlockStart,
	StarBlockStart,
	TokenStart,
	PlusLoopBack,
	StarLoopBack,
	StarLoopEntry { is_precedence_decision: bool },
	LoopEnd,
}

#[derive(Debug, Clone)]
pub struct AtnState {
	pub state_type: StateKind,
	pub rule_index: usize,
	/// Non-zero for states that are themselves a prediction decision.
	pub decision: Option<usize>,
	pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone)]
pub struct Transition {
	pub target: StateIndex,
	pub kind: TransitionKind,
}

#[derive(Debug, Clone)]
pub enum TransitionKind {
	Epsilon,
	Range { set: IntervalSet },
	NotSet { set: IntervalSet },
	Set { set: IntervalSet },
	Wildcard,
	Rule { follow_state: StateIndex, rule_index: usize, precedence: i32 },
	Predicate { rule_index: usize, pred_index: usize, is_ctx_dependent: bool },
	Action { rule_index: usize, action_index: usize, is_ctx_dependent: bool },
	Precedence { precedence: i32 },
}

impl Transition {
	/// Does this transition consume a symbol (as opposed to being epsilon-like)?
	pub fn is_epsilon(&self) -> bool {
		!matches!(
			self.kind,
			TransitionKind::Range { .. } | TransitionKind::NotSet { .. } | TransitionKind::Set { .. } | TransitionKind::Wildcard
		)
	}

	pub fn matches(&self, symbol: i32, min: i32, max: i32) -> bool {
		match &self.kind {
			TransitionKind::Range { set } => set.contains(symbol),
			TransitionKind::Set { set } => set.contains(symbol),
			TransitionKind::NotSet { set } => symbol >= min && symbol <= max && !set.contains(symbol),
			TransitionKind::Wildcard => symbol >= min && symbol <= max,
			_ => false,
		}
	}

	pub fn label(&self) -> Option<IntervalSet> {
		match &self.kind {
			TransitionKind::Range { set } | TransitionKind::Set { set } => Some(set.clone()),
			_ => None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct RuleInfo {
	pub name: String,
	pub start_state: StateIndex,
	pub stop_state: StateIndex,
	pub is_left_recursive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Atn {
	pub states: Vec<AtnState>,
	pub rules: Vec<RuleInfo>,
	/// Decision number -> decision state index, in declaration order.
	pub decision_to_state: Vec<StateIndex>,
	/// Lexer-only: mode name -> start state, for diagnostics.
	pub mode_to_start_state: BTreeMap<String, StateIndex>,
	/// Lexer-only: mode number -> start state, in declaration order; this is
	/// what `LexerAction::Mode`/`PushMode`'s numeric mode argument indexes
	/// into (`mode_to_start_state`'s `BTreeMap` sorts by name, which would
	/// scramble declaration order).
	pub mode_start_states: Vec<StateIndex>,
	/// Lexer-only: actions referenced by `TransitionKind::Action.action_index`
	/// when the owning rule is a lexer rule.
	pub lexer_actions: Vec<LexerAction>,
	pub max_token_type: i32,
}

impl Atn {
	pub fn state(&self, index: StateIndex) -> &AtnState {
		&self.states[index]
	}

	pub fn rule(&self, rule_index: usize) -> &RuleInfo {
		&self.rules[rule_index]
	}

	pub fn decision_state(&self, decision: usize) -> StateIndex {
		self.decision_to_state[decision]
	}

	pub fn num_decisions(&self) -> usize {
		self.decision_to_state.len()
	}

	pub fn is_precedence_decision(&self, state: StateIndex) -> bool {
		matches!(self.states[state].state_type, StateKind::StarLoopEntry { is_precedence_decision: true })
	}

	pub fn mode_start_state(&self, mode: usize) -> StateIndex {
		self.mode_start_states[mode]
	}

	pub fn num_modes(&self) -> usize {
		self.mode_start_states.len()
	}
}

/// Incrementally constructs an [`Atn`]. Grammar compilation proper (turning
/// source text into this graph) is out of scope; this is the surface a code
/// generator, or a test, builds an ATN through.
#[derive(Debug, Default)]
pub struct AtnBuilder {
	pub(crate) atn: Atn,
}

impl AtnBuilder {
	pub fn new() -> Self {
		Self { atn: Atn::default() }
	}

	pub fn add_state(&mut self, state_type: StateKind, rule_index: usize) -> StateIndex {
		let index: StateIndex = self.atn.states.len();
		self.atn.states.push(AtnState { state_type, rule_index, decision: None, transitions: Vec::new() });
		index
	}

	pub fn add_decision(&mut self, state: StateIndex) -> usize {
		let decision: usize = self.atn.decision_to_state.len();
		self.atn.decision_to_state.push(state);
		self.atn.states[state].decision = Some(decision);
		decision
	}

	pub fn add_transition(&mut self, from: StateIndex, target: StateIndex, kind: TransitionKind) {
		self.atn.states[from].transitions.push(Transition { target, kind });
	}

	pub fn add_rule(&mut self, name: impl Into<String>, is_left_recursive: bool) -> usize {
		let rule_index: usize = self.atn.rules.len();
		let start_state: StateIndex = self.add_state(StateKind::RuleStart, rule_index);
		let stop_state: StateIndex = self.add_state(StateKind::RuleStop, rule_index);
		self.atn.rules.push(RuleInfo { name: name.into(), start_state, stop_state, is_left_recursive });
		rule_index
	}

	/// Registers a mode and returns its numeric mode id (declaration order,
	/// `DEFAULT_MODE` is always mode 0 since it's registered first).
	pub fn add_mode(&mut self, name: impl Into<String>, start_state: StateIndex) -> usize {
		let mode: usize = self.atn.mode_start_states.len();
		self.atn.mode_to_start_state.insert(name.into(), start_state);
		self.atn.mode_start_states.push(start_state);
		mode
	}

	/// Registers a lexer action and returns its index, for use as the
	/// `action_index` of a `TransitionKind::Action` on a lexer rule.
	pub fn add_lexer_action(&mut self, action: LexerAction) -> usize {
		let index: usize = self.atn.lexer_actions.len();
		self.atn.lexer_actions.push(action);
		index
	}

	pub fn set_max_token_type(&mut self, max: i32) {
		self.atn.max_token_type = max;
	}

	pub fn build(self) -> Atn {
		self.atn
	}
}
