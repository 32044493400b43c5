//! Lexer actions (mode push/pop, channel/type assignment, `more`/`skip`)
//! executed by the lexer simulator on an accept. Actions whose effect depends
//! on the matched text's length are wrapped with an offset so that DFA states
//! for same-length tokens remain shareable, instead of forcing a fresh DFA
//! state per absolute input position.

use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LexerAction {
	Skip,
	More,
	Mode(usize),
	PushMode(usize),
	PopMode,
	Type(i32),
	Channel(i32),
	Custom { rule_index: usize, action_index: usize },
	/// A `Custom` action whose execution depends on the matched text's
	/// length, re-targeted to fire `offset` characters past the token's
	/// start rather than at whatever absolute input position the DFA state
	/// it's attached to happens to be reached from this time.
	IndexedCustom { offset: usize, rule_index: usize, action_index: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LexerActionExecutor {
	pub actions: Vec<LexerAction>,
}

impl LexerActionExecutor {
	pub fn new(actions: Vec<LexerAction>) -> Self {
		Self { actions }
	}

	pub fn is_empty(&self) -> bool {
		self.actions.is_empty()
	}

	/// Whether this executor carries an action whose effect depends on where
	/// in the token it fires — only `Custom` actions do; the built-in ones
	/// (`skip`, `mode` changes, `type`/`channel` overrides) have no notion of
	/// "current position" to get wrong.
	pub fn is_position_dependent(&self) -> bool {
		self.actions.iter().any(|action| matches!(action, LexerAction::Custom { .. }))
	}

	/// Rewrites every not-yet-indexed `Custom` action to fire at `offset`
	/// characters past the token's start, so a DFA accept state built once
	/// and reached again later at a different match length still executes
	/// its custom action at the offset it was recorded at. Idempotent on an
	/// executor that has already been fixed.
	pub fn fix_offset_before_match(&self, offset: usize) -> Rc<LexerActionExecutor> {
		let actions: Vec<LexerAction> = self
			.actions
			.iter()
			.map(|action| match action {
				LexerAction::Custom { rule_index, action_index } => {
					LexerAction::IndexedCustom { offset, rule_index: *rule_index, action_index: *action_index }
				},
				other => other.clone(),
			})
			.collect();
		Rc::new(LexerActionExecutor::new(actions))
	}

	/// Appends an action, producing a new executor (executors are immutable
	/// once attached to a configuration, mirroring `ATNConfig`'s frozen
	/// context discipline).
	pub fn with_appended(&self, action: LexerAction) -> Rc<LexerActionExecutor> {
		let mut actions: Vec<LexerAction> = self.actions.clone();
		actions.push(action);
		Rc::new(LexerActionExecutor::new(actions))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn appending_is_non_destructive() {
		let base: LexerActionExecutor = LexerActionExecutor::new(vec![LexerAction::Skip]);
		let extended: Rc<LexerActionExecutor> = base.with_appended(LexerAction::PushMode(1));
		assert_eq!(base.actions.len(), 1);
		assert_eq!(extended.actions.len(), 2);
	}

	#[test]
	fn fixing_offset_rewrites_custom_actions_only() {
		let base: LexerActionExecutor =
			LexerActionExecutor::new(vec![LexerAction::Skip, LexerAction::Custom { rule_index: 2, action_index: 0 }]);
		assert!(base.is_position_dependent());
		let fixed: Rc<LexerActionExecutor> = base.fix_offset_before_match(3);
		assert_eq!(fixed.actions[0], LexerAction::Skip);
		assert_eq!(fixed.actions[1], LexerAction::IndexedCustom { offset: 3, rule_index: 2, action_index: 0 });
		assert!(!fixed.is_position_dependent());
	}

	#[test]
	fn fixing_offset_is_idempotent_on_an_already_fixed_executor() {
		let base: LexerActionExecutor = LexerActionExecutor::new(vec![LexerAction::Custom { rule_index: 1, action_index: 4 }]);
		let fixed_once: Rc<LexerActionExecutor> = base.fix_offset_before_match(2);
		let fixed_twice: Rc<LexerActionExecutor> = fixed_once.fix_offset_before_match(9);
		assert_eq!(fixed_twice.actions, fixed_once.actions);
	}
}
