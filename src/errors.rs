//! Recognition and protocol-misuse error types. Kept as plain, fielded enums
//! (no derive-macro error crate in the dependency graph) implementing
//! `std::error::Error` so they compose with `?` at the crate's public
//! boundary, the same way hand-rolled error enums are used elsewhere in this
//! codebase.

use std::fmt;

use crate::atn_config::AtnConfigSet;

#[derive(Debug, Clone)]
pub enum RecognitionError {
	NoViableAlt { start_index: usize, offending_index: usize, configs: AtnConfigSet },
	InputMismatch { offending_index: usize, expected: String },
	FailedPredicate { rule_index: usize, pred_index: usize },
	LexerNoViableAlt { start_index: usize },
}

impl fmt::Display for RecognitionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RecognitionError::NoViableAlt { start_index, offending_index, .. } => {
				write!(f, "no viable alternative at input index {offending_index} (decision started at {start_index})")
			},
			RecognitionError::InputMismatch { offending_index, expected } => {
				write!(f, "mismatched input at index {offending_index}, expected {expected}")
			},
			RecognitionError::FailedPredicate { rule_index, pred_index } => {
				write!(f, "rule {rule_index} predicate {pred_index} failed")
			},
			RecognitionError::LexerNoViableAlt { start_index } => {
				write!(f, "token recognition failed at input index {start_index}")
			},
		}
	}
}

impl std::error::Error for RecognitionError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IllegalStateError {
	FrozenConfigSetMutated,
	EmptyModeStackPopped,
	MissingDfaStartState,
}

impl fmt::Display for IllegalStateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IllegalStateError::FrozenConfigSetMutated => write!(f, "attempted to mutate a frozen configuration set"),
			IllegalStateError::EmptyModeStackPopped => write!(f, "popMode on an empty lexer mode stack"),
			IllegalStateError::MissingDfaStartState => write!(f, "DFA has no start state for this decision"),
		}
	}
}

impl std::error::Error for IllegalStateError {}

#[cfg(test)]
mod test {
	use super::*;
	use crate::atn_config::AtnConfigSet;

	#[test]
	fn recognition_error_display_includes_position() {
		let err: RecognitionError = RecognitionError::InputMismatch { offending_index: 3, expected: "token type 5".into() };
		assert_eq!(err.to_string(), "mismatched input at index 3, expected token type 5");
	}

	#[test]
	fn no_viable_alt_display_reports_both_indices() {
		let err: RecognitionError =
			RecognitionError::NoViableAlt { start_index: 0, offending_index: 2, configs: AtnConfigSet::new(false) };
		assert_eq!(err.to_string(), "no viable alternative at input index 2 (decision started at 0)");
	}

	#[test]
	fn illegal_state_variants_have_distinct_messages() {
		assert_ne!(IllegalStateError::FrozenConfigSetMutated.to_string(), IllegalStateError::EmptyModeStackPopped.to_string());
		assert_eq!(IllegalStateError::EmptyModeStackPopped, IllegalStateError::EmptyModeStackPopped);
	}
}
