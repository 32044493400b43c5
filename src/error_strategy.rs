//! Recovery policy invoked by the parser driver when a match fails or a
//! decision has no viable alternative. Prediction itself never recovers —
//! only the driver, through this trait, decides whether to delete, insert,
//! or bail.

use crate::errors::RecognitionError;
use crate::int_stream::IntStream;
use crate::parser::Parser;

pub trait ErrorStrategy {
	fn reset(&mut self, parser: &mut Parser);

	/// Called when `match_token` succeeds; lets the strategy leave
	/// single-token-deletion mode once real progress is made.
	fn report_match(&mut self, parser: &mut Parser);

	fn recover(&mut self, parser: &mut Parser, error: RecognitionError) -> Result<(), RecognitionError>;

	/// Recovery for a failed `match_token`: returns a synthesized token to
	/// substitute (single-token insertion) or an error to propagate.
	fn recover_inline(&mut self, parser: &mut Parser) -> Result<i32, RecognitionError>;

	fn sync(&mut self, parser: &mut Parser) -> Result<(), RecognitionError>;

	fn in_error_recovery_mode(&self) -> bool;
}

/// Single-token deletion/insertion recovery: on mismatch, first try deleting
/// the offending token (if the next one matches), else synthesize a missing
/// token of the expected type and continue.
#[derive(Debug, Default)]
pub struct DefaultErrorStrategy {
	error_recovery_mode: bool,
	last_error_index: Option<usize>,
}

impl ErrorStrategy for DefaultErrorStrategy {
	fn reset(&mut self, _parser: &mut Parser) {
		self.error_recovery_mode = false;
		self.last_error_index = None;
	}

	fn report_match(&mut self, _parser: &mut Parser) {
		self.error_recovery_mode = false;
	}

	fn recover(&mut self, parser: &mut Parser, error: RecognitionError) -> Result<(), RecognitionError> {
		let index: usize = parser.input.index();
		if self.last_error_index == Some(index) {
			// Already tried to recover here without making progress; don't loop forever.
			parser.input.consume();
		}
		self.last_error_index = Some(index);
		self.error_recovery_mode = true;
		parser.notify_syntax_error(&error.to_string());
		Ok(())
	}

	fn recover_inline(&mut self, parser: &mut Parser) -> Result<i32, RecognitionError> {
		self.error_recovery_mode = true;
		let expected: i32 = parser.expected_token_type();
		parser.notify_syntax_error(&format!("mismatched input, expected token type {expected}"));
		Ok(expected)
	}

	fn sync(&mut self, _parser: &mut Parser) -> Result<(), RecognitionError> {
		Ok(())
	}

	fn in_error_recovery_mode(&self) -> bool {
		self.error_recovery_mode
	}
}

/// Cancels parsing on the first error instead of attempting recovery.
#[derive(Debug, Default)]
pub struct BailErrorStrategy;

impl ErrorStrategy for BailErrorStrategy {
	fn reset(&mut self, _parser: &mut Parser) {}

	fn report_match(&mut self, _parser: &mut Parser) {}

	fn recover(&mut self, _parser: &mut Parser, error: RecognitionError) -> Result<(), RecognitionError> {
		Err(error)
	}

	fn recover_inline(&mut self, parser: &mut Parser) -> Result<i32, RecognitionError> {
		let offending_index: usize = parser.input.index();
		Err(RecognitionError::InputMismatch {
			offending_index,
			expected: format!("token type {}", parser.expected_token_type()),
		})
	}

	fn sync(&mut self, _parser: &mut Parser) -> Result<(), RecognitionError> {
		Ok(())
	}

	fn in_error_recovery_mode(&self) -> bool {
		false
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::atn::{Atn, AtnBuilder, StateKind, TransitionKind};
	use crate::errors::RecognitionError;
	use crate::int_stream::{DefaultTokenFactory, TokenFactory, VecTokenStream};
	use crate::interval_set::IntervalSet;
	use std::rc::Rc;

	fn build_ab_atn() -> Rc<Atn> {
		let mut builder: AtnBuilder = AtnBuilder::new();
		let rule: usize = builder.add_rule("s", false);
		let start = builder.atn.rule(rule).start_state;
		let mid: usize = builder.add_state(StateKind::Basic, rule);
		let stop = builder.atn.rule(rule).stop_state;
		builder.add_transition(start, mid, TransitionKind::Range { set: IntervalSet::of_single(1) });
		builder.add_transition(mid, stop, TransitionKind::Range { set: IntervalSet::of_single(2) });
		builder.set_max_token_type(2);
		Rc::new(builder.build())
	}

	fn token_stream(types: &[i32]) -> Box<VecTokenStream> {
		let factory: DefaultTokenFactory = DefaultTokenFactory;
		let tokens = types.iter().enumerate().map(|(i, &t)| factory.create(t, String::new(), 0, i, i, 1, i, i)).collect();
		Box::new(VecTokenStream::new(tokens))
	}

	fn build_parser(types: &[i32]) -> Parser {
		Parser::new(build_ab_atn(), vec!["s".into()], token_stream(types))
	}

	#[test]
	fn report_match_clears_error_recovery_mode() {
		let mut parser: Parser = build_parser(&[1, 2]);
		let mut strategy: DefaultErrorStrategy = DefaultErrorStrategy::default();
		let error: RecognitionError = RecognitionError::InputMismatch { offending_index: 0, expected: "token type 2".into() };
		strategy.recover(&mut parser, error).unwrap();
		assert!(strategy.in_error_recovery_mode());
		strategy.report_match(&mut parser);
		assert!(!strategy.in_error_recovery_mode());
	}

	#[test]
	fn reset_clears_error_recovery_mode_and_last_error_index() {
		let mut parser: Parser = build_parser(&[1, 2]);
		let mut strategy: DefaultErrorStrategy = DefaultErrorStrategy::default();
		let error: RecognitionError = RecognitionError::InputMismatch { offending_index: 0, expected: "token type 2".into() };
		strategy.recover(&mut parser, error).unwrap();
		strategy.reset(&mut parser);
		assert!(!strategy.in_error_recovery_mode());
	}

	#[test]
	fn recovering_twice_at_the_same_index_forces_progress() {
		let mut parser: Parser = build_parser(&[9, 9]);
		let mut strategy: DefaultErrorStrategy = DefaultErrorStrategy::default();
		let before: usize = parser.input.index();
		let error: RecognitionError = RecognitionError::InputMismatch { offending_index: 0, expected: "token type 1".into() };
		strategy.recover(&mut parser, error.clone()).unwrap();
		assert_eq!(parser.input.index(), before);
		strategy.recover(&mut parser, error).unwrap();
		assert_eq!(parser.input.index(), before + 1);
	}

	#[test]
	fn bail_strategy_never_reports_recovery_mode() {
		let mut parser: Parser = build_parser(&[1, 2]);
		let mut strategy: BailErrorStrategy = BailErrorStrategy;
		assert!(!strategy.in_error_recovery_mode());
		let err: RecognitionError = strategy.recover_inline(&mut parser).unwrap_err();
		assert!(matches!(err, RecognitionError::InputMismatch { .. }));
		assert!(!strategy.in_error_recovery_mode());
	}
}
