//! Glue between a hand- or generator-driven rule recognizer and the
//! prediction engine: owns the token stream, the rule/precedence stacks, and
//! delegates every decision to [`ParserAtnSimulator`]. Holds no prediction
//! logic of its own — `adaptive_predict` is the only place a decision gets
//! made, and it forwards straight to the simulator.

use std::rc::Rc;

use crate::atn::Atn;
use crate::dfa::Dfa;
use crate::errors::RecognitionError;
use crate::int_stream::{DefaultTokenFactory, IntStream, Token, TokenFactory, TokenStream, DEFAULT_CHANNEL, INVALID_TYPE};
use crate::interval_set::EOF;
use crate::prediction_context::PredictionContextCache;
use crate::recognizer::{Recognizer, SimpleRecognizer};
use crate::parser_atn_simulator::ParserAtnSimulator;

pub struct Parser {
	pub input: Box<dyn TokenStream>,
	simulator: ParserAtnSimulator,
	context_cache: PredictionContextCache,
	token_factory: Box<dyn TokenFactory>,
	/// Invoking (follow) states of the rules currently on the call stack,
	/// outermost first — exactly the `call_stack` `compute_start_state`
	/// threads into `PredictionContext::from_call_stack`.
	call_stack: Vec<usize>,
	precedence_stack: Vec<i32>,
	expected_token_type: i32,
	recognizer: SimpleRecognizer,
}

impl Parser {
	pub fn new(atn: Rc<Atn>, rule_names: Vec<String>, input: Box<dyn TokenStream>) -> Self {
		Self {
			simulator: ParserAtnSimulator::new(atn.clone()),
			input,
			context_cache: PredictionContextCache::new(),
			token_factory: Box::new(DefaultTokenFactory),
			call_stack: Vec::new(),
			precedence_stack: Vec::new(),
			expected_token_type: INVALID_TYPE,
			recognizer: SimpleRecognizer::new(rule_names, atn),
		}
	}

	pub fn with_token_factory(mut self, factory: Box<dyn TokenFactory>) -> Self {
		self.token_factory = factory;
		self
	}

	pub fn num_syntax_errors(&self) -> usize {
		self.recognizer.num_syntax_errors
	}

	pub fn add_error_listener(&mut self, listener: Box<dyn crate::error_listener::ErrorListener>) {
		self.recognizer.error_listeners.push(listener);
	}

	/// Consumes the current token unconditionally; the caller is responsible
	/// for having already decided it's the right one.
	pub fn consume(&mut self) -> Token {
		let token: Token = self.input.lt(1).cloned().expect("consume called with no current token");
		self.input.consume();
		token
	}

	/// Matches the current token against `expected_type`. On mismatch, tries
	/// single-token deletion first (if the token after the offending one is
	/// the expected type, the offending token is an extra and gets dropped);
	/// otherwise defers to `error_strategy.recover_inline`, which synthesizes
	/// a missing token rather than consuming anything.
	pub fn match_token(&mut self, expected_type: i32, error_strategy: &mut dyn crate::error_strategy::ErrorStrategy) -> Result<Token, RecognitionError> {
		if self.input.la(1) == expected_type {
			error_strategy.report_match(self);
			return Ok(self.consume());
		}

		if self.input.la(1) != EOF && self.input.la(2) == expected_type {
			self.notify_syntax_error(&format!("extraneous input, expected token type {expected_type}"));
			self.input.consume();
			error_strategy.report_match(self);
			return Ok(self.consume());
		}

		self.expected_token_type = expected_type;
		let synthesized_type: i32 = error_strategy.recover_inline(self)?;
		Ok(self.missing_token(synthesized_type))
	}

	fn missing_token(&mut self, token_type: i32) -> Token {
		let index: usize = self.input.index();
		self.token_factory.create(token_type, "<missing>".to_owned(), DEFAULT_CHANNEL, index, index, 0, 0, index)
	}

	/// The token type `match_token` was last asked for; `DefaultErrorStrategy`
	/// and `BailErrorStrategy` both read this to report what they expected.
	pub fn expected_token_type(&self) -> i32 {
		self.expected_token_type
	}

	pub fn notify_syntax_error(&mut self, message: &str) {
		let offending_symbol: Option<i32> = Some(self.input.la(1));
		let (line, column): (usize, usize) = self.input.lt(1).map_or((0, 0), |t| (t.line, t.column));
		self.recognizer.notify_syntax_error(offending_symbol, line, column, message);
	}

	/// Pushes `return_state` (the invoking rule transition's follow state)
	/// onto the call stack before descending into a sub-rule.
	pub fn enter_rule(&mut self, return_state: usize) {
		self.call_stack.push(return_state);
	}

	pub fn exit_rule(&mut self) {
		self.call_stack.pop();
	}

	pub fn enter_recursion_rule(&mut self, return_state: usize, precedence: i32) {
		self.precedence_stack.push(precedence);
		self.enter_rule(return_state);
	}

	pub fn exit_recursion_rule(&mut self) {
		self.precedence_stack.pop();
		self.exit_rule();
	}

	pub fn precedence(&self) -> i32 {
		self.precedence_stack.last().copied().unwrap_or(0)
	}

	pub fn state(&self) -> i32 {
		self.recognizer.state()
	}

	pub fn set_state(&mut self, state: i32) {
		self.recognizer.set_state(state);
	}

	/// Delegates to `ParserATNSimulator::adaptive_predict` using this
	/// parser's current call stack and precedence. `self.input`,
	/// `self.recognizer`, and `self.context_cache` are disjoint fields, so
	/// this borrows each independently instead of needing `self` to
	/// simultaneously act as both the caller and the `Recognizer`.
	pub fn adaptive_predict(&mut self, dfa: &Dfa) -> Result<usize, RecognitionError> {
		let precedence: i32 = self.precedence_stack.last().copied().unwrap_or(0);
		self.simulator.adaptive_predict(dfa, self.input.as_mut(), &self.call_stack, precedence, &mut self.recognizer, &mut self.context_cache)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::atn::{AtnBuilder, StateKind, TransitionKind};
	use crate::error_strategy::{BailErrorStrategy, DefaultErrorStrategy};
	use crate::int_stream::{DefaultTokenFactory, VecTokenStream};
	use crate::interval_set::IntervalSet;

	/// `S: 'a' 'b' ;` with token types `A = 1`, `B = 2`.
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

	#[test]
	fn matching_tokens_in_order_consumes_and_reports_no_errors() {
		let atn: Rc<Atn> = build_ab_atn();
		let mut parser: Parser = Parser::new(atn, vec!["s".into()], token_stream(&[1, 2]));
		let mut strategy: DefaultErrorStrategy = DefaultErrorStrategy::default();
		parser.match_token(1, &mut strategy).unwrap();
		parser.match_token(2, &mut strategy).unwrap();
		assert_eq!(parser.num_syntax_errors(), 0);
	}

	#[test]
	fn single_token_deletion_skips_one_extraneous_token() {
		let atn: Rc<Atn> = build_ab_atn();
		// tokens: A, <extra type 9>, B
		let mut parser: Parser = Parser::new(atn, vec!["s".into()], token_stream(&[1, 9, 2]));
		let mut strategy: DefaultErrorStrategy = DefaultErrorStrategy::default();
		parser.match_token(1, &mut strategy).unwrap();
		let b: Token = parser.match_token(2, &mut strategy).unwrap();
		assert_eq!(b.token_type, 2);
		assert_eq!(parser.num_syntax_errors(), 1);
	}

	#[test]
	fn missing_token_is_synthesized_without_consuming() {
		let atn: Rc<Atn> = build_ab_atn();
		let mut parser: Parser = Parser::new(atn, vec!["s".into()], token_stream(&[1]));
		let mut strategy: DefaultErrorStrategy = DefaultErrorStrategy::default();
		parser.match_token(1, &mut strategy).unwrap();
		let before: usize = parser.input.index();
		let missing: Token = parser.match_token(2, &mut strategy).unwrap();
		assert_eq!(missing.token_type, 2);
		assert_eq!(parser.input.index(), before);
		assert_eq!(parser.num_syntax_errors(), 1);
	}

	#[test]
	fn bail_strategy_propagates_the_mismatch_as_an_error() {
		let atn: Rc<Atn> = build_ab_atn();
		let mut parser: Parser = Parser::new(atn, vec!["s".into()], token_stream(&[1]));
		let mut strategy: BailErrorStrategy = BailErrorStrategy;
		parser.match_token(1, &mut strategy).unwrap();
		let err = parser.match_token(2, &mut strategy).unwrap_err();
		assert!(matches!(err, RecognitionError::InputMismatch { .. }));
	}

	#[test]
	fn adaptive_predict_picks_the_only_viable_alt_through_the_parser() {
		let mut builder: AtnBuilder = AtnBuilder::new();
		let rule: usize = builder.add_rule("s", false);
		let start = builder.atn.rule(rule).start_state;
		let stop = builder.atn.rule(rule).stop_state;
		let decision_state: usize = builder.add_state(StateKind::Block, rule);
		let alt1_start: usize = builder.add_state(StateKind::Basic, rule);
		builder.add_transition(start, decision_state, TransitionKind::Epsilon);
		let decision: usize = builder.add_decision(decision_state);
		builder.add_transition(decision_state, alt1_start, TransitionKind::Epsilon);
		builder.add_transition(alt1_start, stop, TransitionKind::Range { set: IntervalSet::of_single(1) });
		builder.set_max_token_type(2);
		let atn: Rc<Atn> = Rc::new(builder.build());

		let dfa: Dfa = Dfa::new(decision, atn.decision_state(decision), false);
		let mut parser: Parser = Parser::new(atn, vec!["s".into()], token_stream(&[1]));
		let alt: usize = parser.adaptive_predict(&dfa).unwrap();
		assert_eq!(alt, 1);
	}
}
