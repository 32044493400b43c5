//! Token-producing driver built on [`LexerAtnSimulator`]: owns the mode
//! stack, dispatches the actions a match collects, and turns lexemes into
//! [`Token`]s through a [`TokenFactory`].

use std::rc::Rc;

use crate::atn::Atn;
use crate::dfa::Dfa;
use crate::errors::{IllegalStateError, RecognitionError};
use crate::int_stream::{CharStream, DefaultTokenFactory, IntStream, Token, TokenFactory, DEFAULT_CHANNEL};
use crate::interval_set::EOF;
use crate::lexer_action::LexerAction;
use crate::lexer_atn_simulator::{LexerAtnSimulator, LexerMatch};
use crate::recognizer::Recognizer;

pub const DEFAULT_MODE: usize = 0;
pub const MORE: i32 = -2;
pub const SKIP: i32 = -3;
pub const MIN_CHAR: i32 = 0x0000;
pub const MAX_CHAR: i32 = 0x10FFFF;

/// Drives `LexerAtnSimulator::match_` in a loop, applying `skip`/`more`/mode
/// actions between matches the way a generated lexer's `nextToken` would.
pub struct Lexer {
	atn: Rc<Atn>,
	simulator: LexerAtnSimulator,
	mode_dfas: Vec<Dfa>,
	mode: usize,
	mode_stack: Vec<usize>,
	token_factory: Box<dyn TokenFactory>,
	next_token_index: usize,
	pub num_syntax_errors: usize,
}

impl Lexer {
	pub fn new(atn: Rc<Atn>) -> Self {
		let mode_dfas: Vec<Dfa> = (0..atn.num_modes().max(1))
			.map(|mode| Dfa::new(mode, atn.mode_start_states.get(mode).copied().unwrap_or(0), false))
			.collect();
		Self {
			simulator: LexerAtnSimulator::new(atn.clone()),
			atn,
			mode_dfas,
			mode: DEFAULT_MODE,
			mode_stack: Vec::new(),
			token_factory: Box::new(DefaultTokenFactory),
			next_token_index: 0,
			num_syntax_errors: 0,
		}
	}

	pub fn with_token_factory(mut self, factory: Box<dyn TokenFactory>) -> Self {
		self.token_factory = factory;
		self
	}

	/// Scans the next token off `input`, applying lexer actions between
	/// matches: `skip` drops the lexeme and restarts, `more` keeps
	/// accumulating the current lexeme through another rule match, mode
	/// actions retarget which mode's DFA the next match runs against.
	/// `LexerNoViableAlt` recovers by discarding one character and retrying,
	/// per the driver's own error-recovery contract (prediction itself never
	/// recovers).
	#[tracing::instrument(skip(self, input, recognizer))]
	pub fn next_token(&mut self, input: &mut dyn CharStream, recognizer: &mut dyn Recognizer) -> Result<Token, IllegalStateError> {
		let mut token_start: usize = input.index();
		let mut token_type_override: Option<i32> = None;
		let mut channel_override: Option<i32> = None;

		loop {
			if input.la(1) == EOF {
				return Ok(self.make_token(input, EOF, token_start, input.index(), DEFAULT_CHANNEL));
			}

			let mark: i32 = input.mark();
			let mode_start = self.atn.mode_start_state(self.mode);
			let result: Result<LexerMatch, RecognitionError> = self.simulator.match_(input, &self.mode_dfas[self.mode], mode_start);
			input.release(mark);

			let matched: LexerMatch = match result {
				Ok(m) => m,
				Err(RecognitionError::LexerNoViableAlt { start_index }) => {
					self.num_syntax_errors += 1;
					tracing::debug!(start_index, "no viable token, skipping one character");
					input.consume();
					token_start = input.index();
					token_type_override = None;
					channel_override = None;
					continue;
				},
				Err(other) => unreachable!("lexer simulator only ever returns LexerNoViableAlt: {other}"),
			};

			let mut skip: bool = false;
			let mut more: bool = false;
			if let Some(executor) = &matched.lexer_action_executor {
				for action in &executor.actions {
					match action {
						LexerAction::Skip => skip = true,
						LexerAction::More => more = true,
						LexerAction::Mode(mode) => self.mode = *mode,
						LexerAction::PushMode(mode) => {
							self.mode_stack.push(self.mode);
							self.mode = *mode;
						},
						LexerAction::PopMode => {
							self.mode = self.mode_stack.pop().ok_or(IllegalStateError::EmptyModeStackPopped)?;
						},
						LexerAction::Type(token_type) => token_type_override = Some(*token_type),
						LexerAction::Channel(channel) => channel_override = Some(*channel),
						LexerAction::Custom { rule_index, action_index } => recognizer.action(*rule_index, *action_index),
						LexerAction::IndexedCustom { rule_index, action_index, .. } => recognizer.action(*rule_index, *action_index),
					}
				}
			}

			if skip {
				token_start = input.index();
				token_type_override = None;
				channel_override = None;
				continue;
			}
			if more {
				continue;
			}

			let token_type: i32 = token_type_override.unwrap_or(matched.token_type);
			let channel: i32 = channel_override.unwrap_or(DEFAULT_CHANNEL);
			return Ok(self.make_token(input, token_type, token_start, input.index().saturating_sub(1), channel));
		}
	}

	fn make_token(&mut self, input: &dyn CharStream, token_type: i32, start: usize, stop: usize, channel: i32) -> Token {
		let text: String = if stop >= start { input.get_text(start, stop) } else { String::new() };
		let token_index: usize = self.next_token_index;
		self.next_token_index += 1;
		self.token_factory.create(token_type, text, channel, start, stop, self.simulator.line, self.simulator.column, token_index)
	}

	pub fn mode(&self) -> usize {
		self.mode
	}
}
