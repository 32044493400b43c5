//! Listener dispatch for syntax errors and prediction-mode diagnostics
//! (ambiguity, attempting-full-context, context-sensitivity reports).

use crate::interval_set::BitSet;

pub trait ErrorListener {
	#[allow(clippy::too_many_arguments)]
	fn syntax_error(
		&mut self,
		offending_symbol: Option<i32>,
		line: usize,
		column: usize,
		message: &str,
	) {
		let _ = (offending_symbol, line, column, message);
	}

	fn report_ambiguity(&mut self, decision: usize, start_index: usize, stop_index: usize, ambig_alts: &BitSet) {
		let _ = (decision, start_index, stop_index, ambig_alts);
	}

	fn report_attempting_full_context(&mut self, decision: usize, start_index: usize, stop_index: usize) {
		let _ = (decision, start_index, stop_index);
	}

	fn report_context_sensitivity(&mut self, decision: usize, start_index: usize, stop_index: usize, prediction: usize) {
		let _ = (decision, start_index, stop_index, prediction);
	}
}

/// Writes syntax errors to stderr; the default a bare recognizer wires up
/// absent anything else, mirroring ANTLR's `ConsoleErrorListener`.
#[derive(Debug, Default)]
pub struct ConsoleErrorListener;

impl ErrorListener for ConsoleErrorListener {
	fn syntax_error(&mut self, _offending_symbol: Option<i32>, line: usize, column: usize, message: &str) {
		eprintln!("line {line}:{column} {message}");
	}
}

/// Records every report instead of printing it, so tests can assert on
/// counts and contents.
#[derive(Debug, Default)]
pub struct CollectingErrorListener {
	pub syntax_errors: Vec<String>,
	pub ambiguities: Vec<(usize, BitSet)>,
	pub attempting_full_context: Vec<usize>,
	pub context_sensitivities: Vec<(usize, usize)>,
}

impl ErrorListener for CollectingErrorListener {
	fn syntax_error(&mut self, _offending_symbol: Option<i32>, line: usize, column: usize, message: &str) {
		self.syntax_errors.push(format!("{line}:{column} {message}"));
	}

	fn report_ambiguity(&mut self, decision: usize, _start_index: usize, _stop_index: usize, ambig_alts: &BitSet) {
		self.ambiguities.push((decision, ambig_alts.clone()));
	}

	fn report_attempting_full_context(&mut self, decision: usize, _start_index: usize, _stop_index: usize) {
		self.attempting_full_context.push(decision);
	}

	fn report_context_sensitivity(&mut self, decision: usize, _start_index: usize, _stop_index: usize, prediction: usize) {
		self.context_sensitivities.push((decision, prediction));
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn collecting_listener_records_syntax_errors() {
		let mut listener: CollectingErrorListener = CollectingErrorListener::default();
		listener.syntax_error(None, 1, 2, "boom");
		assert_eq!(listener.syntax_errors, vec!["1:2 boom".to_owned()]);
	}
}
