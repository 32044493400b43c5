//! Boolean lattice of semantic predicate references attached to ATN
//! transitions, normalized the way the parser's prediction engine needs to
//! compare and merge them cheaply.

use crate::recognizer::Recognizer;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SemanticContext {
	None,
	Predicate { rule_index: usize, pred_index: usize, is_ctx_dependent: bool },
	PrecedencePredicate { precedence: i32 },
	And(Vec<SemanticContext>),
	Or(Vec<SemanticContext>),
}

impl SemanticContext {
	pub fn predicate(rule_index: usize, pred_index: usize, is_ctx_dependent: bool) -> Self {
		SemanticContext::Predicate { rule_index, pred_index, is_ctx_dependent }
	}

	pub fn precedence(precedence: i32) -> Self {
		SemanticContext::PrecedencePredicate { precedence }
	}

	pub fn and(a: SemanticContext, b: SemanticContext) -> Self {
		if a == SemanticContext::None {
			return b;
		}
		if b == SemanticContext::None {
			return a;
		}
		let mut children: Vec<SemanticContext> = Vec::new();
		flatten_and(a, &mut children);
		flatten_and(b, &mut children);
		children.sort();
		children.dedup();

		let mut min_precedence: Option<i32> = None;
		children.retain(|c| {
			if let SemanticContext::PrecedencePredicate { precedence } = c {
				min_precedence = Some(min_precedence.map_or(*precedence, |p: i32| p.min(*precedence)));
				false
			} else {
				true
			}
		});
		if let Some(precedence) = min_precedence {
			children.push(SemanticContext::PrecedencePredicate { precedence });
			children.sort();
		}

		match children.len() {
			0 => SemanticContext::None,
			1 => children.into_iter().next().unwrap(),
			_ => SemanticContext::And(children),
		}
	}

	pub fn or(a: SemanticContext, b: SemanticContext) -> Self {
		if a == SemanticContext::None || b == SemanticContext::None {
			return SemanticContext::None;
		}
		let mut children: Vec<SemanticContext> = Vec::new();
		flatten_or(a, &mut children);
		flatten_or(b, &mut children);
		children.sort();
		children.dedup();
		match children.len() {
			0 => SemanticContext::None,
			1 => children.into_iter().next().unwrap(),
			_ => SemanticContext::Or(children),
		}
	}

	pub fn eval(&self, recognizer: &dyn Recognizer, precedence: i32) -> bool {
		match self {
			SemanticContext::None => true,
			SemanticContext::Predicate { rule_index, pred_index, .. } => recognizer.sempred(*rule_index, *pred_index),
			SemanticContext::PrecedencePredicate { precedence: p } => precedence >= *p,
			SemanticContext::And(children) => children.iter().all(|c| c.eval(recognizer, precedence)),
			SemanticContext::Or(children) => children.iter().any(|c| c.eval(recognizer, precedence)),
		}
	}

	/// Simplifies away precedence predicates given the current precedence,
	/// leaving the remaining (non-precedence) predicates to be evaluated
	/// later. Returns `None` when the whole context is statically false.
	pub fn eval_precedence(&self, precedence: i32) -> Option<SemanticContext> {
		match self {
			SemanticContext::PrecedencePredicate { precedence: p } => {
				if precedence >= *p {
					Some(SemanticContext::None)
				} else {
					None
				}
			},
			SemanticContext::And(children) => {
				let mut result: SemanticContext = SemanticContext::None;
				let mut changed: bool = false;
				for child in children {
					match child.eval_precedence(precedence) {
						None => return None,
						Some(simplified) => {
							changed |= simplified != *child;
							result = SemanticContext::and(result, simplified);
						},
					}
				}
				if changed { Some(result) } else { Some(self.clone()) }
			},
			SemanticContext::Or(children) => {
				let mut changed: bool = false;
				let mut survivors: Vec<SemanticContext> = Vec::new();
				for child in children {
					match child.eval_precedence(precedence) {
						None => changed = true,
						Some(simplified) => {
							changed |= simplified != *child;
							if simplified == SemanticContext::None {
								return Some(SemanticContext::None);
							}
							survivors.push(simplified);
						},
					}
				}
				if !changed {
					return Some(self.clone());
				}
				let mut survivors = survivors.into_iter();
				match survivors.next() {
					// every disjunct evaluated false; the OR itself is false.
					None => None,
					Some(first) => Some(survivors.fold(first, SemanticContext::or)),
				}
			},
			other => Some(other.clone()),
		}
	}
}

fn flatten_and(ctx: SemanticContext, out: &mut Vec<SemanticContext>) {
	match ctx {
		SemanticContext::And(children) => out.extend(children),
		other => out.push(other),
	}
}

fn flatten_or(ctx: SemanticContext, out: &mut Vec<SemanticContext>) {
	match ctx {
		SemanticContext::Or(children) => out.extend(children),
		other => out.push(other),
	}
}
