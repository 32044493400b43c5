//! Hash-consed DAG of possible rule-return call stacks.
//!
//! Mirrors the shared, reference-counted node style the runtime already uses
//! for its automata graphs (`Nfa`/`Dfa` keep their states in a flat `Vec` and
//! refer to each other by index); here the nodes are heap objects instead
//! because the DAG is built and merged dynamically during prediction rather
//! than once up front.

use std::collections::BTreeMap;
use std::rc::Rc;

/// Sentinel invoking-state meaning "returned to the caller of the outermost
/// rule" — i.e. there is no parent frame.
pub const EMPTY_RETURN_STATE: usize = usize::MAX;

#[derive(Debug, Clone)]
pub enum PredictionContext {
	Empty,
	Singleton { parent: Option<Rc<PredictionContext>>, invoking_state: usize },
	Array { parents: Vec<Option<Rc<PredictionContext>>>, invoking_states: Vec<usize> },
}

impl PredictionContext {
	pub fn empty() -> Rc<PredictionContext> {
		Rc::new(PredictionContext::Empty)
	}

	pub fn singleton(parent: Option<Rc<PredictionContext>>, invoking_state: usize) -> Rc<PredictionContext> {
		Rc::new(PredictionContext::Singleton { parent, invoking_state })
	}

	pub fn is_empty(&self) -> bool {
		matches!(self, PredictionContext::Empty)
	}

	/// Builds a context chain by following `invoking_states` in call order,
	/// outermost caller first.
	pub fn from_call_stack(invoking_states: &[usize]) -> Rc<PredictionContext> {
		let mut ctx: Rc<PredictionContext> = PredictionContext::empty();
		for &state in invoking_states {
			ctx = PredictionContext::singleton(Some(ctx), state);
		}
		ctx
	}

	pub(crate) fn parents_and_states(&self) -> (Vec<Option<Rc<PredictionContext>>>, Vec<usize>) {
		match self {
			PredictionContext::Empty => (vec![None], vec![EMPTY_RETURN_STATE]),
			PredictionContext::Singleton { parent, invoking_state } => (vec![parent.clone()], vec![*invoking_state]),
			PredictionContext::Array { parents, invoking_states } => (parents.clone(), invoking_states.clone()),
		}
	}
}

impl PartialEq for PredictionContext {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(PredictionContext::Empty, PredictionContext::Empty) => true,
			(
				PredictionContext::Singleton { parent: pa, invoking_state: sa },
				PredictionContext::Singleton { parent: pb, invoking_state: sb },
			) => sa == sb && rc_opt_eq(pa, pb),
			(
				PredictionContext::Array { parents: pa, invoking_states: sa },
				PredictionContext::Array { parents: pb, invoking_states: sb },
			) => sa == sb && pa.len() == pb.len() && pa.iter().zip(pb.iter()).all(|(x, y)| rc_opt_eq(x, y)),
			_ => false,
		}
	}
}
impl Eq for PredictionContext {}

fn rc_opt_eq(a: &Option<Rc<PredictionContext>>, b: &Option<Rc<PredictionContext>>) -> bool {
	match (a, b) {
		(None, None) => true,
		(Some(x), Some(y)) => Rc::ptr_eq(x, y) || x == y,
		_ => false,
	}
}

/// Memoization cache for a single merge call graph; not shared across
/// unrelated `adaptive_predict` invocations.
pub type MergeCache = BTreeMap<(usize, usize, bool), Rc<PredictionContext>>;

fn id_of(ctx: &Option<Rc<PredictionContext>>) -> usize {
	match ctx {
		None => 0,
		Some(rc) => Rc::as_ptr(rc) as usize,
	}
}

/// Merges two prediction contexts. `root_is_wildcard` selects SLL semantics
/// (`true`: any root absorbs the other) versus full-context LL semantics
/// (`false`: roots combine only when structurally equal).
pub fn merge(
	a: &Rc<PredictionContext>,
	b: &Rc<PredictionContext>,
	root_is_wildcard: bool,
	cache: &mut MergeCache,
) -> Rc<PredictionContext> {
	if Rc::ptr_eq(a, b) {
		return a.clone();
	}
	let key: (usize, usize, bool) = (Rc::as_ptr(a) as usize, Rc::as_ptr(b) as usize, root_is_wildcard);
	if let Some(cached) = cache.get(&key) {
		return cached.clone();
	}
	let result: Rc<PredictionContext> = match (a.as_ref(), b.as_ref()) {
		(PredictionContext::Empty, PredictionContext::Empty) => PredictionContext::empty(),
		(PredictionContext::Empty, _) | (_, PredictionContext::Empty) => {
			if root_is_wildcard {
				PredictionContext::empty()
			} else {
				merge_arrays(a, b, root_is_wildcard, cache)
			}
		},
		(
			PredictionContext::Singleton { parent: pa, invoking_state: sa },
			PredictionContext::Singleton { parent: pb, invoking_state: sb },
		) => {
			if sa == sb {
				let merged_parent: Option<Rc<PredictionContext>> = match (pa, pb) {
					(Some(x), Some(y)) => Some(merge(x, y, root_is_wildcard, cache)),
					(None, None) => None,
					_ => unreachable!("singleton with same invoking state must agree on parent presence"),
				};
				if rc_opt_eq(&merged_parent, pa) {
					a.clone()
				} else {
					PredictionContext::singleton(merged_parent, *sa)
				}
			} else {
				merge_arrays(a, b, root_is_wildcard, cache)
			}
		},
		_ => merge_arrays(a, b, root_is_wildcard, cache),
	};
	cache.insert(key, result.clone());
	result
}

fn merge_arrays(
	a: &Rc<PredictionContext>,
	b: &Rc<PredictionContext>,
	root_is_wildcard: bool,
	cache: &mut MergeCache,
) -> Rc<PredictionContext> {
	let (pa, sa): (Vec<Option<Rc<PredictionContext>>>, Vec<usize>) = a.parents_and_states();
	let (pb, sb): (Vec<Option<Rc<PredictionContext>>>, Vec<usize>) = b.parents_and_states();

	let mut merged_states: Vec<usize> = Vec::new();
	let mut merged_parents: Vec<Option<Rc<PredictionContext>>> = Vec::new();

	let (mut i, mut j): (usize, usize) = (0, 0);
	while i < sa.len() && j < sb.len() {
		match sa[i].cmp(&sb[j]) {
			std::cmp::Ordering::Less => {
				merged_states.push(sa[i]);
				merged_parents.push(pa[i].clone());
				i += 1;
			},
			std::cmp::Ordering::Greater => {
				merged_states.push(sb[j]);
				merged_parents.push(pb[j].clone());
				j += 1;
			},
			std::cmp::Ordering::Equal => {
				merged_states.push(sa[i]);
				let merged_parent: Option<Rc<PredictionContext>> = match (&pa[i], &pb[j]) {
					(Some(x), Some(y)) => Some(merge(x, y, root_is_wildcard, cache)),
					(None, _) | (_, None) => {
						if root_is_wildcard {
							None
						} else {
							pa[i].clone().or_else(|| pb[j].clone())
						}
					},
				};
				merged_parents.push(merged_parent);
				i += 1;
				j += 1;
			},
		}
	}
	merged_states.extend_from_slice(&sa[i..]);
	merged_parents.extend_from_slice(&pa[i..]);
	merged_states.extend_from_slice(&sb[j..]);
	merged_parents.extend_from_slice(&pb[j..]);

	if merged_states.len() == 1 {
		return match merged_states[0] {
			EMPTY_RETURN_STATE if merged_parents[0].is_none() => PredictionContext::empty(),
			state => PredictionContext::singleton(merged_parents[0].clone(), state),
		};
	}
	Rc::new(PredictionContext::Array { parents: merged_parents, invoking_states: merged_states })
}

/// Process-wide intern table so identical contexts constructed from
/// different call sites share a single allocation.
#[derive(Debug, Default)]
pub struct PredictionContextCache {
	table: BTreeMap<u64, Vec<Rc<PredictionContext>>>,
}

impl PredictionContextCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn intern(&mut self, ctx: Rc<PredictionContext>) -> Rc<PredictionContext> {
		let hash: u64 = structural_hash(&ctx);
		let bucket: &mut Vec<Rc<PredictionContext>> = self.table.entry(hash).or_default();
		for existing in bucket.iter() {
			if **existing == *ctx {
				return existing.clone();
			}
		}
		bucket.push(ctx.clone());
		ctx
	}
}

fn structural_hash(ctx: &PredictionContext) -> u64 {
	use std::hash::{Hash, Hasher};
	let mut hasher: std::collections::hash_map::DefaultHasher = std::collections::hash_map::DefaultHasher::new();
	hash_into(ctx, &mut hasher);
	hasher.finish()
}

fn hash_into(ctx: &PredictionContext, hasher: &mut impl std::hash::Hasher) {
	use std::hash::Hash;
	match ctx {
		PredictionContext::Empty => 0u8.hash(hasher),
		PredictionContext::Singleton { parent, invoking_state } => {
			1u8.hash(hasher);
			invoking_state.hash(hasher);
			if let Some(p) = parent {
				hash_into(p, hasher);
			} else {
				EMPTY_RETURN_STATE.hash(hasher);
			}
		},
		PredictionContext::Array { parents, invoking_states } => {
			2u8.hash(hasher);
			invoking_states.hash(hasher);
			for parent in parents {
				if let Some(p) = parent {
					hash_into(p, hasher);
				} else {
					EMPTY_RETURN_STATE.hash(hasher);
				}
			}
		},
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn merging_identical_contexts_is_idempotent() {
		let mut cache: MergeCache = MergeCache::new();
		let a: Rc<PredictionContext> = PredictionContext::singleton(None, 5);
		let merged: Rc<PredictionContext> = merge(&a, &a, true, &mut cache);
		assert_eq!(*merged, *a);
	}

	#[test]
	fn sll_merge_absorbs_into_wildcard_root() {
		let mut cache: MergeCache = MergeCache::new();
		let a: Rc<PredictionContext> = PredictionContext::empty();
		let b: Rc<PredictionContext> = PredictionContext::singleton(None, 5);
		let merged: Rc<PredictionContext> = merge(&a, &b, true, &mut cache);
		assert!(merged.is_empty());
	}

	#[test]
	fn ll_merge_of_unequal_roots_produces_array() {
		let mut cache: MergeCache = MergeCache::new();
		let a: Rc<PredictionContext> = PredictionContext::empty();
		let b: Rc<PredictionContext> = PredictionContext::singleton(None, 5);
		let merged: Rc<PredictionContext> = merge(&a, &b, false, &mut cache);
		assert!(matches!(*merged, PredictionContext::Array { .. }));
	}

	#[test]
	fn merge_is_commutative_up_to_structural_equality() {
		let mut cache: MergeCache = MergeCache::new();
		let a: Rc<PredictionContext> = PredictionContext::singleton(None, 3);
		let b: Rc<PredictionContext> = PredictionContext::singleton(None, 7);
		let ab: Rc<PredictionContext> = merge(&a, &b, false, &mut cache);
		let ba: Rc<PredictionContext> = merge(&b, &a, false, &mut cache);
		assert_eq!(*ab, *ba);
	}

	#[test]
	fn cache_interns_structurally_equal_contexts() {
		let mut cache: PredictionContextCache = PredictionContextCache::new();
		let a: Rc<PredictionContext> = PredictionContext::singleton(None, 9);
		let b: Rc<PredictionContext> = PredictionContext::singleton(None, 9);
		let ia: Rc<PredictionContext> = cache.intern(a);
		let ib: Rc<PredictionContext> = cache.intern(b);
		assert!(Rc::ptr_eq(&ia, &ib));
	}
}
