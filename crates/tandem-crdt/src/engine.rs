//! The RGA-style replicated sequence register.

use std::cell::Cell;
use std::collections::HashSet;

use crate::op::{ElementId, Op, UpdateBlob};

#[derive(Debug, Clone)]
struct Element {
	id: ElementId,
	left_origin: Option<ElementId>,
	value: char,
	tombstone: bool,
}

/// A single site's replica of the shared text register.
///
/// Convergence relies only on each element's `left_origin` and a
/// deterministic tie-break among concurrent siblings (descending id) — no
/// central owner or sequence precondition is involved (spec §4.E).
pub struct Register {
	site_id: u64,
	counter: u64,
	elements: Vec<Element>,
	/// Deletes for ids that hadn't arrived yet when the delete op was
	/// applied; resolved (and removed) the moment a matching insert lands.
	pending_deletes: HashSet<ElementId>,
	applying_remote: Cell<bool>,
}

impl Register {
	pub fn new(site_id: u64) -> Self {
		Self {
			site_id,
			counter: 0,
			elements: Vec::new(),
			pending_deletes: HashSet::new(),
			applying_remote: Cell::new(false),
		}
	}

	/// True while a remote update is being applied; a caller should use
	/// this to suppress re-broadcasting the resulting change as if it were
	/// a fresh local edit.
	pub fn is_applying_remote(&self) -> bool {
		self.applying_remote.get()
	}

	pub fn length(&self) -> usize {
		self.elements.iter().filter(|e| !e.tombstone).count()
	}

	pub fn snapshot(&self) -> String {
		self.elements.iter().filter(|e| !e.tombstone).map(|e| e.value).collect()
	}

	fn next_id(&mut self) -> ElementId {
		self.counter += 1;
		ElementId {
			site: self.site_id,
			counter: self.counter,
		}
	}

	fn index_of(&self, id: ElementId) -> Option<usize> {
		self.elements.iter().position(|e| e.id == id)
	}

	/// Applies the RGA insert rule: place `id` right after `left_origin`,
	/// then skip forward past any existing sibling anchored at the same
	/// origin with a greater id, so concurrent inserts at the same spot
	/// converge to the same order everywhere.
	fn insert_ordered(&mut self, id: ElementId, left_origin: Option<ElementId>, value: char) {
		let mut pos = match left_origin {
			None => 0,
			Some(origin) => match self.index_of(origin) {
				Some(idx) => idx + 1,
				// Origin hasn't arrived yet (out-of-order delivery); place at
				// the head rather than dropping the operation.
				None => 0,
			},
		};
		while let Some(sibling) = self.elements.get(pos) {
			if sibling.left_origin == left_origin && sibling.id > id {
				pos += 1;
			} else {
				break;
			}
		}
		self.elements.insert(
			pos,
			Element {
				id,
				left_origin,
				value,
				tombstone: false,
			},
		);
	}

	/// Replaces the entire visible content without producing an update blob
	/// — used to apply an initial snapshot received from a peer, which
	/// must not be re-broadcast as if it were a fresh local edit.
	pub fn hydrate(&mut self, text: &str) {
		self.elements.clear();
		self.pending_deletes.clear();
		self.counter = 0;
		let mut anchor = None;
		for ch in text.chars() {
			let id = self.next_id();
			self.insert_ordered(id, anchor, ch);
			anchor = Some(id);
		}
	}

	fn last_live_id(&self) -> Option<ElementId> {
		self.elements.iter().rev().find(|e| !e.tombstone).map(|e| e.id)
	}

	/// Appends `fragment` after the current tail, returning the update
	/// blob to broadcast.
	pub fn append(&mut self, fragment: &str) -> UpdateBlob {
		let mut ops = Vec::with_capacity(fragment.chars().count());
		let mut anchor = self.last_live_id();
		for ch in fragment.chars() {
			let id = self.next_id();
			self.insert_ordered(id, anchor, ch);
			ops.push(Op::Insert { id, left: anchor, value: ch });
			anchor = Some(id);
		}
		UpdateBlob { ops }
	}

	/// Tombstones every currently live element, then appends `text` as a
	/// fresh run anchored at the head.
	pub fn replace_all(&mut self, text: &str) -> UpdateBlob {
		let mut ops: Vec<Op> = self
			.elements
			.iter_mut()
			.filter(|e| !e.tombstone)
			.map(|e| {
				e.tombstone = true;
				Op::Delete { id: e.id }
			})
			.collect();

		let mut anchor = None;
		for ch in text.chars() {
			let id = self.next_id();
			self.insert_ordered(id, anchor, ch);
			ops.push(Op::Insert { id, left: anchor, value: ch });
			anchor = Some(id);
		}
		UpdateBlob { ops }
	}

	/// Applies a remote update blob atomically, under the re-entrancy
	/// guard.
	pub fn apply_remote(&mut self, blob: &UpdateBlob) {
		self.applying_remote.set(true);
		for op in &blob.ops {
			match *op {
				Op::Insert { id, left, value } => {
					if self.index_of(id).is_none() {
						self.insert_ordered(id, left, value);
					}
					if self.pending_deletes.remove(&id) {
						if let Some(element) = self.elements.iter_mut().find(|e| e.id == id) {
							element.tombstone = true;
						}
					}
				}
				Op::Delete { id } => match self.elements.iter_mut().find(|e| e.id == id) {
					Some(element) => element.tombstone = true,
					None => {
						self.pending_deletes.insert(id);
					}
				},
			}
		}
		self.applying_remote.set(false);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn append_builds_snapshot_in_order() {
		let mut reg = Register::new(1);
		reg.append("hel");
		reg.append("lo");
		assert_eq!(reg.snapshot(), "hello");
		assert_eq!(reg.length(), 5);
	}

	#[test]
	fn replace_all_discards_prior_content() {
		let mut reg = Register::new(1);
		reg.append("old text");
		reg.replace_all("new");
		assert_eq!(reg.snapshot(), "new");
	}

	#[test]
	fn remote_apply_converges_with_local_state() {
		let mut a = Register::new(1);
		let update = a.append("abc");

		let mut b = Register::new(2);
		b.apply_remote(&update);

		assert_eq!(a.snapshot(), b.snapshot());
	}

	#[test]
	fn replaying_a_sequence_of_updates_reproduces_the_source_snapshot() {
		let mut a = Register::new(1);
		let first = a.append("x");
		let second = a.append("y");

		let mut replica = Register::new(2);
		replica.apply_remote(&first);
		replica.apply_remote(&second);

		assert_eq!(replica.snapshot(), a.snapshot());
		assert_eq!(replica.snapshot(), "xy");
	}

	#[test]
	fn delete_before_insert_arrival_is_buffered_and_applied_on_arrival() {
		let mut a = Register::new(1);
		let insert_update = a.append("z");
		let delete_update = UpdateBlob {
			ops: vec![crate::op::Op::Delete {
				id: a.last_live_id().unwrap(),
			}],
		};

		let mut b = Register::new(2);
		b.apply_remote(&delete_update);
		assert_eq!(b.snapshot(), "");
		b.apply_remote(&insert_update);
		assert_eq!(b.snapshot(), "");
	}

	#[test]
	fn delete_then_insert_converges_regardless_of_arrival_order() {
		let mut a = Register::new(1);
		let insert_update = a.append("z");
		let delete_update = UpdateBlob {
			ops: vec![crate::op::Op::Delete {
				id: a.last_live_id().unwrap(),
			}],
		};

		let mut in_order = Register::new(2);
		in_order.apply_remote(&insert_update);
		in_order.apply_remote(&delete_update);

		let mut out_of_order = Register::new(3);
		out_of_order.apply_remote(&delete_update);
		out_of_order.apply_remote(&insert_update);

		assert_eq!(in_order.snapshot(), out_of_order.snapshot());
		assert_eq!(in_order.snapshot(), "");
	}

	#[test]
	fn applying_remote_guard_is_false_outside_apply() {
		let mut reg = Register::new(1);
		reg.append("a");
		assert!(!reg.is_applying_remote());
	}

	proptest::proptest! {
		#[test]
		fn two_sites_converge_after_exchanging_updates(a_text in "[a-z]{0,6}", b_text in "[a-z]{0,6}") {
			let mut a = Register::new(1);
			let mut b = Register::new(2);

			let update_a = a.append(&a_text);
			let update_b = b.append(&b_text);

			a.apply_remote(&update_b);
			b.apply_remote(&update_a);

			proptest::prop_assert_eq!(a.snapshot(), b.snapshot());
		}
	}
}
