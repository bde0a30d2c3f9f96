use std::cell::{Cell, RefCell};
use std::cmp::{Ordering};
use super::engine::{varn, Sym};
use super::error::{VResult};
use super::gc::{Allocate, Header, Root, Slot, Visitor};
use super::val::{Val};

//-------------------------------------------------------------------------------------------------
// Map
//-------------------------------------------------------------------------------------------------

/**
The result of a [`Map::find`](struct.Map.html#method.find): either the index of the entry
with the given key, or the index at which that key would be inserted.
*/

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum MapFind {
	Found(usize),
	InsertAt(usize)
}

/**
An immutable map with keys sorted under the value order.

Maps never change after construction: [`put`](#method.put) and [`del`](#method.del) build
new maps. Any two keys in the same map are ordered with respect to one another; an attempt
to combine unordered keys is an error.
*/

pub struct Map {
	header: Header,
	entries: RefCell<Vec<(Slot, Slot)>>,

	//index of the most recent find() hit. purely an optimization: the map is immutable,
	//so a stale hint can only miss, never mislead.
	find_hint: Cell<usize>
}

impl Map {
	/**
	Builds a map from key/value pairs.

	The pairs needn't be sorted; when several pairs share a key, the last one wins.
	*/
	pub fn from_pairs(pairs: &[(Val, Val)]) -> VResult<Root<Map>> {
		match pairs.len() {
			0 => Ok(varn::empty_map()),
			1 => {
				let (ref k, ref v) = pairs[0];
				Ok(Map::alloc(vec![(Slot::from_val(k), Slot::from_val(v))]))
			}
			2 => {
				let (ref k0, ref v0) = pairs[0];
				let (ref k1, ref v1) = pairs[1];

				let pair0 = (Slot::from_val(k0), Slot::from_val(v0));
				let pair1 = (Slot::from_val(k1), Slot::from_val(v1));

				match k0.zorder(k1)? {
					Ordering::Less => Ok(Map::alloc(vec![pair0, pair1])),
					Ordering::Greater => Ok(Map::alloc(vec![pair1, pair0])),
					Ordering::Equal => Ok(Map::alloc(vec![pair1]))
				}
			}
			_ => {
				let mut entries: Vec<(Val, Val)> = pairs.to_vec();
				merge_sort(&mut entries)?;
				dedup_keep_last(&mut entries);

				let entries = entries
					.iter()
					.map(|(k, v)| (Slot::from_val(k), Slot::from_val(v)))
					.collect();
				Ok(Map::alloc(entries))
			}
		}
	}

	pub(crate) fn alloc_empty() -> Root<Map> {
		Map::alloc(Vec::new())
	}

	fn alloc(entries: Vec<(Slot, Slot)>) -> Root<Map> {
		varn::alloc(Map {
			header: Header::new(),
			entries: RefCell::new(entries),
			find_hint: Cell::new(0)
		})
	}

	/**
	Locates a key by binary search.

	Fails if the key is unordered with respect to an entry it's compared against.
	*/
	pub fn find(&self, key: &Val) -> VResult<MapFind> {
		let entries = self.entries.borrow();

		let hint = self.find_hint.get();
		if let Some(entry) = entries.get(hint) {
			if entry.0.root().order(key) == Some(Ordering::Equal) {
				return Ok(MapFind::Found(hint))
			}
		}

		let mut lo = 0;
		let mut hi = entries.len();
		while lo < hi {
			let mid = lo + (hi - lo) / 2;
			match entries[mid].0.root().zorder(key)? {
				Ordering::Less => lo = mid + 1,
				Ordering::Greater => hi = mid,
				Ordering::Equal => {
					self.find_hint.set(mid);
					return Ok(MapFind::Found(mid))
				}
			}
		}

		Ok(MapFind::InsertAt(lo))
	}

	pub fn get(&self, key: &Val) -> VResult<Option<Val>> {
		match self.find(key)? {
			MapFind::Found(i) => Ok(Some(self.entries.borrow()[i].1.root())),
			MapFind::InsertAt(_) => Ok(None)
		}
	}

	/** Builds a new map with `key` bound to `value`, splicing at the found position. */
	pub fn put(map: &Root<Map>, key: &Val, value: &Val) -> VResult<Root<Map>> {
		let position = map.find(key)?;

		let entries = map.entries.borrow();
		let mut new_entries = Vec::with_capacity(entries.len() + 1);

		match position {
			MapFind::Found(i) => {
				new_entries.extend_from_slice(&entries[..i]);
				new_entries.push((Slot::from_val(key), Slot::from_val(value)));
				new_entries.extend_from_slice(&entries[i + 1..]);
			}
			MapFind::InsertAt(i) => {
				new_entries.extend_from_slice(&entries[..i]);
				new_entries.push((Slot::from_val(key), Slot::from_val(value)));
				new_entries.extend_from_slice(&entries[i..]);
			}
		}

		drop(entries);
		Ok(Map::alloc(new_entries))
	}

	/**
	Builds a new map without `key`.

	Deleting an absent key returns the receiver unchanged; deleting the only entry
	returns the canonical empty map.
	*/
	pub fn del(map: &Root<Map>, key: &Val) -> VResult<Root<Map>> {
		match map.find(key)? {
			MapFind::InsertAt(_) => Ok(map.clone()),
			MapFind::Found(i) => {
				let entries = map.entries.borrow();
				if entries.len() == 1 {
					return Ok(varn::empty_map())
				}

				let mut new_entries = Vec::with_capacity(entries.len() - 1);
				new_entries.extend_from_slice(&entries[..i]);
				new_entries.extend_from_slice(&entries[i + 1..]);

				drop(entries);
				Ok(Map::alloc(new_entries))
			}
		}
	}

	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}

	pub fn keys(&self) -> Vec<Val> {
		self.entries.borrow().iter().map(|entry| entry.0.root()).collect()
	}

	pub fn values(&self) -> Vec<Val> {
		self.entries.borrow().iter().map(|entry| entry.1.root()).collect()
	}

	pub fn to_pairs(&self) -> Vec<(Val, Val)> {
		self.entries
			.borrow()
			.iter()
			.map(|entry| (entry.0.root(), entry.1.root()))
			.collect()
	}

	/*
	map ordering: the key sequences dominate, compared pairwise up to the shorter length;
	ties break by size, then by the value sequences. a hole anywhere in the pairwise
	comparisons makes the maps unordered.
	*/

	pub fn order(&self, other: &Map) -> Option<Ordering> {
		let a = self.entries.borrow();
		let b = other.entries.borrow();

		for (x, y) in a.iter().zip(b.iter()) {
			match x.0.root().order(&y.0.root())? {
				Ordering::Equal => (),
				ordering => return Some(ordering)
			}
		}

		match a.len().cmp(&b.len()) {
			Ordering::Equal => (),
			ordering => return Some(ordering)
		}

		for (x, y) in a.iter().zip(b.iter()) {
			match x.1.root().order(&y.1.root())? {
				Ordering::Equal => (),
				ordering => return Some(ordering)
			}
		}

		Some(Ordering::Equal)
	}
}

impl PartialEq for Map {
	fn eq(&self, other: &Map) -> bool {
		let a = self.entries.borrow();
		let b = other.entries.borrow();

		a.len() == b.len()
			&& a.iter().zip(b.iter()).all(|(x, y)| {
				x.0.root() == y.0.root() && x.1.root() == y.1.root()
			})
	}
}

impl Allocate for Map {
	fn visit_raws<V: Visitor>(&self, visitor: &mut V) {
		for (key, value) in self.entries.borrow().iter() {
			visitor.visit_slot(key);
			visitor.visit_slot(value);
		}
	}

	fn clear_raws(&self) {
		self.entries.borrow_mut().clear();
	}

	fn header(&self) -> &Header {
		&self.header
	}
}

/*
a stable top-down merge sort under zorder. stability is what makes keep-last dedup correct
for duplicate keys, and the fast path makes already-sorted input (the common case for maps
rebuilt from to_pairs) linear.
*/

fn merge_sort(entries: &mut Vec<(Val, Val)>) -> VResult<()> {
	let len = entries.len();
	let mut scratch = Vec::with_capacity(len / 2 + 1);
	sort_span(entries, 0, len, &mut scratch)
}

fn sort_span(
	entries: &mut [(Val, Val)],
	start: usize,
	end: usize,
	scratch: &mut Vec<(Val, Val)>
) -> VResult<()> {
	if end - start <= 1 {
		return Ok(())
	}

	let mid = start + (end - start) / 2;
	sort_span(entries, start, mid, scratch)?;
	sort_span(entries, mid, end, scratch)?;

	if entries[mid - 1].0.zorder(&entries[mid].0)? != Ordering::Greater {
		return Ok(())
	}

	scratch.clear();
	scratch.extend_from_slice(&entries[start..mid]);

	let mut left = 0;
	let mut right = mid;
	let mut out = start;

	while left < scratch.len() && right < end {
		//take from the right run only on strict Less, so equal keys keep their
		//original relative order
		if entries[right].0.zorder(&scratch[left].0)? == Ordering::Less {
			entries[out] = entries[right].clone();
			right += 1;
		} else {
			entries[out] = scratch[left].clone();
			left += 1;
		}
		out += 1;
	}

	while left < scratch.len() {
		entries[out] = scratch[left].clone();
		left += 1;
		out += 1;
	}

	Ok(())
}

fn dedup_keep_last(entries: &mut Vec<(Val, Val)>) {
	let mut result: Vec<(Val, Val)> = Vec::with_capacity(entries.len());

	for entry in entries.drain(..) {
		let replace = match result.last() {
			Some(last) => last.0.order(&entry.0) == Some(Ordering::Equal),
			None => false
		};

		if replace {
			let last_i = result.len() - 1;
			result[last_i] = entry;
		} else {
			result.push(entry);
		}
	}

	*entries = result;
}

//-------------------------------------------------------------------------------------------------
// Tab
//-------------------------------------------------------------------------------------------------

/**
An immutable symbol table: a dense vector indexed by the key symbol's registry index.
*/

pub struct Tab {
	header: Header,
	slots: RefCell<Vec<Option<Slot>>>,

	//population count, cached so that len() doesn't scan the slot vector
	size: Cell<usize>
}

impl Tab {
	/** Builds a symbol table from key/value pairs. Duplicate keys keep the last value. */
	pub fn from_pairs(pairs: &[(Sym, Val)]) -> Root<Tab> {
		if pairs.is_empty() {
			return varn::empty_tab()
		}

		let mut max_index = 0;
		for (sym, _) in pairs {
			max_index = usize::max(max_index, sym.index());
		}

		let mut slots: Vec<Option<Slot>> = vec![None; max_index + 1];
		let mut size = 0;

		for (sym, val) in pairs {
			let slot = &mut slots[sym.index()];
			if slot.is_none() {
				size += 1;
			}

			*slot = Some(Slot::from_val(val));
		}

		varn::alloc(Tab {
			header: Header::new(),
			slots: RefCell::new(slots),
			size: Cell::new(size)
		})
	}

	pub(crate) fn alloc_empty() -> Root<Tab> {
		varn::alloc(Tab {
			header: Header::new(),
			slots: RefCell::new(Vec::new()),
			size: Cell::new(0)
		})
	}

	pub fn get(&self, key: Sym) -> Option<Val> {
		match self.slots.borrow().get(key.index()) {
			Some(Some(ref slot)) => Some(slot.root()),
			_ => None
		}
	}

	pub fn len(&self) -> usize {
		self.size.get()
	}

	pub fn is_empty(&self) -> bool {
		self.size.get() == 0
	}

	pub fn to_pairs(&self) -> Vec<(Sym, Val)> {
		self.slots
			.borrow()
			.iter()
			.enumerate()
			.filter_map(|(i, slot)| {
				slot.as_ref().map(|slot| (Sym::from_index(i), slot.root()))
			})
			.collect()
	}

	/** Builds a new table with `key` bound to `val`. */
	pub fn with(tab: &Root<Tab>, key: Sym, val: &Val) -> Root<Tab> {
		let mut slots = tab.slots.borrow().clone();

		let index = key.index();
		if slots.len() <= index {
			slots.resize(index + 1, None);
		}

		let mut size = tab.size.get();
		if slots[index].is_none() {
			size += 1;
		}
		slots[index] = Some(Slot::from_val(val));

		varn::alloc(Tab {
			header: Header::new(),
			slots: RefCell::new(slots),
			size: Cell::new(size)
		})
	}
}

//structural equality over the sparse slot vectors; trailing empty slots are insignificant
impl PartialEq for Tab {
	fn eq(&self, other: &Tab) -> bool {
		if self.size.get() != other.size.get() {
			return false
		}

		let a = self.slots.borrow();
		let b = other.slots.borrow();

		for i in 0..usize::max(a.len(), b.len()) {
			let x = a.get(i).and_then(|slot| slot.as_ref());
			let y = b.get(i).and_then(|slot| slot.as_ref());

			match (x, y) {
				(None, None) => (),
				(Some(x), Some(y)) => {
					if x.root() != y.root() {
						return false
					}
				}
				_ => return false
			}
		}

		true
	}
}

impl Allocate for Tab {
	fn visit_raws<V: Visitor>(&self, visitor: &mut V) {
		for slot in self.slots.borrow().iter() {
			if let Some(ref slot) = *slot {
				visitor.visit_slot(slot);
			}
		}
	}

	fn clear_raws(&self) {
		self.slots.borrow_mut().clear();
	}

	fn header(&self) -> &Header {
		&self.header
	}
}

//-------------------------------------------------------------------------------------------------
// tests
//-------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use crate::engine::{varn, Runtime};
	use super::*;

	#[test]
	fn construction_keeps_the_last_duplicate() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let map = varn::map_from_pairs(&[
				(Val::Int(1), Val::Int(10)),
				(Val::Int(2), Val::Int(20)),
				(Val::Int(1), Val::Int(11)),
				(Val::Int(3), Val::Int(30)),
				(Val::Int(2), Val::Int(21))
			])?;

			assert_eq!(map.len(), 3);
			assert_eq!(map.get(&Val::Int(1))?, Some(Val::Int(11)));
			assert_eq!(map.get(&Val::Int(2))?, Some(Val::Int(21)));
			assert_eq!(map.get(&Val::Int(3))?, Some(Val::Int(30)));

			//the two-pair special case applies the same rule
			let tiny = varn::map_from_pairs(&[
				(Val::Int(7), Val::Int(70)),
				(Val::Int(7), Val::Int(71))
			])?;
			assert_eq!(tiny.len(), 1);
			assert_eq!(tiny.get(&Val::Int(7))?, Some(Val::Int(71)));

			Ok(())
		}).unwrap();
	}

	#[test]
	fn keys_come_out_sorted() {
		let runtime = Runtime::new();
		runtime.run(|| {
			//101 distinct keys in a scrambled order
			let pairs: Vec<(Val, Val)> = (0..101i64)
				.map(|i| (Val::Int((i * 17) % 101), Val::Int(i)))
				.collect();

			let map = varn::map_from_pairs(&pairs)?;
			assert_eq!(map.len(), 101);

			let keys = map.keys();
			for window in keys.windows(2) {
				assert_eq!(window[0].zorder(&window[1])?, std::cmp::Ordering::Less);
			}

			Ok(())
		}).unwrap();
	}

	#[test]
	fn put_and_del_build_new_maps() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let original = varn::map_from_pairs(&[
				(Val::Int(1), Val::Int(10)),
				(Val::Int(3), Val::Int(30))
			])?;

			let grown = Map::put(&original, &Val::Int(2), &Val::Int(20))?;
			assert_eq!(original.len(), 2);
			assert_eq!(grown.len(), 3);
			assert_eq!(grown.get(&Val::Int(2))?, Some(Val::Int(20)));

			let replaced = Map::put(&grown, &Val::Int(2), &Val::Int(21))?;
			assert_eq!(replaced.len(), 3);
			assert_eq!(replaced.get(&Val::Int(2))?, Some(Val::Int(21)));

			let shrunk = Map::del(&grown, &Val::Int(2))?;
			assert!(*shrunk == *original);

			//deleting an absent key returns the same map
			let unchanged = Map::del(&grown, &Val::Int(99))?;
			assert!(Root::ptr_eq(&unchanged, &grown));

			Ok(())
		}).unwrap();
	}

	#[test]
	fn deleting_the_last_entry_returns_the_empty_singleton() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let map = varn::map_from_pairs(&[(Val::Int(1), Val::Int(10))])?;
			let emptied = Map::del(&map, &Val::Int(1))?;

			assert!(Root::ptr_eq(&emptied, &varn::empty_map()));
			assert!(Root::ptr_eq(&varn::map_from_pairs(&[])?, &varn::empty_map()));

			Ok(())
		}).unwrap();
	}

	#[test]
	fn find_reports_the_insertion_point() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let map = varn::map_from_pairs(&[
				(Val::Int(10), Val::Nil),
				(Val::Int(20), Val::Nil),
				(Val::Int(30), Val::Nil)
			])?;

			assert_eq!(map.find(&Val::Int(20))?, MapFind::Found(1));
			assert_eq!(map.find(&Val::Int(5))?, MapFind::InsertAt(0));
			assert_eq!(map.find(&Val::Int(25))?, MapFind::InsertAt(2));
			assert_eq!(map.find(&Val::Int(35))?, MapFind::InsertAt(3));

			//a repeated hit goes through the hint
			assert_eq!(map.find(&Val::Int(20))?, MapFind::Found(1));

			Ok(())
		}).unwrap();
	}

	#[test]
	fn unordered_keys_are_rejected() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let a = Val::Sym(varn::anon_sym("twin")?);
			let b = Val::Sym(varn::anon_sym("twin")?);

			assert!(varn::map_from_pairs(&[
				(a.clone(), Val::Int(1)),
				(b.clone(), Val::Int(2))
			]).is_err());

			let map = varn::map_from_pairs(&[(a, Val::Int(1))])?;
			assert!(map.find(&b).is_err());

			Ok(())
		}).unwrap();
	}

	#[test]
	fn map_ordering_compares_keys_then_size_then_values() {
		let runtime = Runtime::new();
		runtime.run(|| {
			use std::cmp::Ordering;

			let a = varn::map_from_pairs(&[(Val::Int(1), Val::Int(5))])?;
			let b = varn::map_from_pairs(&[(Val::Int(2), Val::Int(5))])?;
			assert_eq!((*a).order(&b), Some(Ordering::Less));

			//a is a prefix of c under the key order: size breaks the tie
			let c = varn::map_from_pairs(&[
				(Val::Int(1), Val::Int(5)),
				(Val::Int(2), Val::Int(5))
			])?;
			assert_eq!((*a).order(&c), Some(Ordering::Less));

			let d = varn::map_from_pairs(&[(Val::Int(1), Val::Int(6))])?;
			assert_eq!((*a).order(&d), Some(Ordering::Less));
			assert_eq!((*a).order(&a), Some(Ordering::Equal));

			Ok(())
		}).unwrap();
	}

	#[test]
	fn tab_construction_and_lookup() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let x = varn::sym("x")?;
			let y = varn::sym("y")?;
			let z = varn::sym("z")?;

			let tab = varn::tab_from_pairs(&[
				(x, Val::Int(1)),
				(y, Val::Int(2)),
				(x, Val::Int(3))
			]);

			assert_eq!(tab.len(), 2);
			assert_eq!(tab.get(x), Some(Val::Int(3)));
			assert_eq!(tab.get(y), Some(Val::Int(2)));
			assert_eq!(tab.get(z), None);

			let wider = Tab::with(&tab, z, &Val::Int(4));
			assert_eq!(tab.len(), 2);
			assert_eq!(wider.len(), 3);
			assert_eq!(wider.get(z), Some(Val::Int(4)));

			assert!(Root::ptr_eq(&varn::tab_from_pairs(&[]), &varn::empty_tab()));

			Ok(())
		}).unwrap();
	}

	#[test]
	fn tab_equality_is_structural() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let x = varn::sym("x")?;
			let y = varn::sym("y")?;

			let a = varn::tab_from_pairs(&[(x, Val::Int(1)), (y, Val::Int(2))]);
			let b = varn::tab_from_pairs(&[(y, Val::Int(2)), (x, Val::Int(1))]);
			let c = varn::tab_from_pairs(&[(x, Val::Int(1)), (y, Val::Int(3))]);
			let d = varn::tab_from_pairs(&[(x, Val::Int(1))]);

			assert!(*a == *b);
			assert!(*a != *c);
			assert!(*a != *d);

			//equal tabs hold their contents equal, pairwise
			assert_eq!(a.to_pairs().len(), 2);

			Ok(())
		}).unwrap();
	}
}
