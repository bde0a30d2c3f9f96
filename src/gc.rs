use std::cell::{Cell, RefCell};
use std::cmp::{Ordering};
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::ops::{Deref};
use std::process::{abort};
use super::class::{Class, Obj, RFn};
use super::collections::{Map, Tab};
use super::engine::{active_engine_id, with_heap, Guard, Sym};
use super::val::{Val};

//the collector is a stop-the-world mark-and-sweep over a vec of erased allocations. a cycle
//takes the whole vec as the doomed set, re-accumulates the marked survivors, and frees the
//rest. roots are the immortals array, the quarantine ring of recent allocations, and every
//strong Root guard.

/** Number of allocations between automatically-triggered collection cycles. */
pub const ALLOCATIONS_PER_GC: usize = 200_000;

/** Number of slots in the quarantine ring which shields recent allocations. */
pub const QUARANTINE_LEN: usize = 5_000;

/**
Maximum number of values immortalized through [`varn::immortalize`](varn/fn.immortalize.html).
Exceeding it is a fatal error. Classes are immortal on creation and don't count against it.
*/
pub const MAX_IMMORTALS: usize = 100;

//-------------------------------------------------------------------------------------------------
// Raw
//-------------------------------------------------------------------------------------------------

// safe Raw<T> implementation
//----------------------------------------------------------------------------

#[cfg(not(feature = "unsafe-internals"))]
use std::rc::Rc;

#[doc(hidden)]
#[cfg(not(feature = "unsafe-internals"))]
pub struct Raw<T: Allocate> {
	rc: Rc<T>
}

#[cfg(not(feature = "unsafe-internals"))]
impl<T: Allocate> Raw<T> {
	#[inline]
	fn new(t: T) -> Raw<T> {
		Raw { rc: Rc::new(t) }
	}

	#[inline]
	pub(crate) fn ptr_eq(raw0: &Raw<T>, raw1: &Raw<T>) -> bool {
		Rc::ptr_eq(&raw0.rc, &raw1.rc)
	}

	#[inline]
	fn as_usize(&self) -> usize {
		&(*self.rc) as *const T as usize
	}

	//without "unsafe-internals", the allocation is actually released when its last Rc
	//drops; clearing the interior Raws here breaks any reference cycles so that the
	//drop cascade can complete.
	#[inline]
	fn free(&self) {
		self.clear_raws()
	}
}

#[cfg(not(feature = "unsafe-internals"))]
impl<T: Allocate> Clone for Raw<T> {
	#[inline]
	fn clone(&self) -> Raw<T> {
		Raw { rc: Rc::clone(&self.rc) }
	}
}

#[cfg(not(feature = "unsafe-internals"))]
impl<T: Allocate> Deref for Raw<T> {
	type Target = T;

	#[inline]
	fn deref(&self) -> &T {
		&*self.rc
	}
}

// unsafe Raw<T> implementation
//----------------------------------------------------------------------------

#[cfg(feature = "unsafe-internals")]
use std::ptr::NonNull;

#[doc(hidden)]
#[cfg(feature = "unsafe-internals")]
pub struct Raw<T: Allocate> {
	ptr: NonNull<T>
}

#[cfg(feature = "unsafe-internals")]
impl<T: Allocate> Raw<T> {
	#[inline]
	fn new(t: T) -> Raw<T> {
		Raw {
			ptr: NonNull::new(Box::into_raw(Box::new(t))).unwrap()
		}
	}

	#[inline]
	pub(crate) fn ptr_eq(raw0: &Raw<T>, raw1: &Raw<T>) -> bool {
		raw0.ptr == raw1.ptr
	}

	#[inline]
	fn as_usize(&self) -> usize {
		self.ptr.as_ptr() as usize
	}

	#[inline]
	fn free(&self) {
		unsafe { drop(Box::from_raw(self.ptr.as_ptr())) }
	}
}

#[cfg(feature = "unsafe-internals")]
impl<T: Allocate> Clone for Raw<T> {
	#[inline]
	fn clone(&self) -> Raw<T> {
		Raw { ptr: self.ptr }
	}
}

#[cfg(feature = "unsafe-internals")]
impl<T: Allocate> Deref for Raw<T> {
	type Target = T;

	#[inline]
	fn deref(&self) -> &T {
		unsafe { &*self.ptr.as_ptr() }
	}
}

// common Raw<T> methods
//----------------------------------------------------------------------------

impl<T: Allocate> Raw<T> {
	#[inline]
	pub(crate) fn from_root(root: &Root<T>) -> Raw<T> {
		if active_engine_id() != Some(root.header().engine_id()) {
			eprintln!("attempted to move a Root to another Runtime - aborting process");
			abort()
		}

		root.raw.clone()
	}

	#[inline]
	pub(crate) fn root(&self) -> Root<T> {
		Root::new(self.clone())
	}

	#[inline]
	fn header(&self) -> &Header {
		(**self).header()
	}
}

impl<T: Allocate> PartialEq for Raw<T> {
	#[inline]
	fn eq(&self, other: &Raw<T>) -> bool {
		self.as_usize() == other.as_usize()
	}
}

impl<T: Allocate> Eq for Raw<T> {}

impl<T: Allocate> Hash for Raw<T> {
	#[inline]
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.as_usize().hash(state)
	}
}

//-------------------------------------------------------------------------------------------------
// ErasedRaw
//-------------------------------------------------------------------------------------------------

macro_rules! erased_types {
	($($type_name:ident),+) => (

		#[doc(hidden)]
		pub trait Erase {
			fn erase_raw(raw: Raw<Self>) -> ErasedRaw where Self: Allocate;
			fn unerase_raw(erased_raw: &ErasedRaw) -> Raw<Self> where Self: Allocate;
		}

		$(impl Erase for $type_name {
			#[inline(always)]
			fn erase_raw(raw: Raw<$type_name>) -> ErasedRaw {
				ErasedRaw::$type_name(raw)
			}

			#[inline(always)]
			fn unerase_raw(erased_raw: &ErasedRaw) -> Raw<Self> {
				match erased_raw {
					ErasedRaw::$type_name(raw) => raw.clone(),
					_ => panic!()
				}
			}
		})+

		#[doc(hidden)]
		#[derive(Clone)]
		pub enum ErasedRaw {
			$($type_name(Raw<$type_name>)),+
		}

		impl ErasedRaw {
			fn header(&self) -> &Header {
				match *self {
					$(ErasedRaw::$type_name(ref raw) => raw.header()),+
				}
			}
		}

		impl Debug for ErasedRaw {
			fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
				match *self {
					$(
						ErasedRaw::$type_name(ref raw) => {
							write!(f, "ErasedRaw::{}(0x{:x})", stringify!($type_name),
							       (&**raw) as *const $type_name as usize)
						}
					)+
				}
			}
		}

		macro_rules! with_erased_raw {
			($erased:expr, $raw_ident:ident, $body:expr) => (
				match $erased {
					$(ErasedRaw::$type_name(ref $raw_ident) => $body),+
				}
			);
		}
	);
}

erased_types!(Class, Obj, RFn, Map, Tab);

//-------------------------------------------------------------------------------------------------
// Root, RootStorage
//-------------------------------------------------------------------------------------------------

/**
A pointer onto the garbage-collected heap.

Holding a `Root` keeps its target (and everything reachable from it) alive across
collection cycles. Dropping the `Root` releases that guarantee: rooting is scoped to
ordinary Rust ownership, with no explicit frame bookkeeping.
*/

pub struct Root<T: Allocate> {
	pub(crate) raw: Raw<T>
}

#[derive(Debug)]
struct RootEntry {
	raw: Option<ErasedRaw>,
	strong_count: u32,

	//null next/previous indexes are represented by 0
	next_entry: u32,
	prev_entry: u32
}

const NULL_ENTRY: u32 = 0;

/*
RootStorage maintains two collections in a single vec:
	- a singly-linked list of vacant entries (strong_count = 0, raw = None)
	- a doubly-linked list of strong entries (strong_count > 0, raw = Some(_))

for vacant entries, next_entry contains junk data. entry 0 is a placeholder, and its
next_entry and prev_entry are always junk data - this eliminates a lot of branches.

the storage vector grows in power-of-two increments, filling in any empty space with new
vacant entries. the linked list keeps root indexes stable, because each allocation's header
stores its root index.
*/

pub(crate) struct RootStorage {
	entries: Vec<RootEntry>,

	first_vacant: u32,
	first_strong: u32
}

impl RootStorage {
	fn new() -> RootStorage {
		let mut entries = Vec::with_capacity(128);
		while entries.len() < entries.capacity() {
			let next_entry = (entries.len() + 1) as u32;
			entries.push(RootEntry {
				raw: None,
				strong_count: 0,

				next_entry,
				prev_entry: 0xffff_ffff //deliberate junk data
			});
		}

		RootStorage {
			entries,

			first_vacant: 1,
			first_strong: NULL_ENTRY
		}
	}

	//double the length of `entries` by appending `entries.len()` new vacant entries
	#[inline(never)]
	fn grow(&mut self) {
		//checking against MAX_ROOT_INDEX here means that we don't need to check it
		//on every call to alloc()
		let new_len = usize::min(MAX_ROOT_INDEX as usize + 1, self.entries.len() * 2);
		assert!(
			new_len > self.entries.len(),
			"no more than {} objects may be simultaneously rooted",
			MAX_ROOT_INDEX as usize + 1
		);

		let to_reserve = new_len - self.entries.len();
		self.entries.reserve_exact(to_reserve);

		while self.entries.len() < self.entries.capacity() {
			let next_entry = (self.entries.len() + 1) as u32;
			self.entries.push(RootEntry {
				raw: None,
				strong_count: 0,

				next_entry,
				prev_entry: 0xffff_ffff //deliberate junk data
			});
		}
	}

	//change the first vacant entry into a strong entry with a strong_count of 1 and the
	//specified `raw`, then return its index
	#[inline(always)]
	fn alloc(&mut self, raw: ErasedRaw) -> u32 {
		debug_assert!(self.first_vacant != NULL_ENTRY);

		if self.first_vacant as usize >= self.entries.len() {
			self.grow();
			self.alloc(raw)
		} else {
			let entry_index = self.first_vacant;

			let first_strong = self.first_strong;
			self.entries[first_strong as usize].prev_entry = entry_index;
			self.first_strong = entry_index;

			let entry = &mut self.entries[entry_index as usize];
			self.first_vacant = entry.next_entry;

			debug_assert!(entry.raw.is_none());
			debug_assert!(entry.strong_count == 0);

			entry.raw = Some(raw);
			entry.prev_entry = NULL_ENTRY;
			entry.next_entry = first_strong;

			entry.strong_count = 1;

			entry_index
		}
	}

	//decrement the strong_count of the specified strong entry. this may change it into
	//a vacant entry. returns `entry_index` if the strong count is still greater than 0,
	//or 0 otherwise.
	#[inline(always)]
	fn decrement_strong_count(&mut self, entry_index: u32) -> u32 {
		debug_assert!(entry_index != NULL_ENTRY);

		let entry = &mut self.entries[entry_index as usize];

		debug_assert!(entry.raw.is_some());
		debug_assert!(entry.strong_count >= 1);

		entry.strong_count -= 1;
		if entry.strong_count == 0 {
			//remove this entry from the strong list and add it to the vacant list
			let prev_entry = entry.prev_entry;
			let next_entry = entry.next_entry;

			entry.raw = None;
			entry.next_entry = self.first_vacant;
			self.first_vacant = entry_index;

			self.entries[prev_entry as usize].next_entry = next_entry;
			self.entries[next_entry as usize].prev_entry = prev_entry;

			//this branch could be fairly unpredictable, but it should get optimized to a cmov
			if prev_entry == NULL_ENTRY {
				self.first_strong = next_entry;
			}

			NULL_ENTRY
		} else {
			entry_index
		}
	}
}

impl<T: Allocate> Root<T> {
	#[inline]
	fn new(raw: Raw<T>) -> Root<T> {
		if active_engine_id() != Some(raw.header().engine_id()) {
			eprintln!("attempted to create a Root for an inactive Runtime - aborting process");
			abort()
		}

		with_heap(|heap| {
			let header = raw.header();
			let mut root_storage = heap.root_storage.borrow_mut();

			let root_index = header.root_index();
			if root_index == 0 {
				header.set_root_index(root_storage.alloc(T::erase_raw(raw.clone())));
			} else {
				root_storage.entries[root_index as usize].strong_count += 1;
			}
		});

		Root { raw }
	}

	#[inline]
	pub(crate) fn to_raw(&self) -> Raw<T> {
		Raw::from_root(self)
	}

	/**
	Returns `true` if both `Root`s point to the same heap-allocated object.
	*/
	#[inline]
	pub fn ptr_eq(root0: &Root<T>, root1: &Root<T>) -> bool {
		Raw::ptr_eq(&root0.raw, &root1.raw)
	}
}

impl<T: Allocate> Clone for Root<T> {
	#[inline]
	fn clone(&self) -> Root<T> {
		if active_engine_id() != Some(self.raw.header().engine_id()) {
			eprintln!("attempted to clone a Root for an inactive Runtime - aborting process");
			abort()
		}

		with_heap(|heap| {
			let root_index = self.raw.header().root_index();
			heap.root_storage.borrow_mut().entries[root_index as usize].strong_count += 1;
		});

		Root { raw: self.raw.clone() }
	}
}

impl<T: Allocate> Drop for Root<T> {
	#[inline]
	fn drop(&mut self) {
		if active_engine_id() != Some(self.raw.header().engine_id()) {
			eprintln!("attempted to drop a Root for an inactive Runtime - aborting process");
			abort()
		}

		with_heap(|heap| {
			let header = self.raw.header();
			let mut root_storage = heap.root_storage.borrow_mut();
			header.set_root_index(root_storage.decrement_strong_count(header.root_index()));
		});
	}
}

impl<T: Allocate> Deref for Root<T> {
	type Target = T;

	#[inline]
	fn deref(&self) -> &T {
		&self.raw
	}
}

impl<T: Allocate + PartialEq<T>> PartialEq<Root<T>> for Root<T> {
	#[inline]
	fn eq(&self, other: &Root<T>) -> bool {
		(**self).eq(&**other)
	}
}

impl<T: Allocate + PartialOrd<T>> PartialOrd<Root<T>> for Root<T> {
	#[inline]
	fn partial_cmp(&self, other: &Root<T>) -> Option<Ordering> {
		(**self).partial_cmp(&**other)
	}
}

//-------------------------------------------------------------------------------------------------
// Slot
//-------------------------------------------------------------------------------------------------

//the unrooted mirror of Val, used for storage inside heap-allocated objects. Slots are
//traced by the collector via Allocate::visit_raws, so they don't need root entries.
#[doc(hidden)]
#[derive(Clone)]
pub enum Slot {
	Nil,
	Bool(bool),
	Int(i64),
	Sym(Sym),
	Tab(Raw<Tab>),
	Map(Raw<Map>),
	Obj(Raw<Obj>),
	Class(Raw<Class>),
	RFn(Raw<RFn>)
}

impl Slot {
	#[inline]
	pub(crate) fn from_val(val: &Val) -> Slot {
		match *val {
			Val::Nil => Slot::Nil,
			Val::Bool(b) => Slot::Bool(b),
			Val::Int(i) => Slot::Int(i),
			Val::Sym(s) => Slot::Sym(s),
			Val::Tab(ref t) => Slot::Tab(Raw::from_root(t)),
			Val::Map(ref m) => Slot::Map(Raw::from_root(m)),
			Val::Obj(ref o) => Slot::Obj(Raw::from_root(o)),
			Val::Class(ref c) => Slot::Class(Raw::from_root(c)),
			Val::RFn(ref r) => Slot::RFn(Raw::from_root(r))
		}
	}

	#[inline]
	pub(crate) fn root(&self) -> Val {
		match *self {
			Slot::Nil => Val::Nil,
			Slot::Bool(b) => Val::Bool(b),
			Slot::Int(i) => Val::Int(i),
			Slot::Sym(s) => Val::Sym(s),
			Slot::Tab(ref t) => Val::Tab(t.root()),
			Slot::Map(ref m) => Val::Map(m.root()),
			Slot::Obj(ref o) => Val::Obj(o.root()),
			Slot::Class(ref c) => Val::Class(c.root()),
			Slot::RFn(ref r) => Val::RFn(r.root())
		}
	}
}

//-------------------------------------------------------------------------------------------------
// Header
//-------------------------------------------------------------------------------------------------

/*
the allocation header packs the engine id, a "frozen" flag and the root index into one
32-bit word, with the mark bit alongside. the root count lives in the root entry rather
than inline, to avoid wasting space in the header of unrooted objects.

the frozen flag isn't read by the collector at all; it's stored here so that the types
which need a frozen bit don't each carry a separate Cell<bool>.
*/

const ENGINE_ID_SHIFT: u32 = 24;
const ENGINE_ID_MASK: u32 = 0xff << 24;
const FROZEN_BIT: u32 = 0x1 << 23;
const ROOT_INDEX_MASK: u32 = !(ENGINE_ID_MASK | FROZEN_BIT);
const MAX_ROOT_INDEX: u32 = ROOT_INDEX_MASK - 1;

#[doc(hidden)]
pub struct Header {
	bits: Cell<u32>,
	marked: Cell<bool>
}

impl Header {
	pub(crate) fn new() -> Header {
		let engine_id = with_heap(|heap| heap.engine_id as u32);
		Header {
			bits: Cell::new(engine_id << ENGINE_ID_SHIFT),
			marked: Cell::new(false)
		}
	}

	fn engine_id(&self) -> u8 {
		(self.bits.get() >> ENGINE_ID_SHIFT) as u8
	}

	#[inline]
	pub(crate) fn frozen(&self) -> bool {
		(self.bits.get() & FROZEN_BIT) != 0
	}

	#[inline]
	pub(crate) fn freeze(&self) {
		self.bits.set(self.bits.get() | FROZEN_BIT);
	}

	fn rooted(&self) -> bool {
		self.bits.get() & ROOT_INDEX_MASK != 0
	}

	fn root_index(&self) -> u32 {
		self.bits.get() & ROOT_INDEX_MASK
	}

	fn set_root_index(&self, root_index: u32) {
		debug_assert!(root_index <= MAX_ROOT_INDEX);
		self.bits.set((self.bits.get() & !ROOT_INDEX_MASK) | root_index);
	}

	fn marked(&self) -> bool {
		self.marked.get()
	}

	fn mark(&self) {
		debug_assert!(!self.marked());
		self.marked.set(true)
	}

	fn unmark(&self) {
		self.marked.set(false)
	}
}

#[doc(hidden)]
pub trait Allocate: Sized + Erase {
	fn visit_raws<V: Visitor>(&self, visitor: &mut V);

	//type-specific teardown, invoked when the collector frees the allocation. clears any
	//interior Raws so that reference cycles can't keep memory alive.
	fn clear_raws(&self);

	//the Header is an intrusive field on the allocated type
	fn header(&self) -> &Header;
}

//-------------------------------------------------------------------------------------------------
// Visitor
//-------------------------------------------------------------------------------------------------

#[doc(hidden)]
pub trait Visitor {
	fn visit_raw<T: Allocate>(&mut self, raw: &Raw<T>) where Self: Sized;

	fn visit_slot(&mut self, slot: &Slot)
	where
		Self: Sized
	{
		match *slot {
			Slot::Nil | Slot::Bool(_) | Slot::Int(_) | Slot::Sym(_) => (),
			Slot::Tab(ref t) => self.visit_raw(t),
			Slot::Map(ref m) => self.visit_raw(m),
			Slot::Obj(ref o) => self.visit_raw(o),
			Slot::Class(ref c) => self.visit_raw(c),
			Slot::RFn(ref r) => self.visit_raw(r)
		}
	}
}

struct MarkingVisitor<'a> {
	marking_stack: &'a mut Vec<ErasedRaw>
}

impl<'a> Visitor for MarkingVisitor<'a> {
	//marking is idempotent via the mark bit, so the graph walk terminates on cycles
	//without a separate visited set
	#[inline]
	fn visit_raw<T: Allocate>(&mut self, raw: &Raw<T>)
	where
		Self: Sized
	{
		let header = raw.header();
		if !header.marked() {
			header.mark();
			self.marking_stack.push(T::erase_raw(raw.clone()));
		}
	}
}

//-------------------------------------------------------------------------------------------------
// Heap
//-------------------------------------------------------------------------------------------------

pub(crate) struct Heap {
	pub(crate) engine_id: u8,
	gc_in_progress: Cell<bool>,

	objects: RefCell<Vec<ErasedRaw>>,
	marking_stack: RefCell<Vec<ErasedRaw>>,

	immortals: RefCell<Vec<ErasedRaw>>,
	immortal_classes: RefCell<Vec<Raw<Class>>>,
	quarantine: RefCell<Vec<Option<ErasedRaw>>>,
	quarantine_next: Cell<usize>,

	allocs_since_gc: Cell<usize>,

	pub(crate) root_storage: RefCell<RootStorage>
}

impl Drop for Heap {
	fn drop(&mut self) {
		let root_storage = self.root_storage.borrow();
		for entry in &root_storage.entries {
			if entry.strong_count > 0 {
				eprintln!("a Root has outlived its originating Runtime - aborting process");
				abort()
			}
		}
	}
}

impl Heap {
	pub(crate) fn new(engine_id: u8) -> Heap {
		Heap {
			engine_id,
			gc_in_progress: Cell::new(false),

			objects: RefCell::new(Vec::new()),
			marking_stack: RefCell::new(Vec::new()),

			immortals: RefCell::new(Vec::new()),
			immortal_classes: RefCell::new(Vec::new()),
			quarantine: RefCell::new(vec![None; QUARANTINE_LEN]),
			quarantine_next: Cell::new(0),

			allocs_since_gc: Cell::new(0),

			root_storage: RefCell::new(RootStorage::new())
		}
	}

	#[inline]
	pub(crate) fn alloc<T: Allocate>(&self, init: T) -> Root<T> {
		assert!(
			!self.gc_in_progress.get(),
			"attempted to allocate during a collection cycle"
		);

		if self.allocs_since_gc.get() >= ALLOCATIONS_PER_GC {
			self.collect();
		}

		let raw = Raw::new(init);
		self.objects.borrow_mut().push(T::erase_raw(raw.clone()));

		//newly-allocated objects spend QUARANTINE_LEN allocations in the quarantine ring,
		//where they count as roots even if nothing else references them yet
		let i = self.quarantine_next.get();
		self.quarantine.borrow_mut()[i] = Some(T::erase_raw(raw.clone()));
		self.quarantine_next.set((i + 1) % QUARANTINE_LEN);

		self.allocs_since_gc.set(self.allocs_since_gc.get() + 1);

		Root::new(raw)
	}

	//permanently roots the target of `slot`. there is no release mechanism: immortals
	//survive every future collection cycle.
	pub(crate) fn immortalize_slot(&self, slot: Slot) {
		let erased = match slot {
			Slot::Nil | Slot::Bool(_) | Slot::Int(_) | Slot::Sym(_) => return,
			Slot::Tab(raw) => ErasedRaw::Tab(raw),
			Slot::Map(raw) => ErasedRaw::Map(raw),
			Slot::Obj(raw) => ErasedRaw::Obj(raw),
			Slot::Class(raw) => ErasedRaw::Class(raw),
			Slot::RFn(raw) => ErasedRaw::RFn(raw)
		};

		let mut immortals = self.immortals.borrow_mut();
		assert!(
			immortals.len() < MAX_IMMORTALS,
			"more than {} values have been immortalized",
			MAX_IMMORTALS
		);
		immortals.push(erased);
	}

	//classes are immortal from the moment of creation. they're tracked apart from the
	//capped immortals array, so the immortal cap doesn't bound the number of classes a
	//program can create.
	pub(crate) fn immortalize_class(&self, raw: Raw<Class>) {
		self.immortal_classes.borrow_mut().push(raw);
	}

	pub(crate) fn live_count(&self) -> usize {
		self.objects.borrow().len()
	}

	pub(crate) fn collect(&self) {
		assert!(
			!self.gc_in_progress.get(),
			"attempted to start a collection cycle during a collection cycle"
		);

		self.gc_in_progress.set(true);
		let _in_progress_guard = Guard::new(|| self.gc_in_progress.set(false));

		self.allocs_since_gc.set(0);

		let mut objects = self.objects.borrow_mut();
		if objects.is_empty() {
			return
		}

		//mark phase: visit the immortals, the quarantine ring and every strong root,
		//then exhaust the marking stack
		let mut marking_stack = self.marking_stack.borrow_mut();
		debug_assert!(marking_stack.is_empty());

		{
			let mut visitor = MarkingVisitor { marking_stack: &mut marking_stack };

			for erased in self.immortals.borrow().iter() {
				with_erased_raw!(*erased, raw, visitor.visit_raw(raw));
			}

			for raw in self.immortal_classes.borrow().iter() {
				visitor.visit_raw(raw);
			}

			for quarantined in self.quarantine.borrow().iter() {
				if let Some(ref erased) = *quarantined {
					with_erased_raw!(*erased, raw, visitor.visit_raw(raw));
				}
			}

			let root_storage = self.root_storage.borrow();
			let mut strong_entry_i = root_storage.first_strong;
			while strong_entry_i != NULL_ENTRY {
				let entry = &root_storage.entries[strong_entry_i as usize];

				if let Some(ref erased) = entry.raw {
					with_erased_raw!(*erased, raw, visitor.visit_raw(raw));
				}

				strong_entry_i = entry.next_entry;
			}
			drop(root_storage);

			while let Some(erased) = visitor.marking_stack.pop() {
				with_erased_raw!(erased, raw, raw.visit_raws(&mut visitor));
			}
		}

		//sweep phase: the whole object vec is the doomed set; marked survivors are
		//re-accumulated, everything else gets its teardown hook and is freed
		let doomed = std::mem::replace(&mut *objects, Vec::new());

		for erased in doomed {
			if erased.header().marked() {
				objects.push(erased);
			} else {
				debug_assert!(!erased.header().rooted());
				with_erased_raw!(erased, raw, raw.free());
			}
		}

		//clear the mark bits for the next cycle
		for erased in objects.iter() {
			erased.header().unmark();
		}
	}

	//frees every allocation. called when the Engine is dropped, after everything holding
	//a Root has been torn down.
	pub(crate) fn clear(&self) {
		for erased in self.objects.borrow_mut().drain(..) {
			with_erased_raw!(erased, raw, raw.free());
		}

		self.immortals.borrow_mut().clear();
		self.immortal_classes.borrow_mut().clear();

		for quarantined in self.quarantine.borrow_mut().iter_mut() {
			*quarantined = None;
		}
		self.quarantine_next.set(0);

		self.marking_stack.borrow_mut().clear();
		self.allocs_since_gc.set(0);
	}
}
