use fnv::{FnvHashMap};
use std::cell::{Cell, RefCell};
use std::cmp::{Ordering};
use std::fmt::{self, Debug, Display, Formatter};
use std::io::{self, Write};
use std::marker::{PhantomData};
use std::rc::{Rc};
use super::class::{Class, CoreClasses, Obj, RFn};
use super::collections::{Map, Tab};
use super::error::{VResult};
use super::gc::{Allocate, Heap, Root, Slot};
use super::val::{Val};

//-------------------------------------------------------------------------------------------------
// thread-local state
//-------------------------------------------------------------------------------------------------

thread_local! {
	static ACTIVE_ENGINE: RefCell<Option<Rc<EngineStorage>>> = RefCell::new(None);
	static ACTIVE_ENGINE_ID: Cell<Option<u8>> = Cell::new(None);

	//a bitset which tracks the engine ids in use on this thread. ids are recycled when
	//their Engine is dropped, so 256 ids is a cap on simultaneous engines, not a lifetime
	//allocation limit.
	static ID_BITSET: [Cell<u32>; 8] = Default::default();
}

fn alloc_engine_id() -> Option<u8> {
	ID_BITSET.with(|bitset| {
		for (word_i, word) in bitset.iter().enumerate() {
			let bits = word.get();
			if bits != 0xffff_ffff {
				let bit = (!bits).trailing_zeros();
				word.set(bits | (0x1 << bit));
				return Some((word_i as u32 * 32 + bit) as u8)
			}
		}

		None
	})
}

fn free_engine_id(id: u8) {
	ID_BITSET.with(|bitset| {
		let word = &bitset[(id as usize) / 32];
		let mask = 0x1u32 << (id as u32 % 32);

		debug_assert!(word.get() & mask != 0);
		word.set(word.get() & !mask);
	})
}

//the cheap path for engine-id checks: no RefCell borrow, no Rc clone
#[inline]
pub(crate) fn active_engine_id() -> Option<u8> {
	ACTIVE_ENGINE_ID.with(|id| id.get())
}

#[inline]
pub(crate) fn with_engine<R, F: FnOnce(&EngineStorage) -> R>(f: F) -> R {
	let storage = ACTIVE_ENGINE.with(|active| {
		match *active.borrow() {
			Some(ref storage) => Rc::clone(storage),
			None => panic!("no varn Runtime is active; consider calling Runtime::run()")
		}
	});

	f(&storage)
}

#[inline]
pub(crate) fn with_heap<R, F: FnOnce(&Heap) -> R>(f: F) -> R {
	with_engine(|engine| f(&engine.heap))
}

pub(crate) fn core_classes<R, F: FnOnce(&CoreClasses) -> R>(f: F) -> R {
	with_engine(|engine| {
		match *engine.core.borrow() {
			Some(ref core) => f(core),
			None => panic!("the core classes have not been initialized")
		}
	})
}

//runs its closure when dropped. used for state which must be restored on the way out of a
//scope even when the scope panics.
pub(crate) struct Guard<F: FnOnce()> {
	callback: Option<F>
}

impl<F: FnOnce()> Guard<F> {
	pub(crate) fn new(callback: F) -> Guard<F> {
		Guard { callback: Some(callback) }
	}
}

impl<F: FnOnce()> Drop for Guard<F> {
	fn drop(&mut self) {
		(self.callback.take().unwrap())()
	}
}

//-------------------------------------------------------------------------------------------------
// pr!(), prn!(), epr!(), eprn!()
//-------------------------------------------------------------------------------------------------

/**
A [`Write`](https://doc.rust-lang.org/std/io/trait.Write.html) adapter which forwards to the
active `Runtime`'s normal-output writer.
*/
pub struct PrWriter;

impl Write for PrWriter {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		with_engine(|engine| engine.pr_writer.borrow_mut().write(buf))
	}

	fn flush(&mut self) -> io::Result<()> {
		with_engine(|engine| engine.pr_writer.borrow_mut().flush())
	}
}

/**
A [`Write`](https://doc.rust-lang.org/std/io/trait.Write.html) adapter which forwards to the
active `Runtime`'s error-output writer.
*/
pub struct EprWriter;

impl Write for EprWriter {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		with_engine(|engine| engine.epr_writer.borrow_mut().write(buf))
	}

	fn flush(&mut self) -> io::Result<()> {
		with_engine(|engine| engine.epr_writer.borrow_mut().flush())
	}
}

/** Prints to the active `Runtime`'s normal-output writer. */
#[macro_export]
macro_rules! pr {
	($($arg:tt)*) => (
		{
			use std::io::Write;
			let mut pr_writer = $crate::PrWriter;
			write!(pr_writer, $($arg)*).ok();
			pr_writer.flush().ok();
		}
	);
}

/** Prints to the active `Runtime`'s normal-output writer, with a trailing `'\n'`. */
#[macro_export]
macro_rules! prn {
	($($arg:tt)*) => (
		{
			use std::io::Write;
			let mut pr_writer = $crate::PrWriter;
			writeln!(pr_writer, $($arg)*).ok();
		}
	);
}

/** Prints to the active `Runtime`'s error-output writer. */
#[macro_export]
macro_rules! epr {
	($($arg:tt)*) => (
		{
			use std::io::Write;
			let mut epr_writer = $crate::EprWriter;
			write!(epr_writer, $($arg)*).ok();
			epr_writer.flush().ok();
		}
	);
}

/** Prints to the active `Runtime`'s error-output writer, with a trailing `'\n'`. */
#[macro_export]
macro_rules! eprn {
	($($arg:tt)*) => (
		{
			use std::io::Write;
			let mut epr_writer = $crate::EprWriter;
			writeln!(epr_writer, $($arg)*).ok();
		}
	);
}

//-------------------------------------------------------------------------------------------------
// Sym
//-------------------------------------------------------------------------------------------------

pub(crate) const MAX_SYM: u32 = 0x00ff_ffff;
pub(crate) const MAX_SYM_NAME_LEN: usize = 256;

/**
An interned or anonymous symbol.

`Sym` is a small `Copy` index into the active `Runtime`'s symbol registry. Indexes are
assigned monotonically and never reused, so a `Sym` stays valid for its `Runtime`'s whole
lifetime. Methods will panic if their `Runtime` is no longer active.
*/

#[derive(PartialEq, Eq, Hash, Copy, Clone)]
pub struct Sym(pub(crate) u32, pub(crate) PhantomData<*mut ()>);

#[derive(PartialEq, Eq, Copy, Clone)]
pub(crate) enum SymKind {
	Interned,
	Anon
}

pub(crate) struct SymEntry {
	name: Rc<str>,
	kind: SymKind
}

impl Sym {
	/**
	Returns the name of the symbol.
	*/
	pub fn name(&self) -> Rc<str> {
		with_engine(|engine| Rc::clone(&engine.syms.borrow()[self.0 as usize].name))
	}

	/**
	Returns `true` if this symbol is anonymous: created by [`varn::anon_sym`](fn.anon_sym.html)
	and never returned by the interner.
	*/
	pub fn is_anon(&self) -> bool {
		self.kind() == SymKind::Anon
	}

	pub(crate) fn kind(&self) -> SymKind {
		with_engine(|engine| engine.syms.borrow()[self.0 as usize].kind)
	}

	/**
	Returns the symbol's index in the registry.

	Indexes are assigned monotonically from zero, shared between interned and anonymous
	symbols, and never reused.
	*/
	pub fn index(&self) -> usize {
		self.0 as usize
	}

	pub(crate) fn from_index(index: usize) -> Sym {
		debug_assert!(index <= MAX_SYM as usize);
		Sym(index as u32, PhantomData)
	}
}

/*
symbol ordering: an interned symbol orders before any anonymous symbol; within a kind,
symbols order by name. two distinct anonymous symbols can share a name, in which case they
have no defined order.
*/

impl PartialOrd for Sym {
	fn partial_cmp(&self, other: &Sym) -> Option<Ordering> {
		if self.0 == other.0 {
			return Some(Ordering::Equal)
		}

		match (self.kind(), other.kind()) {
			(SymKind::Interned, SymKind::Anon) => Some(Ordering::Less),
			(SymKind::Anon, SymKind::Interned) => Some(Ordering::Greater),
			(SymKind::Interned, SymKind::Interned) => Some(self.name().cmp(&other.name())),
			(SymKind::Anon, SymKind::Anon) => {
				match self.name().cmp(&other.name()) {
					Ordering::Equal => None,
					ordering => Some(ordering)
				}
			}
		}
	}
}

impl Display for Sym {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}", self.name())
	}
}

impl Debug for Sym {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "Sym({})", self.name())
	}
}

/**
A type which can be converted to a `Sym`.

Implemented for `Sym` itself (a no-op) and for string types, which are passed to
[`varn::sym`](fn.sym.html).
*/
pub trait ToSym {
	fn to_sym(&self) -> VResult<Sym>;
}

impl ToSym for Sym {
	fn to_sym(&self) -> VResult<Sym> {
		Ok(*self)
	}
}

impl<'a> ToSym for &'a str {
	fn to_sym(&self) -> VResult<Sym> {
		varn::sym(self)
	}
}

impl ToSym for String {
	fn to_sym(&self) -> VResult<Sym> {
		varn::sym(self)
	}
}

fn sym_impl(engine: &EngineStorage, name: &str, kind: SymKind) -> Sym {
	let mut syms = engine.syms.borrow_mut();

	assert!(
		syms.len() <= MAX_SYM as usize,
		"program requires more than {} unique symbols",
		MAX_SYM as usize + 1
	);

	let name: Rc<str> = name.into();
	let sym = Sym(syms.len() as u32, PhantomData);

	syms.push(SymEntry {
		name: Rc::clone(&name),
		kind
	});

	if kind == SymKind::Interned {
		engine.syms_map.borrow_mut().insert(name, sym);
	}

	sym
}

//-------------------------------------------------------------------------------------------------
// EngineBuilder, Engine, EngineStorage, Runtime
//-------------------------------------------------------------------------------------------------

/**
Builder for an [`Engine`](struct.Engine.html). Exists for forward compatibility; an engine
currently has nothing to configure before construction.
*/
#[doc(hidden)]
pub struct EngineBuilder;

impl EngineBuilder {
	pub fn new() -> EngineBuilder {
		EngineBuilder
	}

	pub fn build(self) -> Engine {
		Engine::new()
	}
}

#[doc(hidden)]
pub struct Engine(Rc<EngineStorage>);

pub(crate) struct EngineStorage {
	id: u8,
	pub(crate) heap: Heap,

	pub(crate) pr_writer: RefCell<Box<dyn Write>>,
	pub(crate) epr_writer: RefCell<Box<dyn Write>>,

	pub(crate) syms: RefCell<Vec<SymEntry>>,
	pub(crate) syms_map: RefCell<FnvHashMap<Rc<str>, Sym>>,

	pub(crate) next_class_id: Cell<u32>,
	pub(crate) core: RefCell<Option<CoreClasses>>,
	pub(crate) data_classes: RefCell<FnvHashMap<Sym, Root<Class>>>,

	pub(crate) empty_map: RefCell<Option<Root<Map>>>,
	pub(crate) empty_tab: RefCell<Option<Root<Tab>>>
}

impl EngineStorage {
	fn new(id: u8) -> EngineStorage {
		EngineStorage {
			id,
			heap: Heap::new(id),

			pr_writer: RefCell::new(Box::new(io::stdout())),
			epr_writer: RefCell::new(Box::new(io::stderr())),

			syms: RefCell::new(Vec::new()),
			syms_map: RefCell::new(FnvHashMap::default()),

			next_class_id: Cell::new(0),
			core: RefCell::new(None),
			data_classes: RefCell::new(FnvHashMap::default()),

			empty_map: RefCell::new(None),
			empty_tab: RefCell::new(None)
		}
	}
}

impl Engine {
	pub fn new() -> Engine {
		let engine_id = alloc_engine_id()
			.expect("a thread may have no more than 256 simultaneous Runtimes");

		Engine(Rc::new(EngineStorage::new(engine_id)))
	}

	//makes this engine the active engine for the duration of the closure, restoring the
	//previously-active engine on the way out. reentrant.
	pub fn run<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce() -> VResult<R>
	{
		let old_engine = ACTIVE_ENGINE.with(|active| {
			active.borrow_mut().replace(Rc::clone(&self.0))
		});
		let old_id = ACTIVE_ENGINE_ID.with(|active| {
			active.replace(Some(self.0.id))
		});

		let _guard = Guard::new(move || {
			ACTIVE_ENGINE.with(|active| {
				*active.borrow_mut() = old_engine;
			});
			ACTIVE_ENGINE_ID.with(|active| {
				active.set(old_id);
			});
		});

		match f() {
			Ok(result) => Some(result),
			Err(err) => {
				eprn!("\nunhandled error in run() call: {}", err);
				None
			}
		}
	}
}

impl Drop for Engine {
	fn drop(&mut self) {
		//drop every Root owned by the engine itself, then free the heap. any Root held
		//outside this engine at this point is a bug, detected when the Heap drops.
		let _ = self.run(|| {
			with_engine(|engine| {
				engine.core.borrow_mut().take();
				engine.data_classes.borrow_mut().clear();
				engine.empty_map.borrow_mut().take();
				engine.empty_tab.borrow_mut().take();

				engine.heap.clear();
				Ok(())
			})
		});

		free_engine_id(self.0.id);

		debug_assert!(Rc::strong_count(&self.0) == 1);
	}
}

/**
An instance of the Varn runtime.

The runtime owns the heap, the symbol registry and the class registry. Its operations are
exposed as free functions in the [`varn` module](varn/index.html); they may only be called
from within a closure passed to [`run`](#method.run).

```no_run
use varn_engine::{varn, Runtime, Val};

let runtime = Runtime::new();
runtime.run(|| {
	let name = varn::sym("greeting")?;
	varn::tab_from_pairs(&[(name, Val::Int(42))]);
	Ok(())
});
```
*/
pub struct Runtime(Engine);

impl Runtime {
	pub fn new() -> Runtime {
		let engine = Engine::new();

		let initialized = engine.run(|| {
			super::class::bootstrap()?;
			Ok(())
		});

		match initialized {
			Some(()) => Runtime(engine),
			None => panic!("failed to initialize the Runtime")
		}
	}

	/**
	Activates this runtime and invokes the closure.

	Returns `None`, after printing to the error-output writer, if the closure returns an
	error.
	*/
	pub fn run<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce() -> VResult<R>
	{
		self.0.run(f)
	}
}

impl Default for Runtime {
	fn default() -> Runtime {
		Runtime::new()
	}
}

//-------------------------------------------------------------------------------------------------
// varn
//-------------------------------------------------------------------------------------------------

/**
The operation surface of the runtime, as free functions.

These functions may only be called while a [`Runtime`](../struct.Runtime.html) is active:
that is, from within a closure passed to `Runtime::run`.
*/
pub mod varn {
	use super::*;
	use crate::class;
	use crate::collections;

	//---------------------------------------------------------------------------------------------
	// symbols
	//---------------------------------------------------------------------------------------------

	/** Returns the interned symbol with the given name, creating it if necessary. */
	pub fn sym(name: &str) -> VResult<Sym> {
		ensure!(!name.is_empty(), "attempted to intern an empty symbol name");
		assert!(
			name.len() <= MAX_SYM_NAME_LEN,
			"symbol name is longer than {} bytes",
			MAX_SYM_NAME_LEN
		);

		with_engine(|engine| {
			let existing = engine.syms_map.borrow().get(name).copied();
			match existing {
				Some(sym) => Ok(sym),
				None => Ok(sym_impl(engine, name, SymKind::Interned))
			}
		})
	}

	/**
	Returns a fresh anonymous symbol.

	The new symbol carries the given name, but it's never registered with the interner:
	no present or future call to [`sym`](fn.sym.html) will return it, and it's unequal to
	every other symbol.
	*/
	pub fn anon_sym(name: &str) -> VResult<Sym> {
		ensure!(!name.is_empty(), "attempted to create an anonymous symbol with an empty name");
		assert!(
			name.len() <= MAX_SYM_NAME_LEN,
			"symbol name is longer than {} bytes",
			MAX_SYM_NAME_LEN
		);

		with_engine(|engine| Ok(sym_impl(engine, name, SymKind::Anon)))
	}

	//---------------------------------------------------------------------------------------------
	// allocation and gc
	//---------------------------------------------------------------------------------------------

	pub(crate) fn alloc<T: Allocate>(init: T) -> Root<T> {
		with_heap(|heap| heap.alloc(init))
	}

	/** Forces an immediate garbage-collection cycle. */
	pub fn gc() {
		with_heap(|heap| heap.collect())
	}

	/** Returns the number of objects currently on the active heap. */
	pub fn live_object_count() -> usize {
		with_heap(|heap| heap.live_count())
	}

	/**
	Permanently protects a value from the garbage collector.

	There is no way to release an immortalized value. The number of immortal values is
	capped; exceeding the cap is a fatal error.
	*/
	pub fn immortalize(val: &Val) {
		let slot = Slot::from_val(val);
		with_heap(|heap| heap.immortalize_slot(slot))
	}

	//---------------------------------------------------------------------------------------------
	// output writers
	//---------------------------------------------------------------------------------------------

	/** Replaces the writer used by [`pr!`](../macro.pr.html) and [`prn!`](../macro.prn.html). */
	pub fn set_pr_writer(pr_writer: Box<dyn Write>) {
		with_engine(|engine| *engine.pr_writer.borrow_mut() = pr_writer)
	}

	/** Replaces the writer used by [`epr!`](../macro.epr.html) and [`eprn!`](../macro.eprn.html). */
	pub fn set_epr_writer(epr_writer: Box<dyn Write>) {
		with_engine(|engine| *engine.epr_writer.borrow_mut() = epr_writer)
	}

	//---------------------------------------------------------------------------------------------
	// classes and dispatch
	//---------------------------------------------------------------------------------------------

	/** Returns the class of any value. */
	pub fn class_of(val: &Val) -> Root<Class> {
		val.class_of()
	}

	/** Returns the root class `Value`, the ancestor of every class. */
	pub fn root_class() -> Root<Class> {
		core_classes(|core| core.value.clone())
	}

	/** Returns the class `Data`, the ancestor of every class with structural instances. */
	pub fn data_root_class() -> Root<Class> {
		core_classes(|core| core.data.clone())
	}

	/** Returns the class `Record`, the parent of every derived-data class. */
	pub fn record_class() -> Root<Class> {
		core_classes(|core| core.record.clone())
	}

	/** Returns the class `Object`, the conventional parent of opaque classes. */
	pub fn object_class() -> Root<Class> {
		core_classes(|core| core.object.clone())
	}

	/**
	Creates a new class.

	Every class created through this function descends from the root class `Value`; only
	the bootstrap may create a parentless class. The new class inherits every method
	binding from `parent`, with the given bindings layered on top. `parent` becomes
	frozen: no further methods may be added to it. The new class is immortal.
	*/
	pub fn make_class(
		name: Sym,
		parent: &Root<Class>,
		secret: Option<&Val>,
		class_methods: &[(Sym, Root<RFn>)],
		methods: &[(Sym, Root<RFn>)]
	) -> VResult<Root<Class>> {
		class::make_class(name, Some(parent), secret, class_methods, methods)
	}

	/**
	Binds an instance method to a class.

	Fails if the class already has a subclass; methods may only be added while a class is
	still a leaf.
	*/
	pub fn class_add_method<S: ToSym>(class: &Root<Class>, selector: S, rfn: &Root<RFn>)
		-> VResult<()>
	{
		class::add_method(class, selector.to_sym()?, rfn, class::MethodKind::Instance)
	}

	/** Binds a class method to a class, with the same freeze rule as instance methods. */
	pub fn class_add_class_method<S: ToSym>(class: &Root<Class>, selector: S, rfn: &Root<RFn>)
		-> VResult<()>
	{
		class::add_method(class, selector.to_sym()?, rfn, class::MethodKind::Class)
	}

	/** Returns `true` if the value's class is `class` or inherits from it. */
	pub fn has_class(val: &Val, class: &Root<Class>) -> bool {
		class::has_class(val, class)
	}

	/** Returns the class's name. */
	pub fn class_name(class: &Root<Class>) -> Sym {
		class.name()
	}

	/** Returns the class's parent, or `None` for the root class. */
	pub fn class_parent(class: &Root<Class>) -> Option<Root<Class>> {
		class.parent()
	}

	/**
	Returns the derived-data class with the given name, creating it if necessary.

	Data classes are vended from a per-runtime registry keyed by the name symbol:
	two calls with the same name return the same class.
	*/
	pub fn data_class<S: ToSym>(name: S) -> VResult<Root<Class>> {
		class::data_class(name.to_sym()?)
	}

	/**
	Creates an instance of `class` with the given payload.

	Core classes can't be instantiated. For a data class, `secret` must be `None`; for an
	opaque class, `secret` must match the class's secret.
	*/
	pub fn obj_new(
		class: &Root<Class>,
		data: &Root<Tab>,
		secret: Option<&Val>
	) -> VResult<Root<Obj>> {
		class::obj_new(class, data, secret)
	}

	/**
	Returns an instance's payload table.

	Access to an opaque instance's payload is gated on the class secret, exactly as in
	[`obj_new`](fn.obj_new.html).
	*/
	pub fn obj_data(obj: &Root<Obj>, secret: Option<&Val>) -> VResult<Root<Tab>> {
		class::obj_data(obj, secret)
	}

	/** Shorthand for [`data_class`](fn.data_class.html) followed by `obj_new`. */
	pub fn rec_new<S: ToSym>(name: S, data: &Root<Tab>) -> VResult<Root<Obj>> {
		let class = class::data_class(name.to_sym()?)?;
		class::obj_new(&class, data, None)
	}

	/**
	Creates a native function.

	`min_args` and `max_args` bound the full argument list seen by the closure, including
	the receiver when the function is invoked through [`dispatch`](fn.dispatch.html).
	`None` for `max_args` accepts any number of arguments.
	*/
	pub fn rfn<F>(min_args: usize, max_args: Option<usize>, f: F) -> Root<RFn>
	where
		F: Fn(&[Val]) -> VResult<Val> + 'static
	{
		class::rfn(min_args, max_args, f)
	}

	/**
	Invokes the method named `selector` on `receiver`.

	The selector is resolved through the receiver's class; when the receiver is itself a
	class, its class-method table is consulted first. The receiver is prepended to `args`
	as the callee's first argument. An unbound selector or an argument count outside the
	callee's declared bounds is an error.
	*/
	pub fn dispatch<S: ToSym>(receiver: &Val, selector: S, args: &[Val]) -> VResult<Val> {
		class::dispatch(receiver, selector.to_sym()?, args)
	}

	//---------------------------------------------------------------------------------------------
	// collections
	//---------------------------------------------------------------------------------------------

	/**
	Builds a map from key/value pairs.

	The pairs needn't be sorted. When several pairs share a key, the last one wins. Fails
	if any two keys are unordered with respect to one another.
	*/
	pub fn map_from_pairs(pairs: &[(Val, Val)]) -> VResult<Root<Map>> {
		collections::Map::from_pairs(pairs)
	}

	/** Returns the canonical empty map. */
	pub fn empty_map() -> Root<Map> {
		with_engine(|engine| {
			match *engine.empty_map.borrow() {
				Some(ref map) => map.clone(),
				None => panic!("the canonical empty map has not been initialized")
			}
		})
	}

	/** Builds a symbol table from key/value pairs. Duplicate keys keep the last value. */
	pub fn tab_from_pairs(pairs: &[(Sym, Val)]) -> Root<Tab> {
		collections::Tab::from_pairs(pairs)
	}

	/** Returns the canonical empty symbol table. */
	pub fn empty_tab() -> Root<Tab> {
		with_engine(|engine| {
			match *engine.empty_tab.borrow() {
				Some(ref tab) => tab.clone(),
				None => panic!("the canonical empty symbol table has not been initialized")
			}
		})
	}
}

//-------------------------------------------------------------------------------------------------
// tests
//-------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use std::cmp::{Ordering};
	use super::*;

	#[test]
	fn interning_returns_the_same_sym() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let a = varn::sym("velocity")?;
			let b = varn::sym("velocity")?;
			let c = varn::sym("position")?;

			assert_eq!(a, b);
			assert!(a != c);
			assert_eq!(&*a.name(), "velocity");

			Ok(())
		}).unwrap();
	}

	#[test]
	fn anon_syms_are_never_interned() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let interned = varn::sym("tag")?;
			let anon = varn::anon_sym("tag")?;
			let other_anon = varn::anon_sym("tag")?;

			assert!(anon != interned);
			assert!(anon != other_anon);
			assert!(anon.is_anon() && !interned.is_anon());
			assert_eq!(varn::sym("tag")?, interned);

			Ok(())
		}).unwrap();
	}

	#[test]
	fn sym_ordering() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let apple = varn::sym("apple")?;
			let pear = varn::sym("pear")?;
			let anon_apple = varn::anon_sym("apple")?;
			let anon_apple_2 = varn::anon_sym("apple")?;
			let anon_pear = varn::anon_sym("pear")?;

			assert_eq!(apple.partial_cmp(&apple), Some(Ordering::Equal));
			assert_eq!(apple.partial_cmp(&pear), Some(Ordering::Less));

			//interned symbols order before anonymous symbols, regardless of name
			assert_eq!(pear.partial_cmp(&anon_apple), Some(Ordering::Less));
			assert_eq!(anon_apple.partial_cmp(&pear), Some(Ordering::Greater));

			//anonymous symbols order by name, but equal names are unordered
			assert_eq!(anon_apple.partial_cmp(&anon_pear), Some(Ordering::Less));
			assert_eq!(anon_apple.partial_cmp(&anon_apple_2), None);
			assert_eq!(anon_apple.partial_cmp(&anon_apple), Some(Ordering::Equal));

			Ok(())
		}).unwrap();
	}

	#[test]
	fn sym_indexes_are_monotonic_and_stable() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let first = varn::sym("first")?;
			let anon = varn::anon_sym("first")?;
			let second = varn::sym("second")?;

			//interned and anonymous symbols share one index space
			assert!(anon.index() > first.index());
			assert!(second.index() > anon.index());

			//re-interning returns the original index
			assert_eq!(varn::sym("first")?.index(), first.index());

			Ok(())
		}).unwrap();
	}

	#[test]
	fn run_reports_errors_to_the_epr_writer() {
		let runtime = Runtime::new();
		let result: Option<()> = runtime.run(|| {
			varn::set_epr_writer(Box::new(std::io::sink()));
			bail!("deliberate failure")
		});

		assert!(result.is_none());
	}
}
