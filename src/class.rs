use smallvec::{SmallVec};
use std::cell::{Cell, RefCell};
use std::cmp::{Ordering};
use super::collections::{Map, Tab};
use super::engine::{core_classes, varn, with_engine, with_heap, Sym};
use super::error::{VResult};
use super::gc::{Allocate, Header, Raw, Root, Slot, Visitor};
use super::val::{Val};

pub(crate) const MAX_CLASSES: u32 = 0x0010_0000;

//-------------------------------------------------------------------------------------------------
// Class
//-------------------------------------------------------------------------------------------------

/**
A class: a named, single-inheritance bundle of method bindings.

Classes are created with [`varn::make_class`](varn/fn.make_class.html) or vended by
[`varn::data_class`](varn/fn.data_class.html), and are immortal from the moment of
creation. A class which has acquired a subclass is frozen: no further methods may be
bound to it.
*/

pub struct Class {
	header: Header,

	name: Sym,
	class_id: u32,

	parent: RefCell<Option<Raw<Class>>>,
	secret: RefCell<Option<Slot>>,

	//dense tables indexed by the selector's symbol index. a None entry means "not yet
	//known here": resolution falls through to the ancestor chain and caches the answer
	//back into this table.
	methods: RefCell<Vec<Option<Raw<RFn>>>>,
	class_methods: RefCell<Vec<Option<Raw<RFn>>>>
}

/**
The ordering tier of a class.

Core classes are built into the runtime; data classes have no secret and structurally
comparable instances; opaque classes carry a secret which gates access to their
instances' payloads.
*/

#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug)]
pub enum ClassCategory {
	Core,
	Data,
	Opaque
}

#[derive(Copy, Clone)]
pub(crate) enum MethodKind {
	Instance,
	Class
}

impl Class {
	/** Returns the class's name. */
	pub fn name(&self) -> Sym {
		self.name
	}

	/** Returns the class's parent. `None` only for the root class. */
	pub fn parent(&self) -> Option<Root<Class>> {
		match *self.parent.borrow() {
			Some(ref raw) => Some(raw.root()),
			None => None
		}
	}

	/** Returns `true` if any subclass of this class has ever been created. */
	pub fn has_subclasses(&self) -> bool {
		//the frozen bit in the allocation header doubles as the subclass flag
		self.header.frozen()
	}

	pub fn category(&self) -> ClassCategory {
		match *self.secret.borrow() {
			None => ClassCategory::Data,
			Some(Slot::Sym(s)) if core_classes(|core| s == core.core_secret) => {
				ClassCategory::Core
			}
			Some(_) => ClassCategory::Opaque
		}
	}

	/*
	class ordering: the same class is Equal to itself; otherwise classes order by
	category, then by name. two distinct classes which tie on both (same-named opaque
	classes, in practice) have no defined order.
	*/

	pub fn order(&self, other: &Class) -> Option<Ordering> {
		if self.class_id == other.class_id {
			return Some(Ordering::Equal)
		}

		match self.category().cmp(&other.category()) {
			Ordering::Equal => {
				match self.name.partial_cmp(&other.name) {
					Some(Ordering::Equal) => None,
					ordering => ordering
				}
			}
			ordering => Some(ordering)
		}
	}

	/**
	Resolves an instance method.

	A hit which comes from an ancestor's table is cached into this class's own table, so
	repeated resolution of the same selector returns a pointer-identical `RFn` without
	re-walking the chain.
	*/
	pub fn resolve_method(&self, selector: Sym) -> Option<Root<RFn>> {
		self.resolve_in(selector, MethodKind::Instance)
	}

	/** Resolves a class method, with the same caching as `resolve_method`. */
	pub fn resolve_class_method(&self, selector: Sym) -> Option<Root<RFn>> {
		self.resolve_in(selector, MethodKind::Class)
	}

	fn table(&self, kind: MethodKind) -> &RefCell<Vec<Option<Raw<RFn>>>> {
		match kind {
			MethodKind::Instance => &self.methods,
			MethodKind::Class => &self.class_methods
		}
	}

	fn resolve_in(&self, selector: Sym, kind: MethodKind) -> Option<Root<RFn>> {
		let index = selector.index();

		if let Some(Some(ref raw)) = self.table(kind).borrow().get(index) {
			return Some(raw.root())
		}

		let mut ancestor = self.parent.borrow().clone();
		while let Some(class) = ancestor {
			let inherited = match class.table(kind).borrow().get(index) {
				Some(Some(ref raw)) => Some(raw.clone()),
				_ => None
			};

			if let Some(raw) = inherited {
				self.bind_raw(selector, raw.clone(), kind);
				return Some(raw.root())
			}

			ancestor = class.parent.borrow().clone();
		}

		None
	}

	fn bind_raw(&self, selector: Sym, raw: Raw<RFn>, kind: MethodKind) {
		let mut table = self.table(kind).borrow_mut();

		let index = selector.index();
		if table.len() <= index {
			table.resize(index + 1, None);
		}

		table[index] = Some(raw);
	}
}

impl Allocate for Class {
	fn visit_raws<V: Visitor>(&self, visitor: &mut V) {
		if let Some(ref parent) = *self.parent.borrow() {
			visitor.visit_raw(parent);
		}

		if let Some(ref secret) = *self.secret.borrow() {
			visitor.visit_slot(secret);
		}

		for binding in self.methods.borrow().iter() {
			if let Some(ref raw) = *binding {
				visitor.visit_raw(raw);
			}
		}

		for binding in self.class_methods.borrow().iter() {
			if let Some(ref raw) = *binding {
				visitor.visit_raw(raw);
			}
		}
	}

	fn clear_raws(&self) {
		self.parent.borrow_mut().take();
		self.secret.borrow_mut().take();
		self.methods.borrow_mut().clear();
		self.class_methods.borrow_mut().clear();
	}

	fn header(&self) -> &Header {
		&self.header
	}
}

pub(crate) fn make_class(
	name: Sym,
	parent: Option<&Root<Class>>,
	secret: Option<&Val>,
	class_methods: &[(Sym, Root<RFn>)],
	methods: &[(Sym, Root<RFn>)]
) -> VResult<Root<Class>> {
	let class_id = with_engine(|engine| {
		let class_id = engine.next_class_id.get();
		assert!(
			class_id < MAX_CLASSES,
			"program requires more than {} classes",
			MAX_CLASSES
		);
		engine.next_class_id.set(class_id + 1);
		class_id
	});

	//the child starts from a copy of the parent's tables, so bindings made to the parent
	//before this point are visible without a chain walk. the parent is frozen from here on.
	let (parent_raw, inherited_methods, inherited_class_methods) = match parent {
		Some(parent) => {
			parent.header.freeze();
			(
				Some(parent.to_raw()),
				parent.methods.borrow().clone(),
				parent.class_methods.borrow().clone()
			)
		}
		None => (None, Vec::new(), Vec::new())
	};

	let class = varn::alloc(Class {
		header: Header::new(),

		name,
		class_id,

		parent: RefCell::new(parent_raw),
		secret: RefCell::new(secret.map(Slot::from_val)),

		methods: RefCell::new(inherited_methods),
		class_methods: RefCell::new(inherited_class_methods)
	});

	for (selector, rfn) in methods {
		class.bind_raw(*selector, rfn.to_raw(), MethodKind::Instance);
	}

	for (selector, rfn) in class_methods {
		class.bind_raw(*selector, rfn.to_raw(), MethodKind::Class);
	}

	let raw = class.to_raw();
	with_heap(|heap| heap.immortalize_class(raw));

	Ok(class)
}

pub(crate) fn add_method(
	class: &Root<Class>,
	selector: Sym,
	rfn: &Root<RFn>,
	kind: MethodKind
) -> VResult<()> {
	ensure!(
		!class.has_subclasses(),
		"attempted to bind a method to {}, which already has subclasses",
		class.name()
	);

	class.bind_raw(selector, rfn.to_raw(), kind);
	Ok(())
}

fn inherits_from(class: &Root<Class>, ancestor: &Root<Class>) -> bool {
	let target = ancestor.to_raw();

	let mut current = Some(class.to_raw());
	while let Some(raw) = current {
		if raw == target {
			return true
		}

		current = raw.parent.borrow().clone();
	}

	false
}

pub(crate) fn has_class(val: &Val, class: &Root<Class>) -> bool {
	inherits_from(&val.class_of(), class)
}

pub(crate) fn data_class(name: Sym) -> VResult<Root<Class>> {
	let existing = with_engine(|engine| engine.data_classes.borrow().get(&name).cloned());
	if let Some(class) = existing {
		return Ok(class)
	}

	let record = core_classes(|core| core.record.clone());
	let class = make_class(name, Some(&record), None, &[], &[])?;

	with_engine(|engine| {
		engine.data_classes.borrow_mut().insert(name, class.clone());
	});

	Ok(class)
}

//-------------------------------------------------------------------------------------------------
// Obj
//-------------------------------------------------------------------------------------------------

/**
An instance of a data or opaque class, carrying a symbol-table payload.
*/

pub struct Obj {
	header: Header,
	class: RefCell<Option<Raw<Class>>>,
	data: RefCell<Option<Raw<Tab>>>
}

impl Obj {
	/** Returns the instance's class. */
	pub fn class(&self) -> Root<Class> {
		match *self.class.borrow() {
			Some(ref raw) => raw.root(),
			None => panic!("attempted to access a freed instance")
		}
	}

	/** Returns the instance's class name. */
	pub fn name(&self) -> Sym {
		self.class().name()
	}

	fn data(&self) -> Root<Tab> {
		match *self.data.borrow() {
			Some(ref raw) => raw.root(),
			None => panic!("attempted to access a freed instance")
		}
	}
}

//instances of data classes compare structurally; instances of opaque classes only ever
//equal themselves, and identity is handled by the caller
impl PartialEq for Obj {
	fn eq(&self, other: &Obj) -> bool {
		let self_class = self.class();
		let other_class = other.class();

		Root::ptr_eq(&self_class, &other_class)
			&& self_class.category() == ClassCategory::Data
			&& self.data() == other.data()
	}
}

impl Allocate for Obj {
	fn visit_raws<V: Visitor>(&self, visitor: &mut V) {
		if let Some(ref class) = *self.class.borrow() {
			visitor.visit_raw(class);
		}

		if let Some(ref data) = *self.data.borrow() {
			visitor.visit_raw(data);
		}
	}

	fn clear_raws(&self) {
		self.class.borrow_mut().take();
		self.data.borrow_mut().take();
	}

	fn header(&self) -> &Header {
		&self.header
	}
}

fn check_secret(class: &Root<Class>, secret: Option<&Val>) -> VResult<()> {
	let stored = class.secret.borrow().clone();
	match (stored, secret) {
		(Some(stored), Some(given)) if stored.root() == *given => Ok(()),
		_ => bail!("incorrect secret for the opaque class {}", class.name())
	}
}

pub(crate) fn obj_new(
	class: &Root<Class>,
	data: &Root<Tab>,
	secret: Option<&Val>
) -> VResult<Root<Obj>> {
	match class.category() {
		ClassCategory::Core => {
			bail!("attempted to instantiate the core class {}", class.name())
		}
		ClassCategory::Data => {
			ensure!(
				secret.is_none(),
				"attempted to pass a secret when instantiating the data class {}",
				class.name()
			);

			let record = core_classes(|core| core.record.clone());
			ensure!(
				inherits_from(class, &record),
				"attempted to instantiate {}, which is not a record class",
				class.name()
			);
		}
		ClassCategory::Opaque => check_secret(class, secret)?
	}

	Ok(varn::alloc(Obj {
		header: Header::new(),
		class: RefCell::new(Some(class.to_raw())),
		data: RefCell::new(Some(data.to_raw()))
	}))
}

pub(crate) fn obj_data(obj: &Root<Obj>, secret: Option<&Val>) -> VResult<Root<Tab>> {
	let class = obj.class();
	match class.category() {
		ClassCategory::Core => {
			bail!("attempted to access an instance of the core class {}", class.name())
		}
		ClassCategory::Data => {
			ensure!(
				secret.is_none(),
				"attempted to pass a secret when accessing an instance of the data class {}",
				class.name()
			);
		}
		ClassCategory::Opaque => check_secret(&class, secret)?
	}

	Ok(obj.data())
}

//-------------------------------------------------------------------------------------------------
// RFn
//-------------------------------------------------------------------------------------------------

/**
A native function: a boxed Rust closure with declared argument bounds and an optional
vector of traced state slots.
*/

pub struct RFn {
	header: Header,

	name: Cell<Option<Sym>>,
	min_args: usize,
	max_args: Option<usize>,

	f: Box<dyn Fn(&[Val]) -> VResult<Val>>,

	//mutable storage owned by the function itself, visible to the collector
	state: RefCell<Vec<Slot>>
}

impl RFn {
	pub fn name(&self) -> Option<Sym> {
		self.name.get()
	}

	pub fn set_name(&self, name: Option<Sym>) {
		self.name.set(name)
	}

	/** Appends a traced state slot, returning its index. */
	pub fn add_state(&self, val: &Val) -> usize {
		let mut state = self.state.borrow_mut();
		state.push(Slot::from_val(val));
		state.len() - 1
	}

	pub fn state(&self, index: usize) -> Val {
		self.state.borrow()[index].root()
	}

	pub fn set_state(&self, index: usize, val: &Val) {
		self.state.borrow_mut()[index] = Slot::from_val(val);
	}

	pub(crate) fn receive_call(&self, args: &[Val]) -> VResult<Val> {
		ensure!(
			args.len() >= self.min_args,
			"too few arguments: received {}, expected at least {}",
			args.len(),
			self.min_args
		);

		if let Some(max_args) = self.max_args {
			ensure!(
				args.len() <= max_args,
				"too many arguments: received {}, expected no more than {}",
				args.len(),
				max_args
			);
		}

		(self.f)(args)
	}
}

impl Allocate for RFn {
	fn visit_raws<V: Visitor>(&self, visitor: &mut V) {
		for slot in self.state.borrow().iter() {
			visitor.visit_slot(slot);
		}
	}

	fn clear_raws(&self) {
		self.state.borrow_mut().clear();
	}

	fn header(&self) -> &Header {
		&self.header
	}
}

pub(crate) fn rfn<F>(min_args: usize, max_args: Option<usize>, f: F) -> Root<RFn>
where
	F: Fn(&[Val]) -> VResult<Val> + 'static
{
	varn::alloc(RFn {
		header: Header::new(),

		name: Cell::new(None),
		min_args,
		max_args,

		f: Box::new(f),

		state: RefCell::new(Vec::new())
	})
}

//-------------------------------------------------------------------------------------------------
// dispatch
//-------------------------------------------------------------------------------------------------

pub(crate) fn dispatch(receiver: &Val, selector: Sym, args: &[Val]) -> VResult<Val> {
	let resolved = match *receiver {
		//a class receives its own class methods first, falling back to the instance
		//methods of the Class class
		Val::Class(ref class) => {
			match class.resolve_class_method(selector) {
				Some(rfn) => Some(rfn),
				None => receiver.class_of().resolve_method(selector)
			}
		}
		_ => receiver.class_of().resolve_method(selector)
	};

	let rfn = match resolved {
		Some(rfn) => rfn,
		None => bail!("unbound method {} for {}", selector, receiver)
	};

	let mut full_args = SmallVec::<[Val; 8]>::new();
	full_args.push(receiver.clone());
	full_args.extend(args.iter().cloned());

	rfn.receive_call(&full_args)
}

//-------------------------------------------------------------------------------------------------
// bootstrap
//-------------------------------------------------------------------------------------------------

pub(crate) struct CoreClasses {
	pub(crate) value: Root<Class>,
	pub(crate) class: Root<Class>,
	pub(crate) symbol: Root<Class>,
	pub(crate) null: Root<Class>,
	pub(crate) boolean: Root<Class>,
	pub(crate) int: Root<Class>,
	pub(crate) tab: Root<Class>,
	pub(crate) map: Root<Class>,
	pub(crate) rfn: Root<Class>,
	pub(crate) data: Root<Class>,
	pub(crate) record: Root<Class>,
	pub(crate) object: Root<Class>,

	pub(crate) core_secret: Sym
}

//creates the core class hierarchy and the canonical empty collections. runs exactly once,
//inside Runtime::new, before any user code.
pub(crate) fn bootstrap() -> VResult<()> {
	let core_secret = varn::anon_sym("core-secret")?;
	let secret = Val::Sym(core_secret);

	let value = make_class(varn::sym("Value")?, None, Some(&secret), &[], &[])?;

	let class = make_class(varn::sym("Class")?, Some(&value), Some(&secret), &[], &[])?;
	let symbol = make_class(varn::sym("Symbol")?, Some(&value), Some(&secret), &[], &[])?;
	let null = make_class(varn::sym("Null")?, Some(&value), Some(&secret), &[], &[])?;
	let boolean = make_class(varn::sym("Bool")?, Some(&value), Some(&secret), &[], &[])?;
	let int = make_class(varn::sym("Int")?, Some(&value), Some(&secret), &[], &[])?;
	let tab = make_class(varn::sym("Tab")?, Some(&value), Some(&secret), &[], &[])?;
	let map = make_class(varn::sym("Map")?, Some(&value), Some(&secret), &[], &[])?;
	let rfn = make_class(varn::sym("RFn")?, Some(&value), Some(&secret), &[], &[])?;

	let data = make_class(varn::sym("Data")?, Some(&value), Some(&secret), &[], &[])?;
	let record = make_class(varn::sym("Record")?, Some(&data), Some(&secret), &[], &[])?;
	let object = make_class(varn::sym("Object")?, Some(&value), Some(&secret), &[], &[])?;

	with_engine(|engine| {
		*engine.core.borrow_mut() = Some(CoreClasses {
			value,
			class,
			symbol,
			null,
			boolean,
			int,
			tab,
			map,
			rfn,
			data,
			record,
			object,

			core_secret
		});
	});

	let empty_tab = Tab::alloc_empty();
	varn::immortalize(&Val::Tab(empty_tab.clone()));

	let empty_map = Map::alloc_empty();
	varn::immortalize(&Val::Map(empty_map.clone()));

	with_engine(|engine| {
		*engine.empty_tab.borrow_mut() = Some(empty_tab);
		*engine.empty_map.borrow_mut() = Some(empty_map);
	});

	Ok(())
}

//-------------------------------------------------------------------------------------------------
// tests
//-------------------------------------------------------------------------------------------------
