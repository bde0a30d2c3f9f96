use std::cmp::{Ordering};
use std::fmt::{self, Debug, Display, Formatter};
use super::class::{Class, Obj, RFn};
use super::collections::{Map, Tab};
use super::engine::{core_classes, Sym};
use super::error::{VResult};
use super::gc::{Root};

/**
Any Varn value.

`Val` owns its target: the heap-allocated variants carry a [`Root`](struct.Root.html),
so holding a `Val` keeps its target alive. The corresponding unrooted representation,
used for storage inside heap objects, is the crate-internal `Slot`.
*/

#[derive(Clone)]
pub enum Val {
	Nil,
	Bool(bool),
	Int(i64),
	Sym(Sym),
	Tab(Root<Tab>),
	Map(Root<Map>),
	Obj(Root<Obj>),
	Class(Root<Class>),
	RFn(Root<RFn>)
}

macro_rules! val_accessors {
	($(($variant:ident, $type:ty, $is_name:ident, $unwrap_name:ident)),+) => (
		impl Val {
			$(
				pub fn $is_name(&self) -> bool {
					match *self {
						Val::$variant(..) => true,
						_ => false
					}
				}

				pub fn $unwrap_name(&self) -> $type {
					match *self {
						Val::$variant(ref inner) => inner.clone(),
						ref val => {
							panic!("attempted to unwrap {} as {}",
							       val.a_type_name(), stringify!($variant))
						}
					}
				}
			)+
		}
	);
}

val_accessors!(
	(Bool, bool, is_bool, unwrap_bool),
	(Int, i64, is_int, unwrap_int),
	(Sym, Sym, is_sym, unwrap_sym),
	(Tab, Root<Tab>, is_tab, unwrap_tab),
	(Map, Root<Map>, is_map, unwrap_map),
	(Obj, Root<Obj>, is_obj, unwrap_obj),
	(Class, Root<Class>, is_class, unwrap_class),
	(RFn, Root<RFn>, is_rfn, unwrap_rfn)
);

impl Val {
	pub fn is_nil(&self) -> bool {
		match *self {
			Val::Nil => true,
			_ => false
		}
	}

	pub fn type_name(&self) -> &'static str {
		match *self {
			Val::Nil => "nil",
			Val::Bool(..) => "bool",
			Val::Int(..) => "int",
			Val::Sym(..) => "sym",
			Val::Tab(..) => "tab",
			Val::Map(..) => "map",
			Val::Obj(..) => "obj",
			Val::Class(..) => "class",
			Val::RFn(..) => "rfn"
		}
	}

	pub fn a_type_name(&self) -> &'static str {
		match *self {
			Val::Nil => "nil",
			Val::Bool(..) => "a bool",
			Val::Int(..) => "an int",
			Val::Sym(..) => "a sym",
			Val::Tab(..) => "a tab",
			Val::Map(..) => "a map",
			Val::Obj(..) => "an obj",
			Val::Class(..) => "a class",
			Val::RFn(..) => "an rfn"
		}
	}

	/**
	Identity comparison: `true` when both `Val`s are the same value.

	For the heap-allocated variants this is pointer identity, not structural equality.
	*/
	pub fn same(&self, other: &Val) -> bool {
		match (self, other) {
			(Val::Nil, Val::Nil) => true,
			(Val::Bool(a), Val::Bool(b)) => a == b,
			(Val::Int(a), Val::Int(b)) => a == b,
			(Val::Sym(a), Val::Sym(b)) => a == b,
			(Val::Tab(a), Val::Tab(b)) => Root::ptr_eq(a, b),
			(Val::Map(a), Val::Map(b)) => Root::ptr_eq(a, b),
			(Val::Obj(a), Val::Obj(b)) => Root::ptr_eq(a, b),
			(Val::Class(a), Val::Class(b)) => Root::ptr_eq(a, b),
			(Val::RFn(a), Val::RFn(b)) => Root::ptr_eq(a, b),
			_ => false
		}
	}

	/** Returns the class of this value. */
	pub fn class_of(&self) -> Root<Class> {
		match *self {
			Val::Nil => core_classes(|core| core.null.clone()),
			Val::Bool(..) => core_classes(|core| core.boolean.clone()),
			Val::Int(..) => core_classes(|core| core.int.clone()),
			Val::Sym(..) => core_classes(|core| core.symbol.clone()),
			Val::Tab(..) => core_classes(|core| core.tab.clone()),
			Val::Map(..) => core_classes(|core| core.map.clone()),
			Val::Obj(ref obj) => obj.class(),
			Val::Class(..) => core_classes(|core| core.class.clone()),
			Val::RFn(..) => core_classes(|core| core.rfn.clone())
		}
	}

	/**
	The total-order-with-holes over all values.

	The same value always compares `Equal` to itself. Values of the same class compare
	per that class; values of different classes compare as their classes do. `None`
	means the two values have no defined order.
	*/
	pub fn order(&self, other: &Val) -> Option<Ordering> {
		if self.same(other) {
			return Some(Ordering::Equal)
		}

		let self_class = self.class_of();
		let other_class = other.class_of();
		if !Root::ptr_eq(&self_class, &other_class) {
			return self_class.order(&other_class)
		}

		match (self, other) {
			(Val::Bool(a), Val::Bool(b)) => Some(a.cmp(b)),
			(Val::Int(a), Val::Int(b)) => Some(a.cmp(b)),
			(Val::Sym(a), Val::Sym(b)) => a.partial_cmp(b),
			(Val::Map(a), Val::Map(b)) => (**a).order(b),

			//symbol tables and instances define equality but no order between
			//unequal values
			(Val::Tab(_), Val::Tab(_)) | (Val::Obj(_), Val::Obj(_)) => {
				if self == other {
					Some(Ordering::Equal)
				} else {
					None
				}
			}

			(Val::Class(a), Val::Class(b)) => (**a).order(b),
			(Val::RFn(_), Val::RFn(_)) => None,

			_ => None
		}
	}

	/**
	Like [`order`](#method.order), but escalates "no defined order" into an error.
	*/
	pub fn zorder(&self, other: &Val) -> VResult<Ordering> {
		match self.order(other) {
			Some(ordering) => Ok(ordering),
			None => bail!("attempted to order incomparable values ({} and {})", self, other)
		}
	}
}

impl Default for Val {
	fn default() -> Val {
		Val::Nil
	}
}

/*
equality is identity, or same-class structural comparison for the types which define it:
maps and symbol tables compare their contents, record instances compare their payloads.
instances of opaque classes only ever equal themselves.
*/

impl PartialEq for Val {
	fn eq(&self, other: &Val) -> bool {
		if self.same(other) {
			return true
		}

		match (self, other) {
			(Val::Tab(a), Val::Tab(b)) => **a == **b,
			(Val::Map(a), Val::Map(b)) => **a == **b,
			(Val::Obj(a), Val::Obj(b)) => **a == **b,
			_ => false
		}
	}
}

impl PartialOrd for Val {
	fn partial_cmp(&self, other: &Val) -> Option<Ordering> {
		self.order(other)
	}
}

impl Display for Val {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match *self {
			Val::Nil => write!(f, "nil"),
			Val::Bool(b) => write!(f, "{}", b),
			Val::Int(i) => write!(f, "{}", i),
			Val::Sym(s) => write!(f, "{}", s),
			Val::Tab(ref t) => write!(f, "#<tab {}>", t.len()),
			Val::Map(ref m) => write!(f, "#<map {}>", m.len()),
			Val::Obj(ref o) => write!(f, "#<obj {}>", o.class().name()),
			Val::Class(ref c) => write!(f, "#<class {}>", c.name()),
			Val::RFn(ref r) => {
				match r.name() {
					Some(name) => write!(f, "#<rfn {}>", name),
					None => write!(f, "#<rfn>")
				}
			}
		}
	}
}

impl Debug for Val {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		Display::fmt(self, f)
	}
}

impl From<bool> for Val {
	fn from(b: bool) -> Val {
		Val::Bool(b)
	}
}

impl From<i64> for Val {
	fn from(i: i64) -> Val {
		Val::Int(i)
	}
}

impl From<i32> for Val {
	fn from(i: i32) -> Val {
		Val::Int(i as i64)
	}
}

impl From<Sym> for Val {
	fn from(s: Sym) -> Val {
		Val::Sym(s)
	}
}

impl From<Root<Tab>> for Val {
	fn from(t: Root<Tab>) -> Val {
		Val::Tab(t)
	}
}

impl From<Root<Map>> for Val {
	fn from(m: Root<Map>) -> Val {
		Val::Map(m)
	}
}

impl From<Root<Obj>> for Val {
	fn from(o: Root<Obj>) -> Val {
		Val::Obj(o)
	}
}

impl From<Root<Class>> for Val {
	fn from(c: Root<Class>) -> Val {
		Val::Class(c)
	}
}

impl From<Root<RFn>> for Val {
	fn from(r: Root<RFn>) -> Val {
		Val::RFn(r)
	}
}

#[cfg(test)]
mod tests {
	use std::cmp::{Ordering};
	use crate::engine::{varn, Runtime};
	use super::*;

	#[test]
	fn same_is_identity_not_structure() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let key = varn::sym("key")?;
			let a = Val::Tab(varn::tab_from_pairs(&[(key, Val::Int(1))]));
			let b = Val::Tab(varn::tab_from_pairs(&[(key, Val::Int(1))]));

			assert!(!a.same(&b));
			assert!(a == b);
			assert!(a.same(&a.clone()));

			Ok(())
		}).unwrap();
	}

	#[test]
	fn order_within_a_class() {
		let runtime = Runtime::new();
		runtime.run(|| {
			assert_eq!(Val::Int(1).order(&Val::Int(2)), Some(Ordering::Less));
			assert_eq!(Val::Bool(false).order(&Val::Bool(true)), Some(Ordering::Less));
			assert_eq!(Val::Nil.order(&Val::Nil), Some(Ordering::Equal));

			Ok(())
		}).unwrap();
	}

	#[test]
	fn order_across_classes_follows_the_classes() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let int_class = varn::class_of(&Val::Int(0));
			let bool_class = varn::class_of(&Val::Bool(true));

			let class_order = (*int_class).order(&bool_class);
			assert_eq!(Val::Int(0).order(&Val::Bool(true)), class_order);
			assert!(class_order.is_some());

			Ok(())
		}).unwrap();
	}

	#[test]
	fn zorder_rejects_unordered_pairs() {
		let runtime = Runtime::new();
		runtime.run(|| {
			let a = Val::Sym(varn::anon_sym("twin")?);
			let b = Val::Sym(varn::anon_sym("twin")?);

			assert_eq!(a.order(&b), None);
			assert!(a.zorder(&b).is_err());
			assert_eq!(a.zorder(&a.clone()).ok(), Some(Ordering::Equal));

			Ok(())
		}).unwrap();
	}
}
