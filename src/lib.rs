#![cfg_attr(not(feature = "unsafe-internals"), forbid(unsafe_code))]

/*!
The runtime core of the Varn object language.

The crate provides a garbage-collected heap, an interned-symbol registry, a
single-inheritance class system with cached method dispatch, and two immutable
collections: the sorted [`Map`](struct.Map.html) and the symbol-indexed
[`Tab`](struct.Tab.html).

Construct a [`Runtime`](struct.Runtime.html), then call its operations through the
free functions in the [`varn` module](varn/index.html) from within
[`Runtime::run`](struct.Runtime.html#method.run):

```no_run
use varn_engine::{prn, varn, Runtime, Val};

let runtime = Runtime::new();
runtime.run(|| {
	let point = varn::data_class("point")?;
	let x = varn::sym("x")?;

	let data = varn::tab_from_pairs(&[(x, Val::Int(3))]);
	let obj = varn::obj_new(&point, &data, None)?;

	prn!("{}", Val::Obj(obj));
	Ok(())
});
```

By default the crate contains no `unsafe` code: heap references are reference-counted
`Rc`s under the hood. The `"unsafe-internals"` feature switches them to raw pointers,
trading that safety margin for performance.
*/

#[macro_use]
mod error;

#[macro_use]
mod engine;

mod class;
mod collections;
mod gc;
mod val;

pub use self::class::{Class, ClassCategory, Obj, RFn};
pub use self::collections::{Map, MapFind, Tab};
pub use self::engine::{varn, EprWriter, PrWriter, Runtime, Sym, ToSym};
pub use self::error::{VError, VResult};
pub use self::gc::{Root, ALLOCATIONS_PER_GC, MAX_IMMORTALS, QUARANTINE_LEN};
pub use self::val::{Val};

#[doc(hidden)]
pub use self::engine::{Engine, EngineBuilder};

#[doc(hidden)]
pub use self::gc::{Allocate, Slot};
