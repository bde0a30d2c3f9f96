use std::cell::{RefCell};
use std::cmp::{Ordering};
use std::io::{self, Write};
use std::rc::{Rc};
use varn_engine::{bail, prn, varn, Root, Runtime, Val};

#[test]
fn records_and_dispatch_end_to_end() {
	let runtime = Runtime::new();
	runtime.run(|| {
		let point = varn::data_class("point")?;
		let x = varn::sym("x")?;
		let y = varn::sym("y")?;

		//class-side constructor: (point make 3 4)
		let make = varn::rfn(3, Some(3), |args| {
			let class = args[0].unwrap_class();
			let x = varn::sym("x")?;
			let y = varn::sym("y")?;

			let data = varn::tab_from_pairs(&[
				(x, args[1].clone()),
				(y, args[2].clone())
			]);
			Ok(Val::Obj(varn::obj_new(&class, &data, None)?))
		});
		varn::class_add_class_method(&point, "make", &make)?;

		//instance method: squared distance from the origin
		let magnitude2 = varn::rfn(1, Some(1), |args| {
			let data = varn::obj_data(&args[0].unwrap_obj(), None)?;
			let x = varn::sym("x")?;
			let y = varn::sym("y")?;

			match (data.get(x), data.get(y)) {
				(Some(Val::Int(x)), Some(Val::Int(y))) => Ok(Val::Int(x * x + y * y)),
				_ => bail!("malformed point")
			}
		});
		varn::class_add_method(&point, "magnitude2", &magnitude2)?;

		let class_val = Val::Class(point.clone());
		let obj = varn::dispatch(&class_val, "make", &[Val::Int(3), Val::Int(4)])?;

		assert!(varn::has_class(&obj, &point));
		assert!(varn::has_class(&obj, &varn::record_class()));
		assert!(varn::has_class(&obj, &varn::root_class()));

		assert_eq!(varn::dispatch(&obj, "magnitude2", &[])?, Val::Int(25));

		//record instances with equal payloads are equal, and equal to nothing else
		let twin = varn::dispatch(&class_val, "make", &[Val::Int(3), Val::Int(4)])?;
		let other = varn::dispatch(&class_val, "make", &[Val::Int(5), Val::Int(12)])?;
		assert!(obj == twin && !obj.same(&twin));
		assert!(obj != other);

		let data = varn::obj_data(&obj.unwrap_obj(), None)?;
		assert_eq!(data.get(x), Some(Val::Int(3)));
		assert_eq!(data.get(y), Some(Val::Int(4)));

		Ok(())
	}).unwrap();
}

#[test]
fn values_order_across_classes() {
	let runtime = Runtime::new();
	runtime.run(|| {
		let point = varn::data_class("point")?;
		let obj = Val::Obj(varn::obj_new(&point, &varn::empty_tab(), None)?);

		//core classes order before data classes, so every int orders before every record
		assert_eq!(Val::Int(1_000_000).order(&obj), Some(Ordering::Less));
		assert_eq!(obj.order(&Val::Int(-1)), Some(Ordering::Greater));
		assert_eq!(obj.zorder(&Val::Int(0))?, Ordering::Greater);

		//equal-text anonymous symbols are the canonical unordered pair
		let a = Val::Sym(varn::anon_sym("phantom")?);
		let b = Val::Sym(varn::anon_sym("phantom")?);
		assert_eq!(a.order(&b), None);
		assert!(a.zorder(&b).is_err());

		Ok(())
	}).unwrap();
}

#[test]
fn maps_nest_and_compare_through_vals() {
	let runtime = Runtime::new();
	runtime.run(|| {
		let inner = varn::map_from_pairs(&[(Val::Int(1), Val::Bool(true))])?;
		let outer = varn::map_from_pairs(&[
			(Val::Int(10), Val::Map(inner.clone())),
			(Val::Int(20), Val::Nil)
		])?;

		match outer.get(&Val::Int(10))? {
			Some(Val::Map(recovered)) => {
				assert_eq!(recovered.get(&Val::Int(1))?, Some(Val::Bool(true)));
				assert!(Root::ptr_eq(&recovered, &inner));
			}
			_ => panic!()
		}

		//structurally equal maps built separately compare Equal as Vals
		let rebuilt = varn::map_from_pairs(&[(Val::Int(1), Val::Bool(true))])?;
		assert_eq!(Val::Map(inner).order(&Val::Map(rebuilt)), Some(Ordering::Equal));

		Ok(())
	}).unwrap();
}

struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.borrow_mut().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

#[test]
fn pr_output_is_redirectable() {
	let buf = Rc::new(RefCell::new(Vec::new()));

	let runtime = Runtime::new();
	runtime.run(|| {
		varn::set_pr_writer(Box::new(SharedBuf(Rc::clone(&buf))));

		let score = varn::sym("score")?;
		prn!("{} is {}", score, Val::Int(42));

		Ok(())
	}).unwrap();

	assert_eq!(&*buf.borrow(), b"score is 42\n");
}

#[test]
fn roots_move_freely_between_run_calls() {
	let runtime = Runtime::new();

	let kept = runtime.run(|| {
		let key = varn::sym("held")?;
		Ok(varn::tab_from_pairs(&[(key, Val::Int(1))]))
	}).unwrap();

	//a Root stays valid between activations of its own runtime, but it must be dropped
	//while the runtime is active
	runtime.run(|| {
		let key = varn::sym("held")?;
		assert_eq!(kept.get(key), Some(Val::Int(1)));

		varn::gc();
		assert_eq!(kept.get(key), Some(Val::Int(1)));

		drop(kept);
		Ok(())
	}).unwrap();
}
