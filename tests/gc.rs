use varn_engine::{varn, Runtime, Val, QUARANTINE_LEN};

//fills the quarantine ring with throwaway allocations, then forces a collection cycle.
//afterwards, every object allocated before the call which is neither rooted, immortal nor
//reachable has been freed, and the ring holds exactly QUARANTINE_LEN pad objects, so
//live_object_count() deltas between calls are exact.
fn flush_quarantine() {
	let key = match varn::sym("pad") {
		Ok(key) => key,
		Err(_) => panic!()
	};

	for _ in 0..QUARANTINE_LEN {
		varn::tab_from_pairs(&[(key, Val::Nil)]);
	}

	varn::gc();
}

#[test]
fn unrooted_objects_are_reclaimed() {
	let runtime = Runtime::new();
	runtime.run(|| {
		let key = varn::sym("payload")?;

		flush_quarantine();
		let base = varn::live_object_count();

		//dropping the only Root leaves the object protected only by the quarantine
		varn::tab_from_pairs(&[(key, Val::Int(1))]);
		flush_quarantine();
		assert_eq!(varn::live_object_count(), base);

		//a held Root survives any number of cycles
		let kept = varn::tab_from_pairs(&[(key, Val::Int(2))]);
		flush_quarantine();
		flush_quarantine();
		assert_eq!(varn::live_object_count(), base + 1);
		assert_eq!(kept.get(key), Some(Val::Int(2)));

		drop(kept);
		flush_quarantine();
		assert_eq!(varn::live_object_count(), base);

		Ok(())
	}).unwrap();
}

#[test]
fn reachable_interiors_survive() {
	let runtime = Runtime::new();
	runtime.run(|| {
		let key = varn::sym("inner")?;

		flush_quarantine();
		let base = varn::live_object_count();

		let tab = varn::tab_from_pairs(&[(key, Val::Int(7))]);
		let map = varn::map_from_pairs(&[(Val::Int(1), Val::Tab(tab.clone()))])?;
		drop(tab);

		//the tab's only remaining reference is the map's interior slot
		flush_quarantine();
		assert_eq!(varn::live_object_count(), base + 2);

		match map.get(&Val::Int(1))? {
			Some(Val::Tab(recovered)) => assert_eq!(recovered.get(key), Some(Val::Int(7))),
			_ => panic!()
		}

		drop(map);
		flush_quarantine();
		assert_eq!(varn::live_object_count(), base);

		Ok(())
	}).unwrap();
}

#[test]
fn immortalized_values_survive_without_roots() {
	let runtime = Runtime::new();
	runtime.run(|| {
		let key = varn::sym("eternal")?;

		flush_quarantine();
		let base = varn::live_object_count();

		let tab = varn::tab_from_pairs(&[(key, Val::Int(3))]);
		varn::immortalize(&Val::Tab(tab.clone()));
		drop(tab);

		flush_quarantine();
		flush_quarantine();
		assert_eq!(varn::live_object_count(), base + 1);

		Ok(())
	}).unwrap();
}

#[test]
fn rfn_state_is_traced() {
	let runtime = Runtime::new();
	runtime.run(|| {
		let key = varn::sym("counter")?;

		flush_quarantine();
		let base = varn::live_object_count();

		let rfn = varn::rfn(0, None, |_| Ok(Val::Nil));
		let tab = varn::tab_from_pairs(&[(key, Val::Int(9))]);
		let state_index = rfn.add_state(&Val::Tab(tab.clone()));
		drop(tab);

		//the state slot is the tab's only reference, and it's visible to the collector
		flush_quarantine();
		assert_eq!(varn::live_object_count(), base + 2);

		match rfn.state(state_index) {
			Val::Tab(recovered) => assert_eq!(recovered.get(key), Some(Val::Int(9))),
			_ => panic!()
		}

		drop(rfn);
		flush_quarantine();
		assert_eq!(varn::live_object_count(), base);

		Ok(())
	}).unwrap();
}

#[test]
fn classes_survive_collection_unrooted() {
	let runtime = Runtime::new();
	runtime.run(|| {
		//classes are immortal on creation: no Root needed
		let class = varn::data_class("persistent")?;
		let name = class.name();
		drop(class);

		flush_quarantine();
		flush_quarantine();

		let again = varn::data_class("persistent")?;
		assert_eq!(again.name(), name);

		Ok(())
	}).unwrap();
}
