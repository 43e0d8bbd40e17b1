//! Type-erased extension map for AppState
//!
//! Feature crates (token issuer, admin) register their own state here so the
//! core `AppState` does not depend on them.

use std::any::{Any, TypeId};
use std::collections::HashMap;

pub struct Extensions {
	map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
	pub fn new() -> Self {
		Self { map: HashMap::new() }
	}

	/// Registers a value, replacing any earlier value of the same type
	pub fn insert<T: Send + Sync + 'static>(&mut self, val: T) -> Option<T> {
		self.map
			.insert(TypeId::of::<T>(), Box::new(val))
			.and_then(|old| old.downcast::<T>().ok())
			.map(|old| *old)
	}

	pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
		self.map.get(&TypeId::of::<T>())?.downcast_ref::<T>()
	}

	pub fn len(&self) -> usize {
		self.map.len()
	}

	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}
}

impl Default for Extensions {
	fn default() -> Self {
		Self::new()
	}
}


// vim: ts=4
