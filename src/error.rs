use std::error::{Error};
use std::fmt::{self, Debug, Display, Formatter};

/**
The return type of any operation which can fail with a [`VError`](struct.VError.html).
*/
pub type VResult<T> = Result<T, VError>;

/**
The error type produced by this crate.

`VError`s represent API misuse: an unbound method, an argument-count mismatch, an attempt
to order two incomparable values, and so on. The evaluator layer treats them as fatal.
Internal invariant violations (capacity limits, corrupted bookkeeping) panic instead.
*/

pub struct VError {
	msg: String
}

impl VError {
	pub fn new<S: Into<String>>(msg: S) -> VError {
		VError { msg: msg.into() }
	}

	pub fn msg(&self) -> &str {
		&self.msg
	}
}

impl Display for VError {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}", self.msg)
	}
}

impl Debug for VError {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "VError({:?})", self.msg)
	}
}

impl Error for VError {}

/**
Constructs a [`VError`](struct.VError.html) from a format string.
*/
#[macro_export]
macro_rules! error {
	() => (
		$crate::VError::new("explicit error")
	);
	($fmt:literal) => (
		$crate::VError::new($fmt)
	);
	($fmt:literal, $($arg:tt)+) => (
		$crate::VError::new(format!($fmt, $($arg)+))
	);
}

/**
Returns early with an `Err(VError)` built from a format string.
*/
#[macro_export]
macro_rules! bail {
	() => (
		return Err($crate::error!())
	);
	($fmt:literal) => (
		return Err($crate::error!($fmt))
	);
	($fmt:literal, $($arg:tt)+) => (
		return Err($crate::error!($fmt, $($arg)+))
	);
}

/**
Returns early with an `Err(VError)` when the given condition is false.
*/
#[macro_export]
macro_rules! ensure {
	($cond:expr) => (
		if !($cond) {
			$crate::bail!("ensure!({}) failed", stringify!($cond))
		}
	);
	($cond:expr, $($arg:tt)+) => (
		if !($cond) {
			$crate::bail!($($arg)+)
		}
	);
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fallible(limit: usize, n: usize) -> VResult<usize> {
		ensure!(n <= limit, "{} exceeds the limit {}", n, limit);
		Ok(n)
	}

	#[test]
	fn ensure_formats_its_message() {
		assert_eq!(fallible(10, 3).ok(), Some(3));

		let err = match fallible(10, 11) {
			Err(err) => err,
			Ok(_) => panic!()
		};
		assert_eq!(err.msg(), "11 exceeds the limit 10");
	}
}
