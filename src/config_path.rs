//! Dot-path updates for nested JSON configuration documents.
//!
//! `set_path(doc, "channel_config.retry_policy_config.max_interval", 3000.into())` walks the
//! keys, creating any missing intermediate object (and replacing any non-object one), then sets
//! the final key. Arrays are treated as leaves: a path never indexes into them.

// self
use crate::_prelude::*;

/// Errors produced while parsing a dot path.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PathError {
	/// Path was empty.
	#[error("Config path cannot be empty.")]
	Empty,
	/// Path contained an empty segment (`a..b`, `.a`, `a.`).
	#[error("Config path `{path}` contains an empty segment.")]
	EmptySegment {
		/// Offending path.
		path: String,
	},
}

/// Sets `value` at `path` inside `document`, creating intermediate objects as needed.
pub fn set_path(document: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
	let keys = split(path)?;

	set_in(document, &keys, value);

	Ok(())
}

/// Copy-on-write variant of [`set_path`]; `document` is left untouched.
pub fn with_path(document: &Value, path: &str, value: Value) -> Result<Value, PathError> {
	let mut updated = document.clone();

	set_path(&mut updated, path, value)?;

	Ok(updated)
}

/// Reads the value at `path`, if every segment resolves to an object key.
pub fn get_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
	split(path).ok()?.into_iter().try_fold(document, |current, key| current.as_object()?.get(key))
}

fn split(path: &str) -> Result<Vec<&str>, PathError> {
	if path.is_empty() {
		return Err(PathError::Empty);
	}

	let keys = path.split('.').collect::<Vec<_>>();

	if keys.iter().any(|key| key.is_empty()) {
		return Err(PathError::EmptySegment { path: path.to_owned() });
	}

	Ok(keys)
}

fn set_in(target: &mut Value, keys: &[&str], value: Value) {
	let Some((key, rest)) = keys.split_first() else {
		*target = value;

		return;
	};

	if !target.is_object() {
		*target = Value::Object(Default::default());
	}
	if let Value::Object(map) = target {
		set_in(map.entry(*key).or_insert(Value::Null), rest, value);
	}
}
