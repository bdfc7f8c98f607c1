//! Query-string encoding for `GET`/`HEAD` bodies.

// crates.io
use url::form_urlencoded;
// self
use crate::_prelude::*;

/// How array values are spelled in a query string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayFormat {
	/// `a=1&a=2`
	#[default]
	Repeat,
	/// `a[]=1&a[]=2`
	Brackets,
	/// `a[0]=1&a[1]=2`
	Indices,
	/// `a=1,2`
	Comma,
}

/// Serializer settings for turning a JSON object into a query string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamsEncoding {
	/// Array spelling.
	pub array_format: ArrayFormat,
	/// Use RFC 3986 percent-encoding (`%20`) instead of form encoding (`+`).
	pub strict: bool,
}
impl ParamsEncoding {
	/// Creates settings with the provided array format.
	pub fn new(array_format: ArrayFormat) -> Self {
		Self { array_format, strict: false }
	}

	/// Toggles RFC 3986 percent-encoding.
	pub fn with_strict(mut self, strict: bool) -> Self {
		self.strict = strict;

		self
	}

	/// Encodes `value` into `key=value` pairs joined by `&`.
	///
	/// Only objects produce output; `null` members are skipped and nested objects use bracket
	/// keys. Returns `None` when nothing remains to encode.
	pub fn encode(&self, value: &Value) -> Option<String> {
		let Value::Object(map) = value else {
			return None;
		};
		let mut pairs = Vec::new();

		for (key, value) in map {
			self.collect(key, value, &mut pairs);
		}

		if pairs.is_empty() {
			return None;
		}

		let encoded = pairs
			.iter()
			.map(|(key, value)| format!("{}={}", self.escape(key), self.escape(value)))
			.collect::<Vec<_>>()
			.join("&");

		Some(encoded)
	}

	fn collect(&self, key: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
		match value {
			Value::Null => {},
			Value::Bool(_) | Value::Number(_) | Value::String(_) =>
				if let Some(scalar) = scalar(value) {
					pairs.push((key.to_owned(), scalar));
				},
			Value::Array(items) => self.collect_array(key, items, pairs),
			Value::Object(map) =>
				for (child, value) in map {
					self.collect(&format!("{key}[{child}]"), value, pairs);
				},
		}
	}

	fn collect_array(&self, key: &str, items: &[Value], pairs: &mut Vec<(String, String)>) {
		match self.array_format {
			ArrayFormat::Repeat =>
				for item in items {
					self.collect(key, item, pairs);
				},
			ArrayFormat::Brackets =>
				for item in items {
					self.collect(&format!("{key}[]"), item, pairs);
				},
			ArrayFormat::Indices =>
				for (i, item) in items.iter().enumerate() {
					self.collect(&format!("{key}[{i}]"), item, pairs);
				},
			ArrayFormat::Comma => {
				// Only scalars can be comma-joined; structured items fall back to indices.
				if items.iter().all(|item| !item.is_array() && !item.is_object()) {
					let joined = items.iter().filter_map(scalar).collect::<Vec<_>>().join(",");

					if !joined.is_empty() {
						pairs.push((key.to_owned(), joined));
					}
				} else {
					for (i, item) in items.iter().enumerate() {
						self.collect(&format!("{key}[{i}]"), item, pairs);
					}
				}
			},
		}
	}

	fn escape(&self, raw: &str) -> String {
		let encoded = form_urlencoded::byte_serialize(raw.as_bytes()).collect::<String>();

		if self.strict {
			encoded.replace('+', "%20").replace('*', "%2A").replace("%7E", "~")
		} else {
			encoded
		}
	}
}

fn scalar(value: &Value) -> Option<String> {
	match value {
		Value::Bool(b) => Some(b.to_string()),
		Value::Number(n) => Some(n.to_string()),
		Value::String(s) => Some(s.clone()),
		_ => None,
	}
}
