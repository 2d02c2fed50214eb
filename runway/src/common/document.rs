use crate::common::Value;
use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use im::OrdMap;
use std::fmt::{Debug, Display, Formatter};

/// A document of the target store.
///
/// Documents are ordered key-value maps backed by `im::OrdMap`, so cloning
/// is O(1) and a snapshot of a whole collection can be taken without
/// copying its documents. Keys are kept sorted, which makes the
/// [Display] rendering deterministic.
#[derive(Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: OrdMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Associates the value with the key, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the key is empty.
    pub fn put<T: Into<Value>>(&mut self, key: &str, value: T) -> RunwayResult<()> {
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(RunwayError::new(
                "Document does not support empty key",
                ErrorKind::ValidationError,
            ));
        }
        self.data.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    /// Reads a required string field.
    pub fn get_str(&self, key: &str) -> RunwayResult<&str> {
        self.required(key)?
            .as_str()
            .ok_or_else(|| Self::type_error(key, "string"))
    }

    /// Reads a required integer field.
    pub fn get_i64(&self, key: &str) -> RunwayResult<i64> {
        self.required(key)?
            .as_i64()
            .ok_or_else(|| Self::type_error(key, "i64"))
    }

    /// Reads a required boolean field.
    pub fn get_bool(&self, key: &str) -> RunwayResult<bool> {
        self.required(key)?
            .as_bool()
            .ok_or_else(|| Self::type_error(key, "bool"))
    }

    /// Reads an optional string field; `null` and a missing key both yield `None`.
    pub fn get_optional_str(&self, key: &str) -> RunwayResult<Option<&str>> {
        match self.data.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(Self::type_error(key, "string")),
        }
    }

    fn required(&self, key: &str) -> RunwayResult<&Value> {
        self.data.get(key).ok_or_else(|| {
            RunwayError::new(
                &format!("Document is missing required field '{}'", key),
                ErrorKind::ValidationError,
            )
        })
    }

    fn type_error(key: &str, expected: &str) -> RunwayError {
        RunwayError::new(
            &format!("Field '{}' is not of type {}", key, expected),
            ErrorKind::ValidationError,
        )
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (index, (key, value)) in self.data.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Document{}", self)
    }
}

/// Builds a [Document] from `"key": value` pairs.
///
/// # Examples
///
/// ```rust
/// use runway::doc;
///
/// let doc = doc! { "name": "Alice", "age": 30 };
/// assert_eq!(doc.get_str("name").unwrap(), "Alice");
/// assert_eq!(doc.get_i64("age").unwrap(), 30);
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::common::Document::new()
    };

    ($($key:literal : $value:expr),* $(,)?) => {
        {
            let mut doc = $crate::common::Document::new();
            $(
                doc.put($key, $crate::common::Value::from($value))
                    .expect(&format!("Failed to put value for key {}", $key));
            )*
            doc
        }
    };
}
