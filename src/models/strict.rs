use serde_json::Value;

use crate::error::{Result, ScrapeError};

/**
Read-only view over a decoded JSON response.

Looking up a key that is not there is an error, never an empty placeholder.
The third party APIs we read are undocumented, so a renamed field should stop
the run at the first lookup instead of turning into "nothing available" later.
*/
#[derive(Debug, Clone)]
pub struct StrictMap<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> StrictMap<'a> {
    pub fn new(value: &'a Value) -> Self {
        StrictMap {
            value,
            path: String::new(),
        }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    /// Single key lookup on an object.
    pub fn get(&self, key: &str) -> Result<StrictMap<'a>> {
        let path = if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        };

        let Some(object) = self.value.as_object() else {
            return Err(ScrapeError::UnexpectedType {
                path: self.display_path(),
                expected: "an object",
            });
        };

        match object.get(key) {
            Some(value) => Ok(StrictMap { value, path }),
            None => Err(ScrapeError::MissingField(path)),
        }
    }

    /// For the few fields that are allowed to be absent. Absence has to be asked for.
    pub fn optional(&self, key: &str) -> Option<StrictMap<'a>> {
        self.get(key).ok()
    }

    /// Dotted lookup, e.g. `data.cRetailerWithSetting.data.retailer.id`.
    pub fn at(&self, dotted: &str) -> Result<StrictMap<'a>> {
        dotted
            .split('.')
            .try_fold(self.clone(), |current, key| current.get(key))
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn as_str(&self) -> Result<&'a str> {
        self.value.as_str().ok_or_else(|| self.wrong_type("a string"))
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.value.as_i64().ok_or_else(|| self.wrong_type("an integer"))
    }

    pub fn as_bool(&self) -> Result<bool> {
        self.value.as_bool().ok_or_else(|| self.wrong_type("a boolean"))
    }

    pub fn items(&self) -> Result<Vec<StrictMap<'a>>> {
        let array = self.value.as_array().ok_or_else(|| self.wrong_type("an array"))?;
        Ok(array
            .iter()
            .enumerate()
            .map(|(i, value)| StrictMap {
                value,
                path: format!("{}[{}]", self.path, i),
            })
            .collect())
    }

    /// Identifiers show up as either strings or numbers depending on the endpoint.
    pub fn as_id(&self) -> Result<String> {
        match self.value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(self.wrong_type("an identifier")),
        }
    }

    fn display_path(&self) -> String {
        if self.path.is_empty() {
            "<root>".to_string()
        } else {
            self.path.clone()
        }
    }

    fn wrong_type(&self, expected: &'static str) -> ScrapeError {
        ScrapeError::UnexpectedType {
            path: self.display_path(),
            expected,
        }
    }
}
