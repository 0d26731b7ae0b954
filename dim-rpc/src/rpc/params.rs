//! Request parameter merging.
//!
//! Parameters arrive in the path, the query string and the body (JSON or
//! form encoded). They are merged into one flat map; path parameters win
//! over body fields, which win over the query string.

use serde_json::{Map, Value};

use crate::error::{GatewayError, Result};

#[derive(Debug, Default, Clone)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn from_parts(
        path: &[(&str, &str)],
        query: Option<&str>,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<Self> {
        let mut params = Map::new();

        if let Some(query) = query {
            merge_form(&mut params, query.as_bytes());
        }

        if !body.is_empty() {
            let is_form = content_type
                .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
                .unwrap_or(false);

            if is_form {
                merge_form(&mut params, body);
            } else {
                match serde_json::from_slice::<Value>(body) {
                    Ok(Value::Object(fields)) => params.extend(fields),
                    Ok(_) => {
                        return Err(GatewayError::Validation(
                            "request body must be a JSON object".to_string(),
                        ))
                    }
                    Err(e) => {
                        return Err(GatewayError::Validation(format!(
                            "request body is not valid JSON: {e}"
                        )))
                    }
                }
            }
        }

        for (name, value) in path {
            params.insert(name.to_string(), Value::String(value.to_string()));
        }

        Ok(Self(params))
    }

    /// A parameter as a string. Numbers and booleans are stringified.
    pub fn string(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// A non-empty string parameter, or a validation error naming it.
    pub fn required(&self, name: &str) -> Result<String> {
        self.string(name)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::Validation(format!("missing {name}")))
    }

    /// An unsigned integer given as a JSON number or a numeric string.
    pub fn u64(&self, name: &str) -> Result<Option<u64>> {
        let invalid = || GatewayError::Validation(format!("{name} must be an unsigned integer"));

        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(invalid),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid()),
            Some(_) => Err(invalid()),
        }
    }
}

fn merge_form(params: &mut Map<String, Value>, input: &[u8]) {
    for (name, value) in url::form_urlencoded::parse(input) {
        params.insert(name.into_owned(), Value::String(value.into_owned()));
    }
}
