//! Response envelope shared by every materializer entry point.

use serde::{Deserialize, Serialize};

/// Completion status. Failures surface as errors, so only `OK` is ever
/// serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Completed.
    #[default]
    #[serde(rename = "OK")]
    Ok,
}

/// `{ "data": <payload|null>, "status": "OK" }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    pub data: Option<T>,
    pub status: Status,
}

impl<T> Response<T> {
    /// Response carrying `data`.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            status: Status::Ok,
        }
    }

    /// Response with a null payload.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            data: None,
            status: Status::Ok,
        }
    }
}

impl<T> Response<Vec<T>> {
    /// Null payload when `items` is empty.
    #[must_use]
    pub fn from_set(items: Vec<T>) -> Self {
        if items.is_empty() {
            Self::empty()
        } else {
            Self::ok(items)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_string(&Response::ok(vec![1, 2])).unwrap();
        assert_eq!(json, r#"{"data":[1,2],"status":"OK"}"#);

        let json = serde_json::to_string(&Response::<Vec<u64>>::from_set(vec![])).unwrap();
        assert_eq!(json, r#"{"data":null,"status":"OK"}"#);
    }
}
