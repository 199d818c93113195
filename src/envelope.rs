use serde_json::Value;

use crate::error::ValidatorError;

/// Hits of a search response: `data.hits`.
pub fn unwrap_hits(response: Value) -> Result<Vec<Value>, ValidatorError> {
    let Value::Object(mut root) = response else {
        return Err(envelope_error("an object with data.hits"));
    };
    let Some(Value::Object(mut data)) = root.remove("data") else {
        return Err(envelope_error("data.hits"));
    };
    if let Some(total) = data
        .get("pagination")
        .and_then(|value| value.get("total"))
        .and_then(Value::as_u64)
    {
        let returned = data
            .get("hits")
            .and_then(Value::as_array)
            .map(|hits| hits.len() as u64)
            .unwrap_or(0);
        if total > returned {
            tracing::warn!(total, returned, "GDC response truncated by page size");
        }
    }
    match data.remove("hits") {
        Some(Value::Array(hits)) => Ok(hits),
        _ => Err(envelope_error("data.hits")),
    }
}

/// Donors of a survival analysis response: `results[0].donors`.
pub fn unwrap_donors(response: Value) -> Result<Vec<Value>, ValidatorError> {
    let Value::Object(mut root) = response else {
        return Err(envelope_error("an object with results[0].donors"));
    };
    let Some(Value::Array(results)) = root.remove("results") else {
        return Err(envelope_error("results[0].donors"));
    };
    let Some(Value::Object(mut first)) = results.into_iter().next() else {
        return Err(envelope_error("results[0].donors"));
    };
    match first.remove("donors") {
        Some(Value::Array(donors)) => Ok(donors),
        _ => Err(envelope_error("results[0].donors")),
    }
}

fn envelope_error(expected: &str) -> ValidatorError {
    ValidatorError::Envelope {
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn unwraps_search_hits() {
        let hits = unwrap_hits(json!({"data": {"hits": [{"id": 1}, {"id": 2}]}})).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn rejects_wrong_envelope() {
        assert_matches!(
            unwrap_hits(json!({"results": []})),
            Err(ValidatorError::Envelope { .. })
        );
        assert_matches!(
            unwrap_donors(json!({"results": []})),
            Err(ValidatorError::Envelope { .. })
        );
    }

    #[test]
    fn unwraps_survival_donors() {
        let donors =
            unwrap_donors(json!({"results": [{"donors": [{"time": 10.0}]}]})).unwrap();
        assert_eq!(donors[0]["time"], json!(10.0));
    }
}
