use serde::Serialize;
use serde_json::Value;

/// Shape summary of one raw primary search response, for checking the upstream
/// contract from a browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub status: u16,
    pub response_keys: Vec<String>,
    pub data_length: Option<usize>,
    pub first_item_keys: Option<Vec<String>>,
    pub first_item: Option<Value>,
    pub pagination: Option<Value>,
}

impl ProbeReport {
    pub fn from_raw(status: u16, body: &Value) -> Self {
        let data = body.get("data").and_then(Value::as_array);
        let first_item = data.and_then(|d| d.first()).cloned();
        Self {
            status,
            response_keys: object_keys(body).unwrap_or_default(),
            data_length: data.map(Vec::len),
            first_item_keys: first_item.as_ref().and_then(object_keys),
            first_item,
            pagination: body.get("pagination_info").cloned(),
        }
    }
}

fn object_keys(value: &Value) -> Option<Vec<String>> {
    value.as_object().map(|o| o.keys().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn summarizes_search_body() {
        let body = json!({
            "data": [{ "opportunity_id": 1, "summary": {} }],
            "message": "Success",
            "pagination_info": { "total_records": 1 }
        });
        let report = ProbeReport::from_raw(200, &body);
        assert_eq!(report.status, 200);
        assert_eq!(report.response_keys, vec!["data", "message", "pagination_info"]);
        assert_eq!(report.data_length, Some(1));
        assert_eq!(
            report.first_item_keys,
            Some(vec!["opportunity_id".to_string(), "summary".to_string()])
        );
        assert_eq!(report.pagination, Some(json!({ "total_records": 1 })));
    }

    #[test]
    fn tolerates_error_bodies() {
        let report = ProbeReport::from_raw(401, &json!({ "message": "unauthorized" }));
        assert_eq!(report.data_length, None);
        assert_eq!(report.first_item, None);
        assert_eq!(report.first_item_keys, None);
        assert_eq!(report.pagination, None);
    }
}
