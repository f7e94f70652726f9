//! Provider response normalization.
//!
//! Every provider names its fields differently (`title` or `name`, `content`
//! or `description` or `summary`, ...). Instead of scattering fallbacks
//! across call sites, each provider registers one normalizer in
//! [`PROVIDERS`], looked up by provider id from the configuration.
//!
//! | Provider | Items | Type tag |
//! |----------|-------|----------|
//! | `mevzuat` | legislation search / dataset | `mevzuat` |
//! | `yargi` | court decisions (Yargıtay, Danıştay, emsal) | `yargi` |

use serde_json::Value;

use crate::error::SourceError;
use crate::models::ResultItem;

/// Converts one provider-shaped JSON item into a [`ResultItem`].
///
/// `index` is the item's position in the response, used to synthesize an id.
pub type Normalizer = fn(&Value, usize, &str) -> ResultItem;

/// A registered provider.
pub struct Provider {
    pub id: &'static str,
    pub normalize: Normalizer,
}

pub const PROVIDERS: &[Provider] = &[
    Provider {
        id: "mevzuat",
        normalize: normalize_mevzuat,
    },
    Provider {
        id: "yargi",
        normalize: normalize_yargi,
    },
];

pub fn lookup(id: &str) -> Option<&'static Provider> {
    PROVIDERS.iter().find(|p| p.id == id)
}

pub fn provider_ids() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.id).collect()
}

const UNTITLED: &str = "Başlık bulunamadı";

/// Pull the item array out of any of the response shapes providers use:
/// `{"data":{"results":[..]}}`, `{"results":[..]}`, `{"data":[..]}` or a
/// bare array.
pub fn extract_items(body: &Value) -> Result<&[Value], SourceError> {
    let candidates = [
        body.pointer("/data/results"),
        body.get("results"),
        body.get("data"),
        Some(body),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_array())
        .map(|a| a.as_slice())
        .ok_or_else(|| SourceError::Malformed("no result array in response".to_string()))
}

/// Normalize every item of `body` with the given provider.
///
/// `id_prefix` is used for synthesized ids (`<prefix>-<index>`).
pub fn normalize_response(
    provider: &Provider,
    body: &Value,
    id_prefix: &str,
) -> Result<Vec<ResultItem>, SourceError> {
    let items = extract_items(body)?;
    Ok(items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.is_object())
        .map(|(i, item)| (provider.normalize)(item, i, id_prefix))
        .collect())
}

/// First non-empty string among `keys`. Numbers are stringified.
fn first_str(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match item.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn first_f64(item: &Value, keys: &[&str]) -> f64 {
    keys.iter()
        .find_map(|k| item.get(*k).and_then(Value::as_f64))
        .unwrap_or(0.0)
}

fn synthesized_id(item: &Value, index: usize, id_prefix: &str) -> String {
    first_str(item, &["id"]).unwrap_or_else(|| format!("{}-{}", id_prefix, index))
}

fn normalize_mevzuat(item: &Value, index: usize, id_prefix: &str) -> ResultItem {
    ResultItem {
        id: synthesized_id(item, index, id_prefix),
        title: first_str(item, &["title", "name"]).unwrap_or_else(|| UNTITLED.to_string()),
        content: first_str(item, &["content", "description", "summary"]).unwrap_or_default(),
        date: first_str(item, &["date", "publication_date"]),
        item_type: first_str(item, &["type"]).unwrap_or_else(|| "mevzuat".to_string()),
        url: first_str(item, &["url", "link"]),
        relevance: first_f64(item, &["relevance", "score"]),
    }
}

fn normalize_yargi(item: &Value, index: usize, id_prefix: &str) -> ResultItem {
    let mut title = first_str(item, &["title", "name"]);
    if title.is_none() {
        // Decisions without a title are identified by court and docket numbers.
        let court = first_str(item, &["court", "daire", "department"]);
        let esas = first_str(item, &["esas_no", "case_number"]);
        let karar = first_str(item, &["karar_no"]);
        let parts: Vec<String> = [
            court,
            esas.map(|e| format!("E. {}", e)),
            karar.map(|k| format!("K. {}", k)),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !parts.is_empty() {
            title = Some(parts.join(" "));
        }
    }

    ResultItem {
        id: synthesized_id(item, index, id_prefix),
        title: title.unwrap_or_else(|| UNTITLED.to_string()),
        content: first_str(item, &["summary", "content", "description"]).unwrap_or_default(),
        date: first_str(item, &["decision_date", "date"]),
        item_type: first_str(item, &["type", "category"]).unwrap_or_else(|| "yargi".to_string()),
        url: first_str(item, &["url", "link"]),
        relevance: first_f64(item, &["relevance", "score"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mevzuat() -> &'static Provider {
        lookup("mevzuat").unwrap()
    }

    #[test]
    fn test_extract_accepts_all_shapes() {
        let nested = json!({"data": {"results": [{"id": "a"}]}});
        let flat = json!({"results": [{"id": "a"}]});
        let data_array = json!({"data": [{"id": "a"}]});
        let bare = json!([{"id": "a"}]);
        for body in [nested, flat, data_array, bare] {
            assert_eq!(extract_items(&body).unwrap().len(), 1, "{}", body);
        }
    }

    #[test]
    fn test_extract_rejects_non_array() {
        let body = json!({"message": "Workflow was started"});
        assert!(matches!(extract_items(&body), Err(SourceError::Malformed(_))));
    }

    #[test]
    fn test_mevzuat_alternate_field_names() {
        let body = json!([{
            "name": "İş Kanunu",
            "description": "4857 sayılı kanun",
            "publication_date": "2003-06-10",
            "link": "https://example.test/4857",
            "score": 0.7
        }]);
        let items = normalize_response(mevzuat(), &body, "result").unwrap();
        let item = &items[0];
        assert_eq!(item.id, "result-0");
        assert_eq!(item.title, "İş Kanunu");
        assert_eq!(item.content, "4857 sayılı kanun");
        assert_eq!(item.date.as_deref(), Some("2003-06-10"));
        assert_eq!(item.url.as_deref(), Some("https://example.test/4857"));
        assert_eq!(item.item_type, "mevzuat");
        assert!((item.relevance - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_ids_are_never_empty() {
        let body = json!([{"id": "", "title": "a"}, {"id": 42, "title": "b"}, {"title": "c"}]);
        let items = normalize_response(mevzuat(), &body, "result").unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["result-0", "42", "result-2"]);
    }

    #[test]
    fn test_yargi_title_from_docket_numbers() {
        let body = json!({"data": {"results": [{
            "id": "y1",
            "court": "Yargıtay 9. Hukuk Dairesi",
            "esas_no": "2021/1234",
            "karar_no": "2022/567",
            "decision_date": "2022-03-01",
            "summary": "Kıdem tazminatı"
        }]}});
        let items = normalize_response(lookup("yargi").unwrap(), &body, "result").unwrap();
        assert_eq!(items[0].title, "Yargıtay 9. Hukuk Dairesi E. 2021/1234 K. 2022/567");
        assert_eq!(items[0].content, "Kıdem tazminatı");
        assert_eq!(items[0].date.as_deref(), Some("2022-03-01"));
        assert_eq!(items[0].item_type, "yargi");
    }

    #[test]
    fn test_non_object_items_are_skipped() {
        let body = json!([{"title": "a"}, "junk", 3]);
        let items = normalize_response(mevzuat(), &body, "result").unwrap();
        assert_eq!(items.len(), 1);
    }
}
