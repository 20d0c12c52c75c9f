use json_patch::{jsonptr::PointerBuf, AddOperation, Patch, PatchOperation, ReplaceOperation};
use serde_json::Value;
use std::collections::BTreeMap;

/// Builds a JSON patch that sets each of `added` on an object whose current
/// annotations are `target`.
///
/// An `add` to a child of a missing map is rejected by JSON Patch, so when the
/// object has no annotations the whole map is added at `/metadata/annotations`.
/// Otherwise each key is replaced in place. Operations follow key order.
pub fn annotations_patch(
    target: Option<&BTreeMap<String, String>>,
    added: &BTreeMap<String, String>,
) -> Patch {
    if added.is_empty() {
        return Patch(Vec::new());
    }

    match target {
        Some(annotations) if !annotations.is_empty() => Patch(
            added
                .iter()
                .map(|(key, value)| {
                    PatchOperation::Replace(ReplaceOperation {
                        path: PointerBuf::from_tokens(["metadata", "annotations", key.as_str()]),
                        value: Value::String(value.clone()),
                    })
                })
                .collect(),
        ),

        _ => Patch(vec![PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["metadata", "annotations"]),
            value: Value::Object(
                added
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        })]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn added() -> BTreeMap<String, String> {
        [("status-key".to_string(), "mutated".to_string())]
            .into_iter()
            .collect()
    }

    #[test]
    fn adds_map_when_annotations_missing() {
        let patch = annotations_patch(None, &added());
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{
                "op": "add",
                "path": "/metadata/annotations",
                "value": { "status-key": "mutated" },
            }])
        );
    }

    #[test]
    fn adds_map_when_annotations_empty() {
        let patch = annotations_patch(Some(&BTreeMap::new()), &added());
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{
                "op": "add",
                "path": "/metadata/annotations",
                "value": { "status-key": "mutated" },
            }])
        );
    }

    #[test]
    fn replaces_key_when_annotations_present() {
        let target = [("app".to_string(), "web".to_string())]
            .into_iter()
            .collect();
        let patch = annotations_patch(Some(&target), &added());
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{
                "op": "replace",
                "path": "/metadata/annotations/status-key",
                "value": "mutated",
            }])
        );
    }

    #[test]
    fn escapes_annotation_keys() {
        let target = [("app".to_string(), "web".to_string())]
            .into_iter()
            .collect();
        let added = [("example.com/a~b".to_string(), "v".to_string())]
            .into_iter()
            .collect();
        let patch = annotations_patch(Some(&target), &added);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{
                "op": "replace",
                "path": "/metadata/annotations/example.com~1a~0b",
                "value": "v",
            }])
        );
    }

    #[test]
    fn multiple_keys_are_ordered() {
        let added = [
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ]
        .into_iter()
        .collect::<BTreeMap<_, _>>();

        let patch = annotations_patch(None, &added);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{ "op": "add", "path": "/metadata/annotations", "value": { "a": "1", "b": "2" } }])
        );

        let target = [("x".to_string(), "y".to_string())]
            .into_iter()
            .collect();
        let patch = annotations_patch(Some(&target), &added);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([
                { "op": "replace", "path": "/metadata/annotations/a", "value": "1" },
                { "op": "replace", "path": "/metadata/annotations/b", "value": "2" },
            ])
        );
    }

    #[test]
    fn nothing_added_is_empty_patch() {
        assert!(annotations_patch(None, &BTreeMap::new()).0.is_empty());
    }
}
