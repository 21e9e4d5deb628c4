use url::Url;

use super::{Object, Reference};

/// Every property that addresses recipients.
pub const ADDRESSING_PROPERTIES: [&str; 5] = ["to", "bto", "cc", "bcc", "audience"];

/// Addressing properties considered by inbox forwarding. Hidden recipients never are.
pub const FORWARDING_PROPERTIES: [&str; 3] = ["to", "cc", "audience"];

const HIDDEN_PROPERTIES: [&str; 2] = ["bto", "bcc"];

const PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";

/// Whether `iri` is the public collection, in full or compacted form.
#[must_use]
pub fn is_public(iri: &str) -> bool {
    iri == PUBLIC || iri == "Public" || iri == "as:Public"
}

fn collect(object: &Object, properties: &[&str]) -> Vec<Url> {
    let mut out: Vec<Url> = Vec::new();
    for property in properties {
        for iri in object.iris(property) {
            if !is_public(iri.as_str()) && !out.contains(&iri) {
                out.push(iri);
            }
        }
    }
    out
}

/// All addressed IRIs except the public collection, first occurrence first.
#[must_use]
pub fn recipients(object: &Object) -> Vec<Url> {
    collect(object, &ADDRESSING_PROPERTIES)
}

/// Addressed IRIs eligible for inbox forwarding.
#[must_use]
pub fn forwarding_recipients(object: &Object) -> Vec<Url> {
    collect(object, &FORWARDING_PROPERTIES)
}

/// Remove `bto` and `bcc` from the value and from every embedded `object`.
pub fn strip_hidden_recipients(object: &mut Object) {
    for property in HIDDEN_PROPERTIES {
        object.remove(property);
    }
    if !object.has("object") {
        return;
    }
    let stripped = object
        .references("object")
        .into_iter()
        .map(|reference| match reference {
            Reference::Embedded(mut inner) => {
                for property in HIDDEN_PROPERTIES {
                    inner.remove(property);
                }
                Reference::Embedded(inner)
            }
            iri => iri,
        })
        .collect();
    object.set_references("object", stripped);
}

/// Make a Create and its embedded objects carry the same recipients.
///
/// Each addressing property becomes the union of the activity's values and
/// every embedded object's values.
pub fn normalize_recipients(create: &mut Object) {
    let mut objects: Vec<Reference> = create.references("object");
    for property in ADDRESSING_PROPERTIES {
        let mut merged: Vec<Reference> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        let mut push = |reference: Reference| {
            let key = reference
                .id()
                .map_or_else(|| format!("{reference:?}"), |id| id.to_string());
            if !seen.contains(&key) {
                seen.push(key);
                merged.push(reference);
            }
        };
        for reference in create.references(property) {
            push(reference);
        }
        for object in objects.iter().filter_map(Reference::as_object) {
            for reference in object.references(property) {
                push(reference);
            }
        }
        if merged.is_empty() {
            continue;
        }
        for object in &mut objects {
            if let Reference::Embedded(inner) = object {
                inner.set_references(property, merged.clone());
            }
        }
        create.set_references(property, merged);
    }
    create.set_references("object", objects);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: serde_json::Value) -> Object {
        Object::from_value(value).unwrap()
    }

    #[test]
    fn test_recipients_skip_public_and_duplicates() {
        let activity = object(json!({
            "to": ["https://www.w3.org/ns/activitystreams#Public", "https://a.example/users/a"],
            "cc": ["as:Public", "https://a.example/users/a", "https://b.example/users/b/followers"],
            "bcc": "https://c.example/users/c"
        }));
        let got: Vec<String> = recipients(&activity).iter().map(ToString::to_string).collect();
        assert_eq!(
            got,
            vec![
                "https://a.example/users/a",
                "https://b.example/users/b/followers",
                "https://c.example/users/c"
            ]
        );
        assert_eq!(forwarding_recipients(&activity).len(), 2);
    }

    #[test]
    fn test_strip_hidden_recipients_reaches_embedded_objects() {
        let mut activity = object(json!({
            "type": "Create",
            "bto": "https://a.example/users/a",
            "bcc": ["https://b.example/users/b"],
            "object": { "type": "Note", "bcc": "https://b.example/users/b", "content": "hi" }
        }));
        strip_hidden_recipients(&mut activity);

        assert!(activity.get("bto").is_none());
        assert!(activity.get("bcc").is_none());
        let note = activity.references("object").remove(0);
        let note = note.as_object().unwrap();
        assert!(note.get("bcc").is_none());
        assert_eq!(note.get_str("content"), Some("hi"));
    }

    #[test]
    fn test_normalize_recipients_is_bidirectional() {
        let mut create = object(json!({
            "type": "Create",
            "to": "https://a.example/users/a",
            "object": { "type": "Note", "to": "https://b.example/users/b", "cc": "https://c.example/f" }
        }));
        normalize_recipients(&mut create);

        let expected = vec!["https://a.example/users/a", "https://b.example/users/b"];
        let to: Vec<String> = create.iris("to").iter().map(ToString::to_string).collect();
        assert_eq!(to, expected);

        let note = create.references("object").remove(0);
        let note = note.as_object().unwrap().clone();
        let note_to: Vec<String> = note.iris("to").iter().map(ToString::to_string).collect();
        assert_eq!(note_to, expected);
        assert_eq!(create.iris("cc"), note.iris("cc"));
    }
}
