//! Helpers for reading and merging provider documents.
//!
//! Documents follow the provider's JSON:API shape
//! (`{ type, id, attributes, relationships, links }`). Only the fields named
//! here are ever inspected; everything else passes through untouched.

use serde_json::{Map, Value};

use crate::types::{ClanInfo, Document};

/// Top-level member holding relationship data.
pub const RELATIONSHIPS: &str = "relationships";

/// Relationship member holding the locally-sourced clan annotation.
pub const CLAN_RELATIONSHIP: &str = "clan";

/// Returns the resource `id` of a document.
#[must_use]
pub fn resource_id(doc: &Document) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

/// Returns a string attribute (`attributes.<name>`) of a document.
#[must_use]
pub fn attribute_str<'a>(doc: &'a Document, name: &str) -> Option<&'a str> {
    doc.get("attributes")
        .and_then(|attrs| attrs.get(name))
        .and_then(Value::as_str)
}

/// Returns the ids listed under `relationships.<name>.data`, in document order.
#[must_use]
pub fn relationship_ids<'a>(doc: &'a Document, name: &str) -> Vec<&'a str> {
    doc.get(RELATIONSHIPS)
        .and_then(|rels| rels.get(name))
        .and_then(|rel| rel.get("data"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

/// Merges the `relationships` sub-document of `existing` into `incoming`.
///
/// Relationship members present only in `existing` are kept, members present
/// in `incoming` win. Every other top-level member of `incoming` is left as is.
/// This keeps local annotations (such as a clan link) alive across syncs that
/// write provider-shaped payloads.
pub fn merge_relationships(existing: &Document, incoming: &mut Document) {
    let Some(old) = existing.get(RELATIONSHIPS).and_then(Value::as_object) else {
        return;
    };
    let Some(target) = incoming.as_object_mut() else {
        return;
    };

    let rels = target
        .entry(RELATIONSHIPS)
        .or_insert_with(|| Value::Object(Map::new()));
    if !rels.is_object() {
        *rels = Value::Object(Map::new());
    }
    if let Some(rels) = rels.as_object_mut() {
        for (name, value) in old {
            if !rels.contains_key(name) {
                rels.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Writes a clan annotation into `relationships.clan` of a player document.
pub fn set_clan(doc: &mut Document, clan: &ClanInfo) {
    let Some(target) = doc.as_object_mut() else {
        return;
    };
    let rels = target
        .entry(RELATIONSHIPS)
        .or_insert_with(|| Value::Object(Map::new()));
    if !rels.is_object() {
        *rels = Value::Object(Map::new());
    }
    if let Some(rels) = rels.as_object_mut() {
        rels.insert(
            CLAN_RELATIONSHIP.to_string(),
            serde_json::json!({
                "id": clan.id,
                "name": clan.name,
                "tag": clan.tag,
                "found": true,
            }),
        );
    }
}

/// Reads the clan annotation of a player document.
///
/// Only annotations explicitly marked `found: true` count.
#[must_use]
pub fn clan(doc: &Document) -> Option<ClanInfo> {
    let clan = doc.get(RELATIONSHIPS)?.get(CLAN_RELATIONSHIP)?;
    if clan.get("found").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let field = |name: &str| {
        clan.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Some(ClanInfo {
        id: field("id"),
        name: field("name"),
        tag: field("tag"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn player_doc() -> Document {
        json!({
            "type": "player",
            "id": "account.c0e530e9b7244b358def282782f893af",
            "attributes": { "name": "shroud", "shardId": "steam" },
            "relationships": {
                "matches": { "data": [
                    { "type": "match", "id": "m1" },
                    { "type": "match", "id": "m2" }
                ] }
            }
        })
    }

    #[test]
    fn test_field_accessors() {
        let doc = player_doc();
        assert_eq!(
            resource_id(&doc),
            Some("account.c0e530e9b7244b358def282782f893af")
        );
        assert_eq!(attribute_str(&doc, "name"), Some("shroud"));
        assert_eq!(attribute_str(&doc, "missing"), None);
        assert_eq!(relationship_ids(&doc, "matches"), vec!["m1", "m2"]);
        assert!(relationship_ids(&doc, "assets").is_empty());
    }

    #[test]
    fn test_merge_keeps_local_relationships() {
        let mut existing = player_doc();
        set_clan(
            &mut existing,
            &ClanInfo {
                id: "clan.1".into(),
                name: "Sentinels".into(),
                tag: "SEN".into(),
            },
        );

        let mut incoming = json!({
            "type": "player",
            "id": "account.c0e530e9b7244b358def282782f893af",
            "attributes": { "name": "shroud2", "shardId": "steam" },
            "relationships": {
                "matches": { "data": [{ "type": "match", "id": "m3" }] }
            }
        });
        merge_relationships(&existing, &mut incoming);

        assert_eq!(attribute_str(&incoming, "name"), Some("shroud2"));
        assert_eq!(relationship_ids(&incoming, "matches"), vec!["m3"]);
        assert_eq!(clan(&incoming).unwrap().tag, "SEN");
    }

    #[test]
    fn test_merge_into_document_without_relationships() {
        let existing = json!({ "relationships": { "clan": { "found": false } } });
        let mut incoming = json!({ "id": "x", "attributes": {} });
        merge_relationships(&existing, &mut incoming);
        assert_eq!(incoming["relationships"]["clan"]["found"], json!(false));
        assert!(clan(&incoming).is_none());
    }

    #[test]
    fn test_merge_without_existing_relationships_is_noop() {
        let existing = json!({ "id": "x" });
        let mut incoming = json!({ "id": "x", "attributes": { "name": "a" } });
        let before = incoming.clone();
        merge_relationships(&existing, &mut incoming);
        assert_eq!(incoming, before);
    }
}
