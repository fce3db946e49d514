//! Reference resolution (§4.5 step 1): walks an IR `args` tree replacing
//! `{type:"ref",name}` and `{type:"qualified",base,field}` nodes with the
//! values they name in the current environment. Unresolved nodes — a
//! `qualified` ref whose base names a table rather than a row, for instance
//! — are left verbatim, reaching the tool unchanged.

use crate::env::Env;
use sentra_core::Value;
use serde_json::{Map, Value as Json};

pub fn resolve_refs(node: &Json, env: &Env) -> Json {
    match node {
        Json::Object(map) => resolve_object(map, env, node),
        Json::Array(items) => Json::Array(items.iter().map(|v| resolve_refs(v, env)).collect()),
        other => other.clone(),
    }
}

fn resolve_object(map: &Map<String, Json>, env: &Env, original: &Json) -> Json {
    match map.get("type").and_then(Json::as_str) {
        Some("ref") => match map.get("name").and_then(Json::as_str) {
            Some(name) => match env.get(name) {
                Some(value) => value.clone().into(),
                None => original.clone(),
            },
            None => original.clone(),
        },
        Some("qualified") => {
            let base = map.get("base").and_then(Json::as_str);
            let field = map.get("field").and_then(Json::as_str);
            match (base, field) {
                (Some(base), Some(field)) => match env.get(base) {
                    Some(Value::Row(row)) => match row.get(field) {
                        Some(value) => value.clone().into(),
                        None => original.clone(),
                    },
                    _ => original.clone(),
                },
                _ => original.clone(),
            }
        }
        _ => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_refs(v, env));
            }
            Json::Object(out)
        }
    }
}
