//! C5 MetadataParser: parses and re-serializes the `Upload-Metadata` header.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Parses a tus `Upload-Metadata` header value: a comma-separated list of
/// `key` or `key base64value` pairs. Keys are unique; unparseable entries (bad
/// base64, empty keys) are skipped silently rather than rejecting the whole header.
pub fn parse(header: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for pair in header.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let mut parts = pair.splitn(2, ' ');
        let key = parts.next().unwrap_or("").trim();
        if key.is_empty() {
            continue;
        }
        let value = match parts.next() {
            Some(encoded) => match BASE64.decode(encoded.trim()) {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(s) => s,
                    Err(_) => continue,
                },
                Err(_) => continue,
            },
            None => String::new(),
        };
        out.insert(key.to_string(), value);
    }
    out
}

/// The inverse of [`parse`]: re-encodes a parsed mapping back into wire format, in
/// deterministic (sorted) key order so repeated calls on the same map are stable. Used by
/// HEAD to echo `Upload-Metadata` back to the client.
pub fn stringify(metadata: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = metadata.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|k| {
            let v = &metadata[k];
            if v.is_empty() {
                k.clone()
            } else {
                format!("{} {}", k, BASE64.encode(v.as_bytes()))
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_pair() {
        let header = format!("filename {}", BASE64.encode(b"world_domination.pdf"));
        let parsed = parse(&header);
        assert_eq!(parsed.get("filename").unwrap(), "world_domination.pdf");
    }

    #[test]
    fn parses_multiple_pairs_and_keyless_entries() {
        let header = format!(
            "filename {},is_confidential,type {}",
            BASE64.encode(b"report.pdf"),
            BASE64.encode(b"application/pdf")
        );
        let parsed = parse(&header);
        assert_eq!(parsed.get("filename").unwrap(), "report.pdf");
        assert_eq!(parsed.get("is_confidential").unwrap(), "");
        assert_eq!(parsed.get("type").unwrap(), "application/pdf");
    }

    #[test]
    fn skips_unparseable_entries() {
        let parsed = parse("good dGVzdA==,bad !!!not-base64!!!,another not_base64_either");
        assert_eq!(parsed.get("good").unwrap(), "test");
        assert!(!parsed.contains_key("bad"));
        assert!(!parsed.contains_key("another"));
    }

    #[test]
    fn empty_header_yields_empty_map() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn stringify_round_trips() {
        let mut map = HashMap::new();
        map.insert("filename".to_string(), "a.txt".to_string());
        map.insert("empty".to_string(), String::new());
        let encoded = stringify(&map);
        let back = parse(&encoded);
        assert_eq!(back, map);
    }

    #[test]
    fn stringify_is_deterministic() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), "2".to_string());
        map.insert("a".to_string(), "1".to_string());
        assert_eq!(stringify(&map), stringify(&map.clone()));
        assert!(stringify(&map).starts_with("a "));
    }
}
