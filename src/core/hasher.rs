//! WT-014: BLAKE3 hashing for logical IDs, resources, and written templates.

use serde::Serialize;
use std::io::Read;
use std::path::Path;

const STREAM_BUF_SIZE: usize = 65536;

/// Hash a file's contents. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> Result<String, String> {
    let mut file =
        std::fs::File::open(path).map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; STREAM_BUF_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| format!("read error {}: {}", path.display(), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash the compact JSON encoding of a value.
///
/// `serde_json` maps are sorted, so equal documents hash equally regardless
/// of the order their properties were inserted.
pub fn hash_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let encoded = serde_json::to_string(value)?;
    Ok(hash_string(&encoded))
}

/// Compute a composite hash from multiple components.
pub fn composite_hash(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in components {
        hasher.update(c.as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

/// Eight uppercase hex chars identifying a construct path.
pub fn path_suffix(components: &[&str]) -> String {
    let hash = composite_hash(components);
    hash["blake3:".len().."blake3:".len() + 8].to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wt014_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        std::fs::write(&path, "{}").unwrap();
        let h = hash_file(&path).unwrap();
        assert!(h.starts_with("blake3:"));
        assert_eq!(h.len(), 7 + 64);
        assert_eq!(h, hash_string("{}"));
    }

    #[test]
    fn test_wt014_hash_file_not_found() {
        assert!(hash_file(Path::new("/nonexistent/template.json")).is_err());
    }

    #[test]
    fn test_wt014_hash_string() {
        assert_eq!(hash_string("hello"), hash_string("hello"));
        assert_ne!(hash_string("hello"), hash_string("world"));
    }

    #[test]
    fn test_wt014_hash_json_key_order() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let mut map = serde_json::Map::new();
        map.insert("a".to_string(), serde_json::json!(2));
        map.insert("b".to_string(), serde_json::json!(1));
        let b = serde_json::Value::Object(map);
        assert_eq!(hash_json(&a).unwrap(), hash_json(&b).unwrap());
    }

    #[test]
    fn test_wt014_composite_hash_order_sensitive() {
        let h = composite_hash(&["MyVpc", "Subnet"]);
        assert_ne!(h, composite_hash(&["Subnet", "MyVpc"]));
        // separator keeps ["ab","c"] apart from ["a","bc"]
        assert_ne!(composite_hash(&["ab", "c"]), composite_hash(&["a", "bc"]));
    }

    #[test]
    fn test_wt014_path_suffix() {
        let s = path_suffix(&["workloadConstruct", "MyVpc"]);
        assert_eq!(s.len(), 8);
        assert!(s.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_eq!(s, path_suffix(&["workloadConstruct", "MyVpc"]));
    }
}
