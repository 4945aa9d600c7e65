//! WT-019: Output directory — template and manifest, written atomically.
//!
//! Layout of an output directory:
//! ```text
//! <out>/<stack>.template.json
//! <out>/manifest.json
//! ```

use super::hasher;
use super::template::Template;
use super::types::AppSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1.0";

/// Describes the artifacts of one synth run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub generator: String,
    pub stack_name: String,
    pub template_file: String,
    /// `blake3:<hex>` of the template file contents
    pub template_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub resource_count: usize,
}

/// File name of a stack's template.
pub fn template_file_name(stack_name: &str) -> String {
    format!("{}.template.json", stack_name)
}

pub fn template_path(out_dir: &Path, stack_name: &str) -> PathBuf {
    out_dir.join(template_file_name(stack_name))
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), String> {
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, contents)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| format!("cannot rename {} → {}: {}", tmp_path.display(), path.display(), e))
}

/// Write the template and its manifest into `out_dir`.
pub fn write_output(out_dir: &Path, app: &AppSettings, template: &Template) -> Result<Manifest, String> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("cannot create dir {}: {}", out_dir.display(), e))?;

    let json = template
        .to_json()
        .map_err(|e| format!("serialize error: {}", e))?;
    let template_file = template_file_name(&app.stack_name);
    write_atomic(&out_dir.join(&template_file), &json)?;

    let manifest = Manifest {
        version: MANIFEST_VERSION.to_string(),
        generator: format!("ecsynth {}", env!("CARGO_PKG_VERSION")),
        stack_name: app.stack_name.clone(),
        template_file,
        template_hash: hasher::hash_string(&json),
        region: app.region.clone(),
        account: app.account.clone(),
        resource_count: template.resources.len(),
    };
    let manifest_json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| format!("serialize error: {}", e))?;
    write_atomic(&out_dir.join(MANIFEST_FILE), &manifest_json)?;

    tracing::info!(dir = %out_dir.display(), hash = %manifest.template_hash, "wrote template");
    Ok(manifest)
}

/// Load the manifest of an output directory. Returns None if there is none.
pub fn load_manifest(out_dir: &Path) -> Result<Option<Manifest>, String> {
    let path = out_dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let manifest = serde_json::from_str(&content)
        .map_err(|e| format!("invalid manifest {}: {}", path.display(), e))?;
    Ok(Some(manifest))
}

/// Load a previously written template. Returns None if the file doesn't exist.
///
/// A template whose hash no longer matches the manifest was edited by hand;
/// it is still loaded, with a warning.
pub fn load_template(out_dir: &Path, stack_name: &str) -> Result<Option<Template>, String> {
    let path = template_path(out_dir, stack_name);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;

    if let Some(manifest) = load_manifest(out_dir)? {
        let actual = hasher::hash_file(&path)?;
        if manifest.template_file == template_file_name(stack_name) && manifest.template_hash != actual {
            tracing::warn!(
                file = %path.display(),
                expected = %manifest.template_hash,
                actual = %actual,
                "template was modified after synth"
            );
        }
    }

    let template = Template::from_json(&content)
        .map_err(|e| format!("invalid template {}: {}", path.display(), e))?;
    Ok(Some(template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::template::CfnResource;
    use serde_json::json;

    fn make_template() -> Template {
        let mut t = Template::new(Some("test".to_string()));
        t.resources.insert(
            "Cluster".to_string(),
            CfnResource::new("AWS::ECS::Cluster", json!({"ClusterName": "c"})),
        );
        t.resources.insert(
            "AaaLater".to_string(),
            CfnResource::new("AWS::Logs::LogGroup", json!({})),
        );
        t
    }

    #[test]
    fn test_wt019_template_path() {
        let p = template_path(Path::new("/out"), "MyStack");
        assert_eq!(p, PathBuf::from("/out/MyStack.template.json"));
    }

    #[test]
    fn test_wt019_write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let app = AppSettings {
            region: Some("us-east-1".to_string()),
            ..AppSettings::default()
        };
        let manifest = write_output(dir.path(), &app, &make_template()).unwrap();
        assert_eq!(manifest.resource_count, 2);
        assert_eq!(manifest.template_file, "MyStack.template.json");
        assert!(manifest.template_hash.starts_with("blake3:"));

        let loaded = load_template(dir.path(), "MyStack").unwrap().unwrap();
        assert_eq!(loaded, make_template());
        assert_eq!(load_manifest(dir.path()).unwrap().unwrap(), manifest);
    }

    #[test]
    fn test_wt019_preserves_resource_order() {
        let dir = tempfile::tempdir().unwrap();
        write_output(dir.path(), &AppSettings::default(), &make_template()).unwrap();
        let loaded = load_template(dir.path(), "MyStack").unwrap().unwrap();
        let keys: Vec<_> = loaded.resources.keys().collect();
        assert_eq!(keys, vec!["Cluster", "AaaLater"]);
    }

    #[test]
    fn test_wt019_atomic_write_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        write_output(dir.path(), &AppSettings::default(), &make_template()).unwrap();
        assert!(!dir.path().join("MyStack.template.json.tmp").exists());
        assert!(!dir.path().join("manifest.json.tmp").exists());
        assert!(dir.path().join("manifest.json").exists());
    }

    #[test]
    fn test_wt019_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_template(dir.path(), "Ghost").unwrap().is_none());
        assert!(load_manifest(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_wt019_same_input_same_hash() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let ma = write_output(a.path(), &AppSettings::default(), &make_template()).unwrap();
        let mb = write_output(b.path(), &AppSettings::default(), &make_template()).unwrap();
        assert_eq!(ma.template_hash, mb.template_hash);
    }

    #[test]
    fn test_wt019_edited_template_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        write_output(dir.path(), &AppSettings::default(), &make_template()).unwrap();
        let path = template_path(dir.path(), "MyStack");
        let edited = std::fs::read_to_string(&path).unwrap().replace("\"c\"", "\"d\"");
        std::fs::write(&path, edited).unwrap();
        let loaded = load_template(dir.path(), "MyStack").unwrap().unwrap();
        assert_eq!(loaded.resources["Cluster"].prop("ClusterName").unwrap(), "d");
    }
}
