use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{ActivityEntry, ActivityLog, FormSubmission, SubmissionSink, TemplateStore};
use crate::error::StoreError;
use crate::types::Template;

const TEMPLATES_DIR: &str = "templates";
const SUBMISSIONS_DIR: &str = "submissions";
const ACTIVITY_FILE: &str = "activity.log";

/// TOML-file-backed repository under a base directory.
///
/// Layout: `templates/<id>.toml`, `submissions/<uuid>.toml`, and an
/// append-only `activity.log` of JSON lines.
pub struct FileStore {
    templates_dir: PathBuf,
    submissions_dir: PathBuf,
    activity_path: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            templates_dir: base_dir.join(TEMPLATES_DIR),
            submissions_dir: base_dir.join(SUBMISSIONS_DIR),
            activity_path: base_dir.join(ACTIVITY_FILE),
        }
    }

    /// Write or replace a template definition. Used by seeding and tooling;
    /// sessions only ever read.
    pub fn put_template(&self, template: &Template) -> Result<(), StoreError> {
        fs::create_dir_all(&self.templates_dir)?;
        let path = self.templates_dir.join(format!("{}.toml", template.id));
        let contents = toml::to_string_pretty(template)?;
        write_atomic(&path, contents.as_bytes())?;
        Ok(())
    }

    pub fn template_path(&self, id: &str) -> PathBuf {
        self.templates_dir.join(format!("{id}.toml"))
    }
}

impl TemplateStore for FileStore {
    fn list(&self) -> Result<Vec<Template>, StoreError> {
        let mut templates = Vec::new();
        let entries = match fs::read_dir(&self.templates_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(templates),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "toml") {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            templates.push(toml::from_str(&contents)?);
        }
        templates.sort_by(|a: &Template, b: &Template| a.id.cmp(&b.id));
        Ok(templates)
    }

    fn get(&self, id: &str) -> Result<Template, StoreError> {
        let path = self.template_path(id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(toml::from_str(&contents)?)
    }
}

impl SubmissionSink for FileStore {
    fn submit(&self, submission: &FormSubmission) -> Result<(), StoreError> {
        fs::create_dir_all(&self.submissions_dir)?;
        let path = self.submissions_dir.join(format!("{}.toml", submission.id));
        let contents = toml::to_string_pretty(submission)?;
        write_atomic(&path, contents.as_bytes())?;
        Ok(())
    }
}

impl ActivityLog for FileStore {
    fn record(&self, entry: &ActivityEntry) -> Result<(), StoreError> {
        if let Some(parent) = self.activity_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.activity_path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other("store path missing parent directory"))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::other("store path missing file name"))?;
    // Per-target staging name so concurrent writers never share one.
    let tmp_path = parent.join(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, contents)?;
    fs::rename(tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldKind, FormData, FormField};

    fn template(id: &str) -> Template {
        Template {
            id: id.to_string(),
            name: format!("Template {id}"),
            category: "test".into(),
            description: "a test template".into(),
            fields: vec![FormField {
                id: "name".into(),
                label: "Name".into(),
                kind: FieldKind::Text,
                placeholder: Some("Full name".into()),
                required: true,
                options: Vec::new(),
            }],
        }
    }

    #[test]
    fn templates_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.put_template(&template("intake")).unwrap();
        store.put_template(&template("contact")).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        // Sorted by id.
        assert_eq!(listed[0].id, "contact");

        let fetched = store.get("intake").unwrap();
        assert_eq!(fetched.fields[0].kind, FieldKind::Text);
        assert_eq!(fetched.fields[0].placeholder.as_deref(), Some("Full name"));
    }

    #[test]
    fn missing_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(store.get("nope"), Err(StoreError::NotFound(_))));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn submissions_land_as_individual_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let mut values = FormData::new();
        values.insert("name".into(), "Jane".into());
        let submission = FormSubmission::new("intake", values);
        store.submit(&submission).unwrap();

        let path = dir
            .path()
            .join(SUBMISSIONS_DIR)
            .join(format!("{}.toml", submission.id));
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.contains("Jane"));
        assert!(contents.contains("intake"));
    }

    #[test]
    fn concurrent_writers_stage_independently() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::thread::scope(|scope| {
            for id in ["alpha", "beta"] {
                let store = &store;
                scope.spawn(move || {
                    for _ in 0..20 {
                        store.put_template(&template(id)).unwrap();
                    }
                });
            }
        });

        assert_eq!(store.get("alpha").unwrap().id, "alpha");
        assert_eq!(store.get("beta").unwrap().id, "beta");
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn activity_log_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store
            .record(&ActivityEntry::new("form_submitted", "one".into()))
            .unwrap();
        store
            .record(&ActivityEntry::new("form_submitted", "two".into()))
            .unwrap();

        let contents = fs::read_to_string(dir.path().join(ACTIVITY_FILE)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let entry: ActivityEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(entry.detail, "two");
    }
}
