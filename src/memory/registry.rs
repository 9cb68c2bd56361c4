//! File registry: primary map plus secondary indexes over task artifacts.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::types::{FileRef, FileType};

/// Lookup index for files produced during tasks.
///
/// The registry is a pure index: the [`MemoryManager`](super::MemoryManager)
/// owns file contents inside task contexts, and mirrors them here for
/// cross-cutting queries by type, language, and task. Removing a file purges
/// every index.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: HashMap<String, FileRef>,
    by_type: HashMap<FileType, Vec<String>>,
    by_language: HashMap<String, Vec<String>>,
    by_task: HashMap<String, Vec<String>>,
    /// Owning task per file, needed to unlink on removal.
    task_of: HashMap<String, String>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a file, optionally under an owning task.
    pub fn add(&mut self, file: FileRef, task_id: Option<&str>) {
        let file_id = file.file_id.clone();

        self.by_type
            .entry(file.file_type)
            .or_default()
            .push(file_id.clone());

        if let Some(language) = &file.metadata.language {
            self.by_language
                .entry(language.to_ascii_lowercase())
                .or_default()
                .push(file_id.clone());
        }

        if let Some(task_id) = task_id {
            self.by_task
                .entry(task_id.to_string())
                .or_default()
                .push(file_id.clone());
            self.task_of.insert(file_id.clone(), task_id.to_string());
        }

        self.files.insert(file_id, file);
    }

    /// Look up a file by id.
    pub fn get(&self, file_id: &str) -> Option<&FileRef> {
        self.files.get(file_id)
    }

    /// All files of a type.
    pub fn by_type(&self, file_type: FileType) -> Vec<&FileRef> {
        self.resolve(self.by_type.get(&file_type))
    }

    /// All files in a language (case-insensitive).
    pub fn by_language(&self, language: &str) -> Vec<&FileRef> {
        self.resolve(self.by_language.get(&language.to_ascii_lowercase()))
    }

    /// All files created by a task.
    pub fn by_task(&self, task_id: &str) -> Vec<&FileRef> {
        self.resolve(self.by_task.get(task_id))
    }

    fn resolve(&self, ids: Option<&Vec<String>>) -> Vec<&FileRef> {
        ids.map(|ids| ids.iter().filter_map(|id| self.files.get(id)).collect())
            .unwrap_or_default()
    }

    /// Replace a file's content and/or metadata, reindexing language.
    pub fn update(&mut self, file_id: &str, content: Option<&str>) -> Result<()> {
        let file = self
            .files
            .get_mut(file_id)
            .ok_or_else(|| Error::FileNotFound {
                file_id: file_id.to_string(),
            })?;

        if let Some(content) = content {
            file.set_content(content);
        }
        Ok(())
    }

    /// Remove a file from the registry and all indexes.
    pub fn remove(&mut self, file_id: &str) -> Result<FileRef> {
        let file = self
            .files
            .remove(file_id)
            .ok_or_else(|| Error::FileNotFound {
                file_id: file_id.to_string(),
            })?;

        if let Some(ids) = self.by_type.get_mut(&file.file_type) {
            ids.retain(|id| id != file_id);
        }
        if let Some(language) = &file.metadata.language {
            if let Some(ids) = self.by_language.get_mut(&language.to_ascii_lowercase()) {
                ids.retain(|id| id != file_id);
            }
        }
        if let Some(task_id) = self.task_of.remove(file_id) {
            if let Some(ids) = self.by_task.get_mut(&task_id) {
                ids.retain(|id| id != file_id);
            }
        }

        Ok(file)
    }

    /// Drop every file belonging to a task.
    pub fn remove_task(&mut self, task_id: &str) {
        let ids: Vec<String> = self
            .by_task
            .get(task_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        for id in ids {
            let _ = self.remove(&id);
        }
        self.by_task.remove(task_id);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Infer a language from a file extension, falling back to content
/// heuristics (shebangs, unmistakable keywords).
pub(crate) fn infer_language(path: &str, content: &str) -> Option<String> {
    let extension = path
        .rsplit(['/', '\\'])
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    let by_extension = match extension.as_deref() {
        Some("py") => Some("python"),
        Some("js") | Some("mjs") | Some("cjs") => Some("javascript"),
        Some("ts") | Some("tsx") => Some("typescript"),
        Some("jsx") => Some("javascript"),
        Some("java") => Some("java"),
        Some("rs") => Some("rust"),
        Some("go") => Some("go"),
        Some("rb") => Some("ruby"),
        Some("sh") | Some("bash") => Some("shell"),
        Some("c") | Some("h") => Some("c"),
        Some("cpp") | Some("cc") | Some("hpp") => Some("cpp"),
        _ => None,
    };
    if by_extension.is_some() {
        return by_extension.map(String::from);
    }

    // Content heuristics
    let head = content.lines().next().unwrap_or("");
    if head.starts_with("#!") {
        if head.contains("python") {
            return Some("python".to_string());
        }
        if head.contains("node") {
            return Some("javascript".to_string());
        }
        if head.contains("sh") {
            return Some("shell".to_string());
        }
    }
    if content.contains("def ") && content.contains(':') {
        return Some("python".to_string());
    }
    if content.contains("function ") || content.contains("const ") && content.contains("=>") {
        return Some("javascript".to_string());
    }
    if content.contains("public class ") || content.contains("public static void main") {
        return Some("java".to_string());
    }
    if content.contains("fn ") && content.contains("->") {
        return Some("rust".to_string());
    }

    None
}
