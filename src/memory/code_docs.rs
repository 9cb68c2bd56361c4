//! Lightweight static extraction of code structure.
//!
//! Regex scans calibrated for Python, JavaScript/TypeScript, Java, and Rust.
//! Extraction is best-effort: a miss costs a missing field, never an error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Control-flow keywords counted toward the complexity estimate.
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "try", "catch", "switch", "case", "return", "throw",
];

static PYTHON_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").expect("Invalid regex")
});

static PYTHON_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*class\s+([A-Za-z_]\w*)").expect("Invalid regex"));

static PYTHON_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:from\s+([\w.]+)\s+import|import\s+([\w.]+))").expect("Invalid regex")
});

static JS_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)(?:function\s+([A-Za-z_$][\w$]*)\s*\(|(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:\([^)]*\)|[\w$]+)\s*=>)",
    )
    .expect("Invalid regex")
});

static JS_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\bclass\s+([A-Za-z_$][\w$]*)").expect("Invalid regex"));

static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)(?:import\s+.*?from\s+['"]([^'"]+)['"]|require\s*\(\s*['"]([^'"]+)['"]\s*\))"#)
        .expect("Invalid regex")
});

static JAVA_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)(?:public|protected|private|static|final|\s)+[\w<>\[\]]+\s+([a-z]\w*)\s*\([^)]*\)\s*(?:throws\s+[\w,\s]+)?\{",
    )
    .expect("Invalid regex")
});

static JAVA_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\b(?:class|interface|enum)\s+([A-Z]\w*)").expect("Invalid regex")
});

static JAVA_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+(?:\.\*)?);").expect("Invalid regex"));

static RUST_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:pub\s+)?(?:async\s+)?fn\s+([a-z_]\w*)").expect("Invalid regex")
});

static RUST_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:pub\s+)?(?:struct|enum|trait)\s+([A-Z]\w*)").expect("Invalid regex")
});

static RUST_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*use\s+([\w:]+)").expect("Invalid regex"));

static DOC_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)(^\s*(?:///|//!|#|//)\s*\S|"{3}|/\*\*)"#).expect("Invalid regex")
});

/// Extracted structure for one code file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeRef {
    pub language: String,
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub imports: Vec<String>,
    /// Top-level dependency names derived from imports.
    pub dependencies: Vec<String>,
    /// 1 + count of control-flow keywords.
    pub complexity: u32,
    /// Whether the file carries any docstring/comment documentation.
    pub has_docs: bool,
}

impl CodeRef {
    /// Whether the file declares any function or class.
    pub fn has_constructs(&self) -> bool {
        !self.functions.is_empty() || !self.classes.is_empty()
    }
}

/// Regex-based code structure extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeDocumentation;

impl CodeDocumentation {
    pub fn new() -> Self {
        Self
    }

    /// Analyze a file's content for a known language.
    ///
    /// Unknown languages still get a complexity estimate and doc detection;
    /// structure lists stay empty.
    pub fn analyze(&self, path: &str, content: &str, language: &str) -> CodeRef {
        let language = language.to_ascii_lowercase();
        let (functions, classes, imports) = match language.as_str() {
            "python" => (
                captures(&PYTHON_FUNCTION, content),
                captures(&PYTHON_CLASS, content),
                captures(&PYTHON_IMPORT, content),
            ),
            "javascript" | "typescript" => (
                captures(&JS_FUNCTION, content),
                captures(&JS_CLASS, content),
                captures(&JS_IMPORT, content),
            ),
            "java" => (
                captures(&JAVA_METHOD, content),
                captures(&JAVA_CLASS, content),
                captures(&JAVA_IMPORT, content),
            ),
            "rust" => (
                captures(&RUST_FUNCTION, content),
                captures(&RUST_TYPE, content),
                captures(&RUST_IMPORT, content),
            ),
            _ => {
                tracing::debug!(path, language, "no extractor for language");
                (Vec::new(), Vec::new(), Vec::new())
            }
        };

        let dependencies = imports
            .iter()
            .map(|import| dependency_name(import))
            .filter(|d| !d.is_empty())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        CodeRef {
            language,
            functions,
            classes,
            imports,
            dependencies,
            complexity: complexity(content),
            has_docs: DOC_MARKER.is_match(content),
        }
    }
}

fn captures(regex: &Regex, content: &str) -> Vec<String> {
    regex
        .captures_iter(content)
        .filter_map(|c| {
            c.iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str().to_string())
        })
        .collect()
}

/// Complexity estimate: 1 + word-bounded control keyword occurrences.
pub(crate) fn complexity(content: &str) -> u32 {
    static CONTROL: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(&format!(r"\b(?:{})\b", CONTROL_KEYWORDS.join("|"))).expect("Invalid regex")
    });
    1 + CONTROL.find_iter(content).count() as u32
}

/// Top-level dependency name for an import path.
fn dependency_name(import: &str) -> String {
    let import = import.trim_start_matches("./").trim_start_matches('@');
    import
        .split(['.', '/', ':'])
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_python_extraction() {
        let content = r#"
import os
from collections import defaultdict

def two_sum(nums, target):
    """Find indices adding to target."""
    seen = {}
    for i, n in enumerate(nums):
        if target - n in seen:
            return [seen[target - n], i]
        seen[n] = i
    return []

class Solver:
    def solve(self):
        return two_sum([2, 7], 9)
"#;
        let code = CodeDocumentation::new().analyze("two_sum.py", content, "python");

        assert_eq!(code.functions, vec!["two_sum", "solve"]);
        assert_eq!(code.classes, vec!["Solver"]);
        assert_eq!(code.imports, vec!["os", "collections"]);
        assert!(code.dependencies.contains(&"collections".to_string()));
        assert!(code.has_docs);
        // 1 + for, if, return, return, return
        assert_eq!(code.complexity, 6);
    }

    #[test]
    fn test_javascript_extraction() {
        let content = r#"
import { readFile } from 'fs';
const helper = require('./lib/helper');

function main() {
    if (process.argv.length > 2) {
        return helper.run();
    }
}

const parse = (input) => input.trim();

class Runner {}
"#;
        let code = CodeDocumentation::new().analyze("main.js", content, "javascript");

        assert_eq!(code.functions, vec!["main", "parse"]);
        assert_eq!(code.classes, vec!["Runner"]);
        assert_eq!(code.imports, vec!["fs", "./lib/helper"]);
        assert!(code.dependencies.contains(&"fs".to_string()));
        assert!(code.dependencies.contains(&"lib".to_string()));
    }

    #[test]
    fn test_java_extraction() {
        let content = r#"
import java.util.HashMap;

public class TwoSum {
    public int[] twoSum(int[] nums, int target) {
        HashMap<Integer, Integer> seen = new HashMap<>();
        for (int i = 0; i < nums.length; i++) {
            if (seen.containsKey(target - nums[i])) {
                return new int[] { seen.get(target - nums[i]), i };
            }
            seen.put(nums[i], i);
        }
        throw new IllegalArgumentException("no solution");
    }
}
"#;
        let code = CodeDocumentation::new().analyze("TwoSum.java", content, "java");

        assert_eq!(code.classes, vec!["TwoSum"]);
        assert_eq!(code.functions, vec!["twoSum"]);
        assert_eq!(code.imports, vec!["java.util.HashMap"]);
        assert!(code.has_constructs());
    }

    #[test]
    fn test_rust_extraction() {
        let content = r#"
use std::collections::HashMap;

/// Indices adding to target.
pub fn two_sum(nums: &[i64], target: i64) -> Option<(usize, usize)> {
    let mut seen = HashMap::new();
    for (i, n) in nums.iter().enumerate() {
        if let Some(&j) = seen.get(&(target - n)) {
            return Some((j, i));
        }
        seen.insert(n, i);
    }
    None
}

pub struct Solver;
"#;
        let code = CodeDocumentation::new().analyze("two_sum.rs", content, "rust");

        assert_eq!(code.functions, vec!["two_sum"]);
        assert_eq!(code.classes, vec!["Solver"]);
        assert!(code.has_docs);
    }

    #[test]
    fn test_unknown_language_still_estimates() {
        let code = CodeDocumentation::new().analyze("x.lisp", "(if a b c)", "lisp");
        assert!(code.functions.is_empty());
        assert_eq!(code.complexity, 2);
    }

    #[test]
    fn test_complexity_word_bounded() {
        // "iffy" and "forward" must not count
        assert_eq!(complexity("iffy forward"), 1);
        assert_eq!(complexity("if x { return y } else { throw z }"), 4);
    }
}
