//! Property-based tests for memory round trips and derivation determinism.
//!
//! These validate the invariants the rest of the system leans on:
//!
//! - Export then import of a task context reproduces it exactly
//! - Evidence derivation is a pure function of the action
//! - Checksums are stable and content-sensitive
//! - Completion rules are stateless over context clones

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use crate::completion::CompletionRules;
    use crate::loop_prevention::canonical_inputs;
    use crate::memory::manager::derive_evidence;
    use crate::memory::types::{content_checksum, Action, FileRef, FileType, TaskType};
    use crate::memory::{MemoryManager, TaskContextExport};

    // Strategy for plausible file contents, including empty and unicode
    fn file_content() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[a-zA-Z0-9 .,\n]{0,200}",
            Just("def f():\n    return 1\n".to_string()),
            Just("über-résumé ∑".to_string()),
        ]
    }

    fn task_type() -> impl Strategy<Value = TaskType> {
        prop_oneof![
            Just(TaskType::SimpleQuestion),
            Just(TaskType::CodingTask),
            Just(TaskType::ResearchTask),
            Just(TaskType::GeneralTask),
        ]
    }

    proptest! {
        /// Export then import yields an equal context with equal checksums.
        #[test]
        fn export_import_round_trip(
            task in "[a-zA-Z0-9 ?]{1,60}",
            task_type in task_type(),
            path in "[a-z]{1,10}\\.(md|py|txt)",
            content in file_content()
        ) {
            let memory = MemoryManager::new();
            let task_id = memory.create_task(task, task_type);
            memory
                .add_action(
                    &task_id,
                    Action::new(
                        &task_id,
                        "write_file",
                        json!({"path": path, "content": content}),
                        json!({"status": "ok"}),
                        true,
                    ),
                )
                .unwrap();

            let original = memory.get_task_context(&task_id).unwrap();
            let document = memory.export_task(&task_id).unwrap();

            let imported: TaskContextExport = serde_json::from_str(&document).unwrap();
            prop_assert_eq!(&imported.context, &original);

            let other = MemoryManager::new();
            other.import_task(&document).unwrap();
            let round_tripped = other.get_task_context(&task_id).unwrap();
            prop_assert_eq!(&round_tripped, &original);
            for (a, b) in round_tripped.files.iter().zip(original.files.iter()) {
                prop_assert_eq!(&a.checksum, &b.checksum);
            }
        }

        /// Derivation of evidence from the same action is deterministic.
        #[test]
        fn evidence_derivation_is_deterministic(
            action_type in "[a-z_]{1,20}",
            success in any::<bool>(),
            content in file_content()
        ) {
            let action = Action::new(
                "task-1",
                action_type,
                json!({"path": "out.txt", "content": content.clone()}),
                json!({}),
                success,
            );
            let file = FileRef::new("out.txt", FileType::Output, content, &action.action_id);

            let first = derive_evidence(&action, Some(&file), None);
            let second = derive_evidence(&action, Some(&file), None);

            prop_assert_eq!(first.len(), second.len());
            for (a, b) in first.iter().zip(second.iter()) {
                prop_assert_eq!(a.evidence_type, b.evidence_type);
                prop_assert_eq!(&a.content, &b.content);
                prop_assert_eq!(a.confidence, b.confidence);
                prop_assert_eq!(&a.source, &b.source);
                prop_assert_eq!(a.timestamp, b.timestamp);
            }
        }

        /// Checksums are stable per content and shift when content shifts.
        #[test]
        fn checksum_is_stable_and_sensitive(content in file_content()) {
            prop_assert_eq!(content_checksum(&content), content_checksum(&content));
            let changed = format!("{}!", content);
            prop_assert_ne!(content_checksum(&content), content_checksum(&changed));
        }

        /// Completion rules are pure: a clone judges the same.
        #[test]
        fn completion_check_is_stateless(
            task_type in task_type(),
            path in "[a-z]{1,10}\\.(md|py|txt)",
            content in file_content()
        ) {
            let memory = MemoryManager::new();
            let task_id = memory.create_task("task", task_type);
            memory
                .add_action(
                    &task_id,
                    Action::new(
                        &task_id,
                        "write_file",
                        json!({"path": path, "content": content}),
                        json!({}),
                        true,
                    ),
                )
                .unwrap();

            let ctx = memory.get_task_context(&task_id).unwrap();
            let rules = CompletionRules::new();
            prop_assert_eq!(rules.check(&ctx), rules.check(&ctx.clone()));
        }

        /// Canonical input keying ignores object key order.
        #[test]
        fn canonical_inputs_ignore_key_order(
            a in 0i64..100,
            b in "[a-z]{0,10}"
        ) {
            let forward = json!({"first": a, "second": b.clone()});
            let backward = json!({"second": b, "first": a});
            prop_assert_eq!(canonical_inputs(&forward), canonical_inputs(&backward));
        }
    }
}
