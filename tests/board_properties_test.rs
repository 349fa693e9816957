//! Property tests for the task board invariants.
//!
//! After every board operation: claimants exist iff an entry is claimed or
//! in progress; terminal-adjacent entries only ever sit on completed
//! dependencies; the reverse index is the exact transpose of the forward
//! edges; and no entry reaches itself through forward edges.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proptest::prelude::*;
use waggle::domain::models::{BoardStatus, SubTask};
use waggle::TaskBoard;

/// A random DAG: node i may only depend on nodes with a smaller index.
fn arb_dag(max_nodes: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2..max_nodes).prop_flat_map(|n| {
        let deps = (0..n)
            .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i.min(3)))
            .collect::<Vec<_>>();
        deps
    })
}

fn build_subtasks(dag: &[Vec<usize>]) -> (Vec<SubTask>, HashMap<String, HashSet<String>>) {
    let mut subtasks = Vec::new();
    let mut dep_map = HashMap::new();
    for (i, deps) in dag.iter().enumerate() {
        let id = format!("s{i}");
        let mut subtask = SubTask::new(&id, "task", format!("work {i}"));
        for dep in deps {
            subtask = subtask.with_dependency(format!("s{dep}"));
        }
        dep_map.insert(id, subtask.dependencies.clone());
        subtasks.push(subtask);
    }
    (subtasks, dep_map)
}

async fn assert_invariants(board: &TaskBoard) {
    let entries = board.entries().await;
    let by_id: HashMap<&str, _> = entries.iter().map(|e| (e.task_id.as_str(), e)).collect();

    for entry in &entries {
        // Claimant iff claimed/in-progress.
        let should_have_claimant =
            matches!(entry.status, BoardStatus::Claimed | BoardStatus::InProgress);
        assert_eq!(
            entry.claimed_by.is_some(),
            should_have_claimant,
            "claimant invariant violated for {} in {:?}",
            entry.task_id,
            entry.status
        );

        // Anything at or past claimed has only completed dependencies.
        if matches!(
            entry.status,
            BoardStatus::Claimed | BoardStatus::InProgress | BoardStatus::Completed | BoardStatus::Failed
        ) {
            for dep in &entry.dependencies {
                assert_eq!(
                    by_id[dep.as_str()].status,
                    BoardStatus::Completed,
                    "{} reached {:?} with incomplete dep {}",
                    entry.task_id,
                    entry.status,
                    dep
                );
            }
        }

        // No entry reaches itself through forward edges.
        let mut stack: Vec<&str> = entry.dependencies.iter().map(String::as_str).collect();
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(node) = stack.pop() {
            assert_ne!(node, entry.task_id, "cycle through {}", entry.task_id);
            if seen.insert(node) {
                if let Some(e) = by_id.get(node) {
                    stack.extend(e.dependencies.iter().map(String::as_str));
                }
            }
        }
    }

    // The reverse index equals the transpose of the forward edges.
    for entry in &entries {
        for dep in &entry.dependencies {
            let dependents = board.dependents_of(dep).await;
            assert!(
                dependents.contains(&entry.task_id),
                "reverse index missing {} -> {}",
                dep,
                entry.task_id
            );
        }
        for dependent in board.dependents_of(&entry.task_id).await {
            assert!(
                by_id[dependent.as_str()].dependencies.contains(&entry.task_id),
                "reverse index has stale edge {} -> {}",
                entry.task_id,
                dependent
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn publish_establishes_invariants(dag in arb_dag(10)) {
        tokio_test::block_on(async {
            let board = TaskBoard::new();
            let (subtasks, dep_map) = build_subtasks(&dag);
            board.publish(subtasks, dep_map).await.unwrap();
            assert_invariants(&board).await;

            // Entries without deps start pending, the rest blocked.
            for entry in board.entries().await {
                if entry.dependencies.is_empty() {
                    assert_eq!(entry.status, BoardStatus::Pending);
                } else {
                    assert_eq!(entry.status, BoardStatus::Blocked);
                }
            }
        });
    }

    #[test]
    fn invariants_hold_through_a_full_run(dag in arb_dag(8)) {
        tokio_test::block_on(async {
            let board = Arc::new(TaskBoard::new());
            let (subtasks, dep_map) = build_subtasks(&dag);
            let total = subtasks.len();
            board.publish(subtasks, dep_map).await.unwrap();

            // Drive the whole board to completion one claim at a time.
            let mut done = 0;
            while done < total {
                let available = board.available("prop-agent", None).await;
                prop_assert!(!available.is_empty(), "board wedged with {done}/{total} done");
                for entry in available {
                    if board.claim("prop-agent", &entry.task_id).await.is_err() {
                        continue;
                    }
                    assert_invariants(&board).await;
                    board.update_status(&entry.task_id, BoardStatus::InProgress, None).await.unwrap();
                    board
                        .update_status(&entry.task_id, BoardStatus::Completed, Some("ok".into()))
                        .await
                        .unwrap();
                    board.on_completed(&entry.task_id).await;
                    done += 1;
                    assert_invariants(&board).await;
                }
            }

            let counts = board.status_counts().await;
            prop_assert_eq!(counts.get(&BoardStatus::Completed).copied().unwrap_or(0), total);
            Ok(())
        })?;
    }

    #[test]
    fn cyclic_batches_are_always_refused(n in 2usize..6) {
        tokio_test::block_on(async {
            let board = TaskBoard::new();
            // A ring: s0 -> s1 -> ... -> s(n-1) -> s0.
            let mut subtasks = Vec::new();
            let mut dep_map = HashMap::new();
            for i in 0..n {
                let id = format!("s{i}");
                let dep = format!("s{}", (i + 1) % n);
                let subtask = SubTask::new(&id, "task", "loop").with_dependency(&dep);
                dep_map.insert(id.clone(), subtask.dependencies.clone());
                subtasks.push(subtask);
            }
            assert!(board.publish(subtasks, dep_map).await.is_err());
            assert!(board.is_empty().await);
        });
    }
}

#[tokio::test]
async fn scheduling_order_cannot_break_terminal_state() {
    // The same DAG driven in two different sibling orders converges to the
    // same terminal board state.
    let dag: Vec<Vec<usize>> = vec![vec![], vec![], vec![0, 1], vec![2]];
    let mut terminal_states = Vec::new();

    for reverse in [false, true] {
        let board = TaskBoard::new();
        let (subtasks, dep_map) = build_subtasks(&dag);
        board.publish(subtasks, dep_map).await.unwrap();

        loop {
            let mut available = board.available("agent", None).await;
            if available.is_empty() {
                break;
            }
            if reverse {
                available.reverse();
            }
            for entry in available {
                board.claim("agent", &entry.task_id).await.unwrap();
                board.update_status(&entry.task_id, BoardStatus::InProgress, None).await.unwrap();
                board
                    .update_status(&entry.task_id, BoardStatus::Completed, Some(entry.task_id.clone()))
                    .await
                    .unwrap();
                board.on_completed(&entry.task_id).await;
            }
        }

        let mut entries: Vec<(String, String, Option<String>)> = board
            .entries()
            .await
            .into_iter()
            .map(|e| (e.task_id, e.status.as_str().to_string(), e.result))
            .collect();
        entries.sort();
        terminal_states.push(entries);
    }

    assert_eq!(terminal_states[0], terminal_states[1]);
}
