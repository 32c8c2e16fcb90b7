//! Task producer: turns an import plan into the ordered task stream

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::{Entry, Task};
use crate::source::{ImportPlan, PermissionPlan};

use super::queue::WorkQueue;

/// Groups, then users, then permissions, then a single End
///
/// Ordinals count from zero within each kind.
pub fn tasks(plan: ImportPlan) -> Vec<Task> {
    let mut tasks = Vec::with_capacity(plan.task_count() + 1);

    tasks.extend(
        plan.groups
            .into_iter()
            .enumerate()
            .map(|(i, g)| Task::Group(Entry::new(i, g.name.clone(), g))),
    );
    tasks.extend(
        plan.users
            .into_iter()
            .enumerate()
            .map(|(i, u)| Task::User(Entry::new(i, u.name.clone(), u))),
    );
    match plan.permissions {
        PermissionPlan::Legacy(perms) => tasks.extend(
            perms
                .into_iter()
                .enumerate()
                .map(|(i, p)| Task::Permission(Entry::new(i, p.name.clone(), p))),
        ),
        PermissionPlan::V2(perms) => tasks.extend(
            perms
                .into_iter()
                .enumerate()
                .map(|(i, p)| Task::PermissionV2(Entry::new(i, p.name.clone(), p))),
        ),
    }
    tasks.push(Task::End);
    tasks
}

/// Feed the queue from a background task, concurrently with the workers
pub fn spawn(plan: ImportPlan, queue: Arc<WorkQueue>) -> JoinHandle<usize> {
    debug!(tasks = plan.task_count(), "producer::spawn: called");
    tokio::spawn(async move {
        let mut produced = 0;
        for task in tasks(plan) {
            queue.push(task);
            produced += 1;
            if produced % 100 == 0 {
                tokio::task::yield_now().await;
            }
        }
        info!(produced, "Producer finished");
        produced
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GroupRecord, PermissionRecord, PermissionV2Record, TaskKind, UserRecord};

    fn plan(permissions: PermissionPlan) -> ImportPlan {
        ImportPlan {
            groups: vec![
                GroupRecord {
                    name: "g0".into(),
                    ..Default::default()
                },
                GroupRecord {
                    name: "g1".into(),
                    ..Default::default()
                },
            ],
            users: vec![UserRecord {
                name: "alice".into(),
                ..Default::default()
            }],
            permissions,
        }
    }

    #[test]
    fn test_order_and_ordinals() {
        let perms = PermissionPlan::V2(vec![
            PermissionV2Record {
                name: "p0".into(),
                ..Default::default()
            },
            PermissionV2Record {
                name: "p1".into(),
                ..Default::default()
            },
        ]);
        let tasks = tasks(plan(perms));
        let kinds: Vec<_> = tasks.iter().map(Task::kind).collect();
        assert_eq!(
            kinds,
            vec![
                TaskKind::Group,
                TaskKind::Group,
                TaskKind::User,
                TaskKind::PermissionV2,
                TaskKind::PermissionV2,
                TaskKind::End,
            ]
        );
        let ordinals: Vec<_> = tasks.iter().map(Task::ordinal).collect();
        assert_eq!(ordinals, vec![Some(0), Some(1), Some(0), Some(0), Some(1), None]);
        assert_eq!(tasks[4].name(), Some("p1"));
    }

    #[test]
    fn test_legacy_permissions() {
        let tasks = tasks(plan(PermissionPlan::Legacy(vec![PermissionRecord {
            name: "old".into(),
            ..Default::default()
        }])));
        assert_eq!(tasks[3].kind(), TaskKind::Permission);
        assert_eq!(tasks.iter().filter(|t| t.is_end()).count(), 1);
    }

    #[test]
    fn test_empty_plan_is_just_end() {
        let tasks = tasks(ImportPlan::default());
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].is_end());
    }

    #[tokio::test]
    async fn test_spawn_fills_queue() {
        let queue = Arc::new(WorkQueue::new());
        let produced = spawn(plan(PermissionPlan::default()), queue.clone()).await.unwrap();
        assert_eq!(produced, 4);
        assert_eq!(queue.len(), 4);
    }
}
