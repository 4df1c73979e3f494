use chrono::{Duration, NaiveDate, NaiveDateTime};
use speculate2::speculate;
use task_tracker::error::StoreError;
use task_tracker::models::*;
use task_tracker::store::TaskStore;

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 5, 20)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn timed(name: &str, start: NaiveDateTime, minutes: i64) -> NewTask {
    NewTask {
        name: name.to_string(),
        description: String::new(),
        status: TaskStatus::New,
        duration: Some(Duration::minutes(minutes)),
        start_time: Some(start),
    }
}

fn untimed(name: &str) -> NewTask {
    NewTask {
        name: name.to_string(),
        ..NewTask::default()
    }
}

fn sub(epic_id: TaskId, task: NewTask) -> NewSubtask {
    NewSubtask { task, epic_id }
}

fn with_status(mut task: NewTask, status: TaskStatus) -> NewTask {
    task.status = status;
    task
}

fn epic(store: &mut TaskStore, name: &str) -> Epic {
    store.add_epic(NewEpic {
        name: name.to_string(),
        description: String::new(),
    })
}

fn prioritized_ids(store: &TaskStore) -> Vec<TaskId> {
    store.list_prioritized().iter().map(Item::id).collect()
}

fn history_ids(store: &TaskStore) -> Vec<TaskId> {
    store.list_history().iter().map(Item::id).collect()
}

speculate! {
    before {
        let mut store = TaskStore::new();
    }

    describe "ids" {
        it "assigns increasing ids shared across kinds" {
            let task = store.add_task(untimed("Task")).expect("Failed to add task");
            let epic = epic(&mut store, "Epic");
            let subtask = store.add_subtask(sub(epic.id(), untimed("Sub"))).expect("Failed to add subtask");

            assert_eq!(task.id, 1);
            assert_eq!(epic.id(), 2);
            assert_eq!(subtask.id(), 3);
        }

        it "does not reuse ids after removal" {
            let first = store.add_task(untimed("First")).expect("Failed to add task");
            store.remove_task(first.id).expect("Failed to remove");

            let second = store.add_task(untimed("Second")).expect("Failed to add task");
            assert!(second.id > first.id);
        }

        it "does not consume an id when an add is rejected" {
            store.add_task(timed("A", at(10, 0), 60)).expect("Failed to add task");
            store.add_task(timed("B", at(10, 30), 30)).expect_err("Overlap should be rejected");

            let next = store.add_task(untimed("C")).expect("Failed to add task");
            assert_eq!(next.id, 2);
        }
    }

    describe "tasks" {
        it "returns None for an unknown id" {
            assert!(store.get_task(42).is_none());
            assert!(store.list_history().is_empty());
        }

        it "replaces a task on update" {
            let task = store.add_task(timed("Draft", at(9, 0), 30)).expect("Failed to add task");

            let mut changed = task.clone();
            changed.name = "Final".to_string();
            changed.status = TaskStatus::Done;
            changed.start_time = Some(at(14, 0));
            store.update_task(changed).expect("Failed to update");

            let stored = store.get_task(task.id).expect("Task missing");
            assert_eq!(stored.name, "Final");
            assert_eq!(stored.status, TaskStatus::Done);
            assert_eq!(stored.end_time(), Some(at(14, 30)));
        }

        it "fails to update an unknown task" {
            let ghost = untimed("Ghost").into_task(99);
            let err = store.update_task(ghost).expect_err("Update should fail");
            assert_eq!(err, StoreError::NotFound { kind: ItemKind::Task, id: 99 });
        }

        it "fails to remove an unknown task" {
            let err = store.remove_task(7).expect_err("Remove should fail");
            assert!(err.is_not_found());
        }

        it "rejects a negative duration" {
            let mut input = timed("Backwards", at(9, 0), 30);
            input.duration = Some(Duration::minutes(-5));

            let err = store.add_task(input).expect_err("Should be invalid");
            assert!(matches!(err, StoreError::Invalid(_)));
            assert!(store.list_tasks().is_empty());
        }

        it "lists tasks in id order" {
            store.add_task(untimed("One")).expect("Failed to add task");
            store.add_task(untimed("Two")).expect("Failed to add task");

            let names: Vec<_> = store.list_tasks().into_iter().map(|t| t.name).collect();
            assert_eq!(names, vec!["One", "Two"]);
        }

        it "removes all tasks and their schedule slots" {
            store.add_task(timed("A", at(9, 0), 30)).expect("Failed to add task");
            store.add_task(timed("B", at(10, 0), 30)).expect("Failed to add task");

            assert_eq!(store.remove_all_tasks(), 2);
            assert!(store.list_tasks().is_empty());
            assert!(store.list_prioritized().is_empty());
        }
    }

    describe "scheduling" {
        it "rejects an overlap and accepts a window touching the previous end" {
            let a = store.add_task(timed("A", at(10, 0), 60)).expect("Failed to add A");

            let err = store.add_task(timed("B", at(10, 30), 30)).expect_err("B overlaps A");
            assert!(err.is_conflict());
            assert_eq!(store.list_tasks().len(), 1);

            // Touching windows are allowed; an older variant rejected them.
            let c = store.add_task(timed("C", at(11, 0), 30)).expect("C touches A");
            assert_eq!(prioritized_ids(&store), vec![a.id, c.id]);
        }

        it "checks subtasks against tasks" {
            store.add_task(timed("Meeting", at(10, 0), 60)).expect("Failed to add task");
            let epic = epic(&mut store, "Epic");

            let err = store
                .add_subtask(sub(epic.id(), timed("Clash", at(10, 45), 30)))
                .expect_err("Subtask overlaps task");
            assert!(err.is_conflict());
            assert!(store.list_subtasks().is_empty());
            assert!(store.list_subtasks_of_epic(epic.id()).unwrap().is_empty());
            assert_eq!(store.get_epic(epic.id()).unwrap().task.duration, Some(Duration::zero()));
        }

        it "keeps the old slot when an update would conflict" {
            let a = store.add_task(timed("A", at(9, 0), 60)).expect("Failed to add A");
            let b = store.add_task(timed("B", at(11, 0), 60)).expect("Failed to add B");

            let mut moved = b.clone();
            moved.start_time = Some(at(9, 30));
            store.update_task(moved).expect_err("Moved B overlaps A");

            assert_eq!(store.get_task(b.id).unwrap().start_time, Some(at(11, 0)));
            assert_eq!(prioritized_ids(&store), vec![a.id, b.id]);
            // A still blocks its own window, B still blocks its own.
            assert!(store.add_task(timed("X", at(11, 30), 10)).is_err());
        }

        it "lets an update overlap the item's own previous window" {
            let a = store.add_task(timed("A", at(9, 0), 60)).expect("Failed to add A");

            let mut longer = a.clone();
            longer.duration = Some(Duration::minutes(90));
            store.update_task(longer).expect("Own window is not a conflict");

            assert_eq!(store.get_task(a.id).unwrap().end_time(), Some(at(10, 30)));
        }

        it "frees the window of a removed item" {
            let a = store.add_task(timed("A", at(9, 0), 60)).expect("Failed to add A");
            store.remove_task(a.id).expect("Failed to remove");

            store.add_task(timed("B", at(9, 0), 60)).expect("Window is free again");
        }

        it "orders by start time with unscheduled items last and never lists epics" {
            let late = store.add_task(timed("Late", at(15, 0), 30)).expect("add");
            let floating = store.add_task(untimed("Floating")).expect("add");
            let epic = epic(&mut store, "Epic");
            let early = store.add_subtask(sub(epic.id(), timed("Early", at(8, 0), 30))).expect("add");

            assert_eq!(prioritized_ids(&store), vec![early.id(), late.id, floating.id]);
        }

        it "never holds two overlapping windows" {
            let starts = [(9, 0), (9, 20), (9, 40), (10, 0), (9, 50), (10, 40), (10, 20)];
            for (i, (h, m)) in starts.iter().enumerate() {
                let _ = store.add_task(timed(&format!("T{}", i), at(*h, *m), 25));
            }

            let windows: Vec<_> = store
                .list_prioritized()
                .iter()
                .map(|item| (item.base().start_time.unwrap(), item.end_time().unwrap()))
                .collect();
            for (i, a) in windows.iter().enumerate() {
                for b in windows.iter().skip(i + 1) {
                    assert!(!(a.0 < b.1 && b.0 < a.1), "{:?} overlaps {:?}", a, b);
                }
            }
        }
    }

    describe "epics" {
        it "starts out new, unscheduled and zero length" {
            let epic = epic(&mut store, "Empty");

            assert_eq!(epic.task.status, TaskStatus::New);
            assert_eq!(epic.task.start_time, None);
            assert_eq!(epic.end_time, None);
            assert_eq!(epic.task.duration, Some(Duration::zero()));
        }

        it "reports in progress for a mix of new and done subtasks" {
            // Older variants reported NEW for this mix.
            let epic = epic(&mut store, "Mixed");
            store.add_subtask(sub(epic.id(), with_status(untimed("a"), TaskStatus::New))).expect("add");
            store.add_subtask(sub(epic.id(), with_status(untimed("b"), TaskStatus::Done))).expect("add");

            assert_eq!(store.get_epic(epic.id()).unwrap().task.status, TaskStatus::InProgress);
        }

        it "is done only when every subtask is done" {
            let epic = epic(&mut store, "Epic");
            let a = store.add_subtask(sub(epic.id(), untimed("a"))).expect("add");
            let b = store.add_subtask(sub(epic.id(), untimed("b"))).expect("add");
            assert_eq!(store.get_epic(epic.id()).unwrap().task.status, TaskStatus::New);

            let mut done_a = a.clone();
            done_a.task.status = TaskStatus::Done;
            store.update_subtask(done_a).expect("update");
            assert_eq!(store.get_epic(epic.id()).unwrap().task.status, TaskStatus::InProgress);

            let mut done_b = b.clone();
            done_b.task.status = TaskStatus::Done;
            store.update_subtask(done_b).expect("update");
            assert_eq!(store.get_epic(epic.id()).unwrap().task.status, TaskStatus::Done);

            store.remove_subtask(b.id()).expect("remove");
            assert_eq!(store.get_epic(epic.id()).unwrap().task.status, TaskStatus::Done);
        }

        it "spans from earliest start to latest end with summed duration" {
            let epic = epic(&mut store, "Trip");
            store.add_subtask(sub(epic.id(), timed("Pack", at(8, 0), 30))).expect("add");
            store.add_subtask(sub(epic.id(), timed("Drive", at(12, 0), 90))).expect("add");
            store.add_subtask(sub(epic.id(), untimed("Plan"))).expect("add");

            let epic = store.get_epic(epic.id()).unwrap();
            assert_eq!(epic.task.start_time, Some(at(8, 0)));
            assert_eq!(epic.end_time, Some(at(13, 30)));
            assert_eq!(epic.task.duration, Some(Duration::minutes(120)));
        }

        it "recomputes the span when a subtask is removed" {
            let epic = epic(&mut store, "Trip");
            store.add_subtask(sub(epic.id(), timed("Pack", at(8, 0), 30))).expect("add");
            let drive = store.add_subtask(sub(epic.id(), timed("Drive", at(12, 0), 90))).expect("add");

            store.remove_subtask(drive.id()).expect("remove");

            let epic = store.get_epic(epic.id()).unwrap();
            assert_eq!(epic.end_time, Some(at(8, 30)));
            assert_eq!(epic.task.duration, Some(Duration::minutes(30)));
            assert_eq!(epic.subtask_ids.len(), 1);
        }

        it "keeps derived fields when renamed" {
            let created = epic(&mut store, "Old");
            store.add_subtask(sub(created.id(), with_status(timed("a", at(9, 0), 30), TaskStatus::Done))).expect("add");

            let mut renamed = NewEpic { name: "New".to_string(), description: "desc".to_string() }
                .into_epic(created.id());
            renamed.task.status = TaskStatus::New;
            let updated = store.update_epic(renamed).expect("update");

            assert_eq!(updated.task.name, "New");
            assert_eq!(updated.task.description, "desc");
            assert_eq!(updated.task.status, TaskStatus::Done);
            assert_eq!(updated.subtask_ids.len(), 1);
            assert_eq!(updated.task.start_time, Some(at(9, 0)));
        }

        it "fails to update an unknown epic" {
            let err = store.update_epic(Epic::new(5, "x", "")).expect_err("should fail");
            assert_eq!(err, StoreError::NotFound { kind: ItemKind::Epic, id: 5 });
        }

        it "cascades removal to subtasks in every view" {
            let epic = epic(&mut store, "Doomed");
            let a = store.add_subtask(sub(epic.id(), timed("a", at(9, 0), 30))).expect("add");
            let b = store.add_subtask(sub(epic.id(), untimed("b"))).expect("add");
            store.get_subtask(a.id());
            store.get_epic(epic.id());

            store.remove_epic(epic.id()).expect("remove");

            assert!(store.get_subtask(a.id()).is_none());
            assert!(store.get_subtask(b.id()).is_none());
            assert!(store.list_subtasks().is_empty());
            assert!(store.list_prioritized().is_empty());
            assert!(store.list_history().is_empty());
            assert!(store.list_subtasks_of_epic(epic.id()).is_none());
        }

        it "removes all epics with their subtasks but keeps tasks" {
            let task = store.add_task(timed("Task", at(7, 0), 30)).expect("add");
            let first = epic(&mut store, "First");
            let second = epic(&mut store, "Second");
            store.add_subtask(sub(first.id(), timed("a", at(9, 0), 30))).expect("add");
            store.add_subtask(sub(second.id(), untimed("b"))).expect("add");
            store.get_epic(first.id());
            store.get_task(task.id);

            assert_eq!(store.remove_all_epics(), 2);

            assert!(store.list_epics().is_empty());
            assert!(store.list_subtasks().is_empty());
            assert_eq!(prioritized_ids(&store), vec![task.id]);
            assert_eq!(history_ids(&store), vec![task.id]);
        }

        it "returns subtasks of an epic in attach order" {
            let epic = epic(&mut store, "Epic");
            let a = store.add_subtask(sub(epic.id(), untimed("a"))).expect("add");
            let b = store.add_subtask(sub(epic.id(), untimed("b"))).expect("add");

            let ids: Vec<_> = store
                .list_subtasks_of_epic(epic.id())
                .unwrap()
                .iter()
                .map(Subtask::id)
                .collect();
            assert_eq!(ids, vec![a.id(), b.id()]);
        }
    }

    describe "subtasks" {
        it "rejects a subtask for an unknown epic" {
            let err = store.add_subtask(sub(42, untimed("Orphan"))).expect_err("should fail");
            assert_eq!(err, StoreError::NotFound { kind: ItemKind::Epic, id: 42 });
            assert!(store.list_subtasks().is_empty());
        }

        it "rejects a subtask whose epic id points at a task" {
            let task = store.add_task(untimed("Not an epic")).expect("add");
            let err = store.add_subtask(sub(task.id, untimed("Orphan"))).expect_err("should fail");
            assert!(err.is_not_found());
        }

        it "moves between epics and recomputes both" {
            let from = epic(&mut store, "From");
            let to = epic(&mut store, "To");
            let moving = store
                .add_subtask(sub(from.id(), with_status(timed("m", at(9, 0), 30), TaskStatus::Done)))
                .expect("add");

            let mut moved = moving.clone();
            moved.epic_id = to.id();
            store.update_subtask(moved).expect("update");

            let from = store.get_epic(from.id()).unwrap();
            let to = store.get_epic(to.id()).unwrap();
            assert!(from.subtask_ids.is_empty());
            assert_eq!(from.task.status, TaskStatus::New);
            assert_eq!(from.task.start_time, None);
            assert_eq!(to.subtask_ids, vec![moving.id()]);
            assert_eq!(to.task.status, TaskStatus::Done);
            assert_eq!(to.end_time, Some(at(9, 30)));
        }

        it "refuses to move to an unknown epic" {
            let epic = epic(&mut store, "Epic");
            let subtask = store.add_subtask(sub(epic.id(), untimed("s"))).expect("add");

            let mut moved = subtask.clone();
            moved.epic_id = 99;
            let err = store.update_subtask(moved).expect_err("should fail");

            assert_eq!(err, StoreError::NotFound { kind: ItemKind::Epic, id: 99 });
            assert_eq!(store.get_subtask(subtask.id()).unwrap().epic_id, epic.id());
        }

        it "fails to update an unknown subtask" {
            let epic = epic(&mut store, "Epic");
            let ghost = sub(epic.id(), untimed("ghost")).into_subtask(77);
            let err = store.update_subtask(ghost).expect_err("should fail");
            assert_eq!(err, StoreError::NotFound { kind: ItemKind::Subtask, id: 77 });
        }

        it "rejects a subtask whose duration overflows the epic total" {
            let huge = Duration::minutes(100_000_000_000_000);
            let epic = epic(&mut store, "Huge");
            let mut first = untimed("first");
            first.duration = Some(huge);
            let first = store.add_subtask(sub(epic.id(), first)).expect("First fits");
            let before = store.list_epics();

            let mut second = untimed("second");
            second.duration = Some(huge);
            let err = store.add_subtask(sub(epic.id(), second)).expect_err("Sum overflows");

            assert!(matches!(err, StoreError::Invalid(_)));
            assert_eq!(store.list_subtasks().len(), 1);
            assert_eq!(store.list_epics(), before);
            let next = store.add_task(untimed("next")).expect("Store still usable");
            assert_eq!(next.id, first.id() + 1);
        }

        it "leaves both epics alone when a move would overflow the target" {
            let huge = Duration::minutes(100_000_000_000_000);
            let from = epic(&mut store, "From");
            let to = epic(&mut store, "To");
            let mut big = untimed("big");
            big.duration = Some(huge);
            store.add_subtask(sub(to.id(), big.clone())).expect("add");
            let mover = store.add_subtask(sub(from.id(), big)).expect("add");
            let before = store.list_epics();

            let mut moved = mover.clone();
            moved.epic_id = to.id();
            let err = store.update_subtask(moved).expect_err("Target sum overflows");

            assert!(matches!(err, StoreError::Invalid(_)));
            assert_eq!(store.list_epics(), before);
            assert_eq!(store.get_subtask(mover.id()).unwrap().epic_id, from.id());
        }

        it "removes all subtasks and resets every epic" {
            let epic = epic(&mut store, "Epic");
            store.add_subtask(sub(epic.id(), with_status(timed("a", at(9, 0), 30), TaskStatus::Done))).expect("add");
            let b = store.add_subtask(sub(epic.id(), timed("b", at(10, 0), 30))).expect("add");
            store.get_subtask(b.id());

            assert_eq!(store.remove_all_subtasks(), 2);

            let epic = store.get_epic(epic.id()).expect("Epic survives");
            assert!(epic.subtask_ids.is_empty());
            assert_eq!(epic.task.status, TaskStatus::New);
            assert_eq!(epic.task.start_time, None);
            assert_eq!(epic.end_time, None);
            assert_eq!(epic.task.duration, Some(Duration::zero()));
            assert!(store.list_prioritized().is_empty());
            assert_eq!(history_ids(&store), vec![epic.id()]);
        }
    }

    describe "history" {
        it "records single-entity reads of every kind in order" {
            let task = store.add_task(untimed("Task")).expect("add");
            let epic = epic(&mut store, "Epic");
            let subtask = store.add_subtask(sub(epic.id(), untimed("Sub"))).expect("add");

            store.get_subtask(subtask.id());
            store.get_task(task.id);
            store.get_epic(epic.id());

            let history = store.list_history();
            assert_eq!(history.iter().map(Item::kind).collect::<Vec<_>>(),
                vec![ItemKind::Subtask, ItemKind::Task, ItemKind::Epic]);
        }

        it "is not touched by list operations" {
            let task = store.add_task(timed("Task", at(9, 0), 30)).expect("add");
            let epic = epic(&mut store, "Epic");

            store.list_tasks();
            store.list_epics();
            store.list_subtasks();
            store.list_subtasks_of_epic(epic.id());
            store.list_prioritized();
            store.item(task.id);

            assert!(store.list_history().is_empty());
        }

        it "moves a re-fetched entity to the end without growing" {
            let a = store.add_task(untimed("a")).expect("add");
            let b = store.add_task(untimed("b")).expect("add");
            store.get_task(a.id);
            store.get_task(b.id);
            store.get_task(a.id);

            assert_eq!(history_ids(&store), vec![b.id, a.id]);
        }

        it "keeps only the ten most recent entities" {
            let ids: Vec<_> = (1..=11)
                .map(|i| store.add_task(untimed(&format!("t{}", i))).expect("add").id)
                .collect();
            for id in &ids {
                store.get_task(*id);
            }

            assert_eq!(history_ids(&store), ids[1..].to_vec());
        }

        it "forgets removed entities" {
            let a = store.add_task(untimed("a")).expect("add");
            let b = store.add_task(untimed("b")).expect("add");
            store.get_task(a.id);
            store.get_task(b.id);

            store.remove_task(a.id).expect("remove");

            assert_eq!(history_ids(&store), vec![b.id]);
        }

        it "shows the current value of an entity" {
            let task = store.add_task(untimed("before")).expect("add");
            store.get_task(task.id);

            let mut renamed = task.clone();
            renamed.name = "after".to_string();
            store.update_task(renamed).expect("update");

            assert_eq!(store.list_history()[0].base().name, "after");
        }

        it "honours a custom capacity" {
            let mut small = TaskStore::with_history_capacity(2);
            let ids: Vec<_> = (0..3)
                .map(|i| small.add_task(untimed(&format!("t{}", i))).expect("add").id)
                .collect();
            for id in &ids {
                small.get_task(*id);
            }

            assert_eq!(history_ids(&small), ids[1..].to_vec());
        }
    }

    describe "snapshots" {
        it "restores maps, derived epic fields, schedule and id counter" {
            let task = store.add_task(timed("Task", at(7, 0), 30)).expect("add");
            let epic = epic(&mut store, "Epic");
            store.add_subtask(sub(epic.id(), with_status(timed("a", at(9, 0), 30), TaskStatus::Done))).expect("add");
            store.add_subtask(sub(epic.id(), timed("b", at(11, 0), 15))).expect("add");
            let removed = store.add_task(untimed("gone")).expect("add");
            store.remove_task(removed.id).expect("remove");

            let restored = TaskStore::restore(store.snapshot(), 10).expect("restore");

            assert_eq!(restored.list_tasks(), store.list_tasks());
            assert_eq!(restored.list_epics(), store.list_epics());
            assert_eq!(restored.list_subtasks(), store.list_subtasks());
            assert_eq!(prioritized_ids(&restored), prioritized_ids(&store));
            assert!(restored.list_history().is_empty());

            let mut restored = restored;
            let next = restored.add_task(untimed("next")).expect("add");
            assert_eq!(next.id, removed.id + 1);
            assert!(restored.add_task(timed("clash", at(7, 15), 10)).is_err());
            assert!(restored.get_task(task.id).is_some());
        }

        it "recomputes epics from subtasks instead of trusting stored fields" {
            let epic = epic(&mut store, "Epic");
            store.add_subtask(sub(epic.id(), with_status(untimed("a"), TaskStatus::Done))).expect("add");

            let mut snapshot = store.snapshot();
            snapshot.epics[0].task.status = TaskStatus::New;
            snapshot.epics[0].subtask_ids.clear();

            let mut restored = TaskStore::restore(snapshot, 10).expect("restore");
            let epic = restored.get_epic(epic.id()).unwrap();
            assert_eq!(epic.task.status, TaskStatus::Done);
            assert_eq!(epic.subtask_ids.len(), 1);
        }

        it "drops subtasks whose epic is missing" {
            let epic = epic(&mut store, "Epic");
            store.add_subtask(sub(epic.id(), untimed("a"))).expect("add");

            let mut snapshot = store.snapshot();
            snapshot.epics.clear();

            let restored = TaskStore::restore(snapshot, 10).expect("restore");
            assert!(restored.list_subtasks().is_empty());
            assert!(restored.list_epics().is_empty());
        }

        it "rejects duplicate ids" {
            store.add_task(untimed("a")).expect("add");
            let mut snapshot = store.snapshot();
            let copy = snapshot.tasks[0].clone();
            snapshot.tasks.push(copy);

            let err = TaskStore::restore(snapshot, 10).expect_err("should fail");
            assert!(matches!(err, StoreError::Invalid(_)));
        }
    }
}
