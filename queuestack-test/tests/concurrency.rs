//! Concurrent consumers never share a live lease

use queuestack_queue::{MessageId, QueueRegistry};
use queuestack_test::{init_tracing, TestRegistry, LONG_VISIBILITY_SECS};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const MESSAGES: usize = 200;
const CONSUMERS: usize = 8;

fn drain(registry: &QueueRegistry, name: &str) -> Vec<MessageId> {
    let queue = registry.get(name).unwrap();
    let mut taken = Vec::new();
    loop {
        let batch = queue.receive(1, LONG_VISIBILITY_SECS).unwrap();
        if batch.is_empty() {
            return taken;
        }
        taken.extend(batch.into_iter().map(|r| r.message.id));
    }
}

#[test]
fn test_threads_receive_each_message_once() {
    let fixture = TestRegistry::new();
    let queue = fixture.registry.create_if_not_exists("threads").unwrap();
    let enqueued: HashSet<MessageId> = (0..MESSAGES)
        .map(|i| queue.enqueue(format!("job-{i}")).unwrap())
        .collect();

    let registry = &fixture.registry;
    let per_consumer: Vec<Vec<MessageId>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..CONSUMERS)
            .map(|_| s.spawn(move || drain(registry, "threads")))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let all: Vec<MessageId> = per_consumer.into_iter().flatten().collect();
    let unique: HashSet<MessageId> = all.iter().copied().collect();
    assert_eq!(all.len(), MESSAGES, "a message was handed out twice");
    assert_eq!(unique, enqueued);
    assert_eq!(queue.approximate_count().unwrap(), 0);
}

#[test]
fn test_concurrent_producers_and_consumers() {
    const PRODUCED: usize = 200;

    let fixture = TestRegistry::new();
    let queue = fixture.registry.create_if_not_exists("mixed").unwrap();
    let deleted = AtomicUsize::new(0);

    let consumed: Vec<MessageId> = std::thread::scope(|s| {
        for p in 0..4 {
            let queue = queue.clone();
            s.spawn(move || {
                for i in 0..PRODUCED / 4 {
                    queue.enqueue(format!("p{p}-{i}")).unwrap();
                }
            });
        }

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let deleted = &deleted;
                s.spawn(move || {
                    let mut done = Vec::new();
                    while deleted.load(Ordering::SeqCst) < PRODUCED {
                        for leased in queue.receive(4, LONG_VISIBILITY_SECS).unwrap() {
                            queue
                                .delete_message(leased.message.id, leased.pop_token)
                                .unwrap();
                            deleted.fetch_add(1, Ordering::SeqCst);
                            done.push(leased.message.id);
                        }
                        std::thread::yield_now();
                    }
                    done
                })
            })
            .collect();
        consumers
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let unique: HashSet<_> = consumed.iter().collect();
    assert_eq!(consumed.len(), PRODUCED);
    assert_eq!(unique.len(), PRODUCED);
    assert!(queue.peek(32).unwrap().is_empty());
}

#[test]
fn test_racing_deletes_with_one_token() {
    let fixture = TestRegistry::new();
    let queue = fixture.registry.create_if_not_exists("race").unwrap();
    queue.enqueue("contested").unwrap();
    let leased = queue.receive(1, LONG_VISIBILITY_SECS).unwrap().remove(0);
    let (id, token) = (leased.message.id, leased.pop_token);

    let successes = std::thread::scope(|s| {
        let handles: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = &queue;
                s.spawn(move || queue.delete_message(id, token).is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count()
    });
    assert_eq!(successes, 1);
}

#[test]
fn test_racing_updates_with_one_token() {
    let fixture = TestRegistry::new();
    let queue = fixture.registry.create_if_not_exists("update-race").unwrap();
    let id = queue.enqueue("v0").unwrap();
    let token = queue.receive(1, LONG_VISIBILITY_SECS).unwrap().remove(0).pop_token;

    let winners: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..CONSUMERS)
            .map(|i| {
                let queue = &queue;
                s.spawn(move || {
                    queue
                        .update_lease(id, token, Some(format!("v{}", i + 1)), 60)
                        .ok()
                })
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect()
    });
    assert_eq!(winners.len(), 1);
    queue.delete_message(id, winners[0].pop_token).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tasks_receive_each_message_once() {
    init_tracing();
    let registry = Arc::new(QueueRegistry::default());
    let queue = registry.create_if_not_exists("tasks").unwrap();
    for i in 0..MESSAGES {
        queue.enqueue(format!("task-{i}")).unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..CONSUMERS {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let queue = registry.get("tasks").unwrap();
            let mut taken = Vec::new();
            loop {
                let batch = queue.receive(3, LONG_VISIBILITY_SECS).unwrap();
                if batch.is_empty() {
                    break;
                }
                taken.extend(batch.into_iter().map(|r| r.message.id));
                tokio::task::yield_now().await;
            }
            taken
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "message {id} delivered twice");
        }
    }
    assert_eq!(seen.len(), MESSAGES);
}

#[test]
fn test_count_reads_alongside_receivers() {
    let fixture = TestRegistry::new();
    let queue = fixture.registry.create_if_not_exists("counting").unwrap();
    for i in 0..MESSAGES {
        queue.enqueue(format!("m{i}")).unwrap();
    }

    std::thread::scope(|s| {
        s.spawn(|| drain(&fixture.registry, "counting"));
        s.spawn(|| {
            let mut last = MESSAGES;
            for _ in 0..100 {
                let count = queue.approximate_count().unwrap();
                assert!(count <= last);
                last = count;
                let peeked = queue.peek(32).unwrap();
                assert!(peeked.iter().all(|m| m.dequeue_count == 0));
            }
        });
    });
    assert_eq!(queue.approximate_count().unwrap(), 0);
}
