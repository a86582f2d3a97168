//! Propiedades de la cola contra un modelo `VecDeque`

use job_dispatcher::jobs::{Job, JobPayload, JobQueue, Popped, PushError};
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Op {
    Push,
    Pop,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![3 => Just(Op::Push), 2 => Just(Op::Pop)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn queue_matches_fifo_model(capacity in 1usize..8, ops in prop::collection::vec(op(), 0..64)) {
        let queue = JobQueue::new(capacity);
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Push => {
                    let job = Job::new(JobPayload::Sleep { ms: 0 });
                    let id = job.id();
                    match queue.try_push(job) {
                        Ok(()) => {
                            prop_assert!(model.len() < capacity);
                            model.push_back(id);
                        }
                        Err(PushError::Full(returned)) => {
                            prop_assert_eq!(model.len(), capacity);
                            prop_assert_eq!(returned.id(), id);
                        }
                        Err(other) => prop_assert!(false, "unexpected push error: {:?}", other),
                    }
                }
                // pop() bloquea con la cola vacía: solo se modela con elementos
                Op::Pop if !model.is_empty() => match queue.pop() {
                    Popped::Job(job) => prop_assert_eq!(Some(job.id()), model.pop_front()),
                    Popped::Closed => prop_assert!(false, "queue reported closed"),
                },
                Op::Pop => {}
            }

            let stats = queue.stats();
            prop_assert_eq!(stats.len, model.len());
            prop_assert!(stats.high_water <= capacity);
        }
    }

    #[test]
    fn close_drains_remaining_in_order(capacity in 1usize..8, pushes in 0usize..8) {
        let queue = JobQueue::new(capacity);
        let mut expected = Vec::new();
        for _ in 0..pushes.min(capacity) {
            let job = Job::new(JobPayload::Sleep { ms: 0 });
            expected.push(job.id());
            queue.try_push(job).unwrap();
        }

        prop_assert!(queue.close());
        prop_assert!(!queue.close());

        let mut drained = Vec::new();
        while let Popped::Job(job) = queue.pop() {
            drained.push(job.id());
        }
        prop_assert_eq!(drained, expected);
        let late = Job::new(JobPayload::Sleep { ms: 0 });
        let rejected = matches!(queue.try_push(late), Err(PushError::Closed(_)));
        prop_assert!(rejected);
    }
}
