// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Request-scoped promise job queue
//!
//! The engine queues promise reactions here. A request that finishes
//! normally drains the queue after its main file; whatever a failed or
//! terminated request left behind is dropped when its context is deleted,
//! so no job runs in a later request.

use boa_engine::job::{GenericJob, Job, JobExecutor, PromiseJob};
use boa_engine::{Context, JsResult};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Job executor owned by one [`Engine`](crate::Engine)
#[derive(Default)]
pub struct RequestJobs {
    promise_jobs: RefCell<VecDeque<PromiseJob>>,
    generic_jobs: RefCell<VecDeque<GenericJob>>,
}

impl RequestJobs {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued jobs
    pub fn pending(&self) -> usize {
        self.promise_jobs.borrow().len() + self.generic_jobs.borrow().len()
    }

    /// Drop every queued job without running it; returns how many were dropped
    pub fn clear(&self) -> usize {
        let dropped = self.pending();
        self.promise_jobs.borrow_mut().clear();
        self.generic_jobs.borrow_mut().clear();
        dropped
    }

    fn next_promise_job(&self) -> Option<PromiseJob> {
        self.promise_jobs.borrow_mut().pop_front()
    }

    fn next_generic_job(&self) -> Option<GenericJob> {
        self.generic_jobs.borrow_mut().pop_front()
    }
}

impl JobExecutor for RequestJobs {
    fn enqueue_job(self: Rc<Self>, job: Job, _context: &mut Context) {
        match job {
            Job::PromiseJob(job) => self.promise_jobs.borrow_mut().push_back(job),
            Job::GenericJob(job) => self.generic_jobs.borrow_mut().push_back(job),
            _ => tracing::warn!("Unsupported job type enqueued, ignoring"),
        }
    }

    /// Run microtasks until both queues are empty.
    ///
    /// The first failing job stops the drain; jobs still queued are left for
    /// the context teardown to drop.
    fn run_jobs(self: Rc<Self>, context: &mut Context) -> JsResult<()> {
        loop {
            while let Some(job) = self.next_promise_job() {
                job.call(context)?;
            }
            match self.next_generic_job() {
                Some(job) => {
                    job.call(context)?;
                }
                None => break,
            }
        }
        context.clear_kept_objects();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    fn context_with(jobs: &Rc<RequestJobs>) -> Context {
        Context::builder()
            .job_executor(jobs.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_jobs_queue_until_run() {
        let jobs = Rc::new(RequestJobs::new());
        let mut context = context_with(&jobs);

        context
            .eval(Source::from_bytes(
                "var seen = []; Promise.resolve().then(function () { seen.push(1); });",
            ))
            .unwrap();
        assert_eq!(jobs.pending(), 1);

        context.run_jobs().unwrap();
        assert_eq!(jobs.pending(), 0);
        let seen = context.eval(Source::from_bytes("seen.length")).unwrap();
        assert_eq!(seen.as_number(), Some(1.0));
    }

    #[test]
    fn test_clear_drops_without_running() {
        let jobs = Rc::new(RequestJobs::new());
        let mut context = context_with(&jobs);

        context
            .eval(Source::from_bytes(
                "var ran = false; Promise.resolve().then(function () { ran = true; });",
            ))
            .unwrap();
        assert_eq!(jobs.clear(), 1);

        context.run_jobs().unwrap();
        let ran = context.eval(Source::from_bytes("ran")).unwrap();
        assert_eq!(ran.as_boolean(), Some(false));
    }
}
