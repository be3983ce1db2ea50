//! Bounded-concurrency dispatch of independent per-file tasks.
//!
//! # Parallel execution
//!
//! [`run_indexed`] runs `task(i)` exactly once for every index in
//! `0..count` and returns each result tagged with its index.  With the
//! `parallel` feature and more than one effective worker, tasks run on a
//! dedicated Rayon pool sized to `min(workers, count)`; otherwise they run
//! sequentially on the calling thread.
//!
//! The returned vector carries explicit indices so that callers never rely
//! on completion order.  Tasks share nothing but the read-only closure.

use log::debug;
#[cfg(feature = "parallel")]
use log::warn;

/// Number of workers actually used for `count` tasks.
pub fn effective_workers(workers: usize, count: usize) -> usize {
    workers.min(count).max(1)
}

/// Run `task` for every index in `0..count` on at most `workers` threads.
pub fn run_indexed<T, F>(count: usize, workers: usize, task: F) -> Vec<(usize, T)>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    let workers = effective_workers(workers, count);
    debug!("dispatching {count} task(s) on {workers} worker(s)");

    #[cfg(feature = "parallel")]
    {
        if workers > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("rainbow-decode-{i}"))
                .build()
            {
                Ok(pool) => {
                    use rayon::prelude::*;

                    return pool.install(|| {
                        (0..count)
                            .into_par_iter()
                            .with_max_len(1)
                            .map(|i| (i, task(i)))
                            .collect()
                    });
                }
                Err(e) => warn!("cannot build a {workers}-thread pool ({e}); decoding sequentially"),
            }
        }
    }

    (0..count).map(|i| (i, task(i))).collect()
}
