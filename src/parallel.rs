use std::thread;

use rayon::ThreadPool;

use crate::errors::PipelineError;

pub const MAX_THREADS: usize = 64;

pub fn default_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(1, MAX_THREADS)
}

/// Bounded pool every parallel stage installs into. Nothing runs on rayon's global pool.
pub fn build_pool(threads: usize) -> Result<ThreadPool, PipelineError> {
    let threads = threads.clamp(1, MAX_THREADS);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("scout-worker-{i}"))
        .build()?;
    Ok(pool)
}
