// Periodic scan scheduler
//
// A named thread runs a pass at startup and then once per interval. Ticks that
// land while a triggered pass is still running are skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::constants::SCHEDULER_TICK_MS;
use crate::error::{GlimpseError, Result};
use crate::scan::Scanner;

pub struct SchedulerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Ask the scheduler to stop. A pass already in flight runs to completion.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop and wait for the thread to exit.
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Scan scheduler thread panicked");
            }
        }
    }
}

/// Spawn the scheduler thread. Call once at startup.
pub fn spawn_scheduler(scanner: Arc<Scanner>, interval: Duration) -> Result<SchedulerHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);

    let thread = std::thread::Builder::new()
        .name("scan-scheduler".into())
        .spawn(move || scheduler_loop(&scanner, interval, &thread_stop))?;

    Ok(SchedulerHandle {
        stop,
        thread: Some(thread),
    })
}

fn scheduler_loop(scanner: &Scanner, interval: Duration, stop: &AtomicBool) {
    log::info!("Scan scheduler started, interval {}s", interval.as_secs());

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }

        run_scheduled_pass(scanner);

        if !sleep_unless_stopped(interval, stop) {
            break;
        }
    }

    log::info!("Scan scheduler stopped");
}

fn run_scheduled_pass(scanner: &Scanner) {
    // Catch panics so the thread never dies
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| scanner.run_pass()));

    match result {
        Ok(Ok(_)) => {}
        Ok(Err(GlimpseError::ScanAlreadyRunning)) => {
            log::info!("Scheduled scan skipped, a pass is already running");
        }
        Ok(Err(e)) => {
            log::error!("Scheduled scan failed: {}", e);
        }
        Err(_) => {
            log::error!("Scheduled scan panicked (recovered)");
        }
    }
}

/// Sleep for `total` in short slices. Returns false if asked to stop.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    let tick = Duration::from_millis(SCHEDULER_TICK_MS);
    let deadline = Instant::now() + total;

    loop {
        if stop.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(tick.min(deadline - now));
    }
}
