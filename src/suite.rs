//! Runs a suite of tests concurrently and reports them in order.
//!
//! Each test runs on its own thread. A bounded token channel caps how many
//! run at once; every test gets a one-shot result slot, and fatal errors go
//! to a shared error channel. The consumer walks the slots in submission
//! order, so output order never depends on completion order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, select, unbounded, Receiver};
use termcolor::WriteColor;
use tracing::{debug, info_span};
use unicode_width::UnicodeWidthStr;

use crate::config::Mode;
use crate::errors::{ChartTestError, Result};
use crate::report::Reporter;
use crate::test_case::{TestCase, TestContext};

/// The tests of one run, in submission order.
#[derive(Debug, Clone)]
pub struct TestSuite {
    pub mode: Mode,
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    pub fn new<I, S>(names: I, mode: Mode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode,
            tests: names.into_iter().map(|name| TestCase::new(name, mode)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Display width of the longest test name.
    pub fn name_width(&self) -> usize {
        self.tests.iter().map(|test| test.name.width()).max().unwrap_or(0)
    }

    pub fn total_successful(&self) -> usize {
        self.tests.iter().filter(|test| test.is_successful()).count()
    }

    pub fn is_successful(&self) -> bool {
        self.tests.iter().all(TestCase::is_successful)
    }

    /// Runs every test with at most `concurrency` in flight, handing each
    /// finished test to `reporter` in submission order.
    ///
    /// The first fatal error aborts the run; tests not yet started are
    /// skipped and `self.tests` holds only the tests reported so far.
    pub fn run<W: WriteColor>(
        &mut self,
        ctx: Arc<TestContext>,
        concurrency: usize,
        reporter: &mut Reporter<W>,
    ) -> Result<()> {
        let tests = std::mem::take(&mut self.tests);
        debug!(tests = tests.len(), concurrency, "running suite");

        let finished = &mut self.tests;
        run_ordered(
            tests,
            concurrency,
            |test| test.name.clone(),
            move |mut test: TestCase| {
                let _span = info_span!("test", name = %test.name).entered();
                test.run(&ctx)?;
                Ok(test)
            },
            |test| {
                reporter.finalize(&test)?;
                finished.push(test);
                Ok(())
            },
        )
    }
}

/// Returns a concurrency token to the gate when dropped.
struct Permit(Receiver<()>);

impl Drop for Permit {
    fn drop(&mut self) {
        let _ = self.0.try_recv();
    }
}

/// Runs `work` over `items` on worker threads, at most `limit` at a time,
/// and feeds the results to `consume` in the order of `items`.
///
/// Returns the first error raised by `work` or `consume`. A worker that
/// ends without producing a result (for example by panicking) is reported
/// as [`ChartTestError::Worker`] naming the item.
pub fn run_ordered<T, N, F, C>(items: Vec<T>, limit: usize, name_of: N, work: F, mut consume: C) -> Result<()>
where
    T: Send + 'static,
    N: Fn(&T) -> String,
    F: Fn(T) -> Result<T> + Send + Sync + 'static,
    C: FnMut(T) -> Result<()>,
{
    let names: Vec<String> = items.iter().map(name_of).collect();
    let (gate_tx, gate_rx) = bounded::<()>(limit.max(1));
    let (error_tx, error_rx) = unbounded::<ChartTestError>();
    let (slot_txs, slot_rxs): (Vec<_>, Vec<_>) = items.iter().map(|_| bounded::<T>(1)).unzip();
    let cancelled = Arc::new(AtomicBool::new(false));

    let work = Arc::new(work);
    let dispatch_cancelled = Arc::clone(&cancelled);
    let dispatcher = thread::Builder::new()
        .name("chartcheck-dispatch".to_string())
        .spawn(move || {
            for (item, slot) in items.into_iter().zip(slot_txs) {
                // Acquire a token; blocks while `limit` workers are running.
                if gate_tx.send(()).is_err() {
                    return;
                }
                let permit = Permit(gate_rx.clone());
                if dispatch_cancelled.load(Ordering::SeqCst) {
                    return;
                }
                let work = Arc::clone(&work);
                let worker_error_tx = error_tx.clone();
                let spawned = thread::Builder::new().spawn(move || {
                    let _permit = permit;
                    match work(item) {
                        Ok(done) => {
                            let _ = slot.send(done);
                        }
                        Err(err) => {
                            let _ = worker_error_tx.send(err);
                        }
                    }
                });
                if let Err(err) = spawned {
                    let _ = error_tx.send(ChartTestError::io("spawning test worker", err));
                    return;
                }
            }
        });
    if let Err(err) = dispatcher {
        return Err(ChartTestError::io("spawning test dispatcher", err));
    }

    let result = consume_in_order(&names, &slot_rxs, &error_rx, &mut consume);
    if result.is_err() {
        cancelled.store(true, Ordering::SeqCst);
    }
    result
}

fn consume_in_order<T, C>(
    names: &[String],
    slots: &[Receiver<T>],
    errors: &Receiver<ChartTestError>,
    consume: &mut C,
) -> Result<()>
where
    C: FnMut(T) -> Result<()>,
{
    for (name, slot) in names.iter().zip(slots) {
        let abandoned = || ChartTestError::Worker { test: name.clone() };
        // A result that is already waiting wins over errors from later tests.
        let outcome = match slot.try_recv() {
            Ok(item) => Ok(item),
            Err(_) => select! {
                recv(errors) -> err => match err {
                    Ok(err) => Err(err),
                    // Every sender is gone; only this slot can still deliver.
                    Err(_) => slot.recv().map_err(|_| abandoned()),
                },
                recv(slot) -> done => match done {
                    Ok(item) => Ok(item),
                    // A failed worker reports its error before dropping its slot.
                    Err(_) => Err(errors.try_recv().unwrap_or_else(|_| abandoned())),
                },
            },
        };
        consume(outcome?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn results_arrive_in_submission_order() {
        let items: Vec<u64> = vec![40, 5, 30, 0, 10, 20];
        let mut seen = Vec::new();
        run_ordered(
            items.clone(),
            3,
            |n| n.to_string(),
            |n| {
                thread::sleep(Duration::from_millis(n));
                Ok(n)
            },
            |n| {
                seen.push(n);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(seen, items);
    }

    #[test]
    fn never_exceeds_the_limit() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        run_ordered(
            (0..12).collect::<Vec<u64>>(),
            2,
            |n| n.to_string(),
            move |n| {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5 + n % 3));
                r.fetch_sub(1, Ordering::SeqCst);
                Ok(n)
            },
            |_| Ok(()),
        )
        .unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn first_error_aborts() {
        let mut seen = Vec::new();
        let err = run_ordered(
            vec![1u32, 2, 3],
            1,
            |n| n.to_string(),
            |n| {
                if n == 2 {
                    thread::sleep(Duration::from_millis(20));
                    Err(ChartTestError::render(n.to_string(), "boom"))
                } else {
                    Ok(n)
                }
            },
            |n| {
                seen.push(n);
                Ok(())
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChartTestError::Render { ref test, .. } if test == "2"));
        assert_eq!(seen, [1]);
    }

    #[test]
    fn panicking_worker_is_reported() {
        let err = run_ordered(
            vec![1u32],
            1,
            |_| "exploding".to_string(),
            |_| -> Result<u32> { panic!("worker panic") },
            |_| Ok(()),
        )
        .unwrap_err();
        assert!(matches!(err, ChartTestError::Worker { ref test } if test == "exploding"));
    }

    #[test]
    fn consumer_error_stops_the_run() {
        let err = run_ordered(
            vec![1u32, 2],
            2,
            |n| n.to_string(),
            Ok,
            |_| Err(ChartTestError::Validator { message: "stop".into() }),
        )
        .unwrap_err();
        assert!(matches!(err, ChartTestError::Validator { .. }));
    }

    #[test]
    fn empty_input_is_fine() {
        run_ordered(Vec::<u32>::new(), 4, |n| n.to_string(), Ok, |_| Ok(())).unwrap();
    }

    #[test]
    fn suite_counts() {
        let mut suite = TestSuite::new(["a", "long-name"], Mode::Run);
        assert_eq!(suite.len(), 2);
        assert_eq!(suite.name_width(), 9);
        suite.tests[0].is_same = false;
        assert_eq!(suite.total_successful(), 1);
        assert!(!suite.is_successful());
    }
}
