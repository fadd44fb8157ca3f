use std::cell::RefCell;

use consumer_pool::{ConsumerPool, Result};
use log::{Level, LevelFilter, Log, Metadata, Record};

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
}

/// Collects records per thread, so each test only sees what it logged itself.
struct ThreadCapture;

impl Log for ThreadCapture {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|records| {
            records
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static CAPTURE: ThreadCapture = ThreadCapture;

fn capture_warnings() {
    // Only the first test to get here installs the logger.
    let _ = log::set_logger(&CAPTURE);
    log::set_max_level(LevelFilter::Trace);
    RECORDS.with(|records| records.borrow_mut().clear());
}

fn warnings() -> Vec<String> {
    RECORDS.with(|records| {
        records
            .borrow()
            .iter()
            .filter(|(level, _)| *level == Level::Warn)
            .map(|(_, message)| message.clone())
            .collect()
    })
}

#[test]
fn enq_while_running_does_not_warn() -> Result<()> {
    capture_warnings();
    let pool = ConsumerPool::new(1)?;
    pool.enq(|| {});
    pool.start()?;
    pool.enq(|| {});
    assert!(warnings().is_empty());

    pool.poison();
    pool.join()?;
    Ok(())
}

#[test]
fn enq_after_poison_warns() -> Result<()> {
    capture_warnings();
    let pool = ConsumerPool::new(1)?;
    pool.start()?;
    pool.poison();
    pool.enq(|| {});

    assert_eq!(
        warnings(),
        vec!["Job enqueued after poison will not be executed"]
    );
    pool.join()?;
    Ok(())
}

#[test]
fn enq_after_stop_warns() -> Result<()> {
    capture_warnings();
    let pool = ConsumerPool::new(2)?;
    pool.start()?;
    pool.poison();
    pool.join()?;
    pool.enq(|| {});

    assert_eq!(
        warnings(),
        vec!["Job enqueued after poison will not be executed"]
    );
    assert_eq!(pool.pending(), 1);
    Ok(())
}

#[test]
fn repeated_poison_warns() -> Result<()> {
    capture_warnings();
    let pool = ConsumerPool::new(2)?;
    pool.poison();
    pool.poison();

    assert_eq!(warnings(), vec!["Pool already poisoned, ignoring"]);
    assert_eq!(pool.pending(), 2);
    Ok(())
}
