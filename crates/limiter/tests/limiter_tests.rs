use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use ratewarden_limiter::{BucketParams, RateLimiter};

// A rate too slow to mint a token while a test is running.
const GLACIAL: f64 = 0.000001;

#[test]
fn concurrent_callers_admit_exactly_capacity() {
    const THREADS: usize = 8;
    const CALLS_PER_THREAD: usize = 100;
    const CAPACITY: u32 = 50;

    let limiter = RateLimiter::new(BucketParams::new(CAPACITY, GLACIAL)).unwrap();
    let allowed = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let limiter = limiter.clone();
            let allowed = Arc::clone(&allowed);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..CALLS_PER_THREAD {
                    if limiter.check("shared-key") {
                        allowed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // No double-spending, no lost grants: the 800 calls collectively win
    // exactly the bucket's capacity.
    assert_eq!(allowed.load(Ordering::Relaxed), CAPACITY as usize);
}

#[test]
fn racing_first_time_callers_share_one_bucket() {
    const THREADS: usize = 16;
    const CAPACITY: u32 = 8;

    let limiter = RateLimiter::new(BucketParams::new(CAPACITY, GLACIAL)).unwrap();
    let allowed = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let limiter = limiter.clone();
            let allowed = Arc::clone(&allowed);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                if limiter.check("brand-new-key") {
                    allowed.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Had the creation race produced a bucket per thread, all 16 calls
    // would have been admitted. One canonical bucket admits exactly 8.
    assert_eq!(allowed.load(Ordering::Relaxed), CAPACITY as usize);
    assert_eq!(limiter.registry().len(), 1);
}

#[test]
fn burst_then_refill_scenario() {
    // capacity=5, refill=1/sec: five immediate allows, a deny, a 2 second
    // wait earns back tokens for one more allow, then denial resumes.
    let limiter = RateLimiter::new(BucketParams::new(5, 1.0)).unwrap();

    for i in 0..5 {
        assert!(limiter.check("client"), "call {i} should be allowed");
    }
    assert!(!limiter.check("client"), "sixth immediate call is denied");

    thread::sleep(Duration::from_secs(2));

    assert!(limiter.check("client"), "tokens regenerated while waiting");
    assert!(!limiter.check("client"), "burst does not return all at once");
}

#[test]
fn sustained_rate_is_bounded() {
    let limiter = RateLimiter::new(BucketParams::new(2, 4.0)).unwrap();

    // Drain the burst.
    while limiter.check("steady") {}

    // ~500ms at 4 tokens/sec regenerates about 2 tokens. Allow a margin of
    // one for scheduler jitter, but the sustained bound must hold.
    thread::sleep(Duration::from_millis(500));
    let mut admitted = 0;
    while limiter.check("steady") {
        admitted += 1;
        assert!(admitted <= 3, "admissions exceed the sustained rate bound");
    }
    assert!(admitted >= 1, "no tokens regenerated after waiting");
}
