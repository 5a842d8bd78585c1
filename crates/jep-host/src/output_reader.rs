//! Asynchronous process-output reader (spec §4.I).
//!
//! Grounded in `examples/original_source/jep/async_line_reader.py`'s
//! `AsynchronousFileReader`: a background thread repeatedly reads one line
//! and pushes it onto a queue; the consumer only ever peeks non-blockingly
//! via [`OutputReader::try_pop`], never joins the producer except at
//! shutdown. The Python original reads a single already-merged stdout
//! stream (`stderr=STDOUT` at spawn time); Rust's `std::process::Command`
//! has no equivalent fd merge, so two threads — one per pipe — feed the
//! same shared queue, approximating "merged" well enough for line-oriented
//! consumption (the banner line of interest is always stdout).

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Background-thread-fed FIFO of lines read from a subprocess's output.
pub struct OutputReader {
    queue: Arc<Mutex<VecDeque<String>>>,
    readers_alive: Arc<AtomicUsize>,
    handles: Vec<JoinHandle<()>>,
}

impl OutputReader {
    /// Spawns reader threads over the process's stdout and stderr pipes,
    /// both feeding the same queue.
    pub fn spawn<O, E>(stdout: O, stderr: E) -> Self
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let readers_alive = Arc::new(AtomicUsize::new(2));
        let handles = vec![
            spawn_line_reader(stdout, Arc::clone(&queue), Arc::clone(&readers_alive)),
            spawn_line_reader(stderr, Arc::clone(&queue), Arc::clone(&readers_alive)),
        ];
        Self {
            queue,
            readers_alive,
            handles,
        }
    }

    /// Pops the oldest buffered line, if any, without blocking.
    pub fn try_pop(&self) -> Option<String> {
        lock(&self.queue).pop_front()
    }

    /// True once every reader thread has seen end-of-stream and the queue
    /// has been fully drained.
    #[must_use]
    pub fn eof(&self) -> bool {
        self.readers_alive.load(Ordering::SeqCst) == 0 && lock(&self.queue).is_empty()
    }

    /// Waits up to `timeout` for every reader thread to finish, then joins
    /// them. Returns `false` (without blocking further) if a thread is
    /// still running past the deadline; it is left to finish on its own,
    /// which happens once the peer's pipe end closes.
    pub fn join(self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.readers_alive.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if self.readers_alive.load(Ordering::SeqCst) > 0 {
            return false;
        }
        for handle in self.handles {
            let _ignored = handle.join();
        }
        true
    }
}

fn lock(queue: &Arc<Mutex<VecDeque<String>>>) -> std::sync::MutexGuard<'_, VecDeque<String>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

fn spawn_line_reader<R>(
    reader: R,
    queue: Arc<Mutex<VecDeque<String>>>,
    readers_alive: Arc<AtomicUsize>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffered = BufReader::new(reader);
        let mut line = String::new();
        loop {
            line.clear();
            match buffered.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => lock(&queue).push_back(std::mem::take(&mut line)),
            }
        }
        readers_alive.fetch_sub(1, Ordering::SeqCst);
    })
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used, reason = "tests use unwrap for clarity")]

    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn reads_lines_from_both_streams() {
        let stdout = Cursor::new(b"JEP service, listening on port 4711\n".to_vec());
        let stderr = Cursor::new(b"warning: noisy backend\n".to_vec());
        let reader = OutputReader::spawn(stdout, stderr);

        assert!(reader.join(Duration::from_secs(1)));

        let mut lines = Vec::new();
        while let Some(line) = reader.try_pop() {
            lines.push(line);
        }
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "JEP service, listening on port 4711\n".to_string(),
                "warning: noisy backend\n".to_string(),
            ]
        );
    }

    #[test]
    fn eof_once_empty_and_readers_finished() {
        let reader = OutputReader::spawn(Cursor::new(Vec::new()), Cursor::new(Vec::new()));
        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while !reader.eof() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(reader.eof());
    }
}
