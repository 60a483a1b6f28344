//! Minimal HTTP/1.1 server that serves static blobs by path for integration tests.
//!
//! Every GET is counted per path. Unknown paths get 404. A path can be set up
//! to answer 503 for its first N requests to exercise retry.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Default)]
struct State {
    blobs: HashMap<String, Vec<u8>>,
    fail_first: HashMap<String, usize>,
    requests: HashMap<String, usize>,
}

#[derive(Clone)]
pub struct BlobServer {
    base: String,
    state: Arc<Mutex<State>>,
}

impl BlobServer {
    /// Starts a server in a background thread. The server runs until the process exits.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    /// Server prefix to pass to the fetcher: blobs live under `/blobs/`.
    pub fn prefix(&self) -> String {
        format!("{}/blobs/", self.base)
    }

    pub fn serve(&self, name: &str, body: &[u8]) {
        let mut st = self.state.lock().unwrap();
        st.blobs.insert(format!("/blobs/{}", name), body.to_vec());
    }

    pub fn fail_first(&self, name: &str, n: usize) {
        let mut st = self.state.lock().unwrap();
        st.fail_first.insert(format!("/blobs/{}", name), n);
    }

    pub fn requests(&self, name: &str) -> usize {
        let st = self.state.lock().unwrap();
        st.requests
            .get(&format!("/blobs/{}", name))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.state.lock().unwrap().requests.values().sum()
    }
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let mut parts = request.lines().next().unwrap_or("").split_whitespace();
    let (method, path) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    let (status, body) = {
        let mut st = state.lock().unwrap();
        let seen = {
            let count = st.requests.entry(path.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let failing = st.fail_first.get(path).copied().unwrap_or(0);
        if seen <= failing {
            ("503 Service Unavailable", Vec::new())
        } else {
            match st.blobs.get(path) {
                Some(b) => ("200 OK", b.clone()),
                None => ("404 Not Found", b"not found".to_vec()),
            }
        }
    };
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
}
