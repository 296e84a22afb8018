//! Minimal HTTP stand-in for the EC2 Query API.
//!
//! Replies are queued per action; the last reply for an action is repeated.
//! Every connection is answered once and closed.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

/// One request received by the fake service.
#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    /// Decoded query parameters.
    pub params: BTreeMap<String, String>,
    /// Lower-cased request headers.
    pub headers: BTreeMap<String, String>,
}

impl ReceivedRequest {
    /// Returns the `Action` parameter.
    pub fn action(&self) -> &str {
        self.params.get("Action").map_or("", String::as_str)
    }
}

#[derive(Default)]
struct State {
    replies: HashMap<String, VecDeque<(u16, String)>>,
    requests: Vec<ReceivedRequest>,
}

/// Handle on a running fake service.
#[derive(Clone, Default)]
pub struct FakeEc2 {
    state: Arc<Mutex<State>>,
}

impl FakeEc2 {
    /// Binds to an ephemeral port and serves on a background thread.
    pub fn start() -> (Self, String) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .unwrap_or_else(|err| panic!("bind fake EC2 listener: {err}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|err| panic!("fake EC2 address: {err}"));
        let fake = Self::default();
        let server = fake.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                server.handle(stream);
            }
        });
        (fake, format!("http://{addr}"))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("fake EC2 state poisoned: {err}"))
    }

    /// Queues a 200 reply for `action`.
    pub fn reply(&self, action: &str, body: impl Into<String>) {
        self.reply_status(action, 200, body);
    }

    /// Queues a reply with an explicit status for `action`.
    pub fn reply_status(&self, action: &str, status: u16, body: impl Into<String>) {
        self.lock()
            .replies
            .entry(action.to_owned())
            .or_default()
            .push_back((status, body.into()));
    }

    /// Returns every received request in order.
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.lock().requests.clone()
    }

    /// Returns the actions received in order.
    pub fn actions(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| request.action().to_owned())
            .collect()
    }

    fn handle(&self, stream: TcpStream) {
        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            return;
        }
        let mut headers = BTreeMap::new();
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) if line.trim().is_empty() => break,
                Ok(_) => {
                    if let Some((name, value)) = line.split_once(':') {
                        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
                    }
                }
            }
        }

        let target = request_line.split_whitespace().nth(1).unwrap_or("/");
        let params: BTreeMap<String, String> = url::Url::parse(&format!("http://fake{target}"))
            .map(|parsed| {
                parsed
                    .query_pairs()
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        let request = ReceivedRequest { params, headers };
        let action = request.action().to_owned();

        let (status, body) = {
            let mut state = self.lock();
            state.requests.push(request);
            match state.replies.get_mut(&action) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
            .unwrap_or_else(|| (400, format!("<Response>unexpected {action}</Response>")))
        };

        let response = format!(
            "HTTP/1.1 {status} {}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            if status < 300 { "OK" } else { "Error" },
            body.len()
        );
        let mut writer = &stream;
        if writer.write_all(response.as_bytes()).is_ok() {
            writer.flush().ok();
        }
    }
}
