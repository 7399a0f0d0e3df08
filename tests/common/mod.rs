#![allow(dead_code)]

use async_trait::async_trait;
use q3scan_rs::error::ProbeError;
use q3scan_rs::transport::{ProbeSession, ProbeTransport, Request, Response};
use q3scan_rs::types::Target;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a fake port answers.
#[derive(Clone, Debug)]
pub enum Reply {
    Data(Vec<u8>),
    Error,
    Silent,
    Panic,
}

/// Counters shared by a fake transport and every session it opens.
#[derive(Default, Debug)]
pub struct Stats {
    pub opened: AtomicUsize,
    pub terminated: AtomicUsize,
    pub info_requests: AtomicUsize,
    pub proxy_requests: AtomicUsize,
}

impl Stats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// In-memory transport: ports not listed answer with a transport error.
#[derive(Default)]
pub struct FakeTransport {
    replies: HashMap<u16, Reply>,
    pub stats: Arc<Stats>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, port: u16, reply: Reply) -> Self {
        self.replies.insert(port, reply);
        self
    }
}

#[async_trait]
impl ProbeTransport for FakeTransport {
    async fn open(&self, target: &Target) -> Result<Box<dyn ProbeSession>, ProbeError> {
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            stats: self.stats.clone(),
            reply: self.replies.get(&target.port).cloned().unwrap_or(Reply::Error),
            terminated: false,
        }))
    }
}

struct FakeSession {
    stats: Arc<Stats>,
    reply: Reply,
    terminated: bool,
}

#[async_trait]
impl ProbeSession for FakeSession {
    async fn request(
        &mut self,
        request: &Request,
        _timeout: Duration,
    ) -> Result<Response, ProbeError> {
        match request {
            Request::GetInfo => self.stats.info_requests.fetch_add(1, Ordering::SeqCst),
            Request::Command(_) => self.stats.proxy_requests.fetch_add(1, Ordering::SeqCst),
        };
        match &self.reply {
            Reply::Data(data) => Ok(Response::new(data.clone())),
            Reply::Error => Err(ProbeError::Transport(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "refused",
            ))),
            Reply::Silent => std::future::pending().await,
            Reply::Panic => panic!("transport exploded"),
        }
    }

    fn terminate(&mut self) {
        if !self.terminated {
            self.terminated = true;
            self.stats.terminated.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub fn info_reply(pairs: &[(&str, &str)]) -> Reply {
    let mut data = String::from("infoResponse\n");
    for (k, v) in pairs {
        data.push('\\');
        data.push_str(k);
        data.push('\\');
        data.push_str(v);
    }
    Reply::Data(data.into_bytes())
}

/// Cloneable writer so tests can read what a shared reporter printed.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Terminal rows that were ended with a newline, as a user would see them.
pub fn permanent_rows(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    let mut segments: Vec<&str> = text.split('\n').collect();
    segments.pop();
    segments.into_iter().map(render_row).collect()
}

fn render_row(segment: &str) -> String {
    let mut row: Vec<char> = Vec::new();
    let mut col = 0;
    for ch in segment.chars() {
        if ch == '\r' {
            col = 0;
            continue;
        }
        if col < row.len() {
            row[col] = ch;
        } else {
            row.push(ch);
        }
        col += 1;
    }
    row.into_iter().collect::<String>().trim_end().to_string()
}
