#![allow(dead_code)]

pub mod recording {
    use brrtmvc::error::DispatchError;
    use brrtmvc::middleware::{Before, Middleware};
    use brrtmvc::response::Response;
    use brrtmvc::RequestContext;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Shared, ordered log of hook calls, e.g. `"first:before"`.
    pub type CallLog = Arc<Mutex<Vec<String>>>;

    pub fn call_log() -> CallLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// What a [`RecordingMiddleware`] does in its before-hook.
    #[derive(Clone, Copy)]
    pub enum BeforeMode {
        Continue,
        Fail,
        Panic,
        Respond,
        Reject,
    }

    /// What a [`RecordingMiddleware`] does after logging its after or error hook.
    #[derive(Clone, Copy)]
    pub enum LateMode {
        Succeed,
        Fail,
        Panic,
    }

    pub struct RecordingMiddleware {
        label: String,
        log: CallLog,
        mode: BeforeMode,
        late: LateMode,
    }

    impl RecordingMiddleware {
        pub fn new(label: &str, log: &CallLog) -> Arc<Self> {
            Self::with_mode(label, log, BeforeMode::Continue)
        }

        pub fn with_mode(label: &str, log: &CallLog, mode: BeforeMode) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                log: Arc::clone(log),
                mode,
                late: LateMode::Succeed,
            })
        }

        /// Continues in its before-hook, then fails its after and error hooks.
        pub fn failing_late(label: &str, log: &CallLog, late: LateMode) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                log: Arc::clone(log),
                mode: BeforeMode::Continue,
                late,
            })
        }

        fn push(&self, phase: &str) {
            self.log.lock().push(format!("{}:{phase}", self.label));
        }

        fn finish_late(&self, phase: &str) -> anyhow::Result<()> {
            match self.late {
                LateMode::Succeed => Ok(()),
                LateMode::Fail => anyhow::bail!("{} {phase} hook refused", self.label),
                LateMode::Panic => panic!("{} {phase} hook blew up", self.label),
            }
        }
    }

    impl Middleware for RecordingMiddleware {
        fn name(&self) -> &str {
            &self.label
        }

        fn before_action(&self, _ctx: &mut RequestContext) -> anyhow::Result<Before> {
            self.push("before");
            match self.mode {
                BeforeMode::Continue => Ok(Before::Continue),
                BeforeMode::Fail => anyhow::bail!("{} refused", self.label),
                BeforeMode::Panic => panic!("{} blew up", self.label),
                BeforeMode::Respond => Ok(Before::Respond(
                    Response::text("short-circuited").with_status(200),
                )),
                BeforeMode::Reject => Ok(Before::Reject(DispatchError::unauthorized(
                    "rejected by test",
                ))),
            }
        }

        fn after_action(&self, _ctx: &RequestContext, _res: &mut Response) -> anyhow::Result<()> {
            self.push("after");
            self.finish_late("after")
        }

        fn on_error(&self, _ctx: &RequestContext, err: &DispatchError) -> anyhow::Result<()> {
            self.log
                .lock()
                .push(format!("{}:error:{:?}", self.label, err.kind()));
            self.finish_late("error")
        }
    }

    /// Invocation counter for handlers.
    #[derive(Clone, Default)]
    pub struct Calls(Arc<AtomicUsize>);

    impl Calls {
        pub fn hit(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        pub fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::time::Duration;

    /// Reserve a free local port.
    pub fn free_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&tmp[..n]);
                    if response_complete(&buf) {
                        break;
                    }
                }
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn response_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head.lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        });
        length.is_some_and(|n| body.len() >= n)
    }

    /// Split a raw response into status, content-type and body.
    pub fn parse_response_parts(resp: &str) -> (u16, String, String) {
        let mut parts = resp.splitn(2, "\r\n\r\n");
        let headers = parts.next().unwrap_or("");
        let body = parts.next().unwrap_or("").to_string();
        let mut status = 0;
        let mut content_type = String::new();
        for line in headers.lines() {
            if line.starts_with("HTTP/1.1") {
                status = line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("0")
                    .parse()
                    .unwrap();
            } else if let Some((name, val)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-type") {
                    content_type = val.trim().to_string();
                }
            }
        }
        (status, content_type, body)
    }
}

pub mod templates {
    use std::fs;
    use tempfile::TempDir;

    /// Template directory holding the given `(group/view, source)` files.
    pub fn template_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (view, source) in files {
            let path = dir.path().join(format!("{view}.html"));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, source).unwrap();
        }
        dir
    }

    pub fn with_error_pages(files: &[(&str, &str)]) -> TempDir {
        let mut all = vec![
            ("shared/not_found", "missing {{ path }}"),
            ("shared/unauthorized", "denied: {{ message }}"),
            ("shared/error", "error {{ status }}"),
        ];
        all.extend_from_slice(files);
        template_dir(&all)
    }
}
