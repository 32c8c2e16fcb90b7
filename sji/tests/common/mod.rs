//! In-process fake of the remote admin API over a raw TCP listener

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// `importer:secret`
pub const IMPORTER_AUTH: &str = "Basic aW1wb3J0ZXI6c2VjcmV0";

const MISSING_REPOSITORIES: &str = "Permission target request missing repositories";
const NON_EXISTING_REPOSITORY: &str = "Permission target contains a reference to a non-existing repository";

#[derive(Debug)]
pub struct RemoteState {
    pub version: String,
    pub accepted_auth: String,
    pub ping_down: bool,
    /// Successful pings left before ping goes down; `None` is unlimited
    pub ping_budget: Option<usize>,
    pub repositories: HashSet<String>,
    /// Paths that answer 429 once before behaving normally
    pub throttle_once: HashSet<String>,
    /// Paths that always answer 400
    pub rejected: HashSet<String>,
    pub groups: BTreeMap<String, Value>,
    pub users: BTreeMap<String, Value>,
    pub permissions: BTreeMap<String, Value>,
    /// Raw files stored under `/files/<name>`
    pub files: BTreeMap<String, String>,
    pub hits: Vec<(String, String)>,
}

impl Default for RemoteState {
    fn default() -> Self {
        Self {
            version: "7.10.2".to_string(),
            accepted_auth: IMPORTER_AUTH.to_string(),
            ping_down: false,
            ping_budget: None,
            repositories: HashSet::new(),
            throttle_once: HashSet::new(),
            rejected: HashSet::new(),
            groups: BTreeMap::new(),
            users: BTreeMap::new(),
            permissions: BTreeMap::new(),
            files: BTreeMap::new(),
            hits: Vec::new(),
        }
    }
}

impl RemoteState {
    pub fn hits(&self, method: &str, path: &str) -> usize {
        self.hits.iter().filter(|(m, p)| m == method && p == path).count()
    }

    fn route(&mut self, method: &str, path: &str, body: &[u8], auth: Option<&str>) -> (u16, String) {
        self.hits.push((method.to_string(), path.to_string()));
        if self.throttle_once.remove(path) {
            return (429, String::new());
        }
        if self.rejected.contains(path) {
            return (400, "rejected".to_string());
        }

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match (method, segments.as_slice()) {
            ("GET", ["api", "system", "ping"]) => {
                if self.ping_down || self.ping_budget == Some(0) {
                    (503, "down".to_string())
                } else if auth != Some(self.accepted_auth.as_str()) {
                    (401, "Unauthorized".to_string())
                } else {
                    if let Some(left) = self.ping_budget.as_mut() {
                        *left -= 1;
                    }
                    (200, "OK".to_string())
                }
            }
            ("GET", ["api", "system", "version"]) => (200, json!({ "version": self.version }).to_string()),
            ("PUT", ["api", "security", "groups", name]) => {
                self.groups.insert(name.to_string(), parse(body));
                (201, String::new())
            }
            ("GET", ["api", "security", "users", name]) => match self.users.get(*name) {
                Some(user) => (200, user.to_string()),
                None => (404, String::new()),
            },
            ("PUT", ["api", "security", "users", name]) => {
                self.users.insert(name.to_string(), parse(body));
                (201, String::new())
            }
            ("PUT", ["api", "security", "permissions", name]) => {
                self.permissions.insert(name.to_string(), parse(body));
                (200, String::new())
            }
            ("PUT", ["api", "v2", "security", "permissions", name]) => {
                let record = parse(body);
                let keys: Vec<String> = record["repo"]["repositories"]
                    .as_array()
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                if let Some(missing) = keys.iter().find(|k| !self.repositories.contains(*k)) {
                    let message = if missing.starts_with("deleted") {
                        NON_EXISTING_REPOSITORY
                    } else {
                        MISSING_REPOSITORIES
                    };
                    return (400, json!({ "errors": [{ "status": 400, "message": message }] }).to_string());
                }
                self.permissions.insert(name.to_string(), record);
                (200, String::new())
            }
            ("HEAD", ["api", "repositories", key]) => {
                if self.repositories.contains(*key) {
                    (200, String::new())
                } else {
                    (404, String::new())
                }
            }
            ("PUT", ["files", name]) => {
                self.files.insert(name.to_string(), String::from_utf8_lossy(body).to_string());
                (201, String::new())
            }
            ("GET", ["files", name]) => match self.files.get(*name) {
                Some(content) => (200, content.clone()),
                None => (404, String::new()),
            },
            _ => (404, "Not Found".to_string()),
        }
    }
}

fn parse(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decode a complete chunked body
fn dechunk(mut raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(line_end) = find(raw, b"\r\n") {
        let size_line = String::from_utf8_lossy(&raw[..line_end]).to_string();
        let size = usize::from_str_radix(size_line.split(';').next().unwrap_or("0").trim(), 16).unwrap_or(0);
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        let end = (start + size).min(raw.len());
        out.extend_from_slice(&raw[start..end]);
        raw = &raw[(end + 2).min(raw.len())..];
    }
    out
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<RemoteState>>) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    let mut chunked = false;
    let mut auth = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "transfer-encoding" => chunked = value.trim().eq_ignore_ascii_case("chunked"),
                "authorization" => auth = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    let body = if chunked {
        while !buf[header_end..].ends_with(b"0\r\n\r\n") {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        dechunk(&buf[header_end..])
    } else {
        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let end = (header_end + content_length).min(buf.len());
        buf[header_end..end].to_vec()
    };

    let (status, response_body) = state.lock().unwrap().route(&method, &path, &body, auth.as_deref());
    let head = format!(
        "HTTP/1.1 {} Fake\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        response_body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    if method != "HEAD" {
        stream.write_all(response_body.as_bytes()).await?;
    }
    stream.shutdown().await
}

/// Fake remote running on its own thread and runtime
pub struct FakeRemote {
    pub url: String,
    pub state: Arc<Mutex<RemoteState>>,
}

impl FakeRemote {
    pub fn start(state: RemoteState) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(Mutex::new(state));
        let served = state.clone();

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            runtime.block_on(async move {
                let listener = TcpListener::from_std(listener).unwrap();
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        continue;
                    };
                    tokio::spawn(serve(stream, served.clone()));
                }
            });
        });

        Self { url, state }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap()
    }
}

pub const SECURITY_JSON: &str = r#"{
    "groups": [
        {"groupName": "devs", "description": "developers", "newUserDefault": false, "realm": "internal"},
        {"groupName": "ops", "description": "operations", "newUserDefault": true, "realm": "internal"},
        {"groupName": "flaky", "description": "throttled once", "realm": "internal"}
    ],
    "repoAcls": [
        {
            "aces": [{"principal": "devs", "group": true, "permissionsAsString": ["r", "w"], "permissionsDisplayNames": ["read", "write"]}],
            "permissionTarget": {"name": "libs", "includes": ["**"], "excludes": [], "repoKeys": ["libs-release", "jcenter-cache"]}
        },
        {
            "aces": [{"principal": "ops", "group": true, "permissionsAsString": ["r"], "permissionsDisplayNames": ["read"]}],
            "permissionTarget": {"name": "legacy-stuff", "includes": ["**"], "excludes": [], "repoKeys": ["deleted-repo"]}
        }
    ],
    "buildAcls": [
        {
            "aces": [{"principal": "ci", "group": false, "permissionsAsString": ["r"], "permissionsDisplayNames": ["read"]}],
            "permissionTarget": {"name": "builds", "includes": ["**"], "excludes": [], "repoKeys": ["artifactory-build-info"]}
        }
    ]
}"#;

pub const USERS_WITH_GROUPS: &str = r#"{
    "users": [
        {"name": "alice", "email": "alice@corp.example", "groups": ["devs"]},
        {"name": "bob", "email": "bob@corp.example", "groups": ["ops"]},
        {"name": "admin", "email": "admin@corp.example", "admin": true}
    ]
}"#;

/// Remote with the repositories the fixtures expect, alice already present
pub fn seeded_state() -> RemoteState {
    let mut state = RemoteState::default();
    state.repositories = ["libs-release", "jcenter"].iter().map(|s| s.to_string()).collect();
    state.throttle_once.insert("/api/security/groups/flaky".to_string());
    state
        .users
        .insert("alice".to_string(), json!({"name": "alice", "email": "alice@corp.example", "groups": ["ops"]}));
    state
}
