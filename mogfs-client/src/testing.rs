//! In-process tracker and storage node for tests
//!
//! [`MockTracker`] speaks the tracker line protocol over real TCP and keeps a
//! small in-memory namespace, so the store workflow can run end to end.
//! Faults can be queued per command to exercise the resend policy.
//! [`MockStorageNode`] is a plain HTTP/1 server that keeps PUT bodies in memory.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use mogfs_core::FieldSet;
use mogfs_net::{commands, decode_payload, encode_payload, fields, Params};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

/// Scripted misbehaviour for the next request with a given command
#[derive(Debug, Clone)]
pub enum Fault {
    /// Read the request, then close the connection without replying
    Hangup,
    /// Answer with this line instead of handling the request
    Reply(String),
    /// Send these bytes without a line terminator, then close
    Partial(String),
    /// Wait before handling the request normally
    Delay(Duration),
}

type Reply = std::result::Result<Params, (&'static str, String)>;

#[derive(Debug, Clone)]
struct StoredFile {
    fid: u64,
    class: String,
    path: String,
    length: u64,
}

#[derive(Debug, Default)]
struct MockDomain {
    classes: BTreeMap<String, u32>,
    files: BTreeMap<String, StoredFile>,
}

#[derive(Debug)]
struct TrackerState {
    storage_base: String,
    domains: BTreeMap<String, MockDomain>,
    open_fids: HashMap<u64, String>,
    next_fid: u64,
    faults: VecDeque<(String, Fault)>,
    requests: Vec<String>,
    connections: usize,
}

/// In-memory tracker listening on a loopback port
pub struct MockTracker {
    addr: SocketAddr,
    state: Arc<Mutex<TrackerState>>,
    task: JoinHandle<()>,
}

impl MockTracker {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(TrackerState {
            // Nothing listens on port 1, so uploads fail until a storage
            // node is attached
            storage_base: "http://127.0.0.1:1".to_string(),
            domains: BTreeMap::new(),
            open_fids: HashMap::new(),
            next_fid: 1,
            faults: VecDeque::new(),
            requests: Vec::new(),
            connections: 0,
        }));

        let task = tokio::spawn(accept_tracker_connections(listener, state.clone()));
        Ok(MockTracker { addr, state, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `host:port` suitable for a client host list
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Base URL that `create_open` hands out paths under
    pub fn set_storage(&self, base_url: impl Into<String>) {
        lock(&self.state).storage_base = base_url.into();
    }

    pub fn add_domain(&self, name: &str) {
        lock(&self.state).domains.entry(name.to_string()).or_default();
    }

    /// Register a finished file directly, bypassing the store workflow
    pub fn add_file(&self, domain: &str, key: &str, path: &str, length: u64) -> u64 {
        let mut state = lock(&self.state);
        let fid = state.next_fid;
        state.next_fid += 1;
        state
            .domains
            .entry(domain.to_string())
            .or_default()
            .files
            .insert(
                key.to_string(),
                StoredFile {
                    fid,
                    class: "default".to_string(),
                    path: path.to_string(),
                    length,
                },
            );
        fid
    }

    /// Queue a fault for the next request with `command`
    pub fn inject(&self, command: &str, fault: Fault) {
        lock(&self.state)
            .faults
            .push_back((command.to_string(), fault));
    }

    /// Requests received with `command`, including faulted ones
    pub fn request_count(&self, command: &str) -> usize {
        lock(&self.state)
            .requests
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }

    pub fn connection_count(&self) -> usize {
        lock(&self.state).connections
    }
}

impl Drop for MockTracker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn accept_tracker_connections(listener: TcpListener, state: Arc<Mutex<TrackerState>>) {
    while let Ok((stream, peer)) = listener.accept().await {
        debug!(%peer, "mock tracker accepted connection");
        lock(&state).connections += 1;
        tokio::spawn(serve_tracker_connection(stream, state.clone()));
    }
}

async fn serve_tracker_connection(stream: TcpStream, state: Arc<Mutex<TrackerState>>) {
    let mut stream = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        match stream.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        let (command, args) = parse_request(&line);
        let reply = match record_request(&state, &command) {
            Some(Fault::Hangup) => return,
            Some(Fault::Partial(data)) => {
                let _ = stream.get_mut().write_all(data.as_bytes()).await;
                return;
            }
            Some(Fault::Reply(line)) => format!("{}\r\n", line),
            Some(Fault::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                respond(&state, &command, &args)
            }
            None => respond(&state, &command, &args),
        };

        if stream.get_mut().write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

fn parse_request(line: &str) -> (String, FieldSet) {
    let line = line.trim_end_matches(['\r', '\n']);
    let (command, args) = line.split_once(' ').unwrap_or((line, ""));
    (command.to_string(), decode_payload(args))
}

fn record_request(state: &Mutex<TrackerState>, command: &str) -> Option<Fault> {
    let mut state = lock(state);
    state.requests.push(command.to_string());
    let position = state.faults.iter().position(|(c, _)| c == command)?;
    state.faults.remove(position).map(|(_, fault)| fault)
}

fn respond(state: &Mutex<TrackerState>, command: &str, args: &FieldSet) -> String {
    match lock(state).handle(command, args) {
        Ok(params) => format!("OK 1 {}\r\n", encode_payload(&params)),
        Err((code, message)) => format!("ERR {} {}\r\n", code, message),
    }
}

fn arg<'a>(args: &'a FieldSet, name: &str) -> std::result::Result<&'a str, (&'static str, String)> {
    args.get(name)
        .filter(|v| !v.is_empty())
        .ok_or(("missing_argument", format!("{}+is+required", name)))
}

fn numeric_arg<T: std::str::FromStr>(args: &FieldSet, name: &str) -> std::result::Result<T, (&'static str, String)> {
    arg(args, name)?
        .parse()
        .map_err(|_| ("invalid_argument", format!("bad+{}", name)))
}

fn unknown_key() -> (&'static str, String) {
    ("unknown_key", "unknown_key".to_string())
}

impl TrackerState {
    fn handle(&mut self, command: &str, args: &FieldSet) -> Reply {
        match command {
            commands::NOOP | commands::SLEEP => Ok(Params::new()),
            commands::CREATE_DOMAIN => self.create_domain(args),
            commands::DELETE_DOMAIN => self.delete_domain(args),
            commands::GET_DOMAINS => Ok(self.get_domains()),
            commands::CREATE_CLASS | commands::UPDATE_CLASS | commands::DELETE_CLASS => {
                self.change_class(command, args)
            }
            commands::CREATE_OPEN => self.create_open(args),
            commands::CREATE_CLOSE => self.create_close(args),
            commands::GET_PATHS => {
                let file = self.file(args)?;
                Ok(Params::new().with("paths", 1).with("path1", &file.path))
            }
            commands::FILE_INFO => {
                let file = self.file(args)?;
                Ok(Params::new()
                    .with(fields::FID, file.fid)
                    .with(fields::DOMAIN, arg(args, fields::DOMAIN)?)
                    .with(fields::KEY, arg(args, fields::KEY)?)
                    .with(fields::CLASS, &file.class)
                    .with("length", file.length)
                    .with("devcount", 1))
            }
            commands::DELETE => {
                let key = arg(args, fields::KEY)?;
                self.domain_mut(args)?
                    .files
                    .remove(key)
                    .map(|_| Params::new())
                    .ok_or_else(unknown_key)
            }
            commands::RENAME => self.rename(args),
            commands::LIST_KEYS => self.list_keys(args),
            commands::LIST_FIDS => self.list_fids(args),
            commands::GET_HOSTS => Ok(Params::new()
                .with("hosts", 1)
                .with("host1_hostid", 1)
                .with("host1_hostname", "mock-store")
                .with("host1_status", "alive")
                .with("host1_hostip", "127.0.0.1")
                .with("host1_http_port", 7500)),
            commands::GET_DEVICES => Ok(Params::new()
                .with("devices", 1)
                .with("dev1_devid", 1)
                .with("dev1_hostid", 1)
                .with("dev1_status", "alive")
                .with("dev1_observed_state", "writeable")
                .with("dev1_weight", 100)
                .with("dev1_mb_total", 1000)
                .with("dev1_mb_used", 0)
                .with("dev1_mb_free", 1000)),
            _ => Err(("unknown_command", format!("Unknown+command+{}", command))),
        }
    }

    fn domain_mut(&mut self, args: &FieldSet) -> std::result::Result<&mut MockDomain, (&'static str, String)> {
        let name = arg(args, fields::DOMAIN)?;
        self.domains
            .get_mut(name)
            .ok_or(("unreg_domain", "Domain+name+invalid/not+found".to_string()))
    }

    fn file(&mut self, args: &FieldSet) -> std::result::Result<StoredFile, (&'static str, String)> {
        let key = arg(args, fields::KEY)?;
        self.domain_mut(args)?
            .files
            .get(key)
            .cloned()
            .ok_or_else(unknown_key)
    }

    fn create_domain(&mut self, args: &FieldSet) -> Reply {
        let name = arg(args, fields::DOMAIN)?;
        if self.domains.contains_key(name) {
            return Err(("domain_exists", "That+domain+already+exists".to_string()));
        }
        self.domains.insert(name.to_string(), MockDomain::default());
        Ok(Params::new().with(fields::DOMAIN, name))
    }

    fn delete_domain(&mut self, args: &FieldSet) -> Reply {
        let name = arg(args, fields::DOMAIN)?;
        match self.domains.get(name) {
            None => Err(("domain_not_found", "Domain+not+found".to_string())),
            Some(domain) if !domain.files.is_empty() => {
                Err(("domain_has_files", "Domain+still+has+files".to_string()))
            }
            Some(_) => {
                self.domains.remove(name);
                Ok(Params::new().with(fields::DOMAIN, name))
            }
        }
    }

    fn get_domains(&self) -> Params {
        let mut params = Params::new().with("domains", self.domains.len());
        for (i, (name, domain)) in self.domains.iter().enumerate() {
            let prefix = format!("domain{}", i + 1);
            params.push(&prefix, name);
            params.push(&format!("{}classes", prefix), domain.classes.len());
            for (j, (class, mindevcount)) in domain.classes.iter().enumerate() {
                params.push(&format!("{}class{}name", prefix, j + 1), class);
                params.push(&format!("{}class{}mindevcount", prefix, j + 1), mindevcount);
            }
        }
        params
    }

    fn change_class(&mut self, command: &str, args: &FieldSet) -> Reply {
        let class = arg(args, fields::CLASS)?.to_string();
        let mindevcount = args.get(fields::MINDEVCOUNT).and_then(|v| v.parse().ok());
        let domain = self.domain_mut(args)?;

        match (command, domain.classes.contains_key(&class)) {
            (commands::CREATE_CLASS, true) => Err(("class_exists", "That+class+already+exists".to_string())),
            (commands::CREATE_CLASS, false) | (commands::UPDATE_CLASS, true) => {
                domain.classes.insert(class.clone(), mindevcount.unwrap_or(2));
                Ok(Params::new().with(fields::CLASS, class))
            }
            (commands::DELETE_CLASS, true) => {
                domain.classes.remove(&class);
                Ok(Params::new().with(fields::CLASS, class))
            }
            _ => Err(("class_not_found", "Class+not+found".to_string())),
        }
    }

    fn create_open(&mut self, args: &FieldSet) -> Reply {
        let class = args.get(fields::CLASS).filter(|c| !c.is_empty());
        let domain = self.domain_mut(args)?;
        if let Some(class) = class {
            if class != "default" && !domain.classes.contains_key(class) {
                return Err(("unreg_class", "Invalid+class".to_string()));
            }
        }
        let class = class.unwrap_or("default").to_string();

        let fid = self.next_fid;
        self.next_fid += 1;
        self.open_fids.insert(fid, class);

        let path = format!("{}/dev1/0/000/000/{:010}.fid", self.storage_base, fid);
        Ok(Params::new()
            .with(fields::FID, fid)
            .with(fields::DEVID, 1)
            .with(fields::PATH, path))
    }

    fn create_close(&mut self, args: &FieldSet) -> Reply {
        let fid: u64 = numeric_arg(args, fields::FID)?;
        let key = arg(args, fields::KEY)?.to_string();
        let path = arg(args, fields::PATH)?.to_string();
        let length = args
            .get(fields::SIZE)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let class = self
            .open_fids
            .remove(&fid)
            .ok_or(("no_temp_file", "No+tempfile+or+bogus+fid".to_string()))?;
        self.domain_mut(args)?.files.insert(
            key,
            StoredFile {
                fid,
                class,
                path,
                length,
            },
        );
        Ok(Params::new())
    }

    fn rename(&mut self, args: &FieldSet) -> Reply {
        let from = arg(args, fields::FROM_KEY)?;
        let to = arg(args, fields::TO_KEY)?;
        let domain = self.domain_mut(args)?;

        if domain.files.contains_key(to) {
            return Err(("key_exists", "Target+key+name+already+exists".to_string()));
        }
        let file = domain.files.remove(from).ok_or_else(unknown_key)?;
        domain.files.insert(to.to_string(), file);
        Ok(Params::new())
    }

    fn list_keys(&mut self, args: &FieldSet) -> Reply {
        let prefix = args.get(fields::PREFIX).unwrap_or("");
        let after = args.get(fields::AFTER).unwrap_or("");
        let limit = args
            .get(fields::LIMIT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000usize);
        let domain = self.domain_mut(args)?;

        let keys: Vec<&String> = domain
            .files
            .keys()
            .filter(|k| k.starts_with(prefix) && k.as_str() > after)
            .take(limit)
            .collect();

        let mut params = Params::new().with("key_count", keys.len());
        for (i, key) in keys.iter().enumerate() {
            params.push(&format!("key_{}", i + 1), key);
        }
        if let Some(last) = keys.last() {
            params.push("next_after", last);
        }
        Ok(params)
    }

    fn list_fids(&mut self, args: &FieldSet) -> Reply {
        let from: u64 = numeric_arg(args, fields::FROM)?;
        let to: u64 = numeric_arg(args, fields::TO)?;

        let mut found: Vec<(&String, &String, &StoredFile)> = self
            .domains
            .iter()
            .flat_map(|(name, domain)| domain.files.iter().map(move |(key, file)| (name, key, file)))
            .filter(|(_, _, file)| (from..=to).contains(&file.fid))
            .collect();
        found.sort_by_key(|(_, _, file)| file.fid);

        let mut params = Params::new().with("fid_count", found.len());
        for (i, (domain, key, file)) in found.iter().enumerate() {
            let prefix = format!("fid_{}", i + 1);
            params.push(&format!("{}_fid", prefix), file.fid);
            params.push(&format!("{}_domain", prefix), domain);
            params.push(&format!("{}_key", prefix), key);
            params.push(&format!("{}_class", prefix), &file.class);
            params.push(&format!("{}_length", prefix), file.length);
            params.push(&format!("{}_devcount", prefix), 1);
        }
        Ok(params)
    }
}

#[derive(Debug, Default)]
struct StorageState {
    objects: Mutex<HashMap<String, (Bytes, Option<String>)>>,
    fail_puts: AtomicBool,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

/// HTTP/1 storage node keeping objects in memory
pub struct MockStorageNode {
    addr: SocketAddr,
    state: Arc<StorageState>,
    task: JoinHandle<()>,
}

impl MockStorageNode {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(StorageState::default());

        let task = tokio::spawn(accept_storage_connections(listener, state.clone()));
        Ok(MockStorageNode { addr, state, task })
    }

    /// `http://host:port`, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Body stored at `path`, which may be a full URL or just its path
    pub fn object(&self, path: &str) -> Option<Bytes> {
        lock(&self.state.objects)
            .get(self.local_path(path))
            .map(|(body, _)| body.clone())
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        lock(&self.state.objects)
            .get(self.local_path(path))
            .and_then(|(_, content_type)| content_type.clone())
    }

    pub fn object_count(&self) -> usize {
        lock(&self.state.objects).len()
    }

    /// Answer every PUT with a 500 while set
    pub fn set_fail_puts(&self, fail: bool) {
        self.state.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> usize {
        self.state.puts.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.state.gets.load(Ordering::SeqCst)
    }

    fn local_path<'a>(&self, path: &'a str) -> &'a str {
        let base = self.base_url();
        path.strip_prefix(base.as_str()).unwrap_or(path)
    }
}

impl Drop for MockStorageNode {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_storage_connections(listener: TcpListener, state: Arc<StorageState>) {
    while let Ok((stream, _)) = listener.accept().await {
        let state = state.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handle_storage_request(req, state.clone()));

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!("mock storage connection error: {}", err);
            }
        });
    }
}

async fn handle_storage_request(
    req: Request<Incoming>,
    state: Arc<StorageState>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let response = match method {
        Method::PUT => {
            state.puts.fetch_add(1, Ordering::SeqCst);
            let content_type = req
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            match req.into_body().collect().await {
                Ok(_) if state.fail_puts.load(Ordering::SeqCst) => {
                    reply(StatusCode::INTERNAL_SERVER_ERROR, Bytes::new())
                }
                Ok(body) => {
                    lock(&state.objects).insert(path, (body.to_bytes(), content_type));
                    reply(StatusCode::CREATED, Bytes::new())
                }
                Err(_) => reply(StatusCode::BAD_REQUEST, Bytes::new()),
            }
        }
        Method::GET => {
            state.gets.fetch_add(1, Ordering::SeqCst);
            match lock(&state.objects).get(&path) {
                Some((body, _)) => reply(StatusCode::OK, body.clone()),
                None => reply(StatusCode::NOT_FOUND, Bytes::new()),
            }
        }
        _ => reply(StatusCode::METHOD_NOT_ALLOWED, Bytes::new()),
    };

    Ok(response)
}

fn reply(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
}
