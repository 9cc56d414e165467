//! A real session against an in-process Telnet router.

use std::time::Duration;

use confmon::error::{Error, SessionError};
use confmon::{
    Device, DialectSessionFactory, DialectTable, FailureKind, Session, SessionConfig,
    SessionFactory, SessionState,
};
use secrecy::SecretString;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const IAC: u8 = 255;
const WILL: u8 = 251;
const ECHO: u8 = 1;
const SGA: u8 = 3;

const RUNNING_CONFIG: &str =
    "Building configuration...\r\n\r\nCurrent configuration : 42 bytes\r\n!\r\nhostname R1\r\n!\r\nend\r\n";

/// Server side of one telnet connection. Drops negotiation, splits lines.
///
/// A line ends at CR, LF or CR LF, so the lone CR a client sends to wake
/// the console arrives as an empty line.
struct Peer {
    stream: TcpStream,
    pending: Vec<u8>,
    // The previous line ended in a CR that may still be followed by LF.
    after_cr: bool,
}

impl Peer {
    async fn read_line(&mut self) -> Option<String> {
        loop {
            if self.after_cr && !self.pending.is_empty() {
                if matches!(self.pending[0], b'\n' | b'\0') {
                    self.pending.remove(0);
                }
                self.after_cr = false;
            }

            if let Some(pos) = self.pending.iter().position(|&b| b == b'\r' || b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..pos).collect();
                self.after_cr = self.pending.remove(0) == b'\r';
                return Some(String::from_utf8_lossy(&line).into_owned());
            }

            let mut buf = [0u8; 1024];
            let n = self.stream.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            let mut i = 0;
            while i < n {
                if buf[i] == IAC {
                    i += 3;
                    continue;
                }
                self.pending.push(buf[i]);
                i += 1;
            }
        }
    }

    async fn send(&mut self, text: &str) {
        self.stream.write_all(text.as_bytes()).await.unwrap();
    }
}

/// How the fake router behaves once a client connects.
#[derive(Clone, Copy)]
struct Router {
    password: &'static str,
    running_config: &'static str,
    /// Answer an empty username with a fresh prompt, like a console does.
    reprompt_on_empty: bool,
}

impl Router {
    fn new(password: &'static str, running_config: &'static str) -> Self {
        Self {
            password,
            running_config,
            reprompt_on_empty: false,
        }
    }

    /// Serve one client; returns every line it sent.
    async fn serve(self, stream: TcpStream) -> Vec<String> {
        let mut peer = Peer {
            stream,
            pending: Vec::new(),
            after_cr: false,
        };
        let mut received = Vec::new();

        peer.stream
            .write_all(&[IAC, WILL, ECHO, IAC, WILL, SGA])
            .await
            .unwrap();
        peer.send("\x1b[2J\r\nUser Access Verification\r\n\r\nUsername: ")
            .await;

        loop {
            let Some(user) = peer.read_line().await else {
                return received;
            };
            if user.is_empty() {
                if self.reprompt_on_empty {
                    peer.send("\r\nUsername: ").await;
                }
                continue;
            }
            received.push(user);
            peer.send("Password: ").await;
            let Some(password) = peer.read_line().await else {
                return received;
            };
            received.push(password.clone());
            if password == self.password {
                peer.send("\r\n\r\nR1#").await;
                break;
            }
            peer.send("\r\n% Login invalid\r\n\r\nUsername: ").await;
        }

        while let Some(command) = peer.read_line().await {
            if command.is_empty() {
                continue;
            }
            received.push(command.clone());
            match command.as_str() {
                "exit" => break,
                "show running-config" => {
                    let reply = format!("{command}\r\n{}\r\nR1#", self.running_config);
                    peer.send(&reply).await;
                }
                "terminal length 0" | "terminal width 0" => {
                    peer.send(&format!("{command}\r\nR1#")).await;
                }
                _ => {
                    let reply = format!(
                        "{command}\r\n                ^\r\n% Invalid input detected at '^' marker.\r\n\r\nR1#"
                    );
                    peer.send(&reply).await;
                }
            }
        }
        received
    }
}

async fn spawn_router(router: Router) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        router.serve(stream).await
    });
    (port, handle)
}

fn device(port: u16, password: &str) -> Device {
    Device {
        name: "R1".to_string(),
        host: "127.0.0.1".to_string(),
        port: Some(port),
        protocol: "telnet".to_string(),
        login: "admin".to_string(),
        password: SecretString::from(password),
        device_type: "ios".to_string(),
    }
}

fn factory(timeout: Duration) -> DialectSessionFactory {
    settling_factory(timeout, Duration::ZERO)
}

fn settling_factory(timeout: Duration, settle_delay: Duration) -> DialectSessionFactory {
    let config = SessionConfig {
        timeout,
        settle_delay,
        ..SessionConfig::default()
    };
    DialectSessionFactory::new(DialectTable::builtin().unwrap(), config)
}

#[tokio::test]
async fn test_capture_running_config() {
    let (port, server) = spawn_router(Router::new("secret", RUNNING_CONFIG))
    .await;
    let device = device(port, "secret");
    let factory = factory(Duration::from_secs(5));

    let mut connection = device.connect(&factory).await.unwrap();
    let config = connection.capture_running_config().await.unwrap();
    connection.disconnect().await;

    assert_eq!(
        config,
        "Building configuration...\n\nCurrent configuration : 42 bytes\n!\nhostname R1\n!\nend"
    );
    assert!(!config.starts_with("show running-config"));

    let received = server.await.unwrap();
    assert_eq!(
        received,
        vec![
            "admin",
            "secret",
            "terminal length 0",
            "terminal width 0",
            "show running-config",
            "exit"
        ]
    );
}

#[tokio::test]
async fn test_session_state_walk() {
    let (port, server) = spawn_router(Router::new("secret", RUNNING_CONFIG))
    .await;
    let factory = factory(Duration::from_secs(5));
    let mut session = factory.create(&device(port, "secret")).unwrap();

    assert_eq!(session.state(), SessionState::Disconnected);
    session.open().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    let response = session.send_command("show version").await.unwrap();
    assert!(!response.is_success());

    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
    server.await.unwrap();
}

#[tokio::test]
async fn test_rejected_capture_is_command_failure() {
    let (port, _server) = spawn_router(Router::new(
        "secret",
        "                ^\r\n% Invalid input detected at '^' marker.\r\n",
    ))
    .await;
    let device = device(port, "secret");
    let factory = factory(Duration::from_secs(5));

    let mut connection = device.connect(&factory).await.unwrap();
    let err = connection.capture_running_config().await.unwrap_err();
    connection.disconnect().await;

    assert!(matches!(
        err,
        Error::Session(SessionError::CommandFailed { .. })
    ));
}

#[tokio::test]
async fn test_wrong_password_is_login_failure() {
    let (port, _server) = spawn_router(Router::new("secret", RUNNING_CONFIG))
    .await;
    let device = device(port, "wrong");
    let factory = factory(Duration::from_secs(5));

    let err = device.connect(&factory).await.err().unwrap();
    assert!(matches!(
        err,
        Error::Session(SessionError::LoginFailed { .. })
    ));
}

#[tokio::test]
async fn test_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = device(port, "secret")
        .connect(&factory(Duration::from_secs(2)))
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), FailureKind::Connection);
}

#[tokio::test]
async fn test_silent_device_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(stream);
    });

    let err = device(port, "secret")
        .connect(&factory(Duration::from_millis(300)))
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), FailureKind::ProtocolTimeout);
}

#[tokio::test]
async fn test_wake_byte_reprompt_logs_in_once() {
    let (port, server) = spawn_router(Router {
        reprompt_on_empty: true,
        ..Router::new("secret", RUNNING_CONFIG)
    })
    .await;
    // The banner and first prompt are already waiting when the wake byte
    // goes out, so the console prompts a second time.
    let factory = settling_factory(Duration::from_secs(5), Duration::from_millis(100));

    let target = device(port, "secret");
    let mut connection = target.connect(&factory).await.unwrap();
    let config = connection.capture_running_config().await.unwrap();
    connection.disconnect().await;

    assert!(config.contains("hostname R1"));
    let received = server.await.unwrap();
    assert_eq!(received[..2], ["admin", "secret"]);
    assert_eq!(received.last().map(String::as_str), Some("exit"));
}
