//! Live reload over WebSocket.
//!
//! Preview pages get a small script that connects back to the hub. After a
//! successful rebuild the hub sends `reload` to every connected page;
//! clients whose socket is gone are dropped on the way.

use crate::log;
use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use std::{
    net::{IpAddr, SocketAddr, TcpListener, TcpStream},
    sync::Arc,
    thread,
};
use tungstenite::{Message, WebSocket};

/// Client script, `{port}` is replaced with the hub port.
const RELOAD_SCRIPT: &str = include_str!("embed/serve/reload.js");

const RELOAD_MESSAGE: &str = "reload";

/// Try the next ports when the configured one is taken.
const MAX_PORT_RETRIES: u16 = 10;

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

pub struct ReloadHub {
    clients: Clients,
    addr: SocketAddr,
}

impl ReloadHub {
    /// Bind the hub and start accepting clients in the background.
    pub fn bind(interface: IpAddr, port: u16) -> Result<Self> {
        let (listener, addr) = try_bind_port(interface, port, MAX_PORT_RETRIES)?;
        let clients: Clients = Arc::default();

        let accepted = Arc::clone(&clients);
        thread::spawn(move || accept_loop(&listener, &accepted));

        log!("reload"; "ws://{addr}");
        Ok(Self { clients, addr })
    }

    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Tell every page to reload. Returns how many were reached.
    pub fn reload(&self) -> usize {
        let mut clients = self.clients.lock();
        clients.retain_mut(|ws| ws.send(Message::Text(RELOAD_MESSAGE.into())).is_ok());
        clients.len()
    }

    /// `<script>` element to inject into served pages.
    pub fn script_tag(&self) -> String {
        format!(
            "<script>{}</script>",
            RELOAD_SCRIPT.replace("{port}", &self.port().to_string())
        )
    }
}

fn accept_loop(listener: &TcpListener, clients: &Clients) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log!("reload"; "accept failed: {e}");
                continue;
            }
        };
        match tungstenite::accept(stream) {
            Ok(ws) => clients.lock().push(ws),
            Err(e) => log!("reload"; "handshake failed: {e}"),
        }
    }
}

fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(TcpListener, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let addr = listener.local_addr()?;
                if offset > 0 {
                    log!("reload"; "port {base_port} in use, using {port} instead");
                }
                return Ok((listener, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "Failed to bind live reload after {max_retries} attempts (from port {base_port}): {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Insert `script` before the closing `</body>`, or append it.
pub fn inject_script(html: &str, script: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..pos]);
            out.push_str(script);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}{script}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{net::Ipv4Addr, time::Duration};

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn wait_for_clients(hub: &ReloadHub, count: usize) {
        for _ in 0..200 {
            if hub.client_count() == count {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("expected {count} clients, have {}", hub.client_count());
    }

    #[test]
    fn test_reload_reaches_connected_client() {
        let hub = ReloadHub::bind(LOCALHOST, 0).unwrap();
        let (mut client, _) = tungstenite::connect(format!("ws://127.0.0.1:{}", hub.port())).unwrap();
        wait_for_clients(&hub, 1);

        assert_eq!(hub.reload(), 1);
        let message = client.read().unwrap();
        assert_eq!(message.into_text().unwrap().as_str(), "reload");
    }

    #[test]
    fn test_reload_without_clients() {
        let hub = ReloadHub::bind(LOCALHOST, 0).unwrap();
        assert_eq!(hub.reload(), 0);
    }

    #[test]
    fn test_port_retry() {
        let taken = TcpListener::bind((LOCALHOST, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();
        let (_, addr) = try_bind_port(LOCALHOST, port, 5).unwrap();
        assert_ne!(addr.port(), port);
    }

    #[test]
    fn test_script_tag_carries_port() {
        let hub = ReloadHub::bind(LOCALHOST, 0).unwrap();
        let tag = hub.script_tag();
        assert!(tag.starts_with("<script>"));
        assert!(tag.contains(&format!(":{}", hub.port())));
        assert!(!tag.contains("{port}"));
    }

    #[test]
    fn test_inject_script() {
        assert_eq!(
            inject_script("<html><body><p>x</p></BODY></html>", "<script></script>"),
            "<html><body><p>x</p><script></script></BODY></html>"
        );
        assert_eq!(inject_script("<p>x</p>", "<s/>"), "<p>x</p><s/>");
    }
}
