//! Preview server for compiled documents.
//!
//! Built on `tiny_http`:
//!
//! - Static files from the build output directory
//! - `index.html` resolution for directories
//! - Directory listing of compiled documents
//! - Live-reload script injected into every HTML response
//! - Graceful shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────┐
//! │   Main Thread   │   │  Watcher Thread  │   │  Reload Thread  │
//! │  (HTTP Server)  │   │  (File Monitor)  │   │   (WebSocket)   │
//! └────────┬────────┘   └────────┬─────────┘   └────────┬────────┘
//!          │                     │                      │
//!          ▼                     ▼                      ▼
//!    Serve output          Rebuild scope  ───────▶  Notify pages
//! ```

use crate::{config::SiteConfig, log, reload::inject_script};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::Path,
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

// ============================================================================
// Constants
// ============================================================================

/// Directory listing HTML template (embedded at compile time)
const DIRECTORY_TEMPLATE: &str = include_str!("embed/serve/directory.html");

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve the output directory until Ctrl+C.
///
/// `reload_script` is appended to every HTML document served, when given.
pub fn serve_output(config: &'static SiteConfig, reload_script: Option<String>) -> Result<()> {
    let interface = parse_interface(&config.serve.interface)?;
    let (server, addr) = try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    let root = &config.build.output;
    let script = reload_script.as_deref();
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, root, script) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Parse `[serve.interface]`, accepting `localhost` as the loopback address.
pub fn parse_interface(interface: &str) -> Result<IpAddr> {
    if interface == "localhost" {
        return Ok(IpAddr::from([127, 0, 0, 1]));
    }
    interface
        .parse()
        .with_context(|| format!("Invalid interface `{interface}`"))
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let addr = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "Failed to bind after {} attempts (from port {}): {}",
        max_retries,
        base_port,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// What a request path resolves to under the serve root.
#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    File(std::path::PathBuf),
    Listing(String),
    NotFound,
}

/// Resolution order:
/// 1. Exact file match → file
/// 2. Directory with index.html → index.html
/// 3. Directory without index.html → listing
/// 4. Nothing found → 404
fn resolve(root: &Path, url: &str) -> Resolved {
    let url_path = urlencoding::decode(url)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();

    // Cache-busting query strings do not name files
    let path_without_query = url_path.split('?').next().unwrap_or(&url_path);
    let request_path = path_without_query.trim_matches('/');
    if request_path.split('/').any(|segment| segment == "..") {
        return Resolved::NotFound;
    }
    let local_path = root.join(request_path);

    if local_path.is_file() {
        return Resolved::File(local_path);
    }

    if local_path.is_dir() {
        let index_path = local_path.join("index.html");
        if index_path.is_file() {
            return Resolved::File(index_path);
        }
        if let Ok(listing) = generate_directory_listing(&local_path, request_path) {
            return Resolved::Listing(listing);
        }
    }

    Resolved::NotFound
}

fn handle_request(request: Request, root: &Path, script: Option<&str>) -> Result<()> {
    match resolve(root, request.url()) {
        Resolved::File(path) => serve_file(request, &path, script),
        Resolved::Listing(html) => serve_html(request, html),
        Resolved::NotFound => serve_not_found(request),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type_header(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value).map_err(|()| anyhow!("invalid header `{value}`"))
}

/// Serve a file, injecting the reload script into HTML.
fn serve_file(request: Request, path: &Path, script: Option<&str>) -> Result<()> {
    let content_type = guess_content_type(path);

    if let Some(script) = script
        && content_type.starts_with("text/html")
    {
        let html = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serve_html(request, inject_script(&html, script));
    }

    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response = Response::from_data(content).with_header(content_type_header(content_type)?);
    request.respond(response)?;
    Ok(())
}

fn serve_html(request: Request, content: String) -> Result<()> {
    let response =
        Response::from_string(content).with_header(content_type_header("text/html; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![content_type_header("text/plain")?],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("map" | "json") => "application/json; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("tmpl" | "txt") => "text/plain; charset=utf-8",

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        _ => "application/octet-stream",
    }
}

// ============================================================================
// Directory Listing
// ============================================================================

/// Listing of sub-directories and `.html` documents, hidden entries skipped.
fn generate_directory_listing(dir_path: &Path, request_path: &str) -> std::io::Result<String> {
    let mut entries: Vec<(bool, String)> = fs::read_dir(dir_path)?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            let visible = !name.starts_with('.') && (is_dir || name.ends_with(".html"));
            visible.then_some((is_dir, name))
        })
        .collect();
    // Directories first, then by name
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let items: Vec<String> = entries
        .iter()
        .map(|(is_dir, name)| {
            let icon = if *is_dir { "📁" } else { "📄" };
            let href = if request_path.is_empty() {
                format!("/{name}")
            } else {
                format!("/{request_path}/{name}")
            };
            format!(r#"<li><span class="icon">{icon}</span><a href="{href}">{name}</a></li>"#)
        })
        .collect();

    let items = if items.is_empty() {
        r#"<li class="empty">No compiled documents yet</li>"#.to_owned()
    } else {
        items.join("\n            ")
    };

    let parent_link = if request_path.is_empty() {
        String::new()
    } else {
        let parent_path = Path::new(request_path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            r#"<li class="parent"><span class="icon">📂</span><a href="/{parent_path}">..</a></li>"#
        )
    };

    #[allow(clippy::literal_string_with_formatting_args)]
    Ok(DIRECTORY_TEMPLATE
        .replace("{path}", request_path)
        .replace("{parent_link}", &parent_link)
        .replace("{entries}", &items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn output_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("promo/.cache")).unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("welcome.html"), "<body>hi</body>").unwrap();
        fs::write(dir.path().join("promo/sale.html"), "sale").unwrap();
        fs::write(dir.path().join("css/app.css"), "a{}").unwrap();
        fs::write(dir.path().join(".hidden.html"), "").unwrap();
        dir
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.html")), "text/html; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.css")), "text/css; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("app.css.map")), "application/json; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.tmpl")), "text/plain; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a")), "application/octet-stream");
    }

    #[test]
    fn test_resolve_file_and_query() {
        let dir = output_dir();
        assert_eq!(
            resolve(dir.path(), "/css/app.css?t=123"),
            Resolved::File(dir.path().join("css/app.css"))
        );
        assert_eq!(
            resolve(dir.path(), "/promo%2Fsale.html"),
            Resolved::File(dir.path().join("promo/sale.html"))
        );
    }

    #[test]
    fn test_resolve_index_and_missing() {
        let dir = output_dir();
        fs::write(dir.path().join("promo/index.html"), "idx").unwrap();
        assert_eq!(
            resolve(dir.path(), "/promo/"),
            Resolved::File(dir.path().join("promo/index.html"))
        );
        assert_eq!(resolve(dir.path(), "/nope.html"), Resolved::NotFound);
        assert_eq!(resolve(dir.path(), "/../etc/passwd"), Resolved::NotFound);
    }

    #[test]
    fn test_root_listing() {
        let dir = output_dir();
        let Resolved::Listing(html) = resolve(dir.path(), "/") else {
            panic!("expected listing");
        };
        assert!(html.contains(r#"<a href="/welcome.html">welcome.html</a>"#));
        assert!(html.contains(r#"<a href="/promo">promo</a>"#));
        assert!(!html.contains(".hidden"));
        assert!(!html.contains("app.css"));
        assert!(!html.contains(r#"class="parent""#));
        // Directories come first
        assert!(html.find("/css").unwrap() < html.find("/welcome.html").unwrap());
    }

    #[test]
    fn test_nested_listing_links_to_parent() {
        let dir = output_dir();
        let html = generate_directory_listing(&dir.path().join("promo"), "promo").unwrap();
        assert!(html.contains(r#"<a href="/promo/sale.html">sale.html</a>"#));
        assert!(html.contains(r#"<a href="/">..</a>"#));
        assert!(!html.contains(".cache"));
    }

    #[test]
    fn test_empty_listing() {
        let dir = TempDir::new().unwrap();
        let html = generate_directory_listing(dir.path(), "").unwrap();
        assert!(html.contains("No compiled documents yet"));
    }

    #[test]
    fn test_parse_interface() {
        assert_eq!(parse_interface("localhost").unwrap(), IpAddr::from([127, 0, 0, 1]));
        assert_eq!(parse_interface("0.0.0.0").unwrap(), IpAddr::from([0, 0, 0, 0]));
        assert!(parse_interface("not-an-ip").is_err());
    }
}
