//! Upload client for the Waldo API.
//!
//! Uploads a built artifact as a new app version. Android `.apk` files are
//! sent as they are; iOS simulator `.app` bundles are zipped first.

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use waldo_core::Platform;
use waldo_core::builders::BuildContext;
use waldo_core::runner::ToolchainProcess;

const DEFAULT_API_URL: &str = "https://api.waldo.com";
const USER_AGENT: &str = concat!("waldo-cli/", env!("CARGO_PKG_VERSION"));

/// Environment variable overriding the API base URL.
pub const API_URL_ENV: &str = "WALDO_API_URL";

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const MAX_ERROR_BODY: usize = 200;

/// Format a file size in human-readable format (MB or KB).
fn format_file_size(bytes: u64) -> String {
    if bytes >= 1_000_000 {
        format!("{} MB", bytes / 1_000_000)
    } else if bytes >= 1_000 {
        format!("{} KB", bytes / 1_000)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Server acknowledgement of an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Identifier of the new app version, when the server reports one.
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WaldoClient {
    http: Client,
    base_url: String,
    upload_token: String,
}

impl WaldoClient {
    /// Creates a client for `upload_token`, honouring `WALDO_API_URL`.
    pub fn new(upload_token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .context("building HTTP client")?;

        let base_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            http,
            base_url,
            upload_token: upload_token.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn versions_url(&self, platform: Platform) -> String {
        format!(
            "{}?agentName=CLI&agentVersion={}&platform={}",
            self.api("versions"),
            env!("CARGO_PKG_VERSION"),
            platform.as_str()
        )
    }

    /// Uploads the `.apk` or `.app` at `artifact`.
    ///
    /// Bundles are zipped with `zip` into a temporary directory through the
    /// context's task runner.
    pub fn upload(
        &self,
        artifact: &Path,
        platform: Platform,
        ctx: &mut BuildContext<'_>,
    ) -> Result<UploadReceipt> {
        let payload = prepare_payload(artifact, ctx)?;
        let body = std::fs::read(payload.path())
            .with_context(|| format!("reading upload payload {:?}", payload.path()))?;

        ctx.say(format_args!(
            "Uploading {} ({})...",
            artifact.display(),
            format_file_size(body.len() as u64)
        ))?;
        tracing::info!(artifact = %artifact.display(), %platform, bytes = body.len(), "uploading artifact");
        let start = Instant::now();

        let resp = self
            .http
            .post(self.versions_url(platform))
            .header(AUTHORIZATION, format!("Upload-Token {}", self.upload_token))
            .header(CONTENT_TYPE, payload.content_type())
            .body(body)
            .send()
            .context("uploading artifact to Waldo")?;

        let receipt = parse_response(resp)?;
        ctx.say(format_args!(
            "  Uploaded (took {}s)",
            start.elapsed().as_secs()
        ))?;
        Ok(receipt)
    }
}

/// The bytes to send, with a temporary directory kept alive for zipped
/// bundles.
enum Payload {
    Apk(PathBuf),
    Zip {
        path: PathBuf,
        _dir: tempfile::TempDir,
    },
}

impl Payload {
    fn path(&self) -> &Path {
        match self {
            Payload::Apk(path) | Payload::Zip { path, .. } => path,
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            Payload::Apk(_) => "application/octet-stream",
            Payload::Zip { .. } => "application/zip",
        }
    }
}

fn prepare_payload(artifact: &Path, ctx: &mut BuildContext<'_>) -> Result<Payload> {
    let extension = artifact
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("apk") if artifact.is_file() => Ok(Payload::Apk(artifact.to_path_buf())),
        Some("app") if artifact.is_dir() => {
            let dir = tempfile::tempdir().context("creating temporary directory")?;
            let path = zip_bundle(artifact, dir.path(), ctx)?;
            Ok(Payload::Zip { path, _dir: dir })
        }
        Some("apk" | "app") => Err(anyhow!("app artifact not found at {:?}", artifact)),
        _ => bail!(
            "unsupported artifact {:?}; expected an .apk file or an .app directory",
            artifact
        ),
    }
}

fn zip_bundle(bundle: &Path, dest_dir: &Path, ctx: &mut BuildContext<'_>) -> Result<PathBuf> {
    let name = bundle
        .file_name()
        .ok_or_else(|| anyhow!("invalid app bundle path {:?}", bundle))?;
    let parent = bundle.parent().unwrap_or(Path::new("."));
    let mut zip_name = name.to_os_string();
    zip_name.push(".zip");
    let zip_path = dest_dir.join(zip_name);

    let process = zip_process(bundle, &zip_path, parent)?;
    ctx.stream(&process, "zip")?;
    if !zip_path.is_file() {
        bail!("zip did not produce {:?}", zip_path);
    }
    Ok(zip_path)
}

fn zip_process(bundle: &Path, zip_path: &Path, parent: &Path) -> Result<ToolchainProcess> {
    let name = bundle
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid app bundle path {:?}", bundle))?;
    Ok(ToolchainProcess::new("zip", parent)
        .arg("-qry")
        .arg(zip_path.to_string_lossy())
        .arg(name))
}

fn parse_response(resp: Response) -> Result<UploadReceipt> {
    let status = resp.status();
    let text = resp
        .text()
        .context("reading Waldo API response body")?;
    parse_body(status.as_u16(), status.is_success(), &text)
}

fn parse_body(status: u16, success: bool, text: &str) -> Result<UploadReceipt> {
    if !success {
        return Err(anyhow!(
            "Waldo API upload failed (status {}): {}",
            status,
            shorten(text)
        ));
    }

    let id = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|json| match json.get("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        });
    Ok(UploadReceipt { id })
}

fn shorten(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
