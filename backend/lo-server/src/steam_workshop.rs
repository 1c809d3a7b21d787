//! Steam Workshop access: version lookups over the public Web API and
//! payload downloads through `steamcmd`.

use crate::retry::{RetryConfig, with_retry};
use crate::{Result as ServerErrorResult, ServerError};

use lo_core::{CoreError, ModVersion, Result as CoreResult, WorkshopSource};

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio::process::Command;

pub const STEAM_API_URL: &str = "https://api.steampowered.com";
const DETAILS_PATH: &str = "/ISteamRemoteStorage/GetPublishedFileDetails/v1/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Steam's result code for a successful lookup.
const RESULT_OK: i32 = 1;

#[cfg(windows)]
const STEAMCMD_EXECUTABLE: &str = "steamcmd.exe";
#[cfg(not(windows))]
const STEAMCMD_EXECUTABLE: &str = "steamcmd.sh";

const MODINFO_FILE: &str = "modinfo.json";

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    response: DetailsBody,
}

#[derive(Debug, Deserialize)]
struct DetailsBody {
    result: i32,
    publishedfiledetails: Vec<FileDetails>,
}

#[derive(Debug, Deserialize)]
struct FileDetails {
    publishedfileid: String,
    result: i32,
    /// Absent when the item is missing or hidden.
    #[serde(default)]
    time_updated: Option<u64>,
}

pub struct SteamWorkshop {
    client: reqwest::Client,
    api_url: String,
    app_id: u32,
    steamcmd_dir: PathBuf,
    limiter: Option<DefaultDirectRateLimiter>,
    retry: RetryConfig,
}

impl SteamWorkshop {
    pub fn new(steamcmd_dir: impl Into<PathBuf>, app_id: u32) -> ServerErrorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServerError::http(STEAM_API_URL, e))?;

        Ok(Self {
            client,
            api_url: STEAM_API_URL.to_string(),
            app_id,
            steamcmd_dir: steamcmd_dir.into(),
            limiter: None,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Space API requests at least `delay` apart. Zero disables the limit.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.limiter = Quota::with_period(delay).map(RateLimiter::direct);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Where steamcmd leaves a downloaded item.
    pub fn content_dir(&self, workshop_id: &str) -> PathBuf {
        self.steamcmd_dir
            .join("steamapps")
            .join("workshop")
            .join("content")
            .join(self.app_id.to_string())
            .join(workshop_id)
    }

    /// Latest published revision of `workshop_id`.
    pub async fn fetch_version(&self, workshop_id: &str) -> ServerErrorResult<ModVersion> {
        let url = format!("{}{DETAILS_PATH}", self.api_url);
        if workshop_id.is_empty() || !workshop_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ServerError::schema(
                &url,
                format!("'{workshop_id}' is not a Workshop id"),
            ));
        }

        with_retry(&self.retry, "Workshop version check", || {
            self.request_details(&url, workshop_id)
        })
        .await
    }

    async fn request_details(&self, url: &str, workshop_id: &str) -> ServerErrorResult<ModVersion> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!("itemcount=1&publishedfileids%5B0%5D={workshop_id}"))
            .send()
            .await
            .map_err(|e| ServerError::http(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServerError::status(url, status.as_u16()));
        }

        let body: DetailsResponse = response
            .json()
            .await
            .map_err(|e| ServerError::schema(url, e.to_string()))?;

        parse_version(url, workshop_id, body)
    }

    /// Download `workshop_id` with steamcmd and copy it into `dest`.
    pub async fn download_into(&self, workshop_id: &str, dest: &Path) -> ServerErrorResult<()> {
        self.run_steamcmd(workshop_id).await?;

        let source = self.content_dir(workshop_id);
        if !source.is_dir() {
            return Err(ServerError::steamcmd(format!(
                "no content at {} after download",
                source.display()
            )));
        }

        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || {
            copy_dir_all(&source, &dest)?;
            activate_modinfo(&dest)
        })
        .await
        .map_err(|e| ServerError::steamcmd(format!("copy task failed: {e}")))??;

        info!("Downloaded Workshop item {workshop_id}");
        Ok(())
    }

    async fn run_steamcmd(&self, workshop_id: &str) -> ServerErrorResult<()> {
        let app_id = self.app_id.to_string();
        debug!("Downloading Workshop item {workshop_id} with steamcmd");

        run_steamcmd(
            &self.steamcmd_dir,
            &[
                "+login",
                "anonymous",
                "+workshop_download_item",
                app_id.as_str(),
                workshop_id,
                "+quit",
            ],
        )
        .await?;
        Ok(())
    }
}

/// Run steamcmd from `steamcmd_dir` and return its stdout. A non-zero exit
/// is an error carrying the last line steamcmd printed.
pub(crate) async fn run_steamcmd(steamcmd_dir: &Path, args: &[&str]) -> ServerErrorResult<String> {
    let executable = steamcmd_dir.join(STEAMCMD_EXECUTABLE);
    debug!("Running {} {}", executable.display(), args.join(" "));

    let output = Command::new(&executable)
        .args(args)
        .current_dir(steamcmd_dir)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ServerError::io(&executable, e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let last_line = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("no output");
        return Err(ServerError::steamcmd(format!(
            "exited with {}: {}",
            output.status,
            last_line.trim()
        )));
    }
    Ok(stdout)
}

#[async_trait]
impl WorkshopSource for SteamWorkshop {
    async fn check_version(&self, workshop_id: &str) -> CoreResult<ModVersion> {
        self.fetch_version(workshop_id)
            .await
            .map_err(|e| CoreError::update_check(workshop_id, e.to_string()))
    }

    async fn download(&self, workshop_id: &str, dest: &Path) -> CoreResult<()> {
        self.download_into(workshop_id, dest)
            .await
            .map_err(|e| CoreError::apply(workshop_id, e.to_string()))
    }
}

fn parse_version(
    url: &str,
    workshop_id: &str,
    body: DetailsResponse,
) -> ServerErrorResult<ModVersion> {
    if body.response.result != RESULT_OK {
        return Err(ServerError::schema(
            url,
            format!("lookup result {}", body.response.result),
        ));
    }

    let details = body
        .response
        .publishedfiledetails
        .into_iter()
        .find(|details| details.publishedfileid == workshop_id)
        .ok_or_else(|| ServerError::schema(url, format!("no details for item {workshop_id}")))?;

    if details.result != RESULT_OK {
        return Err(ServerError::schema(
            url,
            format!("item {workshop_id} has result {}", details.result),
        ));
    }

    details
        .time_updated
        .map(ModVersion)
        .ok_or_else(|| ServerError::schema(url, format!("item {workshop_id} has no time_updated")))
}

pub(crate) fn copy_dir_all(source: &Path, dest: &Path) -> ServerErrorResult<()> {
    std::fs::create_dir_all(dest).map_err(|e| ServerError::io(dest, e))?;

    for entry in std::fs::read_dir(source).map_err(|e| ServerError::io(source, e))? {
        let entry = entry.map_err(|e| ServerError::io(source, e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| ServerError::io(&from, e))?;

        if file_type.is_dir() {
            copy_dir_all(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| ServerError::io(&from, e))?;
        }
    }
    Ok(())
}

/// Mark the mod as enabled in its `modinfo.json`, if it ships one.
pub(crate) fn activate_modinfo(mod_dir: &Path) -> ServerErrorResult<()> {
    let path = mod_dir.join(MODINFO_FILE);
    if !path.is_file() {
        return Ok(());
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| ServerError::io(&path, e))?;
    let mut info: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| ServerError::steamcmd(format!("{} is not valid JSON: {e}", path.display())))?;

    let Some(object) = info.as_object_mut() else {
        return Err(ServerError::steamcmd(format!(
            "{} is not a JSON object",
            path.display()
        )));
    };
    object.insert("active".to_string(), serde_json::Value::Bool(true));

    let updated = serde_json::to_string_pretty(&info)
        .map_err(|e| ServerError::steamcmd(format!("encoding {}: {e}", path.display())))?;
    std::fs::write(&path, updated).map_err(|e| ServerError::io(&path, e))
}
