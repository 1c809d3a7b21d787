//! Dedicated server install updates through `steamcmd`.

use crate::steam_workshop::run_steamcmd;
use crate::{Result as ServerErrorResult, ServerError};

use lo_core::{CoreError, GameBuild, GameUpdateSource, Result as CoreResult};

use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, info};

pub struct SteamGameServer {
    steamcmd_dir: PathBuf,
    app_id: u32,
    install_dir: PathBuf,
}

impl SteamGameServer {
    pub fn new(steamcmd_dir: impl Into<PathBuf>, app_id: u32, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            steamcmd_dir: steamcmd_dir.into(),
            app_id,
            install_dir: install_dir.into(),
        }
    }

    /// Steam's record of what is installed in `install_dir`.
    pub fn manifest_path(&self) -> PathBuf {
        self.install_dir
            .join("steamapps")
            .join(format!("appmanifest_{}.acf", self.app_id))
    }

    /// Build id on disk. `None` when the server was never installed here.
    pub async fn installed_build(&self) -> ServerErrorResult<Option<u64>> {
        let path = self.manifest_path();
        let manifest = match tokio::fs::read_to_string(&path).await {
            Ok(manifest) => manifest,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ServerError::io(&path, e)),
        };

        parse_manifest_build(&manifest).map(Some).ok_or_else(|| {
            ServerError::steamcmd(format!("no buildid in {}", path.display()))
        })
    }

    /// Build id of the public branch as Steam publishes it now.
    pub async fn latest_build(&self) -> ServerErrorResult<u64> {
        let app_id = self.app_id.to_string();
        let output = run_steamcmd(
            &self.steamcmd_dir,
            &[
                "+login",
                "anonymous",
                "+app_info_update",
                "1",
                "+app_info_print",
                app_id.as_str(),
                "+quit",
            ],
        )
        .await?;

        parse_public_build(&output, self.app_id).ok_or_else(|| {
            ServerError::steamcmd(format!("no public buildid for app {} in app info", self.app_id))
        })
    }

    /// Update and validate the install in place.
    pub async fn update_install(&self) -> ServerErrorResult<()> {
        let app_id = self.app_id.to_string();
        let install_dir = self.install_dir.display().to_string();
        info!("Updating game server in {install_dir}");

        run_steamcmd(
            &self.steamcmd_dir,
            &[
                "+force_install_dir",
                install_dir.as_str(),
                "+login",
                "anonymous",
                "+app_update",
                app_id.as_str(),
                "validate",
                "+quit",
            ],
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GameUpdateSource for SteamGameServer {
    async fn check_build(&self) -> CoreResult<GameBuild> {
        let installed = self
            .installed_build()
            .await
            .map_err(|e| CoreError::server_check(e.to_string()))?;
        let latest = self
            .latest_build()
            .await
            .map_err(|e| CoreError::server_check(e.to_string()))?;

        debug!("Game server build: installed {installed:?}, latest {latest}");
        Ok(GameBuild { installed, latest })
    }

    async fn update(&self) -> CoreResult<()> {
        self.update_install()
            .await
            .map_err(|e| CoreError::server_update(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Str(&'a str),
    Open,
    Close,
}

/// Quoted strings and braces of a KeyValues text. Anything else is skipped.
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => tokens.push(Token::Open),
            b'}' => tokens.push(Token::Close),
            b'"' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end] != b'"' {
                    if bytes[end] == b'\\' {
                        end += 1;
                    }
                    end += 1;
                }
                let end = end.min(bytes.len());
                tokens.push(Token::Str(&text[start..end]));
                i = end;
            }
            _ => {}
        }
        i += 1;
    }
    tokens
}

/// First `key` value whose enclosing sections end with `sections`.
fn find_value<'a>(text: &'a str, sections: &[&str], key: &str) -> Option<&'a str> {
    let tokens = tokenize(text);
    let mut path: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match (tokens[i].clone(), tokens.get(i + 1)) {
            (Token::Str(name), Some(Token::Open)) => {
                path.push(name);
                i += 2;
                continue;
            }
            (Token::Str(name), Some(Token::Str(value))) => {
                if name.eq_ignore_ascii_case(key) && within(&path, sections) {
                    return Some(*value);
                }
                i += 2;
                continue;
            }
            (Token::Close, _) => {
                path.pop();
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn within(path: &[&str], sections: &[&str]) -> bool {
    path.len() >= sections.len()
        && path[path.len() - sections.len()..]
            .iter()
            .zip(sections)
            .all(|(name, section)| name.eq_ignore_ascii_case(section))
}

pub(crate) fn parse_manifest_build(manifest: &str) -> Option<u64> {
    find_value(manifest, &["AppState"], "buildid")?.parse().ok()
}

/// steamcmd prints console chatter before the app's KeyValues block.
pub(crate) fn parse_public_build(output: &str, app_id: u32) -> Option<u64> {
    let header = format!("\"{app_id}\"");
    let start = output
        .split_inclusive('\n')
        .scan(0, |offset, line| {
            let at = *offset;
            *offset += line.len();
            Some((at, line))
        })
        .find(|(_, line)| line.trim() == header)
        .map(|(at, _)| at)?;

    find_value(&output[start..], &["branches", "public"], "buildid")?
        .parse()
        .ok()
}
