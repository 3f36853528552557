use anyhow::Result;
use std::ffi::OsString;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Gemini,
    /// Offline backend that answers with the prompt it was given.
    Echo,
}

impl BackendKind {
    pub fn parse(input: &str) -> Result<Self> {
        match input {
            "gemini" => Ok(Self::Gemini),
            "echo" => Ok(Self::Echo),
            _ => anyhow::bail!("invalid backend: {input} (expected gemini|echo)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub backend: BackendKind,
    pub endpoint: Option<String>,
    pub socket: Option<String>,
    pub api_key: Option<String>,
}

pub fn parse_args() -> Result<AgentConfig> {
    let mut config = parse_args_from(std::env::args_os().skip(1))?;
    config.api_key = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty());
    Ok(config)
}

fn parse_args_from<I>(args: I) -> Result<AgentConfig>
where
    I: IntoIterator<Item = OsString>,
{
    let mut backend = BackendKind::Gemini;
    let mut endpoint = None;
    let mut socket = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--backend" {
            let Some(value) = args.next() else {
                anyhow::bail!("--backend expects gemini|echo");
            };
            backend = BackendKind::parse(&value.to_string_lossy())?;
        } else if arg == "--endpoint" {
            let Some(url) = args.next() else {
                anyhow::bail!("--endpoint expects a URL");
            };
            endpoint = Some(url.to_string_lossy().trim_end_matches('/').to_string());
        } else if arg == "--socket" {
            let Some(path) = args.next() else {
                anyhow::bail!("--socket expects a path");
            };
            socket = Some(path.to_string_lossy().to_string());
        } else {
            anyhow::bail!("unknown argument: {:?}", arg);
        }
    }

    Ok(AgentConfig {
        backend,
        endpoint,
        socket,
        api_key: None,
    })
}
