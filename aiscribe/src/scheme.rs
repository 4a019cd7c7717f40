use std::collections::HashMap;
use std::path::PathBuf;

use url::Url;

use crate::error::{Error, Result};

/// Scheme under which other applications invoke the pipeline.
pub const SCHEME: &str = "aiscribe";

/// A parsed action URI, mapped directly to a pipeline entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `aiscribe://transcribe?file=<path>[&language=<code>]`
    Transcribe {
        file: PathBuf,
        language: Option<String>,
    },
    /// `aiscribe://process?template=<id>&(text=<text>|file=<path>)`
    Process {
        template: String,
        text: Option<String>,
        file: Option<PathBuf>,
    },
    /// `aiscribe://config[?view=<name>]`
    Config { view: Option<String> },
}

/// Parse an action URI.
pub fn parse_action(uri: &str) -> Result<Action> {
    let url = Url::parse(uri.trim())
        .map_err(|e| Error::InvalidAction(format!("not a valid URI: {e}")))?;

    if url.scheme() != SCHEME {
        return Err(Error::InvalidAction(format!(
            "unsupported scheme \"{}\" (expected {SCHEME}://)",
            url.scheme()
        )));
    }

    // The action lives in the host position; `aiscribe:///transcribe`
    // style URIs put it in the path instead.
    let action = url
        .host_str()
        .map(str::to_string)
        .filter(|h| !h.is_empty())
        .or_else(|| {
            let path = url.path().trim_start_matches('/');
            (!path.is_empty()).then(|| path.to_string())
        })
        .ok_or_else(|| Error::InvalidAction("missing action".into()))?;

    let params: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    match action.as_str() {
        "transcribe" => {
            let file = params
                .get("file")
                .filter(|f| !f.trim().is_empty())
                .ok_or_else(|| Error::InvalidAction("transcribe requires a file parameter".into()))?;
            Ok(Action::Transcribe {
                file: PathBuf::from(file),
                language: params.get("language").cloned().filter(|l| !l.is_empty()),
            })
        }
        "process" => {
            let template = params
                .get("template")
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| {
                    Error::InvalidAction("process requires a template parameter".into())
                })?
                .clone();
            let text = params.get("text").cloned().filter(|t| !t.is_empty());
            let file = params
                .get("file")
                .filter(|f| !f.trim().is_empty())
                .map(PathBuf::from);
            if text.is_none() && file.is_none() {
                return Err(Error::InvalidAction(
                    "process requires a text or file parameter".into(),
                ));
            }
            Ok(Action::Process {
                template,
                text,
                file,
            })
        }
        "config" => Ok(Action::Config {
            view: params.get("view").cloned().filter(|v| !v.is_empty()),
        }),
        other => Err(Error::InvalidAction(format!("unknown action \"{other}\""))),
    }
}
