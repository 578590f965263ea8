//! Line-delimited JSON commands accepted by the `shellcache` binary.
//!
//! Each stdin line is one [`Command`]; each produces one JSON reply line.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shellcache_core::{Error, Request, Response};
use url::Url;

use crate::host::{ClientId, Registration};
use crate::policy::CachePolicy;
use crate::worker::{EventOutcome, Worker};

/// One host command.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Install (and maybe activate) a generation built from the loaded config.
    Register,
    /// Open a browsing context.
    Connect,
    /// Close a browsing context.
    Release { client: ClientId },
    /// Issue a request through the registration.
    Fetch {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    /// Post a client message.
    Message { data: serde_json::Value },
    /// Report generations and clients.
    State,
}

fn default_method() -> String {
    "GET".into()
}

/// Summary of a fetched response for the reply line.
#[derive(Debug, Clone, Serialize)]
pub struct FetchReply {
    pub url: String,
    pub status: u16,
    pub response_type: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub body_bytes: usize,
}

impl From<Response> for FetchReply {
    fn from(response: Response) -> Self {
        Self {
            body: String::from_utf8_lossy(&response.body).into_owned(),
            body_bytes: response.body.len(),
            url: response.url,
            status: response.status,
            response_type: response.response_type.as_str().to_string(),
            headers: response.headers,
        }
    }
}

/// Run one command against the registration and return the reply payload.
pub async fn execute(
    registration: &Registration, policy: &CachePolicy, command: Command,
) -> Result<serde_json::Value, Error> {
    let reply = match command {
        Command::Register => {
            let worker = Worker::new(policy.clone(), registration.store(), registration.network());
            serde_json::to_value(registration.register(worker).await?)?
        }
        Command::Connect => serde_json::json!({ "client": registration.connect_client().await }),
        Command::Release { client } => serde_json::json!({ "released": registration.release_client(client).await? }),
        Command::Fetch { url, method, headers } => {
            let url = Url::parse(&url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
            let mut request = Request::get(url).with_method(&method);
            for (name, value) in &headers {
                request = request.with_header(name, value);
            }
            serde_json::to_value(FetchReply::from(registration.fetch(request).await?))?
        }
        Command::Message { data } => {
            let outcome = match registration.post_message(data).await? {
                EventOutcome::SkipWaiting => "skip_waiting",
                _ => "ignored",
            };
            serde_json::json!({ "message": outcome })
        }
        Command::State => serde_json::to_value(registration.status().await)?,
    };
    Ok(reply)
}

/// Wrap a command result as the reply line written to stdout.
pub fn reply_line(result: Result<serde_json::Value, Error>) -> String {
    let value = match result {
        Ok(value) => serde_json::json!({ "ok": true, "result": value }),
        Err(err) => serde_json::json!({ "ok": false, "code": err.code(), "error": err.to_string() }),
    };
    value.to_string()
}
