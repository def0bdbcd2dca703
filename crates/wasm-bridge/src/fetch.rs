//! Save sink posting to the host's endpoints with `fetch`
//!
//! Requests are fire-and-forget from the annotator's point of view: each
//! one runs on its own local task and reports back through the instance
//! registry once it settles. Failures are reported, never retried.

use framemark_core::{SaveRequest, SaveSink, SinkOutcome, SnapshotUpload};
use serde_json::{json, Value};
use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, Response};

use crate::instance_manager::InstanceManager;

pub struct FetchSink {
    instance_id: Uuid,
}

impl FetchSink {
    pub fn new(instance_id: Uuid) -> Self {
        Self { instance_id }
    }
}

fn describe(err: JsValue) -> String {
    err.as_string()
        .or_else(|| {
            js_sys::Reflect::get(&err, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{err:?}"))
}

pub(crate) fn save_body(request: &SaveRequest) -> Value {
    let annotations: Value =
        serde_json::from_str(&request.body).unwrap_or_else(|_| Value::String(request.body.clone()));
    json!({
        "videoId": request.video_id,
        "shareToken": request.share_token,
        "annotations": annotations,
    })
}

pub(crate) fn upload_body(upload: &SnapshotUpload) -> Value {
    json!({
        "videoId": upload.video_id,
        "shareToken": upload.share_token,
        "snapshotId": upload.snapshot_id,
        "time": upload.time,
        "image": upload.image,
    })
}

/// Stored location of an uploaded snapshot, when the endpoint returns one
pub(crate) fn uploaded_url(response: Option<&Value>) -> Option<String> {
    let response = response?;
    ["url", "imageUrl", "snapshotUrl"]
        .iter()
        .find_map(|key| response.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// POSTs `body` as JSON; the response body is parsed when it is JSON
async fn post_json(url: &str, body: &Value) -> Result<Option<Value>, String> {
    let opts = RequestInit::new();
    opts.set_method("POST");

    let headers = Headers::new().map_err(describe)?;
    headers
        .set("Content-Type", "application/json")
        .map_err(describe)?;
    headers.set("Accept", "application/json").map_err(describe)?;
    opts.set_headers(&headers);
    opts.set_body(&JsValue::from_str(&body.to_string()));

    let request = Request::new_with_str_and_init(url, &opts).map_err(describe)?;
    let window = web_sys::window().ok_or_else(|| "No window object available".to_string())?;

    let resp_value = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(describe)?;
    let resp: Response = resp_value.dyn_into().map_err(describe)?;

    if !resp.ok() {
        return Err(format!("HTTP error! status: {}", resp.status()));
    }

    let text = JsFuture::from(resp.text().map_err(describe)?)
        .await
        .map_err(describe)?;
    Ok(text.as_string().and_then(|t| serde_json::from_str(&t).ok()))
}

impl SaveSink for FetchSink {
    fn save_document(&mut self, request: SaveRequest) {
        let id = self.instance_id;
        wasm_bindgen_futures::spawn_local(async move {
            let revision = request.revision;
            let outcome = match post_json(&request.url, &save_body(&request)).await {
                Ok(_) => SinkOutcome::Saved { revision },
                Err(message) => SinkOutcome::SaveFailed { revision, message },
            };
            InstanceManager::settle(&id, outcome, "save_document");
        });
    }

    fn upload_snapshot(&mut self, upload: SnapshotUpload) {
        let id = self.instance_id;
        wasm_bindgen_futures::spawn_local(async move {
            let snapshot_id = upload.snapshot_id.clone();
            let outcome = match post_json(&upload.url, &upload_body(&upload)).await {
                Ok(response) => SinkOutcome::Uploaded {
                    snapshot_id,
                    url: uploaded_url(response.as_ref()),
                },
                Err(message) => SinkOutcome::UploadFailed {
                    snapshot_id,
                    message,
                },
            };
            InstanceManager::settle(&id, outcome, "upload_snapshot");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_body_embeds_document() {
        let request = SaveRequest {
            url: "/save".to_string(),
            body: r#"{"drawings":[],"snapshots":[]}"#.to_string(),
            revision: 3,
            video_id: Some("17".to_string()),
            share_token: None,
        };
        let body = save_body(&request);
        assert_eq!(body["videoId"], "17");
        assert!(body["shareToken"].is_null());
        assert!(body["annotations"]["drawings"].is_array());
    }

    #[test]
    fn test_uploaded_url_lookup() {
        assert_eq!(uploaded_url(None), None);
        assert_eq!(uploaded_url(Some(&json!({"ok": true}))), None);
        assert_eq!(
            uploaded_url(Some(&json!({"imageUrl": "https://cdn/x.png"}))).as_deref(),
            Some("https://cdn/x.png")
        );
    }
}
