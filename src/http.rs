use crate::model::{FieldsPatch, NewNote, Note, Position};
use crate::sync::{NoteStore, SyncError, SyncResult};
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde_json::json;

pub const USER_HEADER: &str = "x-user-id";

/// Unreserved path characters stay as they are.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// REST backend of record. Every request carries the caller identity header.
pub struct HttpStore {
    agent: ureq::Agent,
    base_url: String,
    user_id: String,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        HttpStore {
            agent: ureq::AgentBuilder::new().build(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &self.url(path))
            .set(USER_HEADER, &self.user_id)
            .set("Accept", "application/json")
    }
}

fn note_path(id: &str) -> String {
    format!("/notes/{}", utf8_percent_encode(id, PATH_SEGMENT))
}

fn into_sync_error(err: ureq::Error, id: Option<&str>) -> SyncError {
    match (err, id) {
        (ureq::Error::Status(404, _), Some(id)) => SyncError::NotFound(id.to_string()),
        (ureq::Error::Status(code, response), _) => SyncError::Status {
            code,
            body: response.into_string().unwrap_or_default(),
        },
        (ureq::Error::Transport(transport), _) => SyncError::Transport(transport.to_string()),
    }
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> SyncResult<T> {
    response
        .into_json::<T>()
        .map_err(|err| SyncError::Decode(err.to_string()))
}

impl NoteStore for HttpStore {
    fn list(&mut self) -> SyncResult<Vec<Note>> {
        let response = self
            .request("GET", "/notes")
            .call()
            .map_err(|err| into_sync_error(err, None))?;
        decode(response)
    }

    fn get(&mut self, id: &str) -> SyncResult<Note> {
        let response = self
            .request("GET", &note_path(id))
            .call()
            .map_err(|err| into_sync_error(err, Some(id)))?;
        decode(response)
    }

    fn create(&mut self, draft: &NewNote) -> SyncResult<Note> {
        let response = self
            .request("POST", "/notes")
            .send_json(draft)
            .map_err(|err| into_sync_error(err, None))?;
        decode(response)
    }

    fn patch_position(&mut self, id: &str, position: Position) -> SyncResult<Note> {
        let response = self
            .request("PATCH", &format!("{}/position", note_path(id)))
            .send_json(position)
            .map_err(|err| into_sync_error(err, Some(id)))?;
        decode(response)
    }

    fn patch_date(&mut self, id: &str, date: DateTime<Utc>) -> SyncResult<Note> {
        let response = self
            .request("PATCH", &format!("{}/date", note_path(id)))
            .send_json(json!({ "date": date }))
            .map_err(|err| into_sync_error(err, Some(id)))?;
        decode(response)
    }

    fn patch_fields(&mut self, id: &str, patch: &FieldsPatch) -> SyncResult<Note> {
        let response = self
            .request("PATCH", &note_path(id))
            .send_json(patch)
            .map_err(|err| into_sync_error(err, Some(id)))?;
        decode(response)
    }

    fn delete(&mut self, id: &str) -> SyncResult<()> {
        self.request("DELETE", &note_path(id))
            .call()
            .map_err(|err| into_sync_error(err, Some(id)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serves one request with `body` and hands back the raw request head.
    fn serve_once(body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 512];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                concat!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n",
                    "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                ),
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            tx.send(String::from_utf8_lossy(&head).into_owned()).unwrap();
        });
        (format!("http://{addr}"), rx)
    }

    #[test]
    fn requests_carry_the_caller_identity() {
        let (base_url, requests) = serve_once("[]");
        let mut store = HttpStore::new(base_url, "alice");
        assert_eq!(store.list().unwrap(), Vec::new());

        let head = requests.recv().unwrap().to_ascii_lowercase();
        assert!(head.starts_with("get /notes http/1.1"));
        assert!(head.contains("x-user-id: alice\r\n"), "request was: {head}");
    }

    #[test]
    fn single_note_requests_use_the_encoded_path() {
        let (base_url, requests) = serve_once("");
        let mut store = HttpStore::new(base_url, "bob");
        store.delete("a/b").unwrap();

        let head = requests.recv().unwrap().to_ascii_lowercase();
        assert!(head.starts_with("delete /notes/a%2fb http/1.1"));
        assert!(head.contains("x-user-id: bob\r\n"));
    }

    #[test]
    fn note_ids_are_path_encoded() {
        assert_eq!(note_path("abc-1"), "/notes/abc-1");
        assert_eq!(note_path("a/b c"), "/notes/a%2Fb%20c");
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let store = HttpStore::new("http://localhost:3000/api/", "me");
        assert_eq!(store.url("/notes"), "http://localhost:3000/api/notes");
    }

    #[test]
    fn unreachable_backend_is_a_transport_error() {
        let mut store = HttpStore::new("http://127.0.0.1:9", "me");
        match store.list() {
            Err(SyncError::Transport(_)) => {}
            other => panic!("unexpected result {other:?}"),
        }
    }
}
