//! Incoming HTTP request
//!
//! A plain-data snapshot of the request. The server boundary builds one of
//! these from the wire; the core never touches sockets.

use std::collections::HashMap;

/// An incoming request flowing through the middleware pipeline.
#[derive(Clone, Debug, Default)]
pub struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    query: HashMap<String, String>,
    body: String,
}

impl Request {
    pub fn new(method: &str, path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, parse_form(q)),
            None => (path, HashMap::new()),
        };
        Self {
            method: method.to_uppercase(),
            path: path.to_string(),
            headers: Vec::new(),
            query,
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// Override the HTTP verb (method spoofing via a `_method` form field).
    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_uppercase();
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// First header with the given name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Form fields decoded from a urlencoded body.
    pub fn form(&self) -> HashMap<String, String> {
        if self.is_form() {
            parse_form(&self.body)
        } else {
            HashMap::new()
        }
    }

    /// A single input value: form field first, then query string.
    pub fn input(&self, name: &str) -> Option<String> {
        self.form().remove(name).or_else(|| self.query(name).map(str::to_string))
    }

    fn is_form(&self) -> bool {
        self.header("content-type")
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false)
    }
}

/// Decode an `application/x-www-form-urlencoded` payload.
pub fn parse_form(raw: &str) -> HashMap<String, String> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (url_decode(k), url_decode(v)),
            None => (url_decode(pair), String::new()),
        })
        .collect()
}

fn url_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match hex_pair(bytes.get(i + 1).copied(), bytes.get(i + 2).copied()) {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(high: Option<u8>, low: Option<u8>) -> Option<u8> {
    let high = (high? as char).to_digit(16)?;
    let low = (low? as char).to_digit(16)?;
    Some((high * 16 + low) as u8)
}
