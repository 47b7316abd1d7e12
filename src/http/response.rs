use std::collections::HashMap;

/// HTTP status codes the proxy answers with on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 302 Found
    Found,
}

impl StatusCode {
    /// ```
    /// # use devproxy::http::response::StatusCode;
    /// assert_eq!(StatusCode::Found.as_u16(), 302);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Found => 302,
        }
    }
}

/// A response generated by the proxy itself (e.g. the logout redirect).
///
/// These responses never carry a body.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
}

/// Builder for constructing HTTP responses in a fluent style.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HashMap<String, String>,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
        }
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Builds the final Response, adding an empty Content-Length if missing.
    pub fn build(mut self) -> Response {
        self.headers
            .entry("Content-Length".to_string())
            .or_insert_with(|| "0".to_string());

        Response {
            status: self.status,
            headers: self.headers,
        }
    }
}

impl Response {
    /// Creates a 302 Found response pointing at `location`.
    pub fn redirect(location: impl Into<String>) -> ResponseBuilder {
        ResponseBuilder::new(StatusCode::Found).header("Location", location)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }
}
