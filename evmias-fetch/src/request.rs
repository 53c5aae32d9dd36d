//! Upstream request description.

use evmias_core::CookieSet;
use reqwest::Method;
use std::time::Duration;

/// Body of an upstream request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` pairs, in order.
    Form(Vec<(String, String)>),
    /// Raw text, sent as-is.
    Raw(String),
}

/// An immutable description of one upstream call.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: RequestBody,
    cookies: CookieSet,
    timeout: Option<Duration>,
    raise_for_status: bool,
}

impl FetchRequest {
    /// Creates a request with the given method.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
            cookies: CookieSet::new(),
            timeout: None,
            raise_for_status: true,
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds several headers.
    #[must_use]
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the `c`/`m` controller and method pair.
    #[must_use]
    pub fn controller(self, controller: &str, method: &str) -> Self {
        self.query("c", controller).query("m", method)
    }

    /// Sets a form-encoded body.
    #[must_use]
    pub fn form<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Sets a raw text body.
    #[must_use]
    pub fn raw_body(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Raw(body.into());
        self
    }

    /// Sends the given cookies with the request.
    #[must_use]
    pub fn cookies(mut self, cookies: &CookieSet) -> Self {
        self.cookies = cookies.clone();
        self
    }

    /// Overrides the client's default timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Controls whether a non-2xx status is reported as an error. Defaults to true.
    #[must_use]
    pub fn raise_for_status(mut self, raise: bool) -> Self {
        self.raise_for_status = raise;
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL without the query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request headers, in insertion order.
    pub fn header_pairs(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Looks up a header value, ignoring case.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Query parameters, in insertion order.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Looks up a query parameter.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Request body.
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Looks up a form field.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Cookies sent with the request.
    pub fn cookie_set(&self) -> &CookieSet {
        &self.cookies
    }

    /// Per-call timeout override.
    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether non-2xx statuses are errors.
    pub fn raises_for_status(&self) -> bool {
        self.raise_for_status
    }

    /// `METHOD url?c=..&m=..` label for logs.
    pub fn label(&self) -> String {
        match (self.query_value("c"), self.query_value("m")) {
            (Some(c), Some(m)) => format!("{} {} [{c}/{m}]", self.method, self.url),
            _ => format!("{} {}", self.method, self.url),
        }
    }
}
