use std::fmt;

const KEY_HEADER: &str = "X-Appwrite-Key";
const JWT_HEADER: &str = "X-Appwrite-JWT";

/// How requests authenticate against the project.
#[derive(Clone, Default)]
pub enum Credentials {
    /// Server API key with scopes granted in the console.
    ApiKey(String),
    /// Short-lived account JWT (15 minutes) issued to a signed-in user.
    Jwt(String),
    /// No credentials; only resources readable by `any` are reachable.
    #[default]
    Anonymous,
}

impl Credentials {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(key.into())
    }

    pub fn jwt(token: impl Into<String>) -> Self {
        Self::Jwt(token.into())
    }

    pub(crate) fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::ApiKey(key) => req.header(KEY_HEADER, key),
            Self::Jwt(token) => req.header(JWT_HEADER, token),
            Self::Anonymous => req,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
            Self::Jwt(_) => f.write_str("Jwt(***)"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}
