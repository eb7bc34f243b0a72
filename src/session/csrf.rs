use once_cell::sync::Lazy;
use regex::Regex;

static FORM_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"name="csrfmiddlewaretoken"\s+value="([^"]+)""#).expect("valid form token pattern")
});

/// Anti-forgery token pair: the cookie value goes in the `X-CSRFToken`
/// header, the form value in the `csrfmiddlewaretoken` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntiForgeryToken {
    pub cookie_token: String,
    pub form_token: String,
}

impl AntiForgeryToken {
    /// The cookie token doubles as the form token when no form was fetched.
    pub fn from_cookie(token: String) -> Self {
        Self {
            form_token: token.clone(),
            cookie_token: token,
        }
    }
}

/// Pull the hidden form token out of the login page HTML.
pub fn extract_form_token(html: &str) -> Option<String> {
    FORM_TOKEN
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
