//! Isolation boundary policy — the capability allow-list applied to every realm.
//!
//! The same policy object is used for every widget. There is no per-widget
//! elevation: `IsolationPolicy` has no constructor that takes tokens.

/// Capabilities granted inside a realm, as iframe `sandbox` tokens.
pub const GRANTED: [&str; 5] = [
    "allow-scripts",
    "allow-forms",
    "allow-popups",
    "allow-popups-to-escape-sandbox",
    "allow-modals",
];

/// Tokens that must never be granted. `allow-same-origin` would share
/// cookies, storage and DOM with the host page; the navigation tokens would
/// let the realm drive the host page.
pub const DENIED: [&str; 4] = [
    "allow-same-origin",
    "allow-top-navigation",
    "allow-top-navigation-by-user-activation",
    "allow-top-navigation-to-custom-protocols",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IsolationPolicy;

impl IsolationPolicy {
    #[must_use]
    pub fn granted(&self) -> &'static [&'static str] {
        &GRANTED
    }

    #[must_use]
    pub fn permits(&self, token: &str) -> bool {
        GRANTED.contains(&token)
    }

    /// Value for the client-side iframe `sandbox` attribute.
    #[must_use]
    pub fn sandbox_attribute(&self) -> String {
        GRANTED.join(" ")
    }

    /// `Content-Security-Policy` value for served realm documents. The
    /// `sandbox` directive applies the same allow-list even if the document
    /// is opened outside its iframe.
    #[must_use]
    pub fn content_security_policy(&self) -> String {
        format!("sandbox {}", self.sandbox_attribute())
    }
}
