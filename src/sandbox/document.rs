//! Execution document — the self-contained HTML page a realm loads.
//!
//! Layout of the generated page:
//! 1. markup shell with a single `#root` element
//! 2. pinned rendering runtime (React UMD) and JSX transformer
//! 3. a plain script installing the error panel and global error listeners
//! 4. the untrusted source as a `text/babel` script, followed by a bootstrap
//!    that checks the entry symbol is invocable and renders it inside an
//!    error boundary with the merged config as its only prop
//!
//! Untrusted text only ever lands inside script bodies. `</script` in the
//! source is neutralized and the config JSON has `<` escaped, so neither can
//! terminate its script element early.

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::registry::types::{AppDefinition, Config, Widget};
use crate::validator::EntryPoint;

pub const RUNTIME_VERSION: &str = "18.2.0";
pub const TRANSFORMER_VERSION: &str = "7.23.9";

const SHELL_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<style>
  body { margin: 0; padding: 0; overflow: hidden; font-family: system-ui, -apple-system, sans-serif; }
  #root { width: 100%; height: 100vh; }
  .widget-error { box-sizing: border-box; height: 100%; padding: 12px; color: #991b1b; background: #fef2f2; font-size: 13px; }
  .widget-error pre { white-space: pre-wrap; margin: 8px 0 0; }
</style>
"#;

const ERROR_PANEL_SCRIPT: &str = r"<script>
  window.__widgetErrorPanel = function (message) {
    var root = document.getElementById('root');
    root.textContent = '';
    var panel = document.createElement('div');
    panel.className = 'widget-error';
    panel.setAttribute('role', 'alert');
    var title = document.createElement('strong');
    title.textContent = 'This widget failed to render';
    var detail = document.createElement('pre');
    detail.textContent = 'Error: ' + String(message);
    panel.appendChild(title);
    panel.appendChild(detail);
    root.appendChild(panel);
  };
  window.addEventListener('error', function (event) {
    window.__widgetErrorPanel(event.message || 'Unknown error');
  });
  window.addEventListener('unhandledrejection', function (event) {
    var reason = event.reason;
    window.__widgetErrorPanel(reason && reason.message ? reason.message : String(reason));
  });
</script>
";

const BOUNDARY: &str = r"
class __WidgetBoundary extends React.Component {
  constructor(props) { super(props); this.state = { error: null }; }
  static getDerivedStateFromError(error) { return { error: error }; }
  render() {
    if (this.state.error) {
      var message = this.state.error && this.state.error.message ? this.state.error.message : String(this.state.error);
      return React.createElement('div', { className: 'widget-error', role: 'alert' },
        React.createElement('strong', null, 'This widget failed to render'),
        React.createElement('pre', null, 'Error: ' + message));
    }
    return this.props.children;
  }
}
";

/// Everything a backend needs to open a realm for one widget.
#[derive(Debug, Clone)]
pub struct ExecutionDocument {
    pub widget_id: Uuid,
    pub app_id: Uuid,
    pub entry: EntryPoint,
    pub source_text: String,
    /// Merged config: the component's only input.
    pub config: Config,
    pub html: String,
}

impl ExecutionDocument {
    #[must_use]
    pub fn build(app: &AppDefinition, widget: &Widget, entry: EntryPoint, config: Config) -> Self {
        let html = render_html(&app.name, &app.source_text, &entry.symbol, &config);
        Self { widget_id: widget.id, app_id: app.id, entry, source_text: app.source_text.clone(), config, html }
    }
}

fn render_html(title: &str, source: &str, symbol: &str, config: &Config) -> String {
    let mut html = String::with_capacity(SHELL_HEAD.len() + source.len() + 4096);
    html.push_str(SHELL_HEAD);
    html.push_str("<title>");
    html.push_str(&escape_text(title));
    html.push_str("</title>\n");
    html.push_str(&format!(
        "<script src=\"https://unpkg.com/react@{RUNTIME_VERSION}/umd/react.production.min.js\"></script>\n\
         <script src=\"https://unpkg.com/react-dom@{RUNTIME_VERSION}/umd/react-dom.production.min.js\"></script>\n\
         <script src=\"https://unpkg.com/@babel/standalone@{TRANSFORMER_VERSION}/babel.min.js\"></script>\n"
    ));
    html.push_str(ERROR_PANEL_SCRIPT);
    html.push_str("</head>\n<body>\n<div id=\"root\"></div>\n<script type=\"text/babel\" data-presets=\"react\">\n");
    html.push_str(&neutralize_script_close(source));
    html.push_str("\n;\n");
    html.push_str(BOUNDARY);
    html.push_str(&format!(
        "const __widgetConfig = {config};\n\
         const __widgetEntry = typeof {symbol} === 'function' ? {symbol} : null;\n\
         if (__widgetEntry === null) {{\n  \
           window.__widgetErrorPanel('{symbol} is not a function component');\n\
         }} else {{\n  \
           ReactDOM.createRoot(document.getElementById('root')).render(\n    \
             React.createElement(__WidgetBoundary, null, React.createElement(__widgetEntry, {{ config: __widgetConfig }}))\n  \
           );\n\
         }}\n",
        config = config_literal(config),
    ));
    html.push_str("</script>\n</body>\n</html>\n");
    html
}

/// JSON literal safe to embed in a script body.
fn config_literal(config: &Config) -> String {
    serde_json::to_string(config)
        .unwrap_or_else(|_| "{}".to_owned())
        .replace('<', "\\u003c")
}

fn script_close_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</(script)").ok()).as_ref()
}

fn neutralize_script_close(source: &str) -> String {
    match script_close_re() {
        Some(re) => re.replace_all(source, r"<\/$1").into_owned(),
        None => source.replace("</", r"<\/"),
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
#[path = "document_test.rs"]
mod tests;
