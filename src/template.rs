//! Template rendering shared by every generator and report.
//!
//! Rendering state is explicit: each call receives a [`RenderOptions`]
//! carrying the locale, which templates see as the `locale` variable.
//! Nothing here is process-global, so concurrent renders with different
//! locales cannot observe each other.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tera::{Context, Tera};

use crate::error::{Result, TesterError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en_US")]
    EnUs,
    #[serde(rename = "zh_CN")]
    ZhCn,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::EnUs => "en_US",
            Locale::ZhCn => "zh_CN",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "en_US" | "en-US" | "en" => Ok(Locale::EnUs),
            "zh_CN" | "zh-CN" | "zh" => Ok(Locale::ZhCn),
            other => Err(format!("unsupported locale '{other}' (expected en_US or zh_CN)")),
        }
    }
}

/// Per-call rendering configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub locale: Locale,
}

impl RenderOptions {
    pub fn with_locale(locale: Locale) -> Self {
        Self { locale }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDef {
    pub name: String,
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDef {
    pub name: String,
    pub params: String,
    pub return_type: String,
}

/// Values interpolated into a code template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateVariables {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_path: Option<String>,
    #[serde(default)]
    pub props: Vec<PropDef>,
    #[serde(default)]
    pub events: Vec<EventDef>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
    /// Free-form extra variables, visible at the top level of the template.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TemplateVariables {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

fn build_context<T: Serialize>(values: &T, options: &RenderOptions) -> Result<Context> {
    let mut context = Context::from_serialize(values)?;
    context.insert("locale", options.locale.as_str());
    Ok(context)
}

/// Render a code template. Output is not HTML-escaped.
pub fn render(template: &str, vars: &TemplateVariables, options: &RenderOptions) -> Result<String> {
    ensure_required(vars)?;
    let context = build_context(vars, options)?;
    Ok(Tera::one_off(template, &context, false)?)
}

/// Render any serializable object as the template context.
pub fn render_with<T: Serialize>(
    template: &str,
    values: &T,
    options: &RenderOptions,
    autoescape: bool,
) -> Result<String> {
    let context = build_context(values, options)?;
    Ok(Tera::one_off(template, &context, autoescape)?)
}

/// A template parsed once and rendered many times.
pub struct CompiledTemplate {
    tera: Tera,
    name: String,
}

pub fn compile(name: &str, template: &str) -> Result<CompiledTemplate> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.add_raw_template(name, template)?;
    Ok(CompiledTemplate {
        tera,
        name: name.to_string(),
    })
}

impl CompiledTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, vars: &TemplateVariables, options: &RenderOptions) -> Result<String> {
        ensure_required(vars)?;
        let context = build_context(vars, options)?;
        Ok(self.tera.render(&self.name, &context)?)
    }
}

/// Normalize generated code: strip trailing whitespace per line, keep at
/// most one blank line in a row, trim the ends, finish with one newline.
pub fn format_code(code: &str) -> String {
    let joined = code
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = String::with_capacity(joined.len() + 1);
    let mut newline_run = 0;
    for ch in joined.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run > 2 {
                continue;
            }
        } else {
            newline_run = 0;
        }
        out.push(ch);
    }

    let mut formatted = out.trim().to_string();
    formatted.push('\n');
    formatted
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportKind {
    /// `import X from 'm'`
    Default(String),
    /// `import { a, b } from 'm'`; empty means `import 'm'`.
    Named(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    pub from: String,
    pub imports: ImportKind,
}

pub fn generate_imports(specs: &[ImportSpec]) -> String {
    specs
        .iter()
        .map(|spec| match &spec.imports {
            ImportKind::Default(name) => format!("import {} from '{}'", name, spec.from),
            ImportKind::Named(names) if names.is_empty() => format!("import '{}'", spec.from),
            ImportKind::Named(names) => {
                format!("import {{ {} }} from '{}'", names.join(", "), spec.from)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<&str> for ImportKind {
    fn from(name: &str) -> Self {
        ImportKind::Default(name.to_string())
    }
}

/// Every code template is keyed on a component/function name.
pub fn ensure_required(vars: &TemplateVariables) -> Result<()> {
    if vars.name.trim().is_empty() {
        return Err(TesterError::Validation(
            "template variable 'name' must not be empty".to_string(),
        ));
    }
    Ok(())
}
