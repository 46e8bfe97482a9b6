//! Sandboxed Luau runtime with the ambient `ui` API.
//!
//! Generated documents are Luau source (type annotations allowed; the
//! compiler strips them) with no module imports. The runtime exposes a
//! single global `ui` table for building markup and must be mounted to
//! the root as the document's final act:
//!
//! ```luau
//! local hero: string = ui.el("div", { class = "hero" }, ui.text("Hello"))
//! ui.mount(hero)
//! ```
//!
//! The interpreter has no filesystem, network, or process access; the
//! engine sandbox is enabled, memory is capped, and execution is cut off
//! by an interrupt budget so a runaway document cannot wedge the host.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mlua::{Lua, Table, Value, Variadic, VmState};

use super::error::SandboxError;

/// Heap cap for one document: 8 MiB.
const MEMORY_LIMIT_BYTES: usize = 8 * 1024 * 1024;

/// Interrupt callbacks allowed per execute before the document is cut off.
const INTERRUPT_BUDGET: u64 = 10_000_000;

/// Elements rendered without a closing tag.
const VOID_ELEMENTS: &[&str] = &["img", "input", "br", "hr", "meta", "link"];

/// One sandboxed interpreter plus the root output buffer documents mount
/// into. Owned by a single execution host thread; never crosses threads.
pub struct UiRuntime {
    lua: Lua,
    root: Rc<RefCell<Option<String>>>,
    budget: Rc<Cell<u64>>,
}

impl UiRuntime {
    pub fn new() -> Result<Self, SandboxError> {
        let lua = Lua::new();
        let root = Rc::new(RefCell::new(None));

        register_ui(&lua, Rc::clone(&root)).map_err(|e| SandboxError::Init(e.to_string()))?;
        block_ambient_globals(&lua).map_err(|e| SandboxError::Init(e.to_string()))?;

        // Globals are sealed from here on; documents only read them.
        lua.sandbox(true)
            .map_err(|e| SandboxError::Init(e.to_string()))?;
        lua.set_memory_limit(MEMORY_LIMIT_BYTES)
            .map_err(|e| SandboxError::Init(e.to_string()))?;

        let budget = Rc::new(Cell::new(0u64));
        {
            let budget = Rc::clone(&budget);
            lua.set_interrupt(move |_| {
                let used = budget.get() + 1;
                budget.set(used);
                if used > INTERRUPT_BUDGET {
                    return Err(mlua::Error::RuntimeError(
                        "execution budget exceeded".to_string(),
                    ));
                }
                Ok(VmState::Continue)
            });
        }

        Ok(Self { lua, root, budget })
    }

    /// Compile and run one source document. The previous render is
    /// cleared before compilation so a failed or partial document never
    /// leaves stale output behind.
    pub fn execute(&self, source: &str) -> Result<String, SandboxError> {
        self.root.borrow_mut().take();
        self.budget.set(0);

        self.lua.load(source).set_name("document").exec()?;

        match self.root.borrow().as_ref() {
            Some(html) => Ok(html.clone()),
            None => Err(SandboxError::NothingMounted),
        }
    }

    /// Replace the root output with the diagnostic panel for a failed
    /// document, so the host surface shows the failure rather than a
    /// previous render.
    pub fn mount_error_panel(&self, message: &str, trace: &str) {
        *self.root.borrow_mut() = Some(error_panel(message, trace));
    }

    /// Currently mounted output, if any.
    pub fn output(&self) -> Option<String> {
        self.root.borrow().clone()
    }
}

/// Human-readable diagnostic panel shown in place of a failed render.
pub fn error_panel(message: &str, trace: &str) -> String {
    format!(
        "<div class=\"error-container\"><h3>Preview Error</h3><pre>{}</pre>\
         <hr/><h4>Stack Trace:</h4><pre>{}</pre></div>",
        escape_html(message),
        escape_html(trace)
    )
}

fn register_ui(lua: &Lua, root: Rc<RefCell<Option<String>>>) -> mlua::Result<()> {
    let ui = lua.create_table()?;

    ui.set(
        "el",
        lua.create_function(
            |_, (tag, attrs, children): (String, Option<Table>, Variadic<String>)| {
                render_element(&tag, attrs.as_ref(), &children)
            },
        )?,
    )?;

    ui.set(
        "text",
        lua.create_function(|_, text: String| Ok(escape_html(&text)))?,
    )?;

    ui.set(
        "image",
        lua.create_function(|_, (src, alt): (String, Option<String>)| {
            Ok(format!(
                "<img src=\"{}\" alt=\"{}\"/>",
                escape_html(&src),
                escape_html(&alt.unwrap_or_default())
            ))
        })?,
    )?;

    // Raw stylesheet block; documents style themselves with one of these.
    ui.set(
        "style",
        lua.create_function(|_, css: String| Ok(format!("<style>{}</style>", css)))?,
    )?;

    ui.set(
        "mount",
        lua.create_function(move |_, html: String| {
            *root.borrow_mut() = Some(html);
            Ok(())
        })?,
    )?;

    lua.globals().set("ui", ui)
}

/// Replace ambient names a document must never reach with erroring
/// stubs. Luau ships without most of these, but the stubs make the
/// failure explicit instead of a nil-index error.
fn block_ambient_globals(lua: &Lua) -> mlua::Result<()> {
    for name in ["io", "require", "loadstring", "dofile"] {
        let msg = format!("{name} is not available to generated documents");
        lua.globals().set(
            name,
            lua.create_function(move |_, _: Value| {
                Err::<(), _>(mlua::Error::RuntimeError(msg.clone()))
            })?,
        )?;
    }
    Ok(())
}

fn render_element(tag: &str, attrs: Option<&Table>, children: &[String]) -> mlua::Result<String> {
    if tag.is_empty()
        || !tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(mlua::Error::RuntimeError(format!(
            "invalid element tag: {tag:?}"
        )));
    }

    // Attribute order is sorted so identical documents render
    // byte-identically regardless of Lua table iteration order.
    let mut pairs = Vec::new();
    if let Some(table) = attrs {
        for entry in table.pairs::<String, Value>() {
            let (key, value) = entry?;
            let rendered = match value {
                Value::String(s) => s.to_string_lossy().to_string(),
                Value::Integer(i) => i.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Boolean(b) => b.to_string(),
                _ => continue,
            };
            pairs.push((key, rendered));
        }
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut html = String::new();
    html.push('<');
    html.push_str(tag);
    for (key, value) in &pairs {
        html.push(' ');
        html.push_str(key);
        html.push_str("=\"");
        html.push_str(&escape_html(value));
        html.push('"');
    }

    if VOID_ELEMENTS.contains(&tag) {
        html.push_str("/>");
        return Ok(html);
    }

    html.push('>');
    for child in children {
        html.push_str(child);
    }
    html.push_str("</");
    html.push_str(tag);
    html.push('>');
    Ok(html)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
