//! Help and version surface.
//!
//! When enabled in [`ParserOptions`], the parser injects `help` and
//! `version` commands at the root and answers `-h`/`--help`/`--version`
//! tokens. Both commands bind a [`HelpText`] whose executor writes the
//! rendered text to stdout and exits with 0.

use std::io::Write;

use tracing::debug;

use crate::error::TreeError;
use crate::executor::Invoker;
use crate::options::ParserOptions;
use crate::tree::{CommandNode, CommandTree, NodeId, Synthetic};
use crate::types::{OptionDef, ValueDef, ValueKind};

/// Rendered help or version text bound by the synthetic commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpText {
    pub text: String,
}

impl HelpText {
    pub fn new(text: String) -> Self {
        Self { text }
    }
}

/// Executor shared by every help/version invocation.
pub(crate) fn text_invoker() -> Invoker {
    Invoker::delegate::<HelpText, _>(|help| {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(help.text.as_bytes())?;
        stdout.flush()?;
        Ok(0)
    })
}

/// Adds the synthetic commands requested by `options` under the root.
///
/// A root child already named `help` or `version` wins over the synthetic
/// one.
pub(crate) fn install(tree: &mut CommandTree, options: &ParserOptions) -> Result<(), TreeError> {
    let root = tree.root();
    let taken = |tree: &CommandTree, name: &str| {
        tree.children(root)
            .any(|(_, n)| n.matches_name(name, true) || n.matches_alias(name, true))
    };

    if options.provide_help_command && !taken(tree, "help") {
        let mut help = CommandNode::new("help")
            .with_help("Show help for a command")
            .order(i32::MAX)
            .with_value(
                ValueDef::optional("command", ValueKind::List(Box::new(ValueKind::String)))
                    .named("COMMAND"),
            );
        help.synthetic = Some(Synthetic::Help);
        help.invoker = Some(text_invoker());
        tree.add_child(root, help)?;
        debug!("Installed help command");
    }

    if options.provide_version_command && !taken(tree, "version") {
        let mut version = CommandNode::new("version")
            .with_help("Show version information")
            .order(i32::MAX);
        version.synthetic = Some(Synthetic::Version);
        version.invoker = Some(text_invoker());
        tree.add_child(root, version)?;
        debug!("Installed version command");
    }

    Ok(())
}

/// Renders the version banner: name and version, then the copyright line.
///
/// # Examples
///
/// ```
/// use argot_core::{ParserOptions, render_version};
///
/// let options = ParserOptions::new("tool")
///     .with_name("Tool")
///     .with_version("1.2.0")
///     .with_author("Example Org", Some(2026));
/// assert_eq!(render_version(&options), "Tool 1.2.0\nCopyright (c) 2026 Example Org\n");
/// ```
pub fn render_version(options: &ParserOptions) -> String {
    let name = if options.name.is_empty() {
        &options.cli_name
    } else {
        &options.name
    };
    let mut out = format!("{name} {}", options.version).trim().to_string();
    out.push('\n');
    if !options.author.is_empty() {
        match options.year {
            Some(year) => out.push_str(&format!("Copyright (c) {year} {}\n", options.author)),
            None => out.push_str(&format!("Copyright (c) {}\n", options.author)),
        }
    }
    out
}

/// Renders usage, description, subcommands, options and values of `id`.
pub fn render_help(tree: &CommandTree, id: NodeId, options: &ParserOptions) -> String {
    let Some(node) = tree.node(id) else {
        return String::new();
    };
    let mut out = String::new();

    if !options.name.is_empty() {
        out.push_str(render_version(options).lines().next().unwrap_or_default());
        out.push_str("\n\n");
    }
    if let Some(help) = &node.help {
        out.push_str(help);
        out.push_str("\n\n");
    }

    out.push_str(&usage_line(tree, id, node, options));
    out.push('\n');

    let mut commands: Vec<&CommandNode> = tree.children(id).map(|(_, n)| n).collect();
    commands.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
    let rows: Vec<(String, String)> = commands
        .iter()
        .map(|c| {
            let mut label = std::iter::once(c.name.as_str())
                .chain(c.aliases.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(", ");
            if c.is_default {
                label.push_str(" (default)");
            }
            (label, c.help.clone().unwrap_or_default())
        })
        .collect();
    push_section(&mut out, "Commands", &rows);

    let mut flags: Vec<&OptionDef> = node.options.iter().collect();
    flags.sort_by(|a, b| a.help_order.cmp(&b.help_order).then_with(|| a.key.cmp(&b.key)));
    let rows: Vec<(String, String)> = flags.iter().map(|o| option_row(o)).collect();
    push_section(&mut out, "Options", &rows);

    let rows: Vec<(String, String)> = node
        .ordered_values()
        .iter()
        .map(|v| {
            let mut description = v.help.clone().unwrap_or_default();
            if v.required && v.default.is_none() {
                append_note(&mut description, "required");
            }
            (format!("<{}>", v.display_name), description)
        })
        .collect();
    push_section(&mut out, "Values", &rows);

    out
}

fn usage_line(tree: &CommandTree, id: NodeId, node: &CommandNode, options: &ParserOptions) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !options.cli_name.is_empty() {
        parts.push(options.cli_name.clone());
    }
    parts.extend(tree.path(id).into_iter().map(String::from));
    if !node.options.is_empty() {
        parts.push("[options]".to_string());
    }
    if !node.children().is_empty() {
        parts.push("<command>".to_string());
    }
    for value in node.ordered_values() {
        let ellipsis = if value.kind.is_repeatable() { "..." } else { "" };
        if value.required && value.default.is_none() {
            parts.push(format!("<{}>{ellipsis}", value.display_name));
        } else {
            parts.push(format!("[{}]{ellipsis}", value.display_name));
        }
    }
    format!("Usage: {}", parts.join(" "))
}

fn option_row(option: &OptionDef) -> (String, String) {
    let mut names: Vec<String> = option.short.iter().map(|s| format!("-{s}")).collect();
    names.extend(option.long.iter().map(|l| format!("--{l}")));
    let mut label = names.join(", ");
    if !option.kind.is_flag() {
        label.push_str(&format!(" <{}>", option.kind.element().display_name()));
    }

    let mut description = option.help.clone().unwrap_or_default();
    if option.kind.is_repeatable() {
        append_note(&mut description, "repeatable");
    }
    if option.required && option.default.is_none() {
        append_note(&mut description, "required");
    }
    if let Some(default) = &option.default {
        let shown = serde_json::to_string(default).unwrap_or_default();
        append_note(&mut description, &format!("default: {shown}"));
    }
    (label, description)
}

fn append_note(description: &mut String, note: &str) {
    if !description.is_empty() {
        description.push(' ');
    }
    description.push_str(&format!("({note})"));
}

fn push_section(out: &mut String, title: &str, rows: &[(String, String)]) {
    if rows.is_empty() {
        return;
    }
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    out.push('\n');
    out.push_str(title);
    out.push_str(":\n");
    for (label, description) in rows {
        let line = format!("  {label:<width$}  {description}");
        out.push_str(line.trim_end());
        out.push('\n');
    }
}
