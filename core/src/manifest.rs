//! Serializable command-tree manifests.
//!
//! A [`TreeManifest`] describes parser options and a command tree in YAML
//! or JSON. [`TreeManifest::build`] turns it into a [`CommandTree`] with the
//! same structural checks as building the tree in code; executors are
//! attached with [`TreeManifest::build_with`].
//!
//! # Example YAML
//!
//! ```yaml
//! parser:
//!   cli_name: git
//!   provide_help_command: true
//! root:
//!   name: git
//!   commands:
//!     - name: remote
//!       commands:
//!         - name: add
//!           options:
//!             - key: fetch
//!               kind: bool
//!               short: [f]
//!               long: [fetch]
//!           values:
//!             - key: name
//!               kind: string
//!               required: true
//!             - key: url
//!               kind: string
//!               required: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coerce::coerce;
use crate::error::ConfigError;
use crate::options::{ParserOptions, is_json};
use crate::tree::{CommandNode, CommandTree, NodeId};
use crate::types::{OptionDef, Value, ValueDef, ValueKind};

/// Parser options plus the root command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeManifest {
    #[serde(default)]
    pub parser: ParserOptions,
    pub root: CommandManifest,
}

/// One command and its subcommands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandManifest {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_default: bool,
    pub order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Whether an executor is attached by [`TreeManifest::build_with`].
    /// Defaults to `true` for commands without subcommands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionManifest>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ValueManifest>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandManifest>,
}

impl CommandManifest {
    pub fn is_executable(&self) -> bool {
        self.executable.unwrap_or(self.commands.is_empty())
    }
}

/// A named option. `default` is written as it would appear on the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionManifest {
    pub key: String,
    pub kind: ValueKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub short: Vec<char>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub long: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub help_order: i32,
}

/// A positional value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueManifest {
    pub key: String,
    pub kind: ValueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Display name in usage lines; the key when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl TreeManifest {
    /// Loads a manifest from a `.json` file, or YAML for any other extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Json`]/[`ConfigError::Yaml`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let reader = BufReader::new(std::fs::File::open(path)?);
        let manifest: Self = if is_json(path) {
            serde_json::from_reader(reader)?
        } else {
            serde_yaml::from_reader(reader)?
        };
        debug!(path = %path.display(), root = %manifest.root.name, "Loaded tree manifest");
        Ok(manifest)
    }

    /// Saves the manifest as JSON or YAML, chosen by extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be written, or a
    /// serialization error.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let writer = BufWriter::new(std::fs::File::create(path)?);
        if is_json(path) {
            serde_json::to_writer_pretty(writer, self)?;
        } else {
            serde_yaml::to_writer(writer, self)?;
        }
        Ok(())
    }

    /// Builds the tree without attaching any executor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDefault`] for a default that does not
    /// convert to its field's kind, or [`ConfigError::Tree`] for structural
    /// problems.
    ///
    /// # Examples
    ///
    /// ```
    /// use argot_core::TreeManifest;
    ///
    /// let manifest: TreeManifest = serde_yaml::from_str(
    ///     "root:\n  name: tool\n  commands:\n    - name: build\n      aliases: [b]\n",
    /// )
    /// .unwrap();
    /// let tree = manifest.build().unwrap();
    /// assert_eq!(tree.len(), 2);
    /// ```
    pub fn build(&self) -> Result<CommandTree, ConfigError> {
        self.build_with(|_, _, node| node)
    }

    /// Builds the tree, passing every executable command through `attach`
    /// together with its space-joined path and manifest entry.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build). Nodes returned by `attach` go through
    /// the usual checks, so a mismatched validator still fails here.
    pub fn build_with<F>(&self, mut attach: F) -> Result<CommandTree, ConfigError>
    where
        F: FnMut(&str, &CommandManifest, CommandNode) -> CommandNode,
    {
        let mut root = self.root.to_node()?;
        if self.root.is_executable() {
            root = attach("", &self.root, root);
        }
        let mut tree = CommandTree::new(root)?;
        let root_id = tree.root();
        for child in &self.root.commands {
            add_subtree(&mut tree, root_id, "", child, &mut attach)?;
        }
        debug!(commands = tree.len(), "Built command tree from manifest");
        Ok(tree)
    }
}

fn add_subtree<F>(
    tree: &mut CommandTree,
    parent: NodeId,
    parent_path: &str,
    manifest: &CommandManifest,
    attach: &mut F,
) -> Result<(), ConfigError>
where
    F: FnMut(&str, &CommandManifest, CommandNode) -> CommandNode,
{
    let path = if parent_path.is_empty() {
        manifest.name.clone()
    } else {
        format!("{parent_path} {}", manifest.name)
    };
    let mut node = manifest.to_node()?;
    if manifest.is_executable() {
        node = attach(&path, manifest, node);
    }
    let id = tree.add_child(parent, node)?;
    for child in &manifest.commands {
        add_subtree(tree, id, &path, child, attach)?;
    }
    Ok(())
}

impl CommandManifest {
    fn to_node(&self) -> Result<CommandNode, ConfigError> {
        let mut node = CommandNode::new(&self.name).order(self.order);
        for alias in &self.aliases {
            node = node.alias(alias);
        }
        if self.is_default {
            node = node.default_command();
        }
        if let Some(help) = &self.help {
            node = node.with_help(help);
        }
        for option in &self.options {
            node = node.with_option(option.to_def()?);
        }
        for value in &self.values {
            node = node.with_value(value.to_def()?);
        }
        Ok(node)
    }
}

impl OptionManifest {
    fn to_def(&self) -> Result<OptionDef, ConfigError> {
        let mut def = OptionDef::new(&self.key, self.kind.clone()).help_order(self.help_order);
        for &short in &self.short {
            def = def.short(short);
        }
        for long in &self.long {
            def = def.long(long);
        }
        if self.required {
            def = def.required();
        }
        if let Some(raw) = &self.default {
            def = def.with_default(parse_default(raw, &self.kind, &self.key)?);
        }
        if let Some(help) = &self.help {
            def = def.with_help(help);
        }
        Ok(def)
    }
}

impl ValueManifest {
    fn to_def(&self) -> Result<ValueDef, ConfigError> {
        let mut def = if self.required {
            ValueDef::required(&self.key, self.kind.clone())
        } else {
            ValueDef::optional(&self.key, self.kind.clone())
        };
        if let Some(order) = self.order {
            def = def.at(order);
        }
        if let Some(name) = &self.name {
            def = def.named(name);
        }
        if let Some(raw) = &self.default {
            def = def.with_default(parse_default(raw, &self.kind, &self.key)?);
        }
        if let Some(help) = &self.help {
            def = def.with_help(help);
        }
        Ok(def)
    }
}

/// Converts a manifest default; a list default is a single element.
fn parse_default(raw: &str, kind: &ValueKind, key: &str) -> Result<Value, ConfigError> {
    let value = coerce(raw, kind, key)?;
    Ok(match kind {
        ValueKind::List(_) => Value::List(vec![value]),
        _ => value,
    })
}
