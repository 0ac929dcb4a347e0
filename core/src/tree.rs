//! The command tree.
//!
//! [`CommandTree`] is an arena that owns every [`CommandNode`]; children are
//! listed by [`NodeId`] and each node keeps a non-owning parent id used to
//! rebuild command paths. The tree has two phases: while building, nodes are
//! added and removed with structural checks that fail fast with
//! [`TreeError`]; once [`frozen`](CommandTree::freeze) it is read-only and may
//! be resolved from any number of threads.
//!
//! # Example
//!
//! ```
//! use argot_core::*;
//!
//! let mut tree = CommandTree::new(CommandNode::root("tool")).unwrap();
//! let remote = tree.add_child(tree.root(), CommandNode::new("remote")).unwrap();
//! let add = tree
//!     .add_child(remote, CommandNode::new("add").alias("a"))
//!     .unwrap();
//! tree.freeze();
//!
//! let tokens: Vec<String> = ["remote", "a", "origin"].iter().map(|s| s.to_string()).collect();
//! let resolution = tree.resolve(&tokens, true).unwrap();
//! assert_eq!(resolution.leaf(), add);
//! assert_eq!(resolution.remaining, ["origin"]);
//! assert_eq!(tree.path_string(add), "remote add");
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::binding::{Binder, CommandOptions};
use crate::error::{CliError, ErrorKind, TreeError};
use crate::executor::{
    Execute, ExecuteAsync, ExecutorShape, Invoker, RunCommand, RunCommandAsync,
};
use crate::types::{OptionDef, Value, ValueDef, ValueKind};
use crate::validate::{ErasedValidator, Validator};

/// Index of a node in its [`CommandTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Commands injected by the parser rather than declared by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Synthetic {
    Help,
    Version,
}

/// One command: its names, fields and executor.
///
/// Nodes are built with the chained methods below and handed to
/// [`CommandTree::add_child`]. A node without an executor is a grouping
/// node; resolving to one succeeds but dispatching it fails with
/// [`ErrorKind::CommandNotExecutable`].
///
/// # Examples
///
/// ```
/// use argot_core::*;
///
/// let build = CommandNode::new("build")
///     .alias("b")
///     .with_help("Build a target")
///     .with_option(OptionDef::flag("verbose").short('v').long("verbose"))
///     .with_value(ValueDef::required("target", ValueKind::String))
///     .handler::<BoundArgs, _>(|args| {
///         println!("building {}", args.get::<String>("target")?);
///         Ok(0)
///     });
///
/// assert!(build.matches_alias("b", true));
/// assert_eq!(build.executor_shape(), Some(ExecutorShape::DelegateSync));
/// ```
#[derive(Debug, Clone)]
pub struct CommandNode {
    pub name: String,
    pub aliases: Vec<String>,
    pub is_default: bool,
    pub order: i32,
    pub help: Option<String>,
    pub options: Vec<OptionDef>,
    pub values: Vec<ValueDef>,
    pub(crate) binder: Binder,
    pub(crate) invoker: Option<Invoker>,
    pub(crate) validators: Vec<ErasedValidator>,
    pub(crate) synthetic: Option<Synthetic>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl CommandNode {
    /// Creates a grouping command with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            is_default: false,
            order: 0,
            help: None,
            options: Vec::new(),
            values: Vec::new(),
            binder: Binder::untyped(),
            invoker: None,
            validators: Vec::new(),
            synthetic: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Creates the implicit root; `name` is the program name.
    pub fn root(name: &str) -> Self {
        Self::new(name)
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Marks this command as the one entered when no sibling matches.
    pub fn default_command(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn with_option(mut self, option: OptionDef) -> Self {
        self.options.push(option);
        self
    }

    /// Adds a positional value; an unset order places it after the others.
    pub fn with_value(mut self, mut value: ValueDef) -> Self {
        if value.order.is_none() {
            let next = self
                .values
                .iter()
                .filter_map(|v| v.order)
                .max()
                .map_or(0, |max| max + 1);
            value.order = Some(next);
        }
        self.values.push(value);
        self
    }

    /// Declares the typed options struct bound for this command.
    pub fn options<T: CommandOptions>(mut self) -> Self {
        self.binder = Binder::of::<T>();
        self
    }

    /// Registers `T` as a self-executing options struct.
    pub fn runs<T: RunCommand>(mut self) -> Self {
        self.binder = Binder::of::<T>();
        self.invoker = Some(Invoker::self_executing::<T>());
        self
    }

    /// Registers `T` as an asynchronous self-executing options struct.
    pub fn runs_async<T: RunCommandAsync>(mut self) -> Self {
        self.binder = Binder::of::<T>();
        self.invoker = Some(Invoker::self_executing_async::<T>());
        self
    }

    /// Registers a detached executor for options of type `T`.
    pub fn executor<T: CommandOptions, E: Execute<T>>(mut self, executor: E) -> Self {
        self.binder = Binder::of::<T>();
        self.invoker = Some(Invoker::detached::<T, E>(executor));
        self
    }

    /// Registers a detached asynchronous executor for options of type `T`.
    pub fn executor_async<T: CommandOptions, E: ExecuteAsync<T>>(mut self, executor: E) -> Self {
        self.binder = Binder::of::<T>();
        self.invoker = Some(Invoker::detached_async::<T, E>(executor));
        self
    }

    /// Registers a function over options of type `T`.
    pub fn handler<T, F>(mut self, handler: F) -> Self
    where
        T: CommandOptions,
        F: Fn(&T) -> anyhow::Result<i32> + Send + Sync + 'static,
    {
        self.binder = Binder::of::<T>();
        self.invoker = Some(Invoker::delegate::<T, F>(handler));
        self
    }

    /// Registers an asynchronous function over options of type `T`.
    pub fn handler_async<T, F, Fut>(mut self, handler: F) -> Self
    where
        T: CommandOptions,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<i32>> + Send + 'static,
    {
        self.binder = Binder::of::<T>();
        self.invoker = Some(Invoker::delegate_async::<T, F, Fut>(handler));
        self
    }

    /// Registers an external validator for options of type `T`.
    ///
    /// `T` must match the options type of the executor registered on this
    /// command; [`CommandTree::add_child`] rejects a mismatch.
    pub fn validator<T: CommandOptions, V: Validator<T>>(mut self, validator: V) -> Self {
        self.validators.push(ErasedValidator::new::<T, V>(validator));
        self
    }

    pub fn executor_shape(&self) -> Option<ExecutorShape> {
        self.invoker.as_ref().map(Invoker::shape)
    }

    pub fn is_executable(&self) -> bool {
        self.invoker.is_some()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns `true` if `token` equals the name (or, case-insensitively,
    /// when `case_sensitive` is off).
    pub fn matches_name(&self, token: &str, case_sensitive: bool) -> bool {
        names_equal(&self.name, token, case_sensitive)
    }

    pub fn matches_alias(&self, token: &str, case_sensitive: bool) -> bool {
        self.aliases
            .iter()
            .any(|a| names_equal(a, token, case_sensitive))
    }

    /// Finds an option by long alias.
    pub fn find_long(&self, alias: &str) -> Option<&OptionDef> {
        self.options.iter().find(|o| o.matches_long(alias))
    }

    /// Finds an option by short alias.
    pub fn find_short(&self, alias: char) -> Option<&OptionDef> {
        self.options.iter().find(|o| o.matches_short(alias))
    }

    /// Positional values in consumption order.
    pub fn ordered_values(&self) -> Vec<&ValueDef> {
        let mut values: Vec<&ValueDef> = self.values.iter().collect();
        values.sort_by_key(|v| v.sort_key());
        values
    }

    fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

fn names_equal(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.chars()
            .flat_map(char::to_lowercase)
            .eq(b.chars().flat_map(char::to_lowercase))
    }
}

/// Result of walking a token sequence down the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'t> {
    /// Matched nodes from the root to the leaf, root included.
    pub path: Vec<NodeId>,
    /// Tokens left after the command path.
    pub remaining: &'t [String],
}

impl Resolution<'_> {
    /// The last node reached.
    pub fn leaf(&self) -> NodeId {
        // `path` always starts with the root.
        self.path[self.path.len() - 1]
    }
}

/// Arena-owned tree of commands rooted at an implicit root node.
#[derive(Debug, Clone)]
pub struct CommandTree {
    nodes: Vec<Option<CommandNode>>,
    frozen: bool,
}

impl CommandTree {
    /// Creates a tree from its root node.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError`] when the root's own definitions are invalid.
    pub fn new(mut root: CommandNode) -> Result<Self, TreeError> {
        validate_node(&root)?;
        root.parent = None;
        root.children.clear();
        Ok(Self {
            nodes: vec![Some(root)],
            frozen: false,
        })
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&CommandNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut CommandNode, TreeError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(TreeError::UnknownNode(id.0))
    }

    /// Iterates the children of `id` with their ids.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &CommandNode)> {
        self.node(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|&child| self.node(child).map(|n| (child, n)))
    }

    /// Names from the first command below the root down to `id`.
    pub fn path(&self, id: NodeId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(cursor) = current {
            let Some(node) = self.node(cursor) else { break };
            if node.parent.is_some() {
                names.push(node.name.as_str());
            }
            current = node.parent;
        }
        names.reverse();
        names
    }

    /// Space-joined [`path`](Self::path); empty for the root.
    pub fn path_string(&self, id: NodeId) -> String {
        self.path(id).join(" ")
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Ends the building phase. Later mutations fail with [`TreeError::Frozen`].
    pub fn freeze(&mut self) {
        if !self.frozen {
            debug!(nodes = self.len(), "Freezing command tree");
        }
        self.frozen = true;
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attaches `node` under `parent`.
    ///
    /// # Errors
    ///
    /// Fails when the tree is frozen, `parent` is unknown, a sibling already
    /// uses one of the node's names, a second default sibling is declared,
    /// or the node's own definitions are invalid.
    pub fn add_child(&mut self, parent: NodeId, mut node: CommandNode) -> Result<NodeId, TreeError> {
        if self.frozen {
            return Err(TreeError::Frozen);
        }
        validate_node(&node)?;

        let parent_node = self.node(parent).ok_or(TreeError::UnknownNode(parent.0))?;
        for (_, sibling) in self.children(parent) {
            for name in node.all_names() {
                if sibling.all_names().any(|existing| existing == name) {
                    return Err(TreeError::DuplicateCommand(name.to_string()));
                }
            }
            if node.is_default && sibling.is_default {
                return Err(TreeError::DuplicateDefault(parent_node.name.clone()));
            }
        }

        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        trace!(command = %node.name, parent = parent.0, "Adding command");
        self.nodes.push(Some(node));
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Detaches `child` and its subtree from `parent`, returning the child.
    ///
    /// # Errors
    ///
    /// Fails when the tree is frozen or `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<CommandNode, TreeError> {
        if self.frozen {
            return Err(TreeError::Frozen);
        }
        let parent_node = self.node_mut(parent)?;
        let Some(position) = parent_node.children.iter().position(|&c| c == child) else {
            return Err(TreeError::NotAChild {
                parent: parent.0,
                child: child.0,
            });
        };
        parent_node.children.remove(position);

        let mut pending = vec![child];
        let mut removed = None;
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) {
                pending.extend(node.children.iter().copied());
                if id == child {
                    removed = Some(node);
                }
            }
        }
        let mut removed = removed.ok_or(TreeError::UnknownNode(child.0))?;
        removed.parent = None;
        removed.children.clear();
        Ok(removed)
    }

    /// Walks `tokens` down from the root.
    ///
    /// At each level the next token is compared with the children's names
    /// and aliases; a name match outranks an alias match. When nothing
    /// matches, a default child is entered without consuming a token.
    /// Resolution stops when no child matches and there is no default.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::AmbiguousCommand`] error when one token
    /// matches several siblings at the same rank.
    ///
    /// # Panics
    ///
    /// Panics if the tree has not been frozen.
    pub fn resolve<'t>(
        &self,
        tokens: &'t [String],
        case_sensitive: bool,
    ) -> Result<Resolution<'t>, CliError> {
        assert!(self.frozen, "command tree must be frozen before resolving");

        let mut current = self.root();
        let mut path = vec![current];
        let mut consumed = 0;

        loop {
            let next = match tokens.get(consumed) {
                Some(token) => self.match_child(current, token, case_sensitive)?,
                None => None,
            };
            if let Some(child) = next {
                consumed += 1;
                current = child;
                path.push(child);
                continue;
            }
            match self.default_child(current) {
                Some(child) => {
                    current = child;
                    path.push(child);
                }
                None => break,
            }
        }

        debug!(
            command = %self.path_string(current),
            consumed,
            remaining = tokens.len() - consumed,
            "Resolved command"
        );
        Ok(Resolution {
            path,
            remaining: &tokens[consumed..],
        })
    }

    fn match_child(
        &self,
        parent: NodeId,
        token: &str,
        case_sensitive: bool,
    ) -> Result<Option<NodeId>, CliError> {
        let by_name: Vec<(NodeId, &CommandNode)> = self
            .children(parent)
            .filter(|(_, n)| n.matches_name(token, case_sensitive))
            .collect();
        let candidates = if by_name.is_empty() {
            self.children(parent)
                .filter(|(_, n)| n.matches_alias(token, case_sensitive))
                .collect()
        } else {
            by_name
        };

        match candidates.as_slice() {
            [] => Ok(None),
            [(id, _)] => Ok(Some(*id)),
            many => {
                let names: Vec<&str> = many.iter().map(|(_, n)| n.name.as_str()).collect();
                Err(CliError::new(
                    ErrorKind::AmbiguousCommand,
                    format!("'{token}' matches several commands: {}", names.join(", ")),
                )
                .with_command(self.path_string(parent)))
            }
        }
    }

    fn default_child(&self, parent: NodeId) -> Option<NodeId> {
        self.children(parent)
            .find(|(_, n)| n.is_default)
            .map(|(id, _)| id)
    }
}

impl std::ops::Index<NodeId> for CommandTree {
    type Output = CommandNode;

    fn index(&self, id: NodeId) -> &CommandNode {
        match self.node(id) {
            Some(node) => node,
            None => panic!("unknown command node #{}", id.0),
        }
    }
}

/// Checks one node's own definitions.
fn validate_node(node: &CommandNode) -> Result<(), TreeError> {
    if node.name.trim().is_empty() {
        return Err(TreeError::EmptyCommandName);
    }

    let mut keys = HashSet::new();
    let mut aliases = HashSet::new();
    for option in &node.options {
        if !keys.insert(option.key.as_str()) {
            return Err(TreeError::DuplicateField(option.key.clone()));
        }
        check_kind(&option.key, &option.kind)?;
        check_default(&option.key, &option.kind, option.default.as_ref())?;
        if option.short.is_empty() && option.long.is_empty() {
            return Err(TreeError::MissingOptionAlias(option.key.clone()));
        }
        for &short in &option.short {
            if short == '-' || short == '=' || short.is_whitespace() || short.is_ascii_digit() {
                return Err(TreeError::InvalidOptionAlias {
                    key: option.key.clone(),
                    alias: short.to_string(),
                });
            }
            if !aliases.insert(format!("-{short}")) {
                return Err(TreeError::DuplicateOptionAlias(format!("-{short}")));
            }
        }
        for long in &option.long {
            if long.is_empty()
                || long.starts_with('-')
                || long.contains('=')
                || long.chars().any(char::is_whitespace)
            {
                return Err(TreeError::InvalidOptionAlias {
                    key: option.key.clone(),
                    alias: long.clone(),
                });
            }
            if !aliases.insert(format!("--{long}")) {
                return Err(TreeError::DuplicateOptionAlias(format!("--{long}")));
            }
        }
    }

    let values = node.ordered_values();
    let mut orders = HashSet::new();
    let mut seen_optional = false;
    for (index, value) in values.iter().enumerate() {
        if !keys.insert(value.key.as_str()) {
            return Err(TreeError::DuplicateField(value.key.clone()));
        }
        let order = value.sort_key();
        if !orders.insert(order) {
            return Err(TreeError::DuplicateValueOrder {
                key: value.key.clone(),
                order,
            });
        }
        check_kind(&value.key, &value.kind)?;
        check_default(&value.key, &value.kind, value.default.as_ref())?;
        if value.kind.is_repeatable() && index + 1 != values.len() {
            return Err(TreeError::ListValueNotLast(value.key.clone()));
        }
        let optional = !value.required || value.default.is_some();
        if !optional && seen_optional {
            return Err(TreeError::RequiredAfterOptional(value.key.clone()));
        }
        seen_optional |= optional;
    }

    if node.synthetic.is_none() {
        let expected = node.binder.type_id();
        let found = node
            .invoker
            .iter()
            .map(|i| (i.type_id(), i.type_name()))
            .chain(node.validators.iter().map(|v| (v.type_id(), v.type_name())))
            .find(|(type_id, _)| *type_id != expected);
        if let Some((_, found)) = found {
            return Err(TreeError::BindingMismatch {
                command: node.name.clone(),
                expected: node.binder.type_name(),
                found,
            });
        }
    }

    Ok(())
}

fn check_kind(key: &str, kind: &ValueKind) -> Result<(), TreeError> {
    if let ValueKind::List(inner) = kind {
        if inner.is_flag() || inner.is_repeatable() {
            return Err(TreeError::UnsupportedKind {
                key: key.to_string(),
                kind: kind.display_name(),
            });
        }
    }
    if let ValueKind::Enum(members) = kind {
        if members.is_empty() {
            return Err(TreeError::UnsupportedKind {
                key: key.to_string(),
                kind: kind.display_name(),
            });
        }
    }
    Ok(())
}

fn check_default(key: &str, kind: &ValueKind, default: Option<&Value>) -> Result<(), TreeError> {
    match default {
        Some(value) if !kind.accepts(value) => Err(TreeError::DefaultKindMismatch {
            key: key.to_string(),
            kind: kind.display_name(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundArgs, ValueKind};

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample_tree() -> (CommandTree, NodeId, NodeId) {
        let mut tree = CommandTree::new(CommandNode::root("tool")).unwrap();
        let build = tree
            .add_child(tree.root(), CommandNode::new("build").alias("b"))
            .unwrap();
        let serve = tree
            .add_child(tree.root(), CommandNode::new("serve").default_command())
            .unwrap();
        (tree, build, serve)
    }

    #[test]
    fn test_add_child_rejects_duplicate_alias() {
        let (mut tree, _, _) = sample_tree();
        let err = tree
            .add_child(tree.root(), CommandNode::new("bundle").alias("b"))
            .unwrap_err();
        assert_eq!(err, TreeError::DuplicateCommand("b".to_string()));
    }

    #[test]
    fn test_add_child_rejects_second_default() {
        let (mut tree, _, _) = sample_tree();
        let err = tree
            .add_child(tree.root(), CommandNode::new("watch").default_command())
            .unwrap_err();
        assert_eq!(err, TreeError::DuplicateDefault("tool".to_string()));
    }

    #[test]
    fn test_frozen_tree_rejects_mutation() {
        let (mut tree, build, _) = sample_tree();
        tree.freeze();
        assert_eq!(
            tree.add_child(tree.root(), CommandNode::new("x")).unwrap_err(),
            TreeError::Frozen
        );
        assert_eq!(tree.remove_child(tree.root(), build).unwrap_err(), TreeError::Frozen);
    }

    #[test]
    fn test_remove_child_drops_subtree() {
        let (mut tree, build, _) = sample_tree();
        let nested = tree.add_child(build, CommandNode::new("release")).unwrap();
        assert_eq!(tree.len(), 4);

        let removed = tree.remove_child(tree.root(), build).unwrap();
        assert_eq!(removed.name, "build");
        assert!(tree.node(nested).is_none());
        assert_eq!(tree.len(), 2);
        assert!(matches!(
            tree.remove_child(tree.root(), build),
            Err(TreeError::NotAChild { .. })
        ));
    }

    #[test]
    fn test_resolve_by_alias_then_default() {
        let (mut tree, build, serve) = sample_tree();
        tree.freeze();

        let input = tokens(&["b", "-v", "app"]);
        let resolution = tree.resolve(&input, true).unwrap();
        assert_eq!(resolution.leaf(), build);
        assert_eq!(resolution.remaining, &input[1..]);

        let input = tokens(&["--port", "80"]);
        let resolution = tree.resolve(&input, true).unwrap();
        assert_eq!(resolution.path, vec![tree.root(), serve]);
        assert_eq!(resolution.remaining.len(), 2);
    }

    #[test]
    fn test_name_match_outranks_alias_match() {
        let mut tree = CommandTree::new(CommandNode::root("tool")).unwrap();
        let _status = tree
            .add_child(tree.root(), CommandNode::new("status").alias("st"))
            .unwrap();
        let st = tree.add_child(tree.root(), CommandNode::new("stash").alias("sh")).unwrap();
        // Rename after wiring so "st" is both a name and an alias.
        tree.nodes[st.0].as_mut().unwrap().name = "st".to_string();
        tree.freeze();

        let input = tokens(&["st"]);
        assert_eq!(tree.resolve(&input, true).unwrap().leaf(), st);
    }

    #[test]
    fn test_case_insensitive_collision_is_ambiguous() {
        let mut tree = CommandTree::new(CommandNode::root("tool")).unwrap();
        tree.add_child(tree.root(), CommandNode::new("Build")).unwrap();
        tree.add_child(tree.root(), CommandNode::new("build")).unwrap();
        tree.freeze();

        let input = tokens(&["BUILD"]);
        let err = tree.resolve(&input, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousCommand);
        assert!(tree.resolve(&input, true).is_ok());
    }

    #[test]
    fn test_validate_node_rejects_required_after_optional() {
        let node = CommandNode::new("copy")
            .with_value(ValueDef::optional("src", ValueKind::String))
            .with_value(ValueDef::required("dest", ValueKind::String));
        let err = CommandTree::new(node).unwrap_err();
        assert_eq!(err, TreeError::RequiredAfterOptional("dest".to_string()));
    }

    #[test]
    fn test_validate_node_rejects_list_before_last() {
        let node = CommandNode::new("cat")
            .with_value(ValueDef::required("files", ValueKind::List(Box::new(ValueKind::String))))
            .with_value(ValueDef::optional("out", ValueKind::String));
        let err = CommandTree::new(node).unwrap_err();
        assert_eq!(err, TreeError::ListValueNotLast("files".to_string()));
    }

    #[test]
    fn test_validate_node_rejects_prefixed_alias() {
        let node = CommandNode::new("x").with_option(OptionDef::flag("v").long("--verbose"));
        assert!(matches!(
            CommandTree::new(node),
            Err(TreeError::InvalidOptionAlias { .. })
        ));
    }

    #[test]
    fn test_validate_node_rejects_mistyped_default() {
        let node = CommandNode::new("serve").with_option(
            OptionDef::new("port", ValueKind::UInt)
                .long("port")
                .with_default(Value::Str("eighty".into())),
        );
        assert_eq!(
            CommandTree::new(node).unwrap_err(),
            TreeError::DefaultKindMismatch {
                key: "port".to_string(),
                kind: "unsigned integer".to_string(),
            }
        );

        let node = CommandNode::new("build").with_value(
            ValueDef::optional("profile", ValueKind::Enum(vec!["debug".into(), "release".into()]))
                .with_default(Value::Str("fast".into())),
        );
        assert!(matches!(
            CommandTree::new(node),
            Err(TreeError::DefaultKindMismatch { ref key, .. }) if key == "profile"
        ));
    }

    #[test]
    fn test_validate_node_accepts_matching_defaults() {
        let node = CommandNode::new("serve")
            .with_option(OptionDef::new("port", ValueKind::UInt).long("port").with_default(Value::UInt(80)))
            .with_option(OptionDef::new("ratio", ValueKind::Float).long("ratio").with_default(Value::Int(1)))
            .with_option(
                OptionDef::new("tag", ValueKind::List(Box::new(ValueKind::String)))
                    .long("tag")
                    .with_default(Value::List(vec![Value::Str("latest".into())])),
            );
        assert!(CommandTree::new(node).is_ok());
    }

    #[test]
    fn test_case_insensitive_match_folds_unicode() {
        let node = CommandNode::new("Überprüfen");
        assert!(node.matches_name("überprüfen", false));
        assert!(node.matches_name("ÜBERPRÜFEN", false));
        assert!(!node.matches_name("überprüfen", true));
    }

    struct Other;

    impl CommandOptions for Other {
        fn from_args(_: &BoundArgs) -> Result<Self, crate::error::BindError> {
            Ok(Other)
        }
    }

    #[test]
    fn test_validate_node_rejects_binding_mismatch() {
        let node = CommandNode::new("x")
            .handler::<BoundArgs, _>(|_| Ok(0))
            .validator::<Other, _>(|_: &CommandNode, _: &Other| Vec::new());
        assert!(matches!(
            CommandTree::new(node),
            Err(TreeError::BindingMismatch { .. })
        ));
    }

    #[test]
    fn test_path_uses_parent_links() {
        let (mut tree, build, _) = sample_tree();
        let release = tree.add_child(build, CommandNode::new("release")).unwrap();
        assert_eq!(tree.path(release), vec!["build", "release"]);
        assert_eq!(tree.path_string(tree.root()), "");
    }
}
