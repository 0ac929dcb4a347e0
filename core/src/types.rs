//! Field definitions and bound values.
//!
//! This module defines the data model shared by the command tree, the
//! coercion engine and the parser: the declared target kind of a field
//! ([`ValueKind`]), the typed value produced for it ([`Value`]), the named
//! option and positional value definitions attached to a command
//! ([`OptionDef`], [`ValueDef`]), and the untyped bound instance the parser
//! fills in ([`BoundArgs`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::BindError;

/// Declared target kind of an option or positional value.
///
/// The kind decides the arity of an option: [`ValueKind::Bool`] options are
/// flags that consume no token, [`ValueKind::List`] options consume one token
/// per occurrence and accumulate, every other kind consumes exactly one token.
///
/// # Examples
///
/// ```
/// use argot_core::ValueKind;
///
/// assert!(ValueKind::Bool.is_flag());
/// assert!(ValueKind::List(Box::new(ValueKind::Int)).is_repeatable());
/// assert_eq!(ValueKind::default(), ValueKind::String);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(into = "KindRepr", try_from = "KindRepr")]
pub enum ValueKind {
    /// Presence flag; `true`/`false` literals are accepted when given.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// Unsigned 64-bit integer.
    UInt,
    /// 64-bit floating point.
    Float,
    /// Free-form text (the default).
    #[default]
    String,
    /// One of the declared members, matched case-insensitively.
    Enum(Vec<String>),
    /// Repeatable container of the inner kind.
    List(Box<ValueKind>),
}

/// Serialized form of [`ValueKind`]: scalar kinds are bare names, containers
/// are single-key maps (`list: uint`, `enum: [debug, release]`).
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum KindRepr {
    Name(String),
    Enum {
        #[serde(rename = "enum")]
        members: Vec<String>,
    },
    List {
        list: Box<ValueKind>,
    },
}

impl From<ValueKind> for KindRepr {
    fn from(kind: ValueKind) -> Self {
        let name = match kind {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::UInt => "uint",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Enum(members) => return KindRepr::Enum { members },
            ValueKind::List(inner) => return KindRepr::List { list: inner },
        };
        KindRepr::Name(name.to_string())
    }
}

impl TryFrom<KindRepr> for ValueKind {
    type Error = String;

    fn try_from(repr: KindRepr) -> Result<Self, Self::Error> {
        match repr {
            KindRepr::Name(name) => match name.as_str() {
                "bool" => Ok(ValueKind::Bool),
                "int" => Ok(ValueKind::Int),
                "uint" => Ok(ValueKind::UInt),
                "float" => Ok(ValueKind::Float),
                "string" => Ok(ValueKind::String),
                other => Err(format!(
                    "unknown value kind '{other}', expected bool, int, uint, float, string, enum or list"
                )),
            },
            KindRepr::Enum { members } => Ok(ValueKind::Enum(members)),
            KindRepr::List { list } => Ok(ValueKind::List(list)),
        }
    }
}

impl ValueKind {
    /// Returns `true` for boolean flags (arity 0).
    pub fn is_flag(&self) -> bool {
        matches!(self, ValueKind::Bool)
    }

    /// Returns `true` for repeatable containers.
    pub fn is_repeatable(&self) -> bool {
        matches!(self, ValueKind::List(_))
    }

    /// Returns the kind of a single occurrence: the inner kind for lists,
    /// the kind itself otherwise.
    pub fn element(&self) -> &ValueKind {
        match self {
            ValueKind::List(inner) => inner,
            other => other,
        }
    }

    /// Short human-readable name used in error messages and help output.
    ///
    /// # Examples
    ///
    /// ```
    /// use argot_core::ValueKind;
    ///
    /// assert_eq!(ValueKind::UInt.display_name(), "unsigned integer");
    /// assert_eq!(
    ///     ValueKind::List(Box::new(ValueKind::Float)).display_name(),
    ///     "list of number"
    /// );
    /// ```
    pub fn display_name(&self) -> String {
        match self {
            ValueKind::Bool => "boolean".to_string(),
            ValueKind::Int => "integer".to_string(),
            ValueKind::UInt => "unsigned integer".to_string(),
            ValueKind::Float => "number".to_string(),
            ValueKind::String => "string".to_string(),
            ValueKind::Enum(members) => format!("one of {}", members.join("|")),
            ValueKind::List(inner) => format!("list of {}", inner.display_name()),
        }
    }

    /// Returns `true` if `value` can be bound to a field of this kind.
    ///
    /// Enumeration values must use a declared member spelling; integers
    /// widen to floats.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueKind::Bool, Value::Bool(_)) => true,
            (ValueKind::Int, _) => value.as_i64().is_some(),
            (ValueKind::UInt, _) => value.as_u64().is_some(),
            (ValueKind::Float, _) => value.as_f64().is_some(),
            (ValueKind::String, Value::Str(_)) => true,
            (ValueKind::Enum(members), Value::Str(s)) => members.contains(s),
            (ValueKind::List(inner), Value::List(items)) => items.iter().all(|v| inner.accepts(v)),
            _ => false,
        }
    }

    /// Value bound to an unfilled, optional field that declares no default.
    ///
    /// Flags default to `false` and lists to an empty list; other kinds stay
    /// unbound.
    pub fn implicit_default(&self) -> Option<Value> {
        match self {
            ValueKind::Bool => Some(Value::Bool(false)),
            ValueKind::List(_) => Some(Value::List(Vec::new())),
            _ => None,
        }
    }
}

/// A typed value produced by coercion.
///
/// Enumeration members are bound as [`Value::Str`] holding the declared
/// member spelling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(n) => Some(*n),
            Value::Int(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            Value::UInt(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Conversion from a bound [`Value`] into a Rust type.
///
/// Used by [`BoundArgs::get`] so typed options structs can pull their fields
/// out of the untyped bound instance.
pub trait FromValue: Sized {
    /// Converts `value`, returning `None` when the value has another shape.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|n| i32::try_from(n).ok())
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64()
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64().and_then(|n| u32::try_from(n).ok())
    }
}

impl FromValue for usize {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64().and_then(|n| usize::try_from(n).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(String::from)
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_list()?.iter().map(T::from_value).collect()
    }
}

/// Definition of a named option.
///
/// Aliases are stored without their prefix: short aliases are single
/// characters used as `-v`, long aliases are words used as `--verbose`.
///
/// # Examples
///
/// ```
/// use argot_core::{OptionDef, ValueKind};
///
/// let verbose = OptionDef::flag("verbose").short('v').long("verbose");
/// assert!(verbose.kind.is_flag());
/// assert!(verbose.matches_short('v'));
/// assert_eq!(verbose.canonical_name(), "--verbose");
///
/// let port = OptionDef::new("port", ValueKind::UInt).long("port").required();
/// assert!(port.required);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDef {
    /// Key the bound value is stored under.
    pub key: String,
    /// Target kind.
    pub kind: ValueKind,
    /// Single-character aliases (`-v`).
    pub short: Vec<char>,
    /// Word aliases (`--verbose`).
    pub long: Vec<String>,
    /// Must be supplied when no default exists.
    pub required: bool,
    /// Value applied when the option is not supplied.
    pub default: Option<Value>,
    /// Description for help output.
    pub help: Option<String>,
    /// Position in help output.
    pub help_order: i32,
}

impl OptionDef {
    /// Creates an option of the given kind with no aliases.
    pub fn new(key: &str, kind: ValueKind) -> Self {
        Self {
            key: key.to_string(),
            kind,
            short: Vec::new(),
            long: Vec::new(),
            required: false,
            default: None,
            help: None,
            help_order: 0,
        }
    }

    /// Creates a boolean flag.
    pub fn flag(key: &str) -> Self {
        Self::new(key, ValueKind::Bool)
    }

    /// Adds a short alias.
    pub fn short(mut self, alias: char) -> Self {
        self.short.push(alias);
        self
    }

    /// Adds a long alias.
    pub fn long(mut self, alias: &str) -> Self {
        self.long.push(alias.to_string());
        self
    }

    /// Marks the option as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Adds a description.
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    /// Sets the help position.
    pub fn help_order(mut self, order: i32) -> Self {
        self.help_order = order;
        self
    }

    pub fn matches_short(&self, alias: char) -> bool {
        self.short.contains(&alias)
    }

    pub fn matches_long(&self, alias: &str) -> bool {
        self.long.iter().any(|l| l == alias)
    }

    /// Returns the display name: first long alias, then first short alias,
    /// then the key.
    pub fn canonical_name(&self) -> String {
        if let Some(long) = self.long.first() {
            format!("--{long}")
        } else if let Some(short) = self.short.first() {
            format!("-{short}")
        } else {
            self.key.clone()
        }
    }
}

/// Definition of a positional value.
///
/// Values are consumed in ascending `order`. A value whose order is left
/// unset is placed after the values already attached to its command.
///
/// # Examples
///
/// ```
/// use argot_core::{ValueDef, ValueKind};
///
/// let target = ValueDef::required("target", ValueKind::String).named("TARGET");
/// assert!(target.required);
/// assert_eq!(target.display_name, "TARGET");
///
/// let extra = ValueDef::optional("extra", ValueKind::String).at(3);
/// assert_eq!(extra.order, Some(3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDef {
    /// Key the bound value is stored under.
    pub key: String,
    /// Target kind. A list kind absorbs every remaining positional token.
    pub kind: ValueKind,
    /// Consumption order, unique per command.
    pub order: Option<u32>,
    /// Name shown in usage lines.
    pub display_name: String,
    /// Must be supplied when no default exists.
    pub required: bool,
    /// Value applied when no token is supplied.
    pub default: Option<Value>,
    /// Description for help output.
    pub help: Option<String>,
}

impl ValueDef {
    /// Creates a required positional value.
    pub fn required(key: &str, kind: ValueKind) -> Self {
        Self {
            key: key.to_string(),
            kind,
            order: None,
            display_name: key.to_string(),
            required: true,
            default: None,
            help: None,
        }
    }

    /// Creates an optional positional value.
    pub fn optional(key: &str, kind: ValueKind) -> Self {
        Self {
            required: false,
            ..Self::required(key, kind)
        }
    }

    /// Sets the consumption order explicitly.
    pub fn at(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the usage name.
    pub fn named(mut self, display_name: &str) -> Self {
        self.display_name = display_name.to_string();
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Adds a description.
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    /// Sort key; unset orders sort last.
    pub(crate) fn sort_key(&self) -> u32 {
        self.order.unwrap_or(u32::MAX)
    }
}

/// Untyped bound instance: field key to bound value.
///
/// Every command produces one; commands that declare a typed options struct
/// convert it through [`CommandOptions::from_args`](crate::CommandOptions::from_args).
///
/// # Examples
///
/// ```
/// use argot_core::{BoundArgs, Value};
///
/// let mut args = BoundArgs::new();
/// args.insert("target", Value::Str("app".into()));
/// args.insert("verbose", Value::Bool(true));
///
/// assert!(args.flag("verbose"));
/// assert_eq!(args.get::<String>("target").unwrap(), "app");
/// assert!(args.get::<i64>("target").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BoundArgs {
    values: BTreeMap<String, Value>,
}

impl BoundArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `value` under `key`, replacing any earlier value.
    pub fn insert(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    /// Appends `value` to the list bound under `key`, creating it if needed.
    pub fn push(&mut self, key: &str, value: Value) {
        match self.values.get_mut(key) {
            Some(Value::List(items)) => items.push(value),
            _ => {
                self.values.insert(key.to_string(), Value::List(vec![value]));
            }
        }
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the flag bound under `key`, `false` when unbound.
    pub fn flag(&self, key: &str) -> bool {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Converts the value bound under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] when the key is unbound or holds another shape.
    pub fn get<T: FromValue>(&self, key: &str) -> Result<T, BindError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| BindError::new(key, "no value bound"))?;
        T::from_value(value).ok_or_else(|| {
            BindError::new(key, format!("bound value {value:?} has an unexpected type"))
        })
    }

    /// Like [`get`](Self::get), but an unbound key yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] when the key holds another shape.
    pub fn get_opt<T: FromValue>(&self, key: &str) -> Result<Option<T>, BindError> {
        if self.values.contains_key(key) {
            self.get(key).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_def_builders() {
        let opt = OptionDef::new("level", ValueKind::Int)
            .short('l')
            .long("level")
            .long("lvl")
            .with_default(Value::Int(3))
            .help_order(2);

        assert!(opt.matches_short('l'));
        assert!(opt.matches_long("lvl"));
        assert!(!opt.matches_long("-l"));
        assert_eq!(opt.canonical_name(), "--level");
        assert_eq!(opt.default, Some(Value::Int(3)));
    }

    #[test]
    fn test_canonical_name_falls_back() {
        assert_eq!(OptionDef::flag("q").short('q').canonical_name(), "-q");
        assert_eq!(OptionDef::flag("bare").canonical_name(), "bare");
    }

    #[test]
    fn test_bound_args_push_accumulates() {
        let mut args = BoundArgs::new();
        args.push("tag", Value::Str("a".into()));
        args.push("tag", Value::Str("b".into()));

        let tags: Vec<String> = args.get("tag").unwrap();
        assert_eq!(tags, vec!["a", "b"]);
    }

    #[test]
    fn test_bound_args_get_opt() {
        let mut args = BoundArgs::new();
        args.insert("n", Value::UInt(4));

        assert_eq!(args.get_opt::<u32>("n").unwrap(), Some(4));
        assert_eq!(args.get_opt::<u32>("missing").unwrap(), None);
        assert!(args.get_opt::<bool>("n").is_err());
    }

    #[test]
    fn test_implicit_defaults() {
        assert_eq!(ValueKind::Bool.implicit_default(), Some(Value::Bool(false)));
        assert_eq!(
            ValueKind::List(Box::new(ValueKind::Int)).implicit_default(),
            Some(Value::List(Vec::new()))
        );
        assert_eq!(ValueKind::Int.implicit_default(), None);
    }

    #[test]
    fn test_kind_accepts_values() {
        assert!(ValueKind::UInt.accepts(&Value::Int(8)));
        assert!(!ValueKind::UInt.accepts(&Value::Int(-1)));
        assert!(!ValueKind::UInt.accepts(&Value::Str("eighty".into())));
        assert!(ValueKind::Float.accepts(&Value::UInt(2)));
        assert!(!ValueKind::Int.accepts(&Value::Float(1.5)));

        let level = ValueKind::Enum(vec!["Info".into(), "Warn".into()]);
        assert!(level.accepts(&Value::Str("Info".into())));
        assert!(!level.accepts(&Value::Str("debug".into())));

        let tags = ValueKind::List(Box::new(ValueKind::String));
        assert!(tags.accepts(&Value::List(vec![Value::Str("a".into())])));
        assert!(!tags.accepts(&Value::Str("a".into())));
    }

    #[test]
    fn test_value_kind_yaml_shape() {
        let kind: ValueKind = serde_yaml::from_str("list: uint").unwrap();
        assert_eq!(kind, ValueKind::List(Box::new(ValueKind::UInt)));

        let kind: ValueKind = serde_yaml::from_str("enum: [debug, release]").unwrap();
        assert_eq!(
            kind,
            ValueKind::Enum(vec!["debug".into(), "release".into()])
        );

        let kind: ValueKind = serde_yaml::from_str("list:\n  enum: [a, b]").unwrap();
        assert_eq!(
            kind,
            ValueKind::List(Box::new(ValueKind::Enum(vec!["a".into(), "b".into()])))
        );
    }

    #[test]
    fn test_value_kind_serializes_as_maps() {
        let kind = ValueKind::List(Box::new(ValueKind::UInt));
        assert_eq!(serde_yaml::to_string(&kind).unwrap(), "list: uint\n");
        assert_eq!(serde_json::to_string(&kind).unwrap(), r#"{"list":"uint"}"#);
        assert_eq!(serde_json::to_string(&ValueKind::Float).unwrap(), r#""float""#);

        let back: ValueKind = serde_json::from_str(r#"{"enum":["x","y"]}"#).unwrap();
        assert_eq!(back, ValueKind::Enum(vec!["x".into(), "y".into()]));
    }

    #[test]
    fn test_value_kind_rejects_unknown_name() {
        let err = serde_yaml::from_str::<ValueKind>("decimal").unwrap_err();
        assert!(err.to_string().contains("unknown value kind 'decimal'"));
    }
}
