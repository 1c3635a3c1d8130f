use crate::task::current_task_name;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Process-wide counter for component instance identities. Never reset; the
/// first descriptor constructed gets instance id 1.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

fn next_instance_id() -> u64 {
    NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed) + 1
}

/// Errors that can occur while wrapping a render function.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ComponentError {
    /// The signature declares a parameter literally named `key`.  The key is
    /// reserved for reconciliation identity and is supplied through
    /// [`Args::key`], never as an ordinary parameter.
    #[error("render function for {component} uses reserved parameter 'key'")]
    ReservedParam {
        /// Name of the component whose signature collided.
        component: String,
    },
    /// The signature declares parameters in an order no call signature can
    /// have (see [`Signature`] for the required order).
    #[error("render function for {component} declares {reason}")]
    MisdeclaredSignature {
        /// Name of the component whose signature is malformed.
        component: String,
        /// What is wrong with the declaration order.
        reason: &'static str,
    },
}

/// How a declared parameter accepts values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    /// Fillable by position or by name.
    Positional,
    /// Gathers positional overflow (`*rest`).
    VarPositional,
    /// Fillable by name only.
    KeywordOnly,
    /// Gathers unmatched keyword arguments (`**extra`).
    VarKeyword,
}

#[derive(Debug, Clone)]
struct Param {
    name: String,
    kind: ParamKind,
    default: Option<Value>,
}

/// The declared parameter list of a render function.
///
/// Rust has no runtime reflection, so the signature the diagnostics need is
/// stated explicitly when wrapping.  It is used only to reconstruct a
/// human-readable call in [`Component`]'s `Debug` output, never to invoke
/// the render function, which always receives the raw argument snapshots.
///
/// Declarations follow the usual call-signature order: positional parameters
/// first, then at most one positional gatherer, then keyword-only
/// parameters, then at most one keyword gatherer.  [`component`] rejects a
/// signature that breaks this order.
///
/// Parameters are declared in order with the builder methods:
///
/// ```
/// use mirador_core::component::Signature;
///
/// // f(a, b=2, *rest, limit, **extra)
/// let sig = Signature::new()
///     .arg("a")
///     .arg_default("b", 2)
///     .variadic("rest")
///     .kw_only("limit")
///     .kw_variadic("extra");
/// # let _ = sig;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Param>,
}

/// One value produced by [`Signature::bind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    /// A single parameter's value.
    Value(Value),
    /// The positional overflow gathered by a variadic parameter.
    Tuple(Vec<Value>),
    /// The unmatched keyword arguments gathered by a keyword-variadic
    /// parameter, in arrival order.
    Map(Vec<(String, Value)>),
}

/// Why a set of arguments failed to bind against a [`Signature`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("too many positional arguments")]
    TooManyPositional,
    #[error("unexpected keyword argument '{0}'")]
    UnexpectedKeyword(String),
    #[error("multiple values for argument '{0}'")]
    DuplicateValue(String),
    #[error("missing required argument '{0}'")]
    MissingRequired(String),
}

impl Signature {
    /// An empty signature (a render function taking no parameters).
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required positional-or-keyword parameter.
    pub fn arg(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: ParamKind::Positional,
            default: None,
        });
        self
    }

    /// Declare a positional-or-keyword parameter with a default.
    pub fn arg_default(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: ParamKind::Positional,
            default: Some(default.into()),
        });
        self
    }

    /// Declare the parameter that gathers positional overflow (`*rest`).
    pub fn variadic(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: ParamKind::VarPositional,
            default: None,
        });
        self
    }

    /// Declare a required keyword-only parameter.
    pub fn kw_only(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: ParamKind::KeywordOnly,
            default: None,
        });
        self
    }

    /// Declare a keyword-only parameter with a default.
    pub fn kw_only_default(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: ParamKind::KeywordOnly,
            default: Some(default.into()),
        });
        self
    }

    /// Declare the parameter that gathers unmatched keyword arguments
    /// (`**extra`).
    pub fn kw_variadic(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: ParamKind::VarKeyword,
            default: None,
        });
        self
    }

    fn reserves_key(&self) -> bool {
        self.params.iter().any(|p| {
            p.name == "key" && matches!(p.kind, ParamKind::Positional | ParamKind::KeywordOnly)
        })
    }

    /// Why this declaration order is impossible for a call signature, if it
    /// is.  The builder itself stays infallible; [`component`] is the gate.
    fn misdeclaration(&self) -> Option<&'static str> {
        let mut seen_var_positional = false;
        let mut seen_keyword_only = false;
        let mut seen_var_keyword = false;
        for param in &self.params {
            if seen_var_keyword {
                return Some("a parameter after the keyword gatherer");
            }
            match param.kind {
                ParamKind::Positional if seen_var_positional || seen_keyword_only => {
                    return Some("a positional parameter after variadic or keyword-only parameters");
                }
                ParamKind::Positional => {}
                ParamKind::VarPositional if seen_var_positional => {
                    return Some("more than one positional gatherer");
                }
                ParamKind::VarPositional if seen_keyword_only => {
                    return Some("a positional gatherer after keyword-only parameters");
                }
                ParamKind::VarPositional => seen_var_positional = true,
                ParamKind::KeywordOnly => seen_keyword_only = true,
                ParamKind::VarKeyword => seen_var_keyword = true,
            }
        }
        None
    }

    /// Bind argument snapshots against this signature.
    ///
    /// Positional values fill positional parameters in declaration order;
    /// overflow goes to the variadic parameter or is an error without one.
    /// Keyword values match bindable parameters by name (binding a name twice
    /// is an error); unmatched names go to the keyword-variadic parameter or
    /// are an error without one.  A missing required parameter is an error.
    ///
    /// The output lists `(name, value)` pairs in declaration order.  Defaults
    /// are not applied: an unbound defaulted parameter is simply absent, as
    /// are empty variadic gatherers.
    pub fn bind(
        &self,
        positional: &[Value],
        keyword: &[(String, Value)],
    ) -> Result<Vec<(String, Bound)>, BindError> {
        let mut slots: Vec<Option<Bound>> = vec![None; self.params.len()];
        let mut extra_positional: Vec<Value> = Vec::new();
        let mut extra_keyword: Vec<(String, Value)> = Vec::new();

        let positional_slots: Vec<usize> = self
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind == ParamKind::Positional)
            .map(|(i, _)| i)
            .collect();
        let has_var_positional = self
            .params
            .iter()
            .any(|p| p.kind == ParamKind::VarPositional);
        let has_var_keyword = self.params.iter().any(|p| p.kind == ParamKind::VarKeyword);

        for (offset, value) in positional.iter().enumerate() {
            match positional_slots.get(offset) {
                Some(&slot) => slots[slot] = Some(Bound::Value(value.clone())),
                None if has_var_positional => extra_positional.push(value.clone()),
                None => return Err(BindError::TooManyPositional),
            }
        }

        for (name, value) in keyword {
            let named = self.params.iter().position(|p| {
                p.name == *name && matches!(p.kind, ParamKind::Positional | ParamKind::KeywordOnly)
            });
            match named {
                Some(slot) => {
                    if slots[slot].is_some() {
                        return Err(BindError::DuplicateValue(name.clone()));
                    }
                    slots[slot] = Some(Bound::Value(value.clone()));
                }
                None if has_var_keyword => {
                    if extra_keyword.iter().any(|(existing, _)| existing == name) {
                        return Err(BindError::DuplicateValue(name.clone()));
                    }
                    extra_keyword.push((name.clone(), value.clone()));
                }
                None => return Err(BindError::UnexpectedKeyword(name.clone())),
            }
        }

        let mut output = Vec::with_capacity(self.params.len());
        for (slot, param) in self.params.iter().enumerate() {
            match param.kind {
                ParamKind::Positional | ParamKind::KeywordOnly => match slots[slot].take() {
                    Some(value) => output.push((param.name.clone(), value)),
                    None if param.default.is_some() => {}
                    None => return Err(BindError::MissingRequired(param.name.clone())),
                },
                ParamKind::VarPositional => {
                    if !extra_positional.is_empty() {
                        let gathered = std::mem::take(&mut extra_positional);
                        output.push((param.name.clone(), Bound::Tuple(gathered)));
                    }
                }
                ParamKind::VarKeyword => {
                    if !extra_keyword.is_empty() {
                        let gathered = std::mem::take(&mut extra_keyword);
                        output.push((param.name.clone(), Bound::Map(gathered)));
                    }
                }
            }
        }
        Ok(output)
    }
}

/// Wrap a render function into a reusable component constructor.
///
/// Validation happens here, at wrap time, never at call time.  A signature
/// declaring a parameter literally named `key` of a bindable kind
/// ([`Signature::arg`] or [`Signature::kw_only`]) is rejected immediately:
/// the key is reserved for reconciliation identity and travels through
/// [`Args::key`] instead.  Variadic gatherers named `key` are allowed; they
/// can never collide with it.  A declaration order no call signature can
/// have (see [`Signature`]) is rejected the same way.
///
/// The returned [`ComponentFn`] is cheap to clone and is called with [`Args`]
/// to produce [`Component`] descriptors.  Construction only captures values;
/// the render function runs when (and each time) [`Component::render`] is
/// called.
///
/// # Example
///
/// ```
/// use mirador_core::component::{component, Args, Node, Signature};
///
/// let heading = component("Heading", Signature::new().arg("text"), |args| {
///     let text = args.arg(0).and_then(|v| v.as_str()).unwrap_or_default();
///     Node::Text(format!("# {text}"))
/// })
/// .unwrap();
///
/// let descriptor = heading.call(Args::new().arg("Hello"));
/// match descriptor.render() {
///     Node::Text(text) => assert_eq!(text, "# Hello"),
///     _ => unreachable!(),
/// }
/// ```
pub fn component<F>(
    name: impl Into<String>,
    signature: Signature,
    render: F,
) -> Result<ComponentFn, ComponentError>
where
    F: Fn(CallArgs<'_>) -> Node + Send + Sync + 'static,
{
    let name = name.into();
    if signature.reserves_key() {
        return Err(ComponentError::ReservedParam { component: name });
    }
    if let Some(reason) = signature.misdeclaration() {
        return Err(ComponentError::MisdeclaredSignature {
            component: name,
            reason,
        });
    }
    Ok(ComponentFn {
        inner: Arc::new(ComponentFnInner {
            name,
            signature,
            render: Box::new(render),
        }),
    })
}

struct ComponentFnInner {
    name: String,
    signature: Signature,
    render: Box<dyn Fn(CallArgs<'_>) -> Node + Send + Sync>,
}

/// A component constructor produced by [`component`].
///
/// Clones share the wrapped render function, so descriptors built from any
/// clone report [`Component::same_fn`] for each other.
#[derive(Clone)]
pub struct ComponentFn {
    inner: Arc<ComponentFnInner>,
}

impl ComponentFn {
    /// The component's name, as given to [`component`].
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Construct a descriptor capturing `args`.
    ///
    /// No work happens here beyond the capture; the render function is not
    /// invoked until [`Component::render`].
    pub fn call(&self, args: Args) -> Component {
        let instance = next_instance_id();
        trace!(
            task = %current_task_name(),
            component = %self.inner.name,
            instance,
            "constructed component"
        );
        Component {
            func: self.clone(),
            key: args.key,
            args: args.positional,
            kwargs: args.keyword,
            instance,
        }
    }
}

impl fmt::Debug for ComponentFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFn")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

/// Arguments for one [`ComponentFn::call`].
///
/// Values are [`serde_json::Value`]s; anything convertible works directly.
/// The reconciliation key is set with [`Args::key`]; it is not a keyword
/// argument and never reaches the render function.
#[derive(Debug, Clone, Default)]
pub struct Args {
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
    key: Option<Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument.
    pub fn kw(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }

    /// Set the reconciliation key for the descriptor.
    pub fn key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Read-only view of a descriptor's captured arguments, passed to the render
/// function on every invocation.
#[derive(Clone, Copy)]
pub struct CallArgs<'a> {
    positional: &'a [Value],
    keyword: &'a [(String, Value)],
}

impl<'a> CallArgs<'a> {
    /// All positional arguments, in call order.
    pub fn positional(&self) -> &'a [Value] {
        self.positional
    }

    /// The positional argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&'a Value> {
        self.positional.get(index)
    }

    /// All keyword arguments, in call order.
    pub fn keyword(&self) -> &'a [(String, Value)] {
        self.keyword
    }

    /// The first keyword argument named `name`, if present.
    pub fn kw(&self, name: &str) -> Option<&'a Value> {
        self.keyword
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }
}

/// One point in the UI tree where a render function will be invoked.
///
/// A descriptor is immutable after construction: it holds the wrapped render
/// function, the optional reconciliation key, and snapshots of the call's
/// positional and keyword arguments.  Every [`render`](Component::render)
/// re-invokes the function with those snapshots and returns a fresh result;
/// nothing is memoized.
///
/// Each descriptor carries a process-unique instance id.  Constructing twice
/// with identical inputs yields two descriptors that render equal results but
/// are distinct identities.
pub struct Component {
    func: ComponentFn,
    key: Option<Value>,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    instance: u64,
}

impl Component {
    /// Invoke the stored render function with the stored arguments.
    ///
    /// The wrapper imposes no side effects of its own; any effects are the
    /// render function's.
    pub fn render(&self) -> Node {
        trace!(
            task = %current_task_name(),
            component = %self.func.inner.name,
            instance = self.instance,
            "invoking render function"
        );
        (self.func.inner.render)(CallArgs {
            positional: &self.args,
            keyword: &self.kwargs,
        })
    }

    /// The component's name.
    pub fn name(&self) -> &str {
        self.func.name()
    }

    /// The reconciliation key, if one was set.
    pub fn key(&self) -> Option<&Value> {
        self.key.as_ref()
    }

    /// The process-unique identity of this descriptor.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Whether `self` and `other` wrap the same render function.
    pub fn same_fn(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.func.inner, &other.func.inner)
    }
}

/// Diagnostic representation: the component name, the instance id in hex, and
/// the arguments as bound against the declared signature.  When the stored
/// arguments cannot bind, degrades to the placeholder `Name(...)`.  Never
/// panics.
impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.func.name();
        let bound = match self.func.inner.signature.bind(&self.args, &self.kwargs) {
            Ok(bound) => bound,
            Err(_) => return write!(f, "{name}(...)"),
        };
        if bound.is_empty() {
            return write!(f, "{}({:02x})", name, self.instance);
        }
        write!(f, "{}({:02x}", name, self.instance)?;
        for (param, value) in &bound {
            write!(f, ", {param}=")?;
            write_bound(f, value)?;
        }
        f.write_str(")")
    }
}

fn write_bound(f: &mut fmt::Formatter<'_>, bound: &Bound) -> fmt::Result {
    match bound {
        Bound::Value(value) => write_value(f, value),
        Bound::Tuple(items) => {
            f.write_str("(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_value(f, item)?;
            }
            if items.len() == 1 {
                f.write_str(",")?;
            }
            f.write_str(")")
        }
        Bound::Map(pairs) => {
            f.write_str("{")?;
            for (i, (name, value)) in pairs.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_quoted(f, name)?;
                f.write_str(": ")?;
                write_value(f, value)?;
            }
            f.write_str("}")
        }
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("None"),
        Value::Bool(true) => f.write_str("True"),
        Value::Bool(false) => f.write_str("False"),
        Value::Number(n) => write!(f, "{n}"),
        Value::String(s) => write_quoted(f, s),
        Value::Array(items) => {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_value(f, item)?;
            }
            f.write_str("]")
        }
        Value::Object(map) => {
            f.write_str("{")?;
            for (i, (name, item)) in map.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_quoted(f, name)?;
                f.write_str(": ")?;
                write_value(f, item)?;
            }
            f.write_str("}")
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// What a render function may produce.
///
/// Raw UI-node payloads are opaque [`serde_json::Value`]s; their shape is the
/// diffing engine's contract, not this layer's.
pub enum Node {
    /// A further descriptor to materialize.
    Component(Component),
    /// A raw UI-node value.
    Vdom(Value),
    /// Plain text.
    Text(String),
    /// Nothing to render.
    Empty,
}

impl From<Component> for Node {
    fn from(component: Component) -> Self {
        Node::Component(component)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Vdom(value)
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_owned())
    }
}

impl From<()> for Node {
    fn from(_: ()) -> Self {
        Node::Empty
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Component(component) => f.debug_tuple("Component").field(component).finish(),
            Node::Vdom(value) => f.debug_tuple("Vdom").field(value).finish(),
            Node::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Node::Empty => f.write_str("Empty"),
        }
    }
}
