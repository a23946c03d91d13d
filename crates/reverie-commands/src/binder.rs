//! Binding parsed arguments to a declared command signature.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::CommandError;
use crate::grammar::ParsedCommand;

/// How a declared parameter accepts values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Required,
    /// Optional, with the value filled in when the caller omits it (if any).
    Optional(Option<String>),
    /// Collects every positional argument.
    Variadic,
    /// Collects undeclared keyword arguments.
    VariadicKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

/// Declared parameter list of one `_<command>` method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub method: String,
    pub params: Vec<Param>,
}

impl Signature {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Vec::new(),
        }
    }

    fn with(mut self, name: &str, kind: ParamKind) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn required(self, name: &str) -> Self {
        self.with(name, ParamKind::Required)
    }

    /// Optional parameter that stays unset when omitted.
    pub fn optional(self, name: &str) -> Self {
        self.with(name, ParamKind::Optional(None))
    }

    pub fn defaulted(self, name: &str, default: &str) -> Self {
        self.with(name, ParamKind::Optional(Some(default.to_string())))
    }

    pub fn variadic(self, name: &str) -> Self {
        self.with(name, ParamKind::Variadic)
    }

    pub fn variadic_keyword(self, name: &str) -> Self {
        self.with(name, ParamKind::VariadicKeyword)
    }

    /// Command name as the model writes it.
    pub fn command(&self) -> &str {
        self.method.strip_prefix('_').unwrap_or(&self.method)
    }

    fn has(&self, kind: fn(&ParamKind) -> bool) -> bool {
        self.params.iter().any(|p| kind(&p.kind))
    }

    fn declares(&self, name: &str) -> bool {
        self.params.iter().any(|p| {
            p.name == name && matches!(p.kind, ParamKind::Required | ParamKind::Optional(_))
        })
    }

    /// One-line usage, e.g. `send_message(message, receiver_room_id, receiver_user_id=None)`.
    pub fn usage(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| match &p.kind {
                ParamKind::Required => p.name.clone(),
                ParamKind::Optional(Some(d)) => format!("{}={d}", p.name),
                ParamKind::Optional(None) => format!("{}=None", p.name),
                ParamKind::Variadic => format!("*{}", p.name),
                ParamKind::VariadicKeyword => format!("**{}", p.name),
            })
            .collect();
        format!("{}({})", self.command(), params.join(", "))
    }
}

/// Arguments bound to a signature, ready for the method body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArgs {
    command: String,
    values: BTreeMap<String, String>,
    rest: Vec<String>,
    extra: BTreeMap<String, String>,
}

impl BoundArgs {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Value of a parameter that must be present.
    pub fn require(&self, name: &str) -> Result<&str, CommandError> {
        self.get(name).ok_or_else(|| CommandError::MissingArguments {
            command: self.command.clone(),
            missing: vec![name.to_string()],
        })
    }

    /// Typed value of a parameter that must be present.
    pub fn parse<T>(&self, name: &str) -> Result<T, CommandError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        convert(name, self.require(name)?)
    }

    /// Typed value of an optional parameter.
    pub fn parse_opt<T>(&self, name: &str) -> Result<Option<T>, CommandError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name).map(|v| convert(name, v)).transpose()
    }

    /// Positional arguments collected by a variadic parameter.
    pub fn rest(&self) -> &[String] {
        &self.rest
    }

    /// Undeclared keyword arguments collected by a variadic-keyword parameter.
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }
}

fn convert<T>(name: &str, value: &str) -> Result<T, CommandError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| CommandError::InvalidArgument {
            name: name.to_string(),
            message: format!("'{value}': {e}"),
        })
}

/// Find the signature handling `name` (method `_<name>`).
pub fn resolve<'a>(table: &'a [Signature], name: &str) -> Result<&'a Signature, CommandError> {
    let method = format!("_{name}");
    table
        .iter()
        .find(|s| s.method == method)
        .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))
}

/// Bind `parsed` to `signature`.
pub fn bind(signature: &Signature, parsed: ParsedCommand) -> Result<BoundArgs, CommandError> {
    let command = signature.command().to_string();
    let mut bound = BoundArgs {
        command: command.clone(),
        ..Default::default()
    };
    let collects_keywords = signature.has(|k| matches!(k, ParamKind::VariadicKeyword));

    if signature.has(|k| matches!(k, ParamKind::Variadic)) {
        bound.rest = parsed.positional;
        for (key, value) in parsed.keyword {
            if signature.declares(&key) {
                bound.values.insert(key, value);
            } else {
                bound.extra.insert(key, value);
            }
        }
        fill_defaults(signature, &mut bound);
        return Ok(bound);
    }

    // Positional arguments only fill required slots not already given by keyword.
    let slots: Vec<&str> = signature
        .params
        .iter()
        .filter(|p| p.kind == ParamKind::Required && !parsed.keyword.contains_key(&p.name))
        .map(|p| p.name.as_str())
        .collect();
    if parsed.positional.len() > slots.len() {
        return Err(CommandError::Arity {
            command,
            max: slots.len(),
            given: parsed.positional.len(),
        });
    }
    for (slot, value) in slots.iter().zip(parsed.positional) {
        bound.values.insert(slot.to_string(), value);
    }

    for (key, value) in parsed.keyword {
        if signature.declares(&key) {
            bound.values.insert(key, value);
        } else if collects_keywords {
            bound.extra.insert(key, value);
        } else {
            return Err(CommandError::UnexpectedKeyword { command, name: key });
        }
    }

    let missing: Vec<String> = signature
        .params
        .iter()
        .filter(|p| p.kind == ParamKind::Required && !bound.values.contains_key(&p.name))
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(CommandError::MissingArguments { command, missing });
    }

    fill_defaults(signature, &mut bound);
    Ok(bound)
}

fn fill_defaults(signature: &Signature, bound: &mut BoundArgs) {
    for param in &signature.params {
        if let ParamKind::Optional(Some(default)) = &param.kind {
            bound
                .values
                .entry(param.name.clone())
                .or_insert_with(|| default.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse;

    fn abc() -> Signature {
        Signature::new("_abc")
            .required("a")
            .required("b")
            .defaulted("c", "5")
    }

    fn positional(args: &[&str]) -> ParsedCommand {
        ParsedCommand {
            name: "abc".to_string(),
            positional: args.iter().map(|s| s.to_string()).collect(),
            keyword: BTreeMap::new(),
        }
    }

    #[test]
    fn test_positional_binding_fills_default() {
        let bound = bind(&abc(), positional(&["x", "y"])).unwrap();
        assert_eq!(bound.get("a"), Some("x"));
        assert_eq!(bound.get("b"), Some("y"));
        assert_eq!(bound.get("c"), Some("5"));
    }

    #[test]
    fn test_too_many_positional_is_arity_error() {
        let err = bind(&abc(), positional(&["x", "y", "z"])).unwrap_err();
        assert_eq!(
            err,
            CommandError::Arity {
                command: "abc".to_string(),
                max: 2,
                given: 3,
            }
        );
    }

    #[test]
    fn test_missing_arguments_named() {
        let sig = Signature::new("_ab").required("a").required("b");
        let err = bind(&sig, parse("ab(a=\"1\")").unwrap()).unwrap_err();
        assert_eq!(
            err,
            CommandError::MissingArguments {
                command: "ab".to_string(),
                missing: vec!["b".to_string()],
            }
        );
    }

    #[test]
    fn test_keyword_takes_slot_before_positional() {
        let bound = bind(&abc(), parse("abc(y, a=x)").unwrap()).unwrap();
        assert_eq!(bound.get("a"), Some("x"));
        assert_eq!(bound.get("b"), Some("y"));
    }

    #[test]
    fn test_keyword_overrides_default() {
        let bound = bind(&abc(), parse("abc(x, y, c=7)").unwrap()).unwrap();
        assert_eq!(bound.get("c"), Some("7"));
    }

    #[test]
    fn test_unexpected_keyword() {
        let err = bind(&abc(), parse("abc(x, y, d=1)").unwrap()).unwrap_err();
        assert!(matches!(err, CommandError::UnexpectedKeyword { ref name, .. } if name == "d"));
    }

    #[test]
    fn test_variadic_keyword_collects_extras() {
        let sig = Signature::new("_kw").required("a").variadic_keyword("rest");
        let bound = bind(&sig, parse("kw(1, d=2, e=3)").unwrap()).unwrap();
        assert_eq!(bound.get("a"), Some("1"));
        assert_eq!(bound.extra().len(), 2);
        assert_eq!(bound.extra()["e"], "3");
    }

    #[test]
    fn test_variadic_passes_everything_through() {
        let sig = Signature::new("_log")
            .required("level")
            .variadic("parts")
            .defaulted("sep", " ");
        let bound = bind(&sig, parse("log(a, b, c, other=1)").unwrap()).unwrap();
        assert_eq!(bound.rest(), ["a", "b", "c"]);
        // No missing check in variadic mode.
        assert_eq!(bound.get("level"), None);
        assert_eq!(bound.get("sep"), Some(" "));
        assert_eq!(bound.extra()["other"], "1");
    }

    #[test]
    fn test_optional_without_default_stays_unset() {
        let sig = Signature::new("_send")
            .required("message")
            .optional("receiver_user_id");
        let bound = bind(&sig, parse("send(hi)").unwrap()).unwrap();
        assert_eq!(bound.get("receiver_user_id"), None);
        assert_eq!(bound.parse_opt::<u32>("receiver_user_id").unwrap(), None);
    }

    #[test]
    fn test_typed_access() {
        let sig = Signature::new("_timeout").required("seconds");
        let bound = bind(&sig, parse("timeout( 90 )").unwrap()).unwrap();
        assert_eq!(bound.parse::<u64>("seconds").unwrap(), 90);

        let bound = bind(&sig, parse("timeout(soon)").unwrap()).unwrap();
        assert!(matches!(
            bound.parse::<u64>("seconds"),
            Err(CommandError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_resolve_by_underscored_method() {
        let table = vec![abc(), Signature::new("_help")];
        assert_eq!(resolve(&table, "help").unwrap().method, "_help");
        assert_eq!(
            resolve(&table, "_help").unwrap_err(),
            CommandError::UnknownCommand("_help".to_string())
        );
    }

    #[test]
    fn test_usage_line() {
        let sig = Signature::new("_send_message")
            .required("message")
            .optional("receiver_user_id");
        assert_eq!(sig.usage(), "send_message(message, receiver_user_id=None)");
    }
}
