//! Parameter sets, argument combinations, and cartesian expansion
//!
//! A [`ParameterSet`] maps chat-completion parameter names to candidate-value
//! lists; [`ParameterSet::expand`] walks the cartesian product in a fixed
//! order so downstream bookkeeping can zip combinations against execution
//! results positionally.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Expected JSON shape of one chat-completion parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    /// A JSON string (e.g. `model`)
    Text,
    /// An array of chat messages, each with string `role` and `content`
    Messages,
    /// A JSON number (e.g. `temperature`)
    Number,
    /// A JSON integer (e.g. `n`, `max_tokens`)
    Integer,
    /// A JSON boolean (e.g. `stream`)
    Flag,
    /// A string or an array of strings (e.g. `stop`)
    TextOrList,
    /// A JSON object (e.g. `logit_bias`, `response_format`)
    Object,
    /// A string or an object (e.g. `function_call`)
    TextOrObject,
    /// An array of function declarations
    FunctionList,
}

impl ParamKind {
    /// Check a concrete value against this shape.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Messages => value.as_array().is_some_and(|items| {
                !items.is_empty()
                    && items.iter().all(|m| {
                        m.get("role").is_some_and(Value::is_string)
                            && m.get("content").is_some_and(Value::is_string)
                    })
            }),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Flag => value.is_boolean(),
            Self::TextOrList => {
                value.is_string()
                    || value
                        .as_array()
                        .is_some_and(|items| items.iter().all(Value::is_string))
            }
            Self::Object => value.is_object(),
            Self::TextOrObject => value.is_string() || value.is_object(),
            Self::FunctionList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_object)),
        }
    }

    /// Human-readable description of the expected shape, for error messages.
    #[must_use]
    pub const fn expected(self) -> &'static str {
        match self {
            Self::Text => "a JSON string",
            Self::Messages => "an array of {role, content} chat messages",
            Self::Number => "a JSON number",
            Self::Integer => "a JSON integer",
            Self::Flag => "a JSON boolean",
            Self::TextOrList => "a string or an array of strings",
            Self::Object => "a JSON object",
            Self::TextOrObject => "a string or a JSON object",
            Self::FunctionList => "an array of function declarations",
        }
    }
}

/// The chat-completion parameter schema: every recognized request parameter
/// and its expected shape, in canonical column order.
pub static PARAM_SCHEMA: &[(&str, ParamKind)] = &[
    ("model", ParamKind::Text),
    ("messages", ParamKind::Messages),
    ("temperature", ParamKind::Number),
    ("functions", ParamKind::FunctionList),
    ("function_call", ParamKind::TextOrObject),
    ("top_p", ParamKind::Number),
    ("n", ParamKind::Integer),
    ("stream", ParamKind::Flag),
    ("stop", ParamKind::TextOrList),
    ("max_tokens", ParamKind::Integer),
    ("presence_penalty", ParamKind::Number),
    ("frequency_penalty", ParamKind::Number),
    ("logit_bias", ParamKind::Object),
    ("seed", ParamKind::Integer),
    ("response_format", ParamKind::Object),
];

/// Look up the schema shape for a parameter name.
#[must_use]
pub fn param_kind(name: &str) -> Option<ParamKind> {
    PARAM_SCHEMA
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, kind)| *kind)
}

/// Position of a parameter in the canonical schema order.
///
/// Unknown names sort after every known one.
#[must_use]
pub(crate) fn schema_position(name: &str) -> usize {
    PARAM_SCHEMA
        .iter()
        .position(|(n, _)| *n == name)
        .unwrap_or(usize::MAX)
}

fn validate_value(name: &str, value: &ParamValue) -> Result<()> {
    let kind = param_kind(name).ok_or_else(|| Error::UnknownParameter(name.to_string()))?;
    match value {
        ParamValue::Omit => Ok(()),
        ParamValue::Given(v) if kind.matches(v) => Ok(()),
        ParamValue::Given(_) => Err(Error::InvalidParameterValue {
            name: name.to_string(),
            expected: kind.expected().to_string(),
        }),
    }
}

/// One candidate value for a request parameter.
///
/// `Omit` means the field is left out of the emitted request entirely; it
/// still participates in expansion and bookkeeping so "omitted" and "given
/// literally" stay distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Leave this field out of the request payload
    Omit,
    /// Send this concrete JSON value
    Given(Value),
}

impl ParamValue {
    /// Whether this is the omitted sentinel.
    #[must_use]
    pub const fn is_omit(&self) -> bool {
        matches!(self, Self::Omit)
    }

    /// The concrete value, if one was given.
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Omit => None,
            Self::Given(v) => Some(v),
        }
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        Self::Given(value)
    }
}

/// Ordered mapping from parameter name to candidate values.
///
/// Insertion order is expansion order. Every candidate list is non-empty and
/// every value is validated against [`PARAM_SCHEMA`] when inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    params: IndexMap<String, Vec<ParamValue>>,
}

impl ParameterSet {
    /// Create an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a parameter with its candidate list.
    ///
    /// # Errors
    ///
    /// Returns an error for names outside the schema, empty candidate lists,
    /// or values of the wrong shape.
    pub fn insert(&mut self, name: impl Into<String>, candidates: Vec<ParamValue>) -> Result<()> {
        let name = name.into();
        if candidates.is_empty() {
            return Err(Error::EmptyCandidates(name));
        }
        for value in &candidates {
            validate_value(&name, value)?;
        }
        self.params.insert(name, candidates);
        Ok(())
    }

    /// Candidate values for one parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[ParamValue]> {
        self.params.get(name).map(Vec::as_slice)
    }

    /// Whether `value` is already a candidate for `name`.
    #[must_use]
    pub fn contains_value(&self, name: &str, value: &ParamValue) -> bool {
        self.params
            .get(name)
            .is_some_and(|candidates| candidates.contains(value))
    }

    /// Append a candidate value if it is not already present.
    ///
    /// Returns `true` when the value was appended.
    ///
    /// # Errors
    ///
    /// Returns an error for names absent from this set or values of the
    /// wrong shape.
    pub fn push_value(&mut self, name: &str, value: ParamValue) -> Result<bool> {
        validate_value(name, &value)?;
        let candidates = self
            .params
            .get_mut(name)
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))?;
        if candidates.contains(&value) {
            return Ok(false);
        }
        candidates.push(value);
        Ok(true)
    }

    /// A copy of this set with `name`'s candidates replaced by `[value]`.
    ///
    /// This is the substitution step of a partial run: the product over the
    /// substituted set yields exactly the combinations the new value adds.
    ///
    /// # Errors
    ///
    /// Returns an error for names absent from this set or values of the
    /// wrong shape.
    pub fn with_substitution(&self, name: &str, value: ParamValue) -> Result<Self> {
        validate_value(name, &value)?;
        if !self.params.contains_key(name) {
            return Err(Error::UnknownParameter(name.to_string()));
        }
        let mut substituted = self.clone();
        substituted.params.insert(name.to_string(), vec![value]);
        Ok(substituted)
    }

    /// Parameter names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Iterate over `(name, candidates)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ParamValue])> {
        self.params
            .iter()
            .map(|(name, candidates)| (name.as_str(), candidates.as_slice()))
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the set holds no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of combinations `expand` will produce.
    #[must_use]
    pub fn combination_count(&self) -> usize {
        if self.params.is_empty() {
            return 0;
        }
        self.params.values().map(Vec::len).product()
    }

    /// Expand the cartesian product of all candidate lists.
    ///
    /// Order is deterministic: parameters in insertion order with the last
    /// parameter varying fastest. An empty set expands to no combinations.
    #[must_use]
    pub fn expand(&self) -> Vec<ArgumentCombo> {
        if self.params.is_empty() {
            return Vec::new();
        }
        let names: Vec<&String> = self.params.keys().collect();
        let candidates: Vec<&Vec<ParamValue>> = self.params.values().collect();
        let total = self.combination_count();
        let mut combos = Vec::with_capacity(total);
        let mut cursor = vec![0_usize; names.len()];
        for _ in 0..total {
            let mut args = IndexMap::with_capacity(names.len());
            for (slot, &pick) in cursor.iter().enumerate() {
                args.insert(names[slot].clone(), candidates[slot][pick].clone());
            }
            combos.push(ArgumentCombo { args });
            // odometer step: rightmost slot increments first
            for slot in (0..cursor.len()).rev() {
                cursor[slot] += 1;
                if cursor[slot] < candidates[slot].len() {
                    break;
                }
                cursor[slot] = 0;
            }
        }
        combos
    }
}

/// One concrete assignment of a value to every parameter.
///
/// Two combos are equal iff they assign equal values to the same names;
/// insertion order does not participate in equality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentCombo {
    args: IndexMap<String, ParamValue>,
}

impl ArgumentCombo {
    /// Create an empty combination.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a value, validating it against the schema.
    ///
    /// # Errors
    ///
    /// Returns an error for names outside the schema or values of the wrong
    /// shape.
    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) -> Result<()> {
        let name = name.into();
        validate_value(&name, &value)?;
        self.args.insert(name, value);
        Ok(())
    }

    /// The value assigned to `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.args.get(name)
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.args.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of assigned parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether no parameters are assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Render the request payload, dropping omitted fields.
    ///
    /// Omitted values survive expansion and bookkeeping untouched; this is
    /// the single point where they are filtered out.
    #[must_use]
    pub fn to_payload(&self) -> serde_json::Map<String, Value> {
        self.args
            .iter()
            .filter_map(|(name, value)| {
                value
                    .as_value()
                    .map(|v| (name.clone(), v.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_by_two() -> ParameterSet {
        let mut params = ParameterSet::new();
        params
            .insert(
                "model",
                vec![
                    ParamValue::Given(json!("a")),
                    ParamValue::Given(json!("b")),
                ],
            )
            .unwrap();
        params
            .insert(
                "temperature",
                vec![
                    ParamValue::Given(json!(0.0)),
                    ParamValue::Given(json!(1.0)),
                ],
            )
            .unwrap();
        params
    }

    #[test]
    fn test_expand_two_by_two_order() {
        let combos = two_by_two().expand();
        assert_eq!(combos.len(), 4);
        let picks: Vec<(String, f64)> = combos
            .iter()
            .map(|c| {
                (
                    c.get("model").unwrap().as_value().unwrap().as_str().unwrap().to_string(),
                    c.get("temperature").unwrap().as_value().unwrap().as_f64().unwrap(),
                )
            })
            .collect();
        // last parameter varies fastest
        assert_eq!(
            picks,
            vec![
                ("a".to_string(), 0.0),
                ("a".to_string(), 1.0),
                ("b".to_string(), 0.0),
                ("b".to_string(), 1.0),
            ]
        );
    }

    #[test]
    fn test_expand_is_deterministic() {
        let params = two_by_two();
        assert_eq!(params.expand(), params.expand());
    }

    #[test]
    fn test_expand_empty_set_yields_nothing() {
        assert!(ParameterSet::new().expand().is_empty());
        assert_eq!(ParameterSet::new().combination_count(), 0);
    }

    #[test]
    fn test_combination_count_matches_expansion() {
        let mut params = two_by_two();
        params
            .insert("n", vec![ParamValue::Given(json!(1)), ParamValue::Given(json!(2)), ParamValue::Given(json!(3))])
            .unwrap();
        assert_eq!(params.combination_count(), 12);
        assert_eq!(params.expand().len(), 12);
    }

    #[test]
    fn test_insert_rejects_unknown_parameter() {
        let mut params = ParameterSet::new();
        let err = params
            .insert("beam_width", vec![ParamValue::Given(json!(4))])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParameter(name) if name == "beam_width"));
    }

    #[test]
    fn test_insert_rejects_empty_candidates() {
        let mut params = ParameterSet::new();
        let err = params.insert("model", vec![]).unwrap_err();
        assert!(matches!(err, Error::EmptyCandidates(name) if name == "model"));
    }

    #[test]
    fn test_insert_rejects_wrong_shape() {
        let mut params = ParameterSet::new();
        let err = params
            .insert("temperature", vec![ParamValue::Given(json!("hot"))])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameterValue { name, .. } if name == "temperature"));
    }

    #[test]
    fn test_omit_is_always_valid() {
        let mut params = ParameterSet::new();
        params.insert("max_tokens", vec![ParamValue::Omit]).unwrap();
        assert_eq!(params.get("max_tokens"), Some(&[ParamValue::Omit][..]));
    }

    #[test]
    fn test_push_value_appends_once() {
        let mut params = two_by_two();
        let added = params
            .push_value("model", ParamValue::Given(json!("c")))
            .unwrap();
        assert!(added);
        let again = params
            .push_value("model", ParamValue::Given(json!("c")))
            .unwrap();
        assert!(!again);
        assert_eq!(params.get("model").unwrap().len(), 3);
    }

    #[test]
    fn test_with_substitution_pins_one_parameter() {
        let params = two_by_two();
        let substituted = params
            .with_substitution("model", ParamValue::Given(json!("c")))
            .unwrap();
        let combos = substituted.expand();
        assert_eq!(combos.len(), 2);
        assert!(combos
            .iter()
            .all(|c| c.get("model").unwrap().as_value().unwrap() == "c"));
        // the original set is untouched
        assert_eq!(params.get("model").unwrap().len(), 2);
    }

    #[test]
    fn test_combo_equality_ignores_order() {
        let mut left = ArgumentCombo::new();
        left.set("model", ParamValue::Given(json!("a"))).unwrap();
        left.set("temperature", ParamValue::Given(json!(0.5))).unwrap();
        let mut right = ArgumentCombo::new();
        right.set("temperature", ParamValue::Given(json!(0.5))).unwrap();
        right.set("model", ParamValue::Given(json!("a"))).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn test_payload_drops_omitted_fields() {
        let mut combo = ArgumentCombo::new();
        combo.set("model", ParamValue::Given(json!("a"))).unwrap();
        combo.set("max_tokens", ParamValue::Omit).unwrap();
        let payload = combo.to_payload();
        assert_eq!(payload.get("model"), Some(&json!("a")));
        assert!(!payload.contains_key("max_tokens"));
        // bookkeeping still sees the omitted assignment
        assert_eq!(combo.get("max_tokens"), Some(&ParamValue::Omit));
    }

    #[test]
    fn test_schema_lookup() {
        assert_eq!(param_kind("model"), Some(ParamKind::Text));
        assert_eq!(param_kind("logit_bias"), Some(ParamKind::Object));
        assert_eq!(param_kind("beam_width"), None);
        assert!(schema_position("model") < schema_position("temperature"));
    }

    #[test]
    fn test_messages_shape_validation() {
        let kind = param_kind("messages").unwrap();
        assert!(kind.matches(&json!([{"role": "user", "content": "hi"}])));
        assert!(!kind.matches(&json!([])));
        assert!(!kind.matches(&json!([{"role": "user"}])));
        assert!(!kind.matches(&json!("hi")));
    }
}
