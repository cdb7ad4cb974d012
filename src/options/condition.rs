//! Caller-facing condition tree over logical field names.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
        }
    }

    pub fn document(self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            "<" => Operator::Lt,
            "<=" => Operator::Lte,
            other => return Err(format!("unknown operator '{}'", other)),
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare { field: String, op: Operator, value: Value },
    In { field: String, values: Vec<Value> },
    NotIn { field: String, values: Vec<Value> },
    IsNull(String),
    IsNotNull(String),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn compare(field: &str, op: Operator, value: impl Into<Value>) -> Self {
        Condition::Compare {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Eq, value)
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Ne, value)
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Gt, value)
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Gte, value)
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Lt, value)
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Lte, value)
    }

    pub fn in_list<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Condition::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not_in<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Condition::NotIn {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(field: &str) -> Self {
        Condition::IsNull(field.to_string())
    }

    pub fn is_not_null(field: &str) -> Self {
        Condition::IsNotNull(field.to_string())
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut items) => {
                items.push(other);
                Condition::And(items)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut items) => {
                items.push(other);
                Condition::Or(items)
            }
            first => Condition::Or(vec![first, other]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operators_parse_from_text() {
        assert_eq!("<>".parse::<Operator>(), Ok(Operator::Ne));
        assert_eq!(">=".parse::<Operator>(), Ok(Operator::Gte));
        assert!("LIKE".parse::<Operator>().is_err());
    }

    #[test]
    fn chaining_flattens() {
        let c = Condition::eq("a", 1).and(Condition::eq("b", 2)).and(Condition::is_null("c"));
        match c {
            Condition::And(items) => assert_eq!(items.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            Condition::in_list("id", [1, 2]),
            Condition::In {
                field: "id".into(),
                values: vec![json!(1), json!(2)]
            }
        );
    }
}
